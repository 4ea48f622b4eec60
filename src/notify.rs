//! Monitoring notifications
//!
//! Only successful single pushes are reported; failures show up as queue
//! markers instead.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::client::TransferOutcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Status {
    Ok,
}

impl Status {
    /// Nagios-style plugin code
    pub fn code(self) -> u8 {
        match self {
            Status::Ok => 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub station: String,
    pub service: String,
    pub message: String,
    pub status: Status,
}

pub trait NotificationSink {
    fn notify(&self, n: &Notification) -> Result<()>;
}

pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _n: &Notification) -> Result<()> {
        Ok(())
    }
}

/// Send one OK notification for a successful single push of `path`.
/// Returns whether the sink was called; failed outcomes never are.
pub fn notify_pushed(
    sink: &dyn NotificationSink,
    station: &str,
    service: &str,
    path: &Path,
    outcome: &TransferOutcome,
) -> Result<bool> {
    if !outcome.is_success() {
        return Ok(false);
    }
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    sink.notify(&Notification {
        station: station.to_string(),
        service: service.to_string(),
        message: format!("{name} sent ({} bytes)", outcome.bytes),
        status: Status::Ok,
    })?;
    Ok(true)
}

/// Runs `program <station> <service> <status code> <message>`
pub struct CommandSink {
    program: PathBuf,
}

impl CommandSink {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl NotificationSink for CommandSink {
    fn notify(&self, n: &Notification) -> Result<()> {
        let status = Command::new(&self.program)
            .arg(&n.station)
            .arg(&n.service)
            .arg(n.status.code().to_string())
            .arg(&n.message)
            .status()
            .with_context(|| format!("run {}", self.program.display()))?;
        if !status.success() {
            bail!("{} exited with {}", self.program.display(), status);
        }
        Ok(())
    }
}
