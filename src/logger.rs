//! Event sinks for push and queue activity
//!
//! The engine reports everything through [`Logger`]; nothing in the transfer
//! path writes to the console directly.

use chrono::Utc;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::client::Target;
use crate::engine::BatchReport;
use crate::error::PushError;

pub trait Logger: Send + Sync {
    fn attempt(&self, _path: &Path, _target: &Target) {}
    fn pushed(&self, _path: &Path, _target: &Target, _bytes: u64) {}
    fn failed(&self, _path: &Path, _target: &Target, _err: &PushError) {}
    fn queued(&self, _marker: &Path) {}
    fn unqueued(&self, _marker: &Path) {}
    fn skipped(&self, _err: &PushError) {}
    fn not_found(&self, _err: &PushError) {}
    fn done(&self, _report: &BatchReport, _seconds: f64) {}
}

pub struct NoopLogger;
impl Logger for NoopLogger {}

/// Console output through `tracing`
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn attempt(&self, path: &Path, target: &Target) {
        tracing::debug!("pushing {} to {}", path.display(), target);
    }
    fn pushed(&self, path: &Path, target: &Target, bytes: u64) {
        tracing::info!("sent {} to {} ({} bytes)", path.display(), target, bytes);
    }
    fn failed(&self, path: &Path, target: &Target, err: &PushError) {
        match err {
            PushError::DryRun => tracing::info!("dry run: {} not sent to {}", path.display(), target),
            _ => tracing::warn!("failed to send {} to {}: {}", path.display(), target, err),
        }
    }
    fn queued(&self, marker: &Path) {
        tracing::info!("queued {}", marker.display());
    }
    fn unqueued(&self, marker: &Path) {
        tracing::info!("unqueued {}", marker.display());
    }
    fn skipped(&self, err: &PushError) {
        tracing::warn!("skipping queue entry: {}", err);
    }
    fn not_found(&self, err: &PushError) {
        tracing::warn!("{}; leaving it queued", err);
    }
    fn done(&self, r: &BatchReport, seconds: f64) {
        tracing::info!(
            "queue run done in {:.3}s: pending={} sent={} failed={} not_found={} skipped={} unqueued={}",
            seconds,
            r.pending,
            r.sent,
            r.failed,
            r.not_found,
            r.skipped,
            r.unqueued
        );
    }
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    timestamp: String,
    event: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    report: Option<&'a BatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seconds: Option<f64>,
}

impl<'a> JsonEvent<'a> {
    fn new(event: &'a str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            event,
            path: None,
            target: None,
            bytes: None,
            error: None,
            report: None,
            seconds: None,
        }
    }

    fn path(mut self, p: &Path) -> Self {
        self.path = Some(p.display().to_string());
        self
    }

    fn target(mut self, t: &Target) -> Self {
        self.target = Some(t.to_string());
        self
    }

    fn error(mut self, e: &PushError) -> Self {
        self.error = Some(e.to_string());
        self
    }
}

/// Appends one JSON object per event to a file
pub struct JsonLogger {
    file: Mutex<File>,
}

impl JsonLogger {
    pub fn new<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let f = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(f),
        })
    }

    fn line(&self, ev: &JsonEvent<'_>) {
        if let Ok(mut f) = self.file.lock() {
            if let Ok(s) = serde_json::to_string(ev) {
                let _ = writeln!(f, "{s}");
            }
        }
    }
}

impl Logger for JsonLogger {
    fn attempt(&self, path: &Path, target: &Target) {
        self.line(&JsonEvent::new("attempt").path(path).target(target));
    }
    fn pushed(&self, path: &Path, target: &Target, bytes: u64) {
        let mut ev = JsonEvent::new("sent").path(path).target(target);
        ev.bytes = Some(bytes);
        self.line(&ev);
    }
    fn failed(&self, path: &Path, target: &Target, err: &PushError) {
        self.line(&JsonEvent::new("failed").path(path).target(target).error(err));
    }
    fn queued(&self, marker: &Path) {
        self.line(&JsonEvent::new("queued").path(marker));
    }
    fn unqueued(&self, marker: &Path) {
        self.line(&JsonEvent::new("unqueued").path(marker));
    }
    fn skipped(&self, err: &PushError) {
        self.line(&JsonEvent::new("skipped").error(err));
    }
    fn not_found(&self, err: &PushError) {
        self.line(&JsonEvent::new("not_found").error(err));
    }
    fn done(&self, report: &BatchReport, seconds: f64) {
        let mut ev = JsonEvent::new("done");
        ev.report = Some(report);
        ev.seconds = Some(seconds);
        self.line(&ev);
    }
}

/// Forwards every event to each inner sink in order
#[derive(Default)]
pub struct FanoutLogger {
    sinks: Vec<Arc<dyn Logger>>,
}

impl FanoutLogger {
    pub fn new(sinks: Vec<Arc<dyn Logger>>) -> Self {
        Self { sinks }
    }
}

impl Logger for FanoutLogger {
    fn attempt(&self, path: &Path, target: &Target) {
        self.sinks.iter().for_each(|s| s.attempt(path, target));
    }
    fn pushed(&self, path: &Path, target: &Target, bytes: u64) {
        self.sinks.iter().for_each(|s| s.pushed(path, target, bytes));
    }
    fn failed(&self, path: &Path, target: &Target, err: &PushError) {
        self.sinks.iter().for_each(|s| s.failed(path, target, err));
    }
    fn queued(&self, marker: &Path) {
        self.sinks.iter().for_each(|s| s.queued(marker));
    }
    fn unqueued(&self, marker: &Path) {
        self.sinks.iter().for_each(|s| s.unqueued(marker));
    }
    fn skipped(&self, err: &PushError) {
        self.sinks.iter().for_each(|s| s.skipped(err));
    }
    fn not_found(&self, err: &PushError) {
        self.sinks.iter().for_each(|s| s.not_found(err));
    }
    fn done(&self, report: &BatchReport, seconds: f64) {
        self.sinks.iter().for_each(|s| s.done(report, seconds));
    }
}
