//! Transfer-and-retry engine
//!
//! A failed single push leaves a `.queued` marker behind. A queued run walks
//! those markers, finds each file again (source directory, then archive),
//! retries it and, when asked to, turns the marker into `.sent`.

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::client::{Credentials, Target, TransferClient, TransferOutcome, TransferRequest};
use crate::error::{PushError, Result};
use crate::locate::FileLocator;
use crate::logger::Logger;
use crate::queue::QueueStore;

/// Behavior switches for one engine
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Enqueue failed single pushes
    pub queue: bool,
    /// Rename markers to `.sent` after a successful retry
    pub unqueue: bool,
    pub dry_run: bool,
    pub lock_stale_after: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            queue: true,
            unqueue: false,
            dry_run: false,
            lock_stale_after: Duration::from_secs(6 * 3600),
        }
    }
}

/// Counters for one queued run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Markers that matched the naming convention
    pub pending: usize,
    /// Markers left alone because of their name
    pub skipped: usize,
    pub not_found: usize,
    pub attempted: usize,
    pub sent: usize,
    pub failed: usize,
    pub unqueued: usize,
}

pub struct TransferEngine {
    client: Box<dyn TransferClient>,
    queue: Option<QueueStore>,
    locator: FileLocator,
    targets: Vec<Target>,
    credentials: Credentials,
    logger: Arc<dyn Logger>,
    options: EngineOptions,
}

impl TransferEngine {
    pub fn new(
        client: Box<dyn TransferClient>,
        queue: Option<QueueStore>,
        locator: FileLocator,
        targets: Vec<Target>,
        credentials: Credentials,
        logger: Arc<dyn Logger>,
        options: EngineOptions,
    ) -> Self {
        Self {
            client,
            queue,
            locator,
            targets,
            credentials,
            logger,
            options,
        }
    }

    pub fn queue(&self) -> Option<&QueueStore> {
        self.queue.as_ref()
    }

    /// Push `path` once to every target. On failure the file is queued for a
    /// later `queued_push`; the only `Err` is an unusable queue directory.
    pub fn single_push(&self, path: &Path) -> Result<TransferOutcome> {
        let outcome = self.push_to_targets(path);
        if outcome.is_success() || !self.options.queue {
            return Ok(outcome);
        }
        match &self.queue {
            Some(queue) => {
                let entry = queue.enqueue(path)?;
                if self.options.dry_run {
                    tracing::info!("dry run: would queue {}", entry.marker.display());
                } else {
                    self.logger.queued(&entry.marker);
                }
            }
            None => tracing::warn!("no queue directory; {} will not be retried", path.display()),
        }
        Ok(outcome)
    }

    /// Retry every pending marker. Entries are independent: a missing file or
    /// failed retry leaves that marker pending and moves on.
    pub fn queued_push(&self, source_dir: &Path, archive_dir: Option<&Path>) -> Result<BatchReport> {
        let start = Instant::now();
        let queue = self
            .queue
            .as_ref()
            .ok_or_else(|| PushError::Config("queued mode needs a queue directory".into()))?;
        let _lock = if self.options.dry_run {
            None
        } else {
            Some(queue.lock(self.options.lock_stale_after)?)
        };

        let scan = queue.list_pending()?;
        let mut report = BatchReport {
            pending: scan.pending.len(),
            skipped: scan.skipped.len(),
            ..BatchReport::default()
        };
        for name in scan.skipped {
            self.logger.skipped(&PushError::NamingMismatch { name });
        }

        for entry in &scan.pending {
            let Some(path) = self.locator.locate(&entry.base_name, source_dir, archive_dir) else {
                report.not_found += 1;
                self.logger.not_found(&PushError::NotFound {
                    name: entry.base_name.clone(),
                });
                continue;
            };

            report.attempted += 1;
            let outcome = self.push_to_targets(&path);
            if !outcome.is_success() {
                report.failed += 1;
                continue;
            }
            report.sent += 1;

            if self.options.unqueue && !self.options.dry_run {
                let sent = queue.mark_sent(entry)?;
                report.unqueued += 1;
                self.logger.unqueued(&sent.marker);
            }
        }

        self.logger.done(&report, start.elapsed().as_secs_f64());
        Ok(report)
    }

    /// Pull `remote` from the first target's server into `local_dir`
    pub fn fetch(&self, remote: &Path, local_dir: &Path) -> TransferOutcome {
        let Some(target) = self.targets.first() else {
            return TransferOutcome::failed(PushError::Config("no remote host configured".into()));
        };
        let request = TransferRequest::new(
            remote,
            local_dir,
            target.endpoint.clone(),
            self.credentials.clone(),
        );
        self.logger.attempt(remote, target);
        let outcome = if self.options.dry_run {
            tracing::info!("dry run: would pull {}:{}", target.endpoint, remote.display());
            TransferOutcome::failed(PushError::DryRun)
        } else {
            self.client.pull(&request)
        };
        match &outcome.error {
            None => self.logger.pushed(remote, target, outcome.bytes),
            Some(e) => self.logger.failed(remote, target, e),
        }
        outcome
    }

    /// One attempt per target; fails if any target failed, keeping the
    /// first error. Dry-run never reaches the client.
    fn push_to_targets(&self, path: &Path) -> TransferOutcome {
        if self.options.dry_run {
            for target in &self.targets {
                tracing::info!("dry run: would push {} to {}", path.display(), target);
            }
            return TransferOutcome::failed(PushError::DryRun);
        }

        let mut bytes = 0;
        let mut first_error = None;

        for target in &self.targets {
            let request = TransferRequest::new(
                path,
                target.dest_dir.as_str(),
                target.endpoint.clone(),
                self.credentials.clone(),
            );
            self.logger.attempt(path, target);
            let outcome = self.client.push(&request);
            match outcome.error {
                None => {
                    bytes += outcome.bytes;
                    self.logger.pushed(path, target, outcome.bytes);
                }
                Some(e) => {
                    self.logger.failed(path, target, &e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None if self.targets.is_empty() => {
                TransferOutcome::failed(PushError::Config("no remote host configured".into()))
            }
            None => TransferOutcome::sent(bytes),
            Some(e) => TransferOutcome::failed(e),
        }
    }
}
