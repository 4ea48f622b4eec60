//! Filesystem-backed retry queue
//!
//! A pending transfer is a zero-length marker `<base>.queued` in the queue
//! directory. A confirmed retry renames it to `<base>.sent`, which is never
//! looked at again.

use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use crate::error::{PushError, Result};
use crate::naming::StationPattern;

pub const LOCK_FILE_NAME: &str = ".stationpush.lock";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Pending,
    Sent,
}

#[derive(Debug, Clone)]
pub struct QueueEntry {
    /// Original file name, queue suffix stripped
    pub base_name: String,
    pub marker: PathBuf,
    pub state: EntryState,
    /// Marker mtime, if it could be read
    pub created: Option<DateTime<Utc>>,
}

/// Result of scanning the queue directory
#[derive(Debug, Default)]
pub struct QueueScan {
    pub pending: Vec<QueueEntry>,
    /// Queued markers whose base name breaks the naming convention
    pub skipped: Vec<String>,
}

pub struct QueueStore {
    dir: PathBuf,
    naming: StationPattern,
    dry_run: bool,
}

impl QueueStore {
    pub fn open(dir: impl Into<PathBuf>, naming: StationPattern, dry_run: bool) -> Result<Self> {
        let dir = dir.into();
        match fs::metadata(&dir) {
            Ok(m) if m.is_dir() => {}
            Ok(_) => {
                return Err(PushError::storage(
                    &dir,
                    io::Error::new(io::ErrorKind::Other, "not a directory"),
                ))
            }
            Err(e) => return Err(PushError::storage(&dir, e)),
        }
        Ok(Self {
            dir,
            naming,
            dry_run,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn naming(&self) -> &StationPattern {
        &self.naming
    }

    /// Record a pending transfer for `source`. Re-enqueuing the same base
    /// name truncates the existing marker instead of adding another.
    pub fn enqueue(&self, source: &Path) -> Result<QueueEntry> {
        let base_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                PushError::Config(format!("{} has no file name", source.display()))
            })?;
        let marker = self.dir.join(self.naming.queued_name(&base_name));

        if self.dry_run {
            return Ok(QueueEntry {
                base_name,
                marker,
                state: EntryState::Pending,
                created: None,
            });
        }

        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&marker)
            .map_err(|e| PushError::storage(&self.dir, e))?;

        Ok(QueueEntry {
            created: modified(&marker),
            base_name,
            marker,
            state: EntryState::Pending,
        })
    }

    pub fn list_pending(&self) -> Result<QueueScan> {
        let rd = fs::read_dir(&self.dir).map_err(|e| PushError::storage(&self.dir, e))?;
        let mut scan = QueueScan::default();

        for entry in rd {
            let entry = entry.map_err(|e| PushError::storage(&self.dir, e))?;
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(base) = self.naming.strip_queued(&name) else {
                continue;
            };
            if !self.naming.matches(base) {
                scan.skipped.push(name);
                continue;
            }
            let marker = entry.path();
            scan.pending.push(QueueEntry {
                base_name: base.to_string(),
                created: modified(&marker),
                marker,
                state: EntryState::Pending,
            });
        }

        scan.pending.sort_by(|a, b| a.base_name.cmp(&b.base_name));
        scan.skipped.sort();
        Ok(scan)
    }

    /// Rename the pending marker to its terminal `.sent` name. No-op in dry-run.
    pub fn mark_sent(&self, entry: &QueueEntry) -> Result<QueueEntry> {
        let sent = self.dir.join(self.naming.sent_name(&entry.base_name));
        if !self.dry_run {
            fs::rename(&entry.marker, &sent).map_err(|e| PushError::storage(&self.dir, e))?;
        }
        Ok(QueueEntry {
            base_name: entry.base_name.clone(),
            created: entry.created,
            marker: sent,
            state: EntryState::Sent,
        })
    }

    /// Take the advisory run lock. A lock file older than `stale_after` is
    /// assumed to belong to a dead run and is taken over.
    pub fn lock(&self, stale_after: Duration) -> Result<QueueLock> {
        let path = self.dir.join(LOCK_FILE_NAME);
        let token = lock_token();
        match create_lock(&path, &token) {
            Ok(()) => return Ok(QueueLock { path, token }),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
            Err(e) => return Err(PushError::storage(&self.dir, e)),
        }

        let age = fs::metadata(&path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| SystemTime::now().duration_since(t).ok());
        let stale = match age {
            Some(age) if age > stale_after => age,
            _ => return Err(PushError::QueueLocked { path }),
        };
        let owner = fs::read_to_string(&path).unwrap_or_default();

        // Only one contender can rename a given lock file away
        let aside = self.dir.join(format!("{LOCK_FILE_NAME}.{token}"));
        match fs::rename(&path, &aside) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PushError::QueueLocked { path })
            }
            Err(e) => return Err(PushError::storage(&self.dir, e)),
        }
        if fs::read_to_string(&aside).unwrap_or_default() != owner {
            // Someone else took it over between our check and the rename
            let _ = fs::rename(&aside, &path);
            return Err(PushError::QueueLocked { path });
        }
        let _ = fs::remove_file(&aside);

        tracing::warn!(
            "took over stale queue lock {} held by {} (age {}s)",
            path.display(),
            owner.trim(),
            stale.as_secs()
        );
        create_lock(&path, &token).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => PushError::QueueLocked { path: path.clone() },
            _ => PushError::storage(&self.dir, e),
        })?;
        Ok(QueueLock { path, token })
    }
}

/// `<pid>-<nanos>`, unique per lock attempt
fn lock_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("{}-{}", std::process::id(), nanos)
}

fn create_lock(path: &Path, token: &str) -> io::Result<()> {
    let mut f = OpenOptions::new().write(true).create_new(true).open(path)?;
    writeln!(f, "{token}")?;
    Ok(())
}

fn modified(path: &Path) -> Option<DateTime<Utc>> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .map(DateTime::<Utc>::from)
}

/// Held for the duration of a queued run; removes the lock file on drop
#[derive(Debug)]
pub struct QueueLock {
    path: PathBuf,
    token: String,
}

impl QueueLock {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        // Leave a lock that was taken over by another run alone
        match fs::read_to_string(&self.path) {
            Ok(owner) if owner.trim() == self.token => {
                let _ = fs::remove_file(&self.path);
            }
            Ok(_) => tracing::warn!("queue lock {} was taken over", self.path.display()),
            Err(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RUV: &str = "RDLm_BFCV_2012_01_17_0900.ruv";

    fn store(dir: &Path) -> QueueStore {
        QueueStore::open(dir, StationPattern::default(), false).unwrap()
    }

    fn names(dir: &Path) -> Vec<String> {
        let mut v: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        v.sort();
        v
    }

    #[test]
    fn open_missing_dir_is_storage_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let err = QueueStore::open(tmp.path().join("nope"), StationPattern::default(), false)
            .err()
            .unwrap();
        assert!(matches!(err, PushError::StorageUnavailable { .. }));
    }

    #[test]
    fn enqueue_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let q = store(tmp.path());
        let src = Path::new("/data/radials").join(RUV);

        let entry = q.enqueue(&src).unwrap();
        q.enqueue(&src).unwrap();

        assert_eq!(entry.base_name, RUV);
        assert_eq!(entry.state, EntryState::Pending);
        assert_eq!(names(tmp.path()), vec![format!("{RUV}.queued")]);
        assert_eq!(fs::metadata(&entry.marker).unwrap().len(), 0);
    }

    #[test]
    fn listing_separates_mismatches() {
        let tmp = tempfile::tempdir().unwrap();
        let q = store(tmp.path());
        for n in [
            format!("{RUV}.queued"),
            "notes.txt.queued".to_string(),
            "RDLm_BFCV_2012_01_16_2300.ruv.sent".to_string(),
            "README".to_string(),
            "CSS_BFCV_2012_01_17_0900.cs4.queued".to_string(),
        ] {
            fs::write(tmp.path().join(n), b"").unwrap();
        }

        let scan = q.list_pending().unwrap();
        let pending: Vec<&str> = scan.pending.iter().map(|e| e.base_name.as_str()).collect();
        assert_eq!(pending, vec!["CSS_BFCV_2012_01_17_0900.cs4", RUV]);
        assert_eq!(scan.skipped, vec!["notes.txt.queued".to_string()]);
    }

    #[test]
    fn mark_sent_renames_marker() {
        let tmp = tempfile::tempdir().unwrap();
        let q = store(tmp.path());
        let entry = q.enqueue(Path::new(RUV)).unwrap();

        let sent = q.mark_sent(&entry).unwrap();
        assert_eq!(sent.state, EntryState::Sent);
        assert_eq!(names(tmp.path()), vec![format!("{RUV}.sent")]);
    }

    #[test]
    fn dry_run_touches_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let q = QueueStore::open(tmp.path(), StationPattern::default(), true).unwrap();
        let entry = q.enqueue(Path::new(RUV)).unwrap();
        assert!(names(tmp.path()).is_empty());

        fs::write(&entry.marker, b"").unwrap();
        q.mark_sent(&entry).unwrap();
        assert_eq!(names(tmp.path()), vec![format!("{RUV}.queued")]);
    }

    #[test]
    fn lock_is_exclusive_and_released() {
        let tmp = tempfile::tempdir().unwrap();
        let q = store(tmp.path());
        let stale = Duration::from_secs(3600);

        let held = q.lock(stale).unwrap();
        assert!(held.path().exists());
        assert!(matches!(q.lock(stale), Err(PushError::QueueLocked { .. })));

        drop(held);
        assert!(!tmp.path().join(LOCK_FILE_NAME).exists());
        let _again = q.lock(stale).unwrap();
    }

    #[test]
    fn stale_lock_is_taken_over() {
        let tmp = tempfile::tempdir().unwrap();
        let q = store(tmp.path());
        fs::write(tmp.path().join(LOCK_FILE_NAME), b"1\n").unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let lock = q.lock(Duration::from_millis(1)).unwrap();
        assert!(lock.path().exists());
    }

    #[test]
    fn taken_over_lock_is_not_removed_by_old_holder() {
        let tmp = tempfile::tempdir().unwrap();
        let q = store(tmp.path());
        let old = q.lock(Duration::from_secs(3600)).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        let new = q.lock(Duration::from_millis(1)).unwrap();
        drop(old);
        assert!(new.path().exists());
        assert!(matches!(
            q.lock(Duration::from_secs(3600)),
            Err(PushError::QueueLocked { .. })
        ));

        drop(new);
        assert!(names(tmp.path()).is_empty());
    }

    #[test]
    fn lock_file_is_not_a_queue_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let q = store(tmp.path());
        let _lock = q.lock(Duration::from_secs(60)).unwrap();
        let scan = q.list_pending().unwrap();
        assert!(scan.pending.is_empty());
        assert!(scan.skipped.is_empty());
    }
}
