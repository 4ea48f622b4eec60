//! Configuration for stationpush.
//!
//! Every recognized option lives in [`PushConfig`] with its default. A TOML
//! file may set any subset; command-line flags are applied on top and the
//! result is checked once with [`PushConfig::validate`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::client::{Credentials, Target};
use crate::error::{PushError, Result};
use crate::naming::{StationPattern, DEFAULT_FILE_PATTERN, DEFAULT_QUEUED_SUFFIX, DEFAULT_SENT_SUFFIX};
use crate::url::{parse_host, DEFAULT_SSH_PORT};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Station identifier used in notifications
    pub station: String,
    /// Remote hosts, `[sftp://][user@]host[:port]`
    pub hosts: Vec<String>,
    /// One destination for all hosts, or one per host
    pub dest_dirs: Vec<String>,
    pub port: u16,
    pub user: String,
    pub key_file: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passphrase: Option<String>,

    pub source_dir: Option<PathBuf>,
    pub queue_dir: PathBuf,
    pub archive_dir: Option<PathBuf>,

    pub file_pattern: String,
    pub queued_suffix: String,
    pub sent_suffix: String,

    /// Enqueue failed single pushes
    pub queue: bool,
    /// Mark successful retries as sent
    pub unqueue: bool,
    pub dry_run: bool,

    pub connect_timeout_secs: u64,
    /// Max archive entries visited per lookup (0 = unlimited)
    pub scan_limit: usize,
    pub lock_stale_secs: u64,

    pub notify: NotifyConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Program run after a successful single push
    pub command: Option<PathBuf>,
    pub service: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `error`, `warn`, `info`, `debug` or `trace`
    pub level: String,
    /// JSON-lines event log
    pub file: Option<PathBuf>,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            station: default_station(),
            hosts: Vec::new(),
            dest_dirs: Vec::new(),
            port: DEFAULT_SSH_PORT,
            user: default_user(),
            key_file: None,
            passphrase: None,
            source_dir: None,
            queue_dir: PathBuf::from("queued"),
            archive_dir: None,
            file_pattern: DEFAULT_FILE_PATTERN.to_string(),
            queued_suffix: DEFAULT_QUEUED_SUFFIX.to_string(),
            sent_suffix: DEFAULT_SENT_SUFFIX.to_string(),
            queue: true,
            unqueue: false,
            dry_run: false,
            connect_timeout_secs: 60,
            scan_limit: 500_000,
            lock_stale_secs: 6 * 3600,
            notify: NotifyConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            command: None,
            service: "stationpush".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

fn default_station() -> String {
    hostname::get()
        .ok()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unknown".to_string())
}

fn default_user() -> String {
    std::env::var("USER").unwrap_or_else(|_| "root".to_string())
}

impl PushConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = fs::read_to_string(path)?;
        Ok(toml::from_str(&data)?)
    }

    /// Checks required inputs and compiles derived settings
    pub fn validate(&self) -> Result<()> {
        self.targets()?;
        self.naming()?;
        if self.queued_suffix.is_empty() || self.sent_suffix.is_empty() {
            return Err(PushError::Config("queue suffixes must not be empty".into()));
        }
        if self.queued_suffix == self.sent_suffix {
            return Err(PushError::Config(
                "queued and sent suffixes must differ".into(),
            ));
        }
        if !matches!(
            self.logging.level.as_str(),
            "error" | "warn" | "info" | "debug" | "trace"
        ) {
            return Err(PushError::Config(format!(
                "unknown log level {}",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// Pair hosts with destination directories
    pub fn targets(&self) -> Result<Vec<Target>> {
        if self.hosts.is_empty() {
            return Err(PushError::Config("no remote host given".into()));
        }
        if self.dest_dirs.is_empty() {
            return Err(PushError::Config("no destination directory given".into()));
        }
        if self.dest_dirs.len() != 1 && self.dest_dirs.len() != self.hosts.len() {
            return Err(PushError::Config(format!(
                "{} destination directories for {} hosts",
                self.dest_dirs.len(),
                self.hosts.len()
            )));
        }

        self.hosts
            .iter()
            .enumerate()
            .map(|(i, h)| -> Result<Target> {
                let spec = parse_host(h, self.port)
                    .ok_or_else(|| PushError::Config(format!("bad host {h}")))?;
                let dest_dir = self.dest_dirs.get(i).unwrap_or(&self.dest_dirs[0]).clone();
                Ok(Target {
                    endpoint: spec.endpoint,
                    dest_dir,
                })
            })
            .collect()
    }

    /// Credentials; a `user@` on the first host overrides `user`
    pub fn credentials(&self) -> Credentials {
        let user = self
            .hosts
            .first()
            .and_then(|h| parse_host(h, self.port))
            .and_then(|s| s.user)
            .unwrap_or_else(|| self.user.clone());
        Credentials {
            user,
            key_file: self.key_file.clone(),
            passphrase: self.passphrase.clone(),
        }
    }

    pub fn naming(&self) -> Result<StationPattern> {
        StationPattern::new(&self.file_pattern, &self.queued_suffix, &self.sent_suffix)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_secs)
    }
}
