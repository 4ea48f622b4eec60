//! Command-line surface

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::PushConfig;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Push station data files over SFTP, queueing failures for later retry"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// TOML configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Remote host, [sftp://][user@]host[:port] (repeatable)
    #[arg(long = "host", action = ArgAction::Append, global = true)]
    pub hosts: Vec<String>,

    /// Remote destination directory (one for all hosts, or one per host)
    #[arg(long = "dest-dir", action = ArgAction::Append, global = true)]
    pub dest_dirs: Vec<String>,

    /// SSH port for hosts that do not name one
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Remote user
    #[arg(short, long, global = true)]
    pub user: Option<String>,

    /// Private key file (ssh-agent is used when absent)
    #[arg(short = 'k', long, global = true)]
    pub key_file: Option<PathBuf>,

    /// Directory new files are produced in
    #[arg(long, global = true)]
    pub source_dir: Option<PathBuf>,

    /// Directory holding .queued/.sent markers
    #[arg(short = 'q', long, global = true)]
    pub queue_dir: Option<PathBuf>,

    /// Archive tree searched when a queued file left the source directory
    #[arg(short = 'a', long, global = true)]
    pub archive_dir: Option<PathBuf>,

    /// Do not queue failed pushes
    #[arg(long, global = true)]
    pub no_queue: bool,

    /// Mark successfully retried files as sent
    #[arg(long, global = true)]
    pub unqueue: bool,

    /// Rehearse: no network, no file changes
    #[arg(short = 'n', long, alias = "list-only", global = true)]
    pub dry_run: bool,

    /// Station identifier for notifications (default: hostname)
    #[arg(long, global = true)]
    pub station: Option<String>,

    /// Program run after a successful push: <station> <service> <code> <message>
    #[arg(long, global = true)]
    pub notify_command: Option<PathBuf>,

    /// Service tag for notifications
    #[arg(long, global = true)]
    pub service: Option<String>,

    /// Connect and authentication timeout in seconds
    #[arg(long, global = true)]
    pub connect_timeout: Option<u64>,

    /// Max archive entries visited per lookup (0 = unlimited)
    #[arg(long, global = true)]
    pub scan_limit: Option<usize>,

    /// More console output (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Console log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Append JSON-lines events to this file
    #[arg(long = "log-file", global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Push one file; queue it if the push fails
    Push {
        file: PathBuf,
    },
    /// Retry every queued file
    Retry,
    /// Pull one remote file from the first host
    Fetch {
        remote: PathBuf,

        /// Local directory to write into
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

impl Args {
    /// Layer command-line values over `cfg`
    pub fn apply(&self, cfg: &mut PushConfig) {
        if !self.hosts.is_empty() {
            cfg.hosts = self.hosts.clone();
        }
        if !self.dest_dirs.is_empty() {
            cfg.dest_dirs = self.dest_dirs.clone();
        }
        if let Some(p) = self.port {
            cfg.port = p;
        }
        if let Some(ref u) = self.user {
            cfg.user = u.clone();
        }
        if self.key_file.is_some() {
            cfg.key_file = self.key_file.clone();
        }
        if self.source_dir.is_some() {
            cfg.source_dir = self.source_dir.clone();
        }
        if let Some(ref q) = self.queue_dir {
            cfg.queue_dir = q.clone();
        }
        if self.archive_dir.is_some() {
            cfg.archive_dir = self.archive_dir.clone();
        }
        if self.no_queue {
            cfg.queue = false;
        }
        if self.unqueue {
            cfg.unqueue = true;
        }
        if self.dry_run {
            cfg.dry_run = true;
        }
        if let Some(ref s) = self.station {
            cfg.station = s.clone();
        }
        if self.notify_command.is_some() {
            cfg.notify.command = self.notify_command.clone();
        }
        if let Some(ref s) = self.service {
            cfg.notify.service = s.clone();
        }
        if let Some(t) = self.connect_timeout {
            cfg.connect_timeout_secs = t;
        }
        if let Some(n) = self.scan_limit {
            cfg.scan_limit = n;
        }
        if let Some(ref l) = self.log_level {
            cfg.logging.level = l.clone();
        } else if self.verbose > 0 {
            cfg.logging.level = if self.verbose == 1 { "debug" } else { "trace" }.to_string();
        }
        if self.log_file.is_some() {
            cfg.logging.file = self.log_file.clone();
        }
    }
}
