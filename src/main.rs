//! stationpush - deliver station data files with a retry queue
//!
//! `push <FILE>` runs once per new file; `retry` runs from cron to drain the
//! queue left behind by failed pushes.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use stationpush::cli::{Args, Command};
use stationpush::client::{DryRunClient, SftpClient, TransferClient};
use stationpush::config::PushConfig;
use stationpush::engine::{EngineOptions, TransferEngine};
use stationpush::locate::FileLocator;
use stationpush::logger::{FanoutLogger, JsonLogger, Logger, TracingLogger};
use stationpush::notify::{notify_pushed, CommandSink, NoopSink, NotificationSink};
use stationpush::queue::QueueStore;

fn main() -> Result<()> {
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted by user. Exiting (Ctrl-C)...");
        // 128 + SIGINT
        std::process::exit(130);
    })
    .expect("Error setting Ctrl-C handler");

    let args = Args::parse();

    let mut cfg = match args.config {
        Some(ref p) => PushConfig::load(p)
            .with_context(|| format!("Failed to load config {}", p.display()))?,
        None => PushConfig::default(),
    };
    args.apply(&mut cfg);
    cfg.validate().context("Invalid configuration")?;

    init_tracing(&cfg.logging.level);
    let logger = build_logger(&cfg);

    if cfg.dry_run {
        tracing::info!("DRY RUN MODE - nothing will be sent, queued or renamed");
    }

    match args.command {
        Command::Push { ref file } => run_push(&cfg, file, logger),
        Command::Retry => run_retry(&cfg, logger),
        Command::Fetch {
            ref remote,
            ref output,
        } => run_fetch(&cfg, remote, output, logger),
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stationpush={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_logger(cfg: &PushConfig) -> Arc<dyn Logger> {
    let mut sinks: Vec<Arc<dyn Logger>> = vec![Arc::new(TracingLogger)];
    if let Some(ref p) = cfg.logging.file {
        if cfg.dry_run {
            tracing::info!("dry run: event log {} not written", p.display());
            return Arc::new(FanoutLogger::new(sinks));
        }
        match JsonLogger::new(p) {
            Ok(l) => sinks.push(Arc::new(l)),
            Err(e) => tracing::warn!("event log {} disabled: {:#}", p.display(), e),
        }
    }
    Arc::new(FanoutLogger::new(sinks))
}

fn build_engine(cfg: &PushConfig, queue: Option<QueueStore>, logger: Arc<dyn Logger>) -> Result<TransferEngine> {
    let client: Box<dyn TransferClient> = if cfg.dry_run {
        Box::new(DryRunClient)
    } else {
        Box::new(SftpClient::new(cfg.connect_timeout()))
    };
    Ok(TransferEngine::new(
        client,
        queue,
        FileLocator::new(cfg.scan_limit),
        cfg.targets()?,
        cfg.credentials(),
        logger,
        EngineOptions {
            queue: cfg.queue,
            unqueue: cfg.unqueue,
            dry_run: cfg.dry_run,
            lock_stale_after: cfg.lock_stale_after(),
        },
    ))
}

fn require_dir(what: &str, dir: Option<&Path>) -> Result<()> {
    match dir {
        None => bail!("{what} directory is required"),
        Some(d) if !d.is_dir() => bail!("{what} directory does not exist: {}", d.display()),
        Some(_) => Ok(()),
    }
}

fn run_push(cfg: &PushConfig, file: &Path, logger: Arc<dyn Logger>) -> Result<()> {
    let queue = if cfg.queue {
        if !cfg.dry_run && !cfg.queue_dir.exists() {
            std::fs::create_dir_all(&cfg.queue_dir).with_context(|| {
                format!("Failed to create queue directory {}", cfg.queue_dir.display())
            })?;
        }
        match QueueStore::open(&cfg.queue_dir, cfg.naming()?, cfg.dry_run) {
            Ok(q) => Some(q),
            Err(e) if cfg.dry_run => {
                tracing::info!("dry run: {e}");
                None
            }
            Err(e) => return Err(e).context("Queue directory unusable"),
        }
    } else {
        None
    };

    let engine = build_engine(cfg, queue, logger)?;
    let outcome = engine.single_push(file).context("Push aborted")?;

    let sink: Box<dyn NotificationSink> = match cfg.notify.command {
        Some(ref prog) => Box::new(CommandSink::new(prog)),
        None => Box::new(NoopSink),
    };
    if let Err(e) = notify_pushed(
        sink.as_ref(),
        &cfg.station,
        &cfg.notify.service,
        file,
        &outcome,
    ) {
        tracing::warn!("notification failed: {:#}", e);
    }
    // A failed push that was queued is not an operational error
    Ok(())
}

fn run_retry(cfg: &PushConfig, logger: Arc<dyn Logger>) -> Result<()> {
    require_dir("source", cfg.source_dir.as_deref())?;
    require_dir("queue", Some(&cfg.queue_dir))?;
    require_dir("archive", cfg.archive_dir.as_deref())?;
    let (Some(source_dir), Some(archive_dir)) = (cfg.source_dir.as_deref(), cfg.archive_dir.as_deref())
    else {
        bail!("source and archive directories are required");
    };

    let queue = QueueStore::open(&cfg.queue_dir, cfg.naming()?, cfg.dry_run)
        .context("Queue directory unusable")?;
    let engine = build_engine(cfg, Some(queue), logger)?;
    let report = engine
        .queued_push(source_dir, Some(archive_dir))
        .context("Queue run aborted")?;

    if report.failed > 0 || report.not_found > 0 {
        tracing::info!(
            "{} file(s) remain queued",
            report.failed + report.not_found
        );
    }
    Ok(())
}

fn run_fetch(cfg: &PushConfig, remote: &Path, output: &Path, logger: Arc<dyn Logger>) -> Result<()> {
    if !output.is_dir() {
        bail!("output directory does not exist: {}", output.display());
    }
    let engine = build_engine(cfg, None, logger)?;
    let outcome = engine.fetch(remote, output);
    match outcome.error {
        None => Ok(()),
        Some(stationpush::PushError::DryRun) => Ok(()),
        Some(e) => Err(e).context("Fetch failed"),
    }
}
