#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use stationpush::client::{Credentials, Target, TransferClient, TransferOutcome, TransferRequest};
use stationpush::engine::{BatchReport, EngineOptions, TransferEngine};
use stationpush::locate::FileLocator;
use stationpush::logger::Logger;
use stationpush::naming::StationPattern;
use stationpush::queue::QueueStore;
use stationpush::url::Endpoint;
use stationpush::PushError;

pub const RUV: &str = "RDLm_BFCV_2012_01_17_0900.ruv";

/// Stands in for the SFTP server: copies into a local directory tree while
/// `online`, refuses the connection otherwise.
#[derive(Clone)]
pub struct LocalServer {
    pub root: PathBuf,
    pub online: Arc<AtomicBool>,
    pub pushes: Arc<Mutex<Vec<PathBuf>>>,
}

impl LocalServer {
    pub fn new(root: &Path, online: bool) -> Self {
        Self {
            root: root.to_path_buf(),
            online: Arc::new(AtomicBool::new(online)),
            pushes: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn set_online(&self, up: bool) {
        self.online.store(up, Ordering::SeqCst);
    }

    pub fn push_count(&self) -> usize {
        self.pushes.lock().unwrap().len()
    }

    fn remote(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

impl TransferClient for LocalServer {
    fn push(&self, request: &TransferRequest) -> TransferOutcome {
        self.pushes.lock().unwrap().push(request.source.clone());
        if !self.online.load(Ordering::SeqCst) {
            return TransferOutcome::failed(PushError::Connection {
                endpoint: request.endpoint.to_string(),
                message: "Connection refused (os error 111)".into(),
            });
        }
        let dst = self.remote(&request.remote_path());
        let copied = dst
            .parent()
            .map(fs::create_dir_all)
            .transpose()
            .and_then(|_| fs::copy(&request.source, &dst));
        match copied {
            Ok(bytes) => TransferOutcome::sent(bytes),
            Err(e) => TransferOutcome::failed(PushError::Transfer {
                path: request.source.clone(),
                message: e.to_string(),
            }),
        }
    }

    fn pull(&self, request: &TransferRequest) -> TransferOutcome {
        let src = self.remote(&request.source.to_string_lossy());
        match fs::copy(&src, request.local_path()) {
            Ok(bytes) => TransferOutcome::sent(bytes),
            Err(e) => TransferOutcome::failed(PushError::Transfer {
                path: request.source.clone(),
                message: e.to_string(),
            }),
        }
    }
}

/// Collects event names for assertions
#[derive(Default)]
pub struct RecordingLogger {
    pub events: Mutex<Vec<String>>,
}

impl RecordingLogger {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn push(&self, s: String) {
        self.events.lock().unwrap().push(s);
    }
}

impl Logger for RecordingLogger {
    fn pushed(&self, path: &Path, _target: &Target, _bytes: u64) {
        self.push(format!("sent {}", path.file_name().unwrap().to_string_lossy()));
    }
    fn failed(&self, path: &Path, _target: &Target, _err: &PushError) {
        self.push(format!("failed {}", path.file_name().unwrap().to_string_lossy()));
    }
    fn queued(&self, marker: &Path) {
        self.push(format!("queued {}", marker.file_name().unwrap().to_string_lossy()));
    }
    fn unqueued(&self, marker: &Path) {
        self.push(format!("unqueued {}", marker.file_name().unwrap().to_string_lossy()));
    }
    fn skipped(&self, err: &PushError) {
        if let PushError::NamingMismatch { name } = err {
            self.push(format!("skipped {name}"));
        }
    }
    fn not_found(&self, err: &PushError) {
        if let PushError::NotFound { name } = err {
            self.push(format!("not_found {name}"));
        }
    }
    fn done(&self, _report: &BatchReport, _seconds: f64) {
        self.push("done".into());
    }
}

/// Station layout in a temp dir: source/, archive/, queued/ and a fake server
pub struct Station {
    pub tmp: tempfile::TempDir,
    pub server: LocalServer,
    pub logger: Arc<RecordingLogger>,
}

impl Station {
    pub fn new(online: bool) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        for d in ["source", "archive", "queued", "server"] {
            fs::create_dir_all(tmp.path().join(d)).unwrap();
        }
        let server = LocalServer::new(&tmp.path().join("server"), online);
        Self {
            tmp,
            server,
            logger: Arc::new(RecordingLogger::default()),
        }
    }

    pub fn source(&self) -> PathBuf {
        self.tmp.path().join("source")
    }

    pub fn archive(&self) -> PathBuf {
        self.tmp.path().join("archive")
    }

    pub fn queue_dir(&self) -> PathBuf {
        self.tmp.path().join("queued")
    }

    pub fn remote(&self, name: &str) -> PathBuf {
        self.server.root.join("incoming").join(name)
    }

    pub fn produce(&self, name: &str, body: &[u8]) -> PathBuf {
        let p = self.source().join(name);
        fs::write(&p, body).unwrap();
        p
    }

    pub fn engine(&self, options: EngineOptions) -> TransferEngine {
        let queue = QueueStore::open(self.queue_dir(), StationPattern::default(), options.dry_run)
            .unwrap();
        TransferEngine::new(
            Box::new(self.server.clone()),
            Some(queue),
            FileLocator::default(),
            vec![Target {
                endpoint: Endpoint {
                    host: "hub.example.org".into(),
                    port: 22,
                },
                dest_dir: "/incoming".into(),
            }],
            Credentials {
                user: "codar".into(),
                key_file: None,
                passphrase: None,
            },
            self.logger.clone(),
            options,
        )
    }

    pub fn queue_listing(&self) -> Vec<String> {
        listing(&self.queue_dir())
    }
}

pub fn listing(dir: &Path) -> Vec<String> {
    let mut v: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    v.sort();
    v
}

pub fn unqueue() -> EngineOptions {
    EngineOptions {
        unqueue: true,
        ..EngineOptions::default()
    }
}
