//! Single-file SFTP transfers
//!
//! One connection per call, one file per connection. Retry policy lives in
//! the engine; a client only reports what happened.

use anyhow::Context;
use std::fs::File;
use std::io::{self, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::path::{Path, PathBuf};
use std::time::Duration;

use ssh2::Session;

use crate::error::PushError;
use crate::url::Endpoint;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Who to authenticate as; agent auth is used when no key file is set
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub key_file: Option<PathBuf>,
    pub passphrase: Option<String>,
}

/// One remote destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub endpoint: Endpoint,
    pub dest_dir: String,
}

impl std::fmt::Display for Target {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.endpoint, self.dest_dir)
    }
}

/// A single transfer attempt. For a push `source` is local and `dest_dir`
/// remote; for a pull it is the other way around.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub source: PathBuf,
    pub dest_dir: PathBuf,
    pub endpoint: Endpoint,
    pub credentials: Credentials,
    pub dest_name: Option<String>,
}

impl TransferRequest {
    pub fn new(
        source: impl Into<PathBuf>,
        dest_dir: impl Into<PathBuf>,
        endpoint: Endpoint,
        credentials: Credentials,
    ) -> Self {
        Self {
            source: source.into(),
            dest_dir: dest_dir.into(),
            endpoint,
            credentials,
            dest_name: None,
        }
    }

    pub fn with_dest_name(mut self, name: impl Into<String>) -> Self {
        self.dest_name = Some(name.into());
        self
    }

    /// Destination file name: the explicit name, else the source basename
    pub fn file_name(&self) -> String {
        match &self.dest_name {
            Some(n) => n.clone(),
            None => self
                .source
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    /// `dest_dir/<name>` as a remote (POSIX) path. Always explicit, never
    /// relative to a session working directory.
    pub fn remote_path(&self) -> String {
        let dir = self.dest_dir.to_string_lossy();
        format!("{}/{}", dir.trim_end_matches('/'), self.file_name())
    }

    /// `dest_dir/<name>` as a local path (pull)
    pub fn local_path(&self) -> PathBuf {
        self.dest_dir.join(self.file_name())
    }
}

/// Result of one attempt
#[derive(Debug)]
pub struct TransferOutcome {
    pub bytes: u64,
    pub error: Option<PushError>,
}

impl TransferOutcome {
    pub fn sent(bytes: u64) -> Self {
        Self { bytes, error: None }
    }

    pub fn failed(error: PushError) -> Self {
        Self {
            bytes: 0,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

pub trait TransferClient {
    fn push(&self, request: &TransferRequest) -> TransferOutcome;
    fn pull(&self, request: &TransferRequest) -> TransferOutcome;
}

/// libssh2-backed client
pub struct SftpClient {
    connect_timeout: Duration,
}

impl SftpClient {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    fn connect(&self, endpoint: &Endpoint, creds: &Credentials) -> Result<Session, PushError> {
        let fail = |message: String| PushError::Connection {
            endpoint: endpoint.to_string(),
            message,
        };

        let addr = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|e| fail(e.to_string()))?
            .next()
            .ok_or_else(|| fail("host did not resolve".to_string()))?;
        let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| fail(e.to_string()))?;

        let mut sess = Session::new().map_err(|e| fail(e.to_string()))?;
        sess.set_tcp_stream(tcp);
        // Bounds handshake and auth only
        sess.set_timeout(self.connect_timeout.as_millis().min(u32::MAX as u128) as u32);
        sess.handshake().map_err(|e| fail(e.to_string()))?;

        match &creds.key_file {
            Some(key) => {
                sess.userauth_pubkey_file(&creds.user, None, key, creds.passphrase.as_deref())
            }
            None => sess.userauth_agent(&creds.user),
        }
        .map_err(|e| fail(e.to_string()))?;
        if !sess.authenticated() {
            return Err(fail(format!("authentication rejected for {}", creds.user)));
        }

        // Data transfer relies on SSH flow control, not a timer
        sess.set_timeout(0);
        Ok(sess)
    }
}

impl Default for SftpClient {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

impl TransferClient for SftpClient {
    fn push(&self, request: &TransferRequest) -> TransferOutcome {
        let mut local = match File::open(&request.source) {
            Ok(f) => f,
            Err(e) => {
                return TransferOutcome::failed(PushError::Transfer {
                    path: request.source.clone(),
                    message: format!("open {}: {e}", request.source.display()),
                })
            }
        };
        let sess = match self.connect(&request.endpoint, &request.credentials) {
            Ok(s) => s,
            Err(e) => return TransferOutcome::failed(e),
        };
        let remote = request.remote_path();

        let result: anyhow::Result<u64> = (|| {
            let sftp = sess.sftp().context("open sftp channel")?;
            let mut file = sftp
                .create(Path::new(&remote))
                .with_context(|| format!("create remote {remote}"))?;
            let bytes = io::copy(&mut local, &mut file)
                .with_context(|| format!("write remote {remote}"))?;
            file.flush().with_context(|| format!("flush remote {remote}"))?;
            Ok(bytes)
        })();
        let _ = sess.disconnect(None, "done", None);

        match result {
            Ok(bytes) => {
                tracing::debug!(remote = %remote, bytes, "pushed");
                TransferOutcome::sent(bytes)
            }
            Err(e) => TransferOutcome::failed(PushError::Transfer {
                path: request.source.clone(),
                message: format!("{e:#}"),
            }),
        }
    }

    fn pull(&self, request: &TransferRequest) -> TransferOutcome {
        let sess = match self.connect(&request.endpoint, &request.credentials) {
            Ok(s) => s,
            Err(e) => return TransferOutcome::failed(e),
        };
        let local_path = request.local_path();

        let result: anyhow::Result<u64> = (|| {
            let sftp = sess.sftp().context("open sftp channel")?;
            let mut remote = sftp
                .open(&request.source)
                .with_context(|| format!("open remote {}", request.source.display()))?;
            let mut local = File::create(&local_path)
                .with_context(|| format!("create {}", local_path.display()))?;
            let bytes = io::copy(&mut remote, &mut local)
                .with_context(|| format!("write {}", local_path.display()))?;
            local.flush()?;
            Ok(bytes)
        })();
        let _ = sess.disconnect(None, "done", None);

        match result {
            Ok(bytes) => {
                tracing::debug!(local = %local_path.display(), bytes, "pulled");
                TransferOutcome::sent(bytes)
            }
            Err(e) => TransferOutcome::failed(PushError::Transfer {
                path: request.source.clone(),
                message: format!("{e:#}"),
            }),
        }
    }
}

/// Rehearsal client: never dials out, every attempt fails with `DryRun`
#[derive(Debug, Default)]
pub struct DryRunClient;

impl TransferClient for DryRunClient {
    fn push(&self, request: &TransferRequest) -> TransferOutcome {
        tracing::info!(
            "dry run: would push {} to {}:{}",
            request.source.display(),
            request.endpoint,
            request.remote_path()
        );
        TransferOutcome::failed(PushError::DryRun)
    }

    fn pull(&self, request: &TransferRequest) -> TransferOutcome {
        tracing::info!(
            "dry run: would pull {}:{} to {}",
            request.endpoint,
            request.source.display(),
            request.local_path().display()
        );
        TransferOutcome::failed(PushError::DryRun)
    }
}
