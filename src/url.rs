//! Endpoint parsing for `[sftp://][user@]host[:port]` strings

use std::fmt;

pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Parsed host argument; `user` is only set when the string carried one
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostSpec {
    pub user: Option<String>,
    pub endpoint: Endpoint,
}

pub fn parse_host(s: &str, default_port: u16) -> Option<HostSpec> {
    let s_trim = s.trim();
    let lower = s_trim.to_ascii_lowercase();
    let mut rest = if lower.starts_with("sftp://") {
        &s_trim["sftp://".len()..]
    } else if lower.starts_with("ssh://") {
        &s_trim["ssh://".len()..]
    } else {
        s_trim
    };
    rest = rest.trim_end_matches('/');
    let (user, hp) = match rest.rsplit_once('@') {
        Some((u, h)) if !u.is_empty() => (Some(u.to_string()), h),
        Some((_, h)) => (None, h),
        None => (None, rest),
    };
    if hp.is_empty() || hp.contains('/') {
        return None;
    }
    let (host, port) = match hp.split_once(':') {
        Some((h, pr)) => (h.to_string(), pr.parse().ok()?),
        None => (hp.to_string(), default_port),
    };
    if host.is_empty() {
        return None;
    }
    Some(HostSpec {
        user,
        endpoint: Endpoint { host, port },
    })
}
