//! Stationpush library
//!
//! Push station data files over SFTP and keep a durable queue of failed
//! transfers for later retry.

pub mod cli;
pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod locate;
pub mod logger;
pub mod naming;
pub mod notify;
pub mod queue;
pub mod url;

pub use error::{PushError, Result};
