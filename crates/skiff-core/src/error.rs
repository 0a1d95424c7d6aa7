//! Categorised error type shared by every `TransferClient`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An error raised by a protocol client or the transfer engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientError {
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorKind {
    /// Any failure during `connect()` — DNS, TCP, TLS, authentication,
    /// host-key rejection, or an unsupported policy.
    ConnectionFailed,
    /// Operation attempted without an active session.
    NotConnected,
    /// The server rejected a listing / rename / delete / mkdir / stat
    /// request, or replied with something un-parseable.
    RemoteOperation,
    /// The cancellation token was observed mid-transfer.
    Interrupted,
    /// Feature or protocol declared but not implemented.
    Unsupported,
    /// Local I/O failure (file read/write).
    Io,
}

pub type ClientResult<T> = Result<T, ClientError>;

// ── Construction helpers ─────────────────────────────────────────────

impl ClientError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            kind,
            message: msg.into(),
        }
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConnectionFailed, msg)
    }

    pub fn not_connected() -> Self {
        Self::new(ErrorKind::NotConnected, "Not connected")
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteOperation, msg)
    }

    pub fn interrupted() -> Self {
        Self::new(ErrorKind::Interrupted, "Transfer cancelled")
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, msg)
    }

    /// Re-wrap any error as a `ConnectionFailed` with cause context,
    /// preserving an `Interrupted` untouched.
    pub fn into_connection_failed(self, context: &str) -> Self {
        match self.kind {
            ErrorKind::ConnectionFailed | ErrorKind::Interrupted => self,
            _ => Self::connection_failed(format!("{}: {}", context, self.message)),
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for ClientError {}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}
