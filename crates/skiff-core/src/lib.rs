//! # skiff-core — shared model for the transfer subsystem
//!
//! Everything the protocol crates and the transfer manager have in
//! common:
//! - `types` — connection parameters and remote directory entries
//! - `error` — the categorised client error taxonomy
//! - `client` — the `TransferClient` capability trait and progress
//!   callback contract
//! - `path` — small POSIX path helpers shared by every protocol

pub mod client;
pub mod error;
pub mod path;
pub mod types;

pub use client::{ProgressFn, TransferClient};
pub use error::{ClientError, ClientResult, ErrorKind};
pub use types::{ConnectionInfo, HostKeyPolicy, Protocol, RemoteFile};
