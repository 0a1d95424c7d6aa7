//! # skiff-ftp — FTP / FTPS transfer clients
//!
//! FTP protocol support for the transfer subsystem:
//! - **RFC 959** core commands over an async control channel
//! - **RFC 3659** — MLSD machine-readable listings, SIZE, MDTM
//! - **RFC 2228 / 4217** — explicit AUTH TLS with PROT P data channels
//!
//! Architecture:
//! - `codec` — control-channel command/reply codec
//! - `connection` — TCP transport with the timeout policy
//! - `tls` — connector construction and plain→TLS upgrade
//! - `data` — passive (PASV) and active (PORT) data channels
//! - `parser` — MLSD fact-line parsing
//! - `client` — the stateful `FtpClient`
//! - `ftps` — `FtpsClient`, composing `FtpClient` in TLS mode

pub mod ftp;

pub use ftp::client::FtpClient;
pub use ftp::ftps::FtpsClient;
