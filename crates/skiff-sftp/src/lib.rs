//! # skiff-sftp — SFTP transfer client
//!
//! SFTP support built on libssh2 (`ssh2` crate):
//! - `hostkey` — known-hosts verification with the configured policy
//! - `auth` — layered authentication (agent, key file, default keys,
//!   password, keyboard-interactive)
//! - `client` — the stateful `SftpClient`
//!
//! libssh2 calls are blocking; operations run them directly inside the
//! async methods, which the transfer engine isolates onto worker tasks.

pub mod sftp;

pub use sftp::client::SftpClient;
