//! # skiff-transfer — background transfer engine
//!
//! Runs uploads and downloads as background jobs so the caller never
//! blocks on the network:
//! - `types` — job records, status and progress reporting
//! - `manager` — the job table: enqueue, snapshot, observe, cancel
//! - `worker` — per-job task bodies, including recursive transfers
//!
//! Each job owns its protocol client; jobs run concurrently and a
//! failure in one never affects another.

pub mod transfer;

pub use transfer::manager::TransferManager;
pub use transfer::types::{TransferDirection, TransferItem, TransferStatus};
