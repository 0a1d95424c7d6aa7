//! # skiff-credentials — tiered password storage
//!
//! Passwords are kept out of the site file and stored in the best
//! backend the platform offers:
//! 1. the OS keychain (`keychain`)
//! 2. an AES-256-GCM encrypted vault file (`vault`)
//! 3. nothing — passwords live only for the session (`backend`)
//!
//! The tier is picked once at construction by probing what actually
//! works, not by platform name.

pub mod credentials;

pub use credentials::backend::{Availability, CredentialBackend, Tier};
