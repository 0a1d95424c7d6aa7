//! # skiff-sites — saved connections and settings
//!
//! - `manager` — named connection profiles persisted as JSON, with
//!   passwords handed to the credential backend instead of the file
//! - `settings` — application settings with per-field defaults, so a
//!   missing or stale file never blocks startup

pub mod sites;

pub use sites::manager::{Site, SiteManager};
pub use sites::settings::Settings;
