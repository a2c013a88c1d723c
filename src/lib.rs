//! addon-license - license key administration for paid CMS add-ons
//!
//! Each add-on gets a [`LicenseManager`](client::manager::LicenseManager)
//! that keeps its key in the host's shared license option, registers the
//! add-on with the update checker and the settings page, and runs a weekly
//! license check.
//!
//! Remote license requests are governed by
//! [`NetworkPolicy`](client::api::NetworkPolicy) and are suppressed unless
//! configured otherwise.
//!
//! # Features
//!
//! - `background-jobs` - Drive the cooperative scheduler from a cron job in
//!   long-running processes.
//!
//! # Example
//!
//! ```rust,ignore
//! use addon_license::client::manager::{Addon, LicenseManager};
//! use addon_license::config::AddonLicenseConfig;
//! use addon_license::host::Host;
//!
//! let host = Host::in_memory(AddonLicenseConfig::default());
//! let addon = Addon::new("polylang-pro/polylang.php", "Polylang Pro", "3.6.1", "WP SYNTEX");
//! let license = LicenseManager::register(&host, addon)?;
//! license.lock().await.activate("XXXX-XXXX").await;
//! ```

// Core modules (always available)
pub mod config;
pub mod errors;
pub mod logging;
pub mod slug;

// Host capabilities
pub mod host;

// License management
pub mod client {
    pub mod api;
    pub mod field;
    pub mod manager;
    pub mod responses;

    pub use manager::{Addon, LicenseManager, SharedLicense};
}

// Background jobs (requires "background-jobs" feature)
#[cfg(feature = "background-jobs")]
pub mod jobs;
