//! Configuration for the add-on license manager.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `addon_license.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `ADDON_LICENSE_API_URL` - Default licensing API base URL
//! - `ADDON_LICENSE_NETWORK_POLICY` - `live` or `suppressed`
//! - `ADDON_LICENSE_API_TIMEOUT_SECS` - Remote request timeout in seconds
//! - `ADDON_LICENSE_PERSIST_RESPONSES` - Write remote responses back to the store
//! - `ADDON_LICENSE_SIGNING_SECRET` - HMAC secret for signed requests
//! - `ADDON_LICENSE_SITE_URL` - Site identity sent with every request
//! - `ADDON_LICENSE_STORE_DIR` - Directory for the file-backed option store
//! - `ADDON_LICENSE_RENDER_FIELDS` - Render license rows on the settings page
//! - `ADDON_LICENSE_LOGGING_ENABLED` - Enable logging (true/false)
//! - `ADDON_LICENSE_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::client::api::NetworkPolicy;
use crate::errors::{LicenseError, LicenseResult};
use crate::host::scheduler::Recurrence;

/// Default base URL of the vendor licensing API.
pub const DEFAULT_API_URL: &str = "https://polylang.pro";

/// Name of the shared option holding every add-on license record.
pub const LICENSES_OPTION: &str = "polylang_licenses";

/// Name of the scheduled task that re-validates licenses.
pub const CHECK_LICENSES_HOOK: &str = "polylang_check_licenses";

/// Global configuration singleton.
static CONFIG: OnceLock<AddonLicenseConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddonLicenseConfig {
    /// Remote licensing API
    pub api: ApiConfig,
    /// Identity of the site the add-ons run on
    pub site: SiteConfig,
    /// Persisted option store
    pub store: StoreConfig,
    /// Periodic license check
    pub schedule: ScheduleConfig,
    /// Settings page rendering
    pub settings: SettingsConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Remote licensing API configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL used when an add-on does not supply its own
    pub default_url: String,
    /// Whether remote requests are sent at all
    pub network_policy: NetworkPolicy,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Write `{key, data}` back to the store after a successful response
    pub persist_responses: bool,
    /// HMAC secret; requests are unsigned when empty
    pub signing_secret: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            default_url: DEFAULT_API_URL.to_string(),
            network_policy: NetworkPolicy::Suppressed,
            timeout_secs: 3,
            persist_responses: true,
            signing_secret: String::new(),
        }
    }
}

/// Site identity configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Home URL reported to the licensing API
    pub url: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost".to_string(),
        }
    }
}

/// Option store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Option name of the shared license mapping
    pub option_name: String,
    /// Directory for the file-backed store (platform data dir when empty)
    pub directory: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            option_name: LICENSES_OPTION.to_string(),
            directory: String::new(),
        }
    }
}

impl StoreConfig {
    /// Resolve the directory the file-backed store writes to.
    pub fn resolved_directory(&self) -> Option<PathBuf> {
        if self.directory.is_empty() {
            dirs::data_dir().map(|p| p.join("addon-license"))
        } else {
            Some(PathBuf::from(&self.directory))
        }
    }
}

/// Periodic check configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Task name the check handler is registered under
    pub hook: String,
    /// How often the task recurs
    pub recurrence: Recurrence,
    /// Cron expression for the background poller (`background-jobs` feature)
    pub poll_cron: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hook: CHECK_LICENSES_HOOK.to_string(),
            recurrence: Recurrence::Weekly,
            // Every 15 minutes
            poll_cron: "0 */15 * * * *".to_string(),
        }
    }
}

/// Settings page configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsConfig {
    /// Render license rows; rows are hidden when false
    pub render_fields: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Enable logging
    pub enabled: bool,
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            level: "info".to_string(),
        }
    }
}

fn env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse::<T>().ok())
}

impl AddonLicenseConfig {
    /// Load configuration from file and environment, bypassing the cache.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `addon_license.toml` file (optional)
    /// 3. Environment variables
    pub fn load() -> LicenseResult<Self> {
        let defaults = ApiConfig::default();
        let builder = Config::builder()
            .set_default("api.default_url", defaults.default_url)
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("api.network_policy", "suppressed")
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("api.timeout_secs", 3)
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("api.persist_responses", true)
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("api.signing_secret", "")
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("site.url", "http://localhost")
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("store.option_name", LICENSES_OPTION)
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("store.directory", "")
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("schedule.hook", CHECK_LICENSES_HOOK)
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("schedule.recurrence", "weekly")
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("schedule.poll_cron", "0 */15 * * * *")
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("settings.render_fields", false)
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("logging.enabled", false)
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_default("logging.level", "info")
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            // Load from addon_license.toml (optional)
            .add_source(config::File::with_name("addon_license").required(false))
            // Override with environment variables
            .set_override_option("api.default_url", env::var("ADDON_LICENSE_API_URL").ok())
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_override_option(
                "api.network_policy",
                env::var("ADDON_LICENSE_NETWORK_POLICY").ok(),
            )
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_override_option(
                "api.timeout_secs",
                env_parsed::<i64>("ADDON_LICENSE_API_TIMEOUT_SECS"),
            )
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_override_option(
                "api.persist_responses",
                env_parsed::<bool>("ADDON_LICENSE_PERSIST_RESPONSES"),
            )
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_override_option(
                "api.signing_secret",
                env::var("ADDON_LICENSE_SIGNING_SECRET").ok(),
            )
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_override_option("site.url", env::var("ADDON_LICENSE_SITE_URL").ok())
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_override_option("store.directory", env::var("ADDON_LICENSE_STORE_DIR").ok())
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_override_option(
                "settings.render_fields",
                env_parsed::<bool>("ADDON_LICENSE_RENDER_FIELDS"),
            )
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_override_option(
                "logging.enabled",
                env_parsed::<bool>("ADDON_LICENSE_LOGGING_ENABLED"),
            )
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?
            .set_override_option("logging.level", env::var("ADDON_LICENSE_LOG_LEVEL").ok())
            .map_err(|e| LicenseError::ConfigError(e.to_string()))?;

        let settings = builder
            .build()
            .map_err(|e| LicenseError::ConfigError(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| LicenseError::ConfigError(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.api.default_url.trim().is_empty() {
            return Err(LicenseError::ConfigError(
                "api.default_url cannot be empty".to_string(),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(LicenseError::ConfigError(
                "api.timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.store.option_name.is_empty() {
            return Err(LicenseError::ConfigError(
                "store.option_name cannot be empty".to_string(),
            ));
        }
        if self.schedule.hook.is_empty() {
            return Err(LicenseError::ConfigError(
                "schedule.hook cannot be empty".to_string(),
            ));
        }

        match self.logging.level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(LicenseError::ConfigError(format!(
                    "logging.level must be one of: trace, debug, info, warn, error. Got '{other}'"
                )));
            }
        }

        Ok(())
    }
}

/// Get the global configuration.
///
/// Loaded and validated on first access, then cached for the process.
pub fn get_config() -> LicenseResult<&'static AddonLicenseConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }

    let config = AddonLicenseConfig::load()?;
    config.validate()?;

    // Another thread may have won the race; either value is equivalent.
    let _ = CONFIG.set(config);

    CONFIG
        .get()
        .ok_or_else(|| LicenseError::ConfigError("configuration was not stored".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_network_suppressed() {
        let config = AddonLicenseConfig::default();
        assert_eq!(config.api.network_policy, NetworkPolicy::Suppressed);
        assert_eq!(config.api.default_url, DEFAULT_API_URL);
        assert_eq!(config.api.timeout_secs, 3);
        assert!(config.api.persist_responses);
        assert_eq!(config.store.option_name, "polylang_licenses");
        assert_eq!(config.schedule.hook, "polylang_check_licenses");
        assert_eq!(config.schedule.recurrence, Recurrence::Weekly);
        assert!(!config.settings.render_fields);
    }

    #[test]
    fn default_config_is_valid() {
        assert!(AddonLicenseConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_zero_timeout() {
        let mut config = AddonLicenseConfig::default();
        config.api.timeout_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(LicenseError::ConfigError(msg)) if msg.contains("timeout")
        ));
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut config = AddonLicenseConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn explicit_store_directory_wins() {
        let store = StoreConfig {
            directory: "/var/lib/licenses".to_string(),
            ..StoreConfig::default()
        };
        assert_eq!(
            store.resolved_directory(),
            Some(PathBuf::from("/var/lib/licenses"))
        );
    }
}
