//! License manager for one add-on.
//!
//! A manager is built once per add-on when the host boots. It reads the
//! add-on's record from the shared license option, registers the add-on
//! with the update checker and the settings page, and hooks its periodic
//! check into the weekly scheduled task.
//!
//! Remote requests follow the host's [`NetworkPolicy`]. Under
//! `Suppressed` (the default) activation, deactivation and checks only
//! touch in-memory state.

use crate::client::api::{LicenseApi, LicenseRequest, NetworkPolicy, RequestKind};
use crate::client::field::{FieldRenderer, HiddenField, LicenseRowRenderer, LicenseView};
use crate::client::responses::LicenseData;
use crate::errors::LicenseResult;
use crate::host::scheduler::ensure_scheduled;
use crate::host::store::{LicenseRecord, LicenseStore};
use crate::host::updater::{TransientCache, UpdateRegistrar, UpdaterArgs, UpdaterRegistration};
use crate::host::Host;
use crate::slug::sanitize_title;

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Account page where customers manage their license keys.
pub const ACCOUNT_URL: &str = "https://polylang.pro/my-account/";

/// Settings filter collecting every add-on license.
pub const SETTINGS_FILTER: &str = "pll_settings_licenses";

/// Cached update metadata invalidated after activation.
pub const UPDATE_PLUGINS_TRANSIENT: &str = "update_plugins";

/// Status the API returns once a key has been released.
const STATUS_DEACTIVATED: &str = "deactivated";

/// A license manager shared with the host registries.
pub type SharedLicense = Arc<Mutex<LicenseManager>>;

/// Identity of a licensed add-on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Addon {
    /// Main plugin file
    pub file: String,
    /// Display name, also the item name known to the licensing API
    pub name: String,
    pub version: String,
    pub author: String,
    /// API base URL; the configured default is used when `None` or empty
    pub api_url: Option<String>,
}

impl Addon {
    pub fn new(
        file: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            name: name.into(),
            version: version.into(),
            author: author.into(),
            api_url: None,
        }
    }

    /// Add-on known only by its name, filed under its id.
    ///
    /// Version and author are left empty.
    pub fn by_name(name: &str) -> Self {
        Self::new(sanitize_title(name), name, "", "")
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = Some(api_url.into());
        self
    }
}

/// License key administration for one add-on.
pub struct LicenseManager {
    id: String,
    file: String,
    name: String,
    version: String,
    author: String,
    api_url: String,
    license_key: String,
    license_data: Option<LicenseData>,

    policy: NetworkPolicy,
    persist_responses: bool,
    signing_secret: String,
    site_url: String,
    timeout: Duration,

    store: LicenseStore,
    transients: Arc<dyn TransientCache>,
    renderer: Arc<dyn FieldRenderer>,
}

impl std::fmt::Debug for LicenseManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LicenseManager")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("version", &self.version)
            .field("api_url", &self.api_url)
            .field("has_key", &!self.license_key.is_empty())
            .field("policy", &self.policy)
            .finish()
    }
}

impl LicenseManager {
    /// Build the manager for an add-on and register it with the host.
    ///
    /// - reads the add-on's record from the shared license option,
    /// - registers the add-on with the update checker,
    /// - contributes it to the license settings list,
    /// - schedules the weekly check once per host and hooks `check` into it.
    ///
    /// Registering the same add-on again replaces both its settings entry
    /// and its check handler.
    pub fn register(host: &Host, addon: Addon) -> LicenseResult<SharedLicense> {
        let manager = Self::load(host, addon)?;
        manager.auto_updater(host.updater.as_ref());

        let id = manager.id.clone();
        let shared: SharedLicense = Arc::new(Mutex::new(manager));

        host.settings.register(&id, Arc::clone(&shared));

        let schedule = &host.config.schedule;
        if ensure_scheduled(
            host.scheduler.as_ref(),
            &schedule.hook,
            schedule.recurrence,
            Utc::now(),
        )? {
            info!(
                "Scheduled {} license checks under {}",
                schedule.recurrence.as_str(),
                schedule.hook
            );
        }

        let license = Arc::clone(&shared);
        host.actions.add_action(&schedule.hook, &id, move || {
            let license = Arc::clone(&license);
            async move {
                license.lock().await.check().await;
            }
        });

        debug!("Registered license manager for {} under {}", id, SETTINGS_FILTER);
        Ok(shared)
    }

    /// Read the add-on's persisted state without registering anything.
    fn load(host: &Host, addon: Addon) -> LicenseResult<Self> {
        let config = &host.config;
        let id = sanitize_title(&addon.name);
        let api_url = addon
            .api_url
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| config.api.default_url.clone());

        let store = host.license_store();
        let record = store.load(&id)?.unwrap_or_default();

        let renderer: Arc<dyn FieldRenderer> = if config.settings.render_fields {
            Arc::new(LicenseRowRenderer)
        } else {
            Arc::new(HiddenField)
        };

        Ok(Self {
            id,
            file: addon.file,
            name: addon.name,
            version: addon.version,
            author: addon.author,
            api_url,
            license_key: record.key,
            license_data: record.data,
            policy: config.api.network_policy,
            persist_responses: config.api.persist_responses,
            signing_secret: config.api.signing_secret.clone(),
            site_url: config.site.url.clone(),
            timeout: Duration::from_secs(config.api.timeout_secs),
            store,
            transients: Arc::clone(&host.transients),
            renderer,
        })
    }

    /// Hand the add-on to the update checker.
    pub fn auto_updater(&self, registrar: &dyn UpdateRegistrar) {
        registrar.register(UpdaterRegistration {
            api_url: self.api_url.clone(),
            plugin_file: self.file.clone(),
            args: UpdaterArgs {
                version: self.version.clone(),
                license: self.license_key.clone(),
                author: self.author.clone(),
                item_name: self.name.clone(),
            },
        });
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn license_key(&self) -> &str {
        &self.license_key
    }

    pub fn license_data(&self) -> Option<&LicenseData> {
        self.license_data.as_ref()
    }

    pub fn network_policy(&self) -> NetworkPolicy {
        self.policy
    }

    /// Switch the remote request mode of this manager.
    pub fn set_network_policy(&mut self, policy: NetworkPolicy) {
        self.policy = policy;
    }

    /// Whether successful responses are written back to the store.
    pub fn set_persist_responses(&mut self, persist: bool) {
        self.persist_responses = persist;
    }

    /// Replace the settings row renderer.
    pub fn set_field_renderer(&mut self, renderer: Arc<dyn FieldRenderer>) {
        self.renderer = renderer;
    }

    /// Activate a license key.
    ///
    /// The key is kept in memory whatever the remote outcome; the outcome
    /// itself only shows in [`license_data`](Self::license_data). Cached
    /// update metadata is dropped so updates are looked up again.
    pub async fn activate(&mut self, license_key: &str) -> &mut Self {
        self.license_key = license_key.to_string();
        self.request(RequestKind::ActivateLicense).await;

        // Tell the host to look for updates.
        self.transients.delete_site_transient(UPDATE_PLUGINS_TRANSIENT);
        info!("License key set for {}", self.id);
        self
    }

    /// Activate a key and make sure it ends up in the store.
    ///
    /// Under `Suppressed` nothing reaches the store on its own, so the key is
    /// written here. Under `Live` the response decides: a success is
    /// persisted when `persist_responses` is set and a failure leaves the
    /// store untouched.
    pub async fn activate_and_save(&mut self, license_key: &str) -> LicenseResult<()> {
        self.activate(license_key).await;
        match self.policy {
            NetworkPolicy::Suppressed => self.persist(),
            NetworkPolicy::Live => Ok(()),
        }
    }

    /// Deactivate the license key. The local key is left as it is.
    pub async fn deactivate(&mut self) -> &mut Self {
        self.request(RequestKind::DeactivateLicense).await;
        self
    }

    /// Re-validate the key; run by the weekly scheduled task.
    pub async fn check(&mut self) {
        if self.license_key.is_empty() {
            debug!("No license key for {}, skipping check", self.id);
            return;
        }
        self.request(RequestKind::CheckLicense).await;
    }

    /// Send a license request to the API and record the outcome.
    ///
    /// Never fails: errors are logged and reflected in the license data.
    pub async fn request(&mut self, kind: RequestKind) {
        match self.policy {
            NetworkPolicy::Suppressed => {
                debug!("Remote {} for {} suppressed by network policy", kind, self.id);
            }
            NetworkPolicy::Live => {
                if let Err(e) = self.live_request(kind).await {
                    warn!("License {} for {} failed: {}", kind, self.id, e);
                }
            }
        }
    }

    async fn live_request(&mut self, kind: RequestKind) -> LicenseResult<()> {
        if self.license_key.is_empty() {
            self.license_data = None;
            return self.persist_if_enabled();
        }

        let payload = self.build_request(kind);
        let response = match LicenseApi::new(&self.api_url, self.timeout) {
            Ok(api) => api.send(&payload).await,
            Err(e) => Err(e),
        };

        match response {
            Ok(data) if data.status() == Some(STATUS_DEACTIVATED) => {
                // The key stays in memory; only the stored record goes.
                self.license_data = None;
                info!("License for {} released", self.id);
                if self.persist_responses {
                    self.store.remove(&self.id)?;
                }
                Ok(())
            }
            Ok(data) => {
                self.license_data = Some(data);
                info!("License {} for {} completed", kind, self.id);
                self.persist_if_enabled()
            }
            Err(e) => {
                // Persisted state stays as it was.
                self.license_data = Some(LicenseData::unreachable(e.to_string()));
                Err(e)
            }
        }
    }

    /// Form body for a request of the given kind.
    pub fn build_request(&self, kind: RequestKind) -> LicenseRequest {
        LicenseRequest {
            request: kind.as_str().to_string(),
            license: self.license_key.clone(),
            item_name: self.name.clone(),
            version: self.version.clone(),
            author: self.author.clone(),
            url: self.site_url.clone(),
            signature: None,
        }
        .signed(&self.signing_secret)
    }

    fn persist_if_enabled(&self) -> LicenseResult<()> {
        if self.persist_responses {
            self.persist()
        } else {
            Ok(())
        }
    }

    /// Write the in-memory key and data back to the shared license option.
    ///
    /// A manager with neither key nor data removes its record.
    pub fn persist(&self) -> LicenseResult<()> {
        let record = LicenseRecord {
            key: self.license_key.clone(),
            data: self.license_data.clone(),
        };

        if record.is_empty() {
            self.store.remove(&self.id)
        } else {
            self.store.save(&self.id, &record)
        }
    }

    /// Settings page row for this license.
    pub fn render_field(&self) -> String {
        self.renderer.render(&LicenseView {
            id: &self.id,
            name: &self.name,
            license_key: &self.license_key,
            license_data: self.license_data.as_ref(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AddonLicenseConfig;
    use crate::host::store::MemoryOptionStore;
    use serde_json::json;

    fn addon(name: &str) -> Addon {
        Addon::new("polylang-pro/polylang.php", name, "3.6.1", "WP SYNTEX")
    }

    #[tokio::test]
    async fn empty_api_url_falls_back_to_default() {
        let host = Host::in_memory(AddonLicenseConfig::default());
        let license = LicenseManager::register(&host, addon("Polylang Pro").with_api_url("  ")).unwrap();
        assert_eq!(license.lock().await.api_url(), "https://polylang.pro");
    }

    #[tokio::test]
    async fn custom_api_url_is_kept() {
        let host = Host::in_memory(AddonLicenseConfig::default());
        let license = LicenseManager::register(
            &host,
            addon("Polylang Pro").with_api_url("https://licenses.example.org"),
        )
        .unwrap();
        assert_eq!(license.lock().await.api_url(), "https://licenses.example.org");
    }

    #[tokio::test]
    async fn payload_carries_identity_and_site() {
        let mut config = AddonLicenseConfig::default();
        config.site.url = "https://example.org".to_string();
        let host = Host::in_memory(config);
        let license = LicenseManager::register(&host, addon("Polylang Pro")).unwrap();

        let mut manager = license.lock().await;
        manager.activate("ABC").await;
        let payload = manager.build_request(RequestKind::CheckLicense);
        assert_eq!(payload.request, "check_license");
        assert_eq!(payload.license, "ABC");
        assert_eq!(payload.item_name, "Polylang Pro");
        assert_eq!(payload.version, "3.6.1");
        assert_eq!(payload.url, "https://example.org");
        assert!(payload.signature.is_none());
    }

    #[tokio::test]
    async fn payload_is_signed_when_secret_is_configured() {
        let mut config = AddonLicenseConfig::default();
        config.api.signing_secret = "s3cret".to_string();
        let host = Host::in_memory(config);
        let license = LicenseManager::register(&host, addon("Polylang Pro")).unwrap();

        let payload = license.lock().await.build_request(RequestKind::ActivateLicense);
        assert!(payload.verify("s3cret"));
    }

    #[tokio::test]
    async fn persist_writes_and_removes_record() {
        let options = Arc::new(MemoryOptionStore::new());
        let host = Host::with_options(AddonLicenseConfig::default(), options);
        let license = LicenseManager::register(&host, addon("Polylang Pro")).unwrap();
        let store = host.license_store();

        let mut manager = license.lock().await;
        manager.activate("ABC").await;
        // Suppressed activation does not write anything by itself.
        assert_eq!(store.load("polylang-pro").unwrap(), None);

        manager.persist().unwrap();
        assert_eq!(store.load("polylang-pro").unwrap().unwrap().key, "ABC");

        manager.activate("").await;
        manager.persist().unwrap();
        assert_eq!(store.load("polylang-pro").unwrap(), None);
    }

    #[tokio::test]
    async fn renderer_can_be_restored_without_other_changes() {
        let host = Host::in_memory(AddonLicenseConfig::default());
        let license = LicenseManager::register(&host, addon("Polylang Pro")).unwrap();

        let mut manager = license.lock().await;
        manager.activate("ABC").await;
        assert_eq!(manager.render_field(), "");

        manager.set_field_renderer(Arc::new(LicenseRowRenderer));
        let html = manager.render_field();
        assert!(html.contains("value=\"ABC\""));
        assert_eq!(manager.license_key(), "ABC");
    }

    #[tokio::test]
    async fn render_fields_setting_selects_row_renderer() {
        let mut config = AddonLicenseConfig::default();
        config.settings.render_fields = true;
        let options = Arc::new(MemoryOptionStore::with_option(
            "polylang_licenses",
            json!({"polylang-pro": {"key": "ABC"}}),
        ));
        let host = Host::with_options(config, options);
        let license = LicenseManager::register(&host, addon("Polylang Pro")).unwrap();

        let html = license.lock().await.render_field();
        assert!(html.starts_with("<tr id=\"pll-license-polylang-pro\""));
    }

    #[test]
    fn debug_output_hides_the_key() {
        let host = Host::in_memory(AddonLicenseConfig::default());
        let manager = LicenseManager::load(&host, addon("Polylang Pro")).unwrap();
        let debug = format!("{manager:?}");
        assert!(debug.contains("polylang-pro"));
        assert!(debug.contains("has_key: false"));
    }
}
