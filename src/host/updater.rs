//! Plugin update registration and the cached update metadata.
//!
//! The update checker itself is an external collaborator. Add-ons hand it
//! their identity and license key; it decides update eligibility. After a
//! key changes, the cached "available updates" transient is dropped so the
//! host checks again on its next opportunity.

use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Arguments given to the update checker for one add-on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdaterArgs {
    pub version: String,
    pub license: String,
    pub author: String,
    pub item_name: String,
}

/// One add-on registered as an update source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdaterRegistration {
    pub api_url: String,
    pub plugin_file: String,
    pub args: UpdaterArgs,
}

/// Host hook that wires an add-on into the update checker.
pub trait UpdateRegistrar: Send + Sync {
    fn register(&self, registration: UpdaterRegistration);
}

/// Records registrations, one per plugin file.
#[derive(Debug, Default)]
pub struct UpdaterRegistry {
    registrations: Mutex<Vec<UpdaterRegistration>>,
}

impl UpdaterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registrations(&self) -> Vec<UpdaterRegistration> {
        self.registrations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Registration for a given item name.
    pub fn find(&self, item_name: &str) -> Option<UpdaterRegistration> {
        self.registrations
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|r| r.args.item_name == item_name)
            .cloned()
    }
}

impl UpdateRegistrar for UpdaterRegistry {
    fn register(&self, registration: UpdaterRegistration) {
        let mut registrations = self.registrations.lock().unwrap_or_else(|e| e.into_inner());
        match registrations
            .iter_mut()
            .find(|r| r.plugin_file == registration.plugin_file)
        {
            Some(existing) => *existing = registration,
            None => registrations.push(registration),
        }
    }
}

/// Site-wide transient cache of the host.
pub trait TransientCache: Send + Sync {
    /// Drop a transient so the host rebuilds it on next use.
    fn delete_site_transient(&self, name: &str);
}

/// Transient cache that only counts invalidations.
///
/// The host owns the cached values; the license manager never reads them.
#[derive(Debug, Default)]
pub struct MemoryTransientCache {
    deletions: Mutex<HashMap<String, usize>>,
}

impl MemoryTransientCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times a transient was invalidated.
    pub fn deletions(&self, name: &str) -> usize {
        self.deletions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .copied()
            .unwrap_or(0)
    }
}

impl TransientCache for MemoryTransientCache {
    fn delete_site_transient(&self, name: &str) {
        *self
            .deletions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .entry(name.to_string())
            .or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registration(file: &str, license: &str) -> UpdaterRegistration {
        UpdaterRegistration {
            api_url: "https://polylang.pro".to_string(),
            plugin_file: file.to_string(),
            args: UpdaterArgs {
                version: "3.6".to_string(),
                license: license.to_string(),
                author: "WP SYNTEX".to_string(),
                item_name: "Polylang Pro".to_string(),
            },
        }
    }

    #[test]
    fn registering_same_file_replaces() {
        let registry = UpdaterRegistry::new();
        registry.register(registration("polylang-pro/polylang.php", ""));
        registry.register(registration("polylang-pro/polylang.php", "ABC"));

        let all = registry.registrations();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].args.license, "ABC");
        assert_eq!(registry.find("Polylang Pro"), Some(all[0].clone()));
    }

    #[test]
    fn updater_args_serialize_with_host_field_names() {
        let args = registration("f.php", "KEY").args;
        assert_eq!(
            serde_json::to_value(&args).unwrap(),
            json!({"version": "3.6", "license": "KEY", "author": "WP SYNTEX", "item_name": "Polylang Pro"})
        );
    }

    #[test]
    fn deletions_are_counted_per_transient() {
        let cache = MemoryTransientCache::new();
        cache.delete_site_transient("update_plugins");
        cache.delete_site_transient("update_plugins");
        cache.delete_site_transient("update_themes");

        assert_eq!(cache.deletions("update_plugins"), 2);
        assert_eq!(cache.deletions("update_themes"), 1);
        assert_eq!(cache.deletions("update_core"), 0);
    }
}
