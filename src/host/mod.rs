//! Capabilities the host runtime provides to add-on licenses.
//!
//! The host owns option storage, the scheduled-task runner, the transient
//! cache, the update checker and the named extension points. [`Host`]
//! bundles them so a license manager can register itself in one call.

pub mod hooks;
pub mod scheduler;
pub mod store;
pub mod updater;

use crate::config::AddonLicenseConfig;
use hooks::{ActionRegistry, SettingsRegistry};
use scheduler::{CooperativeScheduler, Scheduler};
use store::{LicenseStore, MemoryOptionStore, OptionStore};
use updater::{MemoryTransientCache, TransientCache, UpdateRegistrar, UpdaterRegistry};

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::info;

/// Host runtime seen by the license managers.
pub struct Host {
    pub config: AddonLicenseConfig,
    pub options: Arc<dyn OptionStore>,
    pub scheduler: Arc<dyn Scheduler>,
    pub transients: Arc<dyn TransientCache>,
    pub updater: Arc<dyn UpdateRegistrar>,
    pub actions: ActionRegistry,
    pub settings: SettingsRegistry,
}

impl Host {
    pub fn new(
        config: AddonLicenseConfig,
        options: Arc<dyn OptionStore>,
        scheduler: Arc<dyn Scheduler>,
        transients: Arc<dyn TransientCache>,
        updater: Arc<dyn UpdateRegistrar>,
    ) -> Self {
        Self {
            config,
            options,
            scheduler,
            transients,
            updater,
            actions: ActionRegistry::new(),
            settings: SettingsRegistry::new(),
        }
    }

    /// Host over the given option store, with in-process scheduler, cache
    /// and update registry.
    pub fn with_options(config: AddonLicenseConfig, options: Arc<dyn OptionStore>) -> Self {
        Self::new(
            config,
            options,
            Arc::new(CooperativeScheduler::new()),
            Arc::new(MemoryTransientCache::new()),
            Arc::new(UpdaterRegistry::new()),
        )
    }

    /// Fully in-memory host.
    pub fn in_memory(config: AddonLicenseConfig) -> Self {
        Self::with_options(config, Arc::new(MemoryOptionStore::new()))
    }

    /// Typed view of the shared license option.
    pub fn license_store(&self) -> LicenseStore {
        LicenseStore::new(Arc::clone(&self.options), self.config.store.option_name.clone())
    }

    /// Fire every scheduled task that is due at `now`.
    ///
    /// Returns the names of the tasks that fired.
    pub async fn run_due_tasks(&self, now: DateTime<Utc>) -> Vec<String> {
        let due = self.scheduler.take_due(now);
        for hook in &due {
            let handlers = self.actions.do_action(hook).await;
            info!("Scheduled task {} fired ({} handlers)", hook, handlers);
        }
        due
    }
}
