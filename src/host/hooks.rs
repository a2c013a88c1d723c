//! Named extension points of the host.
//!
//! Actions are ordered handler lists keyed by name and run sequentially when
//! the action fires. The settings registry is the filter through which the
//! license settings page discovers every registered add-on.

use crate::client::manager::SharedLicense;

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// Future returned by an action handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Callback registered under an action name.
pub type ActionHandler = Arc<dyn Fn() -> HandlerFuture + Send + Sync>;

/// Ordered action handlers per name, each filed under an owner.
#[derive(Default)]
pub struct ActionRegistry {
    handlers: Mutex<HashMap<String, Vec<(String, ActionHandler)>>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler to an action, or replace the one `owner` registered
    /// earlier while keeping its position.
    pub fn add_action<F, Fut>(&self, name: &str, owner: &str, handler: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handler: ActionHandler = Arc::new(move || -> HandlerFuture { Box::pin(handler()) });
        let mut handlers = self.handlers.lock().unwrap_or_else(|e| e.into_inner());
        let list = handlers.entry(name.to_string()).or_default();
        match list.iter_mut().find(|(existing, _)| existing == owner) {
            Some(slot) => slot.1 = handler,
            None => list.push((owner.to_string(), handler)),
        }
    }

    /// Number of handlers registered under an action.
    pub fn handler_count(&self, name: &str) -> usize {
        self.handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map_or(0, Vec::len)
    }

    /// Run every handler of an action in registration order.
    ///
    /// Returns how many handlers ran.
    pub async fn do_action(&self, name: &str) -> usize {
        // Clone out of the lock so handlers may register further actions.
        let handlers: Vec<ActionHandler> = self
            .handlers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map(|list| list.iter().map(|(_, h)| Arc::clone(h)).collect())
            .unwrap_or_default();

        for handler in &handlers {
            handler().await;
        }
        handlers.len()
    }
}

/// Licenses contributed to the settings page, keyed by add-on id.
#[derive(Default)]
pub struct SettingsRegistry {
    items: Mutex<Vec<(String, SharedLicense)>>,
}

impl SettingsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a license, or replace the one already registered under `id`
    /// while keeping its position.
    pub fn register(&self, id: &str, license: SharedLicense) {
        let mut items = self.items.lock().unwrap_or_else(|e| e.into_inner());
        match items.iter_mut().find(|(existing, _)| existing == id) {
            Some(slot) => slot.1 = license,
            None => items.push((id.to_string(), license)),
        }
    }

    /// Registered licenses in registration order.
    pub fn licenses(&self) -> Vec<(String, SharedLicense)> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, license)| (id.clone(), Arc::clone(license)))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<SharedLicense> {
        self.items
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|(existing, _)| existing == id)
            .map(|(_, license)| Arc::clone(license))
    }

    pub fn len(&self) -> usize {
        self.items.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn handlers_run_in_registration_order() {
        let registry = ActionRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for label in ["first", "second"] {
            let order = Arc::clone(&order);
            registry.add_action("polylang_check_licenses", label, move || {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(label);
                }
            });
        }

        let ran = tokio_test::block_on(registry.do_action("polylang_check_licenses"));
        assert_eq!(ran, 2);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn unknown_action_runs_nothing() {
        let registry = ActionRegistry::new();
        assert_eq!(tokio_test::block_on(registry.do_action("nothing_here")), 0);
        assert_eq!(registry.handler_count("nothing_here"), 0);
    }

    #[test]
    fn handlers_can_fire_repeatedly() {
        let registry = ActionRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        registry.add_action("tick", "counter", move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio_test::block_on(registry.do_action("tick"));
        tokio_test::block_on(registry.do_action("tick"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(registry.handler_count("tick"), 1);
    }

    #[test]
    fn same_owner_replaces_its_handler() {
        let registry = ActionRegistry::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (owner, label) in [("a", "a-old"), ("b", "b"), ("a", "a-new")] {
            let order = Arc::clone(&order);
            registry.add_action("polylang_check_licenses", owner, move || {
                let order = Arc::clone(&order);
                async move {
                    order.lock().unwrap().push(label);
                }
            });
        }

        assert_eq!(registry.handler_count("polylang_check_licenses"), 2);
        tokio_test::block_on(registry.do_action("polylang_check_licenses"));
        assert_eq!(*order.lock().unwrap(), vec!["a-new", "b"]);
    }
}
