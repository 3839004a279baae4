//! Test doubles. Enabled with the `test-utils` feature.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::runtime::{HostError, HostRuntime, LoadEvent, LoadHook, LoadedUnit};

/// An in-memory host runtime.
///
/// Units are keyed by binary name. Loads are simulated with
/// [`MockRuntime::load`], which runs every installed hook on the calling
/// thread. Redefinition batches are recorded and applied to the unit table
/// unless a rejection is armed.
#[derive(Default)]
pub struct MockRuntime {
    units: Mutex<BTreeMap<String, Option<Bytes>>>,
    hooks: Mutex<Vec<Arc<dyn LoadHook>>>,
    batches: Mutex<Vec<BTreeMap<String, Bytes>>>,
    rejection: Mutex<Option<HostError>>,
    enumeration_fails: AtomicBool,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a loaded unit. `None` models a unit whose loader cannot supply
    /// its bytes.
    pub fn add_unit(&self, binary_name: &str, bytes: Option<Bytes>) {
        self.units.lock().insert(binary_name.to_string(), bytes);
    }

    /// Make `loaded_units` fail.
    pub fn fail_enumeration(&self, fail: bool) {
        self.enumeration_fails.store(fail, Ordering::SeqCst);
    }

    /// Make every following redefinition fail with `error` (or succeed
    /// again with `None`).
    pub fn reject_redefinitions(&self, error: Option<HostError>) {
        *self.rejection.lock() = error;
    }

    /// Simulate a class load: record the unit and run every hook.
    ///
    /// `name` is passed to hooks as-is (hosts report internal names).
    pub fn load(&self, name: &str, bytes: Bytes) -> Vec<Option<Bytes>> {
        self.units
            .lock()
            .insert(name.replace('/', "."), Some(bytes.clone()));
        self.fire(&LoadEvent {
            loader: Some("app".to_string()),
            unit_name: Some(name.to_string()),
            redefining: false,
            bytes: Some(bytes),
        })
    }

    /// Run every installed hook with `event`, returning their answers.
    pub fn fire(&self, event: &LoadEvent) -> Vec<Option<Bytes>> {
        let hooks: Vec<_> = self.hooks.lock().clone();
        hooks.iter().map(|hook| hook.on_load(event)).collect()
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.lock().len()
    }

    /// Every batch passed to `redefine`, accepted or not.
    pub fn batches(&self) -> Vec<BTreeMap<String, Bytes>> {
        self.batches.lock().clone()
    }

    /// Current bytes of a unit.
    pub fn unit(&self, binary_name: &str) -> Option<Bytes> {
        self.units.lock().get(binary_name).cloned().flatten()
    }
}

impl HostRuntime for MockRuntime {
    fn loaded_units(&self) -> Result<Vec<LoadedUnit>, HostError> {
        if self.enumeration_fails.load(Ordering::SeqCst) {
            return Err(HostError::Unavailable {
                message: "enumeration disabled".to_string(),
            });
        }
        Ok(self
            .units
            .lock()
            .keys()
            .map(|name| LoadedUnit {
                name: name.clone(),
                loader: Some("app".to_string()),
            })
            .collect())
    }

    fn unit_bytes(&self, unit: &LoadedUnit) -> Result<Option<Bytes>, HostError> {
        match self.units.lock().get(&unit.name) {
            Some(bytes) => Ok(bytes.clone()),
            None => Err(HostError::UnknownUnit {
                name: unit.name.clone(),
            }),
        }
    }

    fn install_load_hook(&self, hook: Arc<dyn LoadHook>) {
        self.hooks.lock().push(hook);
    }

    fn remove_load_hook(&self, hook: &Arc<dyn LoadHook>) {
        let target = Arc::as_ptr(hook) as *const ();
        self.hooks
            .lock()
            .retain(|installed| Arc::as_ptr(installed) as *const () != target);
    }

    fn redefine(&self, definitions: &BTreeMap<String, Bytes>) -> Result<(), HostError> {
        self.batches.lock().push(definitions.clone());
        if let Some(error) = self.rejection.lock().clone() {
            return Err(error);
        }
        let mut units = self.units.lock();
        for (name, bytes) in definitions {
            units.insert(name.clone(), Some(bytes.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    impl LoadHook for Echo {
        fn on_load(&self, event: &LoadEvent) -> Option<Bytes> {
            event.bytes.clone()
        }
    }

    #[test]
    fn load_runs_hooks_and_records_unit() {
        let runtime = MockRuntime::new();
        runtime.install_load_hook(Arc::new(Echo));
        let answers = runtime.load("pkg/A", Bytes::from_static(b"x"));
        assert_eq!(answers, vec![Some(Bytes::from_static(b"x"))]);
        assert_eq!(runtime.unit("pkg.A").unwrap(), "x");
        assert_eq!(runtime.hook_count(), 1);
    }

    #[test]
    fn remove_drops_only_that_hook() {
        let runtime = MockRuntime::new();
        let kept: Arc<dyn LoadHook> = Arc::new(Echo);
        let removed: Arc<dyn LoadHook> = Arc::new(Echo);
        runtime.install_load_hook(kept.clone());
        runtime.install_load_hook(removed.clone());

        runtime.remove_load_hook(&removed);
        runtime.remove_load_hook(&removed);
        assert_eq!(runtime.hook_count(), 1);
        assert_eq!(runtime.load("pkg/A", Bytes::from_static(b"x")).len(), 1);
    }

    #[test]
    fn rejection_leaves_units_alone() {
        let runtime = MockRuntime::new();
        runtime.add_unit("pkg.A", Some(Bytes::from_static(b"old")));
        runtime.reject_redefinitions(Some(HostError::Rejected {
            name: "pkg.A".into(),
            message: "no".into(),
        }));
        let batch = BTreeMap::from([("pkg.A".to_string(), Bytes::from_static(b"new"))]);
        assert!(runtime.redefine(&batch).is_err());
        assert_eq!(runtime.unit("pkg.A").unwrap(), "old");
        assert_eq!(runtime.batches().len(), 1);
    }
}
