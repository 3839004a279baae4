//! The boundary to a live runtime.
//!
//! A live workspace talks to its host through [`HostRuntime`]: enumerate the
//! loaded units, fetch their bytes, observe loads through a [`LoadHook`], and
//! redefine units in one batch.

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;

/// Errors reported by a host runtime.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// The host refused a unit or batch.
    #[error("{name} rejected: {message}")]
    Rejected { name: String, message: String },

    /// A named unit is not loaded.
    #[error("unit not loaded: {name}")]
    UnknownUnit { name: String },

    /// The host could not service the call.
    #[error("host unavailable: {message}")]
    Unavailable { message: String },
}

/// A unit currently loaded in the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedUnit {
    /// Binary name (`pkg.Outer$Inner`).
    pub name: String,
    /// Description of the defining loader, `None` for the bootstrap loader.
    pub loader: Option<String>,
}

impl LoadedUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            loader: None,
        }
    }
}

/// One load or redefinition observed by the host. The host may omit any
/// field.
#[derive(Debug, Clone, Default)]
pub struct LoadEvent {
    pub loader: Option<String>,
    pub unit_name: Option<String>,
    /// Set when an already-loaded unit is being redefined.
    pub redefining: bool,
    pub bytes: Option<Bytes>,
}

/// Callback invoked synchronously on host threads for every load.
pub trait LoadHook: Send + Sync {
    /// Returns replacement bytes, or `None` to leave the unit unmodified.
    fn on_load(&self, event: &LoadEvent) -> Option<Bytes>;
}

/// A running process that can be inspected and patched.
pub trait HostRuntime: Send + Sync {
    /// Snapshot of the currently loaded units.
    fn loaded_units(&self) -> Result<Vec<LoadedUnit>, HostError>;

    /// Ask the unit's defining loader for its bytes.
    ///
    /// `Ok(None)` if the loader has no resource for the unit.
    fn unit_bytes(&self, unit: &LoadedUnit) -> Result<Option<Bytes>, HostError>;

    /// Register a hook for all subsequent loads and redefinitions.
    fn install_load_hook(&self, hook: Arc<dyn LoadHook>);

    /// Unregister a hook previously passed to `install_load_hook`.
    ///
    /// The default keeps the hook; workspace hooks turn inert once their
    /// workspace retires, so a host without removal only pays the call.
    fn remove_load_hook(&self, hook: &Arc<dyn LoadHook>) {
        let _ = hook;
    }

    /// Atomically replace the definitions of the named units (binary names).
    fn redefine(&self, definitions: &BTreeMap<String, Bytes>) -> Result<(), HostError>;
}
