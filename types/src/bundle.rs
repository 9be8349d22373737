//! Capability bundles: the opaque payload produced by loading a feature.
//!
//! A bundle is an immutable mapping from capability name to implementation
//! value. The registry never looks inside one; consumers read entries back
//! out with a typed downcast. Bundles are never partially populated - the
//! builder is consumed by `build()` and the resulting map never changes.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An opaque implementation value: a renderable unit, a function table,
/// plain data - the registry does not care.
pub type Capability = Arc<dyn Any + Send + Sync>;

/// An immutable set of named capabilities produced by one feature load.
#[derive(Clone, Default)]
pub struct CapabilityBundle {
    entries: BTreeMap<String, Capability>,
}

impl CapabilityBundle {
    #[must_use]
    pub fn builder() -> CapabilityBundleBuilder {
        CapabilityBundleBuilder::default()
    }

    /// Typed read of a capability. Returns `None` when the name is absent
    /// or the stored value is not a `T`.
    #[must_use]
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<&T> {
        self.entries.get(name)?.downcast_ref::<T>()
    }

    /// Untyped read, for callers that re-dispatch on their own.
    #[must_use]
    pub fn get_raw(&self, name: &str) -> Option<&Capability> {
        self.entries.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Capability names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Debug for CapabilityBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Capability values are type-erased; show the names only.
        f.debug_struct("CapabilityBundle")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Builder consumed by [`CapabilityBundle::build`]. Inserting the same
/// name twice keeps the later value, matching map semantics.
#[derive(Default)]
pub struct CapabilityBundleBuilder {
    entries: BTreeMap<String, Capability>,
}

impl CapabilityBundleBuilder {
    /// Add a capability, wrapping it for shared ownership.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Any + Send + Sync) -> Self {
        self.entries.insert(name.into(), Arc::new(value));
        self
    }

    /// Add an already-shared capability without re-wrapping.
    #[must_use]
    pub fn with_arc(mut self, name: impl Into<String>, value: Capability) -> Self {
        self.entries.insert(name.into(), value);
        self
    }

    #[must_use]
    pub fn build(self) -> CapabilityBundle {
        CapabilityBundle {
            entries: self.entries,
        }
    }
}
