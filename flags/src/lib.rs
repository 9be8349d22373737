//! Flag sources for the feature registry.
//!
//! Feature toggles arrive asynchronously in the host - a remote flag
//! service, or a config file read after startup. A [`FlagSource`] is a
//! shared slot that starts empty: every query answers
//! [`FlagState::Unknown`] until a [`FlagSet`] is installed, after which
//! queries answer `Enabled`/`Disabled`. The registry consults predicates on
//! every access, so installing (or re-installing) a set takes effect
//! immediately with no stale lockout.
//!
//! The on-disk format is a TOML `[features]` table of booleans:
//!
//! ```toml
//! [features]
//! positions = true
//! swap = false
//! ```

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use serde::Deserialize;
use thiserror::Error;

use featuregate_types::FlagState;

#[derive(Debug, Error)]
pub enum FlagFileError {
    #[error("failed to read flag file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse flag file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Raw deserialization shape. Stays private; unknown top-level keys are
/// ignored so a flag file can live inside a larger config document.
#[derive(Deserialize)]
struct RawFlagFile {
    #[serde(default)]
    features: HashMap<String, bool>,
}

/// A resolved set of feature toggles: feature name -> enabled.
///
/// Names missing from the set are disabled - an unlisted feature must not
/// load.
#[derive(Debug, Clone, Default)]
pub struct FlagSet {
    flags: HashMap<String, bool>,
}

impl FlagSet {
    #[must_use]
    pub fn new(flags: HashMap<String, bool>) -> Self {
        Self { flags }
    }

    /// Parse from TOML text (the `[features]` table).
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        let raw: RawFlagFile = toml::from_str(raw)?;
        Ok(Self::new(raw.features))
    }

    /// Toggle answer for one feature. Missing names are `Disabled`.
    #[must_use]
    pub fn state(&self, name: &str) -> FlagState {
        FlagState::from(self.flags.get(name).copied().unwrap_or(false))
    }

    /// Builder-style insert, mostly for tests and hand-assembled sets.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, enabled: bool) -> Self {
        self.flags.insert(name.into(), enabled);
        self
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

/// Load and parse a flag file.
pub fn load_flag_file(path: &Path) -> Result<FlagSet, FlagFileError> {
    let raw = std::fs::read_to_string(path).map_err(|source| FlagFileError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let set = FlagSet::from_toml_str(&raw).map_err(|source| FlagFileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), flags = set.len(), "flag file loaded");
    Ok(set)
}

/// A shared, late-installable flag slot.
///
/// Clones share one slot. Queries before [`FlagSource::install`] answer
/// `Unknown`, which the registry treats as "do not load yet" - the caller
/// that eventually installs the set implicitly unlocks those features on
/// the next access.
#[derive(Clone, Debug, Default)]
pub struct FlagSource {
    inner: Arc<RwLock<Option<FlagSet>>>,
}

impl FlagSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install (or replace) the flag set. Replacement is the runtime flag
    /// refresh path; the registry re-reads predicates on every access, so
    /// no additional invalidation is needed.
    pub fn install(&self, set: FlagSet) {
        tracing::info!(flags = set.len(), "flag set installed");
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = Some(set);
    }

    /// Drop back to the uninstalled state (every query `Unknown`). Used for
    /// test isolation alongside the registry's bulk clear.
    pub fn reset(&self) {
        let mut slot = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *slot = None;
    }

    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Toggle answer for one feature: `Unknown` until installed.
    #[must_use]
    pub fn state(&self, name: &str) -> FlagState {
        let slot = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(set) => set.state(name),
            None => FlagState::Unknown,
        }
    }

    /// A predicate closure for `FeatureHandle::new`, bound to one feature
    /// name. The closure shares this source, so installs and refreshes are
    /// visible through it. `use<>`: the closure owns its captures and must
    /// not borrow from `self`.
    #[must_use]
    pub fn predicate(&self, name: &str) -> impl Fn() -> FlagState + Send + Sync + 'static + use<> {
        let source = self.clone();
        let name = name.to_string();
        move || source.state(&name)
    }
}
