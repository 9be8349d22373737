//! Core domain types for the feature registry.
//!
//! This crate contains pure domain types with no IO, no async, and minimal
//! dependencies. Everything here can be used from any layer of the host
//! application: the registry itself, flag sources, and feature authors.

mod bundle;
pub use bundle::{Capability, CapabilityBundle, CapabilityBundleBuilder};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// Feature Names
// ============================================================================

/// A validated feature name: non-empty after trimming.
///
/// This is the cache key for the whole registry, so existence of a
/// `FeatureName` is the proof that the key is usable. Serde round-trips
/// through `String` with validation at the deserialization boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FeatureName(String);

#[derive(Debug, Error)]
#[error("feature name must not be empty")]
pub struct EmptyNameError;

impl FeatureName {
    pub fn new(value: impl Into<String>) -> Result<Self, EmptyNameError> {
        let value = value.into();
        if value.trim().is_empty() {
            Err(EmptyNameError)
        } else {
            Ok(Self(value))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for FeatureName {
    type Error = EmptyNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for FeatureName {
    type Error = EmptyNameError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FeatureName> for String {
    fn from(value: FeatureName) -> Self {
        value.0
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FeatureName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Flag State
// ============================================================================

/// Tri-state answer to "is this feature allowed to load?".
///
/// `Unknown` models flag configuration that has not itself finished
/// loading: the registry treats it like `Disabled` (no load attempted)
/// but consumers can render it differently (e.g. a spinner instead of
/// hiding the feature).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagState {
    Enabled,
    Disabled,
    /// Flag configuration has not resolved yet.
    Unknown,
}

impl FlagState {
    #[must_use]
    pub fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }
}

impl From<bool> for FlagState {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Enabled } else { Self::Disabled }
    }
}

// ============================================================================
// Load Errors
// ============================================================================

/// Failure produced by a feature loader.
///
/// The registry never surfaces this through its access API (a failed load
/// is just "not ready"); it retains the message for diagnostic logging.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct LoadError {
    message: String,
}

impl LoadError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}
