//! Lazy, flag-gated, load-deduplicating feature registry.
//!
//! The host application gates optional subsystems behind runtime flags and
//! fetches their code (or data) only when first needed. This crate is the
//! runtime mechanism behind that: an in-process registry of
//! [`FeatureHandle`]s whose capability bundles are loaded lazily, with
//! concurrent load requests for the same feature collapsed into one, and a
//! broadcast channel that tells every interested observer when a bundle
//! becomes available.
//!
//! The registry is content-agnostic: a feature is an opaque, asynchronously
//! obtainable [`CapabilityBundle`](featuregate_types::CapabilityBundle)
//! keyed by name. How the bundle's code was obtained - dynamic library,
//! network fetch, plugin discovery - is the loader's business.
//!
//! # Usage
//!
//! ```no_run
//! use featuregate_registry::{FeatureHandle, FeatureStatus, Registry};
//! use featuregate_types::{CapabilityBundle, FlagState};
//!
//! // One handle per feature, constructed at module-initialization time.
//! let positions = FeatureHandle::new(
//!     "positions",
//!     || FlagState::Enabled,
//!     || async {
//!         Ok(CapabilityBundle::builder()
//!             .with("row_limit", 50usize)
//!             .build())
//!     },
//! );
//!
//! # let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
//! # rt.block_on(async {
//! match Registry::global().access(&positions) {
//!     FeatureStatus::Ready(_bundle) => { /* render with the bundle */ }
//!     _ => { /* not ready yet; a subscription will say when */ }
//! }
//! # });
//! ```

mod handle;
mod notify;
mod registry;
mod view;

pub use handle::{FeatureHandle, LoadFuture};
pub use notify::Subscription;
pub use registry::{FeatureStatus, Registry};
pub use view::FeatureView;
