//! Feature handles: the immutable descriptor for a lazily-loadable feature.
//!
//! A handle pairs a globally-unique name with a flag predicate ("may this
//! feature load right now?") and an async loader that produces the feature's
//! capability bundle. Handles are created once, at module-initialization
//! time, and live for the whole process; constructing two handles with the
//! same name is a configuration error and panics.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use futures_util::future::BoxFuture;

use featuregate_types::{CapabilityBundle, FeatureName, FlagState, LoadError};

/// The future a loader produces. Boxed so handles stay object-safe to store.
pub type LoadFuture = BoxFuture<'static, Result<CapabilityBundle, LoadError>>;

type FlagPredicate = Arc<dyn Fn() -> FlagState + Send + Sync>;
type Loader = Arc<dyn Fn() -> LoadFuture + Send + Sync>;

/// Names claimed by handle construction, for the lifetime of the process.
/// Never released - handles are process-lifetime values, and a freed name
/// would reopen the door to silent cache collisions.
static CLAIMED_NAMES: LazyLock<Mutex<HashSet<FeatureName>>> =
    LazyLock::new(|| Mutex::new(HashSet::new()));

fn claim_name(name: &FeatureName) {
    let mut claimed = CLAIMED_NAMES.lock().unwrap_or_else(PoisonError::into_inner);
    assert!(
        claimed.insert(name.clone()),
        "duplicate feature handle name '{name}': handles must be constructed once per feature"
    );
}

/// Immutable descriptor of a lazily-loadable feature.
///
/// Construction has no side effects beyond claiming the name: the loader
/// is not invoked until the first enabled access through a
/// [`Registry`](crate::Registry).
#[derive(Clone)]
pub struct FeatureHandle {
    name: FeatureName,
    is_enabled: FlagPredicate,
    load: Loader,
}

impl FeatureHandle {
    /// Construct a handle.
    ///
    /// # Panics
    ///
    /// Panics if `name` is empty or has already been claimed by another
    /// handle in this process. Both are programming mistakes, not runtime
    /// conditions, so they fail fast.
    pub fn new<P, F, Fut>(name: &str, is_enabled: P, load: F) -> Self
    where
        P: Fn() -> FlagState + Send + Sync + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CapabilityBundle, LoadError>> + Send + 'static,
    {
        let name = FeatureName::new(name)
            .unwrap_or_else(|e| panic!("invalid feature handle name: {e}"));
        claim_name(&name);
        tracing::debug!(feature = %name, "feature handle registered");
        Self {
            name,
            is_enabled: Arc::new(is_enabled),
            load: Arc::new(move || {
                let fut: LoadFuture = Box::pin(load());
                fut
            }),
        }
    }

    #[must_use]
    pub fn name(&self) -> &FeatureName {
        &self.name
    }

    /// Evaluate the flag predicate.
    ///
    /// A panicking predicate must not take the accessor down with it: the
    /// panic is caught, logged, and degraded to `Unknown` (not enabled).
    pub(crate) fn flag_state(&self) -> FlagState {
        match catch_unwind(AssertUnwindSafe(|| (self.is_enabled)())) {
            Ok(state) => state,
            Err(_) => {
                tracing::warn!(
                    feature = %self.name,
                    "flag predicate panicked; treating feature as not enabled"
                );
                FlagState::Unknown
            }
        }
    }

    /// Start one invocation of the loader. The registry guarantees this is
    /// called at most once while a previous invocation is cached or in
    /// flight.
    pub(crate) fn start_load(&self) -> LoadFuture {
        (self.load)()
    }
}

impl fmt::Debug for FeatureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Predicate and loader are closures; the name identifies the handle.
        f.debug_struct("FeatureHandle")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
