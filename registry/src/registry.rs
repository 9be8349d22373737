//! The registry core: cache, in-flight deduplication, and the accessor.
//!
//! Process-wide state maps feature name to loaded capability bundle, with a
//! parallel in-flight set acting as a mutex-by-key: for any name, across
//! arbitrarily many concurrent accesses, the loader runs at most once until
//! it settles. The check-and-set happens synchronously under one lock,
//! before any await point, so exactly one caller wins the right to start a
//! load and every other caller observes "in flight" and waits for the
//! broadcast.

use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use futures_util::FutureExt;

use featuregate_types::{CapabilityBundle, FeatureName, FlagState};

use crate::handle::FeatureHandle;
use crate::notify::{SubscriberSet, Subscription};

/// Result of one accessor invocation, discriminated by readiness.
///
/// The minimal contract is binary - [`FeatureStatus::is_ready`] plus the
/// bundle when ready - but the not-ready side keeps enough shape for
/// tailored UI: a disabled feature is usually hidden, an unknown one shown
/// as pending, a loading one given a spinner.
#[derive(Debug, Clone)]
pub enum FeatureStatus {
    /// The bundle is cached; this is a shared snapshot, never mutated.
    Ready(Arc<CapabilityBundle>),
    /// A load is in flight (started by this access or an earlier one).
    /// A failed load also lands here on the *next* access, because failure
    /// clears all state and the next access starts a fresh attempt.
    Loading,
    /// The flag predicate answered disabled; no load was attempted.
    Disabled,
    /// Flag configuration has not resolved yet; no load was attempted.
    Unknown,
}

impl FeatureStatus {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    #[must_use]
    pub fn bundle(&self) -> Option<&Arc<CapabilityBundle>> {
        match self {
            Self::Ready(bundle) => Some(bundle),
            _ => None,
        }
    }

    #[must_use]
    pub fn into_bundle(self) -> Option<Arc<CapabilityBundle>> {
        match self {
            Self::Ready(bundle) => Some(bundle),
            _ => None,
        }
    }
}

/// Shared mutable registry state. Mutated only under the lock, only by the
/// accessor algorithm and settle/clear paths - never held across an await.
#[derive(Default)]
struct RegistryState {
    /// name -> bundle. Entries added once, never evicted except bulk clear.
    cache: HashMap<FeatureName, Arc<CapabilityBundle>>,
    /// Names with a load currently in progress. An entry is removed exactly
    /// once, when its load settles.
    in_flight: HashSet<FeatureName>,
    /// Last failure message per name, for diagnostics only. Cleared when a
    /// fresh load starts and on bulk clear.
    last_errors: HashMap<FeatureName, String>,
}

/// The feature registry.
///
/// Most callers use [`Registry::global`]; [`Registry::new`] exists so tests
/// can run against isolated instances.
#[derive(Default)]
pub struct Registry {
    state: Arc<Mutex<RegistryState>>,
    subscribers: Arc<SubscriberSet>,
}

static GLOBAL: LazyLock<Registry> = LazyLock::new(Registry::default);

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry instance.
    #[must_use]
    pub fn global() -> &'static Self {
        &GLOBAL
    }

    /// Obtain a feature's capability bundle, loading on demand.
    ///
    /// Per invocation:
    /// 1. The flag predicate is consulted (every time - the registry never
    ///    caches flag answers). Disabled or unknown short-circuits with no
    ///    load attempted.
    /// 2. A cached bundle is returned as [`FeatureStatus::Ready`].
    /// 3. Uncached and not in flight: the name is marked in flight and the
    ///    loader is spawned onto the current Tokio runtime. On settle the
    ///    marker is removed, a success is cached, and subscribers are
    ///    notified (write-then-notify, always).
    /// 4. Uncached and already in flight: nothing further; the broadcast
    ///    from the winning caller's load will update this observer.
    ///
    /// A load that outlives a flag flip completes and caches anyway; the
    /// cached entry is inert until the flag enables again. There is no
    /// cancellation and no timeout - a loader that needs one should race
    /// itself against a timer and fail, which follows the normal failure
    /// path (marker removed, nothing cached, subscribers notified, next
    /// access retries).
    ///
    /// # Panics
    ///
    /// Panics if a load must be scheduled while not running inside a Tokio
    /// runtime.
    pub fn access(&self, handle: &FeatureHandle) -> FeatureStatus {
        match handle.flag_state() {
            FlagState::Disabled => return FeatureStatus::Disabled,
            FlagState::Unknown => return FeatureStatus::Unknown,
            FlagState::Enabled => {}
        }

        let name = handle.name();
        {
            let mut state = self.lock_state();
            if let Some(bundle) = state.cache.get(name) {
                return FeatureStatus::Ready(Arc::clone(bundle));
            }
            if state.in_flight.contains(name) {
                return FeatureStatus::Loading;
            }
            // This caller wins the right to start the load. The insert and
            // the checks above are atomic under the state lock, so no other
            // caller can win the same name.
            state.in_flight.insert(name.clone());
            state.last_errors.remove(name);
        }

        self.spawn_load(handle.clone());
        FeatureStatus::Loading
    }

    /// Register an observer of cache mutations. The callback runs
    /// synchronously after every mutation (successful cache-set,
    /// failed-load cleanup, bulk clear), in unspecified order, and must be
    /// cheap. Delivery stops when the returned guard is dropped or
    /// explicitly unsubscribed.
    pub fn subscribe(&self, callback: impl Fn() + Send + Sync + 'static) -> Subscription {
        let id = self.subscribers.add(Arc::new(callback));
        Subscription::new(Arc::clone(&self.subscribers), id)
    }

    /// Bulk reset for test isolation and hot reload: empties the cache, the
    /// in-flight set, and recorded errors, then notifies subscribers. Never
    /// used in normal operation. Handle-name claims are not released -
    /// handles live for the process lifetime.
    pub fn clear(&self) {
        {
            let mut state = self.lock_state();
            state.cache.clear();
            state.in_flight.clear();
            state.last_errors.clear();
        }
        tracing::debug!("feature registry cleared");
        self.subscribers.notify();
    }

    /// The cached bundle for a name, bypassing the flag predicate.
    /// Diagnostic: normal consumers go through [`Registry::access`].
    #[must_use]
    pub fn cached(&self, name: &FeatureName) -> Option<Arc<CapabilityBundle>> {
        self.lock_state().cache.get(name).map(Arc::clone)
    }

    /// Whether a load is currently in progress for a name.
    #[must_use]
    pub fn is_in_flight(&self, name: &FeatureName) -> bool {
        self.lock_state().in_flight.contains(name)
    }

    /// The most recent load failure message for a name, if its last
    /// attempt failed and no fresh attempt has started since.
    #[must_use]
    pub fn last_error(&self, name: &FeatureName) -> Option<String> {
        self.lock_state().last_errors.get(name).cloned()
    }

    fn spawn_load(&self, handle: FeatureHandle) {
        let state = Arc::clone(&self.state);
        let subscribers = Arc::clone(&self.subscribers);
        tokio::spawn(async move {
            let name = handle.name().clone();
            tracing::debug!(feature = %name, "feature load started");

            // The loader is opaque user code: a panic (in the closure or
            // the future) is contained and handled as a failed load, so
            // the in-flight marker always comes off.
            let outcome = AssertUnwindSafe(async { handle.start_load().await })
                .catch_unwind()
                .await;

            {
                let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
                state.in_flight.remove(&name);
                match outcome {
                    Ok(Ok(bundle)) => {
                        tracing::info!(
                            feature = %name,
                            capabilities = bundle.len(),
                            "feature loaded"
                        );
                        state.cache.insert(name.clone(), Arc::new(bundle));
                    }
                    Ok(Err(err)) => {
                        tracing::warn!(feature = %name, error = %err, "feature load failed");
                        state.last_errors.insert(name.clone(), err.to_string());
                    }
                    Err(_) => {
                        tracing::warn!(feature = %name, "feature loader panicked");
                        state
                            .last_errors
                            .insert(name.clone(), "loader panicked".to_string());
                    }
                }
            }
            // The lock is released before callbacks run, and the cache
            // write is already visible: write-then-notify, never the
            // reverse.
            subscribers.notify();
        });
    }

    fn lock_state(&self) -> MutexGuard<'_, RegistryState> {
        // Poisoning can only come from a panic under the lock above; the
        // maps themselves stay coherent, so recover rather than cascade.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
