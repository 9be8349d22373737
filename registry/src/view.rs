//! Observer-side accessor: a handle paired with a live subscription.
//!
//! `FeatureView` is what a mounted piece of UI (or any long-lived consumer)
//! holds while it cares about a feature: each [`FeatureView::snapshot`]
//! re-runs the accessor, and the embedded subscription wakes async waiters
//! whenever the registry mutates. Dropping the view detaches the
//! subscription, so teardown release is guaranteed.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Notify;

use featuregate_types::CapabilityBundle;

use crate::handle::FeatureHandle;
use crate::notify::Subscription;
use crate::registry::{FeatureStatus, Registry};

/// A scoped view of one feature: accessor plus subscription lifecycle.
pub struct FeatureView<'a> {
    registry: &'a Registry,
    handle: &'a FeatureHandle,
    wakeup: Arc<Notify>,
    _subscription: Subscription,
}

impl<'a> FeatureView<'a> {
    /// Attach to the registry. The subscription lives as long as the view.
    #[must_use]
    pub fn new(registry: &'a Registry, handle: &'a FeatureHandle) -> Self {
        let wakeup = Arc::new(Notify::new());
        let waker = Arc::clone(&wakeup);
        let subscription = registry.subscribe(move || waker.notify_waiters());
        Self {
            registry,
            handle,
            wakeup,
            _subscription: subscription,
        }
    }

    #[must_use]
    pub fn handle(&self) -> &FeatureHandle {
        self.handle
    }

    /// Current readiness, triggering a load on demand exactly like
    /// [`Registry::access`].
    pub fn snapshot(&self) -> FeatureStatus {
        self.registry.access(self.handle)
    }

    /// Suspend until the registry mutates.
    ///
    /// Only mutations after this future is first polled are observed; use
    /// [`FeatureView::ready`] when waiting for a specific outcome, which
    /// registers before it snapshots and therefore cannot miss a settle.
    pub async fn changed(&self) {
        self.wakeup.notified().await;
    }

    /// Wait until the feature is ready, triggering loads on demand.
    ///
    /// Re-snapshots on every registry mutation, so a failed load is retried
    /// on the wakeup it broadcasts. Never resolves for a feature whose flag
    /// stays disabled or unknown - callers wanting a bound race this
    /// against their own timeout.
    pub async fn ready(&self) -> Arc<CapabilityBundle> {
        loop {
            // Register interest before snapshotting: a load that settles
            // between the snapshot and the await below still wakes us.
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let FeatureStatus::Ready(bundle) = self.snapshot() {
                return bundle;
            }
            notified.await;
        }
    }
}

impl fmt::Debug for FeatureView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureView")
            .field("feature", self.handle.name())
            .finish_non_exhaustive()
    }
}
