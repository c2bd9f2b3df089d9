use std::{fmt, ops::Deref, sync::Arc, time::Duration};

use tokio::{
    sync::watch,
    time::{sleep_until, timeout, Instant},
};

use super::{Filter, Registry, ServiceObject, ServiceReference, Watch, WatchId};

const MIN_RECHECK: Duration = Duration::from_millis(10);
/// Stand-in deadline for timeouts too large to add to an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Keeps a filtered watch open against a registry.
///
/// The watch is closed when the tracker is dropped.
pub struct ServiceTracker {
    registry: Arc<dyn Registry>,
    filter: Filter,
    watch_id: WatchId,
    changes: watch::Receiver<u64>,
}

impl ServiceTracker {
    #[must_use]
    pub fn open(registry: Arc<dyn Registry>, filter: Filter) -> Self {
        let Watch { id, changes } = registry.watch(&filter);
        Self {
            registry,
            filter,
            watch_id: id,
            changes,
        }
    }

    #[must_use]
    pub const fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Best ranked registration currently matching the filter.
    #[must_use]
    pub fn current(&self) -> Option<(ServiceReference, ServiceObject)> {
        self.registry
            .references(Some(&self.filter))
            .into_iter()
            .find_map(|reference| {
                let object = self.registry.service(&reference)?;
                Some((reference, object))
            })
    }

    /// Waits until a matching registration exists or `timeout` elapses.
    ///
    /// The registry is checked at least once, then again on every change
    /// notification and at most `recheck` apart.
    pub async fn wait_for_service(
        &mut self,
        timeout_duration: Duration,
        recheck: Duration,
    ) -> Option<(ServiceReference, ServiceObject)> {
        let started = Instant::now();
        let deadline = started
            .checked_add(timeout_duration)
            .unwrap_or_else(|| started + FAR_FUTURE);
        let recheck = recheck.max(MIN_RECHECK);
        loop {
            self.changes.borrow_and_update();
            if let Some(found) = self.current() {
                return Some(found);
            }

            let now = Instant::now();
            if now >= deadline {
                return None;
            }

            let next_check = now
                .checked_add(recheck)
                .map_or(deadline, |recheck_at| recheck_at.min(deadline));
            if let Ok(Err(_)) = timeout(next_check - now, self.changes.changed()).await {
                // notifications stopped, keep rechecking on the interval
                sleep_until(next_check).await;
            }
        }
    }

    #[must_use]
    pub fn is_registered(&self, reference: &ServiceReference) -> bool {
        self.registry
            .references(Some(&self.filter))
            .iter()
            .any(|candidate| candidate.id() == reference.id())
    }
}

impl Drop for ServiceTracker {
    fn drop(&mut self) {
        self.registry.unwatch(self.watch_id);
    }
}

/// A resolved service together with the watch that found it.
///
/// Dropping the handle (or calling [`ResolvedService::release`]) closes the
/// registry watch.
pub struct ResolvedService<S: ?Sized> {
    service: Arc<S>,
    reference: ServiceReference,
    tracker: ServiceTracker,
}

impl<S: ?Sized> ResolvedService<S> {
    pub(super) const fn new(
        service: Arc<S>,
        reference: ServiceReference,
        tracker: ServiceTracker,
    ) -> Self {
        Self {
            service,
            reference,
            tracker,
        }
    }

    #[must_use]
    pub const fn reference(&self) -> &ServiceReference {
        &self.reference
    }

    #[must_use]
    pub fn service(&self) -> Arc<S> {
        Arc::clone(&self.service)
    }

    /// Whether the registration this handle was resolved from is still live.
    #[must_use]
    pub fn is_registered(&self) -> bool {
        self.tracker.is_registered(&self.reference)
    }

    pub fn release(self) {}
}

impl<S: ?Sized> Deref for ResolvedService<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.service
    }
}

impl<S: ?Sized> fmt::Debug for ResolvedService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedService")
            .field("reference", &self.reference)
            .field("filter", &self.tracker.filter().as_str())
            .finish_non_exhaustive()
    }
}
