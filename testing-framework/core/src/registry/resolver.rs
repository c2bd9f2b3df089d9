use std::{marker::PhantomData, sync::Arc, time::Duration};

use thiserror::Error;
use tracing::{debug, error, warn};

use super::{
    explode,
    filter::{self, Filter, FilterError},
    Capability, Registry, ResolvedService, ServiceId, ServiceTracker,
};
use crate::config::HarnessConfig;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidFilter(#[from] FilterError),
    #[error("gave up waiting for service {filter} after {timeout:?}")]
    Timeout { filter: String, timeout: Duration },
    #[error("service {service_id} registered as {object_class} does not implement the requested type")]
    TypeMismatch {
        object_class: &'static str,
        service_id: ServiceId,
    },
}

/// Lookup of a capability, optionally narrowed by a filter.
pub struct ServiceQuery<C> {
    filter: Option<String>,
    timeout: Option<Duration>,
    _capability: PhantomData<fn() -> C>,
}

impl<C: Capability> ServiceQuery<C> {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            filter: None,
            timeout: None,
            _capability: PhantomData,
        }
    }

    #[must_use]
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub const fn object_class(&self) -> &'static str {
        C::OBJECT_CLASS
    }

    #[must_use]
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref()
    }

    /// The object class clause AND-ed with the caller filter, if any.
    pub fn compose(&self) -> Result<Filter, FilterError> {
        filter::compose(C::OBJECT_CLASS, self.filter.as_deref())
    }
}

impl<C: Capability> Default for ServiceQuery<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves capabilities against a registry with a bounded wait.
#[derive(Clone)]
pub struct ServiceResolver {
    registry: Arc<dyn Registry>,
    default_timeout: Duration,
    recheck_interval: Duration,
}

impl ServiceResolver {
    #[must_use]
    pub fn new(registry: Arc<dyn Registry>, config: &HarnessConfig) -> Self {
        Self {
            registry,
            default_timeout: config.resolve_timeout,
            recheck_interval: config.poll_interval,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &Arc<dyn Registry> {
        &self.registry
    }

    pub async fn resolve<C: Capability>(&self) -> Result<ResolvedService<C::Service>, ResolveError> {
        self.resolve_query(ServiceQuery::<C>::new()).await
    }

    pub async fn resolve_filtered<C: Capability>(
        &self,
        filter: &str,
    ) -> Result<ResolvedService<C::Service>, ResolveError> {
        self.resolve_query(ServiceQuery::<C>::new().with_filter(filter))
            .await
    }

    pub async fn resolve_with_timeout<C: Capability>(
        &self,
        timeout: Duration,
    ) -> Result<ResolvedService<C::Service>, ResolveError> {
        self.resolve_query(ServiceQuery::<C>::new().with_timeout(timeout))
            .await
    }

    /// Waits for a registration matching `query`.
    ///
    /// A malformed filter fails before anything is watched. On timeout the
    /// registry contents are logged and the watch is closed.
    pub async fn resolve_query<C: Capability>(
        &self,
        query: ServiceQuery<C>,
    ) -> Result<ResolvedService<C::Service>, ResolveError> {
        let filter = query.compose()?;
        let timeout = query.timeout.unwrap_or(self.default_timeout);

        let mut tracker = ServiceTracker::open(Arc::clone(&self.registry), filter);
        let Some((reference, object)) = tracker
            .wait_for_service(timeout, self.recheck_interval)
            .await
        else {
            self.report_unresolved(C::OBJECT_CLASS);
            return Err(ResolveError::Timeout {
                filter: tracker.filter().to_string(),
                timeout,
            });
        };

        let service = object
            .downcast_ref::<Arc<C::Service>>()
            .cloned()
            .ok_or(ResolveError::TypeMismatch {
                object_class: C::OBJECT_CLASS,
                service_id: reference.id(),
            })?;

        debug!(filter = %tracker.filter(), service = %reference, "resolved service");
        Ok(ResolvedService::new(service, reference, tracker))
    }

    fn report_unresolved(&self, object_class: &str) {
        error!(headers = %explode(&self.registry.headers()), "test module headers");

        for reference in self.registry.references(None) {
            warn!(%reference, "registered service");
        }

        match filter::compose(object_class, None) {
            Ok(type_filter) => {
                for reference in self.registry.references(Some(&type_filter)) {
                    warn!(%reference, filter = %type_filter, "service of requested type");
                }
            }
            Err(err) => warn!(object_class, "cannot list services of requested type: {err}"),
        }
    }
}
