//! Dynamic service registry contract and the bounded service resolver.

pub mod filter;
mod memory;
mod modules;
pub mod properties;
mod resolver;
mod tracker;

use std::{any::Any, fmt, sync::Arc};

use tokio::sync::watch;

pub use filter::{Filter, FilterError, FilterErrorKind};
pub use memory::{InMemoryRegistry, ServiceRegistration};
pub use modules::{find_module, ModuleInfo, ModuleNotFound, ModuleState};
pub use properties::{explode, Properties, PropertyValue};
pub use resolver::{ResolveError, ServiceQuery, ServiceResolver};
pub use tracker::{ResolvedService, ServiceTracker};

/// Type-erased service object as stored by a registry.
///
/// For a capability `C` the erased value is an `Arc<C::Service>`.
pub type ServiceObject = Arc<dyn Any + Send + Sync>;

/// Binds a registry object class to the service type it resolves to.
pub trait Capability: 'static {
    const OBJECT_CLASS: &'static str;
    type Service: ?Sized + Send + Sync + 'static;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ServiceId(pub u64);

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServiceReference {
    id: ServiceId,
    properties: Properties,
}

impl ServiceReference {
    #[must_use]
    pub const fn new(id: ServiceId, properties: Properties) -> Self {
        Self { id, properties }
    }

    #[must_use]
    pub const fn id(&self) -> ServiceId {
        self.id
    }

    #[must_use]
    pub const fn properties(&self) -> &Properties {
        &self.properties
    }

    #[must_use]
    pub fn ranking(&self) -> i64 {
        self.properties.ranking()
    }
}

impl fmt::Display for ServiceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceReference[{}] {{{}}}", self.id, explode(&self.properties))
    }
}

/// Change notifications for a filtered watch.
///
/// The receiver observes a generation counter that is bumped every time a
/// registration matching the watch filter appears or disappears.
pub struct Watch {
    pub id: WatchId,
    pub changes: watch::Receiver<u64>,
}

/// Registry collaborator used to locate live services.
///
/// References returned by [`Registry::references`] are ordered best first:
/// highest `service.ranking`, then lowest service id.
pub trait Registry: Send + Sync {
    fn references(&self, filter: Option<&Filter>) -> Vec<ServiceReference>;

    fn service(&self, reference: &ServiceReference) -> Option<ServiceObject>;

    fn watch(&self, filter: &Filter) -> Watch;

    fn unwatch(&self, id: WatchId);

    /// Headers describing the module the harness itself runs in.
    fn headers(&self) -> Properties;

    fn modules(&self) -> Vec<ModuleInfo>;
}
