use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use tokio::sync::watch;
use tracing::debug;

use super::{
    properties::{OBJECT_CLASS, SERVICE_ID},
    Capability, Filter, ModuleInfo, Properties, Registry, ServiceId, ServiceObject,
    ServiceReference, Watch, WatchId,
};

/// In-process registry backing embedded runtimes and scenario tests.
#[derive(Default)]
pub struct InMemoryRegistry {
    state: Mutex<State>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ServiceRegistration {
    id: ServiceId,
}

impl ServiceRegistration {
    #[must_use]
    pub const fn id(&self) -> ServiceId {
        self.id
    }
}

#[derive(Default)]
struct State {
    next_service_id: u64,
    next_watch_id: u64,
    services: BTreeMap<ServiceId, Entry>,
    watches: HashMap<WatchId, WatchEntry>,
    headers: Properties,
    modules: Vec<ModuleInfo>,
}

struct Entry {
    reference: ServiceReference,
    object: ServiceObject,
}

struct WatchEntry {
    filter: Filter,
    changes: watch::Sender<u64>,
}

impl State {
    fn notify(&self, reference: &ServiceReference) {
        for entry in self.watches.values() {
            if entry.filter.matches(reference.properties()) {
                entry.changes.send_modify(|generation| *generation += 1);
            }
        }
    }
}

impl InMemoryRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_headers(self, headers: Properties) -> Self {
        self.lock().headers = headers;
        self
    }

    /// Registers `service` under the capability's object class.
    pub fn register<C: Capability>(
        &self,
        service: Arc<C::Service>,
        properties: Properties,
    ) -> ServiceRegistration {
        self.register_object(&[C::OBJECT_CLASS], Arc::new(service), properties)
    }

    /// Registers an already erased object under the given object classes.
    pub fn register_object(
        &self,
        object_classes: &[&str],
        object: ServiceObject,
        mut properties: Properties,
    ) -> ServiceRegistration {
        let mut state = self.lock();
        state.next_service_id += 1;
        let id = ServiceId(state.next_service_id);

        properties.insert(
            OBJECT_CLASS,
            object_classes
                .iter()
                .map(|class| (*class).to_owned())
                .collect::<Vec<_>>(),
        );
        properties.insert(SERVICE_ID, i64::try_from(id.0).unwrap_or(i64::MAX));
        let reference = ServiceReference::new(id, properties);

        debug!(service = %reference, "registering service");
        state.notify(&reference);
        state.services.insert(id, Entry { reference, object });

        ServiceRegistration { id }
    }

    /// Removes a registration; returns `false` when it was already gone.
    pub fn unregister(&self, registration: ServiceRegistration) -> bool {
        let mut state = self.lock();
        let Some(entry) = state.services.remove(&registration.id) else {
            return false;
        };
        debug!(service = %entry.reference, "unregistering service");
        state.notify(&entry.reference);
        true
    }

    pub fn install_module(&self, module: ModuleInfo) {
        self.lock().modules.push(module);
    }

    /// Number of watches currently open against this registry.
    #[must_use]
    pub fn active_watches(&self) -> usize {
        self.lock().watches.len()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Registry for InMemoryRegistry {
    fn references(&self, filter: Option<&Filter>) -> Vec<ServiceReference> {
        let state = self.lock();
        let mut references: Vec<_> = state
            .services
            .values()
            .filter(|entry| filter.is_none_or(|filter| filter.matches(entry.reference.properties())))
            .map(|entry| entry.reference.clone())
            .collect();
        references.sort_by(|left, right| {
            right
                .ranking()
                .cmp(&left.ranking())
                .then_with(|| left.id().cmp(&right.id()))
        });
        references
    }

    fn service(&self, reference: &ServiceReference) -> Option<ServiceObject> {
        self.lock()
            .services
            .get(&reference.id())
            .map(|entry| Arc::clone(&entry.object))
    }

    fn watch(&self, filter: &Filter) -> Watch {
        let mut state = self.lock();
        state.next_watch_id += 1;
        let id = WatchId(state.next_watch_id);
        let (sender, changes) = watch::channel(0);
        state.watches.insert(
            id,
            WatchEntry {
                filter: filter.clone(),
                changes: sender,
            },
        );
        Watch { id, changes }
    }

    fn unwatch(&self, id: WatchId) {
        self.lock().watches.remove(&id);
    }

    fn headers(&self) -> Properties {
        self.lock().headers.clone()
    }

    fn modules(&self) -> Vec<ModuleInfo> {
        self.lock().modules.clone()
    }
}
