use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use fabric_testing_core::{
    fabric::{
        Container, ContainerState, CoordinationClient, CreateContainerRequest, FabricService,
        PROVISION_SUCCESS,
    },
    DynError,
};
use tracing::debug;

#[must_use]
pub fn pending() -> ContainerState {
    ContainerState {
        provision_status: "downloading".to_owned(),
        ..ContainerState::default()
    }
}

#[must_use]
pub fn provisioned() -> ContainerState {
    ContainerState {
        alive: true,
        provisioning_complete: true,
        provision_status: PROVISION_SUCCESS.to_owned(),
        provision_exception: None,
    }
}

#[must_use]
pub fn failed(reason: &str) -> ContainerState {
    ContainerState {
        alive: true,
        provision_status: "error".to_owned(),
        provision_exception: Some(reason.to_owned()),
        ..ContainerState::default()
    }
}

/// Container whose state walks through a fixed script, one step per read.
/// The last step repeats forever.
pub struct ScriptedContainer {
    id: String,
    steps: Mutex<VecDeque<ContainerState>>,
    polls: AtomicUsize,
    destroyed: AtomicBool,
    destroy_error: Option<String>,
}

impl ScriptedContainer {
    pub fn new(id: impl Into<String>, steps: impl IntoIterator<Item = ContainerState>) -> Self {
        Self {
            id: id.into(),
            steps: Mutex::new(steps.into_iter().collect()),
            polls: AtomicUsize::new(0),
            destroyed: AtomicBool::new(false),
            destroy_error: None,
        }
    }

    pub fn provisioned(id: impl Into<String>) -> Self {
        Self::new(id, [provisioned()])
    }

    #[must_use]
    pub fn failing_destroy(mut self, reason: &str) -> Self {
        self.destroy_error = Some(reason.to_owned());
        self
    }

    pub fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Container for ScriptedContainer {
    fn id(&self) -> &str {
        &self.id
    }

    async fn state(&self) -> Result<ContainerState, DynError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut steps = self.steps.lock().unwrap();
        let state = if steps.len() > 1 {
            steps.pop_front().unwrap_or_default()
        } else {
            steps.front().cloned().unwrap_or_default()
        };
        Ok(state)
    }

    async fn destroy(&self) -> Result<(), DynError> {
        if let Some(reason) = &self.destroy_error {
            return Err(reason.clone().into());
        }
        self.destroyed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Fabric keeping its containers in memory.
///
/// Creations only succeed for names that have a planned provisioning script.
#[derive(Default)]
pub struct MemoryFabric {
    containers: Mutex<HashMap<String, Arc<ScriptedContainer>>>,
    plans: Mutex<HashMap<String, Vec<ContainerState>>>,
    requests: Mutex<Vec<CreateContainerRequest>>,
    lookup_failure: Mutex<Option<String>>,
}

impl MemoryFabric {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_container(self, container: ScriptedContainer) -> Self {
        self.add_container(Arc::new(container));
        self
    }

    /// Script the states a container named `name` goes through once created.
    #[must_use]
    pub fn with_plan(self, name: &str, steps: impl IntoIterator<Item = ContainerState>) -> Self {
        self.plans
            .lock()
            .unwrap()
            .insert(name.to_owned(), steps.into_iter().collect());
        self
    }

    pub fn add_container(&self, container: Arc<ScriptedContainer>) {
        self.containers
            .lock()
            .unwrap()
            .insert(container.id().to_owned(), container);
    }

    pub fn fail_lookups(&self, reason: &str) {
        *self.lookup_failure.lock().unwrap() = Some(reason.to_owned());
    }

    pub fn get(&self, name: &str) -> Option<Arc<ScriptedContainer>> {
        self.containers.lock().unwrap().get(name).cloned()
    }

    pub fn requests(&self) -> Vec<CreateContainerRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl FabricService for MemoryFabric {
    async fn container(&self, name: &str) -> Result<Option<Arc<dyn Container>>, DynError> {
        if let Some(reason) = self.lookup_failure.lock().unwrap().clone() {
            return Err(reason.into());
        }
        Ok(self
            .get(name)
            .filter(|container| !container.is_destroyed())
            .map(|container| container as Arc<dyn Container>))
    }

    async fn create_containers(
        &self,
        request: &CreateContainerRequest,
    ) -> Result<Vec<Arc<dyn Container>>, DynError> {
        self.requests.lock().unwrap().push(request.clone());

        let Some(steps) = self.plans.lock().unwrap().remove(request.name()) else {
            debug!(container = request.name(), "no plan for container, creating nothing");
            return Ok(Vec::new());
        };
        let container = Arc::new(ScriptedContainer::new(request.name(), steps));
        self.add_container(Arc::clone(&container));
        Ok(vec![container as Arc<dyn Container>])
    }
}

/// Coordination client that is either connected or never connects.
pub struct StaticCoordination {
    connected: bool,
}

impl StaticCoordination {
    #[must_use]
    pub const fn connected() -> Self {
        Self { connected: true }
    }

    #[must_use]
    pub const fn disconnected() -> Self {
        Self { connected: false }
    }
}

#[async_trait]
impl CoordinationClient for StaticCoordination {
    async fn await_connected(&self, timeout: Duration) -> Result<(), DynError> {
        if self.connected {
            return Ok(());
        }
        tokio::time::sleep(timeout).await;
        Err("coordination registry unreachable".into())
    }
}
