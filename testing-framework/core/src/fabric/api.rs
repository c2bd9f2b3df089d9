use std::{fmt, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{registry::Capability, DynError};

/// Provision status reported by a container that finished successfully.
pub const PROVISION_SUCCESS: &str = "success";

/// Snapshot of a container's provisioning fields.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ContainerState {
    pub alive: bool,
    pub provisioning_complete: bool,
    pub provision_status: String,
    pub provision_exception: Option<String>,
}

impl ContainerState {
    /// Alive, done provisioning, and reporting `success`.
    #[must_use]
    pub fn is_provisioned(&self) -> bool {
        self.alive && self.provisioning_complete && self.provision_status == PROVISION_SUCCESS
    }
}

/// Handle to a container managed by the fabric.
#[async_trait]
pub trait Container: Send + Sync {
    fn id(&self) -> &str;

    async fn state(&self) -> Result<ContainerState, DynError>;

    async fn destroy(&self) -> Result<(), DynError>;
}

impl fmt::Debug for dyn Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container").field("id", &self.id()).finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerKind {
    Child,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateContainerRequest {
    kind: ContainerKind,
    name: String,
    parent: String,
}

impl CreateContainerRequest {
    /// A container started as a child process of `parent`.
    #[must_use]
    pub fn child(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            kind: ContainerKind::Child,
            name: name.into(),
            parent: parent.into(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ContainerKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn parent(&self) -> &str {
        &self.parent
    }
}

/// Orchestration service managing the containers of a fabric.
#[async_trait]
pub trait FabricService: Send + Sync {
    async fn container(&self, name: &str) -> Result<Option<Arc<dyn Container>>, DynError>;

    async fn create_containers(
        &self,
        request: &CreateContainerRequest,
    ) -> Result<Vec<Arc<dyn Container>>, DynError>;
}

/// Client of the coordination registry the fabric stores its state in.
#[async_trait]
pub trait CoordinationClient: Send + Sync {
    async fn await_connected(&self, timeout: Duration) -> Result<(), DynError>;
}

pub struct Fabric;

impl Capability for Fabric {
    const OBJECT_CLASS: &'static str = "fabric.FabricService";
    type Service = dyn FabricService;
}

pub struct Coordination;

impl Capability for Coordination {
    const OBJECT_CLASS: &'static str = "fabric.coordination.Client";
    type Service = dyn CoordinationClient;
}
