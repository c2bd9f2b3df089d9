//! Client side of the container orchestration service.

pub mod api;
mod lifecycle;
mod provision;

pub use api::{
    Container, ContainerKind, ContainerState, Coordination, CoordinationClient,
    CreateContainerRequest, Fabric, FabricService, PROVISION_SUCCESS,
};
pub use lifecycle::{DestroyOutcome, FabricHarness, LifecycleError};
pub use provision::{wait_for_provision_success, ProvisionError};
