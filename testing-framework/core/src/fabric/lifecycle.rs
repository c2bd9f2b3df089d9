use std::{sync::Arc, time::Duration};

use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};

use super::{
    api::{Container, ContainerState, Coordination, CreateContainerRequest, Fabric, FabricService},
    provision::{wait_for_provision_success, ProvisionError},
};
use crate::{
    config::HarnessConfig,
    registry::{
        find_module, Capability, ModuleInfo, ModuleNotFound, Registry, ResolveError,
        ResolvedService, ServiceResolver,
    },
    DynError,
};

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("coordination client not connected after {timeout:?}: {source}")]
    CoordinationUnavailable {
        timeout: Duration,
        #[source]
        source: DynError,
    },
    #[error("parent container {parent} not found")]
    ParentNotFound { parent: String },
    #[error("failed to look up container {name}: {source}")]
    Lookup {
        name: String,
        #[source]
        source: DynError,
    },
    #[error("container {name} was not created")]
    CreationFailed { name: String },
    #[error("request to create container {name} failed: {source}")]
    Create {
        name: String,
        #[source]
        source: DynError,
    },
    #[error(transparent)]
    Provision(#[from] ProvisionError),
    #[error("container {name} is not visible in the fabric after creation")]
    NotVisible { name: String },
    #[error("containers should have the same id: created {created}, found {found}")]
    IdentityMismatch { created: String, found: String },
    #[error("failed to destroy container {name}: {source}")]
    Destroy {
        name: String,
        #[source]
        source: DynError,
    },
}

/// What a best-effort destroy ended up doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DestroyOutcome {
    Destroyed,
    NotFound,
    Failed { reason: String },
}

/// Drives a fabric from a test scenario.
///
/// Calls are meant to be issued one after another from a single scenario
/// task.
#[derive(Clone)]
pub struct FabricHarness {
    resolver: ServiceResolver,
    config: HarnessConfig,
}

impl FabricHarness {
    #[must_use]
    pub fn new(registry: Arc<dyn Registry>, config: HarnessConfig) -> Self {
        Self {
            resolver: ServiceResolver::new(registry, &config),
            config,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &HarnessConfig {
        &self.config
    }

    #[must_use]
    pub const fn resolver(&self) -> &ServiceResolver {
        &self.resolver
    }

    pub async fn resolve<C: Capability>(&self) -> Result<ResolvedService<C::Service>, ResolveError> {
        self.resolver.resolve::<C>().await
    }

    pub async fn resolve_filtered<C: Capability>(
        &self,
        filter: &str,
    ) -> Result<ResolvedService<C::Service>, ResolveError> {
        self.resolver.resolve_filtered::<C>(filter).await
    }

    pub fn installed_module(&self, symbolic_name: &str) -> Result<ModuleInfo, ModuleNotFound> {
        find_module(self.resolver.registry().as_ref(), symbolic_name)
    }

    /// Polls `container` with the configured interval.
    pub async fn wait_for_provision_success(
        &self,
        container: &dyn Container,
        timeout: Duration,
    ) -> Result<ContainerState, ProvisionError> {
        wait_for_provision_success(container, timeout, self.config.poll_interval).await
    }

    /// Creates `name` as a child of `parent` and waits for it to provision.
    pub async fn create_child_container(
        &self,
        name: &str,
        parent: &str,
    ) -> Result<Arc<dyn Container>, LifecycleError> {
        let fabric = self.connect().await?;

        let parent_container = fabric
            .container(parent)
            .await
            .map_err(|source| LifecycleError::Lookup {
                name: parent.to_owned(),
                source,
            })?;
        if parent_container.is_none() {
            return Err(LifecycleError::ParentNotFound {
                parent: parent.to_owned(),
            });
        }

        let request = CreateContainerRequest::child(name, parent);
        info!(container = name, parent, "creating child container");
        let created = fabric
            .create_containers(&request)
            .await
            .map_err(|source| LifecycleError::Create {
                name: name.to_owned(),
                source,
            })?;
        let Some(container) = created.into_iter().next() else {
            return Err(LifecycleError::CreationFailed {
                name: name.to_owned(),
            });
        };

        self.wait_for_provision_success(container.as_ref(), self.config.provision_timeout)
            .await?;
        Ok(container)
    }

    /// Creates a child container and checks the fabric hands back the same
    /// container when asked for it by name.
    pub async fn create_and_assert_child_container(
        &self,
        name: &str,
        parent: &str,
    ) -> Result<Arc<dyn Container>, LifecycleError> {
        let created = self.create_child_container(name, parent).await?;

        let fabric = self.resolver.resolve::<Fabric>().await?;
        let found = fabric
            .container(name)
            .await
            .map_err(|source| LifecycleError::Lookup {
                name: name.to_owned(),
                source,
            })?
            .ok_or_else(|| LifecycleError::NotVisible {
                name: name.to_owned(),
            })?;

        if found.id() != created.id() {
            return Err(LifecycleError::IdentityMismatch {
                created: created.id().to_owned(),
                found: found.id().to_owned(),
            });
        }
        Ok(created)
    }

    /// Destroys `name` if it exists. Failures are logged, never returned.
    ///
    /// The coordination client has to be registered but not connected.
    pub async fn destroy_child_container(&self, name: &str) -> DestroyOutcome {
        match self.try_destroy(name).await {
            Ok(true) => {
                info!(container = name, "destroyed container");
                DestroyOutcome::Destroyed
            }
            Ok(false) => {
                warn!(container = name, "container to destroy does not exist");
                DestroyOutcome::NotFound
            }
            Err(err) => {
                warn!(container = name, "failed to destroy container: {err}");
                DestroyOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn try_destroy(&self, name: &str) -> Result<bool, LifecycleError> {
        self.resolver.resolve::<Coordination>().await?.release();
        let fabric = self.settled_fabric().await?;

        let Some(container) =
            fabric
                .container(name)
                .await
                .map_err(|source| LifecycleError::Lookup {
                    name: name.to_owned(),
                    source,
                })?
        else {
            return Ok(false);
        };

        container
            .destroy()
            .await
            .map_err(|source| LifecycleError::Destroy {
                name: name.to_owned(),
                source,
            })?;
        Ok(true)
    }

    /// Waits for the coordination client to connect, then hands out the
    /// settled fabric service.
    async fn connect(&self) -> Result<ResolvedService<dyn FabricService>, LifecycleError> {
        let coordination = self.resolver.resolve::<Coordination>().await?;
        let timeout = self.config.coordination_timeout;
        coordination
            .await_connected(timeout)
            .await
            .map_err(|source| LifecycleError::CoordinationUnavailable { timeout, source })?;
        coordination.release();

        self.settled_fabric().await
    }

    async fn settled_fabric(&self) -> Result<ResolvedService<dyn FabricService>, LifecycleError> {
        let fabric = self.resolver.resolve::<Fabric>().await?;
        sleep(self.config.settle_delay).await;
        Ok(fabric)
    }
}
