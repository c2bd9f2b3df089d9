use std::time::Duration;

use thiserror::Error;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::api::{Container, ContainerState};
use crate::DynError;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("container {id} failed to provision: {reason}")]
    Failed { id: String, reason: String },
    #[error("could not provision {id} after {timeout:?}")]
    Timeout { id: String, timeout: Duration },
    #[error("container {id} finished provisioning with status `{status}` after {timeout:?}")]
    StatusMismatch {
        id: String,
        status: String,
        timeout: Duration,
    },
    #[error("failed to read provisioning state of {id}: {source}")]
    State {
        id: String,
        #[source]
        source: DynError,
    },
}

/// Polls `container` until it reports a successful provision.
///
/// The state is read before the first sleep, so even a timeout shorter than
/// `poll_interval` gets one check. A provision exception fails the wait
/// immediately, whatever the other fields say.
pub async fn wait_for_provision_success(
    container: &dyn Container,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<ContainerState, ProvisionError> {
    let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);
    let started = Instant::now();
    let state = loop {
        let state = read_state(container).await?;

        if let Some(reason) = &state.provision_exception {
            return Err(ProvisionError::Failed {
                id: container.id().to_owned(),
                reason: reason.clone(),
            });
        }
        if state.is_provisioned() {
            info!(container = container.id(), elapsed = ?started.elapsed(), "container provisioned");
            return Ok(state);
        }
        if started.elapsed() >= timeout {
            break state;
        }

        debug!(
            container = container.id(),
            alive = state.alive,
            complete = state.provisioning_complete,
            status = %state.provision_status,
            "waiting for provisioning"
        );
        sleep(poll_interval).await;
    };

    if state.alive && state.provisioning_complete {
        return Err(ProvisionError::StatusMismatch {
            id: container.id().to_owned(),
            status: state.provision_status,
            timeout,
        });
    }
    Err(ProvisionError::Timeout {
        id: container.id().to_owned(),
        timeout,
    })
}

async fn read_state(container: &dyn Container) -> Result<ContainerState, ProvisionError> {
    container
        .state()
        .await
        .map_err(|source| ProvisionError::State {
            id: container.id().to_owned(),
            source,
        })
}
