use std::{sync::Arc, time::Duration};

use fabric_testing_core::{
    fabric::{Fabric, FabricService},
    registry::{FilterErrorKind, ModuleState, Properties, ResolveError},
};
use tests::common::{Deployment, MemoryFabric, ScriptedContainer, HARNESS_MODULE};
use tokio::time::Instant;

#[tokio::test(start_paused = true)]
async fn filter_selects_between_fabrics() {
    let deployment = Deployment::new(MemoryFabric::new());
    let remote = Arc::new(
        MemoryFabric::new().with_container(ScriptedContainer::provisioned("remote-node")),
    );
    let service: Arc<dyn FabricService> = remote.clone();
    deployment
        .registry
        .register::<Fabric>(service, Properties::new().with("fabric.zone", "remote"));

    let resolved = deployment
        .harness
        .resolve_filtered::<Fabric>("fabric.zone=remote")
        .await
        .unwrap();

    assert!(resolved.container("remote-node").await.unwrap().is_some());
    assert!(resolved.is_registered());

    let local = deployment.harness.resolve::<Fabric>().await.unwrap();
    assert!(local.container("remote-node").await.unwrap().is_none());
}

#[tokio::test(start_paused = true)]
async fn late_fabric_registration_is_picked_up() {
    let deployment = Deployment::without_fabric();
    let registry = Arc::clone(&deployment.registry);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        let service: Arc<dyn FabricService> = Arc::new(MemoryFabric::new());
        registry.register::<Fabric>(service, Properties::new());
    });
    let started = Instant::now();

    let resolved = deployment.harness.resolve::<Fabric>().await.unwrap();

    assert!(started.elapsed() >= Duration::from_secs(3));
    assert!(started.elapsed() < deployment.harness.config().resolve_timeout);
    resolved.release();
    assert_eq!(deployment.registry.active_watches(), 0);
}

#[tokio::test(start_paused = true)]
async fn unregistered_fabric_is_no_longer_resolved() {
    let mut deployment = Deployment::new(MemoryFabric::new());
    let resolved = deployment.harness.resolve::<Fabric>().await.unwrap();

    assert!(deployment.unregister_fabric());

    assert!(!resolved.is_registered());
    let err = deployment.harness.resolve::<Fabric>().await.unwrap_err();
    assert!(matches!(err, ResolveError::Timeout { .. }), "{err}");
}

#[tokio::test(start_paused = true)]
async fn malformed_filter_fails_without_waiting() {
    let deployment = Deployment::new(MemoryFabric::new());
    let started = Instant::now();

    let err = deployment
        .harness
        .resolve_filtered::<Fabric>("(fabric.zone=remote")
        .await
        .unwrap_err();

    match err {
        ResolveError::InvalidFilter(err) => {
            assert_eq!(err.kind(), FilterErrorKind::UnexpectedEnd);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(deployment.registry.active_watches(), 0);
}

#[tokio::test(start_paused = true)]
async fn installed_module_is_found_by_name() {
    let deployment = Deployment::new(MemoryFabric::new());

    let module = deployment.harness.installed_module(HARNESS_MODULE).unwrap();

    assert_eq!(module.symbolic_name, HARNESS_MODULE);
    assert_eq!(module.state, ModuleState::Active);
}

#[tokio::test(start_paused = true)]
async fn missing_module_is_reported() {
    let deployment = Deployment::new(MemoryFabric::new());

    let err = deployment
        .harness
        .installed_module("fabric.agent")
        .unwrap_err();

    assert_eq!(err.symbolic_name, "fabric.agent");
}
