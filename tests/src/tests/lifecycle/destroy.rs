use fabric_testing_core::fabric::DestroyOutcome;
use tests::common::{
    Deployment, MemoryFabric, ScriptedContainer, StaticCoordination, ROOT_CONTAINER,
};

#[tokio::test(start_paused = true)]
async fn existing_container_is_destroyed() {
    let deployment = Deployment::new(
        MemoryFabric::new()
            .with_container(ScriptedContainer::provisioned(ROOT_CONTAINER))
            .with_container(ScriptedContainer::provisioned("node2")),
    );

    let outcome = deployment.harness.destroy_child_container("node2").await;

    assert_eq!(outcome, DestroyOutcome::Destroyed);
    assert!(deployment.fabric.get("node2").unwrap().is_destroyed());
    assert!(!deployment.fabric.get(ROOT_CONTAINER).unwrap().is_destroyed());
    assert_eq!(deployment.registry.active_watches(), 0);
}

#[tokio::test(start_paused = true)]
async fn destroying_twice_reports_missing_container() {
    let deployment =
        Deployment::new(MemoryFabric::new().with_container(ScriptedContainer::provisioned("node2")));

    assert_eq!(
        deployment.harness.destroy_child_container("node2").await,
        DestroyOutcome::Destroyed
    );
    assert_eq!(
        deployment.harness.destroy_child_container("node2").await,
        DestroyOutcome::NotFound
    );
}

#[tokio::test(start_paused = true)]
async fn unknown_container_is_not_found() {
    let deployment = Deployment::new(MemoryFabric::new());

    assert_eq!(
        deployment.harness.destroy_child_container("ghost").await,
        DestroyOutcome::NotFound
    );
}

#[tokio::test(start_paused = true)]
async fn destroy_failure_is_reported_not_raised() {
    let deployment = Deployment::new(MemoryFabric::new().with_container(
        ScriptedContainer::provisioned("node2").failing_destroy("agent not responding"),
    ));

    let outcome = deployment.harness.destroy_child_container("node2").await;

    let DestroyOutcome::Failed { reason } = &outcome else {
        panic!("unexpected outcome: {outcome:?}");
    };
    assert!(reason.contains("node2"), "{reason}");
    assert!(reason.contains("agent not responding"), "{reason}");
    assert!(!deployment.fabric.get("node2").unwrap().is_destroyed());
}

#[tokio::test(start_paused = true)]
async fn lookup_failure_is_reported_not_raised() {
    let deployment =
        Deployment::new(MemoryFabric::new().with_container(ScriptedContainer::provisioned("node2")));
    deployment.fabric.fail_lookups("fabric unavailable");

    let outcome = deployment.harness.destroy_child_container("node2").await;

    assert!(
        matches!(&outcome, DestroyOutcome::Failed { reason } if reason.contains("fabric unavailable")),
        "{outcome:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn missing_fabric_service_is_reported_not_raised() {
    let deployment = Deployment::without_fabric();

    let outcome = deployment.harness.destroy_child_container("node2").await;

    assert!(
        matches!(&outcome, DestroyOutcome::Failed { reason } if reason.contains("fabric.FabricService")),
        "{outcome:?}"
    );
    assert_eq!(deployment.registry.active_watches(), 0);
}

#[tokio::test(start_paused = true)]
async fn destroy_does_not_wait_for_coordination_connection() {
    let deployment = Deployment::with_coordination(
        MemoryFabric::new().with_container(ScriptedContainer::provisioned("node2")),
        StaticCoordination::disconnected(),
    );

    let outcome = deployment.harness.destroy_child_container("node2").await;

    assert_eq!(outcome, DestroyOutcome::Destroyed);
    assert!(deployment.fabric.get("node2").unwrap().is_destroyed());
}
