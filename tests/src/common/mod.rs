pub mod fabric;

use std::sync::Arc;

use fabric_testing_core::{
    fabric::{Coordination, CoordinationClient, Fabric, FabricService},
    logging,
    registry::{InMemoryRegistry, ModuleInfo, Properties, Registry, ServiceRegistration},
    FabricHarness, HarnessConfig,
};

pub use self::fabric::{
    failed, pending, provisioned, MemoryFabric, ScriptedContainer, StaticCoordination,
};

pub const ROOT_CONTAINER: &str = "node1";
pub const HARNESS_MODULE: &str = "fabric.itests";

/// A registry populated with a fabric and a coordination client, plus a
/// harness driving them.
pub struct Deployment {
    pub registry: Arc<InMemoryRegistry>,
    pub fabric: Arc<MemoryFabric>,
    pub harness: FabricHarness,
    fabric_registration: Option<ServiceRegistration>,
}

impl Deployment {
    #[must_use]
    pub fn new(fabric: MemoryFabric) -> Self {
        Self::with_coordination(fabric, StaticCoordination::connected())
    }

    #[must_use]
    pub fn with_coordination(fabric: MemoryFabric, coordination: StaticCoordination) -> Self {
        Self::build(Some(fabric), coordination, HarnessConfig::default())
    }

    /// Deployment whose registry never gets a fabric service.
    #[must_use]
    pub fn without_fabric() -> Self {
        Self::build(None, StaticCoordination::connected(), HarnessConfig::default())
    }

    #[must_use]
    pub fn with_config(fabric: MemoryFabric, config: HarnessConfig) -> Self {
        Self::build(Some(fabric), StaticCoordination::connected(), config)
    }

    fn build(
        fabric: Option<MemoryFabric>,
        coordination: StaticCoordination,
        config: HarnessConfig,
    ) -> Self {
        logging::init_for_tests();

        let headers = Properties::new()
            .with("Bundle-SymbolicName", HARNESS_MODULE)
            .with("Bundle-Version", "1.0.0");
        let registry = Arc::new(InMemoryRegistry::new().with_headers(headers));
        registry.install_module(ModuleInfo::new(HARNESS_MODULE, "1.0.0"));

        let coordination: Arc<dyn CoordinationClient> = Arc::new(coordination);
        registry.register::<Coordination>(coordination, Properties::new());

        let fabric_registration;
        let fabric = if let Some(fabric) = fabric {
            let fabric = Arc::new(fabric);
            let service: Arc<dyn FabricService> = fabric.clone();
            fabric_registration = Some(registry.register::<Fabric>(
                service,
                Properties::new().with("fabric.zone", "local"),
            ));
            fabric
        } else {
            fabric_registration = None;
            Arc::new(MemoryFabric::new())
        };

        let shared: Arc<dyn Registry> = registry.clone();
        Self {
            harness: FabricHarness::new(shared, config),
            registry,
            fabric,
            fabric_registration,
        }
    }

    /// Takes the fabric service out of the registry.
    pub fn unregister_fabric(&mut self) -> bool {
        self.fabric_registration
            .take()
            .is_some_and(|registration| self.registry.unregister(registration))
    }
}
