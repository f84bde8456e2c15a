//! Module declaration and lifecycle implementation

use crate::config::Config;
use crate::contract::SettingApplier;
use crate::domain::{
    AllowAllCompatibility, ApplyService, ApplyingCascadeHandler, Backends, CascadeHandler,
    CompatibilityFilter, DependencyResolver, DiscoveryService, EventPublisher, ExecutorOptions,
    NoOpEventPublisher, OperationExecutor, SettingsCatalog, WaveBridge,
};
use crate::infra::{CachingDiscovery, StaticSettingsCatalog};
use anyhow::Result;
use parking_lot::RwLock;
use std::sync::Arc;

/// External collaborators the engine is wired with
pub struct EnginePorts {
    /// Settings catalog; loaded from `Config::catalog_path` when unset
    pub catalog: Option<Arc<dyn SettingsCatalog>>,
    pub discovery: Arc<dyn DiscoveryService>,
    pub compatibility: Arc<dyn CompatibilityFilter>,
    pub backends: Backends,
    /// Cascade handler; enables prerequisites and disables dependents when unset
    pub cascade: Option<Arc<dyn CascadeHandler>>,
    pub event_publisher: Arc<dyn EventPublisher>,
}

impl EnginePorts {
    pub fn new(discovery: Arc<dyn DiscoveryService>, backends: Backends) -> Self {
        Self {
            catalog: None,
            discovery,
            compatibility: Arc::new(AllowAllCompatibility),
            backends,
            cascade: None,
            event_publisher: Arc::new(NoOpEventPublisher),
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn SettingsCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_compatibility(mut self, compatibility: Arc<dyn CompatibilityFilter>) -> Self {
        self.compatibility = compatibility;
        self
    }

    pub fn with_cascade_handler(mut self, cascade: Arc<dyn CascadeHandler>) -> Self {
        self.cascade = Some(cascade);
        self
    }

    pub fn with_event_publisher(mut self, event_publisher: Arc<dyn EventPublisher>) -> Self {
        self.event_publisher = event_publisher;
        self
    }
}

/// Settings engine module
pub struct SettingsEngineModule {
    config: RwLock<Config>,
    service: RwLock<Option<Arc<ApplyService>>>,
    wave_bridge: RwLock<Option<Arc<WaveBridge>>>,
}

impl Default for SettingsEngineModule {
    fn default() -> Self {
        Self {
            config: RwLock::new(Config::default()),
            service: RwLock::new(None),
            wave_bridge: RwLock::new(None),
        }
    }
}

impl SettingsEngineModule {
    /// Build the apply service and wave bridge from configuration and ports
    pub fn init(&self, cfg: Config, ports: EnginePorts) -> Result<()> {
        *self.config.write() = cfg.clone();

        // Catalog: supplied, or loaded from the configured file
        let catalog: Arc<dyn SettingsCatalog> = match ports.catalog {
            Some(catalog) => catalog,
            None => {
                let path = cfg
                    .catalog_path
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("No settings catalog supplied or configured"))?;
                Arc::new(StaticSettingsCatalog::load(path)?)
            }
        };

        let discovery: Arc<dyn DiscoveryService> = if cfg.discovery_cache {
            Arc::new(CachingDiscovery::new(ports.discovery))
        } else {
            ports.discovery
        };

        let cascade: Arc<dyn CascadeHandler> = match ports.cascade {
            Some(cascade) => cascade,
            None => Arc::new(ApplyingCascadeHandler::new(catalog.clone(), discovery.clone())),
        };

        let resolver = DependencyResolver::new(
            catalog.clone(),
            discovery.clone(),
            ports.compatibility.clone(),
            cascade,
        );
        let scripts = ports.backends.scripts.clone();
        let executor = OperationExecutor::new(
            ports.backends,
            ExecutorOptions {
                scratch_dir: cfg.scratch_dir.clone(),
                prefer_interactive_user: cfg.prefer_interactive_user,
            },
        );

        // Build domain service
        let service = Arc::new(ApplyService::new(
            catalog.clone(),
            discovery,
            scripts,
            resolver,
            executor,
            ports.event_publisher,
        ));
        *self.service.write() = Some(service.clone());

        let applier: Arc<dyn SettingApplier> = service;
        let wave_bridge = Arc::new(WaveBridge::new(
            catalog,
            ports.compatibility,
            applier,
            cfg.max_parallelism,
        ));
        *self.wave_bridge.write() = Some(wave_bridge);

        tracing::info!(
            max_parallelism = cfg.max_parallelism,
            discovery_cache = cfg.discovery_cache,
            "Settings engine initialized"
        );
        Ok(())
    }

    /// Load configuration through figment, then initialize
    pub fn init_from_file(&self, path: Option<&std::path::Path>, ports: EnginePorts) -> Result<()> {
        let cfg = Config::load(path)?;
        self.init(cfg, ports)
    }

    pub fn config(&self) -> Config {
        self.config.read().clone()
    }

    pub fn service(&self) -> Result<Arc<ApplyService>> {
        self.service
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Service not initialized"))
    }

    pub fn wave_bridge(&self) -> Result<Arc<WaveBridge>> {
        self.wave_bridge
            .read()
            .as_ref()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("Wave bridge not initialized"))
    }
}
