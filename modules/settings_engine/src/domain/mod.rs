//! Domain layer - dependency resolution, execution and batch application

pub mod cascade;
pub mod events;
pub mod executor;
pub mod graph;
pub mod ports;
pub mod resolver;
pub mod service;
pub mod validation;
pub mod wave;

pub use cascade::{ApplyingCascadeHandler, CascadeHandler, NoOpCascadeHandler, ResolveContext};
pub use events::{EventPublisher, NoOpEventPublisher, SettingEvent};
pub use executor::{Backends, ExecutorOptions, OperationExecutor};
pub use graph::DependencyGraph;
pub use ports::{
    AllowAllCompatibility, CompatibilityFilter, ConfirmHandler, DiscoveryService, ImportContext,
    NoInteractiveSession, NoOpRestarter, PowerConfigBackend, ProcessRestarter, RegistryImporter,
    RegistryStore, ScheduledTaskBackend, ScriptRunner, SessionProvider, SettingsCatalog,
    UserSession,
};
pub use resolver::DependencyResolver;
pub use service::ApplyService;
pub use wave::{plan_waves, SectionOutcome, WaveBridge};
