//! Settings Engine Module
//!
//! Dependency-aware application of machine settings. Each setting maps to a
//! list of heterogeneous backend operations; the engine resolves prerequisites
//! and cascades between settings, executes operation lists as one unit, and
//! applies batches of changes in dependency-ordered waves.

// Public exports
pub mod contract;
pub use contract::{
    client::SettingApplier, error::EngineError, ApplyRequest, ConfigurationItem,
    ConfigurationSection, OperationResult, SettingDefinition, SettingState, SettingValue,
};

pub mod module;
pub use module::{EnginePorts, SettingsEngineModule};

pub mod config;
pub mod domain;
pub mod infra;
