//! Contract layer - public API shared with callers
//!
//! This layer contains transport-agnostic models and the apply client trait.

pub mod client;
pub mod error;
pub mod model;

pub use client::SettingApplier;
pub use error::EngineError;
pub use model::{
    ApplyRequest, ConfigurationItem, ConfigurationSection, Confirmation, DependencyKind,
    InputKind, NumericRange, OperationResult, PowerConfigOperation, PresetMap, RawImportBlock,
    RegistryOperation, RegistryValue, RegistryValueKind, RestartTarget, ScheduledTaskOperation,
    ScriptOperation, SelectionOption, SelectionOptions, SettingDefinition, SettingDependency,
    SettingOperation, SettingState, SettingValue, ValueMap,
};
