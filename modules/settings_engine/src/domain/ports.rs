//! Port traits for external collaborators
//!
//! These traits define the interface to everything the engine drives or queries.
//! Implementations live with the host application; `infra` ships the generic ones.

use super::graph::DependencyGraph;
use crate::contract::{
    Confirmation, DependencyKind, PowerConfigOperation, RegistryOperation, RegistryValue, SettingDefinition,
    SettingState, SettingValue,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// Lookup of setting definitions
#[async_trait]
pub trait SettingsCatalog: Send + Sync {
    /// Find a setting by id
    async fn get_setting(&self, id: &str) -> Result<Option<SettingDefinition>>;

    /// Enumerate every known setting
    async fn get_all_settings(&self) -> Result<Vec<SettingDefinition>>;

    /// Settings declaring a dependency of `kind` on `id`, across the whole catalog
    async fn get_dependents(&self, id: &str, kind: DependencyKind) -> Result<Vec<SettingDefinition>> {
        let all = self.get_all_settings().await?;
        let graph = DependencyGraph::from_definitions(&all);
        let dependent_ids = graph.dependents_of(id, kind);
        Ok(all
            .iter()
            .filter(|s| dependent_ids.contains(&s.id.as_str()))
            .cloned()
            .collect())
    }
}

/// Batched query of current setting state
#[async_trait]
pub trait DiscoveryService: Send + Sync {
    /// Query current state; ids the service does not know are omitted
    async fn get_states(
        &self,
        definitions: &[SettingDefinition],
    ) -> Result<HashMap<String, SettingState>>;

    /// Drop cached state for the given ids
    fn invalidate(&self, _ids: &[String]) {}

    /// Drop all cached state
    fn invalidate_all(&self) {}
}

/// Narrows a setting set to the ones valid on the running platform
#[async_trait]
pub trait CompatibilityFilter: Send + Sync {
    async fn filter(&self, definitions: Vec<SettingDefinition>) -> Result<Vec<SettingDefinition>>;
}

/// Key/value store writes
#[async_trait]
pub trait RegistryStore: Send + Sync {
    /// Write one registry operation.
    ///
    /// `value` overrides the operation's declared enabled value; when `enable`
    /// is false the declared disabled value is written (or the value deleted).
    async fn apply(
        &self,
        operation: &RegistryOperation,
        enable: bool,
        value: Option<&RegistryValue>,
    ) -> Result<()>;
}

/// Scheduled task state
#[async_trait]
pub trait ScheduledTaskBackend: Send + Sync {
    async fn set_enabled(&self, task_path: &str, enable: bool) -> Result<()>;
}

/// Script and command execution
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, name: &str, script: &str) -> Result<()>;
}

/// Power profile writes
#[async_trait]
pub trait PowerConfigBackend: Send + Sync {
    async fn apply(&self, operation: &PowerConfigOperation, value: i64) -> Result<()>;
}

/// Security context used for a raw import
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportContext {
    /// Import on behalf of the interactive user
    InteractiveUser(UserSession),
    /// Import in the current process context
    Direct,
}

/// Interactive user session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSession {
    pub session_id: u32,
    pub user_name: String,
}

/// System import of a registry file
#[async_trait]
pub trait RegistryImporter: Send + Sync {
    async fn import(&self, path: &Path, context: &ImportContext) -> Result<()>;
}

/// Information about the interactive user
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// The interactive user's session when the process runs on their behalf
    /// (non-interactively or elevated as another account), otherwise `None`
    async fn interactive_user_session(&self) -> Result<Option<UserSession>>;
}

/// Process and service restarts
#[async_trait]
pub trait ProcessRestarter: Send + Sync {
    async fn restart_process(&self, name: &str) -> Result<()>;

    async fn restart_service(&self, name: &str) -> Result<()>;
}

/// User confirmation for settings that require it
#[async_trait]
pub trait ConfirmHandler: Send + Sync {
    async fn confirm(
        &self,
        setting_id: &str,
        pending_value: Option<&SettingValue>,
        definition: &SettingDefinition,
    ) -> Result<Confirmation>;
}

/// No-op session provider: imports always run directly
pub struct NoInteractiveSession;

#[async_trait]
impl SessionProvider for NoInteractiveSession {
    async fn interactive_user_session(&self) -> Result<Option<UserSession>> {
        Ok(None)
    }
}

/// No-op restarter for hosts that restart nothing
pub struct NoOpRestarter;

#[async_trait]
impl ProcessRestarter for NoOpRestarter {
    async fn restart_process(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn restart_service(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}

/// Compatibility filter that keeps every setting
pub struct AllowAllCompatibility;

#[async_trait]
impl CompatibilityFilter for AllowAllCompatibility {
    async fn filter(&self, definitions: Vec<SettingDefinition>) -> Result<Vec<SettingDefinition>> {
        Ok(definitions)
    }
}
