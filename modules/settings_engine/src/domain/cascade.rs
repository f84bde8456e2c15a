//! Cascade handling between dependent settings

use super::ports::{DiscoveryService, SettingsCatalog};
use crate::contract::{
    ApplyRequest, SettingApplier, SettingDefinition, SettingDependency, SettingValue,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What nested applies go through
///
/// Passed per call instead of being stored, so the apply entry point can own
/// the resolver that calls back into it.
#[derive(Clone, Copy)]
pub struct ResolveContext<'a> {
    pub applier: &'a dyn SettingApplier,
    pub cancel: &'a CancellationToken,
}

impl<'a> ResolveContext<'a> {
    pub fn new(applier: &'a dyn SettingApplier, cancel: &'a CancellationToken) -> Self {
        Self { applier, cancel }
    }
}

/// Side effects of a setting change on the settings around it
#[async_trait]
pub trait CascadeHandler: Send + Sync {
    /// Make sure `dependency.required_id` is enabled.
    ///
    /// `Ok(false)` or `Err` means the prerequisite cannot be satisfied.
    async fn ensure_prerequisite(
        &self,
        ctx: ResolveContext<'_>,
        dependency: &SettingDependency,
        scope: &[SettingDefinition],
    ) -> Result<bool>;

    /// React to a new value of `setting_id`
    async fn value_changed(
        &self,
        ctx: ResolveContext<'_>,
        setting_id: &str,
        value: &SettingValue,
        scope: &[SettingDefinition],
    ) -> Result<()>;

    /// React to `setting_id` being disabled; `dependents` require it enabled
    async fn disable_dependents(
        &self,
        ctx: ResolveContext<'_>,
        setting_id: &str,
        dependents: &[SettingDefinition],
    ) -> Result<()>;
}

/// Cascade handler that accepts every prerequisite and changes nothing
pub struct NoOpCascadeHandler;

#[async_trait]
impl CascadeHandler for NoOpCascadeHandler {
    async fn ensure_prerequisite(
        &self,
        _ctx: ResolveContext<'_>,
        _dependency: &SettingDependency,
        _scope: &[SettingDefinition],
    ) -> Result<bool> {
        Ok(true)
    }

    async fn value_changed(
        &self,
        _ctx: ResolveContext<'_>,
        _setting_id: &str,
        _value: &SettingValue,
        _scope: &[SettingDefinition],
    ) -> Result<()> {
        Ok(())
    }

    async fn disable_dependents(
        &self,
        _ctx: ResolveContext<'_>,
        _setting_id: &str,
        _dependents: &[SettingDefinition],
    ) -> Result<()> {
        Ok(())
    }
}

/// Cascade handler that enables missing prerequisites and disables dependents
pub struct ApplyingCascadeHandler {
    catalog: Arc<dyn SettingsCatalog>,
    discovery: Arc<dyn DiscoveryService>,
}

impl ApplyingCascadeHandler {
    pub fn new(catalog: Arc<dyn SettingsCatalog>, discovery: Arc<dyn DiscoveryService>) -> Self {
        Self { catalog, discovery }
    }

    async fn resolve(&self, id: &str, scope: &[SettingDefinition]) -> Result<Option<SettingDefinition>> {
        if let Some(found) = scope.iter().find(|s| s.id == id) {
            return Ok(Some(found.clone()));
        }
        self.catalog.get_setting(id).await
    }
}

#[async_trait]
impl CascadeHandler for ApplyingCascadeHandler {
    async fn ensure_prerequisite(
        &self,
        ctx: ResolveContext<'_>,
        dependency: &SettingDependency,
        scope: &[SettingDefinition],
    ) -> Result<bool> {
        let required = self
            .resolve(&dependency.required_id, scope)
            .await?
            .ok_or_else(|| anyhow!("required setting '{}' is not registered", dependency.required_id))?;

        let states = self.discovery.get_states(std::slice::from_ref(&required)).await?;
        if states
            .get(&required.id)
            .is_some_and(|state| state.success && state.is_enabled)
        {
            debug!(setting_id = %dependency.dependent_id, required_id = %required.id, "Prerequisite already enabled");
            return Ok(true);
        }

        info!(setting_id = %dependency.dependent_id, required_id = %required.id, "Enabling prerequisite");
        let result = ctx
            .applier
            .apply_setting(
                ApplyRequest::enable(required.id.as_str()).skipping_prerequisites(),
                ctx.cancel,
            )
            .await?;

        if let Some(error) = result.error_message.as_deref().filter(|_| !result.success) {
            warn!(required_id = %required.id, %error, "Prerequisite apply failed");
        }
        Ok(result.success)
    }

    async fn value_changed(
        &self,
        _ctx: ResolveContext<'_>,
        setting_id: &str,
        value: &SettingValue,
        _scope: &[SettingDefinition],
    ) -> Result<()> {
        debug!(setting_id, %value, "Setting value changed");
        Ok(())
    }

    async fn disable_dependents(
        &self,
        ctx: ResolveContext<'_>,
        setting_id: &str,
        dependents: &[SettingDefinition],
    ) -> Result<()> {
        let states = self.discovery.get_states(dependents).await?;

        for dependent in dependents {
            if ctx.cancel.is_cancelled() {
                break;
            }

            let enabled = states
                .get(&dependent.id)
                .is_some_and(|state| state.success && state.is_enabled);
            if !enabled {
                continue;
            }

            info!(setting_id, dependent_id = %dependent.id, "Disabling dependent setting");
            match ctx
                .applier
                .apply_setting(
                    ApplyRequest::disable(dependent.id.as_str()).skipping_prerequisites(),
                    ctx.cancel,
                )
                .await
            {
                Ok(result) if result.success => {}
                Ok(result) => warn!(
                    dependent_id = %dependent.id,
                    error = result.error_message.as_deref().unwrap_or("unknown"),
                    "Failed to disable dependent setting"
                ),
                Err(e) => warn!(dependent_id = %dependent.id, error = %e, "Failed to disable dependent setting"),
            }
        }
        Ok(())
    }
}
