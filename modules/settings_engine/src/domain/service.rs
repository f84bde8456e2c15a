//! Domain service - apply orchestration

use super::cascade::ResolveContext;
use super::events::{EventPublisher, SettingEvent};
use super::executor::OperationExecutor;
use super::ports::{DiscoveryService, ScriptRunner, SettingsCatalog};
use super::resolver::DependencyResolver;
use super::validation::validate_setting_id;
use crate::contract::{
    ApplyRequest, EngineError, OperationResult, SettingApplier, SettingDefinition,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Domain service applying single settings
///
/// Runs dependency pre-checks, the setting's operations and the post-change
/// cascades. Nested applies issued by the resolver come back through
/// [`SettingApplier::apply_setting`] on this same service.
pub struct ApplyService {
    catalog: Arc<dyn SettingsCatalog>,
    discovery: Arc<dyn DiscoveryService>,
    scripts: Arc<dyn ScriptRunner>,
    resolver: DependencyResolver,
    executor: OperationExecutor,
    event_publisher: Arc<dyn EventPublisher>,
}

impl ApplyService {
    /// Create a new service instance
    pub fn new(
        catalog: Arc<dyn SettingsCatalog>,
        discovery: Arc<dyn DiscoveryService>,
        scripts: Arc<dyn ScriptRunner>,
        resolver: DependencyResolver,
        executor: OperationExecutor,
        event_publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            catalog,
            discovery,
            scripts,
            resolver,
            executor,
            event_publisher,
        }
    }

    pub fn resolver(&self) -> &DependencyResolver {
        &self.resolver
    }

    async fn get_setting(&self, id: &str) -> Result<SettingDefinition, EngineError> {
        self.catalog
            .get_setting(id)
            .await
            .map_err(|e| EngineError::Internal(format!("catalog lookup failed: {:#}", e)))?
            .ok_or_else(|| EngineError::not_found(id))
    }

    /// Settings of the same feature group
    async fn scope_of(&self, setting: &SettingDefinition) -> Result<Vec<SettingDefinition>, EngineError> {
        let all = self
            .catalog
            .get_all_settings()
            .await
            .map_err(|e| EngineError::Internal(format!("catalog enumeration failed: {:#}", e)))?;
        Ok(all
            .into_iter()
            .filter(|s| s.group_id == setting.group_id)
            .collect())
    }

    /// Run the request's command, then the setting's operations
    async fn execute(
        &self,
        setting: &SettingDefinition,
        request: &ApplyRequest,
        cancel: &CancellationToken,
    ) -> Result<OperationResult, EngineError> {
        if let Some(command) = request.command.as_deref() {
            debug!(setting_id = %setting.id, "Running command");
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(OperationResult::cancelled()),
                outcome = self.scripts.run(&setting.id, command) => outcome,
            };
            if let Err(e) = outcome {
                warn!(setting_id = %setting.id, error = %e, "Command failed");
                return Ok(OperationResult::failed(format!(
                    "command for '{}' failed: {:#}",
                    setting.id, e
                )));
            }
        }

        self.executor
            .apply_setting_operations(setting, request.enable, request.value.as_ref(), cancel)
            .await
    }

    fn publish_applied(&self, setting: &SettingDefinition, request: &ApplyRequest) {
        let event = SettingEvent::applied(
            &setting.id,
            &setting.group_id,
            request.enable,
            request.value.as_ref(),
            request.skip_prerequisites,
        );
        let publisher = self.event_publisher.clone();
        tokio::spawn(async move {
            let setting_id = event.setting_id().to_string();
            if let Err(e) = publisher.publish(event).await {
                warn!(%setting_id, error = %e, "Failed to publish setting event");
            }
        });
    }
}

#[async_trait]
impl SettingApplier for ApplyService {
    async fn apply_setting(
        &self,
        request: ApplyRequest,
        cancel: &CancellationToken,
    ) -> Result<OperationResult, EngineError> {
        validate_setting_id(&request.setting_id)?;
        let setting = self.get_setting(&request.setting_id).await?;
        let scope = self.scope_of(&setting).await?;
        let ctx = ResolveContext::new(self, cancel);
        let setting_id = setting.id.as_str();

        info!(
            setting_id,
            enable = request.enable,
            value = ?request.value,
            checkbox_result = ?request.checkbox_result,
            nested = request.skip_prerequisites,
            "Applying setting"
        );

        if !request.skip_prerequisites {
            self.resolver
                .handle_value_prerequisites(ctx, &setting, setting_id, &scope)
                .await;
            if request.enable {
                self.resolver
                    .ensure_required_enabled(ctx, setting_id, &scope)
                    .await?;
            }
        }

        if cancel.is_cancelled() {
            return Ok(OperationResult::cancelled());
        }

        let outcome = self.execute(&setting, &request, cancel).await;
        self.discovery.invalidate(std::slice::from_ref(&setting.id));
        let result = outcome?;

        if !result.success {
            if result.is_cancelled() {
                info!(setting_id, "Apply cancelled");
            } else {
                warn!(
                    setting_id,
                    error = result.error_message.as_deref().unwrap_or("unknown"),
                    "Apply failed"
                );
            }
            return Ok(result);
        }

        if !request.skip_prerequisites {
            self.resolver
                .apply_post_change_cascades(ctx, setting_id, &scope, request.enable, request.value.as_ref())
                .await;
            self.resolver
                .sync_parent_to_matching_preset(ctx, &setting, setting_id, &scope)
                .await;
        }

        self.publish_applied(&setting, &request);
        Ok(result)
    }
}
