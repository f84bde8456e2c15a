//! Dependency resolver
//!
//! Given one changed setting, brings the settings around it into a consistent
//! state: value prerequisites before the change, enabled prerequisites while
//! enabling, auto-enables, disable cascades and preset synchronization after.
//! Every nested apply is issued with `skip_prerequisites` set.

use super::cascade::{CascadeHandler, ResolveContext};
use super::ports::{CompatibilityFilter, DiscoveryService, SettingsCatalog};
use crate::contract::{
    ApplyRequest, DependencyKind, EngineError, InputKind, SettingDefinition, SettingState,
    SettingValue,
};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Resolves and applies the side effects of a setting change
pub struct DependencyResolver {
    catalog: Arc<dyn SettingsCatalog>,
    discovery: Arc<dyn DiscoveryService>,
    compatibility: Arc<dyn CompatibilityFilter>,
    cascade: Arc<dyn CascadeHandler>,
}

impl DependencyResolver {
    pub fn new(
        catalog: Arc<dyn SettingsCatalog>,
        discovery: Arc<dyn DiscoveryService>,
        compatibility: Arc<dyn CompatibilityFilter>,
        cascade: Arc<dyn CascadeHandler>,
    ) -> Self {
        Self {
            catalog,
            discovery,
            compatibility,
            cascade,
        }
    }

    /// Full dependency handling for a change of `setting_id`.
    ///
    /// Enabling checks every `RequiresEnabled` prerequisite first; an
    /// unsatisfiable one aborts with [`EngineError::DependencyUnsatisfiable`].
    /// Post-change cascades never fail the call.
    pub async fn handle_dependencies(
        &self,
        ctx: ResolveContext<'_>,
        setting_id: &str,
        scope: &[SettingDefinition],
        enable: bool,
        value: Option<&SettingValue>,
    ) -> Result<(), EngineError> {
        if enable {
            self.ensure_required_enabled(ctx, setting_id, scope).await?;
        }
        self.apply_post_change_cascades(ctx, setting_id, scope, enable, value)
            .await;
        Ok(())
    }

    /// Satisfy every `RequiresEnabled` dependency declared by `setting_id`
    pub async fn ensure_required_enabled(
        &self,
        ctx: ResolveContext<'_>,
        setting_id: &str,
        scope: &[SettingDefinition],
    ) -> Result<(), EngineError> {
        let setting = self
            .resolve(setting_id, scope)
            .await
            .ok_or_else(|| EngineError::not_found(setting_id))?;

        for dependency in setting.dependencies_of_kind(DependencyKind::RequiresEnabled) {
            if ctx.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let outcome = self.cascade.ensure_prerequisite(ctx, dependency, scope).await;
            if ctx.cancel.is_cancelled() {
                return Err(EngineError::Cancelled);
            }

            let reason = match outcome {
                Ok(true) => continue,
                Ok(false) => "prerequisite could not be enabled".to_string(),
                Err(e) => format!("{:#}", e),
            };
            warn!(setting_id, required_id = %dependency.required_id, %reason, "Prerequisite not satisfied");
            return Err(EngineError::DependencyUnsatisfiable {
                setting_id: setting_id.to_string(),
                required_id: dependency.required_id.clone(),
                reason,
            });
        }
        Ok(())
    }

    /// Auto-enables, value-change notification and disable cascade.
    ///
    /// Failures are logged and swallowed.
    pub async fn apply_post_change_cascades(
        &self,
        ctx: ResolveContext<'_>,
        setting_id: &str,
        scope: &[SettingDefinition],
        enable: bool,
        value: Option<&SettingValue>,
    ) {
        if enable {
            self.auto_enable(ctx, setting_id, scope).await;
        }

        if let Some(value) = value {
            if let Err(e) = self.cascade.value_changed(ctx, setting_id, value, scope).await {
                warn!(setting_id, error = %e, "Value change cascade failed");
            }
        }

        if !enable {
            self.disable_cascade(ctx, setting_id).await;
        }
    }

    async fn auto_enable(&self, ctx: ResolveContext<'_>, setting_id: &str, scope: &[SettingDefinition]) {
        let Some(setting) = self.resolve(setting_id, scope).await else {
            return;
        };

        for target_id in &setting.auto_enable_ids {
            if ctx.cancel.is_cancelled() {
                return;
            }

            let Some(target) = self.resolve(target_id, scope).await else {
                warn!(setting_id, target_id = %target_id, "Auto-enable target not registered, skipping");
                continue;
            };

            match self.query_state(&target).await {
                Ok(Some(state)) if state.success => {
                    if state.is_enabled {
                        debug!(setting_id, target_id = %target_id, "Auto-enable target already enabled");
                        continue;
                    }
                }
                Ok(_) => {
                    warn!(setting_id, target_id = %target_id, "No state for auto-enable target, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(setting_id, target_id = %target_id, error = %e, "Cannot query auto-enable target, skipping");
                    continue;
                }
            }

            info!(setting_id, target_id = %target_id, "Auto-enabling setting");
            let request = ApplyRequest::enable(target_id.as_str()).skipping_prerequisites();
            match ctx.applier.apply_setting(request, ctx.cancel).await {
                Ok(result) if result.success => {}
                Ok(result) => warn!(
                    setting_id,
                    target_id = %target_id,
                    error = result.error_message.as_deref().unwrap_or("unknown"),
                    "Auto-enable failed"
                ),
                Err(e) => warn!(setting_id, target_id = %target_id, error = %e, "Auto-enable failed"),
            }
        }
    }

    async fn disable_cascade(&self, ctx: ResolveContext<'_>, setting_id: &str) {
        let dependents = match self
            .catalog
            .get_dependents(setting_id, DependencyKind::RequiresEnabled)
            .await
        {
            Ok(dependents) => dependents,
            Err(e) => {
                warn!(setting_id, error = %e, "Cannot look up dependents for disable cascade");
                return;
            }
        };
        if dependents.is_empty() {
            return;
        }

        debug!(setting_id, count = dependents.len(), "Cascading disable to dependents");
        if let Err(e) = self.cascade.disable_dependents(ctx, setting_id, &dependents).await {
            warn!(setting_id, error = %e, "Disable cascade failed");
        }
    }

    /// Bring every `RequiresValueBeforeAnyChange` prerequisite of `setting`
    /// into its required state before the setting changes.
    ///
    /// Each prerequisite is handled on its own; failures are logged.
    pub async fn handle_value_prerequisites(
        &self,
        ctx: ResolveContext<'_>,
        setting: &SettingDefinition,
        setting_id: &str,
        scope: &[SettingDefinition],
    ) {
        for dependency in setting.dependencies_of_kind(DependencyKind::RequiresValueBeforeAnyChange) {
            if ctx.cancel.is_cancelled() {
                return;
            }

            let Some(required_value) = dependency.required_value.as_deref() else {
                continue;
            };

            let Some(required) = self.resolve(&dependency.required_id, scope).await else {
                warn!(setting_id, required_id = %dependency.required_id, "Required setting not registered, skipping");
                continue;
            };

            let state = match self.query_state(&required).await {
                Ok(Some(state)) if state.success => state,
                Ok(_) => {
                    warn!(setting_id, required_id = %required.id, "No state for required setting, skipping");
                    continue;
                }
                Err(e) => {
                    warn!(setting_id, required_id = %required.id, error = %e, "Cannot query required setting, skipping");
                    continue;
                }
            };

            let Some(correction) = correction_for(&required, &state, required_value) else {
                continue;
            };

            info!(
                setting_id,
                required_id = %required.id,
                required_value,
                "Correcting prerequisite before change"
            );
            match ctx.applier.apply_setting(correction, ctx.cancel).await {
                Ok(result) if result.success => {}
                Ok(result) => warn!(
                    setting_id,
                    required_id = %required.id,
                    error = result.error_message.as_deref().unwrap_or("unknown"),
                    "Prerequisite correction failed"
                ),
                Err(e) => warn!(setting_id, required_id = %required.id, error = %e, "Prerequisite correction failed"),
            }
        }
    }

    /// Move a preset parent to the preset matching its children's current states.
    ///
    /// Runs for every parent `child_setting` has a value prerequisite on that
    /// declares presets. Incomplete information leaves the parent untouched.
    pub async fn sync_parent_to_matching_preset(
        &self,
        ctx: ResolveContext<'_>,
        child_setting: &SettingDefinition,
        child_id: &str,
        scope: &[SettingDefinition],
    ) {
        for dependency in child_setting.dependencies_of_kind(DependencyKind::RequiresValueBeforeAnyChange) {
            if ctx.cancel.is_cancelled() {
                return;
            }

            let Some(parent) = self.resolve(&dependency.required_id, scope).await else {
                continue;
            };
            if !parent.presets.as_ref().is_some_and(|presets| !presets.is_empty()) {
                continue;
            }

            self.sync_parent(ctx, &parent, child_id, scope).await;
        }
    }

    async fn sync_parent(
        &self,
        ctx: ResolveContext<'_>,
        parent: &SettingDefinition,
        child_id: &str,
        scope: &[SettingDefinition],
    ) {
        let Some(presets) = parent.presets.as_ref() else {
            return;
        };

        let referenced: BTreeSet<&str> = presets
            .values()
            .flat_map(|row| row.keys().map(String::as_str))
            .collect();

        let mut resolved = Vec::with_capacity(referenced.len());
        for id in &referenced {
            match self.resolve(id, scope).await {
                Some(child) if child.input_kind == InputKind::Toggle => resolved.push(child),
                Some(child) => {
                    debug!(parent_id = %parent.id, child_id = %id, input_kind = %child.input_kind, "Preset child is not a toggle");
                }
                None => {}
            }
        }

        let compatible = match self.compatibility.filter(resolved).await {
            Ok(compatible) => compatible,
            Err(e) => {
                warn!(parent_id = %parent.id, error = %e, "Compatibility filter failed, skipping preset sync");
                return;
            }
        };

        if compatible.len() != referenced.len() {
            debug!(
                parent_id = %parent.id,
                referenced = referenced.len(),
                available = compatible.len(),
                "Not every preset child is available, skipping preset sync"
            );
            return;
        }

        let states = match self.discovery.get_states(&compatible).await {
            Ok(states) => states,
            Err(e) => {
                warn!(parent_id = %parent.id, error = %e, "Cannot query preset children, skipping preset sync");
                return;
            }
        };

        let mut current: HashMap<&str, bool> = HashMap::with_capacity(compatible.len());
        for child in &compatible {
            match states.get(&child.id) {
                Some(state) if state.success => {
                    current.insert(child.id.as_str(), state.is_enabled);
                }
                _ => {
                    debug!(parent_id = %parent.id, child_id = %child.id, "Preset child state unknown, skipping preset sync");
                    return;
                }
            }
        }

        let matching = presets.iter().find(|(_, row)| {
            !row.is_empty()
                && row
                    .iter()
                    .all(|(id, expected)| current.get(id.as_str()) == Some(expected))
        });

        let Some((&index, _)) = matching else {
            debug!(parent_id = %parent.id, child_id, "No preset matches the current child states");
            return;
        };

        match self.query_state(parent).await {
            Ok(Some(state)) if state.success && state.current_index() == Some(index) => {
                debug!(parent_id = %parent.id, index, "Parent already at matching preset");
                return;
            }
            Ok(_) => {}
            Err(e) => warn!(parent_id = %parent.id, error = %e, "Cannot query parent, applying preset anyway"),
        }

        if ctx.cancel.is_cancelled() {
            return;
        }

        info!(parent_id = %parent.id, child_id, index, "Syncing parent to matching preset");
        let request = ApplyRequest::enable(parent.id.as_str())
            .with_value(SettingValue::Integer(index))
            .skipping_prerequisites();
        match ctx.applier.apply_setting(request, ctx.cancel).await {
            Ok(result) if result.success => {}
            Ok(result) => warn!(
                parent_id = %parent.id,
                error = result.error_message.as_deref().unwrap_or("unknown"),
                "Preset sync failed"
            ),
            Err(e) => warn!(parent_id = %parent.id, error = %e, "Preset sync failed"),
        }
    }

    /// Look a setting up in the scope first, then in the whole catalog
    async fn resolve(&self, id: &str, scope: &[SettingDefinition]) -> Option<SettingDefinition> {
        if let Some(found) = scope.iter().find(|s| s.id == id) {
            return Some(found.clone());
        }
        match self.catalog.get_setting(id).await {
            Ok(found) => found,
            Err(e) => {
                warn!(setting_id = id, error = %e, "Catalog lookup failed");
                None
            }
        }
    }

    async fn query_state(&self, setting: &SettingDefinition) -> anyhow::Result<Option<SettingState>> {
        let mut states = self
            .discovery
            .get_states(std::slice::from_ref(setting))
            .await?;
        Ok(states.remove(&setting.id))
    }
}

/// The nested apply that moves `required` into `required_value`, or `None`
/// when it already holds it or the value cannot be interpreted
fn correction_for(
    required: &SettingDefinition,
    state: &SettingState,
    required_value: &str,
) -> Option<ApplyRequest> {
    match required.input_kind {
        InputKind::Toggle => {
            let Some(wanted) = parse_bool_token(required_value) else {
                warn!(required_id = %required.id, required_value, "Required value is not a boolean");
                return None;
            };
            if state.is_enabled == wanted {
                return None;
            }
            Some(
                ApplyRequest::new(required.id.as_str(), wanted)
                    .with_value(SettingValue::Bool(wanted))
                    .skipping_prerequisites(),
            )
        }
        InputKind::Selection => {
            let Some(index) = required.index_of_display_name(required_value) else {
                warn!(required_id = %required.id, required_value, "Required value is not an option");
                return None;
            };
            if state.current_index() == Some(index) {
                return None;
            }
            Some(
                ApplyRequest::enable(required.id.as_str())
                    .with_value(SettingValue::Integer(index))
                    .skipping_prerequisites(),
            )
        }
        InputKind::NumericRange | InputKind::Action => {
            warn!(required_id = %required.id, input_kind = %required.input_kind, "Value prerequisites are not supported for this input kind");
            None
        }
    }
}

/// Parse a boolean token, case-insensitive
pub fn parse_bool_token(token: &str) -> Option<bool> {
    match token.trim().to_ascii_lowercase().as_str() {
        "true" | "enabled" | "on" | "yes" | "1" => Some(true),
        "false" | "disabled" | "off" | "no" | "0" => Some(false),
        _ => None,
    }
}
