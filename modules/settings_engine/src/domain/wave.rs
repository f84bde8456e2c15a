//! Wave bridge - batch application of configuration sections
//!
//! Items of a section are split into waves so that every item runs after the
//! items of the same batch it depends on. Waves run in order; the items of one
//! wave run concurrently up to `max_parallelism`.

use super::ports::{CompatibilityFilter, ConfirmHandler, SettingsCatalog};
use crate::contract::{
    ApplyRequest, ConfigurationItem, ConfigurationSection, EngineError, InputKind,
    SettingApplier, SettingDefinition, SettingValue,
};
use futures::stream::{self, StreamExt};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Result of applying one configuration section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionOutcome {
    /// No item failed and nothing was cancelled
    pub success: bool,
    pub applied: usize,
    pub failed: usize,
    /// Declined by the confirmation handler
    pub skipped_by_user: usize,
    /// Nothing to apply (unselected action, no requested state)
    pub skipped: usize,
    /// Empty, unknown or platform-incompatible ids
    pub dropped: usize,
    pub cancelled: usize,
    /// Ids of the failed items, in completion order
    pub failed_ids: Vec<String>,
}

impl SectionOutcome {
    fn record(&mut self, id: &str, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Applied => self.applied += 1,
            ItemOutcome::Failed => {
                self.failed += 1;
                self.failed_ids.push(id.to_string());
            }
            ItemOutcome::SkippedByUser => self.skipped_by_user += 1,
            ItemOutcome::Skipped => self.skipped += 1,
            ItemOutcome::Cancelled => self.cancelled += 1,
        }
    }

    fn finish(mut self) -> Self {
        self.success = self.failed == 0 && self.cancelled == 0;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemOutcome {
    Applied,
    Failed,
    SkippedByUser,
    Skipped,
    Cancelled,
}

/// Applies configuration sections through a [`SettingApplier`]
pub struct WaveBridge {
    catalog: Arc<dyn SettingsCatalog>,
    compatibility: Arc<dyn CompatibilityFilter>,
    applier: Arc<dyn SettingApplier>,
    max_parallelism: usize,
}

impl WaveBridge {
    pub fn new(
        catalog: Arc<dyn SettingsCatalog>,
        compatibility: Arc<dyn CompatibilityFilter>,
        applier: Arc<dyn SettingApplier>,
        max_parallelism: usize,
    ) -> Self {
        Self {
            catalog,
            compatibility,
            applier,
            max_parallelism: max_parallelism.max(1),
        }
    }

    /// Apply several labelled sections one after the other
    pub async fn apply_configuration(
        &self,
        sections: &IndexMap<String, ConfigurationSection>,
        confirm: Option<&dyn ConfirmHandler>,
        cancel: &CancellationToken,
    ) -> IndexMap<String, SectionOutcome> {
        let mut outcomes = IndexMap::with_capacity(sections.len());
        for (label, section) in sections {
            let outcome = self
                .apply_configuration_section(Some(section), label, confirm, cancel)
                .await;
            outcomes.insert(label.clone(), outcome);
        }
        outcomes
    }

    /// Apply one section.
    ///
    /// Never returns an error: per-item failures are logged and counted, and a
    /// missing or empty section is reported as an unsuccessful outcome.
    pub async fn apply_configuration_section(
        &self,
        section: Option<&ConfigurationSection>,
        section_label: &str,
        confirm: Option<&dyn ConfirmHandler>,
        cancel: &CancellationToken,
    ) -> SectionOutcome {
        let run_id = Uuid::new_v4();
        let mut outcome = SectionOutcome::default();

        let Some(section) = section.filter(|s| !s.is_empty()) else {
            error!(%run_id, section = section_label, "Configuration section is missing or empty");
            return outcome;
        };

        info!(%run_id, section = section_label, items = section.items.len(), "Applying configuration section");

        let planned = self.resolve_items(section, &mut outcome, run_id).await;
        let definitions: Vec<SettingDefinition> =
            planned.iter().map(|(_, def)| def.clone()).collect();
        let waves = plan_waves(&definitions);

        for (number, wave) in waves.iter().enumerate() {
            if cancel.is_cancelled() {
                for &index in wave {
                    outcome.record(&planned[index].1.id, ItemOutcome::Cancelled);
                }
                continue;
            }

            debug!(%run_id, wave = number, items = wave.len(), "Starting wave");
            let results: Vec<(&str, ItemOutcome)> = stream::iter(wave.iter().map(|&index| {
                let (item, definition) = &planned[index];
                async move {
                    let result = self
                        .apply_item(item, definition, confirm, cancel, run_id)
                        .await;
                    (definition.id.as_str(), result)
                }
            }))
            .buffer_unordered(self.max_parallelism)
            .collect()
            .await;

            for (id, result) in results {
                outcome.record(id, result);
            }
        }

        let outcome = outcome.finish();
        info!(
            %run_id,
            section = section_label,
            success = outcome.success,
            applied = outcome.applied,
            failed = outcome.failed,
            skipped_by_user = outcome.skipped_by_user,
            skipped = outcome.skipped,
            dropped = outcome.dropped,
            cancelled = outcome.cancelled,
            "Configuration section finished"
        );
        outcome
    }

    /// Pair items with their definitions, dropping unknown and incompatible ones
    async fn resolve_items<'s>(
        &self,
        section: &'s ConfigurationSection,
        outcome: &mut SectionOutcome,
        run_id: Uuid,
    ) -> Vec<(&'s ConfigurationItem, SettingDefinition)> {
        let mut resolved = Vec::with_capacity(section.items.len());
        let mut seen = HashSet::new();

        for item in &section.items {
            let id = item.id.trim();
            if id.is_empty() {
                outcome.dropped += 1;
                continue;
            }
            if !seen.insert(id.to_string()) {
                warn!(%run_id, setting_id = id, "Duplicate item in section, keeping the first");
                outcome.dropped += 1;
                continue;
            }

            match self.catalog.get_setting(id).await {
                Ok(Some(definition)) => resolved.push((item, definition)),
                Ok(None) => {
                    debug!(%run_id, setting_id = id, "Unknown setting, dropping item");
                    outcome.dropped += 1;
                }
                Err(e) => {
                    warn!(%run_id, setting_id = id, error = %e, "Catalog lookup failed");
                    outcome.record(id, ItemOutcome::Failed);
                }
            }
        }

        let definitions: Vec<SettingDefinition> =
            resolved.iter().map(|(_, def)| def.clone()).collect();
        let compatible: HashSet<String> = match self.compatibility.filter(definitions).await {
            Ok(compatible) => compatible.into_iter().map(|def| def.id).collect(),
            Err(e) => {
                warn!(%run_id, error = %e, "Compatibility filter failed, no item applied");
                for (_, definition) in &resolved {
                    outcome.record(&definition.id, ItemOutcome::Failed);
                }
                return Vec::new();
            }
        };

        resolved.retain(|(_, definition)| {
            let keep = compatible.contains(&definition.id);
            if !keep {
                debug!(%run_id, setting_id = %definition.id, "Setting not compatible with this platform, dropping item");
                outcome.dropped += 1;
            }
            keep
        });
        resolved
    }

    async fn apply_item(
        &self,
        item: &ConfigurationItem,
        definition: &SettingDefinition,
        confirm: Option<&dyn ConfirmHandler>,
        cancel: &CancellationToken,
        run_id: Uuid,
    ) -> ItemOutcome {
        if cancel.is_cancelled() {
            return ItemOutcome::Cancelled;
        }

        let Some(mut request) = request_for(item, definition) else {
            debug!(%run_id, setting_id = %definition.id, "Nothing requested for item, skipping");
            return ItemOutcome::Skipped;
        };

        if definition.requires_confirmation {
            if let Some(handler) = confirm {
                let pending = request
                    .value
                    .clone()
                    .unwrap_or(SettingValue::Bool(request.enable));
                match handler.confirm(&definition.id, Some(&pending), definition).await {
                    Ok(answer) if answer.confirmed => {
                        request = request.with_checkbox_result(answer.checkbox_result);
                    }
                    Ok(_) => {
                        info!(%run_id, setting_id = %definition.id, "Skipped by user");
                        return ItemOutcome::SkippedByUser;
                    }
                    Err(e) => {
                        warn!(%run_id, setting_id = %definition.id, error = %e, "Confirmation failed");
                        return ItemOutcome::Failed;
                    }
                }
            }
        }

        match self.applier.apply_setting(request, cancel).await {
            Ok(result) if result.success => ItemOutcome::Applied,
            Ok(result) if result.is_cancelled() => ItemOutcome::Cancelled,
            Ok(result) => {
                warn!(
                    %run_id,
                    setting_id = %definition.id,
                    error = result.error_message.as_deref().unwrap_or("unknown"),
                    "Item failed"
                );
                ItemOutcome::Failed
            }
            Err(EngineError::Cancelled) => ItemOutcome::Cancelled,
            Err(e) => {
                warn!(%run_id, setting_id = %definition.id, error = %e, "Item failed");
                ItemOutcome::Failed
            }
        }
    }
}

/// Build the apply request for one item, `None` when nothing is requested
fn request_for(item: &ConfigurationItem, definition: &SettingDefinition) -> Option<ApplyRequest> {
    let id = definition.id.as_str();
    match definition.input_kind {
        InputKind::Action => {
            if item.is_selected != Some(true) {
                return None;
            }
            let command = definition.command.as_deref().unwrap_or(id);
            Some(
                ApplyRequest::disable(id)
                    .with_command(command)
                    .skipping_prerequisites(),
            )
        }
        InputKind::Selection => match (item.selected_index, item.is_selected) {
            (Some(index), _) => {
                Some(ApplyRequest::enable(id).with_value(SettingValue::Integer(index)))
            }
            (None, Some(enable)) => Some(ApplyRequest::new(id, enable)),
            (None, None) => None,
        },
        InputKind::NumericRange => match (&item.value, item.is_selected) {
            (Some(value), selected) => {
                Some(ApplyRequest::new(id, selected.unwrap_or(true)).with_value(value.clone()))
            }
            (None, Some(enable)) => Some(ApplyRequest::new(id, enable)),
            (None, None) => None,
        },
        InputKind::Toggle => item.is_selected.map(|enable| ApplyRequest::new(id, enable)),
    }
}

/// Partition a batch into dependency-ordered waves of indices into `definitions`.
///
/// Only dependencies between members of the batch count, of either kind. Items
/// caught in a cycle end up together in one final wave.
pub fn plan_waves(definitions: &[SettingDefinition]) -> Vec<Vec<usize>> {
    let positions: HashMap<&str, usize> = definitions
        .iter()
        .enumerate()
        .map(|(index, def)| (def.id.as_str(), index))
        .collect();

    let prerequisites: Vec<HashSet<usize>> = definitions
        .iter()
        .enumerate()
        .map(|(index, def)| {
            def.dependencies
                .iter()
                .filter_map(|dep| positions.get(dep.required_id.as_str()).copied())
                .filter(|&required| required != index)
                .collect()
        })
        .collect();

    let mut placed = vec![false; definitions.len()];
    let mut remaining = definitions.len();
    let mut waves = Vec::new();

    while remaining > 0 {
        let wave: Vec<usize> = (0..definitions.len())
            .filter(|&index| !placed[index])
            .filter(|&index| prerequisites[index].iter().all(|&required| placed[required]))
            .collect();

        if wave.is_empty() {
            let stuck: Vec<usize> = (0..definitions.len()).filter(|&i| !placed[i]).collect();
            let ids: Vec<&str> = stuck.iter().map(|&i| definitions[i].id.as_str()).collect();
            warn!(settings = ?ids, "Circular dependency within batch, applying remaining items together");
            waves.push(stuck);
            break;
        }

        for &index in &wave {
            placed[index] = true;
        }
        remaining -= wave.len();
        waves.push(wave);
    }

    waves
}
