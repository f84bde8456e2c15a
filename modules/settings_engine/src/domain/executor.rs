//! Operation executor - runs one setting's declared operations as a unit
//!
//! Operations run strictly in order. A failing operation is recorded and the
//! next one still runs; cancellation is the only thing that stops the list.

use super::ports::{
    ImportContext, PowerConfigBackend, ProcessRestarter, RegistryImporter, RegistryStore,
    ScheduledTaskBackend, ScriptRunner, SessionProvider,
};
use crate::contract::{
    EngineError, InputKind, OperationResult, PowerConfigOperation, RawImportBlock,
    RegistryOperation, RegistryValue, RestartTarget, SettingDefinition, SettingOperation,
    SettingValue, ValueMap,
};
use crate::infra::scratch::ScratchFile;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Backend ports driven by the executor
#[derive(Clone)]
pub struct Backends {
    pub registry: Arc<dyn RegistryStore>,
    pub tasks: Arc<dyn ScheduledTaskBackend>,
    pub scripts: Arc<dyn ScriptRunner>,
    pub power: Arc<dyn PowerConfigBackend>,
    pub importer: Arc<dyn RegistryImporter>,
    pub sessions: Arc<dyn SessionProvider>,
    pub restarter: Arc<dyn ProcessRestarter>,
}

/// Executor options taken from the module configuration
#[derive(Debug, Clone)]
pub struct ExecutorOptions {
    /// Directory for raw import scratch files; system temp dir when unset
    pub scratch_dir: Option<PathBuf>,
    /// Import on behalf of the interactive user when running as someone else
    pub prefer_interactive_user: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            scratch_dir: None,
            prefer_interactive_user: true,
        }
    }
}

/// How the request's enable flag and value map onto individual writes
#[derive(Debug, Clone, PartialEq)]
enum WriteMode {
    /// One boolean drives every write
    Flag(bool),
    /// Per-field values; fields missing from the map fall back to `fallback_enabled`
    Fields {
        values: ValueMap,
        fallback_enabled: bool,
    },
    /// Numeric magnitude; zero means disabled
    Magnitude(i64),
}

impl WriteMode {
    /// Enabled state for operations that have no per-field value
    fn enabled(&self) -> bool {
        match self {
            Self::Flag(enable) => *enable,
            Self::Fields {
                fallback_enabled, ..
            } => *fallback_enabled,
            Self::Magnitude(magnitude) => *magnitude != 0,
        }
    }
}

enum Step {
    Done,
    Failed(String),
    Cancelled,
}

/// Executes a setting's heterogeneous operation list
pub struct OperationExecutor {
    backends: Backends,
    options: ExecutorOptions,
}

impl OperationExecutor {
    pub fn new(backends: Backends, options: ExecutorOptions) -> Self {
        Self { backends, options }
    }

    /// Apply every declared operation of `setting` for the requested state.
    ///
    /// Failed operations are aggregated into one failed result; `Err` is only
    /// returned when the value cannot be interpreted for the setting's input kind.
    pub async fn apply_setting_operations(
        &self,
        setting: &SettingDefinition,
        enable: bool,
        value: Option<&SettingValue>,
        cancel: &CancellationToken,
    ) -> Result<OperationResult, EngineError> {
        let mode = interpret_value(setting, enable, value)?;
        debug!(setting_id = %setting.id, ?mode, "Applying setting operations");

        let mut failures = Vec::new();
        for operation in setting.effective_operations() {
            if cancel.is_cancelled() {
                return Ok(OperationResult::cancelled());
            }

            match self.run_operation(operation, &mode, cancel).await {
                Step::Done => {}
                Step::Failed(error) => {
                    let name = operation.describe();
                    warn!(setting_id = %setting.id, operation = %name, %error, "Operation failed");
                    failures.push(format!("{}: {}", name, error));
                }
                Step::Cancelled => return Ok(OperationResult::cancelled()),
            }
        }

        if cancel.is_cancelled() {
            return Ok(OperationResult::cancelled());
        }

        if let Step::Cancelled = self.restart_if_needed(setting, cancel).await {
            return Ok(OperationResult::cancelled());
        }

        if failures.is_empty() {
            Ok(OperationResult::succeeded())
        } else {
            Ok(OperationResult::failed(format!(
                "{} operation(s) failed for '{}': {}",
                failures.len(),
                setting.id,
                failures.join("; ")
            )))
        }
    }

    async fn run_operation(
        &self,
        operation: &SettingOperation,
        mode: &WriteMode,
        cancel: &CancellationToken,
    ) -> Step {
        match operation {
            SettingOperation::Registry(op) => self.write_registry(op, mode, cancel).await,
            SettingOperation::ScheduledTask(op) => {
                guarded(cancel, self.backends.tasks.set_enabled(&op.task_path, mode.enabled()))
                    .await
            }
            SettingOperation::Script(op) => match op.script_for(mode.enabled()) {
                Some(script) => guarded(cancel, self.backends.scripts.run(&op.name, script)).await,
                None => Step::Done,
            },
            SettingOperation::PowerConfig(op) => {
                let value = power_value(op, mode);
                guarded(cancel, self.backends.power.apply(op, value)).await
            }
            SettingOperation::RawImport(block) => {
                self.import_block(block, mode.enabled(), cancel).await
            }
        }
    }

    async fn write_registry(
        &self,
        op: &RegistryOperation,
        mode: &WriteMode,
        cancel: &CancellationToken,
    ) -> Step {
        let registry = &self.backends.registry;
        match mode {
            WriteMode::Flag(enable) => guarded(cancel, registry.apply(op, *enable, None)).await,
            WriteMode::Fields {
                values,
                fallback_enabled,
            } => match values.get(&op.value_name) {
                Some(Some(value)) => guarded(cancel, registry.apply(op, true, Some(value))).await,
                Some(None) => guarded(cancel, registry.apply(op, false, None)).await,
                None => guarded(cancel, registry.apply(op, *fallback_enabled, None)).await,
            },
            WriteMode::Magnitude(0) => guarded(cancel, registry.apply(op, false, None)).await,
            WriteMode::Magnitude(magnitude) => {
                let value = RegistryValue::Integer(*magnitude);
                guarded(cancel, registry.apply(op, true, Some(&value))).await
            }
        }
    }

    async fn import_block(
        &self,
        block: &RawImportBlock,
        enable: bool,
        cancel: &CancellationToken,
    ) -> Step {
        let scratch = match ScratchFile::write_import(
            self.options.scratch_dir.as_deref(),
            block.content_for(enable),
        ) {
            Ok(scratch) => scratch,
            Err(e) => return Step::Failed(format!("cannot write scratch file: {}", e)),
        };

        let context = match self.import_context(cancel).await {
            Some(context) => context,
            None => return Step::Cancelled,
        };

        let step = guarded(cancel, self.backends.importer.import(scratch.path(), &context)).await;

        if let Err(e) = scratch.remove() {
            warn!(import = %block.name, error = %e, "Failed to delete import scratch file");
        }
        step
    }

    /// `None` when cancelled while asking for the session
    async fn import_context(&self, cancel: &CancellationToken) -> Option<ImportContext> {
        if !self.options.prefer_interactive_user {
            return Some(ImportContext::Direct);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            session = self.backends.sessions.interactive_user_session() => match session {
                Ok(Some(session)) => Some(ImportContext::InteractiveUser(session)),
                Ok(None) => Some(ImportContext::Direct),
                Err(e) => {
                    warn!(error = %e, "Cannot determine interactive user, importing directly");
                    Some(ImportContext::Direct)
                }
            },
        }
    }

    /// Runs last for every setting; a failed restart is only logged
    async fn restart_if_needed(&self, setting: &SettingDefinition, cancel: &CancellationToken) -> Step {
        let restarter = &self.backends.restarter;
        let step = match &setting.restart {
            None => return Step::Done,
            Some(RestartTarget::Process(name)) => {
                guarded(cancel, restarter.restart_process(name)).await
            }
            Some(RestartTarget::Service(name)) => {
                guarded(cancel, restarter.restart_service(name)).await
            }
        };

        match step {
            Step::Failed(error) => {
                warn!(setting_id = %setting.id, %error, "Restart after apply failed");
                Step::Done
            }
            other => other,
        }
    }
}

/// Race one external call against cancellation
async fn guarded<F>(cancel: &CancellationToken, call: F) -> Step
where
    F: Future<Output = anyhow::Result<()>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Step::Cancelled,
        result = call => match result {
            Ok(()) => Step::Done,
            Err(e) => Step::Failed(format!("{:#}", e)),
        },
    }
}

fn power_value(op: &PowerConfigOperation, mode: &WriteMode) -> i64 {
    match mode {
        WriteMode::Flag(true) => op.enabled_value,
        WriteMode::Flag(false) => op.disabled_value,
        WriteMode::Fields {
            values,
            fallback_enabled,
        } => match op.field.as_ref().and_then(|field| values.get(field)) {
            Some(Some(RegistryValue::Integer(value))) => *value,
            Some(_) => op.disabled_value,
            None if *fallback_enabled => op.enabled_value,
            None => op.disabled_value,
        },
        WriteMode::Magnitude(0) => op.disabled_value,
        WriteMode::Magnitude(magnitude) => *magnitude,
    }
}

/// Map the request value onto writes according to the setting's input kind
fn interpret_value(
    setting: &SettingDefinition,
    enable: bool,
    value: Option<&SettingValue>,
) -> Result<WriteMode, EngineError> {
    match setting.input_kind {
        InputKind::Toggle => Ok(WriteMode::Flag(enable)),
        InputKind::Selection => match value {
            None => Ok(WriteMode::Flag(enable)),
            Some(SettingValue::Bool(flag)) => Ok(WriteMode::Flag(*flag)),
            Some(SettingValue::Fields(values)) => Ok(WriteMode::Fields {
                values: values.clone(),
                fallback_enabled: enable,
            }),
            Some(SettingValue::Integer(index)) => Ok(selection_by_index(setting, *index)),
            Some(SettingValue::Text(text)) => {
                let index = match text.trim().parse::<i64>() {
                    Ok(index) => index,
                    Err(_) => setting.index_of_display_name(text).ok_or_else(|| {
                        EngineError::validation(format!(
                            "'{}' is not an option of setting '{}'",
                            text, setting.id
                        ))
                    })?,
                };
                Ok(selection_by_index(setting, index))
            }
        },
        InputKind::NumericRange => match value {
            None => Ok(WriteMode::Flag(enable)),
            Some(SettingValue::Bool(flag)) => Ok(WriteMode::Flag(*flag)),
            Some(SettingValue::Integer(magnitude)) => Ok(WriteMode::Magnitude(*magnitude)),
            Some(SettingValue::Text(text)) => parse_magnitude(text)
                .map(WriteMode::Magnitude)
                .ok_or_else(|| {
                    EngineError::validation(format!(
                        "'{}' is not a number for setting '{}'",
                        text, setting.id
                    ))
                }),
            Some(SettingValue::Fields(_)) => Err(EngineError::NotSupported {
                setting_id: setting.id.clone(),
                input_kind: setting.input_kind,
                detail: "a field value map".to_string(),
            }),
        },
        InputKind::Action => match value {
            None => Ok(WriteMode::Flag(enable)),
            Some(_) => Err(EngineError::NotSupported {
                setting_id: setting.id.clone(),
                input_kind: setting.input_kind,
                detail: "a raw value".to_string(),
            }),
        },
    }
}

fn selection_by_index(setting: &SettingDefinition, index: i64) -> WriteMode {
    WriteMode::Fields {
        values: setting.resolve_selection(index).cloned().unwrap_or_default(),
        fallback_enabled: index != 0,
    }
}

/// Parse an integer or decimal string; decimals are truncated toward zero
fn parse_magnitude(text: &str) -> Option<i64> {
    let text = text.trim();
    text.parse::<i64>()
        .ok()
        .or_else(|| text.parse::<f64>().ok().filter(|v| v.is_finite()).map(|v| v as i64))
}
