//! Contract models for the settings engine
//!
//! These models are transport-agnostic and shared between the engine and its callers.
//! NO serde derives - catalog files are mapped in through `infra::catalog::dto`.

use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Field name -> value written for that field. `None` means the field is disabled.
pub type ValueMap = BTreeMap<String, Option<RegistryValue>>;

/// Preset index -> (child setting id -> expected enabled state), in declared order
pub type PresetMap = IndexMap<i64, BTreeMap<String, bool>>;

/// Immutable definition of one setting
#[derive(Debug, Clone, PartialEq)]
pub struct SettingDefinition {
    /// Stable identifier (e.g., "privacy-telemetry")
    pub id: String,
    /// Human-readable name
    pub name: String,
    /// Feature group the setting belongs to; defines the default resolution scope
    pub group_id: String,
    /// How the setting is driven by callers
    pub input_kind: InputKind,
    /// Declared backend operations
    pub operations: Vec<SettingOperation>,
    /// Dependencies declared by this setting
    pub dependencies: Vec<SettingDependency>,
    /// Settings enabled as a side effect of enabling this one
    pub auto_enable_ids: Vec<String>,
    /// Child-state combinations this (parent) setting represents
    pub presets: Option<PresetMap>,
    /// Options of a selection setting
    pub selection: Option<SelectionOptions>,
    /// Bounds of a numeric setting
    pub numeric_range: Option<NumericRange>,
    /// Whether the user must confirm before the setting is applied in a batch
    pub requires_confirmation: bool,
    /// Command executed for action settings
    pub command: Option<String>,
    /// Process or service restarted after the operations ran
    pub restart: Option<RestartTarget>,
}

impl SettingDefinition {
    /// Create a toggle setting with no operations
    pub fn new(id: impl Into<String>, group_id: impl Into<String>, input_kind: InputKind) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            group_id: group_id.into(),
            input_kind,
            operations: Vec::new(),
            dependencies: Vec::new(),
            auto_enable_ids: Vec::new(),
            presets: None,
            selection: None,
            numeric_range: None,
            requires_confirmation: false,
            command: None,
            restart: None,
        }
    }

    /// Operations that actually run: a raw import block replaces every registry operation
    pub fn effective_operations(&self) -> Vec<&SettingOperation> {
        let has_raw_import = self
            .operations
            .iter()
            .any(|op| matches!(op, SettingOperation::RawImport(_)));

        self.operations
            .iter()
            .filter(|op| !(has_raw_import && matches!(op, SettingOperation::Registry(_))))
            .collect()
    }

    /// Dependencies of the given kind declared by this setting
    pub fn dependencies_of_kind(
        &self,
        kind: DependencyKind,
    ) -> impl Iterator<Item = &SettingDependency> {
        self.dependencies.iter().filter(move |d| d.kind == kind)
    }

    /// Display names of the selection options, in index order
    pub fn display_names(&self) -> Vec<&str> {
        self.selection
            .as_ref()
            .map(|s| s.options.iter().map(|o| o.display_name.as_str()).collect())
            .unwrap_or_default()
    }

    /// Resolve a display name to its selection index
    pub fn index_of_display_name(&self, display_name: &str) -> Option<i64> {
        self.display_names()
            .iter()
            .position(|name| name.eq_ignore_ascii_case(display_name.trim()))
            .map(|i| i as i64)
    }

    /// Resolve a selection index to the per-field value map declared for it
    pub fn resolve_selection(&self, index: i64) -> Option<&ValueMap> {
        let index = usize::try_from(index).ok()?;
        self.selection
            .as_ref()
            .and_then(|s| s.options.get(index))
            .map(|o| &o.values)
    }
}

/// How a setting is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// On/off
    Toggle,
    /// One of several named options
    Selection,
    /// A numeric magnitude; zero means disabled
    NumericRange,
    /// A one-shot command
    Action,
}

impl std::fmt::Display for InputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Toggle => "toggle",
            Self::Selection => "selection",
            Self::NumericRange => "numeric_range",
            Self::Action => "action",
        };
        f.write_str(name)
    }
}

/// One backend operation declared by a setting
#[derive(Debug, Clone, PartialEq)]
pub enum SettingOperation {
    Registry(RegistryOperation),
    ScheduledTask(ScheduledTaskOperation),
    Script(ScriptOperation),
    PowerConfig(PowerConfigOperation),
    RawImport(RawImportBlock),
}

impl SettingOperation {
    /// Name used when reporting a failure of this operation
    pub fn describe(&self) -> String {
        match self {
            Self::Registry(op) => format!("registry {}\\{}", op.key_path, op.value_name),
            Self::ScheduledTask(op) => format!("scheduled task {}", op.task_path),
            Self::Script(op) => format!("script {}", op.name),
            Self::PowerConfig(op) => {
                format!("power setting {}/{}", op.subgroup_guid, op.setting_guid)
            }
            Self::RawImport(block) => format!("raw import {}", block.name),
        }
    }
}

/// Key/value store write
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryOperation {
    /// Full key path (e.g., "HKCU\\Software\\Policies\\Example")
    pub key_path: String,
    /// Value name; also the field key used by selection value maps
    pub value_name: String,
    /// Stored value type
    pub value_kind: RegistryValueKind,
    /// Value written when enabled
    pub enabled_value: Option<RegistryValue>,
    /// Value written when disabled; `None` deletes the value
    pub disabled_value: Option<RegistryValue>,
}

/// Registry value type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryValueKind {
    Dword,
    Qword,
    String,
    ExpandString,
    Binary,
}

/// Value stored in the key/value store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryValue {
    Integer(i64),
    Text(String),
    Binary(Vec<u8>),
}

/// Scheduled task enable/disable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTaskOperation {
    /// Task path (e.g., "\\Microsoft\\Windows\\Customer Experience Improvement Program\\Consolidator")
    pub task_path: String,
}

/// Script run on enable and/or disable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOperation {
    pub name: String,
    pub enabled_script: Option<String>,
    pub disabled_script: Option<String>,
}

impl ScriptOperation {
    /// Script body for the requested state, if one is declared
    pub fn script_for(&self, enable: bool) -> Option<&str> {
        if enable {
            self.enabled_script.as_deref()
        } else {
            self.disabled_script.as_deref()
        }
    }
}

/// Power profile value write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerConfigOperation {
    pub subgroup_guid: String,
    pub setting_guid: String,
    /// Field key used by selection value maps
    pub field: Option<String>,
    /// Value written when enabled and no explicit value is supplied
    pub enabled_value: i64,
    /// Value written when disabled
    pub disabled_value: i64,
}

/// Bulk import block; replaces every registry operation of the setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImportBlock {
    pub name: String,
    pub enabled_content: String,
    pub disabled_content: String,
}

impl RawImportBlock {
    pub fn content_for(&self, enable: bool) -> &str {
        if enable {
            &self.enabled_content
        } else {
            &self.disabled_content
        }
    }
}

/// What to restart once a setting's operations ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestartTarget {
    Process(String),
    Service(String),
}

/// Named options of a selection setting
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOptions {
    pub options: Vec<SelectionOption>,
}

/// One option of a selection setting
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOption {
    pub display_name: String,
    pub values: ValueMap,
}

/// Bounds of a numeric setting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericRange {
    pub min: i64,
    pub max: i64,
}

/// Dependency between two settings, referenced by id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingDependency {
    pub dependent_id: String,
    pub required_id: String,
    pub kind: DependencyKind,
    /// Required state as a display string or boolean token
    pub required_value: Option<String>,
}

/// Dependency kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// The required setting must be enabled as a cascade precondition
    RequiresEnabled,
    /// The required setting must hold `required_value` before the dependent may change
    RequiresValueBeforeAnyChange,
}

/// Value carried by an apply request or reported by discovery
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    Bool(bool),
    Integer(i64),
    Text(String),
    Fields(ValueMap),
}

impl SettingValue {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            Self::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl std::fmt::Display for SettingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{}", b),
            Self::Integer(v) => write!(f, "{}", v),
            Self::Text(s) => f.write_str(s),
            Self::Fields(fields) => {
                let rendered: Vec<String> = fields
                    .iter()
                    .map(|(name, value)| match value {
                        Some(RegistryValue::Integer(v)) => format!("{}={}", name, v),
                        Some(RegistryValue::Text(s)) => format!("{}={}", name, s),
                        Some(RegistryValue::Binary(bytes)) => {
                            format!("{}=<{} bytes>", name, bytes.len())
                        }
                        None => format!("{}=<disabled>", name),
                    })
                    .collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
        }
    }
}

/// Request to apply one setting
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyRequest {
    pub setting_id: String,
    pub enable: bool,
    pub value: Option<SettingValue>,
    pub command: Option<String>,
    pub checkbox_result: Option<bool>,
    /// Skip prerequisite handling and cascades; set on every nested apply
    pub skip_prerequisites: bool,
}

impl ApplyRequest {
    pub fn new(setting_id: impl Into<String>, enable: bool) -> Self {
        Self {
            setting_id: setting_id.into(),
            enable,
            value: None,
            command: None,
            checkbox_result: None,
            skip_prerequisites: false,
        }
    }

    pub fn enable(setting_id: impl Into<String>) -> Self {
        Self::new(setting_id, true)
    }

    pub fn disable(setting_id: impl Into<String>) -> Self {
        Self::new(setting_id, false)
    }

    pub fn with_value(mut self, value: SettingValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }

    pub fn with_checkbox_result(mut self, checkbox_result: Option<bool>) -> Self {
        self.checkbox_result = checkbox_result;
        self
    }

    pub fn skipping_prerequisites(mut self) -> Self {
        self.skip_prerequisites = true;
        self
    }
}

/// Outcome of applying one setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub cancelled: bool,
}

impl OperationResult {
    pub fn succeeded() -> Self {
        Self {
            success: true,
            error_message: None,
            cancelled: false,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error_message: Some(message.into()),
            cancelled: false,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            success: false,
            error_message: Some("operation was cancelled".to_string()),
            cancelled: true,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

/// Current state of a setting as reported by discovery
#[derive(Debug, Clone, PartialEq)]
pub struct SettingState {
    pub success: bool,
    pub is_enabled: bool,
    pub current_value: Option<SettingValue>,
    pub error: Option<String>,
}

impl SettingState {
    pub fn enabled(is_enabled: bool) -> Self {
        Self {
            success: true,
            is_enabled,
            current_value: None,
            error: None,
        }
    }

    pub fn with_value(mut self, value: SettingValue) -> Self {
        self.current_value = Some(value);
        self
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            is_enabled: false,
            current_value: None,
            error: Some(error.into()),
        }
    }

    /// Current selection index, when discovery reported one
    pub fn current_index(&self) -> Option<i64> {
        self.current_value.as_ref().and_then(SettingValue::as_integer)
    }
}

/// One requested change inside a configuration section
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigurationItem {
    pub id: String,
    pub name: String,
    pub is_selected: Option<bool>,
    pub selected_index: Option<i64>,
    pub value: Option<SettingValue>,
}

impl ConfigurationItem {
    pub fn toggle(id: impl Into<String>, is_selected: bool) -> Self {
        Self {
            id: id.into(),
            is_selected: Some(is_selected),
            ..Default::default()
        }
    }

    pub fn selection(id: impl Into<String>, selected_index: i64) -> Self {
        Self {
            id: id.into(),
            is_selected: Some(true),
            selected_index: Some(selected_index),
            ..Default::default()
        }
    }

    pub fn numeric(id: impl Into<String>, value: i64) -> Self {
        Self {
            id: id.into(),
            is_selected: Some(true),
            value: Some(SettingValue::Integer(value)),
            ..Default::default()
        }
    }
}

/// Ordered batch of changes requested together
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigurationSection {
    pub items: Vec<ConfigurationItem>,
}

impl ConfigurationSection {
    pub fn new(items: Vec<ConfigurationItem>) -> Self {
        Self { items }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Answer of a confirmation handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation {
    pub confirmed: bool,
    pub checkbox_result: Option<bool>,
}

impl Confirmation {
    pub fn confirmed() -> Self {
        Self {
            confirmed: true,
            checkbox_result: None,
        }
    }

    pub fn declined() -> Self {
        Self {
            confirmed: false,
            checkbox_result: None,
        }
    }

    pub fn with_checkbox(mut self, checked: bool) -> Self {
        self.checkbox_result = Some(checked);
        self
    }
}
