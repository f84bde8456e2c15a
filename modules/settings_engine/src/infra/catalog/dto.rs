//! Catalog file DTOs with serde derives
//!
//! Settings catalogs are declared statically in YAML or JSON files. These types
//! mirror the file layout; `mapper` converts them into contract models.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Catalog file root
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFileDto {
    /// Declared settings
    pub settings: Vec<SettingDefinitionDto>,
}

/// Setting definition as declared in a catalog file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingDefinitionDto {
    pub id: String,

    /// Display name (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,

    pub group_id: String,

    pub input_kind: InputKindDto,

    #[serde(default)]
    pub operations: Vec<SettingOperationDto>,

    #[serde(default)]
    pub dependencies: Vec<SettingDependencyDto>,

    #[serde(default)]
    pub auto_enable_ids: Vec<String>,

    /// Preset index -> child id -> expected state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presets: Option<IndexMap<i64, BTreeMap<String, bool>>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<SelectionOptionDto>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub numeric_range: Option<NumericRangeDto>,

    #[serde(default)]
    pub requires_confirmation: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart: Option<RestartTargetDto>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKindDto {
    Toggle,
    Selection,
    NumericRange,
    Action,
}

/// Backend operation, tagged by `type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettingOperationDto {
    Registry {
        key_path: String,
        value_name: String,
        #[serde(default = "default_value_kind")]
        value_kind: RegistryValueKindDto,
        #[serde(default)]
        enabled_value: Option<RegistryValueDto>,
        #[serde(default)]
        disabled_value: Option<RegistryValueDto>,
    },
    ScheduledTask {
        task_path: String,
    },
    Script {
        name: String,
        #[serde(default)]
        enabled_script: Option<String>,
        #[serde(default)]
        disabled_script: Option<String>,
    },
    PowerConfig {
        subgroup_guid: String,
        setting_guid: String,
        #[serde(default)]
        field: Option<String>,
        enabled_value: i64,
        disabled_value: i64,
    },
    RawImport {
        name: String,
        enabled_content: String,
        disabled_content: String,
    },
}

fn default_value_kind() -> RegistryValueKindDto {
    RegistryValueKindDto::Dword
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistryValueKindDto {
    Dword,
    Qword,
    String,
    ExpandString,
    Binary,
}

/// Registry value: integer, string, or list of bytes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RegistryValueDto {
    Integer(i64),
    Text(String),
    Binary(Vec<u8>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SettingDependencyDto {
    pub required_id: String,
    pub kind: DependencyKindDto,
    #[serde(default)]
    pub required_value: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKindDto {
    RequiresEnabled,
    RequiresValueBeforeAnyChange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionOptionDto {
    pub display_name: String,
    /// Field -> value; `null` disables the field
    #[serde(default)]
    pub values: BTreeMap<String, Option<RegistryValueDto>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NumericRangeDto {
    pub min: i64,
    pub max: i64,
}

/// Restart target, e.g. `{ kind: process, name: explorer }`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum RestartTargetDto {
    Process(String),
    Service(String),
}
