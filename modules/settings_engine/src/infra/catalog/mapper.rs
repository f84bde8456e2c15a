//! Conversions from catalog DTOs into contract models

use super::dto::*;
use crate::contract;

impl From<SettingDefinitionDto> for contract::SettingDefinition {
    fn from(dto: SettingDefinitionDto) -> Self {
        let dependencies = dto
            .dependencies
            .into_iter()
            .map(|dependency| contract::SettingDependency {
                dependent_id: dto.id.clone(),
                required_id: dependency.required_id,
                kind: dependency.kind.into(),
                required_value: dependency.required_value,
            })
            .collect();

        let selection = if dto.options.is_empty() {
            None
        } else {
            Some(contract::SelectionOptions {
                options: dto.options.into_iter().map(Into::into).collect(),
            })
        };

        Self {
            name: dto.name.unwrap_or_else(|| dto.id.clone()),
            id: dto.id,
            group_id: dto.group_id,
            input_kind: dto.input_kind.into(),
            operations: dto.operations.into_iter().map(Into::into).collect(),
            dependencies,
            auto_enable_ids: dto.auto_enable_ids,
            presets: dto.presets,
            selection,
            numeric_range: dto.numeric_range.map(|range| contract::NumericRange {
                min: range.min,
                max: range.max,
            }),
            requires_confirmation: dto.requires_confirmation,
            command: dto.command,
            restart: dto.restart.map(Into::into),
        }
    }
}

impl From<InputKindDto> for contract::InputKind {
    fn from(dto: InputKindDto) -> Self {
        match dto {
            InputKindDto::Toggle => Self::Toggle,
            InputKindDto::Selection => Self::Selection,
            InputKindDto::NumericRange => Self::NumericRange,
            InputKindDto::Action => Self::Action,
        }
    }
}

impl From<DependencyKindDto> for contract::DependencyKind {
    fn from(dto: DependencyKindDto) -> Self {
        match dto {
            DependencyKindDto::RequiresEnabled => Self::RequiresEnabled,
            DependencyKindDto::RequiresValueBeforeAnyChange => Self::RequiresValueBeforeAnyChange,
        }
    }
}

impl From<SettingOperationDto> for contract::SettingOperation {
    fn from(dto: SettingOperationDto) -> Self {
        match dto {
            SettingOperationDto::Registry {
                key_path,
                value_name,
                value_kind,
                enabled_value,
                disabled_value,
            } => Self::Registry(contract::RegistryOperation {
                key_path,
                value_name,
                value_kind: value_kind.into(),
                enabled_value: enabled_value.map(Into::into),
                disabled_value: disabled_value.map(Into::into),
            }),
            SettingOperationDto::ScheduledTask { task_path } => {
                Self::ScheduledTask(contract::ScheduledTaskOperation { task_path })
            }
            SettingOperationDto::Script {
                name,
                enabled_script,
                disabled_script,
            } => Self::Script(contract::ScriptOperation {
                name,
                enabled_script,
                disabled_script,
            }),
            SettingOperationDto::PowerConfig {
                subgroup_guid,
                setting_guid,
                field,
                enabled_value,
                disabled_value,
            } => Self::PowerConfig(contract::PowerConfigOperation {
                subgroup_guid,
                setting_guid,
                field,
                enabled_value,
                disabled_value,
            }),
            SettingOperationDto::RawImport {
                name,
                enabled_content,
                disabled_content,
            } => Self::RawImport(contract::RawImportBlock {
                name,
                enabled_content,
                disabled_content,
            }),
        }
    }
}

impl From<RegistryValueKindDto> for contract::RegistryValueKind {
    fn from(dto: RegistryValueKindDto) -> Self {
        match dto {
            RegistryValueKindDto::Dword => Self::Dword,
            RegistryValueKindDto::Qword => Self::Qword,
            RegistryValueKindDto::String => Self::String,
            RegistryValueKindDto::ExpandString => Self::ExpandString,
            RegistryValueKindDto::Binary => Self::Binary,
        }
    }
}

impl From<RegistryValueDto> for contract::RegistryValue {
    fn from(dto: RegistryValueDto) -> Self {
        match dto {
            RegistryValueDto::Integer(value) => Self::Integer(value),
            RegistryValueDto::Text(value) => Self::Text(value),
            RegistryValueDto::Binary(value) => Self::Binary(value),
        }
    }
}

impl From<SelectionOptionDto> for contract::SelectionOption {
    fn from(dto: SelectionOptionDto) -> Self {
        Self {
            display_name: dto.display_name,
            values: dto
                .values
                .into_iter()
                .map(|(field, value)| (field, value.map(Into::into)))
                .collect(),
        }
    }
}

impl From<RestartTargetDto> for contract::RestartTarget {
    fn from(dto: RestartTargetDto) -> Self {
        match dto {
            RestartTargetDto::Process(name) => Self::Process(name),
            RestartTargetDto::Service(name) => Self::Service(name),
        }
    }
}
