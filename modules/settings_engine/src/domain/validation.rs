//! Validation of setting identifiers and definitions

use crate::contract::{EngineError, InputKind, SettingDefinition};

/// Validate a setting id
///
/// Accepts ids that start with an alphanumeric character and contain only
/// alphanumeric characters, '_', '.', and '-'.
pub fn validate_setting_id(id: &str) -> Result<(), EngineError> {
    let Some(first_char) = id.chars().next() else {
        return Err(EngineError::validation("setting id cannot be empty"));
    };

    if !first_char.is_alphanumeric() {
        return Err(EngineError::validation(format!(
            "setting id '{}' must start with alphanumeric character",
            id
        )));
    }

    let is_valid = id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '_' || c == '.' || c == '-');

    if !is_valid {
        return Err(EngineError::validation(format!(
            "setting id '{}' contains invalid characters. Only alphanumeric, '_', '.', and '-' are allowed",
            id
        )));
    }

    Ok(())
}

/// Validate the internal consistency of one setting definition
///
/// References to other settings are only checked for shape: settings may
/// depend on ids that are not registered on the running platform.
pub fn validate_definition(definition: &SettingDefinition) -> Result<(), EngineError> {
    validate_setting_id(&definition.id)?;

    if definition.group_id.trim().is_empty() {
        return Err(EngineError::validation(format!(
            "setting '{}' has an empty group id",
            definition.id
        )));
    }

    for dependency in &definition.dependencies {
        if dependency.dependent_id != definition.id {
            return Err(EngineError::validation(format!(
                "setting '{}' declares a dependency owned by '{}'",
                definition.id, dependency.dependent_id
            )));
        }
        validate_setting_id(&dependency.required_id)?;
        if dependency.required_id == definition.id {
            return Err(EngineError::validation(format!(
                "setting '{}' cannot depend on itself",
                definition.id
            )));
        }
    }

    for auto_enable_id in &definition.auto_enable_ids {
        validate_setting_id(auto_enable_id)?;
        if *auto_enable_id == definition.id {
            return Err(EngineError::validation(format!(
                "setting '{}' cannot auto-enable itself",
                definition.id
            )));
        }
    }

    match definition.input_kind {
        InputKind::Selection => {
            if definition.display_names().is_empty() {
                return Err(EngineError::validation(format!(
                    "selection setting '{}' declares no options",
                    definition.id
                )));
            }
        }
        InputKind::Toggle | InputKind::NumericRange | InputKind::Action => {
            if definition.presets.is_some() {
                return Err(EngineError::validation(format!(
                    "only selection settings can declare presets ('{}' is {})",
                    definition.id, definition.input_kind
                )));
            }
        }
    }

    if let Some(range) = definition.numeric_range {
        if range.min > range.max {
            return Err(EngineError::validation(format!(
                "setting '{}' has an empty numeric range {}..{}",
                definition.id, range.min, range.max
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::{
        DependencyKind, NumericRange, PresetMap, SelectionOption, SelectionOptions,
        SettingDependency, ValueMap,
    };

    fn dependency(owner: &str, required: &str) -> SettingDependency {
        SettingDependency {
            dependent_id: owner.to_string(),
            required_id: required.to_string(),
            kind: DependencyKind::RequiresEnabled,
            required_value: None,
        }
    }

    #[test]
    fn test_validate_setting_id() {
        assert!(validate_setting_id("privacy-telemetry").is_ok());
        assert!(validate_setting_id("gaming.game_mode").is_ok());
        assert!(validate_setting_id("Setting1").is_ok());
    }

    #[test]
    fn test_validate_setting_id_invalid() {
        assert!(validate_setting_id("").is_err());
        assert!(validate_setting_id("-invalid").is_err());
        assert!(validate_setting_id("_invalid").is_err());
        assert!(validate_setting_id("has space").is_err());
        assert!(validate_setting_id("bad#id").is_err());
    }

    #[test]
    fn test_valid_definition() {
        let mut definition = SettingDefinition::new("a", "group", InputKind::Toggle);
        definition.dependencies.push(dependency("a", "b"));
        definition.auto_enable_ids.push("c".to_string());
        assert!(validate_definition(&definition).is_ok());
    }

    #[test]
    fn test_self_dependency_rejected() {
        let mut definition = SettingDefinition::new("a", "group", InputKind::Toggle);
        definition.dependencies.push(dependency("a", "a"));
        assert!(validate_definition(&definition).is_err());
    }

    #[test]
    fn test_foreign_dependency_rejected() {
        let mut definition = SettingDefinition::new("a", "group", InputKind::Toggle);
        definition.dependencies.push(dependency("x", "b"));
        assert!(validate_definition(&definition).is_err());
    }

    #[test]
    fn test_selection_without_options_rejected() {
        let definition = SettingDefinition::new("a", "group", InputKind::Selection);
        assert!(validate_definition(&definition).is_err());

        let mut definition = definition;
        definition.selection = Some(SelectionOptions {
            options: vec![SelectionOption {
                display_name: "Off".to_string(),
                values: ValueMap::new(),
            }],
        });
        assert!(validate_definition(&definition).is_ok());
    }

    #[test]
    fn test_presets_on_toggle_rejected() {
        let mut definition = SettingDefinition::new("a", "group", InputKind::Toggle);
        definition.presets = Some(PresetMap::new());
        assert!(validate_definition(&definition).is_err());
    }

    #[test]
    fn test_empty_numeric_range_rejected() {
        let mut definition = SettingDefinition::new("a", "group", InputKind::NumericRange);
        definition.numeric_range = Some(NumericRange { min: 10, max: 1 });
        assert!(validate_definition(&definition).is_err());
    }
}
