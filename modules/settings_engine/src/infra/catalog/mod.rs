//! Static settings catalog
//!
//! Settings are declared up front (in code or in a YAML/JSON catalog file) and
//! never change afterwards, so lookups need no locking.

pub mod dto;
pub mod mapper;

use crate::contract::{DependencyKind, EngineError, SettingDefinition};
use crate::domain::graph::DependencyGraph;
use crate::domain::ports::SettingsCatalog;
use crate::domain::validation::validate_definition;
use async_trait::async_trait;
use dto::CatalogFileDto;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Error type for catalog construction
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Cannot read catalog file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse catalog: {0}")]
    Parse(String),

    #[error("Duplicate setting id: {0}")]
    DuplicateId(String),

    #[error("Invalid setting definition: {0}")]
    Invalid(#[from] EngineError),
}

/// Immutable in-memory catalog
#[derive(Debug, Clone)]
pub struct StaticSettingsCatalog {
    settings: IndexMap<String, SettingDefinition>,
    graph: DependencyGraph,
}

impl StaticSettingsCatalog {
    /// Build a catalog, rejecting invalid definitions and duplicate ids
    pub fn new(definitions: Vec<SettingDefinition>) -> Result<Self, CatalogError> {
        let mut settings = IndexMap::with_capacity(definitions.len());
        for definition in definitions {
            validate_definition(&definition)?;
            if settings.contains_key(&definition.id) {
                return Err(CatalogError::DuplicateId(definition.id));
            }
            settings.insert(definition.id.clone(), definition);
        }

        let graph = DependencyGraph::from_definitions(settings.values());
        if let Some(cycle) = graph.find_cycle() {
            warn!(cycle = ?cycle, "Settings catalog declares a circular dependency");
        }

        Ok(Self { settings, graph })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFileDto =
            serde_yaml::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_dto(file)
    }

    pub fn from_json_str(content: &str) -> Result<Self, CatalogError> {
        let file: CatalogFileDto =
            serde_json::from_str(content).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::from_dto(file)
    }

    /// Load a catalog file; `.json` files are parsed as JSON, everything else as YAML
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));

        let catalog = if is_json {
            Self::from_json_str(&content)?
        } else {
            Self::from_yaml_str(&content)?
        };
        info!(path = %path.display(), settings = catalog.len(), "Settings catalog loaded");
        Ok(catalog)
    }

    fn from_dto(file: CatalogFileDto) -> Result<Self, CatalogError> {
        Self::new(file.settings.into_iter().map(Into::into).collect())
    }

    pub fn get(&self, id: &str) -> Option<&SettingDefinition> {
        self.settings.get(id)
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

#[async_trait]
impl SettingsCatalog for StaticSettingsCatalog {
    async fn get_setting(&self, id: &str) -> anyhow::Result<Option<SettingDefinition>> {
        Ok(self.settings.get(id).cloned())
    }

    async fn get_all_settings(&self) -> anyhow::Result<Vec<SettingDefinition>> {
        Ok(self.settings.values().cloned().collect())
    }

    async fn get_dependents(
        &self,
        id: &str,
        kind: DependencyKind,
    ) -> anyhow::Result<Vec<SettingDefinition>> {
        Ok(self
            .graph
            .dependents_of(id, kind)
            .into_iter()
            .filter_map(|dependent| self.settings.get(dependent).cloned())
            .collect())
    }
}
