//! Setting dependency graph
//!
//! Dependencies are declared per setting and refer to other settings by id only.
//! The graph keeps them as two adjacency maps so both directions can be walked
//! without embedding references between definitions.

use crate::contract::{DependencyKind, SettingDefinition};
use std::collections::HashMap;

/// Adjacency maps keyed by setting id
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// dependent id -> (required id, kind)
    requirements: HashMap<String, Vec<(String, DependencyKind)>>,
    /// required id -> (dependent id, kind)
    dependents: HashMap<String, Vec<(String, DependencyKind)>>,
}

impl DependencyGraph {
    /// Build the graph from setting definitions
    ///
    /// Every definition becomes a node, even without dependencies.
    pub fn from_definitions<'a>(definitions: impl IntoIterator<Item = &'a SettingDefinition>) -> Self {
        let mut graph = Self::default();
        for definition in definitions {
            graph.requirements.entry(definition.id.clone()).or_default();
            for dependency in &definition.dependencies {
                graph.add_edge(&definition.id, &dependency.required_id, dependency.kind);
            }
        }
        graph
    }

    fn add_edge(&mut self, dependent_id: &str, required_id: &str, kind: DependencyKind) {
        let requirements = self.requirements.entry(dependent_id.to_string()).or_default();
        if !requirements.iter().any(|(id, k)| id == required_id && *k == kind) {
            requirements.push((required_id.to_string(), kind));
        }
        let dependents = self.dependents.entry(required_id.to_string()).or_default();
        if !dependents.iter().any(|(id, k)| id == dependent_id && *k == kind) {
            dependents.push((dependent_id.to_string(), kind));
        }
    }

    /// Whether the setting is a node of the graph
    pub fn contains(&self, id: &str) -> bool {
        self.requirements.contains_key(id)
    }

    /// Number of settings in the graph
    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Settings that declare a dependency of `kind` on the given setting
    pub fn dependents_of(&self, id: &str, kind: DependencyKind) -> Vec<&str> {
        self.dependents
            .get(id)
            .map(|edges| {
                edges
                    .iter()
                    .filter(|(_, k)| *k == kind)
                    .map(|(dependent, _)| dependent.as_str())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Find one dependency cycle, if any, as the list of ids forming it
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            Visiting,
            Done,
        }

        fn visit<'a>(
            graph: &'a DependencyGraph,
            id: &'a str,
            marks: &mut HashMap<&'a str, Mark>,
            stack: &mut Vec<&'a str>,
        ) -> Option<Vec<String>> {
            match marks.get(id) {
                Some(Mark::Done) => return None,
                Some(Mark::Visiting) => {
                    let start = stack.iter().position(|s| *s == id).unwrap_or(0);
                    return Some(stack[start..].iter().map(|s| s.to_string()).collect());
                }
                None => {}
            }

            marks.insert(id, Mark::Visiting);
            stack.push(id);
            if let Some(edges) = graph.requirements.get(id) {
                for (required, _) in edges {
                    if let Some(cycle) = visit(graph, required, marks, stack) {
                        return Some(cycle);
                    }
                }
            }
            stack.pop();
            marks.insert(id, Mark::Done);
            None
        }

        let mut ids: Vec<&str> = self.requirements.keys().map(String::as_str).collect();
        ids.sort_unstable();

        let mut marks = HashMap::new();
        for id in ids {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(self, id, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
        None
    }
}
