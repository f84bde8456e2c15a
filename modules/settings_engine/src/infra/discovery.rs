//! Caching discovery wrapper

use crate::contract::{SettingDefinition, SettingState};
use crate::domain::ports::DiscoveryService;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Caches successful states of an inner discovery service per setting id
///
/// Failed states are never cached. The apply service invalidates a setting
/// after every apply attempt. A query in flight while its id is invalidated
/// returns its result but does not cache it.
pub struct CachingDiscovery {
    inner: Arc<dyn DiscoveryService>,
    cache: RwLock<StateCache>,
}

#[derive(Default)]
struct StateCache {
    states: HashMap<String, SettingState>,
    /// Bumped per id by `invalidate`
    generations: HashMap<String, u64>,
    /// Bumped by `invalidate_all`
    epoch: u64,
}

impl StateCache {
    fn generation(&self, id: &str) -> u64 {
        self.generations.get(id).copied().unwrap_or(0)
    }
}

impl CachingDiscovery {
    pub fn new(inner: Arc<dyn DiscoveryService>) -> Self {
        Self {
            inner,
            cache: RwLock::new(StateCache::default()),
        }
    }

    /// Number of cached states
    pub fn cached_len(&self) -> usize {
        self.cache.read().states.len()
    }
}

#[async_trait]
impl DiscoveryService for CachingDiscovery {
    async fn get_states(
        &self,
        definitions: &[SettingDefinition],
    ) -> anyhow::Result<HashMap<String, SettingState>> {
        let mut states = HashMap::with_capacity(definitions.len());
        let mut missing = Vec::new();
        let mut generations = HashMap::new();
        let epoch = {
            let cache = self.cache.read();
            for definition in definitions {
                match cache.states.get(&definition.id) {
                    Some(state) => {
                        states.insert(definition.id.clone(), state.clone());
                    }
                    None => {
                        generations.insert(definition.id.clone(), cache.generation(&definition.id));
                        missing.push(definition.clone());
                    }
                }
            }
            cache.epoch
        };

        if missing.is_empty() {
            return Ok(states);
        }

        debug!(cached = states.len(), queried = missing.len(), "Querying setting states");
        let fresh = self.inner.get_states(&missing).await?;

        {
            let mut cache = self.cache.write();
            if cache.epoch == epoch {
                for (id, state) in &fresh {
                    let unchanged = generations
                        .get(id)
                        .is_some_and(|generation| *generation == cache.generation(id));
                    if state.success && unchanged {
                        cache.states.insert(id.clone(), state.clone());
                    }
                }
            }
        }

        states.extend(fresh);
        Ok(states)
    }

    fn invalidate(&self, ids: &[String]) {
        let mut cache = self.cache.write();
        for id in ids {
            cache.states.remove(id);
            *cache.generations.entry(id.clone()).or_default() += 1;
        }
        drop(cache);
        self.inner.invalidate(ids);
    }

    fn invalidate_all(&self) {
        {
            let mut cache = self.cache.write();
            cache.states.clear();
            cache.epoch += 1;
        }
        self.inner.invalidate_all();
    }
}
