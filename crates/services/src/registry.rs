// In-memory cache of fitted models

use std::sync::Arc;

use dashmap::DashMap;
use gpc_ml::ModelArtifact;
use gpc_models::Target;

/// Fitted pipelines keyed by target. Replacing an entry swaps the whole
/// artifact, so a reader sees either the old model or the new one.
#[derive(Debug, Default)]
pub struct ModelRegistry {
    models: DashMap<Target, Arc<ModelArtifact>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, target: Target) -> Option<Arc<ModelArtifact>> {
        self.models.get(&target).map(|entry| Arc::clone(entry.value()))
    }

    pub fn insert(&self, artifact: Arc<ModelArtifact>) -> Option<Arc<ModelArtifact>> {
        self.models.insert(artifact.target, artifact)
    }

    pub fn contains(&self, target: Target) -> bool {
        self.models.contains_key(&target)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        Target::ALL.iter().all(|target| self.contains(*target))
    }

    /// Loaded artifacts in cascade order.
    pub fn snapshot(&self) -> Vec<Arc<ModelArtifact>> {
        Target::ALL.iter().filter_map(|target| self.get(*target)).collect()
    }

    pub fn clear(&self) {
        self.models.clear();
    }
}
