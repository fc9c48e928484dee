//! Registry mapping extension ids to content source implementations

use crate::error::{PagekeepError, Result};
use crate::source::ContentSource;
use std::collections::HashMap;
use std::sync::Arc;

/// Extension id → content source
#[derive(Default, Clone)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn ContentSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under its own id, replacing any previous one
    pub fn register(&mut self, source: Arc<dyn ContentSource>) -> Option<Arc<dyn ContentSource>> {
        let id = source.id().to_string();
        tracing::debug!(extension_id = %id, "registered content source");
        self.sources.insert(id, source)
    }

    /// Look up the source for an extension id
    pub fn get(&self, extension_id: &str) -> Result<Arc<dyn ContentSource>> {
        self.sources
            .get(extension_id)
            .cloned()
            .ok_or_else(|| PagekeepError::SourceNotFound(extension_id.to_string()))
    }

    pub fn contains(&self, extension_id: &str) -> bool {
        self.sources.contains_key(extension_id)
    }

    /// Registered extension ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sources.keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("sources", &self.ids())
            .finish()
    }
}
