use crate::join::{JoinOptions, Suffixes};

// Tunables of a `Session`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    // Parsed datasets kept in memory, keyed by content. 0 disables caching.
    pub cache_entries: usize,
    pub preview_rows: usize,
    pub spatial_suffixes: Suffixes,
    pub attribute_suffixes: Suffixes,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            cache_entries: 8,
            preview_rows: 5,
            spatial_suffixes: Suffixes::spatial(),
            attribute_suffixes: Suffixes::attribute(),
        }
    }
}

impl PipelineConfig {
    pub fn join_options(&self) -> JoinOptions {
        JoinOptions {
            spatial_suffixes: self.spatial_suffixes.clone(),
            attribute_suffixes: self.attribute_suffixes.clone(),
        }
    }
}
