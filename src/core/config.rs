use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub base_dir: PathBuf,

    // Writer
    pub refresh_interval_ms: u64,      // Max staleness of acquired searchers
    pub max_buffered_docs: usize,      // Refresh once the buffer holds this many docs
    pub background_merge: bool,
    pub merge_policy: MergePolicyConfig,

    // Lifecycle / scan
    pub build_wait_timeout_ms: u64,    // How long create_searcher waits for BUILT
    pub stale_cleanup: bool,           // Delete superseded hits found while scanning
    pub default_limit: usize,          // K when the host filter does not cap rows
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MergePolicyConfig {
    pub max_segments_per_tier: usize,
    pub min_segments_to_merge: usize,
    pub max_segments_to_merge: usize,
    pub max_merged_docs: usize,
}

impl IndexerConfig {
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        IndexerConfig {
            base_dir: base_dir.into(),
            ..Default::default()
        }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }

    pub fn build_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.build_wait_timeout_ms)
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        IndexerConfig {
            base_dir: PathBuf::from("./data"),
            refresh_interval_ms: 1000,
            max_buffered_docs: 10_000,
            background_merge: true,
            merge_policy: MergePolicyConfig::default(),
            build_wait_timeout_ms: 60_000,
            stale_cleanup: false,
            default_limit: 1000,
        }
    }
}

impl Default for MergePolicyConfig {
    fn default() -> Self {
        MergePolicyConfig {
            max_segments_per_tier: 10,
            min_segments_to_merge: 2,
            max_segments_to_merge: 10,
            max_merged_docs: 5_000_000,
        }
    }
}
