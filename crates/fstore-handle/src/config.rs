use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{HandleError, HandleResult};
use crate::shard::ShardingScheme;

/// Configuration shared by the handles of one session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandleConfig {
    /// Maximum number of children per shard directory.
    pub fanout: u64,
    /// Number of shard directory levels below the base directory.
    pub depth: u32,
    /// Capacity of the per-handle cross-handle copy cache.
    pub dedup_capacity: usize,
    /// Directory under which base directories are created. Falls back to
    /// the system temp directory.
    pub temp_root: Option<PathBuf>,
    /// Maximum length of the sanitized label in a base directory name.
    pub max_label_len: usize,
}

impl Default for HandleConfig {
    fn default() -> Self {
        Self {
            fanout: 1000,
            depth: 2,
            dedup_capacity: 10_000,
            temp_root: None,
            max_label_len: 32,
        }
    }
}

impl HandleConfig {
    /// Default layout with base directories placed under `root`.
    pub fn with_temp_root(root: impl Into<PathBuf>) -> Self {
        Self {
            temp_root: Some(root.into()),
            ..Default::default()
        }
    }

    /// Check every value, failing with `InvalidConfig` on the first bad one.
    pub fn validate(&self) -> HandleResult<()> {
        if self.dedup_capacity == 0 {
            return Err(HandleError::InvalidConfig(
                "dedup_capacity must be at least 1".into(),
            ));
        }
        self.sharding().map(|_| ())
    }

    /// The sharding scheme described by `fanout` and `depth`.
    pub fn sharding(&self) -> HandleResult<ShardingScheme> {
        ShardingScheme::new(self.fanout, self.depth)
    }

    /// The directory base directories are created in.
    pub fn resolved_temp_root(&self) -> PathBuf {
        self.temp_root.clone().unwrap_or_else(std::env::temp_dir)
    }
}
