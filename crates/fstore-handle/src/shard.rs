//! Mapping of sequential object indices to bounded-depth directory paths.
//!
//! Objects live in `<base>/<level-1>/.../<level-depth>/<name>`. The innermost
//! directory holds up to `fanout` objects and every directory above it holds
//! up to `fanout` sub directories, so no directory grows beyond `fanout`
//! entries. Components are zero-padded decimals as wide as `fanout - 1`.
//!
//! With the default `fanout = 1000, depth = 2`:
//!
//! ```text
//! index 0           -> 000/000
//! index 1_000       -> 000/001
//! index 1_000_000   -> 001/000
//! ```

use std::path::{Path, PathBuf};

use tracing::error;

use crate::error::{HandleError, HandleResult};

/// Deterministic index to directory mapping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShardingScheme {
    fanout: u64,
    depth: u32,
    width: usize,
    max_index: u64,
}

impl ShardingScheme {
    pub const DEFAULT_FANOUT: u64 = 1000;
    pub const DEFAULT_DEPTH: u32 = 2;

    /// Create a scheme; `fanout` must be at least 2 and `depth` at least 1,
    /// and `fanout^(depth + 1)` must fit into a `u64`.
    pub fn new(fanout: u64, depth: u32) -> HandleResult<Self> {
        if fanout < 2 {
            return Err(HandleError::InvalidConfig(format!(
                "fanout must be at least 2, got {fanout}"
            )));
        }
        if depth == 0 {
            return Err(HandleError::InvalidConfig("depth must be at least 1".into()));
        }
        let capacity = depth
            .checked_add(1)
            .and_then(|levels| fanout.checked_pow(levels))
            .ok_or_else(|| {
                HandleError::InvalidConfig(format!(
                    "fanout {fanout} with depth {depth} exceeds the index range"
                ))
            })?;

        Ok(Self {
            fanout,
            depth,
            width: (fanout - 1).to_string().len(),
            max_index: capacity - 1,
        })
    }

    /// Entries per directory level.
    pub fn fanout(&self) -> u64 {
        self.fanout
    }

    /// Number of shard directory levels.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Largest index this scheme can place: `fanout^(depth + 1) - 1`.
    pub fn max_index(&self) -> u64 {
        self.max_index
    }

    /// Fail with [`HandleError::CapacityExceeded`] if `index` cannot be placed.
    pub fn check_capacity(&self, index: u64) -> HandleResult<()> {
        if index > self.max_index {
            return Err(HandleError::CapacityExceeded {
                index,
                max_index: self.max_index,
            });
        }
        Ok(())
    }

    /// Shard directory names for `index`, outermost first.
    pub fn components(&self, index: u64) -> HandleResult<Vec<String>> {
        self.check_capacity(index)?;
        // The innermost directory holds `fanout` objects.
        let mut group = index / self.fanout;
        let mut names = vec![String::new(); self.depth as usize];
        for slot in names.iter_mut().rev() {
            *slot = format!("{:0width$}", group % self.fanout, width = self.width);
            group /= self.fanout;
        }
        Ok(names)
    }

    /// Shard directory of `index` relative to a base directory.
    pub fn relative_path(&self, index: u64) -> HandleResult<PathBuf> {
        Ok(self.components(index)?.iter().collect())
    }

    /// Shard directory of `index` under `base`.
    ///
    /// With `create` set, missing directories along the path are created.
    /// Concurrent creators of the same shard do not fail each other. Without
    /// it, this is a pure lookup that does not touch the filesystem.
    pub fn locate(&self, base: &Path, index: u64, create: bool) -> HandleResult<PathBuf> {
        let dir = base.join(self.relative_path(index)?);
        if create && !dir.is_dir() {
            if let Err(e) = std::fs::create_dir_all(&dir) {
                error!(path = %dir.display(), error = %e, "failed to create shard directory");
                return Err(e.into());
            }
        }
        Ok(dir)
    }
}

impl Default for ShardingScheme {
    fn default() -> Self {
        Self {
            fanout: Self::DEFAULT_FANOUT,
            depth: Self::DEFAULT_DEPTH,
            width: 3,
            max_index: 999_999_999,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(scheme: &ShardingScheme, index: u64) -> PathBuf {
        scheme.relative_path(index).unwrap()
    }

    #[test]
    fn default_matches_explicit_construction() {
        assert_eq!(ShardingScheme::default(), ShardingScheme::new(1000, 2).unwrap());
    }

    #[test]
    fn default_layout_examples() {
        let s = ShardingScheme::default();
        assert_eq!(rel(&s, 0), PathBuf::from("000/000"));
        assert_eq!(rel(&s, 999), PathBuf::from("000/000"));
        assert_eq!(rel(&s, 1000), PathBuf::from("000/001"));
        assert_eq!(rel(&s, 999_999), PathBuf::from("000/999"));
        assert_eq!(rel(&s, 1_000_000), PathBuf::from("001/000"));
        assert_eq!(rel(&s, 999_999_999), PathBuf::from("999/999"));
    }

    #[test]
    fn path_has_exactly_depth_components() {
        let s = ShardingScheme::new(10, 3).unwrap();
        assert_eq!(s.components(4321).unwrap(), vec!["4", "3", "2"]);
        assert_eq!(s.components(9).unwrap(), vec!["0", "0", "0"]);
    }

    #[test]
    fn padding_follows_fanout_width() {
        let s = ShardingScheme::new(16, 2).unwrap();
        assert_eq!(s.components(16 * 3).unwrap(), vec!["00", "03"]);
        let s = ShardingScheme::new(101, 1).unwrap();
        assert_eq!(s.components(101 * 7).unwrap(), vec!["007"]);
    }

    #[test]
    fn capacity_bound() {
        let s = ShardingScheme::default();
        assert_eq!(s.max_index(), 999_999_999);
        assert!(s.check_capacity(999_999_999).is_ok());
        let err = s.relative_path(1_000_000_000).unwrap_err();
        assert!(matches!(
            err,
            HandleError::CapacityExceeded {
                index: 1_000_000_000,
                max_index: 999_999_999
            }
        ));
    }

    #[test]
    fn rejects_invalid_parameters() {
        assert!(ShardingScheme::new(0, 2).is_err());
        assert!(ShardingScheme::new(1, 2).is_err());
        assert!(ShardingScheme::new(1000, 0).is_err());
        assert!(ShardingScheme::new(u64::MAX, 2).is_err());
    }

    #[test]
    fn lookup_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let s = ShardingScheme::default();
        let path = s.locate(dir.path(), 5, false).unwrap();
        assert_eq!(path, dir.path().join("000").join("000"));
        assert!(!path.exists());
    }

    #[test]
    fn create_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let s = ShardingScheme::default();
        let first = s.locate(dir.path(), 2_000_001, true).unwrap();
        let second = s.locate(dir.path(), 2_000_002, true).unwrap();
        assert_eq!(first, second);
        assert!(first.is_dir());
        assert_eq!(first, dir.path().join("002").join("000"));
    }

    #[test]
    fn concurrent_creators_of_one_shard_all_succeed() {
        use std::sync::Arc;
        use std::thread;

        let dir = Arc::new(tempfile::tempdir().unwrap());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let dir = Arc::clone(&dir);
                thread::spawn(move || {
                    ShardingScheme::default()
                        .locate(dir.path(), 7_000 + i, true)
                        .unwrap()
                })
            })
            .collect();
        for h in handles {
            assert!(h.join().expect("thread should not panic").is_dir());
        }
    }

    #[test]
    fn create_surfaces_failures() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("000");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let err = ShardingScheme::default().locate(dir.path(), 0, true).unwrap_err();
        assert!(matches!(err, HandleError::Io(_)));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn path_is_a_pure_function_of_index(index in 0u64..=999_999_999) {
            let a = ShardingScheme::default().relative_path(index).unwrap();
            let b = ShardingScheme::new(1000, 2).unwrap().relative_path(index).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn components_stay_below_fanout(
            fanout in 2u64..50,
            depth in 1u32..4,
            seed in any::<u64>(),
        ) {
            let s = ShardingScheme::new(fanout, depth).unwrap();
            let index = seed % (s.max_index() + 1);
            let parts = s.components(index).unwrap();
            prop_assert_eq!(parts.len(), depth as usize);
            for part in &parts {
                let value: u64 = part.parse().unwrap();
                prop_assert!(value < fanout);
                prop_assert_eq!(part.len(), (fanout - 1).to_string().len());
            }
        }

        #[test]
        fn neighbours_share_a_leaf(group in 0u64..999_999) {
            let s = ShardingScheme::default();
            let first = s.relative_path(group * 1000).unwrap();
            let last = s.relative_path(group * 1000 + 999).unwrap();
            prop_assert_eq!(first, last);
        }
    }
}
