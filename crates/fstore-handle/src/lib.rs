//! File store handles for externally stored objects.
//!
//! Large binary objects referenced from in-memory cells live outside of the
//! cells, in files below a per-handle base directory. This crate gives those
//! objects a durable location, a stable [`ObjectKey`](fstore_types::ObjectKey)
//! and safe semantics when a key crosses into a context that does not own it.
//!
//! # Components
//!
//! - [`ShardingScheme`] -- index to `<base>/<shard>/<shard>` mapping with bounded fan-out
//! - [`DuplicateNameChecker`] -- unique object names per open handle
//! - [`CopyDedupCache`] -- at most one local copy per foreign key
//! - [`HandleRegistry`] -- identity to handle lookup, with [`InMemoryHandleRegistry`]
//! - [`FileStoreHandle`] -- allocation, placement, copying and lifecycle
//!
//! # Design Rules
//!
//! 1. Indices are handed out sequentially and never reissued for an identity.
//! 2. Shard paths are a pure function of the index and the scheme.
//! 3. A foreign object is physically copied at most once per destination
//!    handle while its mapping is cached.
//! 4. Deferred restoration copies its source exactly once, on first use.
//! 5. Filesystem errors are surfaced immediately, never retried; only
//!    disposal downgrades a failure to a warning.

pub mod checker;
pub mod config;
pub mod dedup;
pub mod error;
pub mod fsutil;
pub mod handle;
pub mod memory;
pub mod shard;
pub mod traits;

pub use checker::DuplicateNameChecker;
pub use config::HandleConfig;
pub use dedup::CopyDedupCache;
pub use error::{HandleError, HandleResult};
pub use handle::{DisposeOutcome, FileStore, FileStoreHandle, Lifecycle, PersistedHandle};
pub use memory::InMemoryHandleRegistry;
pub use shard::ShardingScheme;
pub use traits::{FlushCallback, HandleRegistry, NoFlush};
