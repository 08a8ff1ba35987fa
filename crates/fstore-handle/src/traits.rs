//! Seams to the surrounding session: the handle registry and the flush hook.

use std::sync::Arc;

use fstore_types::HandleId;

use crate::error::HandleResult;
use crate::handle::FileStoreHandle;

/// Session-wide lookup from a handle identity to the live handle.
///
/// Handles register on admission and deregister on disposal. Implementations
/// must be thread-safe and must allow registration, deregistration and
/// lookup to run concurrently. A deregistered identity never resolves again.
pub trait HandleRegistry: Send + Sync {
    /// Make `handle` reachable under `id`.
    fn register(&self, id: HandleId, handle: &Arc<FileStoreHandle>) -> HandleResult<()>;

    /// Remove `id` for good. Returns `true` if it was registered.
    fn deregister(&self, id: HandleId) -> bool;

    /// The live handle registered under `id`, if any.
    fn resolve(&self, id: HandleId) -> Option<Arc<FileStoreHandle>>;

    /// Ids of all live handles, sorted.
    fn handle_ids(&self) -> Vec<HandleId>;

    /// Check whether `id` currently resolves.
    fn contains(&self, id: HandleId) -> bool {
        self.resolve(id).is_some()
    }
}

/// Hook run before a foreign object's bytes are copied.
///
/// Lets the object write out content it still buffers in memory.
pub trait FlushCallback {
    fn flush(&self) -> std::io::Result<()>;
}

impl<F> FlushCallback for F
where
    F: Fn() -> std::io::Result<()>,
{
    fn flush(&self) -> std::io::Result<()> {
        self()
    }
}

/// Flush hook for objects that never buffer.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFlush;

impl FlushCallback for NoFlush {
    fn flush(&self) -> std::io::Result<()> {
        Ok(())
    }
}
