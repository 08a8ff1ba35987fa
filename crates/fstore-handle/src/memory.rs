//! In-process handle registry.
//!
//! [`InMemoryHandleRegistry`] keeps weak references to the registered
//! handles in a `HashMap` behind a `RwLock`, together with the set of
//! identities that were deregistered. A handle dropped without disposal
//! simply stops resolving; a deregistered identity is refused forever.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock, Weak};

use tracing::warn;

use fstore_types::HandleId;

use crate::error::{HandleError, HandleResult};
use crate::handle::FileStoreHandle;
use crate::traits::HandleRegistry;

#[derive(Default)]
struct RegistryState {
    live: HashMap<HandleId, Weak<FileStoreHandle>>,
    retired: HashSet<HandleId>,
}

/// Session-owned implementation of [`HandleRegistry`].
#[derive(Default)]
pub struct InMemoryHandleRegistry {
    state: RwLock<RegistryState>,
}

impl InMemoryHandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered handles that are still alive.
    pub fn len(&self) -> usize {
        self.state
            .read()
            .expect("registry lock poisoned")
            .live
            .values()
            .filter(|h| h.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `id` was deregistered.
    pub fn is_retired(&self, id: HandleId) -> bool {
        self.state
            .read()
            .expect("registry lock poisoned")
            .retired
            .contains(&id)
    }
}

impl HandleRegistry for InMemoryHandleRegistry {
    fn register(&self, id: HandleId, handle: &Arc<FileStoreHandle>) -> HandleResult<()> {
        let mut state = self.state.write().expect("registry lock poisoned");
        if state.retired.contains(&id) {
            warn!(handle = %id.short_id(), "refusing to register a disposed file store handle");
            return Err(HandleError::IdentityRetired(id));
        }
        // Handles dropped without disposal leave dead entries behind.
        state.live.retain(|_, h| h.strong_count() > 0);
        if state.live.contains_key(&id) {
            return Err(HandleError::AlreadyRegistered(id));
        }
        state.live.insert(id, Arc::downgrade(handle));
        Ok(())
    }

    fn deregister(&self, id: HandleId) -> bool {
        let mut state = self.state.write().expect("registry lock poisoned");
        state.retired.insert(id);
        state.live.remove(&id).is_some()
    }

    fn resolve(&self, id: HandleId) -> Option<Arc<FileStoreHandle>> {
        self.state
            .read()
            .expect("registry lock poisoned")
            .live
            .get(&id)
            .and_then(Weak::upgrade)
    }

    fn handle_ids(&self) -> Vec<HandleId> {
        let state = self.state.read().expect("registry lock poisoned");
        let mut ids: Vec<HandleId> = state
            .live
            .iter()
            .filter(|(_, h)| h.strong_count() > 0)
            .map(|(id, _)| *id)
            .collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for InMemoryHandleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().expect("registry lock poisoned");
        f.debug_struct("InMemoryHandleRegistry")
            .field("live", &state.live.len())
            .field("retired", &state.retired.len())
            .finish()
    }
}
