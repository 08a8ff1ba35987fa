//! The file store handle: allocation, placement, ownership resolution and
//! lifecycle of externally stored objects.
//!
//! # Lifecycle
//!
//! ```text
//! Fresh --open--> Open --close--> Closed --dispose--> Disposed
//!   \______________________________________dispose____/
//! ```
//!
//! A handle restored from persisted state starts with a deferred source
//! directory instead of a base directory. The first creation or resolution
//! copies the source into a fresh base directory; the source is consumed
//! exactly once.
//!
//! # Locking
//!
//! Index allocation, base directory materialization, shard creation and the
//! dedup cache form one transaction guarded by a single per-handle mutex.
//! The registry is only queried, never called back into, while that mutex is
//! held.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use fstore_types::{sanitize_label, validate_object_name, HandleId, LoopContext, ObjectKey};

use crate::checker::DuplicateNameChecker;
use crate::config::HandleConfig;
use crate::dedup::CopyDedupCache;
use crate::error::{HandleError, HandleResult};
use crate::fsutil::{copy_tree, remove_tree};
use crate::shard::ShardingScheme;
use crate::traits::{FlushCallback, HandleRegistry};

/// Suffixed base directory names tried before giving up.
const MAX_DIR_ATTEMPTS: u32 = 1000;

/// Lifecycle state of a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Constructed, never opened.
    Fresh,
    /// Accepting new objects.
    Open,
    /// No new objects; existing objects still resolve.
    Closed,
    /// Terminal. Base directory removed, identity deregistered.
    Disposed,
}

/// Where a handle's objects live on disk.
#[derive(Debug)]
enum Storage {
    /// No directory assigned yet.
    Unassigned,
    /// Restored from persisted state; `source` is copied in on first use.
    Restoring { source: PathBuf },
    /// Objects live below `base_dir`.
    Materialized { base_dir: PathBuf },
}

#[derive(Debug)]
struct HandleState {
    lifecycle: Lifecycle,
    storage: Storage,
    next_index: u64,
    checker: Option<DuplicateNameChecker>,
    /// Created on the first cross-handle copy.
    dedup: Option<CopyDedupCache>,
}

impl HandleState {
    fn base_dir(&self) -> Option<&Path> {
        match &self.storage {
            Storage::Materialized { base_dir } => Some(base_dir),
            _ => None,
        }
    }
}

/// A live reference to a stored object: its key and where its bytes live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStore {
    key: ObjectKey,
    path: PathBuf,
}

impl FileStore {
    pub fn new(key: ObjectKey, path: PathBuf) -> Self {
        Self { key, path }
    }

    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    /// File (or directory) backing the object. May not exist until the
    /// object's writer creates it.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// What the surrounding system persists to restore a handle later.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedHandle {
    pub label: String,
    pub id: HandleId,
    /// Next index to hand out, so restored handles never reissue an index.
    #[serde(default)]
    pub next_index: u64,
}

/// Result of [`FileStoreHandle::dispose`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisposeOutcome {
    /// The handle never had a base directory.
    NoDirectory,
    /// The base directory was already gone, e.g. removed by an enclosing
    /// cleanup.
    AlreadyRemoved,
    /// The base directory was deleted.
    Removed,
    /// The base directory was not or only partially deleted.
    Incomplete { reason: String },
}

/// Owner of a base directory and allocator of object keys.
pub struct FileStoreHandle {
    label: String,
    id: HandleId,
    config: HandleConfig,
    scheme: ShardingScheme,
    registry: Arc<dyn HandleRegistry>,
    state: Mutex<HandleState>,
}

impl FileStoreHandle {
    /// Create a handle with a fresh identity and register it.
    pub fn create(
        label: impl Into<String>,
        registry: Arc<dyn HandleRegistry>,
        config: HandleConfig,
    ) -> HandleResult<Arc<Self>> {
        Self::with_id(label, HandleId::new(), registry, config)
    }

    /// Create a handle with a given identity and register it.
    pub fn with_id(
        label: impl Into<String>,
        id: HandleId,
        registry: Arc<dyn HandleRegistry>,
        config: HandleConfig,
    ) -> HandleResult<Arc<Self>> {
        Self::admit(label.into(), id, 0, Storage::Unassigned, registry, config)
    }

    /// Reconstruct a handle from persisted state.
    ///
    /// `source` is not touched until the handle first needs its base
    /// directory.
    pub fn restore(
        persisted: PersistedHandle,
        source: impl Into<PathBuf>,
        registry: Arc<dyn HandleRegistry>,
        config: HandleConfig,
    ) -> HandleResult<Arc<Self>> {
        let storage = Storage::Restoring {
            source: source.into(),
        };
        Self::admit(
            persisted.label,
            persisted.id,
            persisted.next_index,
            storage,
            registry,
            config,
        )
    }

    fn admit(
        label: String,
        id: HandleId,
        next_index: u64,
        storage: Storage,
        registry: Arc<dyn HandleRegistry>,
        config: HandleConfig,
    ) -> HandleResult<Arc<Self>> {
        config.validate()?;
        let scheme = config.sharding()?;
        let handle = Arc::new(Self {
            label,
            id,
            config,
            scheme,
            registry: Arc::clone(&registry),
            state: Mutex::new(HandleState {
                lifecycle: Lifecycle::Fresh,
                storage,
                next_index,
                checker: None,
                dedup: None,
            }),
        });
        registry.register(id, &handle)?;
        debug!(handle = %handle.id.short_id(), label = %handle.label, "file store handle registered");
        Ok(handle)
    }

    // ---- Accessors ----

    pub fn id(&self) -> HandleId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn config(&self) -> &HandleConfig {
        &self.config
    }

    pub fn scheme(&self) -> &ShardingScheme {
        &self.scheme
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lock().lifecycle
    }

    /// Whether new objects are accepted.
    pub fn is_open(&self) -> bool {
        self.lock().checker.is_some()
    }

    /// Whether a deferred source directory is still waiting to be copied in.
    pub fn is_restoring(&self) -> bool {
        matches!(self.lock().storage, Storage::Restoring { .. })
    }

    /// The materialized base directory, if any.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.lock().base_dir().map(Path::to_path_buf)
    }

    /// The index the next created object will receive.
    pub fn next_index(&self) -> u64 {
        self.lock().next_index
    }

    /// Number of foreign objects currently remembered as copied.
    pub fn copied_count(&self) -> usize {
        self.lock().dedup.as_ref().map_or(0, CopyDedupCache::len)
    }

    pub fn to_persisted(&self) -> PersistedHandle {
        PersistedHandle {
            label: self.label.clone(),
            id: self.id,
            next_index: self.next_index(),
        }
    }

    // ---- Lifecycle ----

    /// Start accepting new objects.
    ///
    /// Replaces any existing duplicate checker, so names used before are
    /// accepted again. Call once per logical session.
    pub fn open(&self) -> HandleResult<()> {
        let mut state = self.lock();
        if state.lifecycle == Lifecycle::Disposed {
            return Err(self.closed_error());
        }
        state.checker = Some(DuplicateNameChecker::new(self.id));
        state.lifecycle = Lifecycle::Open;
        Ok(())
    }

    /// Stop accepting new objects. Idempotent.
    pub fn close(&self) {
        let mut state = self.lock();
        state.checker = None;
        if state.lifecycle == Lifecycle::Open {
            state.lifecycle = Lifecycle::Closed;
        }
    }

    /// Adopt an existing directory as base directory.
    ///
    /// Only a handle without a base directory can adopt one. A pending
    /// restoration source is copied into the adopted directory.
    pub fn set_base_dir(&self, dir: impl Into<PathBuf>) -> HandleResult<()> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(HandleError::MissingDirectory {
                handle: self.id,
                path: dir,
            });
        }
        let mut state = self.lock();
        if state.lifecycle == Lifecycle::Disposed {
            return Err(self.closed_error());
        }
        match std::mem::replace(&mut state.storage, Storage::Unassigned) {
            Storage::Unassigned => {
                state.storage = Storage::Materialized { base_dir: dir };
                Ok(())
            }
            Storage::Materialized { base_dir } => {
                let err = HandleError::BaseDirAssigned {
                    handle: self.id,
                    path: base_dir.clone(),
                };
                state.storage = Storage::Materialized { base_dir };
                Err(err)
            }
            Storage::Restoring { source } => {
                // Consumed here even if the copy below fails.
                state.storage = Storage::Materialized {
                    base_dir: dir.clone(),
                };
                debug!(
                    handle = %self.id.short_id(),
                    source = %source.display(),
                    target = %dir.display(),
                    "restoring file store directory into adopted folder"
                );
                copy_tree(&source, &dir)?;
                Ok(())
            }
        }
    }

    /// Copy in the deferred source directory if it has not happened yet.
    pub fn ensure_restored(&self) -> HandleResult<()> {
        let mut state = self.lock();
        if state.lifecycle == Lifecycle::Disposed {
            return Err(self.closed_error());
        }
        if matches!(state.storage, Storage::Restoring { .. }) {
            self.materialize(&mut state)?;
        }
        Ok(())
    }

    /// Deregister and delete the base directory.
    ///
    /// Valid in every state. Deletion is best effort: a directory that is
    /// already gone is expected, any other failure is logged as a warning.
    pub fn dispose(&self) -> DisposeOutcome {
        let deregistered = self.registry.deregister(self.id);

        let mut state = self.lock();
        state.lifecycle = Lifecycle::Disposed;
        state.checker = None;
        state.dedup = None;
        let storage = std::mem::replace(&mut state.storage, Storage::Unassigned);
        drop(state);

        let outcome = match storage {
            Storage::Unassigned => DisposeOutcome::NoDirectory,
            Storage::Restoring { source } => {
                debug!(handle = %self, source = %source.display(), "disposing file store, never restored");
                DisposeOutcome::NoDirectory
            }
            Storage::Materialized { base_dir } => match remove_tree(&base_dir) {
                Ok(()) => {
                    debug!(handle = %self, path = %base_dir.display(), "disposing file store, folder successfully deleted");
                    DisposeOutcome::Removed
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    debug!(handle = %self, path = %base_dir.display(), "disposing file store, associated folder already deleted");
                    DisposeOutcome::AlreadyRemoved
                }
                Err(source) => {
                    let err = HandleError::DisposalIncomplete {
                        path: base_dir,
                        source,
                    };
                    warn!(handle = %self, error = %err, "disposing file store");
                    DisposeOutcome::Incomplete {
                        reason: err.to_string(),
                    }
                }
            },
        };
        debug!(handle = %self.id.short_id(), deregistered, ?outcome, "file store handle disposed");
        outcome
    }

    // ---- Creation ----

    /// Create a new object named `name`.
    ///
    /// Fails with `InvalidName`, `ClosedHandle`, `DuplicateName` or
    /// `CapacityExceeded`. On success the object's shard directory exists.
    pub fn create_object(&self, name: &str) -> HandleResult<ObjectKey> {
        validate_object_name(name)?;
        let mut state = self.lock();
        self.checker_mut(&mut state)?.ensure_unused(name)?;
        let key = self.allocate(&mut state, name, LoopContext::default())?;
        self.checker_mut(&mut state)?.add(name)?;
        Ok(key)
    }

    /// Create a new object from within a loop body.
    ///
    /// Unlike [`create_object`](Self::create_object) the name is not checked
    /// for duplicates: loop iterations reuse their logical names.
    pub fn create_object_in_loop(
        &self,
        name: &str,
        loop_context: LoopContext,
    ) -> HandleResult<ObjectKey> {
        validate_object_name(name)?;
        let mut state = self.lock();
        self.checker_mut(&mut state)?;
        self.allocate(&mut state, name, loop_context)
    }

    fn checker_mut<'a>(
        &self,
        state: &'a mut HandleState,
    ) -> HandleResult<&'a mut DuplicateNameChecker> {
        match state.checker.as_mut() {
            Some(checker) => Ok(checker),
            None => Err(self.closed_error()),
        }
    }

    /// Mint the next key and make sure its shard directory exists. The
    /// counter only advances once the key is handed out.
    fn allocate(
        &self,
        state: &mut HandleState,
        name: &str,
        loop_context: LoopContext,
    ) -> HandleResult<ObjectKey> {
        if state.lifecycle == Lifecycle::Disposed {
            return Err(self.closed_error());
        }
        let index = state.next_index;
        let key = ObjectKey::new(self.id, index, loop_context, name)?;
        self.scheme.check_capacity(index)?;
        let base_dir = self.materialize(state)?;
        self.scheme.locate(&base_dir, index, true)?;
        state.next_index += 1;
        Ok(key)
    }

    /// Return the base directory, creating or restoring it on first use.
    fn materialize(&self, state: &mut HandleState) -> HandleResult<PathBuf> {
        match std::mem::replace(&mut state.storage, Storage::Unassigned) {
            Storage::Materialized { base_dir } => {
                state.storage = Storage::Materialized {
                    base_dir: base_dir.clone(),
                };
                Ok(base_dir)
            }
            Storage::Unassigned => {
                let base_dir = self.assign_base_dir()?;
                state.storage = Storage::Materialized {
                    base_dir: base_dir.clone(),
                };
                debug!(
                    handle = %self.id.short_id(),
                    label = %self.label,
                    path = %base_dir.display(),
                    "assigning temp directory to file store"
                );
                Ok(base_dir)
            }
            Storage::Restoring { source } => {
                let base_dir = match self.assign_base_dir() {
                    Ok(dir) => dir,
                    Err(e) => {
                        state.storage = Storage::Restoring { source };
                        return Err(e);
                    }
                };
                // The source is consumed here even if the copy below fails.
                state.storage = Storage::Materialized {
                    base_dir: base_dir.clone(),
                };
                debug!(
                    handle = %self.id.short_id(),
                    source = %source.display(),
                    target = %base_dir.display(),
                    "restoring file store directory"
                );
                copy_tree(&source, &base_dir)?;
                Ok(base_dir)
            }
        }
    }

    /// Create `fs-<sanitized label>-<short id>` below the temp root.
    fn assign_base_dir(&self) -> HandleResult<PathBuf> {
        let root = self.config.resolved_temp_root();
        std::fs::create_dir_all(&root)?;
        let stem = format!(
            "fs-{}-{}",
            sanitize_label(&self.label, self.config.max_label_len),
            self.id.short_hex()
        );
        for attempt in 0..MAX_DIR_ATTEMPTS {
            let candidate = match attempt {
                0 => root.join(&stem),
                n => root.join(format!("{stem}-{n}")),
            };
            match std::fs::create_dir(&candidate) {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free base directory name for {stem} in {}", root.display()),
        )
        .into())
    }

    // ---- Placement ----

    /// Shard directory of `index`.
    ///
    /// With `create` set the base directory and the shard directories are
    /// created as needed; otherwise this is a pure lookup that requires a
    /// base directory. Fails with `ClosedHandle` once disposed.
    pub fn shard_dir(&self, index: u64, create: bool) -> HandleResult<PathBuf> {
        let mut state = self.lock();
        if state.lifecycle == Lifecycle::Disposed {
            return Err(self.closed_error());
        }
        let base_dir = if create {
            self.materialize(&mut state)?
        } else {
            state
                .base_dir()
                .map(Path::to_path_buf)
                .ok_or(HandleError::NoDirectory { handle: self.id })?
        };
        self.scheme.locate(&base_dir, index, create)
    }

    /// Path of an object owned by this handle. Triggers pending restoration.
    pub fn object_path(&self, key: &ObjectKey) -> HandleResult<PathBuf> {
        if key.owner() != self.id {
            return Err(HandleError::NotOwner {
                handle: self.id,
                key: key.clone(),
            });
        }
        let mut state = self.lock();
        if matches!(state.storage, Storage::Restoring { .. }) {
            self.materialize(&mut state)?;
        }
        let base_dir = state
            .base_dir()
            .ok_or(HandleError::NoDirectory { handle: self.id })?;
        Ok(self
            .scheme
            .locate(base_dir, key.index(), false)?
            .join(key.name()))
    }

    // ---- Ownership resolution ----

    /// The handle owning `key`: this handle, a handle known to the registry,
    /// or `None` if the owner is out of reach.
    pub fn resolve_owner(self: &Arc<Self>, key: &ObjectKey) -> Option<Arc<FileStoreHandle>> {
        if key.owner() == self.id {
            Some(Arc::clone(self))
        } else {
            self.registry.resolve(key.owner())
        }
    }

    /// Live reference to the object behind `key`, wherever it is owned.
    pub fn file_store(self: &Arc<Self>, key: &ObjectKey) -> HandleResult<FileStore> {
        let owner = self
            .resolve_owner(key)
            .ok_or_else(|| HandleError::UnresolvableOwner {
                owner: key.owner(),
                key: key.clone(),
            })?;
        let path = owner.object_path(key)?;
        Ok(FileStore::new(key.clone(), path))
    }

    /// `true` if persisting a reference to `key` now would leave it dangling
    /// unless a local copy is taken first.
    pub fn must_copy_before_persist(&self, key: &ObjectKey) -> bool {
        key.owner() != self.id && !self.registry.contains(key.owner())
    }

    /// Key to persist for `store`: its own key if the owner is reachable,
    /// otherwise the key of a local copy.
    pub fn translate_to_local(
        &self,
        store: &FileStore,
        flush: &dyn FlushCallback,
    ) -> HandleResult<ObjectKey> {
        if self.must_copy_before_persist(store.key()) {
            self.materialize_local_copy(store, flush)
        } else {
            Ok(store.key().clone())
        }
    }

    /// Copy a foreign object into this handle.
    ///
    /// A foreign object is copied at most once per handle while its mapping
    /// stays cached; later calls return the cached local key without touching
    /// the filesystem. The copy does not require the handle to be open.
    pub fn materialize_local_copy(
        &self,
        store: &FileStore,
        flush: &dyn FlushCallback,
    ) -> HandleResult<ObjectKey> {
        let foreign = store.key();
        let mut state = self.lock();
        if state.lifecycle == Lifecycle::Disposed {
            return Err(self.closed_error());
        }

        let capacity = self.config.dedup_capacity;
        let cache = state.dedup.get_or_insert_with(|| {
            debug!(
                handle = %self.id.short_id(),
                foreign = %foreign.owner().short_id(),
                "duplicating file store objects, owning handle is unknown to the registry"
            );
            debug!(live = ?self.registry.handle_ids(), "valid file store handles");
            CopyDedupCache::new(capacity)
        });
        if let Some(local) = cache.get(foreign) {
            return Ok(local);
        }

        let copy_failed = |source: io::Error| HandleError::CopyFailed {
            key: foreign.clone(),
            source,
        };
        flush.flush().map_err(copy_failed)?;

        let name = format!("{}_{}", state.next_index, foreign.name());
        let local = self.allocate(&mut state, &name, LoopContext::default())?;
        let base_dir = state
            .base_dir()
            .ok_or(HandleError::NoDirectory { handle: self.id })?;
        let target = self
            .scheme
            .locate(base_dir, local.index(), false)?
            .join(local.name());
        copy_tree(store.path(), &target).map_err(copy_failed)?;

        if let Some(cache) = state.dedup.as_mut() {
            cache.insert(foreign.clone(), local.clone());
        }
        debug!(foreign = %foreign, local = %local, "copied foreign file store");
        Ok(local)
    }

    // ---- Helpers ----

    fn lock(&self) -> MutexGuard<'_, HandleState> {
        self.state.lock().expect("file store handle lock poisoned")
    }

    fn closed_error(&self) -> HandleError {
        HandleError::ClosedHandle {
            handle: self.id,
            label: self.label.clone(),
        }
    }
}

impl fmt::Display for FileStoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}: ", self.id, self.label)?;
        match self.lock().base_dir() {
            Some(dir) => write!(f, "{}", dir.display())?,
            None => write!(f, "<no directory>")?,
        }
        write!(f, ")")
    }
}

impl fmt::Debug for FileStoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStoreHandle")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}
