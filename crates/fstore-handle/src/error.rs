use std::path::PathBuf;

use fstore_types::{HandleId, ObjectKey, TypeError};

/// Errors from file store handle operations.
///
/// `InvalidName`, `DuplicateName` and `ClosedHandle` are caller errors and
/// leave the handle untouched. `CapacityExceeded`, `UnresolvableOwner` and
/// `CopyFailed` are fatal to the operation that raised them, but the
/// allocation counter and the dedup cache stay consistent for later calls.
#[derive(Debug, thiserror::Error)]
pub enum HandleError {
    /// The object name failed validation.
    #[error(transparent)]
    InvalidName(#[from] TypeError),

    /// The name was already used by an object of this open handle.
    #[error("duplicate object name {name:?} in file store {handle}")]
    DuplicateName { handle: HandleId, name: String },

    /// The handle is closed (or disposed) and accepts no new objects.
    #[error("file store {handle} ({label}) is read only/closed")]
    ClosedHandle { handle: HandleId, label: String },

    /// The next index is beyond what the sharding scheme can place.
    #[error("maximum number of file stores reached: {max_index} (requested index {index})")]
    CapacityExceeded { index: u64, max_index: u64 },

    /// No handle in reach owns the key.
    #[error("owner {owner} of file store key {key} cannot be resolved")]
    UnresolvableOwner { owner: HandleId, key: ObjectKey },

    /// Copying a foreign object into this handle failed.
    #[error("failed copying file store {key} to local handler: {source}")]
    CopyFailed {
        key: ObjectKey,
        #[source]
        source: std::io::Error,
    },

    /// The base directory could not be removed completely on disposal.
    ///
    /// Never returned from `dispose`; it is logged as a warning and reported
    /// through `DisposeOutcome::Incomplete`.
    #[error("file store directory {path:?} not or only partially deleted: {source}")]
    DisposalIncomplete {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The handle has never been assigned a base directory.
    #[error("no file stores in {handle}")]
    NoDirectory { handle: HandleId },

    /// A key was handed to a handle that does not own it.
    #[error("file store key {key} is not owned by {handle}")]
    NotOwner { handle: HandleId, key: ObjectKey },

    /// A path handed in as base directory is not a directory.
    #[error("base directory of file store {handle} does not exist: {path:?}")]
    MissingDirectory { handle: HandleId, path: PathBuf },

    /// The handle already owns a base directory and cannot adopt another.
    #[error("file store {handle} already has base directory {path:?}")]
    BaseDirAssigned { handle: HandleId, path: PathBuf },

    /// The identity is already registered with a live handle.
    #[error("file store handle {0} is already registered")]
    AlreadyRegistered(HandleId),

    /// The identity was deregistered before and may never resolve again.
    #[error("file store handle {0} was disposed and cannot be registered again")]
    IdentityRetired(HandleId),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error while creating or inspecting directories.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for handle operations.
pub type HandleResult<T> = Result<T, HandleError>;
