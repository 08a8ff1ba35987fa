//! Foundation types for the file store subsystem.
//!
//! This crate provides the identity and naming types shared by everything
//! that stores, references, or serializes externally stored objects. The
//! orchestration itself lives in `fstore-handle`.
//!
//! # Key Types
//!
//! - [`HandleId`] -- Random 128-bit identity of the handle that owns an object
//! - [`ObjectKey`] -- Immutable identity of one stored object
//! - [`LoopContext`] -- Nested-loop coordinates stamped into loop-created keys
//!
//! # Name Rules
//!
//! - [`validate_object_name`] -- rules every object name must satisfy
//! - [`sanitize_label`] -- lossy mapping from a handle label to a directory name

pub mod error;
pub mod identity;
pub mod key;
pub mod names;

pub use error::TypeError;
pub use identity::HandleId;
pub use key::{LoopContext, ObjectKey};
pub use names::{sanitize_label, validate_object_name};
