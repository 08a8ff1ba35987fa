use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::identity::HandleId;
use crate::names::validate_object_name;

/// Iteration coordinates of an object created inside a (possibly nested)
/// loop body.
///
/// The empty context (no path, no iteration) marks an object created outside
/// of any loop.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LoopContext {
    /// Ordered loop nesting coordinates, outermost first. May be empty.
    pub nested_loop_path: Vec<u32>,
    /// Iteration of the innermost loop, `None` when not iterated.
    pub iteration_index: Option<u32>,
}

impl LoopContext {
    /// Create a loop context from the enclosing loop path and iteration.
    pub fn new(nested_loop_path: Vec<u32>, iteration_index: Option<u32>) -> Self {
        Self {
            nested_loop_path,
            iteration_index,
        }
    }

    /// Returns `true` if no loop coordinates are set.
    pub fn is_empty(&self) -> bool {
        self.nested_loop_path.is_empty() && self.iteration_index.is_none()
    }
}

/// Immutable identity of an externally stored object.
///
/// Two keys are equal iff every field is equal. Equality, not the identity of
/// any in-memory reference, decides whether two cells refer to the same
/// object, including after the key went through serialization.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "KeyRecord")]
pub struct ObjectKey {
    owner: HandleId,
    index: u64,
    loop_context: LoopContext,
    name: String,
}

/// Unvalidated wire form of an [`ObjectKey`].
#[derive(Deserialize)]
struct KeyRecord {
    owner: HandleId,
    index: u64,
    #[serde(default)]
    loop_context: LoopContext,
    name: String,
}

impl TryFrom<KeyRecord> for ObjectKey {
    type Error = TypeError;

    fn try_from(record: KeyRecord) -> Result<Self, Self::Error> {
        ObjectKey::new(record.owner, record.index, record.loop_context, record.name)
    }
}

impl ObjectKey {
    /// Build a key, validating `name` with [`validate_object_name`].
    pub fn new(
        owner: HandleId,
        index: u64,
        loop_context: LoopContext,
        name: impl Into<String>,
    ) -> Result<Self, TypeError> {
        let name = name.into();
        validate_object_name(&name)?;
        Ok(Self {
            owner,
            index,
            loop_context,
            name,
        })
    }

    /// Identity of the handle that minted this key.
    pub fn owner(&self) -> HandleId {
        self.owner
    }

    /// Sequential index assigned by the owning handle.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Loop coordinates stamped in at creation.
    pub fn loop_context(&self) -> &LoopContext {
        &self.loop_context
    }

    /// Human-readable object name; also the file name on disk.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectKey({self})")
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner.short_id(), self.index, self.name)?;
        if !self.loop_context.is_empty() {
            write!(f, " loop={:?}", self.loop_context.nested_loop_path)?;
            if let Some(iteration) = self.loop_context.iteration_index {
                write!(f, "#{iteration}")?;
            }
        }
        Ok(())
    }
}
