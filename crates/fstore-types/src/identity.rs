use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Identity of a file store handle.
///
/// Assigned once when a handle is constructed and carried by every
/// [`ObjectKey`](crate::ObjectKey) the handle mints. Ids are random UUIDs and
/// are assumed to be globally unique, so an id that has been retired is never
/// expected to reappear.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(uuid::Uuid);

impl HandleId {
    /// Generate a fresh random id (UUID v4).
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// First 8 hex characters of the UUID.
    pub fn short_hex(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    /// Short identifier used in log lines.
    pub fn short_id(&self) -> String {
        format!("fs:{}", self.short_hex())
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for HandleId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidHandleId(e.to_string()))
    }
}

impl fmt::Debug for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandleId({})", self.short_id())
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
