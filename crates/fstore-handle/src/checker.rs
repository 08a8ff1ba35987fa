use std::collections::HashSet;

use fstore_types::HandleId;

use crate::error::{HandleError, HandleResult};

/// Tracks the object names handed out by one open handle.
///
/// The presence of a checker is what makes a handle open for writes; closing
/// the handle drops it together with every name it recorded.
#[derive(Debug)]
pub struct DuplicateNameChecker {
    handle: HandleId,
    names: HashSet<String>,
}

impl DuplicateNameChecker {
    /// Create an empty checker for `handle`.
    pub fn new(handle: HandleId) -> Self {
        Self {
            handle,
            names: HashSet::new(),
        }
    }

    /// Record `name`, failing if it is already recorded.
    pub fn add(&mut self, name: &str) -> HandleResult<()> {
        self.ensure_unused(name)?;
        self.names.insert(name.to_string());
        Ok(())
    }

    /// Fail with [`HandleError::DuplicateName`] if `name` is recorded, without
    /// recording it.
    pub fn ensure_unused(&self, name: &str) -> HandleResult<()> {
        if self.names.contains(name) {
            return Err(HandleError::DuplicateName {
                handle: self.handle,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Forget `name`. Returns `true` if it was recorded.
    pub fn remove(&mut self, name: &str) -> bool {
        self.names.remove(name)
    }

    /// Whether `name` is recorded.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    /// Number of recorded names.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_add_of_same_name_fails() {
        let mut checker = DuplicateNameChecker::new(HandleId::new());
        checker.add("a").unwrap();
        let err = checker.add("a").unwrap_err();
        assert!(matches!(err, HandleError::DuplicateName { ref name, .. } if name == "a"));
        assert_eq!(checker.len(), 1);
    }

    #[test]
    fn distinct_names_coexist() {
        let mut checker = DuplicateNameChecker::new(HandleId::new());
        checker.add("a").unwrap();
        checker.add("b").unwrap();
        assert_eq!(checker.len(), 2);
        assert!(checker.contains("a"));
        assert!(checker.contains("b"));
    }

    #[test]
    fn removed_name_can_be_added_again() {
        let mut checker = DuplicateNameChecker::new(HandleId::new());
        checker.add("a").unwrap();
        assert!(checker.remove("a"));
        assert!(!checker.remove("a"));
        assert!(checker.is_empty());
        checker.add("a").unwrap();
    }

    #[test]
    fn ensure_unused_does_not_record() {
        let mut checker = DuplicateNameChecker::new(HandleId::new());
        checker.ensure_unused("a").unwrap();
        assert!(checker.is_empty());
        checker.add("a").unwrap();
        assert!(checker.ensure_unused("a").is_err());
    }
}
