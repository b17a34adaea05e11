// Validated Types
// Strongly-typed wrappers that enforce SAO identity invariants at construction.
// These types cannot be built from invalid data, so the store and runtime
// never have to re-check them.

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An object id that is guaranteed to be non-empty
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidatedObjectId {
    inner: String,
}

impl ValidatedObjectId {
    /// Create a new validated object id
    ///
    /// # Invariants
    /// - Non-empty after trimming
    /// - No interior newlines
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        ensure!(!id.trim().is_empty(), "Object id cannot be empty");
        ensure!(!id.contains('\n'), "Object id cannot contain newlines");
        Ok(Self { inner: id })
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for ValidatedObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// A provider-declared source name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ValidatedSourceName {
    inner: String,
}

impl ValidatedSourceName {
    /// Create a new validated source name
    ///
    /// # Invariants
    /// - Non-empty after trimming
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        ensure!(!source.trim().is_empty(), "Source name cannot be empty");
        Ok(Self { inner: source })
    }

    /// Get the source name as a string slice
    pub fn as_str(&self) -> &str {
        &self.inner
    }
}

impl fmt::Display for ValidatedSourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

/// The ordered, duplicate-free type list every SAO carries
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValidatedTypeList {
    inner: Vec<String>,
}

impl ValidatedTypeList {
    /// Create a new validated type list
    ///
    /// # Invariants
    /// - At least one type
    /// - Every type name non-empty
    /// - No duplicates; declaration order is preserved
    pub fn new(types: Vec<String>) -> Result<Self> {
        ensure!(!types.is_empty(), "Type list must contain at least one type");
        for (i, t) in types.iter().enumerate() {
            ensure!(!t.trim().is_empty(), "Type name at position {i} is empty");
            ensure!(!types[..i].contains(t), "Duplicate type '{t}' in type list");
        }
        Ok(Self { inner: types })
    }

    /// The primary type is the first declared one; used in rendered headers.
    pub fn primary(&self) -> &str {
        &self.inner[0]
    }

    pub fn as_slice(&self) -> &[String] {
        &self.inner
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.inner.iter().any(|t| t == type_name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }
}

impl fmt::Display for ValidatedTypeList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_rejects_empty() {
        assert!(ValidatedObjectId::new("").is_err());
        assert!(ValidatedObjectId::new("   ").is_err());
        assert!(ValidatedObjectId::new("a").is_ok());
    }

    #[test]
    fn test_type_list_invariants() {
        assert!(ValidatedTypeList::new(vec![]).is_err());
        assert!(ValidatedTypeList::new(vec!["person".into(), "person".into()]).is_err());
        assert!(ValidatedTypeList::new(vec!["person".into(), "".into()]).is_err());

        let types = ValidatedTypeList::new(vec!["person".into(), "employee".into()]).unwrap();
        assert_eq!(types.primary(), "person");
        assert!(types.contains("employee"));
        assert!(!types.contains("robot"));
    }
}
