// Builder Patterns
// Fluent construction for SAOs, used by tests, benches, and embedders that
// seed stores programmatically instead of over HTTP.

use anyhow::{anyhow, Result};
use indexmap::IndexMap;

use crate::types::{ValidatedObjectId, ValidatedSourceName, ValidatedTypeList};
use crate::value::{Sao, Value};

/// Fluent builder for creating SAOs.
///
/// Validation happens in `build()`, so call sites can chain freely:
///
/// ```
/// use saodb::SaoBuilder;
///
/// let sao = SaoBuilder::new()
///     .id("a")
///     .source("hr")
///     .object_type("person")
///     .object_type("employee")
///     .field("name", "Alice")
///     .field("salary", 100i64)
///     .build()
///     .unwrap();
/// assert_eq!(sao.handle(), "person#a@hr");
/// ```
#[derive(Debug, Default)]
pub struct SaoBuilder {
    id: Option<String>,
    source: Option<String>,
    types: Vec<String>,
    fields: IndexMap<String, Value>,
}

impl SaoBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the object id
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the source name
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Append one type to the type list (declaration order is preserved)
    pub fn object_type(mut self, type_name: impl Into<String>) -> Self {
        self.types.push(type_name.into());
        self
    }

    /// Set a user field
    pub fn field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    /// Set a user field from raw JSON (handy for link maps and nested data)
    pub fn field_json(mut self, name: impl Into<String>, json: &serde_json::Value) -> Self {
        self.fields.insert(name.into(), Value::from_json(json));
        self
    }

    /// Build the SAO
    pub fn build(self) -> Result<Sao> {
        let id = self.id.ok_or_else(|| anyhow!("SAO id is required"))?;
        let source = self
            .source
            .ok_or_else(|| anyhow!("SAO source is required"))?;
        Ok(Sao::new(
            ValidatedObjectId::new(id)?,
            ValidatedSourceName::new(source)?,
            ValidatedTypeList::new(self.types)?,
            self.fields,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_identity() {
        assert!(SaoBuilder::new().build().is_err());
        assert!(SaoBuilder::new().id("a").build().is_err());
        assert!(SaoBuilder::new().id("a").source("hr").build().is_err());
        assert!(SaoBuilder::new()
            .id("a")
            .source("hr")
            .object_type("person")
            .build()
            .is_ok());
    }

    #[test]
    fn test_builder_preserves_field_order() {
        let sao = SaoBuilder::new()
            .id("a")
            .source("hr")
            .object_type("person")
            .field("z", 1i64)
            .field("a", 2i64)
            .build()
            .unwrap();
        let keys: Vec<&String> = sao.fields().keys().collect();
        assert_eq!(keys, ["z", "a"]);
    }
}
