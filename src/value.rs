// Value Model
// The closed tagged sum every query evaluates over: primitives, lists, maps,
// semantic objects (SAOs), object lists, object groupings, unevaluated
// chains, and the AbsorbingNone sentinel.
//
// SAOs are immutable once constructed and shared via Arc; the store swaps
// whole provider contributions rather than mutating objects in place.

use std::fmt;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use indexmap::IndexMap;

use crate::chain::Chain;
use crate::types::{ValidatedObjectId, ValidatedSourceName, ValidatedTypeList};

/// Reserved attribute names on the wire and in the query language.
pub const FIELD_ID: &str = "__id__";
pub const FIELD_SOURCE: &str = "__source__";
pub const FIELD_TYPES: &str = "__types__";

/// Marker key identifying a link map.
pub const LINK_MARKER_KEY: &str = "__sa_type__";
pub const LINK_MARKER_VALUE: &str = "link";

/// Every value the runtime can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
    /// Ordered sequence of values.
    List(Vec<Value>),
    /// Insertion-ordered string-keyed map.
    Map(IndexMap<String, Value>),
    /// A single semantic object.
    Object(Arc<Sao>),
    /// An ordered collection of semantic objects.
    Objects(Vec<Arc<Sao>>),
    /// Grouping key -> object list, produced by grouping operators.
    Grouping(ObjectGrouping),
    /// An unevaluated query fragment.
    Chain(Chain),
    /// Pass-through sentinel for "missing". Transparent to scalar operators,
    /// skipped by iterating ones.
    AbsorbingNone,
}

impl Value {
    /// Kind name used in type-error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Str(_) => "string",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Null => "null",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::Objects(_) => "object list",
            Value::Grouping(_) => "object grouping",
            Value::Chain(_) => "chain",
            Value::AbsorbingNone => "absorbing none",
        }
    }

    pub fn is_absorbing(&self) -> bool {
        matches!(self, Value::AbsorbingNone)
    }

    /// Interpret this value as a link, if it carries the link marker.
    pub fn as_link(&self) -> Option<LinkRef<'_>> {
        let Value::Map(map) = self else { return None };
        match map.get(LINK_MARKER_KEY) {
            Some(Value::Str(marker)) if marker == LINK_MARKER_VALUE => {}
            _ => return None,
        }
        let query = match map.get("query") {
            Some(Value::Str(q)) => q.as_str(),
            _ => return None,
        };
        let label = match map.get("label") {
            Some(Value::Str(l)) => Some(l.as_str()),
            _ => None,
        };
        Some(LinkRef { query, label })
    }

    /// Convert arbitrary JSON into a value. Numbers become `Int` when they
    /// fit in i64, `Float` otherwise.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => Value::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Render the value back to JSON for inline display. Objects collapse to
    /// their `type#id@source` handle; AbsorbingNone becomes null.
    pub fn to_display_json(&self) -> serde_json::Value {
        match self {
            Value::Str(s) => serde_json::Value::String(s.clone()),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(x) => {
                serde_json::Number::from_f64(*x).map_or(serde_json::Value::Null, Into::into)
            }
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Null | Value::AbsorbingNone => serde_json::Value::Null,
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_display_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), v.to_display_json()))
                    .collect(),
            ),
            Value::Object(sao) => serde_json::Value::String(sao.handle()),
            Value::Objects(list) => {
                serde_json::Value::Array(list.iter().map(|s| s.handle().into()).collect())
            }
            Value::Grouping(grouping) => serde_json::Value::Object(
                grouping
                    .iter()
                    .map(|(key, members)| {
                        (
                            key.to_string(),
                            serde_json::Value::Array(
                                members.iter().map(|s| s.handle().into()).collect(),
                            ),
                        )
                    })
                    .collect(),
            ),
            Value::Chain(chain) => serde_json::Value::String(chain.to_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Borrowed view of a link field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkRef<'a> {
    pub query: &'a str,
    pub label: Option<&'a str>,
}

/// A semantic aggregate object: reserved identity attributes plus arbitrary
/// user fields. Immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Sao {
    id: ValidatedObjectId,
    source: ValidatedSourceName,
    types: ValidatedTypeList,
    fields: IndexMap<String, Value>,
}

impl Sao {
    pub fn new(
        id: ValidatedObjectId,
        source: ValidatedSourceName,
        types: ValidatedTypeList,
        fields: IndexMap<String, Value>,
    ) -> Self {
        Self {
            id,
            source,
            types,
            fields,
        }
    }

    /// Parse one SAO from its wire JSON form, validating the reserved keys.
    pub fn from_json(json: &serde_json::Value) -> Result<Self> {
        let map = json
            .as_object()
            .ok_or_else(|| anyhow!("SAO must be a JSON object"))?;

        let id = match map.get(FIELD_ID) {
            Some(serde_json::Value::String(s)) => ValidatedObjectId::new(s.as_str())?,
            Some(other) => bail!("{FIELD_ID} must be a string, got {other}"),
            None => bail!("missing reserved key {FIELD_ID}"),
        };
        let source = match map.get(FIELD_SOURCE) {
            Some(serde_json::Value::String(s)) => ValidatedSourceName::new(s.as_str())?,
            Some(other) => bail!("{FIELD_SOURCE} must be a string, got {other}"),
            None => bail!("missing reserved key {FIELD_SOURCE}"),
        };
        let types = match map.get(FIELD_TYPES) {
            Some(serde_json::Value::Array(items)) => {
                let names = items
                    .iter()
                    .map(|item| {
                        item.as_str()
                            .map(str::to_string)
                            .ok_or_else(|| anyhow!("{FIELD_TYPES} entries must be strings"))
                    })
                    .collect::<Result<Vec<_>>>()?;
                ValidatedTypeList::new(names).context("invalid type list")?
            }
            Some(other) => bail!("{FIELD_TYPES} must be an array, got {other}"),
            None => bail!("missing reserved key {FIELD_TYPES}"),
        };

        let fields = map
            .iter()
            .filter(|(k, _)| ![FIELD_ID, FIELD_SOURCE, FIELD_TYPES].contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), Value::from_json(v)))
            .collect();

        Ok(Self {
            id,
            source,
            types,
            fields,
        })
    }

    /// A shallow copy with the same identity but a different field set.
    /// Used by projection.
    pub fn with_fields(&self, fields: IndexMap<String, Value>) -> Self {
        Self {
            id: self.id.clone(),
            source: self.source.clone(),
            types: self.types.clone(),
            fields,
        }
    }

    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    pub fn source(&self) -> &str {
        self.source.as_str()
    }

    pub fn types(&self) -> &ValidatedTypeList {
        &self.types
    }

    pub fn primary_type(&self) -> &str {
        self.types.primary()
    }

    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Reserved attributes surfaced as values for `get_field`.
    pub fn reserved_field(&self, name: &str) -> Option<Value> {
        match name {
            FIELD_ID => Some(Value::Str(self.id.as_str().to_string())),
            FIELD_SOURCE => Some(Value::Str(self.source.as_str().to_string())),
            FIELD_TYPES => Some(Value::List(
                self.types
                    .iter()
                    .map(|t| Value::Str(t.clone()))
                    .collect(),
            )),
            _ => None,
        }
    }

    /// Compact `type#id@source` handle used by list rendering and display
    /// JSON.
    pub fn handle(&self) -> String {
        format!("{}#{}@{}", self.primary_type(), self.id(), self.source())
    }

    /// All fully qualified `(type, id, source)` keys this object occupies.
    pub fn qualified_keys(&self) -> impl Iterator<Item = (String, String, String)> + '_ {
        self.types.iter().map(move |t| {
            (
                t.clone(),
                self.id().to_string(),
                self.source().to_string(),
            )
        })
    }
}

/// One primitive component of a grouping key. Floats are keyed by bit
/// pattern so the key stays hashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Str(String),
    Int(i64),
    Float(u64),
    Bool(bool),
    Null,
}

impl KeyPart {
    fn from_scalar(value: &Value) -> Option<KeyPart> {
        match value {
            Value::Str(s) => Some(KeyPart::Str(s.clone())),
            Value::Int(n) => Some(KeyPart::Int(*n)),
            Value::Float(x) => Some(KeyPart::Float(x.to_bits())),
            Value::Bool(b) => Some(KeyPart::Bool(*b)),
            Value::Null => Some(KeyPart::Null),
            _ => None,
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Str(s) => write!(f, "{s}"),
            KeyPart::Int(n) => write!(f, "{n}"),
            KeyPart::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            KeyPart::Bool(b) => write!(f, "{b}"),
            KeyPart::Null => write!(f, "null"),
        }
    }
}

/// A grouping key: a tuple of primitives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupKey(pub Vec<KeyPart>);

impl GroupKey {
    /// Build a key from a key-expression result: a single primitive, or a
    /// list of primitives. Anything else is not a valid key.
    pub fn try_from_value(value: &Value) -> Option<GroupKey> {
        match value {
            Value::List(items) => items
                .iter()
                .map(KeyPart::from_scalar)
                .collect::<Option<Vec<_>>>()
                .map(GroupKey),
            scalar => KeyPart::from_scalar(scalar).map(|p| GroupKey(vec![p])),
        }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, part) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{part}")?;
        }
        write!(f, "]")
    }
}

/// Mapping from grouping key to object list, insertion-ordered by first
/// occurrence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectGrouping {
    groups: IndexMap<GroupKey, Vec<Arc<Sao>>>,
}

impl ObjectGrouping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: GroupKey, object: Arc<Sao>) {
        self.groups.entry(key).or_default().push(object);
    }

    pub fn insert_group(&mut self, key: GroupKey, members: Vec<Arc<Sao>>) {
        self.groups.insert(key, members);
    }

    pub fn get(&self, key: &GroupKey) -> Option<&[Arc<Sao>]> {
        self.groups.get(key).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&GroupKey, &Vec<Arc<Sao>>)> {
        self.groups.iter()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sao_from_json_happy_path() {
        let sao = Sao::from_json(&json!({
            "__id__": "a",
            "__source__": "hr",
            "__types__": ["person", "employee"],
            "name": "Alice",
            "salary": 100,
        }))
        .unwrap();

        assert_eq!(sao.id(), "a");
        assert_eq!(sao.source(), "hr");
        assert_eq!(sao.primary_type(), "person");
        assert_eq!(sao.field("name"), Some(&Value::Str("Alice".into())));
        assert_eq!(sao.field("salary"), Some(&Value::Int(100)));
        assert_eq!(sao.handle(), "person#a@hr");
    }

    #[test]
    fn test_sao_from_json_rejects_bad_reserved_keys() {
        assert!(Sao::from_json(&json!({"__source__": "hr", "__types__": ["t"]})).is_err());
        assert!(Sao::from_json(&json!({"__id__": "", "__source__": "hr", "__types__": ["t"]}))
            .is_err());
        assert!(
            Sao::from_json(&json!({"__id__": "a", "__source__": "hr", "__types__": []})).is_err()
        );
        assert!(Sao::from_json(
            &json!({"__id__": "a", "__source__": "hr", "__types__": ["t", "t"]})
        )
        .is_err());
        assert!(Sao::from_json(&json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn test_link_detection() {
        let link = Value::from_json(&json!({
            "__sa_type__": "link",
            "query": "person#a",
            "label": "owner",
        }));
        let found = link.as_link().unwrap();
        assert_eq!(found.query, "person#a");
        assert_eq!(found.label, Some("owner"));

        let not_link = Value::from_json(&json!({"query": "person#a"}));
        assert!(not_link.as_link().is_none());
    }

    #[test]
    fn test_json_number_widths() {
        assert_eq!(Value::from_json(&json!(7)), Value::Int(7));
        assert_eq!(Value::from_json(&json!(1.5)), Value::Float(1.5));
        // Strict equality between widths: these are different values.
        assert_ne!(Value::Int(1), Value::Float(1.0));
    }

    #[test]
    fn test_group_key_from_value() {
        assert_eq!(
            GroupKey::try_from_value(&Value::Str("eu".into())),
            Some(GroupKey(vec![KeyPart::Str("eu".into())]))
        );
        assert_eq!(
            GroupKey::try_from_value(&Value::List(vec![
                Value::Str("eu".into()),
                Value::Int(3)
            ])),
            Some(GroupKey(vec![KeyPart::Str("eu".into()), KeyPart::Int(3)]))
        );
        assert_eq!(GroupKey::try_from_value(&Value::List(vec![Value::List(vec![])])), None);
    }
}
