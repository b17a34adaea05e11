//! Provider wire types
//!
//! The full HTTP surface a provider exposes: `GET /hello` returns a
//! [`HelloResponse`]; `GET /all_data` returns a JSON array of SAO maps.
//! Status is the only error signal; non-2xx bodies are ignored.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use crate::value::Sao;

/// How a provider serves its objects. Only `ALL_AT_ONCE` is fetched; an
/// `ON_DEMAND` provider is recorded as unsupported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderMode {
    #[serde(rename = "ALL_AT_ONCE")]
    AllAtOnce,
    #[serde(rename = "ON_DEMAND")]
    OnDemand,
}

/// `GET /hello` handshake payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HelloResponse {
    pub name: String,
    pub mode: ProviderMode,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub version: String,
}

/// Parse and validate a `/all_data` payload. Every element must carry the
/// reserved `__id__`, `__source__`, and `__types__` keys.
pub fn parse_sao_payload(body: &str) -> Result<Vec<Sao>> {
    let json: serde_json::Value =
        serde_json::from_str(body).context("payload is not valid JSON")?;
    let items = json
        .as_array()
        .ok_or_else(|| anyhow!("payload must be a JSON array of objects"))?;
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            Sao::from_json(item).with_context(|| format!("invalid SAO at index {i}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_mode_wire_names() {
        let hello: HelloResponse = serde_json::from_str(
            r#"{"name":"hr","mode":"ALL_AT_ONCE","description":"people","version":"1.0"}"#,
        )
        .unwrap();
        assert_eq!(hello.mode, ProviderMode::AllAtOnce);

        let hello: HelloResponse =
            serde_json::from_str(r#"{"name":"hr","mode":"ON_DEMAND"}"#).unwrap();
        assert_eq!(hello.mode, ProviderMode::OnDemand);
        assert!(hello.description.is_empty());

        assert!(serde_json::from_str::<HelloResponse>(r#"{"name":"hr","mode":"sometimes"}"#)
            .is_err());
    }

    #[test]
    fn test_payload_validation() {
        let objects = parse_sao_payload(
            r#"[{"__id__":"a","__source__":"hr","__types__":["person"],"name":"Alice"}]"#,
        )
        .unwrap();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].id(), "a");

        assert!(parse_sao_payload("not json").is_err());
        assert!(parse_sao_payload(r#"{"an":"object"}"#).is_err());
        assert!(parse_sao_payload(r#"[{"__id__":"a"}]"#).is_err());
    }
}
