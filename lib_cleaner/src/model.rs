//! # Node Model
//!
//! A node descriptor is an opaque YAML mapping as published by a
//! subscription source. Only `server`, `port`, `type` and `name` are ever
//! read; everything else is carried through to the engine and the exported
//! subscription untouched.

use serde::{Deserialize, Serialize};
use serde_yml::{Mapping, Value};

/// Fallback protocol label for entries without a `type` field.
pub const UNKNOWN_PROTOCOL: &str = "UNKNOWN";

/// A single proxy endpoint's connection parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeDescriptor(Mapping);

impl NodeDescriptor {
    /// Wraps a YAML value, returning `None` for anything that is not a mapping.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Mapping(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn as_mapping(&self) -> &Mapping {
        &self.0
    }

    /// Server host, rendered as text. Empty when absent.
    pub fn server(&self) -> String {
        self.field_text("server")
    }

    /// Port, rendered as text so `443` and `"443"` compare equal. Empty when absent.
    pub fn port(&self) -> String {
        self.field_text("port")
    }

    /// Deduplication identity: `server:port`.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.server(), self.port())
    }

    /// Upper-cased protocol type, e.g. `SS`, `VMESS`.
    pub fn protocol(&self) -> String {
        match self.0.get("type") {
            Some(v) if !scalar_text(v).is_empty() => scalar_text(v).to_uppercase(),
            _ => UNKNOWN_PROTOCOL.to_string(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// Overwrites the display name. Identity fields are never touched.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.0
            .insert(Value::String("name".to_string()), Value::String(name.into()));
    }

    fn field_text(&self, key: &str) -> String {
        self.0.get(key).map(scalar_text).unwrap_or_default()
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// A candidate that answered its delay query under the latency ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub node: NodeDescriptor,
    pub latency_ms: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(yaml: &str) -> NodeDescriptor {
        NodeDescriptor::from_value(serde_yml::from_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn identity_normalises_numeric_and_string_ports() {
        let a = node("{server: a.example, port: 443, type: ss}");
        let b = node("{server: a.example, port: '443', type: vmess}");
        assert_eq!(a.identity(), "a.example:443");
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn protocol_is_uppercased_with_fallback() {
        assert_eq!(node("{type: trojan}").protocol(), "TROJAN");
        assert_eq!(node("{server: x}").protocol(), UNKNOWN_PROTOCOL);
    }

    #[test]
    fn set_name_keeps_other_fields() {
        let mut n = node("{name: old, server: h, port: 1, cipher: aes-128-gcm}");
        n.set_name("SS 120ms");
        assert_eq!(n.name(), Some("SS 120ms"));
        assert_eq!(n.identity(), "h:1");
        assert_eq!(
            n.as_mapping().get("cipher").and_then(Value::as_str),
            Some("aes-128-gcm")
        );
    }

    #[test]
    fn non_mapping_values_are_rejected() {
        assert!(NodeDescriptor::from_value(Value::String("ss://...".into())).is_none());
    }
}
