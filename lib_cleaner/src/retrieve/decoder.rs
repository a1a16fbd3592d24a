//! # Payload Decoder
//!
//! Subscription bodies arrive either as a YAML document with a `proxies`
//! list or as that same document wrapped in base64 (often with the padding
//! stripped). Each format is a `DecodeStrategy`; the `PayloadDecoder` tries
//! them in order and returns the first list that comes out.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use serde_yml::Value;
use tracing::debug;

use crate::errors::DecodeError;
use crate::model::NodeDescriptor;

/// Field holding the node list in a structured subscription document.
pub const PROXY_LIST_FIELD: &str = "proxies";

/// One way of turning a response body into node descriptors.
pub trait DecodeStrategy: Send + Sync {
    /// Short label used in logs and aggregated errors.
    fn name(&self) -> &'static str;

    fn decode(&self, body: &str) -> Result<Vec<NodeDescriptor>, DecodeError>;
}

/// A YAML (or JSON, being a YAML subset) document with a `proxies` list.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredYaml;

impl DecodeStrategy for StructuredYaml {
    fn name(&self) -> &'static str {
        "structured"
    }

    fn decode(&self, body: &str) -> Result<Vec<NodeDescriptor>, DecodeError> {
        let doc: Value = serde_yml::from_str(body)?;
        let entries = match doc.get(PROXY_LIST_FIELD) {
            Some(Value::Sequence(entries)) => entries,
            _ => return Err(DecodeError::NoProxyList),
        };

        let mut nodes = Vec::with_capacity(entries.len());
        for entry in entries {
            match NodeDescriptor::from_value(entry.clone()) {
                Some(node) => nodes.push(node),
                None => debug!("Skipping non-mapping proxy entry"),
            }
        }
        Ok(nodes)
    }
}

/// Base64 text wrapping a structured document.
///
/// Whitespace is stripped and the text padded with `=` to a 4-byte
/// boundary before decoding; the URL-safe alphabet is tried when the
/// standard one fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct PaddedBase64;

impl PaddedBase64 {
    fn pad(body: &str) -> String {
        let mut compact: String = body.chars().filter(|c| !c.is_whitespace()).collect();
        let missing = compact.len() % 4;
        if missing != 0 {
            compact.extend(std::iter::repeat('=').take(4 - missing));
        }
        compact
    }
}

impl DecodeStrategy for PaddedBase64 {
    fn name(&self) -> &'static str {
        "base64"
    }

    fn decode(&self, body: &str) -> Result<Vec<NodeDescriptor>, DecodeError> {
        let padded = Self::pad(body);
        let bytes = match STANDARD.decode(&padded) {
            Ok(bytes) => bytes,
            Err(standard_err) => URL_SAFE.decode(&padded).map_err(|_| standard_err)?,
        };
        let text = String::from_utf8(bytes)?;
        StructuredYaml.decode(&text)
    }
}

/// Ordered list of strategies; the first success wins.
pub struct PayloadDecoder {
    strategies: Vec<Box<dyn DecodeStrategy>>,
}

impl PayloadDecoder {
    pub fn new(strategies: Vec<Box<dyn DecodeStrategy>>) -> Self {
        Self { strategies }
    }

    /// Tries every strategy in order.
    ///
    /// # Errors
    /// `DecodeError::Unrecognized` listing each strategy's failure.
    pub fn decode(&self, body: &str) -> Result<Vec<NodeDescriptor>, DecodeError> {
        let mut failures = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            match strategy.decode(body) {
                Ok(nodes) => {
                    debug!(strategy = strategy.name(), count = nodes.len(), "Payload decoded");
                    return Ok(nodes);
                }
                Err(e) => failures.push(format!("{}: {}", strategy.name(), e)),
            }
        }
        Err(DecodeError::Unrecognized(failures))
    }
}

impl Default for PayloadDecoder {
    /// Structured first, base64 fallback second.
    fn default() -> Self {
        Self::new(vec![Box::new(StructuredYaml), Box::new(PaddedBase64)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "\
proxies:
  - {name: a, type: ss, server: 1.1.1.1, port: 8388, cipher: aes-128-gcm, password: x}
  - {name: b, type: vmess, server: v.example, port: 443, uuid: 00000000-0000-0000-0000-000000000000}
rules:
  - MATCH,DIRECT
";

    #[test]
    fn structured_document_is_read_directly() {
        let nodes = StructuredYaml.decode(DOC).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[1].identity(), "v.example:443");
    }

    #[test]
    fn document_without_proxy_list_is_rejected() {
        let err = StructuredYaml.decode("rules: [MATCH,DIRECT]").unwrap_err();
        assert!(matches!(err, DecodeError::NoProxyList));
        let err = StructuredYaml.decode("proxies: not-a-list").unwrap_err();
        assert!(matches!(err, DecodeError::NoProxyList));
    }

    #[test]
    fn unpadded_base64_falls_back_and_decodes() {
        let encoded = STANDARD.encode(DOC);
        let unpadded = encoded.trim_end_matches('=');
        assert_ne!(unpadded.len() % 4, 0, "fixture should need padding");

        let nodes = PayloadDecoder::default().decode(unpadded).unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].protocol(), "SS");
    }

    #[test]
    fn line_wrapped_base64_is_accepted() {
        let encoded = STANDARD.encode(DOC);
        let wrapped: String = encoded
            .as_bytes()
            .chunks(60)
            .map(|c| format!("{}\n", std::str::from_utf8(c).unwrap()))
            .collect();
        assert_eq!(PayloadDecoder::default().decode(&wrapped).unwrap().len(), 2);
    }

    #[test]
    fn garbage_reports_every_strategy() {
        let err = PayloadDecoder::default().decode("<html>404</html>").unwrap_err();
        match err {
            DecodeError::Unrecognized(failures) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].starts_with("structured"));
                assert!(failures[1].starts_with("base64"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn non_mapping_entries_are_skipped() {
        let nodes = StructuredYaml
            .decode("proxies:\n  - ss://abc\n  - {server: h, port: 1}\n")
            .unwrap();
        assert_eq!(nodes.len(), 1);
    }
}
