//! # Subscription Export
//!
//! Renders a published snapshot for proxy clients: a full document with a
//! single `select` group routing everything through it, and a bare
//! `proxies` document encoded as padded base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Serialize;

use crate::core::store::Snapshot;
use crate::model::NodeDescriptor;

/// Name of the selector group in the full document.
pub const GROUP_NAME: &str = "Proxy";

#[derive(Serialize)]
struct ProxyGroup<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    proxies: Vec<&'a str>,
}

#[derive(Serialize)]
struct FullDocument<'a> {
    proxies: &'a [NodeDescriptor],
    #[serde(rename = "proxy-groups")]
    proxy_groups: Vec<ProxyGroup<'a>>,
    rules: Vec<String>,
}

#[derive(Serialize)]
struct ProxiesOnly<'a> {
    proxies: &'a [NodeDescriptor],
}

/// Full client subscription as YAML.
pub fn render_subscription(snapshot: &Snapshot) -> Result<String, serde_yml::Error> {
    let names = snapshot.nodes.iter().filter_map(NodeDescriptor::name).collect();
    let doc = FullDocument {
        proxies: &snapshot.nodes,
        proxy_groups: vec![ProxyGroup { name: GROUP_NAME, kind: "select", proxies: names }],
        rules: vec![format!("MATCH,{}", GROUP_NAME)],
    };
    serde_yml::to_string(&doc)
}

/// `{proxies: [...]}` as YAML, base64 encoded.
pub fn render_base64_subscription(snapshot: &Snapshot) -> Result<String, serde_yml::Error> {
    let yaml = serde_yml::to_string(&ProxiesOnly { proxies: &snapshot.nodes })?;
    Ok(STANDARD.encode(yaml.as_bytes()))
}

#[cfg(test)]
mod tests {
    use serde_yml::Value;

    use super::*;
    use crate::retrieve::decoder::PayloadDecoder;

    fn snapshot() -> Snapshot {
        let nodes: Vec<NodeDescriptor> = serde_yml::from_str(
            "- {name: SS 80ms, type: ss, server: a, port: 1}\n\
             - {name: VMESS 95ms, type: vmess, server: b, port: 2}\n",
        )
        .unwrap();
        Snapshot { nodes, updated_at: None }
    }

    #[test]
    fn full_document_groups_every_node() {
        let text = render_subscription(&snapshot()).unwrap();
        let doc: Value = serde_yml::from_str(&text).unwrap();

        let group = &doc["proxy-groups"][0];
        assert_eq!(group["name"].as_str(), Some("Proxy"));
        assert_eq!(group["type"].as_str(), Some("select"));
        assert_eq!(group["proxies"][1].as_str(), Some("VMESS 95ms"));
        assert_eq!(doc["rules"][0].as_str(), Some("MATCH,Proxy"));
    }

    #[test]
    fn base64_export_is_readable_by_the_decoder() {
        let encoded = render_base64_subscription(&snapshot()).unwrap();
        let nodes = PayloadDecoder::default().decode(&encoded).unwrap();
        assert_eq!(nodes, snapshot().nodes);
    }

    #[test]
    fn empty_snapshot_still_renders() {
        let text = render_subscription(&Snapshot::default()).unwrap();
        assert!(text.contains("MATCH,Proxy"));
    }
}
