use std::collections::HashMap;

use crate::model::{NodeDescriptor, ProbeResult};

/// Verified nodes sorted by ascending latency with final display names.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingSet {
    nodes: Vec<NodeDescriptor>,
}

impl WorkingSet {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    pub fn into_nodes(self) -> Vec<NodeDescriptor> {
        self.nodes
    }
}

/// `"<PROTOCOL> <latency>ms"`.
pub fn base_name(node: &NodeDescriptor, latency_ms: u32) -> String {
    format!("{} {}ms", node.protocol(), latency_ms)
}

/// Stable-sorts by latency and names each node.
///
/// A base name seen earlier in the pass gets ` 2`, ` 3`, ... appended in
/// encounter order.
pub fn rank(mut results: Vec<ProbeResult>) -> WorkingSet {
    results.sort_by_key(|r| r.latency_ms);

    let mut seen: HashMap<String, u32> = HashMap::new();
    let nodes = results
        .into_iter()
        .map(|ProbeResult { mut node, latency_ms }| {
            let base = base_name(&node, latency_ms);
            let count = seen.entry(base.clone()).or_insert(0);
            *count += 1;
            let name = if *count == 1 { base } else { format!("{} {}", base, count) };
            node.set_name(name);
            node
        })
        .collect();

    WorkingSet { nodes }
}
