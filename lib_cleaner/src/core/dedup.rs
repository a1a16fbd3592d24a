use std::collections::HashSet;

use tracing::debug;

use crate::model::NodeDescriptor;

/// Deduplicated candidates of one run, in first-seen order.
///
/// No two members share a `server:port` identity and every member carries
/// a unique working name the engine's control API can address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    nodes: Vec<NodeDescriptor>,
}

impl CandidateSet {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, NodeDescriptor> {
        self.nodes.iter()
    }

    pub fn as_slice(&self) -> &[NodeDescriptor] {
        &self.nodes
    }

    /// `server:port` identities in set order.
    pub fn identities(&self) -> Vec<String> {
        self.nodes.iter().map(NodeDescriptor::identity).collect()
    }
}

impl<'a> IntoIterator for &'a CandidateSet {
    type Item = &'a NodeDescriptor;
    type IntoIter = std::slice::Iter<'a, NodeDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.nodes.iter()
    }
}

/// Temporary name used while the node is under test.
pub fn working_name(index: usize, node: &NodeDescriptor) -> String {
    format!("Node-{}-{}", index, node.protocol())
}

/// Keeps the first descriptor per `server:port` and renames it.
pub fn deduplicate<I>(raw: I) -> CandidateSet
where
    I: IntoIterator<Item = NodeDescriptor>,
{
    let mut seen = HashSet::new();
    let mut nodes = Vec::new();
    let mut dropped = 0usize;

    for mut node in raw {
        if !seen.insert(node.identity()) {
            dropped += 1;
            continue;
        }
        let name = working_name(nodes.len(), &node);
        node.set_name(name);
        nodes.push(node);
    }

    debug!(unique = nodes.len(), dropped, "Deduplicated candidates");
    CandidateSet { nodes }
}
