//! # Result Store
//!
//! Holds the last published working set and its timestamp. Readers load an
//! `Arc<Snapshot>` without locking; a publish swaps in a whole new snapshot,
//! so a reader sees either the old set or the new one, never a mix.

use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::{DateTime, Local};

use crate::core::ranking::WorkingSet;
use crate::model::NodeDescriptor;

/// Immutable view of one published working set.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub nodes: Vec<NodeDescriptor>,
    /// `None` until the first successful run.
    pub updated_at: Option<DateTime<Local>>,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `%Y-%m-%d %H:%M:%S`, or `Never`.
    pub fn last_update_label(&self) -> String {
        match self.updated_at {
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "Never".to_string(),
        }
    }
}

/// Single-writer, many-reader holder of the published snapshot.
#[derive(Debug)]
pub struct ResultStore {
    current: ArcSwap<Snapshot>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self { current: ArcSwap::from_pointee(Snapshot::default()) }
    }

    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Replaces the published set in one step.
    pub fn publish(&self, working_set: WorkingSet) -> Arc<Snapshot> {
        let snapshot = Arc::new(Snapshot {
            nodes: working_set.into_nodes(),
            updated_at: Some(Local::now()),
        });
        self.current.store(Arc::clone(&snapshot));
        snapshot
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ranking::rank;
    use crate::model::ProbeResult;

    #[test]
    fn starts_empty_and_never_updated() {
        let store = ResultStore::new();
        let snap = store.snapshot();
        assert!(snap.is_empty());
        assert_eq!(snap.last_update_label(), "Never");
    }

    #[test]
    fn publish_replaces_without_touching_held_snapshots() {
        let store = ResultStore::new();
        let before = store.snapshot();

        let node = NodeDescriptor::from_value(
            serde_yml::from_str("{type: ss, server: h, port: 1}").unwrap(),
        )
        .unwrap();
        store.publish(rank(vec![ProbeResult { node, latency_ms: 50 }]));

        let after = store.snapshot();
        assert!(before.is_empty());
        assert_eq!(after.len(), 1);
        assert_eq!(after.nodes[0].name(), Some("SS 50ms"));
        assert!(after.updated_at.is_some());
    }
}
