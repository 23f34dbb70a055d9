// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Node arena indexed by identity

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::node::{Node, NodeEntry};
use crate::types::NodeId;

/// Arena of live nodes.
///
/// The map lock is a leaf: it may be taken while node locks are held, but no
/// node lock is ever acquired while it is held.
pub(crate) struct NodeStore {
    nodes: RwLock<HashMap<NodeId, Arc<NodeEntry>>>,
    next_id: AtomicU64,
}

impl NodeStore {
    pub(crate) fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn allocate(&self, node: Node) -> Arc<NodeEntry> {
        let id = NodeId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let entry = Arc::new(NodeEntry::new(id, node));
        self.nodes.write().insert(id, Arc::clone(&entry));
        entry
    }

    pub(crate) fn get(&self, id: NodeId) -> Option<Arc<NodeEntry>> {
        self.nodes.read().get(&id).cloned()
    }

    /// Look up a node that a live directory entry refers to
    pub(crate) fn linked(&self, id: NodeId) -> Arc<NodeEntry> {
        match self.get(id) {
            Some(entry) => entry,
            None => panic!("directory entry refers to released node {id:?}"),
        }
    }

    pub(crate) fn release(&self, id: NodeId) {
        self.nodes.write().remove(&id);
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.nodes.read().len()
    }
}
