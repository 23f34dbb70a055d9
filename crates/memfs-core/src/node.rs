// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Filesystem nodes

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::attributes::Metadata;
use crate::content::FileContent;
use crate::types::{FileKind, NodeId};

/// Directory entry: the name as created plus the child it links to
#[derive(Clone, Debug)]
pub(crate) struct DirEntry {
    pub(crate) name: String,
    pub(crate) id: NodeId,
}

/// Filesystem node types
#[derive(Debug)]
pub(crate) enum NodeKind {
    /// Entries are keyed by canonical name and kept in insertion order.
    Directory {
        entries: IndexMap<String, DirEntry>,
        parent: Option<NodeId>,
    },
    File {
        content: FileContent,
    },
    Symlink {
        target: String,
    },
}

/// Filesystem node
#[derive(Debug)]
pub(crate) struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) meta: Metadata,
    /// Directory entries naming this node. Zero once detached.
    pub(crate) links: u32,
}

impl Node {
    pub(crate) fn directory(parent: Option<NodeId>, meta: Metadata) -> Self {
        Self {
            kind: NodeKind::Directory {
                entries: IndexMap::new(),
                parent,
            },
            meta,
            links: 0,
        }
    }

    pub(crate) fn file(content: FileContent, meta: Metadata) -> Self {
        Self {
            kind: NodeKind::File { content },
            meta,
            links: 0,
        }
    }

    pub(crate) fn symlink(target: String, meta: Metadata) -> Self {
        Self {
            kind: NodeKind::Symlink { target },
            meta,
            links: 0,
        }
    }

    pub(crate) fn file_kind(&self) -> FileKind {
        match self.kind {
            NodeKind::Directory { .. } => FileKind::Directory,
            NodeKind::File { .. } => FileKind::RegularFile,
            NodeKind::Symlink { .. } => FileKind::SymbolicLink,
        }
    }

    pub(crate) fn is_directory(&self) -> bool {
        matches!(self.kind, NodeKind::Directory { .. })
    }

    pub(crate) fn size(&self) -> u64 {
        match &self.kind {
            NodeKind::Directory { .. } => 0,
            NodeKind::File { content } => content.len(),
            NodeKind::Symlink { target } => target.len() as u64,
        }
    }

    pub(crate) fn entries(&self) -> Option<&IndexMap<String, DirEntry>> {
        match &self.kind {
            NodeKind::Directory { entries, .. } => Some(entries),
            _ => None,
        }
    }

    pub(crate) fn entries_mut(&mut self) -> Option<&mut IndexMap<String, DirEntry>> {
        match &mut self.kind {
            NodeKind::Directory { entries, .. } => Some(entries),
            _ => None,
        }
    }

    pub(crate) fn parent_dir(&self) -> Option<NodeId> {
        match &self.kind {
            NodeKind::Directory { parent, .. } => *parent,
            _ => None,
        }
    }

    pub(crate) fn is_empty_directory(&self) -> bool {
        self.entries().is_some_and(|e| e.is_empty())
    }

    pub(crate) fn is_detached(&self) -> bool {
        self.links == 0
    }
}

/// Arena slot: a node identity plus its lock-protected state
#[derive(Debug)]
pub(crate) struct NodeEntry {
    pub(crate) id: NodeId,
    pub(crate) state: RwLock<Node>,
}

impl NodeEntry {
    pub(crate) fn new(id: NodeId, node: Node) -> Self {
        Self {
            id,
            state: RwLock::new(node),
        }
    }
}
