// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Path resolution against the node graph

use std::collections::VecDeque;
use std::sync::Arc;

use crate::error::{FsError, FsResult};
use crate::filesystem::FsInner;
use crate::node::{NodeEntry, NodeKind};
use crate::path::{parse_components, FsPath, PathElement};

/// Starting point for relative paths
#[derive(Clone)]
pub(crate) enum Base {
    /// The instance's working directory
    Default,
    /// A directory bound by a secure stream, plus the path that opened it
    Directory { node: Arc<NodeEntry>, path: FsPath },
}

impl Base {
    /// Absolute text form of `path` as seen from this base
    pub(crate) fn absolute_display(&self, path: &FsPath) -> String {
        match self {
            Base::Directory { path: base, .. } if !path.is_absolute() => base
                .resolve_path(path)
                .map(|p| p.to_absolute().to_string())
                .unwrap_or_else(|_| path.to_string()),
            _ => path.to_absolute().to_string(),
        }
    }

    /// Path handed out for entries reached through this base
    pub(crate) fn join(&self, path: &FsPath) -> FsResult<FsPath> {
        match self {
            Base::Directory { path: base, .. } => base.resolve_path(path),
            Base::Default => Ok(path.clone()),
        }
    }
}

/// Result of a walk: the containing directory and final name when the path
/// ends in a name, and the node if it exists.
pub(crate) struct Lookup {
    pub(crate) parent: Option<Arc<NodeEntry>>,
    pub(crate) name: Option<PathElement>,
    pub(crate) node: Option<Arc<NodeEntry>>,
}

impl FsInner {
    /// Walk `path` from its root, the working directory, or a bound
    /// directory. Intermediate symlinks are always followed; the final one
    /// only when `follow_final` is set. A missing final name is not an error.
    pub(crate) fn resolve(&self, base: &Base, path: &FsPath, follow_final: bool) -> FsResult<Lookup> {
        let shown = path.to_string();
        let (start, names) = match (path.root_element(), base) {
            (Some(root), _) => (self.root_node(root, &shown)?, path.elements().to_vec()),
            (None, Base::Directory { node, .. }) => {
                if node.state.read().is_detached() {
                    return Err(FsError::ClosedOrStaleHandle);
                }
                (Arc::clone(node), path.elements().to_vec())
            }
            (None, Base::Default) => {
                let absolute = path.to_absolute();
                let Some(root) = absolute.root_element() else {
                    return Err(FsError::no_such_file(shown));
                };
                (self.root_node(root, &shown)?, absolute.elements().to_vec())
            }
        };

        let mut queue: VecDeque<PathElement> = names.into();
        let mut current = start;
        let mut hops = 0u32;

        while let Some(element) = queue.pop_front() {
            let last = queue.is_empty();
            let guard = current.state.read();
            let NodeKind::Directory { entries, parent } = &guard.kind else {
                return Err(FsError::NotDirectory { path: shown });
            };

            if element.is_dot() {
                drop(guard);
                continue;
            }
            if element.is_dot_dot() {
                let up = parent.map(|id| self.store.linked(id));
                drop(guard);
                if let Some(up) = up {
                    current = up;
                }
                continue;
            }

            let Some(entry) = entries.get(&element.key) else {
                if last {
                    drop(guard);
                    return Ok(Lookup {
                        parent: Some(current),
                        name: Some(element),
                        node: None,
                    });
                }
                return Err(FsError::no_such_file(shown));
            };
            let child = self.store.linked(entry.id);
            drop(guard);

            let link_target = match &child.state.read().kind {
                NodeKind::Symlink { target } if !last || follow_final => Some(target.clone()),
                _ => None,
            };

            if let Some(target) = link_target {
                hops += 1;
                if hops > self.config.max_symlink_hops {
                    return Err(FsError::TooManyLevelsOfSymlinks { path: shown });
                }
                let (target_root, target_names) = parse_components(&self.ctx.policy, &target)?;
                tracing::trace!(fs = %self.id, link = %element.display, target = %target, "following symlink");
                if let Some(root) = target_root {
                    current = self.root_node(&root, &shown)?;
                }
                for name in target_names.into_iter().rev() {
                    queue.push_front(name);
                }
                continue;
            }

            if last {
                return Ok(Lookup {
                    parent: Some(current),
                    name: Some(element),
                    node: Some(child),
                });
            }
            current = child;
        }

        Ok(Lookup {
            parent: None,
            name: None,
            node: Some(current),
        })
    }

    /// Resolve a path that must exist
    pub(crate) fn existing(&self, base: &Base, path: &FsPath, follow: bool) -> FsResult<Arc<NodeEntry>> {
        self.ensure_open()?;
        self.check_path(path)?;
        self.resolve(base, path, follow)?
            .node
            .ok_or_else(|| FsError::no_such_file(path.to_string()))
    }

    fn root_node(&self, root: &PathElement, shown: &str) -> FsResult<Arc<NodeEntry>> {
        self.roots
            .get(&root.key)
            .cloned()
            .ok_or_else(|| FsError::no_such_file(shown))
    }
}
