// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Copy and move

use std::sync::Arc;

use crate::content::FileContent;
use crate::error::{FsError, FsResult};
use crate::filesystem::{Expect, FsInner};
use crate::locking::LockManager;
use crate::node::{DirEntry, Node, NodeEntry, NodeKind};
use crate::path::FsPath;
use crate::resolver::Base;
use crate::types::{CopyOptions, MoveOptions, NodeId};

/// Source state captured before the target is touched
enum Payload {
    Directory,
    File(Vec<u8>),
    Symlink(String),
}

impl FsInner {
    /// Copy one node. Directories are copied without their entries.
    pub(crate) fn copy(&self, source: &FsPath, target: &FsPath, options: CopyOptions) -> FsResult<()> {
        self.ensure_open()?;
        self.check_path(target)?;
        let src = self.existing(&Base::Default, source, !options.nofollow_links)?;
        let (payload, src_meta) = {
            let state = src.state.read();
            let payload = match &state.kind {
                NodeKind::Directory { .. } => Payload::Directory,
                NodeKind::File { content } => Payload::File(content.as_bytes().to_vec()),
                NodeKind::Symlink { target } => Payload::Symlink(target.clone()),
            };
            (payload, state.meta.clone())
        };

        let shown = target.to_string();
        let lookup = self.resolve(&Base::Default, target, false)?;
        if let Some(existing) = &lookup.node {
            if existing.id == src.id {
                return Ok(());
            }
            if !options.replace_existing {
                return Err(FsError::FileAlreadyExists { path: shown });
            }
            self.delete_entry(&Base::Default, target, Expect::Any)?;
        }
        let (Some(parent), Some(name)) = (lookup.parent, lookup.name) else {
            return Err(FsError::FileAlreadyExists { path: shown });
        };

        let meta = if options.copy_attributes {
            src_meta
        } else {
            let kind = match payload {
                Payload::Directory => crate::types::FileKind::Directory,
                Payload::File(_) => crate::types::FileKind::RegularFile,
                Payload::Symlink(_) => crate::types::FileKind::SymbolicLink,
            };
            self.defaults.metadata(kind, self.now())
        };
        let node = match payload {
            Payload::Directory => Node::directory(Some(parent.id), meta),
            Payload::File(bytes) => Node::file(FileContent::from_bytes(bytes), meta),
            Payload::Symlink(link) => Node::symlink(link, meta),
        };
        let entry = self.link_new(&parent, &name, node, &shown)?;
        tracing::debug!(
            fs = %self.id,
            source = %source,
            target = %shown,
            node = entry.id.as_u64(),
            copy_attributes = options.copy_attributes,
            "copied node"
        );
        Ok(())
    }

    /// Re-link an entry under a new parent and name in one step.
    pub(crate) fn move_entry(
        &self,
        src_base: &Base,
        source: &FsPath,
        dst_base: &Base,
        target: &FsPath,
        options: MoveOptions,
    ) -> FsResult<()> {
        self.ensure_open()?;
        self.check_path(source)?;
        self.check_path(target)?;
        let src_display = source.to_string();
        let dst_display = target.to_string();

        let src_lookup = self.resolve(src_base, source, false)?;
        let node = src_lookup
            .node
            .ok_or_else(|| FsError::no_such_file(src_display.clone()))?;
        let (Some(src_parent), Some(src_name)) = (src_lookup.parent, src_lookup.name) else {
            return Err(FsError::AccessDenied {
                path: src_display,
                reason: "cannot move a root or unnamed entry",
            });
        };
        let dst_lookup = self.resolve(dst_base, target, false)?;
        let (Some(dst_parent), Some(dst_name)) = (dst_lookup.parent, dst_lookup.name) else {
            return Err(FsError::FileAlreadyExists { path: dst_display });
        };

        if let Some(existing) = &dst_lookup.node {
            if existing.id == node.id {
                if src_parent.id == dst_parent.id && src_name.key == dst_name.key {
                    self.rename_display(&src_parent, &src_name.key, &dst_name.display);
                }
                return Ok(());
            }
            if !options.replace_existing {
                return Err(FsError::FileAlreadyExists { path: dst_display });
            }
        }

        let _structure = self.locks.structural();
        let is_dir = node.state.read().is_directory();
        if is_dir && self.is_ancestor_or_self(node.id, &dst_parent) {
            return Err(FsError::InvalidArgument(format!(
                "cannot move {src_display} into its own subtree {dst_display}"
            )));
        }

        let (mut src_dir, mut dst_guard) = LockManager::write_pair(&src_parent, &dst_parent);
        if src_dir.is_detached() {
            return Err(FsError::no_such_file(src_display));
        }
        let linked = src_dir.entries().and_then(|e| e.get(&src_name.key)).map(|e| e.id);
        if linked != Some(node.id) {
            return Err(FsError::no_such_file(src_display));
        }

        // Displace whatever the target name currently refers to.
        {
            let dst_dir = dst_guard.as_deref_mut().unwrap_or(&mut *src_dir);
            if dst_dir.is_detached() {
                return Err(FsError::no_such_file(dst_display));
            }
            let displaced = dst_dir.entries().and_then(|e| e.get(&dst_name.key)).map(|e| e.id);
            if let Some(displaced_id) = displaced {
                if !options.replace_existing {
                    return Err(FsError::FileAlreadyExists { path: dst_display });
                }
                if displaced_id == src_parent.id {
                    return Err(FsError::DirectoryNotEmpty { path: dst_display });
                }
                let victim = self.store.linked(displaced_id);
                let mut victim_state = victim.state.write();
                if victim_state.is_directory() && !victim_state.is_empty_directory() {
                    return Err(FsError::DirectoryNotEmpty { path: dst_display });
                }
                if let Some(entries) = dst_dir.entries_mut() {
                    entries.shift_remove(&dst_name.key);
                }
                self.drop_link(&mut victim_state, victim.id);
            }
        }

        let now = self.now();
        if let Some(entries) = src_dir.entries_mut() {
            entries.shift_remove(&src_name.key);
        }
        src_dir.meta.last_modified_time = now;
        {
            let dst_dir = dst_guard.as_deref_mut().unwrap_or(&mut *src_dir);
            if let Some(entries) = dst_dir.entries_mut() {
                entries.insert(
                    dst_name.key.clone(),
                    DirEntry {
                        name: dst_name.display.clone(),
                        id: node.id,
                    },
                );
            }
            dst_dir.meta.last_modified_time = now;
        }
        if is_dir && src_parent.id != dst_parent.id {
            if let NodeKind::Directory { parent, .. } = &mut node.state.write().kind {
                *parent = Some(dst_parent.id);
            }
        }

        tracing::debug!(
            fs = %self.id,
            source = %src_display,
            target = %dst_display,
            node = node.id.as_u64(),
            "moved entry"
        );
        Ok(())
    }

    /// Case-only rename of an entry that keeps its key
    fn rename_display(&self, parent: &NodeEntry, key: &str, shown: &str) {
        let mut dir = parent.state.write();
        if let Some(entry) = dir.entries_mut().and_then(|e| e.get_mut(key)) {
            if entry.name != shown {
                entry.name = shown.to_string();
                dir.meta.last_modified_time = self.now();
            }
        }
    }

    /// Whether `dir` is `ancestor` or lies below it. Requires the structural lock.
    fn is_ancestor_or_self(&self, ancestor: NodeId, dir: &Arc<NodeEntry>) -> bool {
        let mut current = Some(Arc::clone(dir));
        while let Some(node) = current {
            if node.id == ancestor {
                return true;
            }
            let parent = node.state.read().parent_dir();
            current = parent.and_then(|id| self.store.get(id));
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FsConfig;
    use crate::filesystem::MemoryFileSystem;
    use crate::types::PermissionSet;

    fn fs() -> MemoryFileSystem {
        MemoryFileSystem::new(FsConfig::posix()).unwrap()
    }

    #[test]
    fn copy_file_duplicates_content() {
        let fs = fs();
        let a = fs.path("/a").unwrap();
        let b = fs.path("/b").unwrap();
        fs.write_all(&a, b"payload").unwrap();
        fs.copy(&a, &b, CopyOptions::default()).unwrap();
        fs.write_all(&a, b"changed").unwrap();
        assert_eq!(fs.read_all(&b).unwrap(), b"payload");
        assert!(!fs.is_same_file(&a, &b).unwrap());
    }

    #[test]
    fn copy_directory_is_shallow() {
        let fs = fs();
        let src = fs.path("/src").unwrap();
        fs.create_directory(&src, &[]).unwrap();
        fs.create_file(&src.resolve("inner").unwrap(), &[]).unwrap();
        let dst = fs.path("/dst").unwrap();
        fs.copy(&src, &dst, CopyOptions::default()).unwrap();
        assert!(fs.is_directory(&dst));
        assert_eq!(fs.new_directory_stream(&dst).unwrap().entries().unwrap().count(), 0);
    }

    #[test]
    fn copy_onto_existing_requires_replace() {
        let fs = fs();
        let a = fs.path("/a").unwrap();
        let b = fs.path("/b").unwrap();
        fs.write_all(&a, b"new").unwrap();
        fs.write_all(&b, b"old").unwrap();
        let err = fs.copy(&a, &b, CopyOptions::default()).unwrap_err();
        assert!(matches!(err, FsError::FileAlreadyExists { .. }));

        let replace = CopyOptions {
            replace_existing: true,
            ..CopyOptions::default()
        };
        fs.copy(&a, &b, replace).unwrap();
        assert_eq!(fs.read_all(&b).unwrap(), b"new");
        fs.copy(&a, &a, CopyOptions::default()).unwrap();
    }

    #[test]
    fn copy_symlink_with_nofollow_copies_link() {
        let fs = fs();
        let target = fs.path("/target").unwrap();
        fs.write_all(&target, b"x").unwrap();
        let link = fs.path("/link").unwrap();
        fs.create_symbolic_link(&link, &target, &[]).unwrap();

        let copy = fs.path("/link-copy").unwrap();
        let nofollow = CopyOptions {
            nofollow_links: true,
            ..CopyOptions::default()
        };
        fs.copy(&link, &copy, nofollow).unwrap();
        assert!(fs.is_symbolic_link(&copy));

        let deref = fs.path("/deref").unwrap();
        fs.copy(&link, &deref, CopyOptions::default()).unwrap();
        assert!(fs.is_regular_file(&deref));
        assert!(!fs.is_symbolic_link(&deref));
    }

    #[test]
    fn copy_attributes_carries_permissions_by_value() {
        let fs = fs();
        let a = fs.path("/a").unwrap();
        fs.create_file(&a, &[]).unwrap();
        let custom: PermissionSet = "rwx------".parse().unwrap();
        fs.posix_view(&a).unwrap().set_permissions(custom).unwrap();

        let with = CopyOptions {
            copy_attributes: true,
            ..CopyOptions::default()
        };
        let b = fs.path("/b").unwrap();
        fs.copy(&a, &b, with).unwrap();
        assert_eq!(fs.read_posix_attributes(&b).unwrap().permissions, custom);

        fs.posix_view(&a)
            .unwrap()
            .set_permissions("rw-------".parse().unwrap())
            .unwrap();
        assert_eq!(fs.read_posix_attributes(&b).unwrap().permissions, custom);
    }

    #[test]
    fn move_relinks_across_directories() {
        let fs = fs();
        let d1 = fs.path("/d1").unwrap();
        let d2 = fs.path("/d2").unwrap();
        fs.create_directory(&d1, &[]).unwrap();
        fs.create_directory(&d2, &[]).unwrap();
        let sub = d1.resolve("sub").unwrap();
        fs.create_directory(&sub, &[]).unwrap();
        fs.write_all(&sub.resolve("f").unwrap(), b"1").unwrap();

        let moved = d2.resolve("sub").unwrap();
        fs.move_path(&sub, &moved, MoveOptions::default()).unwrap();
        assert!(!fs.exists(&sub));
        assert_eq!(fs.read_all(&moved.resolve("f").unwrap()).unwrap(), b"1");
        // `..` follows the new parent
        let up = fs.path("/d2/sub/../sub/f").unwrap();
        assert!(fs.exists(&up));
    }

    #[test]
    fn move_into_own_subtree_is_rejected() {
        let fs = fs();
        let a = fs.path("/a").unwrap();
        fs.create_directories(&a.resolve("b/c").unwrap(), &[]).unwrap();
        let err = fs
            .move_path(&a, &fs.path("/a/b/c/a").unwrap(), MoveOptions::default())
            .unwrap_err();
        assert!(matches!(err, FsError::InvalidArgument(_)));
    }

    #[test]
    fn move_onto_itself_is_a_no_op() {
        let fs = fs();
        let a = fs.path("/a").unwrap();
        fs.write_all(&a, b"x").unwrap();
        fs.move_path(&a, &a, MoveOptions::default()).unwrap();
        assert_eq!(fs.read_all(&a).unwrap(), b"x");
    }

    #[test]
    fn move_replacing_non_empty_directory_fails() {
        let fs = fs();
        let a = fs.path("/a").unwrap();
        let b = fs.path("/b").unwrap();
        fs.write_all(&a, b"x").unwrap();
        fs.create_directory(&b, &[]).unwrap();
        fs.create_file(&b.resolve("child").unwrap(), &[]).unwrap();
        let replace = MoveOptions {
            replace_existing: true,
            ..MoveOptions::default()
        };
        let err = fs.move_path(&a, &b, replace).unwrap_err();
        assert!(matches!(err, FsError::DirectoryNotEmpty { .. }));
        assert!(fs.exists(&a));
    }
}
