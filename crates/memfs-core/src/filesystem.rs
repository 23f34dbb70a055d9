// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! The in-memory filesystem instance and its public operations

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::attributes::{
    self, AttributeDefaults, BasicFileAttributeView, DosFileAttributeView, OwnerFileAttributeView,
    PosixFileAttributeView,
};
use crate::channel::ByteChannel;
use crate::clock::{Clock, SystemClock};
use crate::config::FsConfig;
use crate::content::FileContent;
use crate::error::{FsError, FsResult};
use crate::locking::LockManager;
use crate::node::{DirEntry, Node, NodeEntry};
use crate::path::{parse_components, FsPath, PathContext, PathElement};
use crate::policy::PathPolicy;
use crate::resolver::Base;
use crate::store::NodeStore;
use crate::stream::DirectoryStream;
use crate::types::{
    AttributeValue, AttributeView, BasicFileAttributes, CopyOptions, DosFileAttributes,
    FileAttribute, FileKind, FileTime, FsId, MoveOptions, OpenOptions, PosixFileAttributes,
    UserPrincipal,
};

/// Kind of node a create request builds
pub(crate) enum NewNode {
    Directory,
    File,
    Symlink(String),
}

impl NewNode {
    fn kind(&self) -> FileKind {
        match self {
            NewNode::Directory => FileKind::Directory,
            NewNode::File => FileKind::RegularFile,
            NewNode::Symlink(_) => FileKind::SymbolicLink,
        }
    }
}

/// Which node kinds a delete request accepts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Expect {
    Any,
    File,
    Directory,
}

/// Shared state of one instance. Handles and views keep it alive.
pub(crate) struct FsInner {
    pub(crate) id: FsId,
    pub(crate) config: FsConfig,
    pub(crate) ctx: Arc<PathContext>,
    pub(crate) store: NodeStore,
    pub(crate) roots: IndexMap<String, Arc<NodeEntry>>,
    pub(crate) locks: LockManager,
    pub(crate) defaults: AttributeDefaults,
    clock: Arc<dyn Clock>,
    closed: AtomicBool,
}

impl FsInner {
    fn new(config: FsConfig, clock: Arc<dyn Clock>) -> FsResult<Self> {
        config.validate()?;
        let id = FsId::next();
        let policy = config.policy();
        let ctx = Arc::new(PathContext::new(id, policy, &config.current_working_directory)?);
        let store = NodeStore::new();
        let defaults = AttributeDefaults::from_config(&config);
        let now = clock.now();

        let mut roots = IndexMap::new();
        for root in &config.roots {
            let (Some(element), _) = parse_components(&policy, root)? else {
                return Err(FsError::InvalidConfig(format!("not a root: {root}")));
            };
            let mut node = Node::directory(None, defaults.metadata(FileKind::Directory, now));
            node.links = 1;
            roots.insert(element.key, store.allocate(node));
        }

        Ok(Self {
            id,
            config,
            ctx,
            store,
            roots,
            locks: LockManager::new(),
            defaults,
            clock,
            closed: AtomicBool::new(false),
        })
    }

    pub(crate) fn now(&self) -> FileTime {
        self.clock.now()
    }

    pub(crate) fn policy(&self) -> &PathPolicy {
        &self.ctx.policy
    }

    pub(crate) fn ensure_open(&self) -> FsResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FsError::FileSystemClosed);
        }
        Ok(())
    }

    pub(crate) fn check_path(&self, path: &FsPath) -> FsResult<()> {
        if path.fs_id() != self.id {
            return Err(FsError::ProviderMismatch);
        }
        Ok(())
    }

    fn is_root(&self, node: &NodeEntry) -> bool {
        self.roots.values().any(|root| root.id == node.id)
    }

    /// Link a fully built node under `parent` as `name`.
    pub(crate) fn link_new(
        &self,
        parent: &NodeEntry,
        name: &PathElement,
        mut node: Node,
        shown: &str,
    ) -> FsResult<Arc<NodeEntry>> {
        let mut dir = parent.state.write();
        if dir.is_detached() {
            return Err(FsError::no_such_file(shown));
        }
        let now = self.now();
        let entries = dir.entries_mut().ok_or_else(|| FsError::NotDirectory {
            path: shown.to_string(),
        })?;
        if entries.contains_key(&name.key) {
            return Err(FsError::FileAlreadyExists {
                path: shown.to_string(),
            });
        }
        node.links = 1;
        let entry = self.store.allocate(node);
        entries.insert(
            name.key.clone(),
            DirEntry {
                name: name.display.clone(),
                id: entry.id,
            },
        );
        dir.meta.last_modified_time = now;
        Ok(entry)
    }

    pub(crate) fn create_node(
        &self,
        base: &Base,
        path: &FsPath,
        new: NewNode,
        attrs: &[FileAttribute],
    ) -> FsResult<Arc<NodeEntry>> {
        self.ensure_open()?;
        self.check_path(path)?;
        let shown = path.to_string();
        let lookup = self.resolve(base, path, false)?;
        let (Some(parent), Some(name), None) = (lookup.parent, lookup.name, lookup.node) else {
            return Err(FsError::FileAlreadyExists { path: shown });
        };

        let mut meta = self.defaults.metadata(new.kind(), self.now());
        attributes::apply_initial(self.policy(), &mut meta, attrs)?;
        let node = match new {
            NewNode::Directory => Node::directory(Some(parent.id), meta),
            NewNode::File => Node::file(FileContent::new(), meta),
            NewNode::Symlink(target) => Node::symlink(target, meta),
        };
        let entry = self.link_new(&parent, &name, node, &shown)?;
        tracing::debug!(fs = %self.id, path = %shown, node = entry.id.as_u64(), "created node");
        Ok(entry)
    }

    /// Create a regular file, or with `reuse_existing` return whatever
    /// already occupies the name.
    pub(crate) fn create_file_at(
        &self,
        parent: &NodeEntry,
        name: &PathElement,
        attrs: &[FileAttribute],
        reuse_existing: bool,
        shown: &str,
    ) -> FsResult<Arc<NodeEntry>> {
        let mut meta = self.defaults.metadata(FileKind::RegularFile, self.now());
        attributes::apply_initial(self.policy(), &mut meta, attrs)?;
        {
            let dir = parent.state.read();
            if let Some(entry) = dir.entries().and_then(|e| e.get(&name.key)) {
                if reuse_existing {
                    return Ok(self.store.linked(entry.id));
                }
                return Err(FsError::FileAlreadyExists {
                    path: shown.to_string(),
                });
            }
        }
        match self.link_new(parent, name, Node::file(FileContent::new(), meta), shown) {
            Err(FsError::FileAlreadyExists { .. }) if reuse_existing => {
                let dir = parent.state.read();
                dir.entries()
                    .and_then(|e| e.get(&name.key))
                    .map(|entry| self.store.linked(entry.id))
                    .ok_or_else(|| FsError::no_such_file(shown))
            }
            other => other,
        }
    }

    pub(crate) fn create_directories(&self, path: &FsPath, attrs: &[FileAttribute]) -> FsResult<()> {
        let absolute = path.to_absolute();
        let Some(mut current) = absolute.root() else {
            return Err(FsError::no_such_file(path.to_string()));
        };
        for name in absolute.iter() {
            current = current.resolve_path(&name)?;
            match self.create_node(&Base::Default, &current, NewNode::Directory, attrs) {
                Ok(_) => {}
                Err(FsError::FileAlreadyExists { path }) => {
                    let node = self.existing(&Base::Default, &current, true)?;
                    if !node.state.read().is_directory() {
                        return Err(FsError::FileAlreadyExists { path });
                    }
                }
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    pub(crate) fn create_hard_link(&self, link: &FsPath, existing: &FsPath) -> FsResult<()> {
        let target = self.existing(&Base::Default, existing, true)?;
        if target.state.read().is_directory() {
            return Err(FsError::AccessDenied {
                path: existing.to_string(),
                reason: "hard links to directories are not allowed",
            });
        }
        self.check_path(link)?;
        let shown = link.to_string();
        let lookup = self.resolve(&Base::Default, link, false)?;
        let (Some(parent), Some(name), None) = (lookup.parent, lookup.name, lookup.node) else {
            return Err(FsError::FileAlreadyExists { path: shown });
        };

        let mut dir = parent.state.write();
        if dir.is_detached() {
            return Err(FsError::no_such_file(shown));
        }
        let mut file = target.state.write();
        if file.is_detached() {
            return Err(FsError::no_such_file(existing.to_string()));
        }
        let entries = dir
            .entries_mut()
            .ok_or_else(|| FsError::NotDirectory { path: shown.clone() })?;
        if entries.contains_key(&name.key) {
            return Err(FsError::FileAlreadyExists { path: shown });
        }
        entries.insert(
            name.key.clone(),
            DirEntry {
                name: name.display.clone(),
                id: target.id,
            },
        );
        file.links += 1;
        dir.meta.last_modified_time = self.now();
        tracing::debug!(fs = %self.id, link = %shown, node = target.id.as_u64(), "created hard link");
        Ok(())
    }

    pub(crate) fn delete_entry(&self, base: &Base, path: &FsPath, expect: Expect) -> FsResult<()> {
        self.ensure_open()?;
        self.check_path(path)?;
        let shown = path.to_string();
        let lookup = self.resolve(base, path, false)?;
        let node = lookup
            .node
            .ok_or_else(|| FsError::no_such_file(shown.clone()))?;
        let (Some(parent), Some(name)) = (lookup.parent, lookup.name) else {
            if self.is_root(&node) {
                return Err(FsError::AccessDenied {
                    path: shown,
                    reason: "root directories cannot be deleted",
                });
            }
            return Err(FsError::InvalidArgument(format!("{shown}: path does not name an entry")));
        };

        let is_dir = node.state.read().is_directory();
        match expect {
            Expect::File if is_dir => {
                return Err(FsError::FileIsDirectory {
                    path: base.absolute_display(path),
                })
            }
            Expect::Directory if !is_dir => return Err(FsError::NotDirectory { path: shown }),
            _ => {}
        }

        // Holding a parent and a child directory at once needs the structural lock.
        let _structure = is_dir.then(|| self.locks.structural());
        let mut dir = parent.state.write();
        if dir.is_detached() {
            return Err(FsError::no_such_file(shown));
        }
        let linked = dir.entries().and_then(|e| e.get(&name.key)).map(|e| e.id);
        if linked != Some(node.id) {
            return Err(FsError::no_such_file(shown));
        }
        let mut child = node.state.write();
        if is_dir && !child.is_empty_directory() {
            return Err(FsError::DirectoryNotEmpty { path: shown });
        }
        if let Some(entries) = dir.entries_mut() {
            entries.shift_remove(&name.key);
        }
        dir.meta.last_modified_time = self.now();
        self.drop_link(&mut child, node.id);
        tracing::debug!(fs = %self.id, path = %shown, node = node.id.as_u64(), "deleted entry");
        Ok(())
    }

    /// Remove `key` from `parent` only if it still names `node`
    pub(crate) fn unlink_if_same(&self, parent: &NodeEntry, key: &str, node: &NodeEntry) {
        let mut dir = parent.state.write();
        if dir.is_detached() {
            return;
        }
        let linked = dir.entries().and_then(|e| e.get(key)).map(|e| e.id);
        if linked != Some(node.id) {
            return;
        }
        let mut child = node.state.write();
        if let Some(entries) = dir.entries_mut() {
            entries.shift_remove(key);
        }
        dir.meta.last_modified_time = self.now();
        self.drop_link(&mut child, node.id);
        tracing::debug!(fs = %self.id, node = node.id.as_u64(), "deleted on close");
    }

    /// Decrement a node's link count and release it from the arena at zero
    pub(crate) fn drop_link(&self, node: &mut Node, id: crate::types::NodeId) {
        node.links = node.links.saturating_sub(1);
        if node.links == 0 {
            self.store.release(id);
        }
    }
}

/// An in-memory filesystem instance.
///
/// Cloning yields another handle to the same instance.
#[derive(Clone)]
pub struct MemoryFileSystem {
    inner: Arc<FsInner>,
}

impl MemoryFileSystem {
    pub fn new(config: FsConfig) -> FsResult<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build an instance whose timestamps come from `clock`
    pub fn with_clock(config: FsConfig, clock: Arc<dyn Clock>) -> FsResult<Self> {
        let inner = FsInner::new(config, clock)?;
        let cwd = FsPath::parse(&inner.ctx, &inner.config.current_working_directory)?;
        inner.create_directories(&cwd, &[])?;
        tracing::info!(
            fs = %inner.id,
            flavor = ?inner.config.flavor,
            roots = ?inner.config.roots,
            "memory filesystem created"
        );
        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    pub fn id(&self) -> FsId {
        self.inner.id
    }

    pub fn config(&self) -> &FsConfig {
        &self.inner.config
    }

    pub fn policy(&self) -> PathPolicy {
        *self.inner.policy()
    }

    pub fn separator(&self) -> char {
        self.inner.policy().separator()
    }

    /// Parse `text` into a path bound to this instance
    pub fn path(&self, text: &str) -> FsResult<FsPath> {
        FsPath::parse(&self.inner.ctx, text)
    }

    pub fn working_directory(&self) -> FsResult<FsPath> {
        self.path(&self.inner.config.current_working_directory)
    }

    pub fn root_directories(&self) -> FsResult<Vec<FsPath>> {
        self.inner.config.roots.iter().map(|root| self.path(root)).collect()
    }

    pub fn supported_file_attribute_views(&self) -> BTreeSet<&'static str> {
        self.inner
            .policy()
            .supported_views()
            .iter()
            .map(|view| view.name())
            .collect()
    }

    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire)
    }

    /// Mark the instance closed. Later operations fail with `FileSystemClosed`.
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            tracing::info!(fs = %self.inner.id, "memory filesystem closed");
        }
    }

    pub fn create_file(&self, path: &FsPath, attrs: &[FileAttribute]) -> FsResult<()> {
        self.inner.create_node(&Base::Default, path, NewNode::File, attrs)?;
        Ok(())
    }

    pub fn create_directory(&self, path: &FsPath, attrs: &[FileAttribute]) -> FsResult<()> {
        self.inner.create_node(&Base::Default, path, NewNode::Directory, attrs)?;
        Ok(())
    }

    /// Create a directory and any missing ancestors
    pub fn create_directories(&self, path: &FsPath, attrs: &[FileAttribute]) -> FsResult<()> {
        self.inner.ensure_open()?;
        self.inner.check_path(path)?;
        self.inner.create_directories(path, attrs)
    }

    pub fn create_symbolic_link(
        &self,
        link: &FsPath,
        target: &FsPath,
        attrs: &[FileAttribute],
    ) -> FsResult<()> {
        self.inner.check_path(target)?;
        self.inner
            .create_node(&Base::Default, link, NewNode::Symlink(target.to_string()), attrs)?;
        Ok(())
    }

    /// Add a second name for an existing regular file
    pub fn create_link(&self, link: &FsPath, existing: &FsPath) -> FsResult<()> {
        self.inner.create_hard_link(link, existing)
    }

    pub fn delete(&self, path: &FsPath) -> FsResult<()> {
        self.inner.delete_entry(&Base::Default, path, Expect::Any)
    }

    /// Returns whether an entry was deleted
    pub fn delete_if_exists(&self, path: &FsPath) -> FsResult<bool> {
        match self.delete(path) {
            Ok(()) => Ok(true),
            Err(FsError::NoSuchFile { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    pub fn new_byte_channel(
        &self,
        path: &FsPath,
        options: &OpenOptions,
        attrs: &[FileAttribute],
    ) -> FsResult<ByteChannel> {
        ByteChannel::open(&self.inner, &Base::Default, path, options, attrs)
    }

    pub fn new_directory_stream(&self, dir: &FsPath) -> FsResult<DirectoryStream> {
        DirectoryStream::open(&self.inner, &Base::Default, dir, None)
    }

    /// Directory stream that only yields entries accepted by `filter`
    pub fn new_directory_stream_filtered<F>(&self, dir: &FsPath, filter: F) -> FsResult<DirectoryStream>
    where
        F: Fn(&FsPath) -> bool + Send + Sync + 'static,
    {
        DirectoryStream::open(&self.inner, &Base::Default, dir, Some(Box::new(filter)))
    }

    pub fn copy(&self, source: &FsPath, target: &FsPath, options: CopyOptions) -> FsResult<()> {
        self.inner.copy(source, target, options)
    }

    pub fn move_path(&self, source: &FsPath, target: &FsPath, options: MoveOptions) -> FsResult<()> {
        self.inner
            .move_entry(&Base::Default, source, &Base::Default, target, options)
    }

    pub fn read_symbolic_link(&self, link: &FsPath) -> FsResult<FsPath> {
        let node = self.inner.existing(&Base::Default, link, false)?;
        let state = node.state.read();
        match &state.kind {
            crate::node::NodeKind::Symlink { target } => self.path(target),
            _ => Err(FsError::NotLink {
                path: link.to_string(),
            }),
        }
    }

    pub fn exists(&self, path: &FsPath) -> bool {
        self.inner.existing(&Base::Default, path, true).is_ok()
    }

    pub fn is_directory(&self, path: &FsPath) -> bool {
        self.kind_of(path, true) == Some(FileKind::Directory)
    }

    pub fn is_regular_file(&self, path: &FsPath) -> bool {
        self.kind_of(path, true) == Some(FileKind::RegularFile)
    }

    pub fn is_symbolic_link(&self, path: &FsPath) -> bool {
        self.kind_of(path, false) == Some(FileKind::SymbolicLink)
    }

    fn kind_of(&self, path: &FsPath, follow: bool) -> Option<FileKind> {
        let node = self.inner.existing(&Base::Default, path, follow).ok()?;
        let kind = node.state.read().file_kind();
        Some(kind)
    }

    pub fn is_same_file(&self, a: &FsPath, b: &FsPath) -> FsResult<bool> {
        if a == b {
            return Ok(true);
        }
        let first = self.inner.existing(&Base::Default, a, true)?;
        let second = self.inner.existing(&Base::Default, b, true)?;
        Ok(first.id == second.id)
    }

    pub fn size(&self, path: &FsPath) -> FsResult<u64> {
        let node = self.inner.existing(&Base::Default, path, true)?;
        let size = node.state.read().size();
        Ok(size)
    }

    pub fn read_all(&self, path: &FsPath) -> FsResult<Vec<u8>> {
        let mut channel = self.new_byte_channel(path, &OpenOptions::new().read(true), &[])?;
        let mut out = Vec::with_capacity(channel.size()? as usize);
        let mut buf = [0u8; 8192];
        loop {
            let n = channel.read(&mut buf)?;
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        channel.close()?;
        Ok(out)
    }

    /// Create or replace the content of a file
    pub fn write_all(&self, path: &FsPath, data: &[u8]) -> FsResult<()> {
        let options = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate_existing(true);
        let mut channel = self.new_byte_channel(path, &options, &[])?;
        let mut written = 0;
        while written < data.len() {
            written += channel.write(&data[written..])?;
        }
        channel.close()
    }

    fn view_supported(&self, path: &FsPath, view: AttributeView) -> FsResult<()> {
        self.inner.check_path(path)?;
        if !self.inner.policy().supports_view(view) {
            return Err(FsError::unsupported_attribute(view.name()));
        }
        Ok(())
    }

    pub fn basic_view(&self, path: &FsPath) -> FsResult<BasicFileAttributeView> {
        self.view_supported(path, AttributeView::Basic)?;
        Ok(BasicFileAttributeView::new(
            Arc::clone(&self.inner),
            Base::Default,
            path.clone(),
        ))
    }

    pub fn owner_view(&self, path: &FsPath) -> FsResult<OwnerFileAttributeView> {
        self.view_supported(path, AttributeView::Owner)?;
        Ok(OwnerFileAttributeView::new(
            Arc::clone(&self.inner),
            Base::Default,
            path.clone(),
        ))
    }

    pub fn posix_view(&self, path: &FsPath) -> FsResult<PosixFileAttributeView> {
        self.view_supported(path, AttributeView::Posix)?;
        Ok(PosixFileAttributeView::new(
            Arc::clone(&self.inner),
            Base::Default,
            path.clone(),
        ))
    }

    pub fn dos_view(&self, path: &FsPath) -> FsResult<DosFileAttributeView> {
        self.view_supported(path, AttributeView::Dos)?;
        Ok(DosFileAttributeView::new(
            Arc::clone(&self.inner),
            Base::Default,
            path.clone(),
        ))
    }

    pub fn read_basic_attributes(&self, path: &FsPath) -> FsResult<BasicFileAttributes> {
        self.basic_view(path)?.read_attributes()
    }

    pub fn read_posix_attributes(&self, path: &FsPath) -> FsResult<PosixFileAttributes> {
        self.posix_view(path)?.read_attributes()
    }

    pub fn read_dos_attributes(&self, path: &FsPath) -> FsResult<DosFileAttributes> {
        self.dos_view(path)?.read_attributes()
    }

    pub fn get_owner(&self, path: &FsPath) -> FsResult<UserPrincipal> {
        self.owner_view(path)?.get_owner()
    }

    /// Read one attribute by `view:name`
    pub fn get_attribute(&self, path: &FsPath, name: &str) -> FsResult<AttributeValue> {
        let node = self.inner.existing(&Base::Default, path, true)?;
        let state = node.state.read();
        attributes::get_named(self.inner.policy(), &state, node.id, name)
    }

    pub fn set_attribute(&self, path: &FsPath, name: &str, value: AttributeValue) -> FsResult<()> {
        let node = self.inner.existing(&Base::Default, path, true)?;
        let mut state = node.state.write();
        attributes::set_named(self.inner.policy(), &mut state, name, &value)
    }

    /// Bulk read, e.g. `posix:*` or `dos:hidden,archive`
    pub fn read_attributes(
        &self,
        path: &FsPath,
        selector: &str,
    ) -> FsResult<BTreeMap<String, AttributeValue>> {
        let node = self.inner.existing(&Base::Default, path, true)?;
        let state = node.state.read();
        attributes::read_named(self.inner.policy(), &state, node.id, selector)
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<FsInner> {
        &self.inner
    }
}

impl std::fmt::Debug for MemoryFileSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryFileSystem")
            .field("id", &self.inner.id)
            .field("flavor", &self.inner.config.flavor)
            .field("open", &self.is_open())
            .finish()
    }
}
