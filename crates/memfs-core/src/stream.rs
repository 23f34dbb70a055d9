// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Directory streams bound to a directory's node identity
//!
//! A stream keeps the directory node itself, not its path. Relative names
//! passed to the secure operations are looked up among that node's current
//! children, so renaming or replacing the directory's path afterwards cannot
//! redirect them. Absolute paths are resolved from their root.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::attributes::{basic_snapshot, dos_snapshot, posix_snapshot};
use crate::channel::ByteChannel;
use crate::error::{FsError, FsResult};
use crate::filesystem::{Expect, FsInner};
use crate::node::NodeEntry;
use crate::path::FsPath;
use crate::resolver::Base;
use crate::types::{
    AttributeView, BasicFileAttributes, DosFileAttributes, FileAttribute, MoveOptions, OpenOptions,
    PosixFileAttributes,
};

type EntryFilter = Box<dyn Fn(&FsPath) -> bool + Send + Sync>;

/// Secure directory stream
pub struct DirectoryStream {
    inner: Arc<FsInner>,
    dir: Arc<NodeEntry>,
    path: FsPath,
    filter: Option<EntryFilter>,
    closed: AtomicBool,
    iterated: AtomicBool,
}

impl DirectoryStream {
    pub(crate) fn open(
        inner: &Arc<FsInner>,
        base: &Base,
        path: &FsPath,
        filter: Option<EntryFilter>,
    ) -> FsResult<Self> {
        let dir = inner.existing(base, path, true)?;
        if !dir.state.read().is_directory() {
            return Err(FsError::NotDirectory {
                path: path.to_string(),
            });
        }
        let path = base.join(path)?;
        tracing::trace!(fs = %inner.id, path = %path, node = dir.id.as_u64(), "opened directory stream");
        Ok(Self {
            inner: Arc::clone(inner),
            dir,
            path,
            filter,
            closed: AtomicBool::new(false),
            iterated: AtomicBool::new(false),
        })
    }

    /// Path the stream was opened with
    pub fn path(&self) -> &FsPath {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    /// Idempotent
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    fn ensure_open(&self) -> FsResult<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(FsError::StreamClosed);
        }
        Ok(())
    }

    fn base(&self) -> Base {
        Base::Directory {
            node: Arc::clone(&self.dir),
            path: self.path.clone(),
        }
    }

    /// Single-pass iterator over child paths in insertion order.
    ///
    /// The listing is captured when iteration starts. Only one call is
    /// allowed per stream.
    pub fn entries(&self) -> FsResult<Entries<'_>> {
        self.ensure_open()?;
        if self.iterated.swap(true, Ordering::AcqRel) {
            return Err(FsError::IllegalState("directory stream already iterated"));
        }
        Ok(Entries {
            stream: self,
            pending: None,
        })
    }

    fn snapshot(&self) -> Vec<String> {
        let state = self.dir.state.read();
        if state.is_detached() {
            return Vec::new();
        }
        state
            .entries()
            .map(|entries| entries.values().map(|e| e.name.clone()).collect())
            .unwrap_or_default()
    }

    /// Delete a non-directory entry
    pub fn delete_file(&self, path: &FsPath) -> FsResult<()> {
        self.ensure_open()?;
        self.inner.delete_entry(&self.base(), path, Expect::File)
    }

    /// Delete an empty directory entry
    pub fn delete_directory(&self, path: &FsPath) -> FsResult<()> {
        self.ensure_open()?;
        self.inner.delete_entry(&self.base(), path, Expect::Directory)
    }

    pub fn new_byte_channel(
        &self,
        path: &FsPath,
        options: &OpenOptions,
        attrs: &[FileAttribute],
    ) -> FsResult<ByteChannel> {
        self.ensure_open()?;
        ByteChannel::open(&self.inner, &self.base(), path, options, attrs)
    }

    /// Open a stream on a subdirectory of this one
    pub fn new_directory_stream(&self, path: &FsPath) -> FsResult<DirectoryStream> {
        self.ensure_open()?;
        DirectoryStream::open(&self.inner, &self.base(), path, None)
    }

    /// Move `source` (relative to this stream) to `target` (relative to
    /// `target_dir`).
    pub fn move_entry(
        &self,
        source: &FsPath,
        target_dir: &DirectoryStream,
        target: &FsPath,
    ) -> FsResult<()> {
        self.ensure_open()?;
        target_dir.ensure_open()?;
        if !Arc::ptr_eq(&self.inner, &target_dir.inner) {
            return Err(FsError::ProviderMismatch);
        }
        self.inner.move_entry(
            &self.base(),
            source,
            &target_dir.base(),
            target,
            MoveOptions::default(),
        )
    }

    pub fn basic_attributes(&self, path: &FsPath) -> FsResult<BasicFileAttributes> {
        self.ensure_open()?;
        let node = self.inner.existing(&self.base(), path, true)?;
        let state = node.state.read();
        Ok(basic_snapshot(&state, node.id))
    }

    pub fn posix_attributes(&self, path: &FsPath) -> FsResult<PosixFileAttributes> {
        self.ensure_open()?;
        self.require_view(AttributeView::Posix)?;
        let node = self.inner.existing(&self.base(), path, true)?;
        let state = node.state.read();
        Ok(posix_snapshot(&state, node.id))
    }

    pub fn dos_attributes(&self, path: &FsPath) -> FsResult<DosFileAttributes> {
        self.ensure_open()?;
        self.require_view(AttributeView::Dos)?;
        let node = self.inner.existing(&self.base(), path, true)?;
        let state = node.state.read();
        Ok(dos_snapshot(&state, node.id))
    }

    fn require_view(&self, view: AttributeView) -> FsResult<()> {
        if !self.inner.policy().supports_view(view) {
            return Err(FsError::unsupported_attribute(view.name()));
        }
        Ok(())
    }
}

impl std::fmt::Debug for DirectoryStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryStream")
            .field("path", &self.path)
            .field("node", &self.dir.id)
            .field("open", &self.is_open())
            .finish()
    }
}

/// Iterator returned by [`DirectoryStream::entries`]
pub struct Entries<'a> {
    stream: &'a DirectoryStream,
    pending: Option<std::vec::IntoIter<String>>,
}

impl Iterator for Entries<'_> {
    type Item = FsPath;

    fn next(&mut self) -> Option<FsPath> {
        if !self.stream.is_open() {
            return None;
        }
        let stream = self.stream;
        let pending = self
            .pending
            .get_or_insert_with(|| stream.snapshot().into_iter());
        for name in pending.by_ref() {
            let path = stream.path.child(&name);
            if stream.filter.as_ref().map_or(true, |accept| accept(&path)) {
                return Some(path);
            }
        }
        None
    }
}
