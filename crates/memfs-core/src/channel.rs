// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Seekable byte channels over file content

use std::io::{self, SeekFrom};
use std::sync::Arc;

use crate::error::{FsError, FsResult};
use crate::filesystem::FsInner;
use crate::node::{NodeEntry, NodeKind};
use crate::path::FsPath;
use crate::resolver::Base;
use crate::types::{FileAttribute, OpenOptions};

/// Open handle on a regular file.
///
/// The content buffer lives on the node, so every channel over the same
/// node (including through hard links) observes the same bytes.
pub struct ByteChannel {
    inner: Arc<FsInner>,
    node: Arc<NodeEntry>,
    path: String,
    readable: bool,
    writable: bool,
    append: bool,
    position: u64,
    closed: bool,
    delete_on_close: Option<(Arc<NodeEntry>, String)>,
}

impl ByteChannel {
    pub(crate) fn open(
        inner: &Arc<FsInner>,
        base: &Base,
        path: &FsPath,
        options: &OpenOptions,
        attrs: &[FileAttribute],
    ) -> FsResult<Self> {
        let opts = options.normalized()?;
        inner.ensure_open()?;
        inner.check_path(path)?;
        let shown = path.to_string();
        let lookup = inner.resolve(base, path, !opts.nofollow_links)?;

        let node = match lookup.node {
            Some(_) if opts.create_new => {
                return Err(FsError::FileAlreadyExists { path: shown });
            }
            Some(node) => node,
            None if !(opts.create || opts.create_new) => {
                return Err(FsError::no_such_file(shown));
            }
            None => {
                let (Some(parent), Some(name)) = (&lookup.parent, &lookup.name) else {
                    return Err(FsError::no_such_file(shown));
                };
                let node = inner.create_file_at(parent, name, attrs, !opts.create_new, &shown)?;
                tracing::debug!(fs = %inner.id, path = %shown, node = node.id.as_u64(), "created file");
                node
            }
        };

        {
            let mut guard = node.state.write();
            let state = &mut *guard;
            match &mut state.kind {
                NodeKind::Directory { .. } => {
                    return Err(FsError::FileIsDirectory {
                        path: base.absolute_display(path),
                    });
                }
                NodeKind::Symlink { .. } => {
                    return Err(FsError::TooManyLevelsOfSymlinks { path: shown });
                }
                NodeKind::File { content } => {
                    if opts.truncate_existing && opts.write && content.len() > 0 {
                        content.truncate(0);
                        state.meta.last_modified_time = inner.now();
                    }
                }
            }
        }

        let delete_on_close = match (opts.delete_on_close, lookup.parent, lookup.name) {
            (true, Some(parent), Some(name)) => Some((parent, name.key)),
            _ => None,
        };

        tracing::trace!(fs = %inner.id, path = %shown, read = opts.read, write = opts.write, "opened channel");
        Ok(Self {
            inner: Arc::clone(inner),
            node,
            path: shown,
            readable: opts.read,
            writable: opts.write,
            append: opts.append,
            position: 0,
            closed: false,
            delete_on_close,
        })
    }

    /// Path the channel was opened with
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    fn ensure_open(&self) -> FsResult<()> {
        if self.closed {
            return Err(FsError::ClosedOrStaleHandle);
        }
        self.inner.ensure_open()
    }

    /// Read at the current position. Returns 0 at end of file.
    pub fn read(&mut self, buf: &mut [u8]) -> FsResult<usize> {
        self.ensure_open()?;
        if !self.readable {
            return Err(FsError::NonReadableChannel);
        }
        let mut guard = self.node.state.write();
        let state = &mut *guard;
        let NodeKind::File { content } = &state.kind else {
            unreachable!("channel bound to a non-file node");
        };
        let n = content.read_at(self.position, buf);
        self.position += n as u64;
        state.meta.last_access_time = self.inner.now();
        Ok(n)
    }

    /// Write at the current position, or at the end in append mode
    pub fn write(&mut self, buf: &[u8]) -> FsResult<usize> {
        self.ensure_open()?;
        if !self.writable {
            return Err(FsError::NonWritableChannel);
        }
        let mut guard = self.node.state.write();
        let state = &mut *guard;
        let NodeKind::File { content } = &mut state.kind else {
            unreachable!("channel bound to a non-file node");
        };
        if self.append {
            self.position = content.len();
        }
        let n = content.write_at(self.position, buf)?;
        self.position += n as u64;
        state.meta.last_modified_time = self.inner.now();
        Ok(n)
    }

    pub fn position(&self) -> FsResult<u64> {
        self.ensure_open()?;
        Ok(self.position)
    }

    /// Move the position; past the end is allowed and zero-fills on write
    pub fn set_position(&mut self, position: u64) -> FsResult<()> {
        self.ensure_open()?;
        self.position = position;
        Ok(())
    }

    pub fn size(&self) -> FsResult<u64> {
        self.ensure_open()?;
        let size = self.node.state.read().size();
        Ok(size)
    }

    /// Shrink the file to `size`; a larger size leaves it unchanged
    pub fn truncate(&mut self, size: u64) -> FsResult<()> {
        self.ensure_open()?;
        if !self.writable {
            return Err(FsError::NonWritableChannel);
        }
        let mut guard = self.node.state.write();
        let state = &mut *guard;
        let NodeKind::File { content } = &mut state.kind else {
            unreachable!("channel bound to a non-file node");
        };
        if size < content.len() {
            content.truncate(size);
            state.meta.last_modified_time = self.inner.now();
        }
        self.position = self.position.min(size);
        Ok(())
    }

    /// Idempotent. Applies `DELETE_ON_CLOSE` on the first call.
    pub fn close(&mut self) -> FsResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Some((parent, key)) = self.delete_on_close.take() {
            self.inner.unlink_if_same(&parent, &key, &self.node);
        }
        Ok(())
    }
}

impl Drop for ByteChannel {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(path = %self.path, error = %err, "failed to close channel");
        }
    }
}

impl std::fmt::Debug for ByteChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteChannel")
            .field("path", &self.path)
            .field("position", &self.position)
            .field("closed", &self.closed)
            .finish()
    }
}

impl io::Read for ByteChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        ByteChannel::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for ByteChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        ByteChannel::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.ensure_open().map_err(io::Error::from)
    }
}

impl io::Seek for ByteChannel {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(offset) => self.size()?.checked_add_signed(offset),
            SeekFrom::Current(offset) => self.position()?.checked_add_signed(offset),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
        })?;
        self.set_position(target)?;
        Ok(target)
    }
}
