// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! In-memory virtual filesystem engine
//!
//! `memfs-core` emulates POSIX and Windows filesystem semantics entirely in
//! memory: platform path rules, a node graph of directories, files and
//! symbolic links, typed attribute views, byte channels, and secure
//! directory streams whose name-relative operations are bound to a
//! directory's identity rather than its path.

pub mod attributes;
pub mod channel;
pub mod clock;
pub mod config;
mod content;
mod copy;
pub mod error;
pub mod filesystem;
mod locking;
mod node;
pub mod path;
pub mod policy;
pub mod registry;
mod resolver;
mod store;
pub mod stream;
pub mod types;

pub use attributes::{
    BasicFileAttributeView, DosFileAttributeView, OwnerFileAttributeView, PosixFileAttributeView,
};
pub use channel::ByteChannel;
pub use clock::{Clock, SystemClock};
pub use config::FsConfig;
pub use error::{FsError, FsResult};
pub use filesystem::MemoryFileSystem;
pub use path::FsPath;
pub use policy::{CaseSensitivity, Flavor, PathPolicy};
pub use registry::FsRegistry;
pub use stream::{DirectoryStream, Entries};
pub use types::{
    AttributeValue, AttributeView, BasicFileAttributes, CopyOptions, DosFileAttributes, DosFlags,
    FileAttribute, FileKind, FileTime, FsId, GroupPrincipal, MoveOptions, NodeId, OpenOptions,
    PermissionSet, PosixFileAttributes, PosixPermission, UserPrincipal,
};
