// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Core type definitions for memfs

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FsError, FsResult};

/// Identity of a filesystem instance. Paths only interoperate within one instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FsId(u64);

impl FsId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for FsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "memfs-{}", self.0)
    }
}

/// Internal node ID for filesystem nodes. Never reused within an instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Nanosecond-precision UTC instant used for all node timestamps
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileTime(DateTime<Utc>);

impl FileTime {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(at: DateTime<Utc>) -> Self {
        Self(at)
    }

    pub fn from_millis(millis: i64) -> FsResult<Self> {
        DateTime::<Utc>::from_timestamp_millis(millis)
            .map(Self)
            .ok_or_else(|| FsError::InvalidArgument(format!("timestamp out of range: {millis}ms")))
    }

    pub fn from_unix(secs: i64, nanos: u32) -> FsResult<Self> {
        DateTime::<Utc>::from_timestamp(secs, nanos)
            .map(Self)
            .ok_or_else(|| FsError::InvalidArgument(format!("timestamp out of range: {secs}.{nanos:09}")))
    }

    /// Parse an RFC 3339 instant such as `2019-02-27T12:37:03.123456789Z`
    pub fn parse_rfc3339(text: &str) -> FsResult<Self> {
        DateTime::parse_from_rfc3339(text)
            .map(|at| Self(at.with_timezone(&Utc)))
            .map_err(|e| FsError::InvalidArgument(format!("{text}: {e}")))
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    pub fn unix_nanos(&self) -> Option<i64> {
        self.0.timestamp_nanos_opt()
    }
}

impl From<DateTime<Utc>> for FileTime {
    fn from(at: DateTime<Utc>) -> Self {
        Self(at)
    }
}

impl fmt::Display for FileTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_rfc3339_opts(SecondsFormat::AutoSi, true))
    }
}

/// Owner identity of a node
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserPrincipal(String);

impl UserPrincipal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Group identity of a node
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupPrincipal(String);

impl GroupPrincipal {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One of the nine POSIX permission bits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PosixPermission {
    OwnerRead,
    OwnerWrite,
    OwnerExecute,
    GroupRead,
    GroupWrite,
    GroupExecute,
    OthersRead,
    OthersWrite,
    OthersExecute,
}

impl PosixPermission {
    pub const ALL: [PosixPermission; 9] = [
        PosixPermission::OwnerRead,
        PosixPermission::OwnerWrite,
        PosixPermission::OwnerExecute,
        PosixPermission::GroupRead,
        PosixPermission::GroupWrite,
        PosixPermission::GroupExecute,
        PosixPermission::OthersRead,
        PosixPermission::OthersWrite,
        PosixPermission::OthersExecute,
    ];

    fn bit(self) -> u16 {
        match self {
            PosixPermission::OwnerRead => 0o400,
            PosixPermission::OwnerWrite => 0o200,
            PosixPermission::OwnerExecute => 0o100,
            PosixPermission::GroupRead => 0o040,
            PosixPermission::GroupWrite => 0o020,
            PosixPermission::GroupExecute => 0o010,
            PosixPermission::OthersRead => 0o004,
            PosixPermission::OthersWrite => 0o002,
            PosixPermission::OthersExecute => 0o001,
        }
    }

    fn symbol(self) -> char {
        match self {
            PosixPermission::OwnerRead | PosixPermission::GroupRead | PosixPermission::OthersRead => 'r',
            PosixPermission::OwnerWrite
            | PosixPermission::GroupWrite
            | PosixPermission::OthersWrite => 'w',
            PosixPermission::OwnerExecute
            | PosixPermission::GroupExecute
            | PosixPermission::OthersExecute => 'x',
        }
    }
}

/// Set of POSIX permissions. A plain value: copies never alias stored state.
///
/// Text form is the nine-character `ls` notation, e.g. `rw-r--r--`.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PermissionSet(u16);

impl PermissionSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn from_mode(mode: u32) -> Self {
        Self((mode & 0o777) as u16)
    }

    pub fn mode(&self) -> u32 {
        u32::from(self.0)
    }

    pub fn contains(&self, permission: PosixPermission) -> bool {
        self.0 & permission.bit() != 0
    }

    pub fn insert(&mut self, permission: PosixPermission) {
        self.0 |= permission.bit();
    }

    pub fn remove(&mut self, permission: PosixPermission) {
        self.0 &= !permission.bit();
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = PosixPermission> + '_ {
        PosixPermission::ALL.into_iter().filter(move |p| self.contains(*p))
    }
}

impl FromIterator<PosixPermission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PosixPermission>>(iter: I) -> Self {
        let mut set = PermissionSet::empty();
        for permission in iter {
            set.insert(permission);
        }
        set
    }
}

impl FromStr for PermissionSet {
    type Err = FsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let chars: Vec<char> = s.chars().collect();
        if chars.len() != 9 {
            return Err(FsError::InvalidArgument(format!("invalid permission string: {s}")));
        }
        let mut set = PermissionSet::empty();
        for (permission, ch) in PosixPermission::ALL.into_iter().zip(chars) {
            if ch == permission.symbol() {
                set.insert(permission);
            } else if ch != '-' {
                return Err(FsError::InvalidArgument(format!("invalid permission string: {s}")));
            }
        }
        Ok(set)
    }
}

impl TryFrom<String> for PermissionSet {
    type Error = FsError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PermissionSet> for String {
    fn from(set: PermissionSet) -> Self {
        set.to_string()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for permission in PosixPermission::ALL {
            let ch = if self.contains(permission) {
                permission.symbol()
            } else {
                '-'
            };
            write!(f, "{ch}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PermissionSet({self})")
    }
}

/// DOS attribute flags (Windows flavor only)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct DosFlags {
    pub hidden: bool,
    pub archive: bool,
    pub system: bool,
    pub readonly: bool,
}

/// Node kind tag
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FileKind {
    Directory,
    RegularFile,
    SymbolicLink,
}

/// Named projections of node metadata
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AttributeView {
    Basic,
    Owner,
    Posix,
    Dos,
}

impl AttributeView {
    pub fn name(&self) -> &'static str {
        match self {
            AttributeView::Basic => "basic",
            AttributeView::Owner => "owner",
            AttributeView::Posix => "posix",
            AttributeView::Dos => "dos",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "basic" => Some(AttributeView::Basic),
            "owner" => Some(AttributeView::Owner),
            "posix" => Some(AttributeView::Posix),
            "dos" => Some(AttributeView::Dos),
            _ => None,
        }
    }
}

/// File open options
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpenOptions {
    pub read: bool,
    pub write: bool,
    pub append: bool,
    pub truncate_existing: bool,
    pub create: bool,
    pub create_new: bool,
    pub delete_on_close: bool,
    pub nofollow_links: bool,
}

impl OpenOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(mut self, yes: bool) -> Self {
        self.read = yes;
        self
    }

    pub fn write(mut self, yes: bool) -> Self {
        self.write = yes;
        self
    }

    pub fn append(mut self, yes: bool) -> Self {
        self.append = yes;
        self
    }

    pub fn truncate_existing(mut self, yes: bool) -> Self {
        self.truncate_existing = yes;
        self
    }

    pub fn create(mut self, yes: bool) -> Self {
        self.create = yes;
        self
    }

    pub fn create_new(mut self, yes: bool) -> Self {
        self.create_new = yes;
        self
    }

    pub fn delete_on_close(mut self, yes: bool) -> Self {
        self.delete_on_close = yes;
        self
    }

    pub fn nofollow_links(mut self, yes: bool) -> Self {
        self.nofollow_links = yes;
        self
    }

    /// Apply defaulting rules and reject contradictory combinations
    pub(crate) fn normalized(&self) -> FsResult<Self> {
        let mut opts = self.clone();
        if opts.append && opts.read {
            return Err(FsError::InvalidArgument("READ + APPEND not allowed".to_string()));
        }
        if opts.append && opts.truncate_existing {
            return Err(FsError::InvalidArgument(
                "APPEND + TRUNCATE_EXISTING not allowed".to_string(),
            ));
        }
        if opts.append {
            opts.write = true;
        }
        if !opts.read && !opts.write {
            opts.read = true;
        }
        Ok(opts)
    }
}

/// Options for copy operations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyOptions {
    pub replace_existing: bool,
    pub copy_attributes: bool,
    pub nofollow_links: bool,
}

/// Options for move operations. Moves are always atomic in memory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveOptions {
    pub replace_existing: bool,
    pub atomic_move: bool,
}

/// Typed value of a name-keyed attribute
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttributeValue {
    Bool(bool),
    Time(FileTime),
    Size(u64),
    FileKey(u64),
    User(UserPrincipal),
    Group(GroupPrincipal),
    Permissions(PermissionSet),
}

impl AttributeValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_time(&self) -> Option<FileTime> {
        match self {
            AttributeValue::Time(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_permissions(&self) -> Option<PermissionSet> {
        match self {
            AttributeValue::Permissions(v) => Some(*v),
            _ => None,
        }
    }
}

/// Attribute applied atomically while a node is created, e.g. `dos:hidden`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileAttribute {
    pub name: String,
    pub value: AttributeValue,
}

impl FileAttribute {
    pub fn new(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Snapshot of the `basic` view
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicFileAttributes {
    pub last_modified_time: FileTime,
    pub last_access_time: FileTime,
    pub creation_time: FileTime,
    pub kind: FileKind,
    pub size: u64,
    pub file_key: NodeId,
}

impl BasicFileAttributes {
    pub fn is_directory(&self) -> bool {
        self.kind == FileKind::Directory
    }

    pub fn is_regular_file(&self) -> bool {
        self.kind == FileKind::RegularFile
    }

    pub fn is_symbolic_link(&self) -> bool {
        self.kind == FileKind::SymbolicLink
    }
}

/// Snapshot of the `posix` view
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PosixFileAttributes {
    pub basic: BasicFileAttributes,
    pub owner: UserPrincipal,
    pub group: GroupPrincipal,
    pub permissions: PermissionSet,
}

/// Snapshot of the `dos` view
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DosFileAttributes {
    pub basic: BasicFileAttributes,
    pub flags: DosFlags,
}

impl DosFileAttributes {
    pub fn is_hidden(&self) -> bool {
        self.flags.hidden
    }

    pub fn is_archive(&self) -> bool {
        self.flags.archive
    }

    pub fn is_system(&self) -> bool {
        self.flags.system
    }

    pub fn is_read_only(&self) -> bool {
        self.flags.readonly
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_string_round_trip() {
        let set: PermissionSet = "rw-r-----".parse().unwrap();
        assert!(set.contains(PosixPermission::OwnerRead));
        assert!(set.contains(PosixPermission::OwnerWrite));
        assert!(set.contains(PosixPermission::GroupRead));
        assert!(!set.contains(PosixPermission::OthersRead));
        assert_eq!(set.mode(), 0o640);
        assert_eq!(set.to_string(), "rw-r-----");
        assert!("rw-".parse::<PermissionSet>().is_err());
        assert!("rw-r--r-q".parse::<PermissionSet>().is_err());
    }

    #[test]
    fn permission_set_is_a_value() {
        let mut original: PermissionSet =
            [PosixPermission::OwnerRead, PosixPermission::OwnerWrite].into_iter().collect();
        let copy = original;
        original.insert(PosixPermission::OthersExecute);
        assert_ne!(original, copy);
        assert_eq!(copy.len(), 2);
    }

    #[test]
    fn file_time_keeps_nanoseconds() {
        let t = FileTime::parse_rfc3339("2019-02-27T12:37:03.123456789Z").unwrap();
        assert_eq!(t.to_datetime().timestamp_subsec_nanos(), 123_456_789);
        assert_eq!(t.to_string(), "2019-02-27T12:37:03.123456789Z");
        assert_eq!(FileTime::from_unix(t.to_datetime().timestamp(), 123_456_789).unwrap(), t);
    }

    #[test]
    fn open_options_defaults_to_read() {
        let opts = OpenOptions::new().normalized().unwrap();
        assert!(opts.read);
        assert!(!opts.write);

        let opts = OpenOptions::new().append(true).normalized().unwrap();
        assert!(opts.write);
        assert!(!opts.read);

        assert!(OpenOptions::new().read(true).append(true).normalized().is_err());
        assert!(OpenOptions::new().append(true).truncate_existing(true).normalized().is_err());
    }

    #[test]
    fn fs_ids_are_distinct() {
        assert_ne!(FsId::next(), FsId::next());
    }
}
