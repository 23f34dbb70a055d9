// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Node metadata, name-keyed attribute access and typed attribute views
//!
//! Attribute names have the form `view:attribute`; a bare attribute name
//! addresses the `basic` view. Only the views the instance's policy supports
//! are reachable. Everything handed out is a value snapshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::filesystem::FsInner;
use crate::node::{Node, NodeEntry};
use crate::path::FsPath;
use crate::policy::PathPolicy;
use crate::resolver::Base;
use crate::types::{
    AttributeValue, AttributeView, BasicFileAttributes, DosFileAttributes, DosFlags, FileAttribute,
    FileKind, FileTime, GroupPrincipal, NodeId, PermissionSet, PosixFileAttributes, UserPrincipal,
};

/// Complete metadata record stored on every node
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Metadata {
    pub(crate) creation_time: FileTime,
    pub(crate) last_modified_time: FileTime,
    pub(crate) last_access_time: FileTime,
    pub(crate) owner: UserPrincipal,
    pub(crate) group: GroupPrincipal,
    pub(crate) permissions: PermissionSet,
    pub(crate) dos: DosFlags,
}

#[cfg(test)]
impl Metadata {
    pub(crate) fn for_tests() -> Self {
        AttributeDefaults::from_config(&FsConfig::posix()).metadata(FileKind::Directory, FileTime::now())
    }
}

/// Metadata given to nodes created without `COPY_ATTRIBUTES`
#[derive(Clone, Debug)]
pub(crate) struct AttributeDefaults {
    owner: UserPrincipal,
    group: GroupPrincipal,
    file_permissions: PermissionSet,
    directory_permissions: PermissionSet,
}

impl AttributeDefaults {
    pub(crate) fn from_config(config: &FsConfig) -> Self {
        Self {
            owner: UserPrincipal::new(config.default_owner.clone()),
            group: GroupPrincipal::new(config.default_group.clone()),
            file_permissions: config.default_file_permissions,
            directory_permissions: config.default_directory_permissions,
        }
    }

    pub(crate) fn metadata(&self, kind: FileKind, now: FileTime) -> Metadata {
        let permissions = match kind {
            FileKind::Directory => self.directory_permissions,
            FileKind::RegularFile => self.file_permissions,
            FileKind::SymbolicLink => PermissionSet::from_mode(0o777),
        };
        Metadata {
            creation_time: now,
            last_modified_time: now,
            last_access_time: now,
            owner: self.owner.clone(),
            group: self.group.clone(),
            permissions,
            dos: DosFlags::default(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Attr {
    LastModifiedTime,
    LastAccessTime,
    CreationTime,
    Size,
    IsRegularFile,
    IsDirectory,
    IsSymbolicLink,
    IsOther,
    FileKey,
    Owner,
    Group,
    Permissions,
    Hidden,
    Archive,
    System,
    ReadOnly,
}

const BASIC_ATTRS: &[Attr] = &[
    Attr::LastModifiedTime,
    Attr::LastAccessTime,
    Attr::CreationTime,
    Attr::Size,
    Attr::IsRegularFile,
    Attr::IsDirectory,
    Attr::IsSymbolicLink,
    Attr::IsOther,
    Attr::FileKey,
];

impl Attr {
    fn name(self) -> &'static str {
        match self {
            Attr::LastModifiedTime => "lastModifiedTime",
            Attr::LastAccessTime => "lastAccessTime",
            Attr::CreationTime => "creationTime",
            Attr::Size => "size",
            Attr::IsRegularFile => "isRegularFile",
            Attr::IsDirectory => "isDirectory",
            Attr::IsSymbolicLink => "isSymbolicLink",
            Attr::IsOther => "isOther",
            Attr::FileKey => "fileKey",
            Attr::Owner => "owner",
            Attr::Group => "group",
            Attr::Permissions => "permissions",
            Attr::Hidden => "hidden",
            Attr::Archive => "archive",
            Attr::System => "system",
            Attr::ReadOnly => "readonly",
        }
    }

    fn read_only(self) -> bool {
        BASIC_ATTRS.contains(&self)
            && !matches!(
                self,
                Attr::LastModifiedTime | Attr::LastAccessTime | Attr::CreationTime
            )
    }

    fn members(view: AttributeView) -> Vec<Attr> {
        let extra: &[Attr] = match view {
            AttributeView::Basic => &[],
            AttributeView::Owner => return vec![Attr::Owner],
            AttributeView::Posix => &[Attr::Owner, Attr::Group, Attr::Permissions],
            AttributeView::Dos => &[Attr::Hidden, Attr::Archive, Attr::System, Attr::ReadOnly],
        };
        BASIC_ATTRS.iter().chain(extra).copied().collect()
    }

    fn lookup(view: AttributeView, name: &str) -> Option<Attr> {
        Attr::members(view).into_iter().find(|a| a.name() == name)
    }
}

fn parse_view(policy: &PathPolicy, full_name: &str, view: &str) -> FsResult<AttributeView> {
    AttributeView::from_name(view)
        .filter(|v| policy.supports_view(*v))
        .ok_or_else(|| FsError::unsupported_attribute(full_name))
}

fn parse_name(policy: &PathPolicy, name: &str) -> FsResult<Attr> {
    let (view, attr) = name.split_once(':').unwrap_or(("basic", name));
    let view = parse_view(policy, name, view)?;
    Attr::lookup(view, attr).ok_or_else(|| FsError::unsupported_attribute(name))
}

fn value_of(node: &Node, id: NodeId, attr: Attr) -> AttributeValue {
    let meta = &node.meta;
    let kind = node.file_kind();
    match attr {
        Attr::LastModifiedTime => AttributeValue::Time(meta.last_modified_time),
        Attr::LastAccessTime => AttributeValue::Time(meta.last_access_time),
        Attr::CreationTime => AttributeValue::Time(meta.creation_time),
        Attr::Size => AttributeValue::Size(node.size()),
        Attr::IsRegularFile => AttributeValue::Bool(kind == FileKind::RegularFile),
        Attr::IsDirectory => AttributeValue::Bool(kind == FileKind::Directory),
        Attr::IsSymbolicLink => AttributeValue::Bool(kind == FileKind::SymbolicLink),
        Attr::IsOther => AttributeValue::Bool(false),
        Attr::FileKey => AttributeValue::FileKey(id.as_u64()),
        Attr::Owner => AttributeValue::User(meta.owner.clone()),
        Attr::Group => AttributeValue::Group(meta.group.clone()),
        Attr::Permissions => AttributeValue::Permissions(meta.permissions),
        Attr::Hidden => AttributeValue::Bool(meta.dos.hidden),
        Attr::Archive => AttributeValue::Bool(meta.dos.archive),
        Attr::System => AttributeValue::Bool(meta.dos.system),
        Attr::ReadOnly => AttributeValue::Bool(meta.dos.readonly),
    }
}

fn store_value(meta: &mut Metadata, attr: Attr, name: &str, value: &AttributeValue) -> FsResult<()> {
    if attr.read_only() {
        return Err(FsError::InvalidArgument(format!("attribute {name} is read-only")));
    }
    let invalid = || FsError::invalid_value(name);
    match attr {
        Attr::LastModifiedTime => meta.last_modified_time = value.as_time().ok_or_else(invalid)?,
        Attr::LastAccessTime => meta.last_access_time = value.as_time().ok_or_else(invalid)?,
        Attr::CreationTime => meta.creation_time = value.as_time().ok_or_else(invalid)?,
        Attr::Owner => match value {
            AttributeValue::User(user) => meta.owner = user.clone(),
            _ => return Err(invalid()),
        },
        Attr::Group => match value {
            AttributeValue::Group(group) => meta.group = group.clone(),
            _ => return Err(invalid()),
        },
        Attr::Permissions => meta.permissions = value.as_permissions().ok_or_else(invalid)?,
        Attr::Hidden => meta.dos.hidden = value.as_bool().ok_or_else(invalid)?,
        Attr::Archive => meta.dos.archive = value.as_bool().ok_or_else(invalid)?,
        Attr::System => meta.dos.system = value.as_bool().ok_or_else(invalid)?,
        Attr::ReadOnly => meta.dos.readonly = value.as_bool().ok_or_else(invalid)?,
        Attr::Size
        | Attr::IsRegularFile
        | Attr::IsDirectory
        | Attr::IsSymbolicLink
        | Attr::IsOther
        | Attr::FileKey => unreachable!("read-only attributes are rejected above"),
    }
    Ok(())
}

/// Apply creation-time attributes to a metadata record that is not yet shared.
pub(crate) fn apply_initial(
    policy: &PathPolicy,
    meta: &mut Metadata,
    attrs: &[FileAttribute],
) -> FsResult<()> {
    for attr in attrs {
        let key = parse_name(policy, &attr.name)?;
        store_value(meta, key, &attr.name, &attr.value)?;
    }
    Ok(())
}

pub(crate) fn get_named(
    policy: &PathPolicy,
    node: &Node,
    id: NodeId,
    name: &str,
) -> FsResult<AttributeValue> {
    let attr = parse_name(policy, name)?;
    Ok(value_of(node, id, attr))
}

pub(crate) fn set_named(
    policy: &PathPolicy,
    node: &mut Node,
    name: &str,
    value: &AttributeValue,
) -> FsResult<()> {
    let attr = parse_name(policy, name)?;
    store_value(&mut node.meta, attr, name, value)
}

/// Bulk read for `view:*`, `view:a,b` or a bare `a,b` list of basic names.
pub(crate) fn read_named(
    policy: &PathPolicy,
    node: &Node,
    id: NodeId,
    selector: &str,
) -> FsResult<BTreeMap<String, AttributeValue>> {
    let (view, list) = selector.split_once(':').unwrap_or(("basic", selector));
    let view = parse_view(policy, selector, view)?;
    let mut out = BTreeMap::new();
    for requested in list.split(',').map(str::trim) {
        if requested == "*" {
            for attr in Attr::members(view) {
                out.insert(attr.name().to_string(), value_of(node, id, attr));
            }
            continue;
        }
        let attr = Attr::lookup(view, requested)
            .ok_or_else(|| FsError::unsupported_attribute(format!("{}:{requested}", view.name())))?;
        out.insert(attr.name().to_string(), value_of(node, id, attr));
    }
    Ok(out)
}

pub(crate) fn basic_snapshot(node: &Node, id: NodeId) -> BasicFileAttributes {
    BasicFileAttributes {
        last_modified_time: node.meta.last_modified_time,
        last_access_time: node.meta.last_access_time,
        creation_time: node.meta.creation_time,
        kind: node.file_kind(),
        size: node.size(),
        file_key: id,
    }
}

pub(crate) fn posix_snapshot(node: &Node, id: NodeId) -> PosixFileAttributes {
    PosixFileAttributes {
        basic: basic_snapshot(node, id),
        owner: node.meta.owner.clone(),
        group: node.meta.group.clone(),
        permissions: node.meta.permissions,
    }
}

pub(crate) fn dos_snapshot(node: &Node, id: NodeId) -> DosFileAttributes {
    DosFileAttributes {
        basic: basic_snapshot(node, id),
        flags: node.meta.dos,
    }
}

/// Set any subset of the three timestamps at full precision
pub(crate) fn set_times(
    node: &mut Node,
    last_modified: Option<FileTime>,
    last_access: Option<FileTime>,
    creation: Option<FileTime>,
) {
    if let Some(t) = last_modified {
        node.meta.last_modified_time = t;
    }
    if let Some(t) = last_access {
        node.meta.last_access_time = t;
    }
    if let Some(t) = creation {
        node.meta.creation_time = t;
    }
}

/// Where a view finds its node on each call
#[derive(Clone)]
struct ViewTarget {
    inner: Arc<FsInner>,
    base: Base,
    path: FsPath,
    follow_links: bool,
}

impl ViewTarget {
    fn node(&self) -> FsResult<Arc<NodeEntry>> {
        self.inner.existing(&self.base, &self.path, self.follow_links)
    }
}

macro_rules! view_common {
    ($view:ident, $name:literal) => {
        impl $view {
            pub(crate) fn new(inner: Arc<FsInner>, base: Base, path: FsPath) -> Self {
                Self {
                    target: ViewTarget {
                        inner,
                        base,
                        path,
                        follow_links: true,
                    },
                }
            }

            /// Operate on a final symbolic link itself
            pub fn nofollow_links(mut self) -> Self {
                self.target.follow_links = false;
                self
            }

            pub fn name(&self) -> &'static str {
                $name
            }

            pub fn path(&self) -> &FsPath {
                &self.target.path
            }
        }
    };
}

/// Times, kind and size. Always available.
#[derive(Clone)]
pub struct BasicFileAttributeView {
    target: ViewTarget,
}

view_common!(BasicFileAttributeView, "basic");

impl BasicFileAttributeView {
    pub fn read_attributes(&self) -> FsResult<BasicFileAttributes> {
        let node = self.target.node()?;
        let state = node.state.read();
        Ok(basic_snapshot(&state, node.id))
    }

    /// `None` leaves a timestamp unchanged
    pub fn set_times(
        &self,
        last_modified: Option<FileTime>,
        last_access: Option<FileTime>,
        creation: Option<FileTime>,
    ) -> FsResult<()> {
        let node = self.target.node()?;
        set_times(&mut node.state.write(), last_modified, last_access, creation);
        Ok(())
    }
}

/// File owner. Always available.
#[derive(Clone)]
pub struct OwnerFileAttributeView {
    target: ViewTarget,
}

view_common!(OwnerFileAttributeView, "owner");

impl OwnerFileAttributeView {
    pub fn get_owner(&self) -> FsResult<UserPrincipal> {
        let node = self.target.node()?;
        let owner = node.state.read().meta.owner.clone();
        Ok(owner)
    }

    pub fn set_owner(&self, owner: UserPrincipal) -> FsResult<()> {
        let node = self.target.node()?;
        node.state.write().meta.owner = owner;
        Ok(())
    }
}

/// Owner, group and permission bits. POSIX flavor only.
#[derive(Clone)]
pub struct PosixFileAttributeView {
    target: ViewTarget,
}

view_common!(PosixFileAttributeView, "posix");

impl PosixFileAttributeView {
    pub fn read_attributes(&self) -> FsResult<PosixFileAttributes> {
        let node = self.target.node()?;
        let state = node.state.read();
        Ok(posix_snapshot(&state, node.id))
    }

    pub fn set_times(
        &self,
        last_modified: Option<FileTime>,
        last_access: Option<FileTime>,
        creation: Option<FileTime>,
    ) -> FsResult<()> {
        let node = self.target.node()?;
        set_times(&mut node.state.write(), last_modified, last_access, creation);
        Ok(())
    }

    pub fn get_owner(&self) -> FsResult<UserPrincipal> {
        let node = self.target.node()?;
        let owner = node.state.read().meta.owner.clone();
        Ok(owner)
    }

    pub fn set_owner(&self, owner: UserPrincipal) -> FsResult<()> {
        let node = self.target.node()?;
        node.state.write().meta.owner = owner;
        Ok(())
    }

    pub fn set_group(&self, group: GroupPrincipal) -> FsResult<()> {
        let node = self.target.node()?;
        node.state.write().meta.group = group;
        Ok(())
    }

    pub fn set_permissions(&self, permissions: PermissionSet) -> FsResult<()> {
        let node = self.target.node()?;
        node.state.write().meta.permissions = permissions;
        Ok(())
    }
}

/// DOS flags. Windows flavor only.
#[derive(Clone)]
pub struct DosFileAttributeView {
    target: ViewTarget,
}

view_common!(DosFileAttributeView, "dos");

impl DosFileAttributeView {
    pub fn read_attributes(&self) -> FsResult<DosFileAttributes> {
        let node = self.target.node()?;
        let state = node.state.read();
        Ok(dos_snapshot(&state, node.id))
    }

    pub fn set_times(
        &self,
        last_modified: Option<FileTime>,
        last_access: Option<FileTime>,
        creation: Option<FileTime>,
    ) -> FsResult<()> {
        let node = self.target.node()?;
        set_times(&mut node.state.write(), last_modified, last_access, creation);
        Ok(())
    }

    pub fn set_hidden(&self, value: bool) -> FsResult<()> {
        self.update(|flags| flags.hidden = value)
    }

    pub fn set_archive(&self, value: bool) -> FsResult<()> {
        self.update(|flags| flags.archive = value)
    }

    pub fn set_system(&self, value: bool) -> FsResult<()> {
        self.update(|flags| flags.system = value)
    }

    pub fn set_read_only(&self, value: bool) -> FsResult<()> {
        self.update(|flags| flags.readonly = value)
    }

    fn update(&self, apply: impl FnOnce(&mut DosFlags)) -> FsResult<()> {
        let node = self.target.node()?;
        apply(&mut node.state.write().meta.dos);
        Ok(())
    }
}
