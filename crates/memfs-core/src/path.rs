// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Immutable paths bound to one filesystem instance
//!
//! Every element carries two strings: the display text exactly as the caller
//! wrote it, and the canonical key produced by the instance's [`PathPolicy`].
//! Rendering uses display text; equality, hashing and ordering use keys.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::error::{FsError, FsResult};
use crate::policy::PathPolicy;
use crate::types::FsId;

/// One root or name element of a path
#[derive(Clone, Debug)]
pub(crate) struct PathElement {
    pub(crate) display: String,
    pub(crate) key: String,
}

impl PathElement {
    pub(crate) fn name(policy: &PathPolicy, display: &str) -> Self {
        Self {
            display: display.to_string(),
            key: policy.canonical_name(display),
        }
    }

    fn root(policy: &PathPolicy, display: String) -> Self {
        let key = policy.root_key(&display);
        Self { display, key }
    }

    pub(crate) fn is_dot(&self) -> bool {
        self.display == "."
    }

    pub(crate) fn is_dot_dot(&self) -> bool {
        self.display == ".."
    }
}

/// Per-instance state shared by every path of that instance
#[derive(Debug)]
pub(crate) struct PathContext {
    pub(crate) fs: FsId,
    pub(crate) policy: PathPolicy,
    working_root: Option<PathElement>,
    working_names: Vec<PathElement>,
}

impl PathContext {
    pub(crate) fn new(fs: FsId, policy: PathPolicy, working_directory: &str) -> FsResult<Self> {
        let (working_root, working_names) = parse_components(&policy, working_directory)?;
        if working_root.is_none() {
            return Err(FsError::InvalidConfig(format!(
                "working directory must be absolute: {working_directory}"
            )));
        }
        Ok(Self {
            fs,
            policy,
            working_root,
            working_names,
        })
    }
}

/// Tokenize `input` into an optional root and its name elements.
pub(crate) fn parse_components(
    policy: &PathPolicy,
    input: &str,
) -> FsResult<(Option<PathElement>, Vec<PathElement>)> {
    let (root, rest) = policy.split_root(input)?;
    let root = root.map(|display| PathElement::root(policy, display));
    let mut names = Vec::new();
    for name in rest.split(|c| policy.is_separator(c)).filter(|s| !s.is_empty()) {
        policy.validate_name(input, name)?;
        names.push(PathElement::name(policy, name));
    }
    Ok((root, names))
}

/// A parsed path. Cheap to clone; never mutated after construction.
#[derive(Clone)]
pub struct FsPath {
    ctx: Arc<PathContext>,
    root: Option<PathElement>,
    names: Vec<PathElement>,
}

impl FsPath {
    pub(crate) fn parse(ctx: &Arc<PathContext>, input: &str) -> FsResult<Self> {
        let (root, names) = parse_components(&ctx.policy, input)?;
        Ok(Self {
            ctx: Arc::clone(ctx),
            root,
            names,
        })
    }

    fn with_parts(&self, root: Option<PathElement>, names: Vec<PathElement>) -> Self {
        Self {
            ctx: Arc::clone(&self.ctx),
            root,
            names,
        }
    }

    pub(crate) fn root_element(&self) -> Option<&PathElement> {
        self.root.as_ref()
    }

    pub(crate) fn elements(&self) -> &[PathElement] {
        &self.names
    }

    /// Path of an entry named `display` inside this path
    pub(crate) fn child(&self, display: &str) -> Self {
        let mut names = self.names.clone();
        names.push(PathElement::name(&self.ctx.policy, display));
        self.with_parts(self.root.clone(), names)
    }

    /// Instance this path belongs to
    pub fn fs_id(&self) -> FsId {
        self.ctx.fs
    }

    pub fn policy(&self) -> PathPolicy {
        self.ctx.policy
    }

    pub fn is_absolute(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<FsPath> {
        self.root.as_ref().map(|r| self.with_parts(Some(r.clone()), Vec::new()))
    }

    pub fn parent(&self) -> Option<FsPath> {
        match self.names.len() {
            0 => None,
            1 if self.root.is_none() => None,
            n => Some(self.with_parts(self.root.clone(), self.names[..n - 1].to_vec())),
        }
    }

    pub fn file_name(&self) -> Option<FsPath> {
        self.names.last().map(|n| self.with_parts(None, vec![n.clone()]))
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    pub fn name(&self, index: usize) -> Option<FsPath> {
        self.names.get(index).map(|n| self.with_parts(None, vec![n.clone()]))
    }

    /// Name elements as single-element relative paths
    pub fn iter(&self) -> impl Iterator<Item = FsPath> + '_ {
        self.names.iter().map(move |n| self.with_parts(None, vec![n.clone()]))
    }

    pub fn resolve(&self, other: &str) -> FsResult<FsPath> {
        let other = FsPath::parse(&self.ctx, other)?;
        self.resolve_path(&other)
    }

    pub fn resolve_path(&self, other: &FsPath) -> FsResult<FsPath> {
        self.check_same_fs(other)?;
        if other.is_absolute() {
            return Ok(other.clone());
        }
        let mut names = self.names.clone();
        names.extend(other.names.iter().cloned());
        Ok(self.with_parts(self.root.clone(), names))
    }

    pub fn resolve_sibling(&self, other: &str) -> FsResult<FsPath> {
        let other = FsPath::parse(&self.ctx, other)?;
        match self.parent() {
            Some(parent) => parent.resolve_path(&other),
            None => Ok(other),
        }
    }

    /// Remove `.` elements and fold `..` into the preceding name
    pub fn normalize(&self) -> FsPath {
        let mut names: Vec<PathElement> = Vec::with_capacity(self.names.len());
        for name in &self.names {
            if name.is_dot() {
                continue;
            }
            if name.is_dot_dot() {
                if names.last().is_some_and(|last| !last.is_dot_dot()) {
                    names.pop();
                    continue;
                }
                if names.is_empty() && self.root.is_some() {
                    continue;
                }
            }
            names.push(name.clone());
        }
        self.with_parts(self.root.clone(), names)
    }

    /// Relative path that leads from `self` to `other`
    pub fn relativize(&self, other: &FsPath) -> FsResult<FsPath> {
        self.check_same_fs(other)?;
        if !roots_match(&self.root, &other.root) {
            return Err(FsError::InvalidArgument(format!(
                "cannot relativize {other} against {self}"
            )));
        }
        let common = self
            .names
            .iter()
            .zip(&other.names)
            .take_while(|(a, b)| a.key == b.key)
            .count();
        let mut names: Vec<PathElement> = (common..self.names.len())
            .map(|_| PathElement::name(&self.ctx.policy, ".."))
            .collect();
        names.extend(other.names[common..].iter().cloned());
        Ok(self.with_parts(None, names))
    }

    pub fn starts_with(&self, other: &FsPath) -> bool {
        if self.ctx.fs != other.ctx.fs || !roots_match(&self.root, &other.root) {
            return false;
        }
        other.names.len() <= self.names.len()
            && self.names.iter().zip(&other.names).all(|(a, b)| a.key == b.key)
    }

    pub fn starts_with_str(&self, other: &str) -> bool {
        FsPath::parse(&self.ctx, other).is_ok_and(|other| self.starts_with(&other))
    }

    pub fn ends_with(&self, other: &FsPath) -> bool {
        if self.ctx.fs != other.ctx.fs {
            return false;
        }
        if other.is_absolute() {
            return self == other;
        }
        if other.names.is_empty() {
            return self.root.is_none() && self.names.is_empty();
        }
        other.names.len() <= self.names.len()
            && self
                .names
                .iter()
                .rev()
                .zip(other.names.iter().rev())
                .all(|(a, b)| a.key == b.key)
    }

    pub fn ends_with_str(&self, other: &str) -> bool {
        FsPath::parse(&self.ctx, other).is_ok_and(|other| self.ends_with(&other))
    }

    /// Resolve against the instance's working directory
    pub fn to_absolute(&self) -> FsPath {
        if self.is_absolute() {
            return self.clone();
        }
        let mut names = self.ctx.working_names.clone();
        names.extend(self.names.iter().cloned());
        self.with_parts(self.ctx.working_root.clone(), names)
    }

    fn check_same_fs(&self, other: &FsPath) -> FsResult<()> {
        if self.ctx.fs != other.ctx.fs {
            return Err(FsError::ProviderMismatch);
        }
        Ok(())
    }
}

fn roots_match(a: &Option<PathElement>, b: &Option<PathElement>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.key == b.key,
        _ => false,
    }
}

impl PartialEq for FsPath {
    fn eq(&self, other: &Self) -> bool {
        self.ctx.fs == other.ctx.fs
            && roots_match(&self.root, &other.root)
            && self.names.len() == other.names.len()
            && self.names.iter().zip(&other.names).all(|(a, b)| a.key == b.key)
    }
}

impl Eq for FsPath {}

impl Hash for FsPath {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ctx.fs.hash(state);
        self.root.as_ref().map(|r| r.key.as_str()).hash(state);
        for name in &self.names {
            name.key.hash(state);
        }
    }
}

impl Ord for FsPath {
    fn cmp(&self, other: &Self) -> Ordering {
        let root = |p: &FsPath| p.root.as_ref().map(|r| r.key.clone());
        root(self)
            .cmp(&root(other))
            .then_with(|| {
                self.names
                    .iter()
                    .map(|n| n.key.as_str())
                    .cmp(other.names.iter().map(|n| n.key.as_str()))
            })
            .then_with(|| self.ctx.fs.cmp(&other.ctx.fs))
    }
}

impl PartialOrd for FsPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(root) = &self.root {
            f.write_str(&root.display)?;
        }
        let sep = self.ctx.policy.separator();
        for (i, name) in self.names.iter().enumerate() {
            if i > 0 {
                write!(f, "{sep}")?;
            }
            f.write_str(&name.display)?;
        }
        Ok(())
    }
}

impl fmt::Debug for FsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FsPath({}, {:?})", self.ctx.fs, self.to_string())
    }
}
