// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Lock ordering for structural operations
//!
//! Rules every operation follows:
//! - An operation that holds two directory locks at once first takes the
//!   structural mutex. Moves and directory removal do this.
//! - Without the structural mutex, at most one directory lock is held, plus
//!   at most one non-directory node lock taken after it.
//! - Under the structural mutex, parents are locked before children and a
//!   pair of parents in ascending [`NodeId`] order.
//! - Node locks are not reentrant; no operation takes the same node twice.

use parking_lot::{Mutex, MutexGuard, RwLockWriteGuard};

use crate::node::{Node, NodeEntry};

pub(crate) struct LockManager {
    structure: Mutex<()>,
}

impl LockManager {
    pub(crate) fn new() -> Self {
        Self {
            structure: Mutex::new(()),
        }
    }

    pub(crate) fn structural(&self) -> MutexGuard<'_, ()> {
        self.structure.lock()
    }

    /// Write-lock two nodes in ascending id order. Returns the guards in
    /// argument order; the second is `None` when both name the same node.
    pub(crate) fn write_pair<'a>(
        a: &'a NodeEntry,
        b: &'a NodeEntry,
    ) -> (RwLockWriteGuard<'a, Node>, Option<RwLockWriteGuard<'a, Node>>) {
        if a.id == b.id {
            return (a.state.write(), None);
        }
        if a.id < b.id {
            let first = a.state.write();
            let second = b.state.write();
            (first, Some(second))
        } else {
            let second = b.state.write();
            let first = a.state.write();
            (first, Some(second))
        }
    }
}
