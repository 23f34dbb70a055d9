// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Named instances owned by the caller

use std::collections::HashMap;

use parking_lot::RwLock;
use serde_json::Value as J;

use crate::config::FsConfig;
use crate::error::{FsError, FsResult};
use crate::filesystem::MemoryFileSystem;

/// Registry of filesystem instances keyed by name
#[derive(Default)]
pub struct FsRegistry {
    instances: RwLock<HashMap<String, MemoryFileSystem>>,
}

impl FsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&self, name: &str, config: FsConfig) -> FsResult<MemoryFileSystem> {
        let mut instances = self.instances.write();
        if instances.contains_key(name) {
            return Err(FsError::FileSystemAlreadyExists {
                name: name.to_string(),
            });
        }
        let fs = MemoryFileSystem::new(config)?;
        instances.insert(name.to_string(), fs.clone());
        tracing::info!(name, fs = %fs.id(), "registered filesystem");
        Ok(fs)
    }

    /// Create from a JSON environment map, see [`FsConfig::from_environment`]
    pub fn create_from_environment(&self, name: &str, env: &J) -> FsResult<MemoryFileSystem> {
        let config = FsConfig::from_environment(env)?;
        self.create(name, config)
    }

    pub fn get(&self, name: &str) -> FsResult<MemoryFileSystem> {
        self.instances
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::FileSystemNotFound {
                name: name.to_string(),
            })
    }

    /// Unregister and close an instance
    pub fn remove(&self, name: &str) -> FsResult<()> {
        let fs = self
            .instances
            .write()
            .remove(name)
            .ok_or_else(|| FsError::FileSystemNotFound {
                name: name.to_string(),
            })?;
        fs.close();
        tracing::info!(name, fs = %fs.id(), "removed filesystem");
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.instances.read().keys().cloned().collect();
        names.sort();
        names
    }
}
