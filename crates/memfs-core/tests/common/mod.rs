// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

#![allow(dead_code)]

use memfs_core::{FsConfig, FsPath, MemoryFileSystem};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Route engine logs to the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let layer = tracing_subscriber::fmt::layer().with_test_writer();
    // Another test in the same binary may have installed it already
    let _ = tracing_subscriber::registry().with(filter).with(layer).try_init();
}

pub fn posix_fs() -> MemoryFileSystem {
    init_tracing();
    MemoryFileSystem::new(FsConfig::posix()).expect("posix preset")
}

pub fn windows_fs() -> MemoryFileSystem {
    init_tracing();
    MemoryFileSystem::new(FsConfig::windows()).expect("windows preset")
}

pub fn p(fs: &MemoryFileSystem, text: &str) -> FsPath {
    fs.path(text).expect("valid path")
}

pub fn names(paths: impl IntoIterator<Item = FsPath>) -> Vec<String> {
    paths
        .into_iter()
        .map(|path| path.file_name().map(|n| n.to_string()).unwrap_or_default())
        .collect()
}
