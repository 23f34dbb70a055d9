// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

//! Error types for memfs

use std::io;

/// Core filesystem error type
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FsError {
    #[error("{input}: invalid path: {reason}")]
    InvalidPath { input: String, reason: &'static str },
    #[error("{path}: no such file or directory")]
    NoSuchFile { path: String },
    #[error("{path}: not a directory")]
    NotDirectory { path: String },
    #[error("{path}: file already exists")]
    FileAlreadyExists { path: String },
    #[error("{path}: directory not empty")]
    DirectoryNotEmpty { path: String },
    #[error("{path}: is a directory")]
    FileIsDirectory { path: String },
    #[error("{path}: too many levels of symbolic links")]
    TooManyLevelsOfSymlinks { path: String },
    #[error("{path}: not a symbolic link")]
    NotLink { path: String },
    #[error("{path}: access denied: {reason}")]
    AccessDenied { path: String, reason: &'static str },
    #[error("handle is closed or its directory was removed")]
    ClosedOrStaleHandle,
    #[error("directory stream is closed")]
    StreamClosed,
    #[error("attribute not supported: {name}")]
    UnsupportedAttribute { name: String },
    #[error("invalid value for attribute {name}")]
    InvalidAttributeValue { name: String },
    #[error("channel is not open for reading")]
    NonReadableChannel,
    #[error("channel is not open for writing")]
    NonWritableChannel,
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
    #[error("path belongs to a different filesystem instance")]
    ProviderMismatch,
    #[error("filesystem is closed")]
    FileSystemClosed,
    #[error("filesystem already exists: {name}")]
    FileSystemAlreadyExists { name: String },
    #[error("filesystem not found: {name}")]
    FileSystemNotFound { name: String },
}

impl FsError {
    /// The path the failing operation was addressed to, if the error carries one.
    pub fn path(&self) -> Option<&str> {
        match self {
            FsError::NoSuchFile { path }
            | FsError::NotDirectory { path }
            | FsError::FileAlreadyExists { path }
            | FsError::DirectoryNotEmpty { path }
            | FsError::FileIsDirectory { path }
            | FsError::TooManyLevelsOfSymlinks { path }
            | FsError::NotLink { path }
            | FsError::AccessDenied { path, .. } => Some(path),
            FsError::InvalidPath { input, .. } => Some(input),
            _ => None,
        }
    }

    pub(crate) fn no_such_file(path: impl Into<String>) -> Self {
        FsError::NoSuchFile { path: path.into() }
    }

    pub(crate) fn unsupported_attribute(name: impl Into<String>) -> Self {
        FsError::UnsupportedAttribute { name: name.into() }
    }

    pub(crate) fn invalid_value(name: impl Into<String>) -> Self {
        FsError::InvalidAttributeValue { name: name.into() }
    }
}

impl From<FsError> for io::Error {
    fn from(err: FsError) -> Self {
        let kind = match &err {
            FsError::NoSuchFile { .. } | FsError::FileSystemNotFound { .. } => {
                io::ErrorKind::NotFound
            }
            FsError::FileAlreadyExists { .. } | FsError::FileSystemAlreadyExists { .. } => {
                io::ErrorKind::AlreadyExists
            }
            FsError::AccessDenied { .. } => io::ErrorKind::PermissionDenied,
            FsError::InvalidPath { .. }
            | FsError::InvalidArgument(_)
            | FsError::InvalidAttributeValue { .. }
            | FsError::InvalidConfig(_) => io::ErrorKind::InvalidInput,
            FsError::UnsupportedAttribute { .. } => io::ErrorKind::Unsupported,
            _ => io::ErrorKind::Other,
        };
        io::Error::new(kind, err)
    }
}

pub type FsResult<T> = Result<T, FsError>;
