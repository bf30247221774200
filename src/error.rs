// Sandbox FS Gateway - Error Taxonomy
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Typed failures raised by the guard, file ops, edit engine and tree walker.
// The tool dispatcher is the only place these become text.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub type FsResult<T> = std::result::Result<T, FsError>;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("Access denied - {reason}: {path}")]
    AccessDenied { path: PathBuf, reason: &'static str },

    #[error("Not found: {0}")]
    NotFound(PathBuf),

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Destination already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("Could not find exact match for edit: {0}")]
    EditNotFound(String),

    #[error("Edit text matches {count} locations, expected exactly one: {old_text}")]
    EditAmbiguous { old_text: String, count: usize },

    #[error("Invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Symlink cycle detected at {0}")]
    CycleDetected(PathBuf),
}

impl FsError {
    /// Stable short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            FsError::AccessDenied { .. } => "AccessDenied",
            FsError::NotFound(_) => "NotFound",
            FsError::NotADirectory(_) => "NotADirectory",
            FsError::AlreadyExists(_) => "AlreadyExists",
            FsError::EditNotFound(_) => "EditNotFound",
            FsError::EditAmbiguous { .. } => "EditAmbiguous",
            FsError::InvalidArguments { .. } => "InvalidArguments",
            FsError::UnknownTool(_) => "UnknownTool",
            FsError::Io { .. } => "IOError",
            FsError::CycleDetected(_) => "CycleDetected",
        }
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        FsError::Io { path: path.to_path_buf(), source }
    }

    /// Map an io error from a lookup-style call: NotFound stays NotFound, the rest is IOError
    pub fn from_lookup(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::NotFound => FsError::NotFound(path.to_path_buf()),
            _ => FsError::io(path, source),
        }
    }

    pub fn invalid(tool: &str, reason: impl Into<String>) -> Self {
        FsError::InvalidArguments { tool: tool.to_string(), reason: reason.into() }
    }
}
