// Sandbox FS Gateway - File Operations
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Single-file and single-directory primitives: read, write, mkdir, ls, rename, stat.
// Every function takes ValidatedPath, so nothing here can be reached with a raw
// caller string. No locking: two writers to one file race like two processes.

use crate::error::{FsError, FsResult};
use crate::guard::ValidatedPath;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io;
use std::time::SystemTime;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    File,
    Directory,
}

/// One level of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: String,
    pub is_directory: bool,
}

/// Read-only metadata snapshot
#[derive(Debug, Clone)]
pub struct FileStat {
    pub size: u64,
    pub created: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub accessed: Option<DateTime<Utc>>,
    pub is_directory: bool,
    pub is_file: bool,
    pub permissions: String,
}

impl FileStat {
    fn from_metadata(meta: &std::fs::Metadata) -> Self {
        Self {
            size: meta.len(),
            created: meta.created().ok().map(to_utc),
            modified: meta.modified().ok().map(to_utc),
            accessed: meta.accessed().ok().map(to_utc),
            is_directory: meta.is_dir(),
            is_file: meta.is_file(),
            permissions: permission_bits(meta),
        }
    }

    /// `key: value` lines in a fixed order
    pub fn to_lines(&self) -> String {
        [
            format!("size: {}", self.size),
            format!("created: {}", format_timestamp(self.created)),
            format!("modified: {}", format_timestamp(self.modified)),
            format!("accessed: {}", format_timestamp(self.accessed)),
            format!("is_directory: {}", self.is_directory),
            format!("is_file: {}", self.is_file),
            format!("permissions: {}", self.permissions),
        ]
        .join("\n")
    }
}

// ============================================================================
// CORE OPERATIONS
// ============================================================================

/// Read a whole file as UTF-8 text
pub fn read(path: &ValidatedPath) -> FsResult<String> {
    let p = path.as_path();
    let meta = std::fs::metadata(p).map_err(|e| FsError::from_lookup(p, e))?;
    if meta.is_dir() {
        return Err(FsError::io(
            p,
            io::Error::new(io::ErrorKind::Other, "is a directory"),
        ));
    }

    let bytes = std::fs::read(p).map_err(|e| FsError::from_lookup(p, e))?;
    String::from_utf8(bytes).map_err(|e| {
        FsError::io(p, io::Error::new(io::ErrorKind::InvalidData, format!("not valid UTF-8: {}", e)))
    })
}

/// Create or fully overwrite a file. Missing parents are not created.
pub fn write(path: &ValidatedPath, content: &str) -> FsResult<()> {
    let p = path.as_path();
    std::fs::write(p, content).map_err(|e| FsError::io(p, e))?;
    log::debug!("wrote {} bytes to {}", content.len(), p.display());
    Ok(())
}

/// mkdir -p. Succeeds if the directory is already there.
pub fn create_dir(path: &ValidatedPath) -> FsResult<()> {
    let p = path.as_path();
    std::fs::create_dir_all(p).map_err(|e| FsError::io(p, e))
}

/// List one directory level, sorted by name
pub fn list(path: &ValidatedPath) -> FsResult<Vec<ListEntry>> {
    let p = path.as_path();
    let meta = std::fs::metadata(p).map_err(|e| FsError::from_lookup(p, e))?;
    if !meta.is_dir() {
        return Err(FsError::NotADirectory(p.to_path_buf()));
    }

    let mut entries = Vec::new();
    for item in std::fs::read_dir(p).map_err(|e| FsError::io(p, e))? {
        let item = item.map_err(|e| FsError::io(p, e))?;
        entries.push(ListEntry {
            name: item.file_name().to_string_lossy().to_string(),
            // follows symlinks: a link to a directory lists as a directory
            is_directory: item.path().is_dir(),
        });
    }

    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

/// Rename/move file or directory. Never overwrites.
pub fn rename(source: &ValidatedPath, destination: &ValidatedPath) -> FsResult<()> {
    let src = source.as_path();
    let dst = destination.as_path();

    std::fs::symlink_metadata(src).map_err(|e| FsError::from_lookup(src, e))?;

    match std::fs::symlink_metadata(dst) {
        Ok(_) => return Err(FsError::AlreadyExists(dst.to_path_buf())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(FsError::io(dst, e)),
    }

    std::fs::rename(src, dst).map_err(|e| FsError::io(src, e))?;
    log::debug!("moved {} -> {}", src.display(), dst.display());
    Ok(())
}

/// Get file/directory metadata
pub fn stat(path: &ValidatedPath) -> FsResult<FileStat> {
    let p = path.as_path();
    let meta = std::fs::metadata(p).map_err(|e| FsError::from_lookup(p, e))?;
    Ok(FileStat::from_metadata(&meta))
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

fn to_utc(t: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(t)
}

/// Format timestamp as human-readable UTC
pub fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "unavailable".to_string(),
    }
}

#[cfg(unix)]
fn permission_bits(meta: &std::fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    format!("{:03o}", meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn permission_bits(meta: &std::fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "readonly".to_string()
    } else {
        "readwrite".to_string()
    }
}

// ============================================================================
// TESTS
// ============================================================================
