// Sandbox FS Gateway - Tree Walker
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Two walks over a validated directory:
// - build_tree: fully materialized nested listing, every child directory re-validated
// - search: case-insensitive name match with regex exclusions, depth-first, sorted

use crate::error::{FsError, FsResult};
use crate::fs::{self, FileType};
use crate::guard::{PathGuard, ValidatedPath};
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A node of the directory tree. Directories always carry `children`
/// (possibly empty), files never do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: FileType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeEntry>>,
}

impl TreeEntry {
    fn file(name: String) -> Self {
        Self { name, kind: FileType::File, children: None }
    }

    fn directory(name: String, children: Vec<TreeEntry>) -> Self {
        Self { name, kind: FileType::Directory, children: Some(children) }
    }
}

// ============================================================================
// TREE
// ============================================================================

/// Recursively materialize the tree under `root`
pub fn build_tree(guard: &PathGuard, root: &ValidatedPath) -> FsResult<TreeEntry> {
    let name = root
        .as_path()
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| root.to_string());

    // real paths of the directories on the current descent path
    let mut ancestors: HashSet<PathBuf> = HashSet::new();
    let children = walk_dir(guard, root, &mut ancestors)?;
    Ok(TreeEntry::directory(name, children))
}

fn walk_dir(
    guard: &PathGuard,
    dir: &ValidatedPath,
    ancestors: &mut HashSet<PathBuf>,
) -> FsResult<Vec<TreeEntry>> {
    if !ancestors.insert(dir.as_path().to_path_buf()) {
        log::warn!("Cycle while building tree at {}", dir);
        return Err(FsError::CycleDetected(dir.as_path().to_path_buf()));
    }

    let mut nodes = Vec::new();
    for entry in fs::list(dir)? {
        if entry.is_directory {
            let child = guard.validate_path(&dir.lexical().join(&entry.name))?;
            let children = walk_dir(guard, &child, ancestors)?;
            nodes.push(TreeEntry::directory(entry.name, children));
        } else {
            nodes.push(TreeEntry::file(entry.name));
        }
    }

    ancestors.remove(dir.as_path());
    Ok(nodes)
}

// ============================================================================
// SEARCH
// ============================================================================

/// Compile exclude patterns. They are regexes matched anywhere in the full path.
pub fn compile_excludes(patterns: &[String]) -> FsResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|p| {
            Regex::new(p).map_err(|e| {
                FsError::invalid("search_files", format!("invalid exclude pattern {:?}: {}", p, e))
            })
        })
        .collect()
}

/// Every entry under `root` whose name contains `pattern` (case-insensitive),
/// skipping excluded paths. An excluded directory is not descended into.
pub fn search(root: &ValidatedPath, pattern: &str, exclude_patterns: &[String]) -> FsResult<Vec<PathBuf>> {
    let excludes = compile_excludes(exclude_patterns)?;
    let needle = pattern.to_lowercase();
    let base = root.as_path();

    let meta = std::fs::metadata(base).map_err(|e| FsError::from_lookup(base, e))?;
    if !meta.is_dir() {
        return Err(FsError::NotADirectory(base.to_path_buf()));
    }

    let walker = WalkDir::new(base)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded(&excludes, e.path()));

    let mut matches = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|e| walk_error(base, e))?;
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if name.contains(&needle) {
            matches.push(entry.into_path());
        }
    }

    Ok(matches)
}

fn is_excluded(excludes: &[Regex], path: &Path) -> bool {
    let full = path.to_string_lossy();
    excludes.iter().any(|re| re.is_match(&full))
}

fn walk_error(root: &Path, err: walkdir::Error) -> FsError {
    let path = err.path().unwrap_or(root).to_path_buf();
    match err.into_io_error() {
        Some(source) => FsError::io(&path, source),
        None => FsError::CycleDetected(path),
    }
}

// ============================================================================
// TESTS
// ============================================================================
