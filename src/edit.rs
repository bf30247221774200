// Sandbox FS Gateway - Edit Engine
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Ordered exact-text replacements against a running in-memory buffer.
// All or nothing: every edit must match before a single byte hits disk.
// Each oldText must occur exactly once in the buffer it is applied to.

use crate::error::{FsError, FsResult};
use crate::fs;
use crate::guard::ValidatedPath;
use serde::{Deserialize, Serialize};
use std::io::Write;

const DIFF_CONTEXT_LINES: usize = 3;

/// One exact-text replacement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditOperation {
    pub old_text: String,
    pub new_text: String,
}

impl EditOperation {
    pub fn new(old_text: impl Into<String>, new_text: impl Into<String>) -> Self {
        Self { old_text: old_text.into(), new_text: new_text.into() }
    }
}

/// What an edit request produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// Dry run: unified diff of original vs edited, file untouched
    Preview(String),
    /// Edited buffer written back
    Applied { edits: usize },
}

/// Apply edits in order to a buffer. Pure: no I/O.
pub fn apply_to_buffer(content: &str, edits: &[EditOperation]) -> FsResult<String> {
    let mut buffer = content.to_string();

    for edit in edits {
        if edit.old_text.is_empty() {
            return Err(FsError::invalid("edit_file", "oldText must not be empty"));
        }

        match occurrences(&buffer, &edit.old_text) {
            0 => return Err(FsError::EditNotFound(edit.old_text.clone())),
            1 => buffer = buffer.replacen(edit.old_text.as_str(), &edit.new_text, 1),
            count => {
                return Err(FsError::EditAmbiguous { old_text: edit.old_text.clone(), count });
            }
        }
    }

    Ok(buffer)
}

/// Count occurrences of `needle`, overlapping ones included ("aa" occurs twice in "aaa")
fn occurrences(haystack: &str, needle: &str) -> usize {
    let mut count = 0;
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        count += 1;
        let at = start + pos;
        // step one char past the match start, staying on a char boundary
        start = at + haystack[at..].chars().next().map_or(1, char::len_utf8);
    }
    count
}

/// Unified diff between two buffers, headers `a/<label>` and `b/<label>`
pub fn unified_diff(original: &str, edited: &str, label: &str) -> String {
    let label = label.trim_start_matches('/');
    similar::TextDiff::from_lines(original, edited)
        .unified_diff()
        .context_radius(DIFF_CONTEXT_LINES)
        .header(&format!("a/{}", label), &format!("b/{}", label))
        .to_string()
}

/// Load, edit, then either preview or write back atomically
pub fn apply(path: &ValidatedPath, edits: &[EditOperation], dry_run: bool) -> FsResult<EditOutcome> {
    let original = fs::read(path)?;
    let edited = apply_to_buffer(&original, edits)?;

    if dry_run {
        let diff = unified_diff(&original, &edited, &path.to_string());
        return Ok(EditOutcome::Preview(diff));
    }

    write_atomic(path, &edited)?;
    log::debug!("applied {} edit(s) to {}", edits.len(), path);
    Ok(EditOutcome::Applied { edits: edits.len() })
}

/// Write to a temp file beside the target, then rename over it.
/// A crash leaves either the old file or the new one, never a torn mix.
fn write_atomic(path: &ValidatedPath, content: &str) -> FsResult<()> {
    let target = path.as_path();
    let dir = target
        .parent()
        .ok_or_else(|| FsError::NotFound(target.to_path_buf()))?;

    let permissions = std::fs::metadata(target).map(|m| m.permissions()).ok();

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| FsError::io(dir, e))?;
    tmp.write_all(content.as_bytes()).map_err(|e| FsError::io(tmp.path(), e))?;
    tmp.as_file().sync_all().map_err(|e| FsError::io(tmp.path(), e))?;

    if let Some(permissions) = permissions {
        std::fs::set_permissions(tmp.path(), permissions).map_err(|e| FsError::io(tmp.path(), e))?;
    }

    tmp.persist(target).map_err(|e| FsError::io(target, e.error))?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
