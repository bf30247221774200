// Sandbox FS Gateway - Path Resolution
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Lexical path helpers shared by config loading and the path guard.
// Nothing here decides access. guard.rs owns the allow/deny decision.

use std::io;
use std::path::{Component, Path, PathBuf};

/// Symlink hops followed before giving up (matches the kernel's ELOOP limit)
const MAX_LINK_HOPS: usize = 40;

/// Expand a leading `~` to the process user's home directory.
/// `~user` forms are left untouched.
pub fn expand_home(raw: &str) -> PathBuf {
    let rest = if raw == "~" {
        Some("")
    } else {
        raw.strip_prefix("~/")
    };

    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() => home,
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(raw),
    }
}

/// Normalize a path without touching the filesystem: drop `.`, collapse `..`,
/// squash repeated separators and the trailing one. `..` never climbs above `/`.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();

    for component in path.components() {
        match component {
            Component::Prefix(prefix) => out.push(prefix.as_os_str()),
            Component::RootDir => out.push(Component::RootDir.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(part) => out.push(part),
        }
    }

    if out.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        out
    }
}

/// Make a path absolute against the working directory, then normalize it.
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

/// `~` expansion + absolutize in one step. This is the lexical form of a caller path.
pub fn lexical(raw: &str) -> io::Result<PathBuf> {
    absolutize(&expand_home(raw))
}

/// Resolve symlinks for a path that may not exist yet.
///
/// Existing paths are canonicalized directly. For a missing path the deepest
/// existing ancestor is canonicalized and the missing tail re-appended. A
/// dangling symlink is followed to its target so a write through it cannot
/// land outside the directory it appears to live in.
pub fn resolve_existing(path: &Path) -> io::Result<PathBuf> {
    resolve_with_hops(&normalize(path), 0)
}

fn resolve_with_hops(path: &Path, hops: usize) -> io::Result<PathBuf> {
    if hops > MAX_LINK_HOPS {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("too many levels of symbolic links: {}", path.display()),
        ));
    }

    let mut existing = path.to_path_buf();
    let mut missing: Vec<std::ffi::OsString> = Vec::new();

    loop {
        match std::fs::canonicalize(&existing) {
            Ok(real) => {
                let mut resolved = real;
                for part in missing.iter().rev() {
                    resolved.push(part);
                }
                return Ok(resolved);
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // Dangling link: chase the target instead of trusting the link's location
                if let Ok(meta) = std::fs::symlink_metadata(&existing) {
                    if meta.file_type().is_symlink() {
                        let target = std::fs::read_link(&existing)?;
                        // the link's directory exists; resolve it so `..` in the target
                        // climbs from where the kernel would
                        let base = match existing.parent() {
                            Some(parent) if !parent.as_os_str().is_empty() => std::fs::canonicalize(parent)?,
                            _ => PathBuf::from("/"),
                        };
                        let mut chased = base.join(target);
                        for part in missing.iter().rev() {
                            chased.push(part);
                        }
                        return resolve_with_hops(&chased, hops + 1);
                    }
                }

                let name = match existing.file_name() {
                    Some(name) => name.to_os_string(),
                    None => return Err(e),
                };
                missing.push(name);
                existing = match existing.parent() {
                    Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                    _ => return Err(e),
                };
            }
            Err(e) => return Err(e),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
