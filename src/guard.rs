// Sandbox FS Gateway - Path Guard
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// The only way to obtain a ValidatedPath. Two checks, both required:
// - lexical: the normalized absolute path sits under an allowed root
// - real: the symlink-resolved path still sits under an allowed root
// A symlink inside a root can point anywhere, and a lexically outside path
// is refused before the filesystem is touched at all.

use crate::config::AllowedRoots;
use crate::error::{FsError, FsResult};
use crate::paths;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A path proven, for this call only, to resolve inside the sandbox.
/// Filesystem calls use the symlink-resolved form. The lexical form is the
/// caller's view, used to compose child paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPath {
    real: PathBuf,
    lexical: PathBuf,
}

impl ValidatedPath {
    pub fn as_path(&self) -> &Path {
        &self.real
    }

    /// Normalized path as the caller named it, under a root's display form
    pub fn lexical(&self) -> &Path {
        &self.lexical
    }
}

impl AsRef<Path> for ValidatedPath {
    fn as_ref(&self) -> &Path {
        &self.real
    }
}

impl fmt::Display for ValidatedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.real.display())
    }
}

/// Gatekeeper for every caller-supplied path
#[derive(Debug, Clone)]
pub struct PathGuard {
    roots: Arc<AllowedRoots>,
}

impl PathGuard {
    pub fn new(roots: AllowedRoots) -> Self {
        Self { roots: Arc::new(roots) }
    }

    pub fn roots(&self) -> &AllowedRoots {
        &self.roots
    }

    /// Validate a raw caller path
    pub fn validate(&self, raw: &str) -> FsResult<ValidatedPath> {
        let lexical = paths::lexical(raw).map_err(|e| FsError::io(Path::new(raw), e))?;
        self.check(&lexical)
    }

    /// Validate an already-composed path. Compose it from `ValidatedPath::lexical`,
    /// not the resolved form, or aliased roots fail the lexical check.
    pub fn validate_path(&self, path: &Path) -> FsResult<ValidatedPath> {
        let lexical = paths::absolutize(path).map_err(|e| FsError::io(path, e))?;
        self.check(&lexical)
    }

    fn check(&self, lexical: &Path) -> FsResult<ValidatedPath> {
        if !self.roots.contains_lexical(lexical) {
            log::warn!("DENIED (lexical): {}", lexical.display());
            return Err(FsError::AccessDenied {
                path: lexical.to_path_buf(),
                reason: "path outside allowed directories",
            });
        }

        let real = paths::resolve_existing(lexical).map_err(|e| FsError::io(lexical, e))?;
        if !self.roots.contains_real(&real) {
            log::warn!("DENIED (symlink): {} -> {}", lexical.display(), real.display());
            return Err(FsError::AccessDenied {
                path: lexical.to_path_buf(),
                reason: "symlink target outside allowed directories",
            });
        }

        Ok(ValidatedPath { real, lexical: lexical.to_path_buf() })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use tempfile::{tempdir, TempDir};

    fn guard_for(dir: &Path) -> PathGuard {
        let config = GateConfig {
            port: 0,
            allowed_dirs: vec![dir.to_string_lossy().to_string()],
        };
        PathGuard::new(config.allowed_roots().unwrap())
    }

    fn sandbox() -> (TempDir, PathBuf, PathGuard) {
        let dir = tempdir().unwrap();
        let root = dir.path().join("data");
        std::fs::create_dir(&root).unwrap();
        let guard = guard_for(&root);
        (dir, root, guard)
    }

    fn is_denied(result: FsResult<ValidatedPath>) -> bool {
        matches!(result, Err(FsError::AccessDenied { .. }))
    }

    #[test]
    fn allows_paths_inside_root() -> FsResult<()> {
        let (_dir, root, guard) = sandbox();
        std::fs::write(root.join("a.txt"), "x").unwrap();

        let valid = guard.validate(&root.join("a.txt").to_string_lossy())?;
        assert_eq!(valid.as_path(), std::fs::canonicalize(root.join("a.txt")).unwrap());

        // The root itself and not-yet-existing children are fine
        guard.validate(&root.to_string_lossy())?;
        guard.validate(&root.join("new/file.txt").to_string_lossy())?;
        Ok(())
    }

    #[test]
    fn denies_outside_paths() {
        let (dir, root, guard) = sandbox();
        assert!(is_denied(guard.validate("/etc/passwd")));
        assert!(is_denied(guard.validate(&dir.path().to_string_lossy())));
        assert!(is_denied(guard.validate(&format!("{}/../escape.txt", root.display()))));
        assert!(is_denied(guard.validate(&format!("{}/x/../../escape.txt", root.display()))));
    }

    #[test]
    fn prefix_check_respects_boundaries() {
        let (dir, _root, guard) = sandbox();
        let sibling = dir.path().join("data-other");
        std::fs::create_dir(&sibling).unwrap();
        assert!(is_denied(guard.validate(&sibling.join("x").to_string_lossy())));
        assert!(is_denied(guard.validate(&sibling.to_string_lossy())));
    }

    #[cfg(unix)]
    #[test]
    fn denies_symlink_escape() {
        let (_dir, root, guard) = sandbox();
        let outside = tempdir().unwrap();
        std::fs::write(outside.path().join("secret.txt"), "s").unwrap();

        std::os::unix::fs::symlink(outside.path(), root.join("escape")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret.txt"), root.join("secret")).unwrap();

        assert!(is_denied(guard.validate(&root.join("escape").to_string_lossy())));
        assert!(is_denied(guard.validate(&root.join("escape/secret.txt").to_string_lossy())));
        assert!(is_denied(guard.validate(&root.join("secret").to_string_lossy())));
        // Writing a new file through an escaping directory link is refused too
        assert!(is_denied(guard.validate(&root.join("escape/new.txt").to_string_lossy())));
    }

    #[cfg(unix)]
    #[test]
    fn denies_dangling_symlink_escape() {
        let (_dir, root, guard) = sandbox();
        let outside = tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("later.txt"), root.join("later")).unwrap();
        assert!(is_denied(guard.validate(&root.join("later").to_string_lossy())));
    }

    #[cfg(unix)]
    #[test]
    fn allows_symlink_within_root() -> FsResult<()> {
        let (_dir, root, guard) = sandbox();
        std::fs::create_dir(root.join("real")).unwrap();
        std::os::unix::fs::symlink(root.join("real"), root.join("alias")).unwrap();

        let valid = guard.validate(&root.join("alias").to_string_lossy())?;
        assert_eq!(valid.as_path(), std::fs::canonicalize(root.join("real")).unwrap());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn root_reached_through_symlink_still_works() -> FsResult<()> {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real-root");
        std::fs::create_dir(&real).unwrap();
        let alias = dir.path().join("alias-root");
        std::os::unix::fs::symlink(&real, &alias).unwrap();
        std::fs::write(real.join("f.txt"), "x").unwrap();

        let guard = guard_for(&alias);
        let valid = guard.validate(&alias.join("f.txt").to_string_lossy())?;
        assert_eq!(valid.lexical(), alias.join("f.txt"));
        assert_eq!(valid.as_path(), std::fs::canonicalize(real.join("f.txt")).unwrap());
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn tree_through_aliased_root() -> FsResult<()> {
        let dir = tempdir().unwrap();
        let real = dir.path().join("real-root");
        std::fs::create_dir_all(real.join("sub/deeper")).unwrap();
        std::fs::write(real.join("sub/f.txt"), "x").unwrap();
        let alias = dir.path().join("alias-root");
        std::os::unix::fs::symlink(&real, &alias).unwrap();

        let guard = guard_for(&alias);
        let root = guard.validate(&alias.to_string_lossy())?;
        let tree = crate::tree::build_tree(&guard, &root)?;

        let children = tree.children.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].name, "sub");
        let names: Vec<String> = children[0]
            .children
            .as_ref()
            .unwrap()
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["deeper", "f.txt"]);
        Ok(())
    }
}
