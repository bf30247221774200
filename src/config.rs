// Sandbox FS Gateway - Configuration
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Port and allowed root directories. Loaded once at startup from an optional
// JSON file plus CLI flags, validated, then frozen into AllowedRoots.

use crate::paths;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 9200;

/// Gateway configuration as supplied by the operator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub allowed_dirs: Vec<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            allowed_dirs: Vec::new(),
        }
    }
}

impl GateConfig {
    /// Load config from JSON file, falling back to defaults
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {:?}", path))?;
            let config: Self = serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in config {:?}", path))?;
            Ok(config)
        } else {
            log::warn!("Config not found at {:?}, using defaults", path);
            Ok(Self::default())
        }
    }

    /// Save config to JSON file
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// CLI flags win over the file: a given port replaces it, given dirs are appended
    pub fn merge_cli(mut self, port: Option<u16>, dirs: &[String]) -> Self {
        if let Some(port) = port {
            self.port = port;
        }
        self.allowed_dirs.extend(dirs.iter().cloned());
        self
    }

    /// Validate every configured directory and freeze the result.
    /// Any missing or non-directory root is fatal.
    pub fn allowed_roots(&self) -> anyhow::Result<AllowedRoots> {
        if self.allowed_dirs.is_empty() {
            bail!("No allowed directories configured (use --allow-dir or \"allowed_dirs\" in the config file)");
        }

        let mut roots: Vec<Root> = Vec::with_capacity(self.allowed_dirs.len());
        for raw in &self.allowed_dirs {
            let display = paths::lexical(raw)
                .with_context(|| format!("Error accessing directory {}", raw))?;

            let meta = std::fs::metadata(&display)
                .with_context(|| format!("Error accessing directory {}", raw))?;
            if !meta.is_dir() {
                bail!("Error: {} is not a directory", raw);
            }

            let real = std::fs::canonicalize(&display)
                .with_context(|| format!("Error resolving directory {}", raw))?;

            if roots.iter().any(|r| r.display == display) {
                log::debug!("Duplicate allowed directory ignored: {}", display.display());
                continue;
            }
            log::info!("Allowed root: {} (real: {})", display.display(), real.display());
            roots.push(Root { display, real });
        }

        Ok(AllowedRoots { roots })
    }
}

/// One sandbox root: the normalized form the operator gave, and its symlink-free form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    pub display: PathBuf,
    pub real: PathBuf,
}

/// Ordered, immutable set of sandbox roots. Built once, shared read-only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowedRoots {
    roots: Vec<Root>,
}

impl AllowedRoots {
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Lexical containment: equal to a root or below it, component-wise
    pub fn contains_lexical(&self, path: &Path) -> bool {
        self.roots.iter().any(|r| path.starts_with(&r.display))
    }

    /// Real containment: the symlink-resolved path is equal to or below a resolved root
    pub fn contains_real(&self, path: &Path) -> bool {
        self.roots.iter().any(|r| path.starts_with(&r.real))
    }

    /// Normalized roots, one per line
    pub fn display_lines(&self) -> String {
        self.roots
            .iter()
            .map(|r| r.display.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

// ============================================================================
// TESTS
// ============================================================================
