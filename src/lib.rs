// Sandbox FS Gateway - Library Root
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// All modules exported here for use by the binary and tests.
// Flow: mcp -> tools -> guard -> fs / edit / tree

pub mod config;
pub mod error;
pub mod paths;

/// Sole gatekeeper for caller-supplied paths
pub mod guard;

pub mod edit;
pub mod fs;
pub mod tree;

/// Tool table and dispatcher
pub mod tools;

/// JSON-RPC transports
pub mod mcp;

pub use config::{AllowedRoots, GateConfig};
pub use error::{FsError, FsResult};
pub use guard::{PathGuard, ValidatedPath};
pub use tools::{ToolDispatcher, ToolKind, ToolOutput};
