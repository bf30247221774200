// Sandbox FS Gateway - Tool Dispatcher
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Closed table of tools: name -> (argument schema, handler).
// Every raw path goes through the guard before any handler sees it.
// Every failure becomes an "Error: ..." result flagged is_error. Nothing escapes raw.

use crate::edit::{self, EditOperation, EditOutcome};
use crate::error::{FsError, FsResult};
use crate::fs;
use crate::guard::PathGuard;
use crate::tree;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

const READ_MULTIPLE_SEPARATOR: &str = "\n---\n";
const NO_MATCHES: &str = "No matches found";

// ============================================================================
// TOOL TABLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ReadFile,
    ReadMultipleFiles,
    WriteFile,
    EditFile,
    CreateDirectory,
    ListDirectory,
    DirectoryTree,
    MoveFile,
    SearchFiles,
    GetFileInfo,
    ListAllowedDirectories,
}

impl ToolKind {
    pub const ALL: [ToolKind; 11] = [
        ToolKind::ReadFile,
        ToolKind::ReadMultipleFiles,
        ToolKind::WriteFile,
        ToolKind::EditFile,
        ToolKind::CreateDirectory,
        ToolKind::ListDirectory,
        ToolKind::DirectoryTree,
        ToolKind::MoveFile,
        ToolKind::SearchFiles,
        ToolKind::GetFileInfo,
        ToolKind::ListAllowedDirectories,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ReadFile => "read_file",
            ToolKind::ReadMultipleFiles => "read_multiple_files",
            ToolKind::WriteFile => "write_file",
            ToolKind::EditFile => "edit_file",
            ToolKind::CreateDirectory => "create_directory",
            ToolKind::ListDirectory => "list_directory",
            ToolKind::DirectoryTree => "directory_tree",
            ToolKind::MoveFile => "move_file",
            ToolKind::SearchFiles => "search_files",
            ToolKind::GetFileInfo => "get_file_info",
            ToolKind::ListAllowedDirectories => "list_allowed_directories",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    pub fn description(self) -> &'static str {
        match self {
            ToolKind::ReadFile => "Read the full UTF-8 text of one file. Only works within allowed directories.",
            ToolKind::ReadMultipleFiles => {
                "Read several files in one call. Each result is labelled with its path; \
                 a failure on one path is reported inline and does not stop the others."
            }
            ToolKind::WriteFile => {
                "Create a file or overwrite an existing one with the given content. \
                 The parent directory must already exist."
            }
            ToolKind::EditFile => {
                "Apply ordered exact-text replacements to a file. Each oldText must occur exactly once. \
                 All edits succeed or none are written. dryRun returns a unified diff instead of writing."
            }
            ToolKind::CreateDirectory => {
                "Create a directory and any missing parents. Succeeds silently if it already exists."
            }
            ToolKind::ListDirectory => "List one directory level. Entries are prefixed with [DIR] or [FILE].",
            ToolKind::DirectoryTree => {
                "Recursive JSON tree of a directory. Each node has name and type; \
                 directories always have a children array, files never do."
            }
            ToolKind::MoveFile => {
                "Move or rename a file or directory. Fails if the destination exists. \
                 Source and destination must both be within allowed directories."
            }
            ToolKind::SearchFiles => {
                "Recursively find files and directories whose name contains pattern (case-insensitive). \
                 excludePatterns are regular expressions matched against the full path; \
                 excluded directories are not descended."
            }
            ToolKind::GetFileInfo => {
                "Size, created/modified/accessed times, type and permissions of a file or directory."
            }
            ToolKind::ListAllowedDirectories => "List the directories this server is allowed to access.",
        }
    }

    /// JSON schema advertised in tools/list
    pub fn input_schema(self) -> Value {
        let path = json!({"type": "string", "description": "Path inside an allowed directory"});
        match self {
            ToolKind::ReadFile
            | ToolKind::CreateDirectory
            | ToolKind::ListDirectory
            | ToolKind::DirectoryTree
            | ToolKind::GetFileInfo => object_schema(json!({ "path": path }), &["path"]),
            ToolKind::ReadMultipleFiles => object_schema(
                json!({ "paths": {"type": "array", "items": {"type": "string"}} }),
                &["paths"],
            ),
            ToolKind::WriteFile => object_schema(
                json!({ "path": path, "content": {"type": "string"} }),
                &["path", "content"],
            ),
            ToolKind::EditFile => object_schema(
                json!({
                    "path": path,
                    "edits": {
                        "type": "array",
                        "items": object_schema(
                            json!({
                                "oldText": {"type": "string", "description": "Text to search for - must match exactly once"},
                                "newText": {"type": "string", "description": "Replacement text"}
                            }),
                            &["oldText", "newText"],
                        )
                    },
                    "dryRun": {"type": "boolean", "default": false, "description": "Preview changes as a unified diff"}
                }),
                &["path", "edits"],
            ),
            ToolKind::MoveFile => object_schema(
                json!({ "source": path.clone(), "destination": path }),
                &["source", "destination"],
            ),
            ToolKind::SearchFiles => object_schema(
                json!({
                    "path": path,
                    "pattern": {"type": "string"},
                    "excludePatterns": {"type": "array", "items": {"type": "string"}, "default": []}
                }),
                &["path", "pattern"],
            ),
            ToolKind::ListAllowedDirectories => object_schema(json!({}), &[]),
        }
    }

    /// MCP tool definition
    pub fn definition(self) -> Value {
        json!({
            "name": self.name(),
            "description": self.description(),
            "inputSchema": self.input_schema(),
        })
    }
}

fn object_schema(properties: Value, required: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

/// Return all tool definitions
pub fn tool_definitions() -> Vec<Value> {
    ToolKind::ALL.iter().map(|kind| kind.definition()).collect()
}

// ============================================================================
// ARGUMENTS
// ============================================================================

#[derive(Debug, Deserialize)]
struct PathArgs {
    path: String,
}

#[derive(Debug, Deserialize)]
struct ReadMultipleArgs {
    paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct WriteArgs {
    path: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EditArgs {
    path: String,
    edits: Vec<EditOperation>,
    #[serde(default)]
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct MoveArgs {
    source: String,
    destination: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchArgs {
    path: String,
    pattern: String,
    #[serde(default)]
    exclude_patterns: Vec<String>,
}

fn parse_args<T: DeserializeOwned>(kind: ToolKind, args: &Value) -> FsResult<T> {
    serde_json::from_value(args.clone()).map_err(|e| FsError::invalid(kind.name(), e.to_string()))
}

// ============================================================================
// RESULT ENVELOPE
// ============================================================================

/// Outbound result: text plus an explicit error flag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(text: impl Into<String>) -> Self {
        Self { text: text.into(), is_error: false }
    }

    pub fn error(err: &FsError) -> Self {
        Self { text: format!("Error: {}", err), is_error: true }
    }

    /// MCP tools/call result body
    pub fn to_call_result(&self) -> Value {
        json!({
            "content": [{"type": "text", "text": self.text}],
            "isError": self.is_error,
        })
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Stateless router. Shared across connections; holds only the guard.
#[derive(Debug, Clone)]
pub struct ToolDispatcher {
    guard: PathGuard,
}

impl ToolDispatcher {
    pub fn new(guard: PathGuard) -> Self {
        Self { guard }
    }

    pub fn guard(&self) -> &PathGuard {
        &self.guard
    }

    /// Handle a tool call
    pub fn dispatch(&self, name: &str, args: &Value) -> ToolOutput {
        log::info!("CALL {} | {}", name, param_summary(name, args));

        let result = ToolKind::from_name(name)
            .ok_or_else(|| FsError::UnknownTool(name.to_string()))
            .and_then(|kind| self.run(kind, args));

        match result {
            Ok(text) => ToolOutput::ok(text),
            Err(err) => {
                let snippet: String = err.to_string().chars().take(200).collect();
                log::warn!("FAIL {} | {}: {}", name, err.kind(), snippet);
                ToolOutput::error(&err)
            }
        }
    }

    fn run(&self, kind: ToolKind, args: &Value) -> FsResult<String> {
        match kind {
            ToolKind::ReadFile => {
                let args: PathArgs = parse_args(kind, args)?;
                fs::read(&self.guard.validate(&args.path)?)
            }

            ToolKind::ReadMultipleFiles => {
                let args: ReadMultipleArgs = parse_args(kind, args)?;
                let parts: Vec<String> = args
                    .paths
                    .iter()
                    .map(|raw| match self.guard.validate(raw).and_then(|p| fs::read(&p)) {
                        Ok(content) => format!("{}:\n{}\n", raw, content),
                        Err(err) => {
                            log::debug!("read_multiple_files: {} failed: {}", raw, err);
                            format!("{}: Error - {}", raw, err)
                        }
                    })
                    .collect();
                Ok(parts.join(READ_MULTIPLE_SEPARATOR))
            }

            ToolKind::WriteFile => {
                let args: WriteArgs = parse_args(kind, args)?;
                fs::write(&self.guard.validate(&args.path)?, &args.content)?;
                Ok(format!("Successfully wrote to {}", args.path))
            }

            ToolKind::EditFile => {
                let args: EditArgs = parse_args(kind, args)?;
                let path = self.guard.validate(&args.path)?;
                match edit::apply(&path, &args.edits, args.dry_run)? {
                    EditOutcome::Preview(diff) if diff.is_empty() => Ok("No changes".to_string()),
                    EditOutcome::Preview(diff) => Ok(diff),
                    EditOutcome::Applied { edits } => {
                        Ok(format!("File {} successfully edited ({} edit(s) applied).", args.path, edits))
                    }
                }
            }

            ToolKind::CreateDirectory => {
                let args: PathArgs = parse_args(kind, args)?;
                fs::create_dir(&self.guard.validate(&args.path)?)?;
                Ok(format!("Successfully created directory {}", args.path))
            }

            ToolKind::ListDirectory => {
                let args: PathArgs = parse_args(kind, args)?;
                let entries = fs::list(&self.guard.validate(&args.path)?)?;
                Ok(entries
                    .iter()
                    .map(|e| format!("[{}] {}", if e.is_directory { "DIR" } else { "FILE" }, e.name))
                    .collect::<Vec<_>>()
                    .join("\n"))
            }

            ToolKind::DirectoryTree => {
                let args: PathArgs = parse_args(kind, args)?;
                let root = self.guard.validate(&args.path)?;
                let tree = tree::build_tree(&self.guard, &root)?;
                let children = tree.children.unwrap_or_default();
                serde_json::to_string_pretty(&children)
                    .map_err(|e| FsError::io(root.as_path(), std::io::Error::new(std::io::ErrorKind::Other, e)))
            }

            ToolKind::MoveFile => {
                let args: MoveArgs = parse_args(kind, args)?;
                let source = self.guard.validate(&args.source)?;
                let destination = self.guard.validate(&args.destination)?;
                fs::rename(&source, &destination)?;
                Ok(format!("Successfully moved {} to {}", args.source, args.destination))
            }

            ToolKind::SearchFiles => {
                let args: SearchArgs = parse_args(kind, args)?;
                let root = self.guard.validate(&args.path)?;
                let found = tree::search(&root, &args.pattern, &args.exclude_patterns)?;
                if found.is_empty() {
                    Ok(NO_MATCHES.to_string())
                } else {
                    Ok(found
                        .iter()
                        .map(|p| p.to_string_lossy().to_string())
                        .collect::<Vec<_>>()
                        .join("\n"))
                }
            }

            ToolKind::GetFileInfo => {
                let args: PathArgs = parse_args(kind, args)?;
                Ok(fs::stat(&self.guard.validate(&args.path)?)?.to_lines())
            }

            ToolKind::ListAllowedDirectories => Ok(self.guard.roots().display_lines()),
        }
    }
}

/// Summarize tool params for logging (truncate large values)
fn param_summary(name: &str, args: &Value) -> String {
    fn text<'a>(args: &'a Value, key: &str) -> &'a str {
        args.get(key).and_then(|v| v.as_str()).unwrap_or("?")
    }

    match name {
        "write_file" => {
            let size = args.get("content").and_then(|v| v.as_str()).map(|s| s.len()).unwrap_or(0);
            format!("path={} content_len={}", text(args, "path"), size)
        }
        "edit_file" => {
            let count = args.get("edits").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);
            let dry = args.get("dryRun").and_then(|v| v.as_bool()).unwrap_or(false);
            format!("path={} edits={} dry_run={}", text(args, "path"), count, dry)
        }
        "move_file" => format!("source={} destination={}", text(args, "source"), text(args, "destination")),
        "search_files" => format!("path={} pattern={}", text(args, "path"), text(args, "pattern")),
        "read_multiple_files" => {
            let count = args.get("paths").and_then(|v| v.as_array()).map(|a| a.len()).unwrap_or(0);
            format!("paths={}", count)
        }
        "list_allowed_directories" => String::new(),
        _ if args.get("path").is_some() => format!("path={}", text(args, "path")),
        _ => {
            let s = args.to_string();
            if s.chars().count() > 300 {
                format!("{}…", s.chars().take(300).collect::<String>())
            } else {
                s
            }
        }
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

    fn dispatcher() -> (TempDir, ToolDispatcher) {
        let dir = tempdir().unwrap();
        let config = GateConfig {
            port: 0,
            allowed_dirs: vec![dir.path().to_string_lossy().to_string()],
        };
        let guard = PathGuard::new(config.allowed_roots().unwrap());
        (dir, ToolDispatcher::new(guard))
    }

    fn p(dir: &TempDir, rel: &str) -> String {
        dir.path().join(rel).to_string_lossy().to_string()
    }

    #[test]
    fn every_tool_resolves_by_name() {
        for kind in ToolKind::ALL {
            assert_eq!(ToolKind::from_name(kind.name()), Some(kind));
            assert_eq!(kind.input_schema()["type"], "object");
        }
        assert_eq!(tool_definitions().len(), 11);
        assert_eq!(ToolKind::from_name("rm_rf"), None);
    }

    #[test]
    fn unknown_tool_is_error() {
        let (_dir, d) = dispatcher();
        let out = d.dispatch("rm_rf", &json!({}));
        assert!(out.is_error);
        assert_eq!(out.text, "Error: Unknown tool: rm_rf");
    }

    #[test]
    fn bad_arguments_are_invalid() {
        let (_dir, d) = dispatcher();
        let out = d.dispatch("read_file", &json!({"file": "x"}));
        assert!(out.is_error);
        assert!(out.text.contains("Invalid arguments for read_file"));
        assert!(out.text.contains("path"));

        let out = d.dispatch("write_file", &json!({"path": "/x", "content": 5}));
        assert!(out.is_error);
        assert!(out.text.contains("invalid type"));
    }

    #[test]
    fn write_then_read() {
        let (dir, d) = dispatcher();
        let path = p(&dir, "note.md");

        let out = d.dispatch("write_file", &json!({"path": path, "content": "# Title\nbody\n"}));
        assert!(!out.is_error, "{}", out.text);
        assert_eq!(out.text, format!("Successfully wrote to {}", path));

        let out = d.dispatch("read_file", &json!({"path": path}));
        assert_eq!(out, ToolOutput::ok("# Title\nbody\n"));
    }

    #[test]
    fn outside_path_is_access_denied() {
        let (_dir, d) = dispatcher();
        let out = d.dispatch("read_file", &json!({"path": "/etc/hostname"}));
        assert!(out.is_error);
        assert!(out.text.starts_with("Error: Access denied"));
    }

    #[test]
    fn read_multiple_isolates_failures() {
        let (dir, d) = dispatcher();
        std::fs::write(dir.path().join("a.txt"), "AAA").unwrap();
        std::fs::write(dir.path().join("c.txt"), "CCC").unwrap();
        let (a, b, c) = (p(&dir, "a.txt"), p(&dir, "b.txt"), p(&dir, "c.txt"));

        let out = d.dispatch("read_multiple_files", &json!({"paths": [a, b, c, "/etc/passwd"]}));
        assert!(!out.is_error);
        let parts: Vec<&str> = out.text.split("\n---\n").collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0], format!("{}:\nAAA\n", a));
        assert!(parts[1].starts_with(&format!("{}: Error - Not found", b)));
        assert_eq!(parts[2], format!("{}:\nCCC\n", c));
        assert!(parts[3].starts_with("/etc/passwd: Error - Access denied"));
    }

    #[test]
    fn edit_dry_run_and_apply() {
        let (dir, d) = dispatcher();
        let path = p(&dir, "cfg.toml");
        std::fs::write(&path, "debug = false\nlevel = 1\n").unwrap();
        let edits = json!([{"oldText": "debug = false", "newText": "debug = true"}]);

        let out = d.dispatch("edit_file", &json!({"path": path, "edits": edits, "dryRun": true}));
        assert!(!out.is_error, "{}", out.text);
        assert!(out.text.contains("+debug = true"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "debug = false\nlevel = 1\n");

        let out = d.dispatch("edit_file", &json!({"path": path, "edits": edits}));
        assert!(!out.is_error, "{}", out.text);
        assert!(out.text.contains("successfully edited"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "debug = true\nlevel = 1\n");
    }

    #[test]
    fn edit_all_or_nothing() {
        let (dir, d) = dispatcher();
        let path = p(&dir, "f.txt");
        std::fs::write(&path, "one two three").unwrap();

        let out = d.dispatch(
            "edit_file",
            &json!({"path": path, "edits": [
                {"oldText": "one", "newText": "1"},
                {"oldText": "four", "newText": "4"}
            ]}),
        );
        assert!(out.is_error);
        assert!(out.text.contains("Could not find exact match for edit: four"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one two three");
    }

    #[test]
    fn create_and_list_directory() {
        let (dir, d) = dispatcher();
        let out = d.dispatch("create_directory", &json!({"path": p(&dir, "x/y")}));
        assert!(!out.is_error, "{}", out.text);
        std::fs::write(dir.path().join("x/file.txt"), "").unwrap();

        let out = d.dispatch("list_directory", &json!({"path": p(&dir, "x")}));
        assert_eq!(out.text, "[FILE] file.txt\n[DIR] y");
    }

    #[test]
    fn directory_tree_json() {
        let (dir, d) = dispatcher();
        std::fs::write(dir.path().join("a.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("b")).unwrap();

        let out = d.dispatch("directory_tree", &json!({"path": p(&dir, "")}));
        assert!(!out.is_error, "{}", out.text);
        let tree: Value = serde_json::from_str(&out.text).unwrap();
        assert_eq!(
            tree,
            json!([
                {"name": "a.txt", "type": "file"},
                {"name": "b", "type": "directory", "children": []}
            ])
        );
    }

    #[test]
    fn move_refuses_existing_destination() {
        let (dir, d) = dispatcher();
        std::fs::write(dir.path().join("src.txt"), "S").unwrap();
        std::fs::write(dir.path().join("dst.txt"), "D").unwrap();

        let out = d.dispatch(
            "move_file",
            &json!({"source": p(&dir, "src.txt"), "destination": p(&dir, "dst.txt")}),
        );
        assert!(out.is_error);
        assert!(out.text.contains("already exists"));
        assert_eq!(std::fs::read_to_string(dir.path().join("src.txt")).unwrap(), "S");
        assert_eq!(std::fs::read_to_string(dir.path().join("dst.txt")).unwrap(), "D");

        let out = d.dispatch(
            "move_file",
            &json!({"source": p(&dir, "src.txt"), "destination": p(&dir, "renamed.txt")}),
        );
        assert!(!out.is_error, "{}", out.text);
        assert!(dir.path().join("renamed.txt").exists());
    }

    #[test]
    fn move_destination_outside_is_denied() {
        let (dir, d) = dispatcher();
        std::fs::write(dir.path().join("src.txt"), "S").unwrap();
        let out = d.dispatch(
            "move_file",
            &json!({"source": p(&dir, "src.txt"), "destination": "/var/tmp/stolen.txt"}),
        );
        assert!(out.is_error);
        assert!(dir.path().join("src.txt").exists());
    }

    #[test]
    fn search_files_with_exclusions() {
        let (dir, d) = dispatcher();
        for name in ["app.log", "app.log.tmp", "readme.md"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let out = d.dispatch(
            "search_files",
            &json!({"path": p(&dir, ""), "pattern": "log", "excludePatterns": ["\\.tmp$"]}),
        );
        let real = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(out.text, real.join("app.log").to_string_lossy());

        let out = d.dispatch("search_files", &json!({"path": p(&dir, ""), "pattern": "nothing"}));
        assert_eq!(out, ToolOutput::ok("No matches found"));
    }

    #[test]
    fn file_info_lines() {
        let (dir, d) = dispatcher();
        std::fs::write(dir.path().join("f.bin"), "abc").unwrap();
        let out = d.dispatch("get_file_info", &json!({"path": p(&dir, "f.bin")}));
        assert!(!out.is_error, "{}", out.text);
        let keys: Vec<&str> = out.text.lines().filter_map(|l| l.split(':').next()).collect();
        assert_eq!(
            keys,
            vec!["size", "created", "modified", "accessed", "is_directory", "is_file", "permissions"]
        );
        assert!(out.text.starts_with("size: 3"));
    }

    #[test]
    fn allowed_directories_are_normalized() {
        let dir = tempdir().unwrap();
        let config = GateConfig {
            port: 0,
            allowed_dirs: vec![format!("{}/", dir.path().display())],
        };
        let d = ToolDispatcher::new(PathGuard::new(config.allowed_roots().unwrap()));
        let out = d.dispatch("list_allowed_directories", &Value::Null);
        assert_eq!(out.text, dir.path().to_string_lossy());
    }

    #[test]
    fn call_result_carries_error_flag() {
        let out = ToolOutput::error(&FsError::UnknownTool("x".into()));
        let body = out.to_call_result();
        assert_eq!(body["isError"], true);
        assert_eq!(body["content"][0]["type"], "text");
    }

    #[test]
    fn summary_truncates_on_char_boundary() {
        let long = "é".repeat(400);
        let s = param_summary("other", &json!({ "blob": long }));
        assert!(s.ends_with('…'));
        assert_eq!(s.chars().count(), 301);
    }
}
