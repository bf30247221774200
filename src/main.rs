// Sandbox FS Gateway - Main Entry Point
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// CLI and MCP server. All file tool calls route through this gateway.
// Usage:
//   sandbox-fs-gate --allow-dir ~/work serve                  # MCP server on TCP (default port 9200)
//   sandbox-fs-gate --allow-dir ~/work serve --stdio          # MCP server on stdio
//   sandbox-fs-gate --allow-dir ~/work call <tool> <args>     # One-shot tool call
//   sandbox-fs-gate tools                                     # List tools
//   sandbox-fs-gate --config gate.json roots                  # Show allowed roots
//   sandbox-fs-gate --allow-dir ~/work save-config gate.json  # Persist merged config

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sandbox_fs_gate::{mcp, tools, GateConfig, PathGuard, ToolDispatcher};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sandbox-fs-gate")]
#[command(author = "Joseph Stone")]
#[command(version)]
#[command(about = "Sandbox FS Gateway - MCP filesystem tools confined to allowed directories")]
struct Cli {
    /// JSON config file ({"port": 9200, "allowed_dirs": [...]})
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port for the TCP transport (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Allowed root directory (repeatable, added to the config file's list)
    #[arg(short = 'd', long = "allow-dir", value_name = "DIR")]
    allow_dirs: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run MCP server (JSON-RPC, one message per line)
    Serve {
        /// Use stdin/stdout instead of TCP
        #[arg(long)]
        stdio: bool,
    },

    /// One-shot tool call. Prints the result and exits 1 on an error result
    Call {
        /// Tool name (read_file, edit_file, ...)
        tool: String,

        /// Arguments as JSON string
        #[arg(default_value = "{}")]
        args: String,
    },

    /// List available tools
    Tools,

    /// Show the normalized allowed directories
    Roots,

    /// Write the merged config (file + CLI flags) to a JSON file
    SaveConfig {
        /// Output path
        path: PathBuf,
    },
}

/// Config file merged with CLI flags
fn merged_config(cli: &Cli) -> Result<GateConfig> {
    let file_config = match &cli.config {
        Some(path) => GateConfig::load(path)?,
        None => GateConfig::default(),
    };
    Ok(file_config.merge_cli(cli.port, &cli.allow_dirs))
}

/// Load config, merge CLI flags, validate roots. Refuses to start on a bad root.
fn build_dispatcher(cli: &Cli) -> Result<(GateConfig, ToolDispatcher)> {
    let config = merged_config(cli)?;
    let roots = config
        .allowed_roots()
        .context("Invalid allowed directories")?;
    log::info!("{} allowed root(s)", roots.len());
    Ok((config, ToolDispatcher::new(PathGuard::new(roots))))
}

fn main() -> Result<()> {
    // Initialize logging (safe if already init)
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Serve { stdio } => {
            let (config, dispatcher) = build_dispatcher(&cli)?;
            let server = mcp::McpServer::new(dispatcher);
            if *stdio {
                mcp::run_stdio(server)?;
            } else {
                mcp::run_tcp(server, config.port)?;
            }
        }

        Commands::Call { tool, args } => {
            let (_, dispatcher) = build_dispatcher(&cli)?;
            let args: serde_json::Value = serde_json::from_str(args)
                .with_context(|| format!("Invalid args JSON: {}", args))?;

            let output = dispatcher.dispatch(tool, &args);
            println!("{}", output.text);

            if output.is_error {
                std::process::exit(1);
            }
        }

        Commands::Tools => {
            for kind in tools::ToolKind::ALL {
                println!("{:<26} {}", kind.name(), kind.description());
            }
        }

        Commands::Roots => {
            let (_, dispatcher) = build_dispatcher(&cli)?;
            println!("{}", dispatcher.guard().roots().display_lines());
        }

        Commands::SaveConfig { path } => {
            let config = merged_config(&cli)?;
            // refuse to persist roots that would not start
            config.allowed_roots().context("Invalid allowed directories")?;
            config.save(path)?;
            println!("Config saved to {}", path.display());
        }
    }

    Ok(())
}
