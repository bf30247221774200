// Sandbox FS Gateway - MCP Server (JSON-RPC 2.0, line-delimited)
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// ALL tool calls route through this gateway.
// Transports: stdio (single client) or TCP (one worker thread per connection).
// stdout belongs to the protocol in stdio mode; logs go to stderr.

use crate::tools::{tool_definitions, ToolDispatcher};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;

const PROTOCOL_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "sandbox-fs-gate";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

const PARSE_ERROR: i64 = -32700;
const METHOD_NOT_FOUND: i64 = -32601;

/// Build JSON-RPC response
fn response(id: &Value, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

/// Build JSON-RPC error response
fn error_response(id: &Value, code: i64, message: &str) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": { "code": code, "message": message },
    })
}

/// Protocol front-end over a shared dispatcher. Holds no per-session state.
#[derive(Debug, Clone)]
pub struct McpServer {
    dispatcher: Arc<ToolDispatcher>,
}

impl McpServer {
    pub fn new(dispatcher: ToolDispatcher) -> Self {
        Self { dispatcher: Arc::new(dispatcher) }
    }

    pub fn dispatcher(&self) -> &ToolDispatcher {
        &self.dispatcher
    }

    /// Handle one raw line. None means nothing to send back.
    pub fn handle_line(&self, line: &str) -> Option<Value> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        match serde_json::from_str::<Value>(line) {
            Ok(msg) => self.handle_message(&msg),
            Err(e) => {
                log::warn!("JSON parse error: {}", e);
                Some(error_response(&Value::Null, PARSE_ERROR, &format!("Parse error: {}", e)))
            }
        }
    }

    /// Handle one decoded JSON-RPC message. Messages without an id are
    /// notifications: they are processed but never answered.
    pub fn handle_message(&self, msg: &Value) -> Option<Value> {
        let method = msg["method"].as_str().unwrap_or("");
        let id = &msg["id"];
        let params = &msg["params"];

        log::debug!("Received: {}", method);

        let reply = match method {
            "initialize" => Some(response(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": { "tools": {} },
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": SERVER_VERSION,
                    }
                }),
            )),

            "notifications/initialized" => None,

            "tools/list" => Some(response(id, json!({ "tools": tool_definitions() }))),

            "tools/call" => {
                let name = params["name"].as_str().unwrap_or("");
                let args = params.get("arguments").cloned().unwrap_or(Value::Null);
                let output = self.dispatcher.dispatch(name, &args);
                Some(response(id, output.to_call_result()))
            }

            "ping" => Some(response(id, json!({}))),

            _ => Some(error_response(id, METHOD_NOT_FOUND, &format!("Unknown method: {}", method))),
        };

        if id.is_null() {
            return None;
        }
        reply
    }

    /// Serve one client until its input closes
    pub fn serve<R: BufRead, W: Write>(&self, reader: R, mut writer: W) -> io::Result<()> {
        for line in reader.lines() {
            let line = match line {
                Ok(l) => l,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    log::warn!("read error: {}", e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if let Some(reply) = self.handle_line(&line) {
                let msg = serde_json::to_string(&reply)?;
                writer.write_all(msg.as_bytes())?;
                writer.write_all(b"\n")?;
                writer.flush()?;
            }
        }
        Ok(())
    }
}

/// Main MCP loop on stdio. Returns when stdin closes
pub fn run_stdio(server: McpServer) -> Result<()> {
    log::info!("Starting {} v{} on stdio", SERVER_NAME, SERVER_VERSION);
    let stdin = io::stdin();
    let stdout = io::stdout();
    server
        .serve(stdin.lock(), stdout.lock())
        .context("stdio transport failed")
}

/// Main MCP loop on TCP. Runs forever
pub fn run_tcp(server: McpServer, port: u16) -> Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port))
        .with_context(|| format!("Failed to bind port {}", port))?;
    log::info!("Starting {} v{} on {}", SERVER_NAME, SERVER_VERSION, listener.local_addr()?);
    serve_listener(listener, server);
    Ok(())
}

/// Accept loop. Each connection gets its own thread and shares the dispatcher.
pub fn serve_listener(listener: TcpListener, server: McpServer) {
    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                let server = server.clone();
                std::thread::spawn(move || handle_connection(server, stream));
            }
            Err(e) => log::warn!("accept failed: {}", e),
        }
    }
}

fn handle_connection(server: McpServer, stream: TcpStream) {
    let peer = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    log::info!("Client connected: {}", peer);

    let reader = match stream.try_clone() {
        Ok(s) => BufReader::new(s),
        Err(e) => {
            log::warn!("Client {}: cannot clone stream: {}", peer, e);
            return;
        }
    };

    match server.serve(reader, stream) {
        Ok(()) => log::info!("Client disconnected: {}", peer),
        Err(e) => log::warn!("Client {} dropped: {}", peer, e),
    }
}

// ============================================================================
// TESTS
// ============================================================================
