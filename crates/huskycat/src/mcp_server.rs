//! MCP server: huskycat's validation surface exposed as tools over
//! JSON-RPC 2.0 on stdio. Each request is self-contained; no per-client
//! state is held between requests.
//!
//! Validation requests never mutate files (the MCP policy column); the
//! explicit `huskycat_fix` / `huskycat_apply_suggestion` tools are
//! deliberate fix requests and evaluate the policy as CLI-with-`--fix`.

use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use hc_config::{Config, ExcludeSet};
use hc_core::Mode;
use hc_registry::{PolicyInput, CATALOG};
use hc_scheduler::{RunOutcome, DEFAULT_JOBS};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, error, info};

use crate::dispatch::{execute, ExecOptions};
use crate::files;

pub async fn run_mcp_server() -> Result<()> {
    info!("starting MCP server on stdio");

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();

    for line in stdin.lock().lines() {
        let line = line.context("read line from stdin")?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        debug!(request = trimmed, "received");

        let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(e) => {
                error!("malformed JSON-RPC request: {e}");
                let response = JsonRpcResponse {
                    jsonrpc: "2.0".to_string(),
                    result: None,
                    error: Some(JsonRpcError {
                        code: -32700,
                        message: format!("Parse error: {e}"),
                    }),
                    id: None,
                };
                write_response(&stdout, &response)?;
                continue;
            }
        };

        let response = handle_request(request).await;
        write_response(&stdout, &response)?;
    }

    info!("MCP server shutting down");
    Ok(())
}

#[derive(Deserialize)]
struct JsonRpcRequest {
    #[allow(dead_code)]
    jsonrpc: String,
    method: String,
    #[serde(default)]
    params: Option<Value>,
    id: Option<Value>,
}

#[derive(Serialize)]
struct JsonRpcResponse {
    jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
    id: Option<Value>,
}

#[derive(Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Serialize)]
struct McpToolDef {
    name: String,
    description: String,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

fn get_tools() -> Vec<McpToolDef> {
    let paths_schema = json!({
        "type": "array",
        "items": { "type": "string" },
        "description": "Files or directories to validate"
    });
    vec![
        McpToolDef {
            name: "huskycat_validate".to_string(),
            description: "Run every applicable linter/formatter in check mode".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "paths": paths_schema,
                    "fast": {
                        "type": "boolean",
                        "description": "Skip slow whole-project checkers"
                    }
                },
                "required": ["paths"]
            }),
        },
        McpToolDef {
            name: "huskycat_fix".to_string(),
            description: "Apply auto-fixes (Safe and Likely; Uncertain with unsafe=true)"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "paths": paths_schema,
                    "unsafe": {
                        "type": "boolean",
                        "description": "Permit Uncertain-confidence fixes"
                    }
                },
                "required": ["paths"]
            }),
        },
        McpToolDef {
            name: "huskycat_suggest_fixes".to_string(),
            description: "Check files and list which failing tools could auto-fix them"
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "paths": paths_schema
                },
                "required": ["paths"]
            }),
        },
        McpToolDef {
            name: "huskycat_apply_suggestion".to_string(),
            description: "Apply one tool's fix to one file".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string", "description": "File to fix" },
                    "tool": { "type": "string", "description": "Tool name from a suggestion" },
                    "unsafe": {
                        "type": "boolean",
                        "description": "Permit Uncertain-confidence fixes"
                    }
                },
                "required": ["path", "tool"]
            }),
        },
    ]
}

async fn handle_request(request: JsonRpcRequest) -> JsonRpcResponse {
    let id = request.id.clone();

    match request.method.as_str() {
        "initialize" => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(json!({
                "protocolVersion": "2024-11-05",
                "capabilities": { "tools": {} },
                "serverInfo": {
                    "name": "huskycat",
                    "version": env!("CARGO_PKG_VERSION")
                }
            })),
            error: None,
            id,
        },
        "notifications/initialized" => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: None,
            id: None,
        },
        "tools/list" => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(json!({ "tools": get_tools() })),
            error: None,
            id,
        },
        "tools/call" => match handle_tool_call(request.params).await {
            Ok(result) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                result: Some(result),
                error: None,
                id,
            },
            Err(e) => JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                result: None,
                error: Some(JsonRpcError {
                    code: -32603,
                    message: e.to_string(),
                }),
                id,
            },
        },
        "shutdown" => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: Some(json!({})),
            error: None,
            id,
        },
        _ => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code: -32601,
                message: format!("Method not found: {}", request.method),
            }),
            id,
        },
    }
}

async fn handle_tool_call(params: Option<Value>) -> Result<Value> {
    let params = params.context("missing params for tools/call")?;
    let name = params
        .get("name")
        .and_then(|v| v.as_str())
        .context("missing tool name")?;
    let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

    debug!(tool = name, "tool call");
    match name {
        "huskycat_validate" => handle_validate_tool(arguments, false).await,
        "huskycat_fix" => handle_fix_tool(arguments).await,
        "huskycat_suggest_fixes" => handle_suggest_tool(arguments).await,
        "huskycat_apply_suggestion" => handle_apply_tool(arguments).await,
        _ => anyhow::bail!("Unknown tool: {name}"),
    }
}

fn arg_paths(args: &Value) -> Result<Vec<PathBuf>> {
    let paths = args
        .get("paths")
        .and_then(|v| v.as_array())
        .context("missing paths argument")?;
    Ok(paths
        .iter()
        .filter_map(|v| v.as_str())
        .map(PathBuf::from)
        .collect())
}

async fn run_for_request(
    paths: Vec<PathBuf>,
    policy: PolicyInput,
    fast: bool,
) -> Result<RunOutcome> {
    let workdir = std::env::current_dir().context("determine working directory")?;
    let config = Config::load(&workdir)?;
    let excludes = ExcludeSet::compile(&config.exclude_patterns)
        .context("compile exclude patterns")?;
    let input_files = files::collect_from_args(&paths, &excludes)?;

    let options = ExecOptions {
        policy,
        fast,
        jobs: DEFAULT_JOBS,
        fail_fast: false,
        strict: false,
        interactive_prompts: false,
    };
    Ok(execute(&workdir, &config, input_files, &options, None, None).await?)
}

fn text_content(text: String) -> Value {
    json!({
        "content": [
            { "type": "text", "text": text }
        ]
    })
}

fn summarize(outcome: &RunOutcome) -> String {
    let mut text = String::new();
    for result in &outcome.results {
        let status = if result.success { "ok" } else { "FAIL" };
        let fixed = if result.fixed { " [fixed]" } else { "" };
        text.push_str(&format!(
            "{status}{fixed} {} {}\n",
            result.tool,
            result.file.display()
        ));
        for error in &result.errors {
            text.push_str(&format!("    {error}\n"));
        }
    }
    if !outcome.skipped_tools.is_empty() {
        text.push_str(&format!(
            "skipped (unavailable): {}\n",
            outcome.skipped_tools.join(", ")
        ));
    }
    text.push_str(if outcome.overall_success() {
        "overall: pass\n"
    } else {
        "overall: fail\n"
    });
    text
}

async fn handle_validate_tool(args: Value, fix: bool) -> Result<Value> {
    let paths = arg_paths(&args)?;
    let fast = args.get("fast").and_then(|v| v.as_bool()).unwrap_or(false);
    let policy = PolicyInput {
        mode: Mode::Mcp,
        interactive_tty: false,
        fix_requested: fix,
        unsafe_allowed: false,
    };
    let outcome = run_for_request(paths, policy, fast).await?;
    Ok(text_content(summarize(&outcome)))
}

async fn handle_fix_tool(args: Value) -> Result<Value> {
    let paths = arg_paths(&args)?;
    let unsafe_allowed = args
        .get("unsafe")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    // Deliberate fix request: evaluated as CLI with --fix.
    let policy = PolicyInput {
        mode: Mode::Cli,
        interactive_tty: false,
        fix_requested: true,
        unsafe_allowed,
    };
    let outcome = run_for_request(paths, policy, false).await?;
    Ok(text_content(summarize(&outcome)))
}

async fn handle_suggest_tool(args: Value) -> Result<Value> {
    let paths = arg_paths(&args)?;
    let policy = PolicyInput {
        mode: Mode::Mcp,
        interactive_tty: false,
        fix_requested: false,
        unsafe_allowed: false,
    };
    let outcome = run_for_request(paths, policy, false).await?;

    let suggestions: Vec<Value> = outcome
        .results
        .iter()
        .filter(|r| !r.success)
        .filter_map(|r| {
            let descriptor = CATALOG.iter().find(|d| d.name == r.tool)?;
            descriptor.fixable().then(|| {
                json!({
                    "file": r.file.display().to_string(),
                    "tool": r.tool,
                    "confidence": descriptor.fix_confidence.as_str(),
                    "errors": r.errors,
                })
            })
        })
        .collect();

    Ok(json!({
        "content": [
            {
                "type": "text",
                "text": serde_json::to_string_pretty(&json!({ "suggestions": suggestions }))?
            }
        ]
    }))
}

async fn handle_apply_tool(args: Value) -> Result<Value> {
    let path = args
        .get("path")
        .and_then(|v| v.as_str())
        .context("missing path argument")?;
    let tool = args
        .get("tool")
        .and_then(|v| v.as_str())
        .context("missing tool argument")?;
    let unsafe_allowed = args
        .get("unsafe")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    let descriptor = hc_registry::descriptor(tool)
        .with_context(|| format!("unknown tool '{tool}'"))?;
    if !descriptor.fixable() {
        anyhow::bail!("tool '{tool}' has no automatic fix");
    }

    let policy = PolicyInput {
        mode: Mode::Cli,
        interactive_tty: false,
        fix_requested: true,
        unsafe_allowed,
    };
    let outcome = run_for_request(vec![PathBuf::from(path)], policy, false).await?;
    let result = outcome
        .results
        .iter()
        .find(|r| r.tool == tool)
        .with_context(|| format!("tool '{tool}' did not run for {path}"))?;

    Ok(text_content(format!(
        "{} {} on {}: {}\n",
        if result.fixed { "applied" } else { "no change from" },
        tool,
        path,
        if result.success { "clean" } else { "issues remain" },
    )))
}

fn write_response(stdout: &std::io::Stdout, response: &JsonRpcResponse) -> Result<()> {
    let mut out = stdout.lock();
    serde_json::to_writer(&mut out, response).context("serialize response")?;
    out.write_all(b"\n").context("write newline")?;
    out.flush().context("flush stdout")?;
    Ok(())
}
