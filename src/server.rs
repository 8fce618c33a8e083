use anyhow::{Context, Result};
use serde_json::{json, Value};
use std::io::{BufRead, Write};
use std::path::PathBuf;

use crate::rules::RuleKind;
use crate::session::Session;
use crate::view::{RuleFilter, SortDirection, SortKey};

const INVALID_PARAMS: i64 = -32602;
const METHOD_NOT_FOUND: i64 = -32601;
const INTERNAL_ERROR: i64 = -32000;

struct RpcError {
    code: i64,
    message: String,
}

impl RpcError {
    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: INVALID_PARAMS,
            message: message.into(),
        }
    }

    fn internal(e: impl std::fmt::Display) -> Self {
        Self {
            code: INTERNAL_ERROR,
            message: e.to_string(),
        }
    }
}

type RpcResult = std::result::Result<Value, RpcError>;

#[derive(Default)]
pub struct ServerState {
    session: Option<Session>,
}

impl ServerState {
    /// Session for the request's `repoPath`, or the current one, or the cwd.
    fn session_for(&mut self, params: &Value) -> Result<&mut Session> {
        let requested = params.get("repoPath").and_then(|v| v.as_str()).map(PathBuf::from);
        let reuse = match (&self.session, &requested) {
            (Some(s), Some(p)) => s.repo_root() == p.as_path(),
            (Some(_), None) => true,
            (None, _) => false,
        };

        if !reuse {
            let root = requested
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from("."));
            let session = Session::open(&root)?;
            return Ok(self.session.insert(session));
        }

        self.session.as_mut().context("no open session")
    }

    fn handle(&mut self, method: &str, params: &Value) -> RpcResult {
        match method {
            "rules/list" => {
                let session = self.session_for(params).map_err(RpcError::internal)?;
                view_result(session, None)
            }
            "rules/add" | "rules/remove" => {
                let kind: RuleKind = parse_param(params, "kind")?;
                let pattern = str_param(params, "pattern")?;
                let session = self.session_for(params).map_err(RpcError::internal)?;
                let changed = if method == "rules/add" {
                    session.add_pattern(kind, pattern)
                } else {
                    session.remove_pattern(kind, pattern)
                }
                .map_err(RpcError::internal)?;
                view_result(session, Some(changed))
            }
            "view/setSortKey" => {
                let key: SortKey = parse_param(params, "sortKey")?;
                let session = self.session_for(params).map_err(RpcError::internal)?;
                session.engine().set_sort_key(key);
                view_result(session, None)
            }
            "view/setSortDirection" => {
                let direction: SortDirection = parse_param(params, "sortDirection")?;
                let session = self.session_for(params).map_err(RpcError::internal)?;
                session.engine().set_sort_direction(direction);
                view_result(session, None)
            }
            "view/setRuleFilter" => {
                let filter: RuleFilter = parse_param(params, "ruleFilter")?;
                let session = self.session_for(params).map_err(RpcError::internal)?;
                session.engine().set_rule_filter(filter);
                view_result(session, None)
            }
            "context/snapshot" => {
                let want_xml = params.get("xml").and_then(|v| v.as_bool()).unwrap_or(false);
                let session = self.session_for(params).map_err(RpcError::internal)?;
                let xml = if want_xml {
                    Some(session.write_payload().map_err(RpcError::internal)?.1)
                } else {
                    None
                };
                let snapshot = session.engine().snapshot();
                Ok(json!({
                    "files": snapshot.files,
                    "fileCount": snapshot.len(),
                    "totalTokens": snapshot.total_tokens(),
                    "xml": xml,
                }))
            }
            "codebase/refresh" => {
                let session = self.session_for(params).map_err(RpcError::internal)?;
                session.rescan().map_err(RpcError::internal)?;
                let listed = session.engine().listing().len();
                Ok(json!({
                    "listed": listed,
                    "skippedSize": session.skipped_size(),
                    "unreadable": session.unreadable(),
                }))
            }
            _ => Err(RpcError {
                code: METHOD_NOT_FOUND,
                message: format!("Method not found: {method}"),
            }),
        }
    }
}

fn view_result(session: &mut Session, changed: Option<bool>) -> RpcResult {
    let engine = session.engine();
    let (faulted, invalid) = {
        let r = engine.resolution();
        (r.faulted.clone(), r.invalid_patterns.clone())
    };
    let mut v = serde_json::to_value(engine.rule_view()).map_err(RpcError::internal)?;
    if let Value::Object(map) = &mut v {
        map.insert("faulted".into(), json!(faulted));
        map.insert("invalidPatterns".into(), json!(invalid));
        if let Some(changed) = changed {
            map.insert("changed".into(), json!(changed));
        }
    }
    Ok(v)
}

fn str_param<'a>(params: &'a Value, key: &str) -> std::result::Result<&'a str, RpcError> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| RpcError::invalid_params(format!("Missing {key}")))
}

fn parse_param<T>(params: &Value, key: &str) -> std::result::Result<T, RpcError>
where
    T: std::str::FromStr<Err = String>,
{
    str_param(params, key)?.parse::<T>().map_err(RpcError::invalid_params)
}

/// Line-delimited JSON-RPC 2.0 loop. Notifications (no `id`) and unparseable
/// lines get no reply.
pub fn serve<R: BufRead, W: Write>(input: R, mut output: W) -> Result<()> {
    let mut state = ServerState::default();

    for line in input.lines() {
        let Ok(line) = line else { continue };
        if line.trim().is_empty() {
            continue;
        }

        let msg: Value = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(_) => continue,
        };

        let Some(id) = msg.get("id").cloned() else {
            continue;
        };
        let method = msg.get("method").and_then(|m| m.as_str()).unwrap_or("");
        let params = msg.get("params").cloned().unwrap_or(json!({}));

        let reply = match method {
            "initialize" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": params.get("protocolVersion").cloned().unwrap_or(json!("2024-11-05")),
                    "capabilities": {},
                    "serverInfo": { "name": "ctxsteer", "version": env!("CARGO_PKG_VERSION") }
                }
            }),
            "ping" => json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {}
            }),
            _ => match state.handle(method, &params) {
                Ok(result) => json!({ "jsonrpc": "2.0", "id": id, "result": result }),
                Err(e) => json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "error": { "code": e.code, "message": e.message }
                }),
            },
        };

        writeln!(output, "{}", reply)?;
        output.flush()?;
    }

    Ok(())
}

pub fn run_stdio_server() -> Result<()> {
    let stdin = std::io::stdin();
    serve(stdin.lock(), std::io::stdout())
}
