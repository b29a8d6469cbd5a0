//! Request dispatcher and stdio serve loop.
//!
//! One request at a time: parse the line, look the tool up, check its
//! preconditions against the current store snapshot, run the body inside a
//! transaction together with the audit entry and work record, and answer
//! with a single text content item. A failed precondition audits as
//! `BLOCKED`, a failed body as `ERROR`; neither crashes the process.

use std::io::{self, BufRead, Write};

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::fsm::{self, PreconditionError};
use crate::store::{AuditEntry, AuditResult, StoreError, WorkRecord};
use crate::tools::{
    AuditInput, DecideInput, LinkInput, ProposeInput, ResolveInput, SearchInput, TestInput,
    ToolError, Tools, VerifyInput, ACTOR,
};

use super::{
    tool_catalogue, CallToolResult, Request, Response, METHOD_NOT_FOUND, PARSE_ERROR,
    PROTOCOL_VERSION, SERVER_NAME,
};

/// The engine's request-response server.
#[derive(Debug)]
pub struct Server {
    tools: Tools,
}

#[derive(Debug, Deserialize)]
struct CallParams {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Deserialize)]
struct DecisionIdArgs {
    decision_id: String,
}

#[derive(Debug, Deserialize)]
struct HolonIdArgs {
    holon_id: String,
}

#[derive(Debug, Deserialize)]
struct ResetArgs {
    #[serde(default)]
    reason: String,
}

impl Server {
    /// Creates a server over a tools layer.
    #[must_use]
    pub fn new(tools: Tools) -> Self {
        Self { tools }
    }

    /// The underlying tools layer. Used by tests to inspect state.
    #[must_use]
    pub fn tools(&self) -> &Tools {
        &self.tools
    }

    /// Serves line-delimited JSON-RPC until the reader closes.
    ///
    /// # Errors
    ///
    /// Returns an error when reading or writing the transport fails; tool
    /// and protocol errors are answered in-band.
    pub fn run<R: BufRead, W: Write>(&mut self, reader: R, mut writer: W) -> io::Result<()> {
        for line in reader.lines() {
            let line = line?;
            let Some(response) = self.handle_line(&line) else {
                continue;
            };
            match serde_json::to_string(&response) {
                Ok(payload) => {
                    writeln!(writer, "{payload}")?;
                    writer.flush()?;
                }
                Err(err) => error!(%err, "failed to serialize response"),
            }
        }
        info!("input stream closed, shutting down");
        Ok(())
    }

    /// Handles one request line. Returns `None` for blank lines and
    /// notifications.
    pub fn handle_line(&mut self, line: &str) -> Option<Response> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let request: Request = match serde_json::from_str(trimmed) {
            Ok(request) => request,
            Err(err) => {
                debug!(%err, "unparseable request line");
                return Some(Response::error(Value::Null, PARSE_ERROR, "Parse error"));
            }
        };

        let id = request.id.clone().unwrap_or(Value::Null);
        match request.method.as_str() {
            "initialize" => Some(Response::result(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {"tools": {}},
                    "serverInfo": {
                        "name": SERVER_NAME,
                        "version": env!("CARGO_PKG_VERSION"),
                    },
                }),
            )),
            "tools/list" => Some(Response::result(
                id,
                json!({"tools": tool_catalogue()}),
            )),
            "tools/call" => Some(self.handle_tools_call(id, request.params)),
            "notifications/initialized" => None,
            method => {
                if request.id.is_some() {
                    Some(Response::error(id, METHOD_NOT_FOUND, "Method not found"))
                } else {
                    debug!(method, "ignoring unknown notification");
                    None
                }
            }
        }
    }

    fn handle_tools_call(&mut self, id: Value, params: Option<Value>) -> Response {
        let Some(params) = params else {
            return Response::error(id, PARSE_ERROR, "Invalid params");
        };
        let call: CallParams = match serde_json::from_value(params) {
            Ok(call) => call,
            Err(_) => return Response::error(id, PARSE_ERROR, "Invalid params"),
        };
        let arguments = if call.arguments.is_null() {
            json!({})
        } else {
            call.arguments
        };

        let result = self.dispatch_tool(&call.name, &arguments);
        match serde_json::to_value(&result) {
            Ok(value) => Response::result(id, value),
            Err(err) => {
                error!(%err, "failed to encode tool result");
                Response::error(id, PARSE_ERROR, "Internal encoding error")
            }
        }
    }

    /// Runs one tool call end to end: preconditions, transactional body,
    /// audit entry, work record.
    fn dispatch_tool(&mut self, name: &str, args: &Value) -> CallToolResult {
        let operation = operation_for(name);
        let input_hash = hash_arguments(args);
        let target = target_from_args(args);

        if self.tools.store().is_ok() {
            let precondition = {
                let store = match self.tools.store() {
                    Ok(store) => store,
                    Err(err) => return CallToolResult::tool_error(err.to_string()),
                };
                fsm::check_preconditions(store, self.tools.context(), name, args)
            };
            match precondition {
                Ok(()) => {}
                Err(PreconditionError::Blocked(message)) => {
                    warn!(tool = name, "precondition blocked");
                    self.append_audit(
                        name,
                        operation,
                        target.as_deref(),
                        &input_hash,
                        AuditResult::Blocked,
                        Some(&message),
                    );
                    return CallToolResult::tool_error(message);
                }
                Err(PreconditionError::Store(err)) => {
                    let message = err.to_string();
                    self.append_audit(
                        name,
                        operation,
                        target.as_deref(),
                        &input_hash,
                        AuditResult::Error,
                        Some(&message),
                    );
                    return CallToolResult::tool_error(message);
                }
            }
        }

        let started = Utc::now();
        let outcome = if name == "quint_internalize" {
            // Internalize may create the store itself; bookkeeping happens
            // after the fact instead of inside a transaction.
            let outcome = self.tools.internalize();
            if outcome.is_ok() {
                self.append_audit(
                    name,
                    operation,
                    target.as_deref(),
                    &input_hash,
                    AuditResult::Success,
                    None,
                );
                self.append_work(name, started);
            }
            outcome
        } else {
            self.execute_in_transaction(name, args, operation, &target, &input_hash, started)
        };

        match outcome {
            Ok(text) => {
                debug!(tool = name, "tool call succeeded");
                CallToolResult::text(text)
            }
            Err(err) => {
                let message = err.to_string();
                warn!(tool = name, error = %message, "tool call failed");
                self.append_audit(
                    name,
                    operation,
                    target.as_deref(),
                    &input_hash,
                    AuditResult::Error,
                    Some(&message),
                );
                CallToolResult::tool_error(message)
            }
        }
    }

    /// Runs a tool body, the success audit entry and the work record inside
    /// one transaction, so layer changes, evidence appends and the ledger
    /// commit atomically. Dropping the transaction on error rolls all of it
    /// back.
    fn execute_in_transaction(
        &self,
        name: &str,
        args: &Value,
        operation: &str,
        target: &Option<String>,
        input_hash: &str,
        started: chrono::DateTime<Utc>,
    ) -> Result<String, ToolError> {
        let store = self.tools.store()?;
        let tx = store.begin()?;
        let text = self.call_tool(name, args)?;

        store.insert_audit(&AuditEntry {
            id: Tools::new_id("log"),
            tool_name: name.to_string(),
            operation: operation.to_string(),
            actor: ACTOR.to_string(),
            target_id: target.clone(),
            input_hash: Some(input_hash.to_string()),
            result: AuditResult::Success,
            details: None,
            context_id: self.tools.context().to_string(),
            created_at: Utc::now(),
        })?;
        let ended = Utc::now();
        store.record_work(&WorkRecord {
            id: Tools::new_id("work"),
            method_ref: name.to_string(),
            performer_ref: ACTOR.to_string(),
            started_at: started,
            ended_at: Some(ended),
            resource_ledger: Some(
                json!({"duration_ms": (ended - started).num_milliseconds()}).to_string(),
            ),
        })?;

        tx.commit().map_err(StoreError::from)?;
        Ok(text)
    }

    fn call_tool(&self, name: &str, args: &Value) -> Result<String, ToolError> {
        match name {
            "quint_propose" => {
                let input: ProposeInput = parse_args(args)?;
                self.tools.propose_hypothesis(&input)
            }
            "quint_verify" => {
                let input: VerifyInput = parse_args(args)?;
                self.tools.verify_hypothesis(&input)
            }
            "quint_test" => {
                let input: TestInput = parse_args(args)?;
                self.tools.test_hypothesis(&input)
            }
            "quint_audit" => {
                let input: AuditInput = parse_args(args)?;
                self.tools.audit_evidence(&input)
            }
            "quint_decide" => {
                let input: DecideInput = parse_args(args)?;
                self.tools.finalize_decision(&input)
            }
            "quint_resolve" => {
                let input: ResolveInput = parse_args(args)?;
                self.tools.resolve_decision(&input)
            }
            "quint_implement" => {
                let input: DecisionIdArgs = parse_args(args)?;
                self.tools.implementation_directive(&input.decision_id)
            }
            "quint_link" => {
                let input: LinkInput = parse_args(args)?;
                self.tools.link_holons(&input)
            }
            "quint_search" => {
                let input: SearchInput = parse_args(args)?;
                self.tools.search(&input)
            }
            "quint_calculate_r" => {
                let input: HolonIdArgs = parse_args(args)?;
                self.tools.calculate_r(&input.holon_id)
            }
            "quint_audit_tree" => {
                let input: HolonIdArgs = parse_args(args)?;
                self.tools.audit_tree(&input.holon_id)
            }
            "quint_reset" => {
                let input: ResetArgs = parse_args(args)?;
                self.tools.reset_cycle(&input.reason)
            }
            other => Err(ToolError::InvalidArgument(format!("unknown tool: {other}"))),
        }
    }

    fn append_audit(
        &self,
        tool: &str,
        operation: &str,
        target: Option<&str>,
        input_hash: &str,
        result: AuditResult,
        details: Option<&str>,
    ) {
        let Ok(store) = self.tools.store() else {
            return;
        };
        let entry = AuditEntry {
            id: Tools::new_id("log"),
            tool_name: tool.to_string(),
            operation: operation.to_string(),
            actor: ACTOR.to_string(),
            target_id: target.map(str::to_string),
            input_hash: Some(input_hash.to_string()),
            result,
            details: details.map(str::to_string),
            context_id: self.tools.context().to_string(),
            created_at: Utc::now(),
        };
        if let Err(err) = store.insert_audit(&entry) {
            error!(%err, tool, "failed to append audit entry");
        }
    }

    fn append_work(&self, tool: &str, started: chrono::DateTime<Utc>) {
        let Ok(store) = self.tools.store() else {
            return;
        };
        let ended = Utc::now();
        let record = WorkRecord {
            id: Tools::new_id("work"),
            method_ref: tool.to_string(),
            performer_ref: ACTOR.to_string(),
            started_at: started,
            ended_at: Some(ended),
            resource_ledger: Some(
                json!({"duration_ms": (ended - started).num_milliseconds()}).to_string(),
            ),
        };
        if let Err(err) = store.record_work(&record) {
            error!(%err, tool, "failed to append work record");
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: &Value) -> Result<T, ToolError> {
    serde_json::from_value(args.clone())
        .map_err(|err| ToolError::InvalidArgument(format!("invalid arguments: {err}")))
}

/// Audit-log operation label per tool.
fn operation_for(name: &str) -> &'static str {
    match name {
        "quint_internalize" => "internalize",
        "quint_propose" => "create_hypothesis",
        "quint_verify" => "verify_hypothesis",
        "quint_test" => "validate_hypothesis",
        "quint_audit" => "audit_evidence",
        "quint_decide" => "finalize_decision",
        "quint_resolve" => "resolve_decision",
        "quint_implement" => "implementation_directive",
        "quint_link" => "link_holons",
        "quint_search" => "search",
        "quint_calculate_r" => "calculate_reliability",
        "quint_audit_tree" => "visualize_audit",
        "quint_reset" => "cycle_reset",
        _ => "unknown",
    }
}

/// The primary target holon named in the arguments, if any.
fn target_from_args(args: &Value) -> Option<String> {
    for key in [
        "hypothesis_id",
        "holon_id",
        "decision_id",
        "winner_id",
        "source_id",
    ] {
        if let Some(value) = args.get(key).and_then(Value::as_str) {
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Deterministic hash of the argument object, recorded in the audit ledger.
fn hash_arguments(args: &Value) -> String {
    use sha2::{Digest, Sha256};
    hex::encode(Sha256::digest(args.to_string().as_bytes()))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{hash_arguments, operation_for, target_from_args};

    #[test]
    fn argument_hashing_is_deterministic_and_order_insensitive() {
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": 2, "x": 1}"#).unwrap();
        assert_eq!(hash_arguments(&a), hash_arguments(&b));
        assert_ne!(hash_arguments(&a), hash_arguments(&json!({"x": 1})));
    }

    #[test]
    fn target_extraction_prefers_specific_keys() {
        assert_eq!(
            target_from_args(&json!({"hypothesis_id": "h1", "winner_id": "w1"})),
            Some("h1".to_string())
        );
        assert_eq!(
            target_from_args(&json!({"winner_id": "w1"})),
            Some("w1".to_string())
        );
        assert_eq!(target_from_args(&json!({"query": "x"})), None);
    }

    #[test]
    fn every_catalogue_tool_has_an_operation_label() {
        for tool in crate::protocol::tool_catalogue() {
            assert_ne!(operation_for(tool.name), "unknown", "{}", tool.name);
        }
    }
}
