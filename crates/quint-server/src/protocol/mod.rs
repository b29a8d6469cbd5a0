//! Line-delimited JSON-RPC 2.0 surface.
//!
//! Requests arrive one JSON object per line on stdin; each produces exactly
//! one response object on stdout. Diagnostics never touch stdout, which is
//! reserved for the protocol.
//!
//! Supported methods: `initialize`, `tools/list`, `tools/call`, and the
//! `notifications/initialized` no-op. Parse failures answer with `-32700`;
//! unknown methods answer with `-32601` when the request carries an id and
//! are ignored otherwise.

mod catalog;
mod server;

pub use catalog::{tool_catalogue, ToolSpec};
pub use server::Server;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC parse error code.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC method-not-found error code.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Protocol version answered by `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";
/// Server name answered by `initialize`.
pub const SERVER_NAME: &str = "quint-code";

/// An incoming JSON-RPC request.
#[derive(Debug, Deserialize)]
pub struct Request {
    /// Protocol marker, `"2.0"`.
    #[serde(default)]
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Method parameters, shape depending on the method.
    #[serde(default)]
    pub params: Option<Value>,
    /// Request id; absent for notifications.
    #[serde(default)]
    pub id: Option<Value>,
}

/// An outgoing JSON-RPC response.
#[derive(Debug, Serialize)]
pub struct Response {
    /// Protocol marker, always `"2.0"`.
    pub jsonrpc: &'static str,
    /// Result payload on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
    /// The request id this answers, `null` when it could not be read.
    pub id: Value,
}

impl Response {
    /// A successful response.
    #[must_use]
    pub fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    /// A protocol-level error response.
    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
            }),
            id,
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Serialize)]
pub struct RpcError {
    /// Error code.
    pub code: i64,
    /// Human-readable message.
    pub message: String,
}

/// Result payload of `tools/call`.
#[derive(Debug, Serialize)]
pub struct CallToolResult {
    /// Content items; this engine always answers with one text item.
    pub content: Vec<ContentItem>,
    /// Set when the call failed at the tool level.
    #[serde(rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl CallToolResult {
    /// A successful textual result.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: false,
        }
    }

    /// A tool-level error carrying a human-readable reason.
    #[must_use]
    pub fn tool_error(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentItem::text(text)],
            is_error: true,
        }
    }
}

/// One content item of a tool result.
#[derive(Debug, Serialize)]
pub struct ContentItem {
    /// Content type; always `"text"`.
    #[serde(rename = "type")]
    pub content_type: &'static str,
    /// The text payload.
    pub text: String,
}

impl ContentItem {
    /// A text content item.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_type: "text",
            text: text.into(),
        }
    }
}
