//! JSON wire types for the WebSocket RPC protocol.
//!
//! Three frame shapes travel the socket: requests, responses, and
//! server-pushed events. A request without an `id` is a notification and
//! receives no response frame.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use hive_core::now_millis;

use crate::error::{RpcError, PARSE_ERROR};

/// Frame type for task-feed pushes (snapshot drain and live tail).
pub const TASK_FEED_FRAME: &str = "task.feed";
/// Frame type for relayed chat lines.
pub const CHAT_MESSAGE_FRAME: &str = "chat.message";

/// Incoming RPC request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcRequest {
    /// Request identifier, echoed in the response. Absent for notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    /// Method name (e.g. `task.create`).
    pub method: String,
    /// Optional parameters object.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// Outgoing response to one request.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Echoed request identifier (`null` when the request was unparseable).
    pub id: Value,
    /// Whether the call succeeded.
    pub success: bool,
    /// Result payload, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error payload, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorBody>,
}

/// Structured error body inside a failed response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcErrorBody {
    /// Machine-readable code (e.g. `NOT_FOUND`).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional structured details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Server-pushed event frame. Carries no `id`; clients tell it apart from
/// responses by the `type` field.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcEvent {
    /// Frame type (e.g. `task.feed`, `chat.message`).
    #[serde(rename = "type")]
    pub frame_type: String,
    /// Event payload.
    pub data: Value,
    /// RFC 3339 timestamp with millisecond precision.
    pub timestamp: String,
}

impl RpcResponse {
    /// Build a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            id,
            success: true,
            result: Some(result),
            error: None,
        }
    }

    /// Build an error response from a handler error.
    pub fn failure(id: Value, error: &RpcError) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(error.to_error_body()),
        }
    }

    /// Build an error response with an explicit code.
    pub fn error(id: Value, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            result: None,
            error: Some(RpcErrorBody {
                code: code.into(),
                message: message.into(),
                details: None,
            }),
        }
    }

    /// Response for a frame that could not be parsed as a request.
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, PARSE_ERROR, message)
    }
}

impl RpcEvent {
    /// Build an event stamped with the current time.
    pub fn new(frame_type: impl Into<String>, data: Value) -> Self {
        Self {
            frame_type: frame_type.into(),
            data,
            timestamp: now_millis(),
        }
    }
}

// ── Param extraction ────────────────────────────────────────────────

/// Required string parameter.
pub fn require_str<'a>(params: &'a Value, key: &str) -> Result<&'a str, RpcError> {
    params
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| RpcError::InvalidArgument(format!("Missing required parameter '{key}'")))
}

/// Optional string parameter; present-but-wrong-type is an error.
pub fn optional_str<'a>(params: &'a Value, key: &str) -> Result<Option<&'a str>, RpcError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(RpcError::InvalidArgument(format!(
            "Parameter '{key}' must be a string"
        ))),
    }
}

/// Optional integer parameter.
pub fn optional_i64(params: &Value, key: &str) -> Result<Option<i64>, RpcError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_i64().map(Some).ok_or_else(|| {
            RpcError::InvalidArgument(format!("Parameter '{key}' must be an integer"))
        }),
    }
}

/// Optional boolean parameter.
pub fn optional_bool(params: &Value, key: &str) -> Result<Option<bool>, RpcError> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => value.as_bool().map(Some).ok_or_else(|| {
            RpcError::InvalidArgument(format!("Parameter '{key}' must be a boolean"))
        }),
    }
}

/// Optional non-negative integer parameter, for limits and offsets.
pub fn optional_u32(params: &Value, key: &str) -> Result<Option<u32>, RpcError> {
    match optional_i64(params, key)? {
        None => Ok(None),
        Some(n) => u32::try_from(n).map(Some).map_err(|_| {
            RpcError::InvalidArgument(format!("Parameter '{key}' must be a non-negative integer"))
        }),
    }
}
