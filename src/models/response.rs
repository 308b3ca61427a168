//! Response envelope shared by every backend endpoint

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::GENERIC_ERROR_MESSAGE;

/// `{success, message, data, error?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default)]
    pub message: String,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error: None,
        }
    }
}

/// Best user-facing reason carried by a failure body: `message`, then
/// `error` (string or object with a `message`), then the generic text.
pub fn failure_message(body: &Value) -> String {
    let from_message = body.get("message").and_then(Value::as_str);
    let from_error = body.get("error").and_then(|error| match error {
        Value::String(s) => Some(s.as_str()),
        Value::Object(_) => error.get("message").and_then(Value::as_str),
        _ => None,
    });

    from_message
        .into_iter()
        .chain(from_error)
        .map(str::trim)
        .find(|m| !m.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| GENERIC_ERROR_MESSAGE.to_string())
}
