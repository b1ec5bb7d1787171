//! Messages shown to the user when a request fails.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::Response;
use crate::error::TransportError;

pub const TIMEOUT_ERROR: &str = "The server is taking too long to respond. Please check your internet connection and try again.";
pub const GENERIC_ERROR: &str = "Something unexpected went wrong on that request.";
pub const CALLBACK_ERROR: &str = "Something went wrong while processing the server response.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub human_readable_message: String,
    #[serde(default)]
    pub is_html: bool,
}

impl ErrorReport {
    pub fn text(message: impl Into<String>) -> Self {
        Self {
            human_readable_message: message.into(),
            is_html: false,
        }
    }

    pub fn timeout() -> Self {
        Self::text(TIMEOUT_ERROR)
    }

    /// Report for a response whose status is `error`.
    pub fn from_response(response: &Response) -> Self {
        let message = response
            .human_readable_message
            .clone()
            .or_else(|| response.reason.clone())
            .unwrap_or_else(|| GENERIC_ERROR.to_string());
        Self {
            human_readable_message: message,
            is_html: response.is_html.unwrap_or(false),
        }
    }

    pub fn from_callback(error: &anyhow::Error) -> Self {
        Self::text(format!("{CALLBACK_ERROR} {error}"))
    }

    /// Report for a request that never produced a usable response.
    pub fn from_failure(error: &TransportError) -> Self {
        match error {
            TransportError::Timeout => Self::timeout(),
            TransportError::Http {
                body: Some(body), ..
            } => body_report(body).unwrap_or_else(|| generic(error)),
            other => generic(other),
        }
    }
}

fn generic(error: &TransportError) -> ErrorReport {
    ErrorReport::text(format!("{GENERIC_ERROR} {error}"))
}

fn body_report(body: &Value) -> Option<ErrorReport> {
    let message = ["human_readable_message", "message"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))?;
    Some(ErrorReport {
        human_readable_message: message.to_string(),
        is_html: body.get("is_html").and_then(Value::as_bool).unwrap_or(false),
    })
}

/// Body sent to the error-report endpoint after a failed request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub action: String,
    #[serde(rename = "session-id", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub message: String,
}
