use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where and as whom a session plays its form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Base URL of the formplayer server; actions are posted below it.
    pub xform_url: Url,
    pub form_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub session_data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restore_as: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Failed requests are reported here when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_report_url: Option<Url>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl SessionConfig {
    pub fn new(xform_url: Url, form_url: impl Into<String>) -> Self {
        Self {
            xform_url,
            form_url: form_url.into(),
            lang: None,
            session_data: Value::Null,
            domain: None,
            username: None,
            restore_as: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            error_report_url: None,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}
