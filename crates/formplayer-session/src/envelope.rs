//! JSON envelopes exchanged with the formplayer server.

use std::collections::BTreeMap;

use formplayer_entry::Answer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation requested from the server; serialized as the `action` field
/// next to the action's own fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    NewForm {
        #[serde(rename = "form-url")]
        form_url: String,
        #[serde(rename = "session-data", skip_serializing_if = "Value::is_null")]
        session_data: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        lang: Option<String>,
    },
    Answer {
        ix: String,
        answer: Answer,
    },
    NewRepeat {
        ix: String,
    },
    DeleteRepeat {
        ix: String,
    },
    SubmitAll {
        answers: BTreeMap<String, Answer>,
        prevalidated: bool,
    },
    EvaluateXpath {
        xpath: String,
    },
    ChangeLang {
        lang: String,
    },
}

impl Action {
    /// Wire name, also the last path segment of the request URL.
    pub fn name(&self) -> &'static str {
        match self {
            Self::NewForm { .. } => "new-form",
            Self::Answer { .. } => "answer",
            Self::NewRepeat { .. } => "new-repeat",
            Self::DeleteRepeat { .. } => "delete-repeat",
            Self::SubmitAll { .. } => "submit-all",
            Self::EvaluateXpath { .. } => "evaluate-xpath",
            Self::ChangeLang { .. } => "change-lang",
        }
    }

    /// Queue task name. Answers are named per question so a newer answer can
    /// replace one that has not been sent yet.
    pub fn task_name(&self) -> String {
        match self {
            Self::Answer { ix, .. } => answer_task_name(ix),
            other => other.name().to_string(),
        }
    }
}

pub(crate) fn answer_task_name(ix: &str) -> String {
    format!("answer:{ix}")
}

/// Request body: the action plus session identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    #[serde(flatten)]
    pub action: Action,
    #[serde(rename = "session-id", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restore_as: Option<String>,
}

impl Request {
    pub fn new(action: Action) -> Self {
        Self {
            action,
            session_id: None,
            domain: None,
            username: None,
            restore_as: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Status {
    Success,
    Error,
    Accepted,
    ValidationError,
    #[serde(other)]
    Unknown,
}

/// Per-question problem reported on submit or answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionError {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl QuestionError {
    pub fn message(&self) -> String {
        if let Some(reason) = self.reason.as_deref().filter(|reason| !reason.is_empty()) {
            return reason.to_string();
        }
        match self.kind.as_deref() {
            Some("required") => "An answer is required".to_string(),
            _ => "Invalid answer".to_string(),
        }
    }
}

/// Response body. Fields the engine does not interpret are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(
        default,
        alias = "session-id",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tree: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub langs: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_readable_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_html: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<BTreeMap<String, QuestionError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Response {
    pub fn success() -> Self {
        Self {
            status: Some(Status::Success),
            ..Self::default()
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == Some(Status::Error)
    }

    pub fn is_validation_error(&self) -> bool {
        self.status == Some(Status::ValidationError)
    }

    /// The answer-level problem carried by a `validation-error` response.
    pub fn validation_error(&self) -> QuestionError {
        QuestionError {
            kind: self.kind.clone(),
            reason: self.reason.clone(),
        }
    }
}
