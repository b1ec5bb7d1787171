use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::answer::{Answer, RawAnswer};
use crate::bus::{AnswerEvent, EventBus, Notification};
use crate::datatype::{Datatype, Style};
use crate::entry::{Entry, EntryKind, Transition};
use crate::error::{EntryError, FormError};

/// Question node as sent by the form-playback server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionJson {
    pub ix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_id: Option<String>,
    #[serde(rename = "type", default = "question_node_type")]
    pub node_type: String,
    pub datatype: Datatype,
    #[serde(default, deserialize_with = "required_flag")]
    pub required: bool,
    #[serde(default = "default_relevant", deserialize_with = "relevant_flag")]
    pub relevant: bool,
    #[serde(default, deserialize_with = "nullable_style")]
    pub style: Style,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    #[serde(default)]
    pub answer: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

fn question_node_type() -> String {
    "question".into()
}

fn default_relevant() -> bool {
    true
}

/// The server sends flags as `0`/`1`; booleans and `null` are tolerated.
#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
}

fn required_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(flag)) => flag,
        Some(Flag::Int(flag)) => flag != 0,
        None => false,
    })
}

fn relevant_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    Ok(match Option::<Flag>::deserialize(deserializer)? {
        Some(Flag::Bool(flag)) => flag,
        Some(Flag::Int(flag)) => flag != 0,
        None => true,
    })
}

fn nullable_style<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Style, D::Error> {
    Ok(Option::<Style>::deserialize(deserializer)?.unwrap_or_default())
}

/// Outcome of a raw answer change, as seen by the question.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerOutcome {
    Changed,
    Unchanged,
    Invalid(EntryError),
}

/// One question of a form. Owns the single entry chosen for it at construction.
#[derive(Debug, Clone)]
pub struct Question {
    node: QuestionJson,
    entry: Entry,
    error: Option<String>,
    server_error: Option<String>,
    bus: Option<EventBus>,
}

impl Question {
    pub fn new(node: QuestionJson) -> Self {
        let kind = EntryKind::for_question(&node.datatype, &node.style);
        let choices = node.choices.clone().unwrap_or_default();
        let entry = Entry::with_initial(kind, choices, &node.answer);
        Self {
            node,
            entry,
            error: None,
            server_error: None,
            bus: None,
        }
    }

    pub fn from_value(value: &Value) -> Result<Self, FormError> {
        let node: QuestionJson = serde_json::from_value(value.clone())?;
        Ok(Self::new(node))
    }

    /// Publishes answer changes on `bus` from now on.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    pub fn node(&self) -> &QuestionJson {
        &self.node
    }

    pub fn ix(&self) -> &str {
        &self.node.ix
    }

    pub fn caption(&self) -> Option<&str> {
        self.node.caption.as_deref()
    }

    pub fn binding(&self) -> Option<&str> {
        self.node.binding.as_deref()
    }

    pub fn datatype(&self) -> &Datatype {
        &self.node.datatype
    }

    pub fn style(&self) -> &Style {
        &self.node.style
    }

    pub fn required(&self) -> bool {
        self.node.required
    }

    pub fn relevant(&self) -> bool {
        self.node.relevant
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn choices(&self) -> &[String] {
        self.entry.choices()
    }

    pub fn answer(&self) -> &Answer {
        self.entry.answer()
    }

    pub fn is_answered(&self) -> bool {
        !self.entry.answer().is_empty()
    }

    /// Local validation error for the last raw value, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Error reported by the server for the last submitted answer.
    pub fn server_error(&self) -> Option<&str> {
        self.server_error.as_deref()
    }

    pub fn set_server_error(&mut self, message: Option<String>) {
        self.server_error = message;
    }

    pub fn set_raw_answer(&mut self, raw: impl Into<RawAnswer>) -> AnswerOutcome {
        let (outcome, notification) = self.stage_raw_answer(raw);
        self.publish(notification);
        outcome
    }

    /// Like [`Question::set_raw_answer`], but hands back the answer
    /// notification instead of publishing it, so a caller holding a lock
    /// over the form can publish once it lets go.
    pub fn stage_raw_answer(
        &mut self,
        raw: impl Into<RawAnswer>,
    ) -> (AnswerOutcome, Option<Notification>) {
        let transition = self.entry.set_raw_answer(raw.into());
        self.settle(transition)
    }

    pub fn set_answer(&mut self, answer: &Answer) -> AnswerOutcome {
        let transition = self.entry.set_answer(answer);
        let (outcome, notification) = self.settle(transition);
        self.publish(notification);
        outcome
    }

    /// Replaces the choice list; the current raw value must still name a
    /// choice, otherwise the answer is cleared and the error set.
    pub fn set_choices(&mut self, choices: Vec<String>) -> AnswerOutcome {
        self.node.choices = Some(choices.clone());
        let transition = self.entry.set_choices(choices);
        let (outcome, notification) = self.settle(transition);
        self.publish(notification);
        outcome
    }

    /// Takes over what the user had on `previous`, the same question before
    /// the tree was rebuilt. Server errors survive while the entry kind is
    /// unchanged; the typed value and its local error survive only when the
    /// server left the answer where it was.
    pub(crate) fn carry_over(&mut self, previous: &Question) -> bool {
        if self.entry.kind() != previous.entry.kind() {
            return false;
        }
        self.server_error = previous.server_error.clone();
        if self.entry.answer() == previous.entry.answer() {
            self.entry.restore_raw(previous.entry.raw_answer().clone());
            self.error = previous.error.clone();
        }
        true
    }

    fn settle(&mut self, transition: Transition) -> (AnswerOutcome, Option<Notification>) {
        let notification = transition.changed.then(|| {
            self.server_error = None;
            Notification::Answer(AnswerEvent {
                ix: self.node.ix.clone(),
                binding: self.node.binding.clone(),
                answer: self.entry.answer().clone(),
            })
        });
        let outcome = match transition.error {
            Some(error) => {
                debug!(ix = %self.node.ix, %error, "rejected raw answer");
                self.error = Some(error.to_string());
                AnswerOutcome::Invalid(error)
            }
            None => {
                self.error = None;
                if transition.changed {
                    AnswerOutcome::Changed
                } else {
                    AnswerOutcome::Unchanged
                }
            }
        };
        (outcome, notification)
    }

    fn publish(&self, notification: Option<Notification>) {
        if let (Some(bus), Some(notification)) = (&self.bus, notification) {
            bus.publish(&notification);
        }
    }
}
