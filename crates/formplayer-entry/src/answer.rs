use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use serde_json::Value;

/// Canonical answer as sent to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Empty,
    Int(i64),
    Float(f64),
    Text(String),
    /// 1-indexed choice.
    Select(u32),
    /// Sorted, deduplicated 1-indexed choices.
    MultiSelect(Vec<u32>),
    /// `[latitude, longitude]`.
    Geo([f64; 2]),
}

/// Sentinel for "no answer"; serialized as `null`.
pub const NO_ANSWER: Answer = Answer::Empty;

impl Answer {
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for Answer {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_none(),
            Self::Int(value) => serializer.serialize_i64(*value),
            Self::Float(value) => serializer.serialize_f64(*value),
            Self::Text(value) => serializer.serialize_str(value),
            Self::Select(idx) => serializer.serialize_u32(*idx),
            Self::MultiSelect(indices) => {
                let mut seq = serializer.serialize_seq(Some(indices.len()))?;
                for idx in indices {
                    seq.serialize_element(idx)?;
                }
                seq.end()
            }
            Self::Geo(point) => {
                let mut seq = serializer.serialize_seq(Some(2))?;
                seq.serialize_element(&point[0])?;
                seq.serialize_element(&point[1])?;
                seq.end()
            }
        }
    }
}

/// Value as entered in the UI, before validation.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum RawAnswer {
    #[default]
    Empty,
    Text(String),
    Choice(u32),
    Choices(Vec<u32>),
    Point([f64; 2]),
}

impl RawAnswer {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for RawAnswer {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawAnswer {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<u32> for RawAnswer {
    fn from(value: u32) -> Self {
        Self::Choice(value)
    }
}

impl From<Vec<u32>> for RawAnswer {
    fn from(value: Vec<u32>) -> Self {
        Self::Choices(value)
    }
}

impl From<[f64; 2]> for RawAnswer {
    fn from(value: [f64; 2]) -> Self {
        Self::Point(value)
    }
}
