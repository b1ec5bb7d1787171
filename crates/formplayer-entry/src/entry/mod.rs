//! Per-datatype answer entries.
//!
//! An [`Entry`] holds what the user typed ([`RawAnswer`]) next to the
//! canonical [`Answer`] that is sent to the server. The kind is fixed when the
//! owning question is built and decides how raw input is validated and
//! normalized.

mod combobox;
mod geo;
mod numeric;
mod select;

use serde::Serialize;
use serde_json::Value;

use crate::answer::{Answer, RawAnswer};
use crate::datatype::{ADDRESS, Datatype, MINIMAL, NUMERIC, Style};
use crate::error::EntryError;

pub use combobox::{MatchMode, filter};

/// Entry variants, chosen from a question's datatype and style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    Int,
    LongInt,
    Float,
    Phone,
    FreeText,
    Address,
    Dropdown,
    SingleSelect,
    Combobox(MatchMode),
    MultiSelect,
    Date,
    Time,
    DateTime,
    GeoPoint,
    Info,
    Unsupported(String),
}

impl EntryKind {
    pub fn for_question(datatype: &Datatype, style: &Style) -> Self {
        match datatype {
            Datatype::Str | Datatype::Barcode => {
                if style.contains(NUMERIC) {
                    Self::Phone
                } else if style.contains(ADDRESS) {
                    Self::Address
                } else {
                    Self::FreeText
                }
            }
            Datatype::Int => Self::Int,
            Datatype::LongInt => Self::LongInt,
            Datatype::Float => Self::Float,
            Datatype::Select => {
                if style.contains(MINIMAL) {
                    Self::Dropdown
                } else if style.is_combobox() {
                    Self::Combobox(MatchMode::from_style(style))
                } else {
                    Self::SingleSelect
                }
            }
            Datatype::MultiSelect => Self::MultiSelect,
            Datatype::Date => Self::Date,
            Datatype::Time => Self::Time,
            Datatype::DateTime => Self::DateTime,
            Datatype::Geo => Self::GeoPoint,
            Datatype::Info => Self::Info,
            Datatype::Binary | Datatype::Unsupported(_) => {
                Self::Unsupported(datatype.as_str().to_string())
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Int => "IntEntry",
            Self::LongInt => "LongIntEntry",
            Self::Float => "FloatEntry",
            Self::Phone => "PhoneEntry",
            Self::FreeText => "FreeTextEntry",
            Self::Address => "AddressEntry",
            Self::Dropdown => "DropdownEntry",
            Self::SingleSelect => "SingleSelectEntry",
            Self::Combobox(_) => "ComboboxEntry",
            Self::MultiSelect => "MultiSelectEntry",
            Self::Date => "DateEntry",
            Self::Time => "TimeEntry",
            Self::DateTime => "DateTimeEntry",
            Self::GeoPoint => "GeoPointEntry",
            Self::Info => "InfoEntry",
            Self::Unsupported(_) => "UnsupportedEntry",
        }
    }

    pub fn template_type(&self) -> TemplateType {
        match self {
            Self::Int | Self::LongInt | Self::Float | Self::Phone => TemplateType::Str,
            Self::FreeText => TemplateType::Text,
            Self::Address => TemplateType::Address,
            Self::Dropdown => TemplateType::Dropdown,
            Self::SingleSelect | Self::MultiSelect => TemplateType::Select,
            Self::Combobox(_) => TemplateType::Combobox,
            Self::Date => TemplateType::Date,
            Self::Time => TemplateType::Time,
            Self::DateTime => TemplateType::DateTime,
            Self::GeoPoint => TemplateType::Geo,
            Self::Info => TemplateType::Info,
            Self::Unsupported(_) => TemplateType::Unsupported,
        }
    }

    /// Info and unsupported entries never carry an answer.
    pub fn is_read_only(&self) -> bool {
        matches!(self, Self::Info | Self::Unsupported(_))
    }

    pub fn uses_choices(&self) -> bool {
        matches!(
            self,
            Self::Dropdown | Self::SingleSelect | Self::Combobox(_) | Self::MultiSelect
        )
    }
}

/// Render hint consumed by the UI layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateType {
    Str,
    Text,
    Address,
    Dropdown,
    Select,
    Combobox,
    Date,
    Time,
    DateTime,
    Geo,
    Info,
    Unsupported,
}

impl TemplateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Text => "text",
            Self::Address => "address",
            Self::Dropdown => "dropdown",
            Self::Select => "select",
            Self::Combobox => "combobox",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::Geo => "geo",
            Self::Info => "info",
            Self::Unsupported => "unsupported",
        }
    }
}

/// A selectable option, 1-indexed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub text: String,
    pub idx: u32,
}

/// Result of feeding a raw value into an entry.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Transition {
    /// The canonical answer moved to a different value.
    pub changed: bool,
    pub error: Option<EntryError>,
}

#[derive(Debug, Clone)]
pub struct Entry {
    kind: EntryKind,
    choices: Vec<String>,
    raw: RawAnswer,
    answer: Answer,
}

impl Entry {
    pub fn new(kind: EntryKind, choices: Vec<String>) -> Self {
        Self {
            kind,
            choices,
            raw: RawAnswer::Empty,
            answer: Answer::Empty,
        }
    }

    /// Builds an entry seeded with the server's answer, without reporting a change.
    pub fn with_initial(kind: EntryKind, choices: Vec<String>, initial: &Value) -> Self {
        let mut entry = Self::new(kind, choices);
        entry.raw = entry.raw_from_wire(initial);
        entry.answer = entry.validate(&entry.raw).unwrap_or(Answer::Empty);
        entry
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    pub fn template_type(&self) -> TemplateType {
        self.kind.template_type()
    }

    pub fn choices(&self) -> &[String] {
        &self.choices
    }

    pub fn raw_answer(&self) -> &RawAnswer {
        &self.raw
    }

    pub fn answer(&self) -> &Answer {
        &self.answer
    }

    pub fn options(&self) -> Vec<ChoiceOption> {
        if self.kind.uses_choices() {
            select::options(&self.choices)
        } else {
            Vec::new()
        }
    }

    /// Options whose label passes the combobox filter for `query`.
    pub fn matching_options(&self, query: &str) -> Vec<ChoiceOption> {
        let mode = match &self.kind {
            EntryKind::Combobox(mode) => *mode,
            _ => MatchMode::Standard,
        };
        self.options()
            .into_iter()
            .filter(|option| filter(query, &option.text, mode))
            .collect()
    }

    pub fn is_valid(&self, raw: &RawAnswer) -> bool {
        self.validate(raw).is_ok()
    }

    pub fn validate(&self, raw: &RawAnswer) -> Result<Answer, EntryError> {
        let name = self.kind.name();
        match &self.kind {
            EntryKind::Int => numeric::int(text(raw, name)?, false),
            EntryKind::LongInt => numeric::int(text(raw, name)?, true),
            EntryKind::Float => numeric::float(text(raw, name)?),
            EntryKind::Phone => numeric::phone(text(raw, name)?),
            EntryKind::FreeText
            | EntryKind::Address
            | EntryKind::Date
            | EntryKind::Time
            | EntryKind::DateTime => Ok(text(raw, name)?
                .map(|value| Answer::Text(value.to_string()))
                .unwrap_or(Answer::Empty)),
            EntryKind::Dropdown | EntryKind::SingleSelect => {
                select::single(raw, &self.choices, name)
            }
            EntryKind::Combobox(_) => combobox::resolve(raw, &self.choices),
            EntryKind::MultiSelect => select::multiple(raw, &self.choices, name),
            EntryKind::GeoPoint => geo::point(raw, name),
            EntryKind::Info | EntryKind::Unsupported(_) => Ok(Answer::Empty),
        }
    }

    pub fn set_raw_answer(&mut self, raw: RawAnswer) -> Transition {
        if self.kind.is_read_only() {
            return Transition::default();
        }
        let result = self.validate(&raw);
        self.raw = raw;
        match result {
            Ok(answer) => Transition {
                changed: self.replace_answer(answer),
                error: None,
            },
            Err(error) => {
                // Combobox text that no longer names a choice drops the selection.
                let changed = matches!(self.kind, EntryKind::Combobox(_))
                    && self.replace_answer(Answer::Empty);
                Transition {
                    changed,
                    error: Some(error),
                }
            }
        }
    }

    /// Sets the canonical answer directly, deriving the raw value from it.
    pub fn set_answer(&mut self, answer: &Answer) -> Transition {
        let raw = self.raw_from_wire(&answer.to_value());
        self.set_raw_answer(raw)
    }

    /// Replaces the choice list and revalidates the current raw value
    /// against it. A raw value that no longer names a choice drops the answer.
    pub fn set_choices(&mut self, choices: Vec<String>) -> Transition {
        self.choices = choices;
        match self.validate(&self.raw) {
            Ok(answer) => Transition {
                changed: self.replace_answer(answer),
                error: None,
            },
            Err(error) => Transition {
                changed: self.replace_answer(Answer::Empty),
                error: Some(error),
            },
        }
    }

    /// Puts back a raw value typed before the entry was rebuilt. The answer
    /// is left alone.
    pub(crate) fn restore_raw(&mut self, raw: RawAnswer) {
        self.raw = raw;
    }

    fn replace_answer(&mut self, answer: Answer) -> bool {
        if self.answer == answer {
            return false;
        }
        self.answer = answer;
        true
    }

    fn raw_from_wire(&self, value: &Value) -> RawAnswer {
        if value.is_null() {
            return RawAnswer::Empty;
        }
        match &self.kind {
            EntryKind::Dropdown | EntryKind::SingleSelect => {
                index_of(value).map(RawAnswer::Choice).unwrap_or_default()
            }
            EntryKind::Combobox(_) => match index_of(value) {
                Some(idx) => idx
                    .checked_sub(1)
                    .and_then(|pos| self.choices.get(pos as usize))
                    .map(|label| RawAnswer::Text(label.clone()))
                    .unwrap_or_default(),
                None => wire_text(value).map(RawAnswer::Text).unwrap_or_default(),
            },
            EntryKind::MultiSelect => match value {
                Value::Array(items) => {
                    RawAnswer::Choices(items.iter().filter_map(index_of).collect())
                }
                other => index_of(other)
                    .map(|idx| RawAnswer::Choices(vec![idx]))
                    .unwrap_or_default(),
            },
            EntryKind::GeoPoint => match value.as_array().map(Vec::as_slice) {
                Some([lat, lon]) => match (lat.as_f64(), lon.as_f64()) {
                    (Some(lat), Some(lon)) => RawAnswer::Point([lat, lon]),
                    _ => RawAnswer::Empty,
                },
                _ => wire_text(value).map(RawAnswer::Text).unwrap_or_default(),
            },
            EntryKind::Info | EntryKind::Unsupported(_) => RawAnswer::Empty,
            _ => wire_text(value).map(RawAnswer::Text).unwrap_or_default(),
        }
    }
}

/// Text carried by a text-shaped raw value; `None` when empty or blank.
fn text<'a>(raw: &'a RawAnswer, entry: &'static str) -> Result<Option<&'a str>, EntryError> {
    match raw {
        RawAnswer::Empty => Ok(None),
        RawAnswer::Text(value) if value.trim().is_empty() => Ok(None),
        RawAnswer::Text(value) => Ok(Some(value)),
        _ => Err(EntryError::WrongShape {
            entry,
            expected: "text",
        }),
    }
}

fn wire_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn index_of(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|idx| u32::try_from(idx).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
