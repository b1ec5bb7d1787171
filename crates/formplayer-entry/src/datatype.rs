use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const MINIMAL: &str = "minimal";
pub const COMBOBOX: &str = "combobox";
pub const COMBOBOX_MULTIWORD: &str = "combobox-multiword";
pub const COMBOBOX_FUZZY: &str = "combobox-fuzzy";
pub const NUMERIC: &str = "numeric";
pub const ADDRESS: &str = "address";

/// Question data types as sent by the form-playback server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Datatype {
    Str,
    Int,
    LongInt,
    Float,
    Select,
    MultiSelect,
    Date,
    Time,
    DateTime,
    Geo,
    Info,
    Barcode,
    Binary,
    Unsupported(String),
}

impl Datatype {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::LongInt => "longint",
            Self::Float => "float",
            Self::Select => "select",
            Self::MultiSelect => "multiselect",
            Self::Date => "date",
            Self::Time => "time",
            Self::DateTime => "datetime",
            Self::Geo => "geo",
            Self::Info => "info",
            Self::Barcode => "barcode",
            Self::Binary => "binary",
            Self::Unsupported(raw) => raw,
        }
    }

    pub fn parse(raw: &str) -> Self {
        match raw {
            "str" => Self::Str,
            "int" => Self::Int,
            "longint" => Self::LongInt,
            "float" => Self::Float,
            "select" => Self::Select,
            "multiselect" => Self::MultiSelect,
            "date" => Self::Date,
            "time" => Self::Time,
            "datetime" => Self::DateTime,
            "geo" => Self::Geo,
            "info" => Self::Info,
            "barcode" => Self::Barcode,
            "binary" => Self::Binary,
            other => Self::Unsupported(other.to_string()),
        }
    }
}

impl Serialize for Datatype {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Datatype {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(Self::parse(&raw))
    }
}

/// Style hints attached to a question, e.g. `{"raw": "minimal"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Style {
    pub fn new(raw: impl Into<String>) -> Self {
        Self {
            raw: Some(raw.into()),
        }
    }

    pub fn hints(&self) -> impl Iterator<Item = &str> {
        self.raw.as_deref().unwrap_or_default().split_whitespace()
    }

    pub fn contains(&self, hint: &str) -> bool {
        self.hints().any(|candidate| candidate == hint)
    }

    pub fn is_combobox(&self) -> bool {
        self.hints().any(|hint| hint.starts_with(COMBOBOX))
    }
}
