use crate::answer::{Answer, RawAnswer};
use crate::datatype::{COMBOBOX_FUZZY, COMBOBOX_MULTIWORD, Style};
use crate::error::EntryError;

/// How typed text narrows a combobox's suggestion list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// The label starts with the query.
    #[default]
    Standard,
    /// Every query word starts some word of the label.
    Multiword,
    /// The label starts with the query, or contains its characters in order.
    Fuzzy,
}

impl MatchMode {
    pub fn from_style(style: &Style) -> Self {
        if style.contains(COMBOBOX_MULTIWORD) {
            Self::Multiword
        } else if style.contains(COMBOBOX_FUZZY) {
            Self::Fuzzy
        } else {
            Self::Standard
        }
    }
}

/// Case-insensitive filter applied to each option label. An empty query
/// keeps every option.
pub fn filter(query: &str, label: &str, mode: MatchMode) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    let haystack = label.to_lowercase();
    match mode {
        MatchMode::Standard => haystack.starts_with(&needle),
        MatchMode::Multiword => {
            let words: Vec<&str> = haystack.split_whitespace().collect();
            needle
                .split_whitespace()
                .all(|term| words.iter().any(|word| word.starts_with(term)))
        }
        MatchMode::Fuzzy => haystack.starts_with(&needle) || is_subsequence(&needle, &haystack),
    }
}

fn is_subsequence(needle: &str, haystack: &str) -> bool {
    let mut remaining = haystack.chars();
    needle
        .chars()
        .all(|wanted| remaining.by_ref().any(|candidate| candidate == wanted))
}

/// Maps typed text onto the 1-indexed choice whose label it names.
pub(crate) fn resolve(raw: &RawAnswer, choices: &[String]) -> Result<Answer, EntryError> {
    let text = match raw {
        RawAnswer::Empty => return Ok(Answer::Empty),
        RawAnswer::Text(text) => text.trim(),
        RawAnswer::Choice(idx) => {
            return if *idx >= 1 && (*idx as usize) <= choices.len() {
                Ok(Answer::Select(*idx))
            } else {
                Err(EntryError::ChoiceOutOfRange {
                    index: *idx,
                    available: choices.len(),
                })
            };
        }
        _ => {
            return Err(EntryError::WrongShape {
                entry: "ComboboxEntry",
                expected: "text",
            });
        }
    };
    if text.is_empty() {
        return Ok(Answer::Empty);
    }
    let wanted = text.to_lowercase();
    choices
        .iter()
        .position(|label| label.trim().to_lowercase() == wanted)
        .map(|pos| Answer::Select(pos as u32 + 1))
        .ok_or_else(|| EntryError::UnknownChoice(text.to_string()))
}
