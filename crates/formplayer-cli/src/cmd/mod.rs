pub mod check;
pub mod filter;
pub mod play;

use formplayer_entry::{EntryKind, RawAnswer};

/// Reads typed text the way the entry of `kind` expects it: choice numbers
/// for selects, text for everything else. Blank input clears the answer.
pub fn raw_for(kind: &EntryKind, text: &str) -> RawAnswer {
    let text = text.trim();
    if text.is_empty() {
        return RawAnswer::Empty;
    }
    match kind {
        EntryKind::Dropdown | EntryKind::SingleSelect => text
            .parse::<u32>()
            .map(RawAnswer::Choice)
            .unwrap_or_else(|_| RawAnswer::from(text)),
        EntryKind::MultiSelect => {
            let picks: Result<Vec<u32>, _> = text
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|part| !part.is_empty())
                .map(str::parse::<u32>)
                .collect();
            picks
                .map(RawAnswer::Choices)
                .unwrap_or_else(|_| RawAnswer::from(text))
        }
        _ => RawAnswer::from(text),
    }
}
