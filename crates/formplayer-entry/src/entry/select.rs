use crate::answer::{Answer, RawAnswer};
use crate::entry::ChoiceOption;
use crate::error::EntryError;

pub(crate) fn options(choices: &[String]) -> Vec<ChoiceOption> {
    choices
        .iter()
        .zip(1u32..)
        .map(|(text, idx)| ChoiceOption {
            text: text.clone(),
            idx,
        })
        .collect()
}

pub(crate) fn single(
    raw: &RawAnswer,
    choices: &[String],
    entry: &'static str,
) -> Result<Answer, EntryError> {
    match raw {
        RawAnswer::Empty => Ok(Answer::Empty),
        RawAnswer::Choice(idx) => {
            check_index(*idx, choices.len())?;
            Ok(Answer::Select(*idx))
        }
        _ => Err(EntryError::WrongShape {
            entry,
            expected: "a choice index",
        }),
    }
}

pub(crate) fn multiple(
    raw: &RawAnswer,
    choices: &[String],
    entry: &'static str,
) -> Result<Answer, EntryError> {
    let selected = match raw {
        RawAnswer::Empty => return Ok(Answer::Empty),
        RawAnswer::Choice(idx) => vec![*idx],
        RawAnswer::Choices(indices) => indices.clone(),
        _ => {
            return Err(EntryError::WrongShape {
                entry,
                expected: "a list of choice indices",
            });
        }
    };
    for idx in &selected {
        check_index(*idx, choices.len())?;
    }
    let mut selected = selected;
    selected.sort_unstable();
    selected.dedup();
    if selected.is_empty() {
        Ok(Answer::Empty)
    } else {
        Ok(Answer::MultiSelect(selected))
    }
}

fn check_index(idx: u32, available: usize) -> Result<(), EntryError> {
    if idx == 0 || idx as usize > available {
        return Err(EntryError::ChoiceOutOfRange {
            index: idx,
            available,
        });
    }
    Ok(())
}
