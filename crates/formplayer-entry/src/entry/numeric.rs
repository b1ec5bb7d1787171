use std::num::IntErrorKind;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::answer::Answer;
use crate::error::EntryError;

/// Significant digits a float answer may carry.
const FLOAT_DIGIT_LIMIT: usize = 15;

static PHONE_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^-?(\d+(\.\d+)?|\.\d+)$").expect("phone pattern compiles")
});

pub(crate) fn int(text: Option<&str>, long: bool) -> Result<Answer, EntryError> {
    let Some(text) = text else {
        return Ok(Answer::Empty);
    };
    let value = text.trim().parse::<i64>().map_err(|err| match err.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => EntryError::NumberTooLarge,
        _ => EntryError::NotAWholeNumber,
    })?;
    if !long && i32::try_from(value).is_err() {
        return Err(EntryError::NumberTooLarge);
    }
    Ok(Answer::Int(value))
}

pub(crate) fn float(text: Option<&str>) -> Result<Answer, EntryError> {
    let Some(text) = text else {
        return Ok(Answer::Empty);
    };
    let trimmed = text.trim();
    let value = trimmed
        .parse::<f64>()
        .map_err(|_| EntryError::NotANumber)?;
    if !value.is_finite() {
        return Err(EntryError::NotANumber);
    }
    if trimmed.chars().filter(char::is_ascii_digit).count() > FLOAT_DIGIT_LIMIT {
        return Err(EntryError::NumberTooLarge);
    }
    Ok(Answer::Float(value))
}

pub(crate) fn phone(text: Option<&str>) -> Result<Answer, EntryError> {
    let Some(text) = text else {
        return Ok(Answer::Empty);
    };
    let trimmed = text.trim();
    if PHONE_PATTERN.is_match(trimmed) {
        Ok(Answer::Text(trimmed.to_string()))
    } else {
        Err(EntryError::InvalidPhone)
    }
}
