use thiserror::Error;

/// Local validation failures. The display text is shown next to the question.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryError {
    #[error("Not a valid whole number")]
    NotAWholeNumber,
    #[error("Number is too large")]
    NumberTooLarge,
    #[error("Not a valid number")]
    NotANumber,
    #[error("This does not appear to be a valid phone/numeric number")]
    InvalidPhone,
    #[error("Choice {index} is not one of the {available} available options")]
    ChoiceOutOfRange { index: u32, available: usize },
    #[error("\"{0}\" is not a valid choice")]
    UnknownChoice(String),
    #[error("Latitude must be between -90 and 90 and longitude between -180 and 180")]
    InvalidCoordinates,
    #[error("{entry} entries expect {expected}")]
    WrongShape {
        entry: &'static str,
        expected: &'static str,
    },
}

/// Failures while building or navigating a form tree.
#[derive(Debug, Error)]
pub enum FormError {
    #[error("invalid question json: {0}")]
    Question(#[from] serde_json::Error),
    #[error("form node is missing field '{0}'")]
    MissingField(&'static str),
    #[error("unknown form node type '{0}'")]
    UnknownNodeType(String),
    #[error("no question at index '{0}'")]
    UnknownQuestion(String),
}
