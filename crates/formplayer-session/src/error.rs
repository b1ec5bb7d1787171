use formplayer_entry::FormError;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("server responded with status {status}")]
    Http { status: u16, body: Option<Value> },
    #[error("network error: {0}")]
    Network(String),
    #[error("could not decode server response: {0}")]
    Decode(String),
    #[error("invalid endpoint url: {0}")]
    Url(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no form is loaded")]
    NoForm,
    #[error(transparent)]
    Form(#[from] FormError),
}
