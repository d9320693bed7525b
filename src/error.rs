use thiserror::Error;

use crate::form::ValidationError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot connect to server at {0}")]
    Unreachable(String),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{message} ({status})")]
    Api { status: u16, message: String },

    #[error("Not found")]
    NotFound,

    #[error("Malformed response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Not signed in")]
    Unauthenticated,

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Session store: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    Config(String),
}

impl Error {
    /// The server never answered, as opposed to answering with a failure.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Error::Unreachable(_))
    }
}
