use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Image decode error: {0}")]
    Decode(String),

    #[error("Candidate index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Item already exists: {0}")]
    ItemExists(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Engine is shut down")]
    ShutDown,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Whether the caller may retry the same operation later.
    ///
    /// Only an unavailable candidate index qualifies; every other failure is
    /// deterministic for the same input.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::IndexUnavailable(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
