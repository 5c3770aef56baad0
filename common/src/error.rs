// common/src/error.rs
use thiserror::Error;

/// Failure reported by the external authority or its row storage
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorityError {
    /// The authority refused the request; the message is safe to show
    #[error("{0}")]
    Rejected(String),
    #[error("record not found")]
    NotFound,
    #[error("storage error: {0}")]
    Storage(String),
    /// The request never got a usable answer
    #[error("transport error: {0}")]
    Transport(String),
}

impl AuthorityError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
