use thiserror::Error;

/// Errors produced by model constructors and parsers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("duration {0} is outside 1..=300 seconds")]
    SecondsOutOfRange(i64),

    #[error("invalid duration: {0:?}")]
    InvalidSeconds(String),

    #[error("unknown language: {0:?}")]
    UnknownLanguage(String),

    #[error("unknown preference key: {0:?}")]
    UnknownKey(String),
}

pub type Result<T> = std::result::Result<T, ModelError>;
