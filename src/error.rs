use chrono::NaiveDate;
use thiserror::Error;

/// Classified narrator failures. None of them leave store writes behind.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NarratorError {
    #[error("narrator rejected the API key: {0}")]
    Auth(String),
    #[error("narrator unreachable: {0}")]
    Network(String),
    #[error("narrator rate limited: {0}")]
    RateLimited(String),
    #[error("narrator returned an unusable response: {0}")]
    MalformedResponse(String),
}

impl NarratorError {
    /// Whether calling again later can succeed without user action
    pub fn is_retryable(&self) -> bool {
        matches!(self, NarratorError::Network(_) | NarratorError::RateLimited(_))
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            NarratorError::Auth(_) => "check ANTHROPIC_API_KEY",
            NarratorError::Network(_) => "check the connection and try again",
            NarratorError::RateLimited(_) => "wait a moment and retry",
            NarratorError::MalformedResponse(_) => "try again",
        }
    }
}

#[derive(Debug, Error)]
pub enum ReflectionError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error(transparent)]
    Narrator(#[from] NarratorError),

    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    #[error("invalid period: {0}")]
    InvalidPeriod(String),

    #[error("memories can only be written for today ({today}), not {date}")]
    NotEditable { date: NaiveDate, today: NaiveDate },

    #[error("store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl ReflectionError {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        ReflectionError::NotFound { kind, id: id.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, ReflectionError>;
