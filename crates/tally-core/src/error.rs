//! Error types for Tally

use thiserror::Error;

/// Coarse classification of an [`Error`], used by callers to pick a status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something we cannot work with
    InvalidInput,
    /// The model API could not be reached, timed out, or failed transiently
    UpstreamUnavailable,
    /// The model API credential is missing or was rejected
    UpstreamAuthFailure,
    /// The model answered, but not with the JSON we asked for
    UpstreamMalformedResponse,
    /// Local configuration or IO problem
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code for API error bodies
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidInput => "invalid_input",
            Self::UpstreamUnavailable => "upstream_unavailable",
            Self::UpstreamAuthFailure => "upstream_auth_failure",
            Self::UpstreamMalformedResponse => "upstream_malformed_response",
            Self::Internal => "internal_error",
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model API unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Model API returned {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("Model API authentication failed: {0}")]
    UpstreamAuth(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("Model response does not match schema: {0}")]
    SchemaMismatch(String),

    #[error("Statement error: {0}")]
    Statement(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Map this error onto the public error taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) | Error::Statement(_) | Error::Csv(_) => {
                ErrorKind::InvalidInput
            }
            Error::UpstreamUnavailable(_) | Error::UpstreamStatus { .. } => {
                ErrorKind::UpstreamUnavailable
            }
            Error::UpstreamAuth(_) => ErrorKind::UpstreamAuthFailure,
            Error::MalformedResponse(_) | Error::SchemaMismatch(_) => {
                ErrorKind::UpstreamMalformedResponse
            }
            Error::Config(_) | Error::Io(_) | Error::Json(_) => ErrorKind::Internal,
        }
    }

    /// Whether retrying the same call may succeed
    ///
    /// Only transport failures, rate limiting, and upstream 5xx qualify.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::UpstreamUnavailable(_) => true,
            Error::UpstreamStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Error::MalformedResponse(format!("undecodable response body: {}", err))
        } else if let Some(status) = err.status() {
            Error::UpstreamStatus {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else {
            // connect, timeout, request building, redirect loops
            Error::UpstreamUnavailable(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
