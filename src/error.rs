use thiserror::Error;

use pims_spatial::SpatialError;
use pims_types::{ParseOverrideCodeError, UserOverrideCode};

/// Errors surfaced by file/property reconciliation.
///
/// Every variant aborts the enclosing unit of work.
#[derive(Debug, Error)]
pub enum PimsError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict the caller may resolve by resubmitting with `code`.
    #[error("{message}")]
    OverrideRequired {
        code: UserOverrideCode,
        message: String,
    },

    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("internal: {0}")]
    Internal(#[from] anyhow::Error),
}

impl PimsError {
    pub fn override_required(code: UserOverrideCode, message: impl Into<String>) -> Self {
        Self::OverrideRequired {
            code,
            message: message.into(),
        }
    }

    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::OverrideRequired { .. } => 409,
            Self::Concurrency(_) => 409,
            Self::Configuration(_) => 500,
            Self::Validation(_) => 400,
            Self::Internal(_) => 500,
        }
    }

    /// The override that would let a resubmission proceed, if any.
    pub fn override_code(&self) -> Option<UserOverrideCode> {
        match self {
            Self::OverrideRequired { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<SpatialError> for PimsError {
    fn from(err: SpatialError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<ParseOverrideCodeError> for PimsError {
    fn from(err: ParseOverrideCodeError) -> Self {
        Self::Validation(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PimsError>;
