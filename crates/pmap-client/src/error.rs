use thiserror::Error;

use crate::storage::StorageError;

/// Input problems caught before anything goes over the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("Email must look like name@domain.tld")]
    MalformedEmail,
    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("Passwords do not match")]
    PasswordMismatch,
    #[error("Describe the problem before submitting")]
    EmptyText,
    #[error("Pick a point on the map first")]
    MissingCoordinates,
    #[error("Only image files can be attached")]
    NotAnImage,
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Non-2xx answer, or a 2xx envelope that reports failure.
    #[error("{message} (HTTP {status})")]
    Http { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected response from server: {0}")]
    Decode(String),

    #[error("Session expired, please sign in again")]
    SessionExpired,

    #[error("Sign in to do that")]
    NotSignedIn,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::SessionExpired => Some(401),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
