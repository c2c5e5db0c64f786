use std::collections::BTreeMap;

use shared::{domain::RecordKey, error::ApiError};
use thiserror::Error;

/// Failure of a single HTTP exchange, before it is attributed to a fetch or an action.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("{}", .0.message)]
    Validation(ApiError),
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("malformed response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_builder() {
            TransportError::InvalidRequest(value.to_string())
        } else if value.is_decode() {
            TransportError::Decode(value.to_string())
        } else {
            TransportError::Network(value.to_string())
        }
    }
}

/// The session is missing or was rejected; callers send the user back to login.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AuthError {
    pub message: String,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{message}")]
    Failed { message: String },
    /// The server no longer has this page, e.g. after rows were deleted elsewhere.
    #[error("Page {page} is no longer available")]
    PageOutOfRange { page: u32 },
}

impl FetchError {
    pub fn from_transport(noun: &str, err: TransportError) -> Self {
        match err {
            TransportError::Unauthorized(message) => FetchError::Auth(AuthError::new(message)),
            other => FetchError::Failed {
                message: format!("Failed to load {noun}: {other}"),
            },
        }
    }

    pub fn message(&self) -> String {
        match self {
            FetchError::Auth(err) => err.message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("{message}")]
    Rejected {
        message: String,
        field_errors: BTreeMap<String, Vec<String>>,
    },
    #[error("a submission for {target} is already in flight")]
    Busy { target: String },
    #[error("{0}")]
    NotAllowed(String),
    #[error("nothing is selected for this action")]
    NothingSelected,
    #[error("unexpected server response: {0}")]
    UnexpectedResponse(String),
}

impl ActionError {
    /// `verb` reads as "Failed to {verb}", e.g. "approve leave".
    pub fn from_transport(verb: &str, err: TransportError) -> Self {
        match err {
            TransportError::Unauthorized(message) => ActionError::Auth(AuthError::new(message)),
            TransportError::Validation(api) => ActionError::Rejected {
                message: format!("Failed to {verb}: {}", api.message),
                field_errors: api.field_errors,
            },
            other => ActionError::Rejected {
                message: format!("Failed to {verb}: {other}"),
                field_errors: BTreeMap::new(),
            },
        }
    }

    pub fn busy(key: Option<&RecordKey>) -> Self {
        ActionError::Busy {
            target: key.map_or_else(|| "a new record".to_string(), |k| format!("record {k}")),
        }
    }

    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            ActionError::Rejected { field_errors, .. } if !field_errors.is_empty() => {
                Some(field_errors)
            }
            _ => None,
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, ActionError::Auth(_))
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session file i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session file is malformed: {0}")]
    Format(#[from] serde_json::Error),
}
