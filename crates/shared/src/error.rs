use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            400 | 422 => ErrorCode::Validation,
            429 => ErrorCode::RateLimited,
            _ => ErrorCode::Internal,
        }
    }
}

/// Error body returned by the backend. Validation failures carry the
/// offending input names in `field_errors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code:?}: {message}")]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_errors: BTreeMap<String, Vec<String>>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    /// Builds an error from an HTTP status and raw response body.
    ///
    /// Understands `{"detail": "..."}`, `{"message": "..."}`,
    /// `{"error": "..."}` and per-field bodies such as
    /// `{"email": ["Enter a valid email address."]}`.
    pub fn from_response(status: u16, body: &str) -> Self {
        let code = ErrorCode::from_status(status);
        let fallback = if body.trim().is_empty() {
            format!("request failed with status {status}")
        } else {
            body.trim().to_string()
        };

        let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
            return Self::new(code, fallback);
        };

        let mut message = None;
        let mut field_errors = BTreeMap::new();
        for (name, value) in map {
            match value {
                Value::String(text) if matches!(name.as_str(), "detail" | "message" | "error") => {
                    message = Some(text);
                }
                Value::Array(items) if name == "non_field_errors" => {
                    message = items.iter().find_map(|v| v.as_str().map(str::to_string));
                }
                Value::Array(items) => {
                    let messages: Vec<String> = items
                        .iter()
                        .map(|item| match item {
                            Value::String(text) => text.clone(),
                            other => other.to_string(),
                        })
                        .collect();
                    field_errors.insert(name, messages);
                }
                Value::String(text) => {
                    field_errors.insert(name, vec![text]);
                }
                _ => {}
            }
        }

        let message = message.unwrap_or_else(|| {
            if field_errors.is_empty() {
                fallback
            } else {
                "Please correct the highlighted fields.".to_string()
            }
        });

        Self {
            code,
            message,
            field_errors,
        }
    }

    pub fn field(&self, name: &str) -> Option<&[String]> {
        self.field_errors.get(name).map(Vec::as_slice)
    }
}
