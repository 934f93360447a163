use serde::{Deserialize, Serialize};

/// The error shape surfaced by every provider call and facade operation.
///
/// Providers translate whatever their transport or API reports into this flat
/// form. The facade never wraps or enriches it: the value a provider returns is
/// the value the caller receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct AuthError {
    /// Human-readable description, as reported by the provider.
    pub message: String,

    /// Numeric status code, when the provider supplied one.
    pub status: Option<u16>,
}

impl AuthError {
    /// Creates an error with the given message and status.
    pub fn new(message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            message: message.into(),
            status,
        }
    }

    pub(crate) fn required(field: &str) -> Self {
        Self::new(format!("{field} is required"), Some(400))
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(err.to_string(), None)
    }
}

impl From<tower_sessions::session::Error> for AuthError {
    fn from(err: tower_sessions::session::Error) -> Self {
        Self::new(err.to_string(), None)
    }
}

impl From<url::ParseError> for AuthError {
    fn from(err: url::ParseError) -> Self {
        Self::new(err.to_string(), None)
    }
}

#[cfg(feature = "gotrue")]
impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::new(err.to_string(), err.status().map(|status| status.as_u16()))
    }
}
