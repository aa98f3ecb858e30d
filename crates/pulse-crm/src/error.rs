//! CRM client errors.

use thiserror::Error;

/// Errors from a CRM API call.
#[derive(Debug, Error)]
pub enum CrmError {
    /// Transport-level failure (connect, TLS, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body did not match the expected shape.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The CRM answered with a non-success status.
    #[error("API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Response body as text.
        body: String,
    },

    /// No access token was configured.
    #[error("missing CRM access token (set PULSE_ACCESS_TOKEN)")]
    MissingCredential,
}

impl CrmError {
    /// HTTP status of an API error.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether the failure means the feature is not licensed on this account.
    ///
    /// Tier-gated endpoints answer 403 (forbidden) or 404 (endpoint hidden).
    pub fn is_tier_unavailable(&self) -> bool {
        matches!(self.status(), Some(403 | 404))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Json(_) => "json",
            Self::Api { status: 429, .. } => "rate_limited",
            Self::Api { .. } => "api",
            Self::MissingCredential => "missing_credential",
        }
    }
}

/// Result type for CRM calls.
pub type CrmResult<T> = Result<T, CrmError>;
