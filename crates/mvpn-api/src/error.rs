//! API error taxonomy

use reqwest::StatusCode;

/// Errors from a single API call
///
/// `op` names the failing operation ("get user", "verify login", ...)
/// so the message reads well once it reaches the top-level log.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{op}: request failed: {source}")]
    Transport {
        op: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{op}: unexpected HTTP status {status}")]
    Status {
        op: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{op}: malformed response: {source}")]
    Decode {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Did the server reject our credentials?
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            ApiError::Status { status, .. } if *status == StatusCode::UNAUTHORIZED
        )
    }

    /// HTTP status, if the server answered at all
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}
