//! Search provider error types

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// No API key was configured at startup
    #[error("search API key is not configured (set TAVILY_API_KEY)")]
    MissingApiKey,

    /// The request never produced a response (DNS, connect, timeout)
    #[error("request failed: {0}")]
    Request(String),

    /// The provider answered with a non-2xx status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body was not the JSON we expected
    #[error("failed to decode response: {0}")]
    Decode(String),
}

impl SearchError {
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::MissingApiKey | Self::Status { status: 401 | 403, .. })
    }
}

impl From<reqwest::Error> for SearchError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::Status {
                status: status.as_u16(),
                body: e.to_string(),
            };
        }
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Request(e.to_string())
        }
    }
}
