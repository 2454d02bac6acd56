//! API request and response types

use crate::transcript::TranscriptMessage;
use serde::{Deserialize, Serialize};

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
}

/// Response for session creation
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub id: String,
    pub model: String,
}

/// Response with a session's transcripts
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub id: String,
    pub created_at: String,
    pub verbose: Vec<TranscriptMessage>,
    pub quiet: Vec<TranscriptMessage>,
    pub running: bool,
}

/// Response for chat action
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub queued: bool,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Request to replay recorded step events
#[derive(Debug, Deserialize)]
pub struct ReplayRequest {
    pub events: Vec<serde_json::Value>,
}

/// Request to switch search presets; absent fields stay unchanged
#[derive(Debug, Default, Deserialize)]
pub struct SearchModeRequest {
    pub search_advanced: Option<bool>,
    pub extract_advanced: Option<bool>,
}

/// Active search presets
#[derive(Debug, Serialize)]
pub struct SearchModeResponse {
    pub search_advanced: bool,
    pub extract_advanced: bool,
}

/// Response for the usage probe
#[derive(Debug, Serialize)]
pub struct UsageResponse {
    pub plan_usage: Option<serde_json::Value>,
    pub plan_limit: Option<serde_json::Value>,
    pub summary: String,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
