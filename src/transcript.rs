//! Dual transcripts for the chat UI
//!
//! The reducer turns the agent's event stream into two message lists: a
//! verbose trace of every step and a quiet view holding only the prompt, a
//! progress placeholder and the final answer.

mod message;
#[cfg(test)]
mod proptests;
mod reducer;
mod render;

pub use message::{MessageContent, MessageStatus, Role, TranscriptMessage};
pub use reducer::{TranscriptReducer, TranscriptSnapshot};

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReducerError {
    #[error("Unsupported step type: {0}")]
    UnsupportedStep(String),
    #[error("malformed {kind} event: {reason}")]
    Malformed { kind: String, reason: String },
}
