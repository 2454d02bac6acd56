//! Step events emitted while a run executes
//!
//! Events are immutable once emitted. The transcript reducer consumes them in
//! order; the agent memory keeps a copy of every non-delta event.

use crate::llm::Usage;
use crate::transcript::ReducerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl From<Usage> for TokenUsage {
    fn from(u: Usage) -> Self {
        Self {
            input_tokens: u.input_tokens,
            output_tokens: u.output_tokens,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timing {
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
}

impl Timing {
    pub fn start() -> Self {
        Self {
            start_time: Utc::now(),
            end_time: None,
        }
    }

    pub fn finish(&mut self) {
        self.end_time = Some(Utc::now());
    }

    /// Elapsed seconds, `None` while the step is still open
    #[allow(clippy::cast_precision_loss)]
    pub fn duration(&self) -> Option<f64> {
        let end = self.end_time?;
        Some((end - self.start_time).num_milliseconds() as f64 / 1000.0)
    }
}

impl Default for Timing {
    fn default() -> Self {
        Self::start()
    }
}

/// One reasoning/acting step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStep {
    pub step_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_output: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observations: Option<String>,
    #[serde(default)]
    pub observations_images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
    #[serde(default)]
    pub is_final_answer: bool,
}

impl ActionStep {
    pub fn new(step_number: u32) -> Self {
        Self {
            step_number,
            model_output: None,
            tool_calls: Vec::new(),
            observations: None,
            observations_images: Vec::new(),
            error: None,
            timing: Timing::start(),
            token_usage: None,
            is_final_answer: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanningStep {
    pub plan: String,
    #[serde(default)]
    pub timing: Timing,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<TokenUsage>,
}

/// The value a run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AgentOutput {
    Text(String),
    Image { path: String },
    Audio { path: String },
    Other(Value),
}

impl AgentOutput {
    /// Answers arrive as JSON from the `final_answer` tool
    pub fn from_answer(answer: Value) -> Self {
        match answer {
            Value::String(s) => Self::Text(s),
            other => Self::Other(other),
        }
    }
}

impl std::fmt::Display for AgentOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(s) => f.write_str(s),
            Self::Image { path } | Self::Audio { path } => f.write_str(path),
            Self::Other(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswerStep {
    pub output: AgentOutput,
}

/// A fragment of model text generated mid-step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDelta {
    pub content: String,
}

impl StreamDelta {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepEvent {
    ActionStep(ActionStep),
    PlanningStep(PlanningStep),
    FinalAnswerStep(FinalAnswerStep),
    StreamDelta(StreamDelta),
}

const KNOWN_KINDS: [&str; 4] = [
    "action_step",
    "planning_step",
    "final_answer_step",
    "stream_delta",
];

impl StepEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ActionStep(_) => KNOWN_KINDS[0],
            Self::PlanningStep(_) => KNOWN_KINDS[1],
            Self::FinalAnswerStep(_) => KNOWN_KINDS[2],
            Self::StreamDelta(_) => KNOWN_KINDS[3],
        }
    }

    /// Decode a recorded event, rejecting kinds the reducer cannot render.
    pub fn from_value(value: Value) -> Result<Self, ReducerError> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("<missing>")
            .to_string();
        if !KNOWN_KINDS.contains(&kind.as_str()) {
            return Err(ReducerError::UnsupportedStep(kind));
        }
        serde_json::from_value(value).map_err(|e| ReducerError::Malformed {
            kind,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_value_rejects_unknown_kind() {
        let err = StepEvent::from_value(json!({"type": "system_prompt_step"})).unwrap_err();
        assert_eq!(
            err,
            ReducerError::UnsupportedStep("system_prompt_step".to_string())
        );
        let err = StepEvent::from_value(json!({"plan": "x"})).unwrap_err();
        assert_eq!(err, ReducerError::UnsupportedStep("<missing>".to_string()));
    }

    #[test]
    fn test_from_value_accepts_minimal_action_step() {
        let event = StepEvent::from_value(json!({"type": "action_step", "step_number": 2})).unwrap();
        let StepEvent::ActionStep(step) = event else {
            panic!("expected action step");
        };
        assert_eq!(step.step_number, 2);
        assert!(step.tool_calls.is_empty());
        assert!(step.error.is_none());
    }

    #[test]
    fn test_from_value_reports_malformed_body() {
        let err = StepEvent::from_value(json!({"type": "planning_step"})).unwrap_err();
        assert!(matches!(err, ReducerError::Malformed { ref kind, .. } if kind == "planning_step"));
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let event = StepEvent::FinalAnswerStep(FinalAnswerStep {
            output: AgentOutput::Text("Paris".to_string()),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "final_answer_step");
        assert_eq!(StepEvent::from_value(value).unwrap(), event);
    }

    #[test]
    fn test_timing_duration() {
        let start = Utc::now();
        let timing = Timing {
            start_time: start,
            end_time: Some(start + chrono::Duration::milliseconds(1234)),
        };
        let secs = timing.duration().unwrap();
        assert!((secs - 1.234).abs() < 1e-9);
        assert_eq!(Timing::start().duration(), None);
    }

    #[test]
    fn test_output_from_answer() {
        assert_eq!(
            AgentOutput::from_answer(json!("Paris")),
            AgentOutput::Text("Paris".to_string())
        );
        assert_eq!(AgentOutput::from_answer(json!(42)).to_string(), "42");
    }
}
