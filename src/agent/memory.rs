//! Conversational memory shared across the runs of one session

use super::StepEvent;
use crate::llm::LlmMessage;

/// Conversation so far plus every recorded step.
///
/// Only ever reset between runs; the step loop appends to it.
#[derive(Debug, Clone, Default)]
pub struct AgentMemory {
    messages: Vec<LlmMessage>,
    steps: Vec<StepEvent>,
}

impl AgentMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_message(&mut self, message: LlmMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[LlmMessage] {
        &self.messages
    }

    /// Deltas are display-only and never recorded.
    pub fn record(&mut self, event: &StepEvent) {
        if !matches!(event, StepEvent::StreamDelta(_)) {
            self.steps.push(event.clone());
        }
    }

    pub fn steps(&self) -> &[StepEvent] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty() && self.steps.is_empty()
    }

    pub fn reset(&mut self) {
        self.messages.clear();
        self.steps.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{PlanningStep, StreamDelta, Timing};

    #[test]
    fn test_record_skips_deltas_and_reset_clears() {
        let mut memory = AgentMemory::new();
        assert!(memory.is_empty());

        memory.push_message(LlmMessage::user("hi"));
        memory.record(&StepEvent::StreamDelta(StreamDelta::new("H")));
        memory.record(&StepEvent::PlanningStep(PlanningStep {
            plan: "look it up".to_string(),
            timing: Timing::start(),
            token_usage: None,
        }));
        assert_eq!(memory.messages().len(), 1);
        assert_eq!(memory.steps().len(), 1);

        memory.reset();
        assert!(memory.is_empty());
    }
}
