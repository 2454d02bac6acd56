//! Folds the event stream of a run into the verbose and quiet transcripts
//!
//! ```text
//! Idle ──delta──► Streaming ──step──► StepEmitted ──final──► FinalAnswered
//!   ▲               │  ▲                 │                      │
//!   │               └──┘ (same buffer)   └──► Streaming ...     │
//!   └──────────────────────── begin_run / clear ◄───────────────┘
//! ```
//!
//! Verbose receives every rendered message. Quiet mirrors the prompt, keeps
//! at most one `⏳ Step N…` placeholder, and swaps it for the final answer.

use super::render::pull_messages;
use super::{MessageStatus, ReducerError, TranscriptMessage};
use crate::agent::StepEvent;
use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

static STEP_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bStep\s*(\d+)\b").expect("valid regex"));

const FINAL_ANSWER_MARKER: &str = "final answer";

/// Both transcripts at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TranscriptSnapshot {
    pub verbose: Vec<TranscriptMessage>,
    pub quiet: Vec<TranscriptMessage>,
}

#[derive(Debug, Default)]
pub struct TranscriptReducer {
    verbose: Vec<TranscriptMessage>,
    quiet: Vec<TranscriptMessage>,
    /// Deltas seen since the last step event
    delta_buffer: String,
    /// Index of the quiet placeholder, if one is showing
    quiet_pending: Option<usize>,
    answered: bool,
    skip_model_outputs: bool,
}

impl TranscriptReducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop step headers and reasoning, which were already streamed as deltas
    #[must_use]
    pub fn with_skip_model_outputs(mut self, skip: bool) -> Self {
        self.skip_model_outputs = skip;
        self
    }

    pub fn set_skip_model_outputs(&mut self, skip: bool) {
        self.skip_model_outputs = skip;
    }

    /// Start a new run: previous messages are dropped, the prompt goes to both views
    pub fn begin_run(&mut self, prompt: &str) {
        self.clear();
        let message = TranscriptMessage::user(prompt);
        self.verbose.push(message.clone());
        self.quiet.push(message);
    }

    /// Fold one event into both transcripts
    pub fn apply(&mut self, event: &StepEvent) -> Result<(), ReducerError> {
        if let StepEvent::StreamDelta(delta) = event {
            self.push_delta(&delta.content);
            return Ok(());
        }

        let messages = pull_messages(event, self.skip_model_outputs)?;
        self.finalize_delta();
        let final_step = matches!(event, StepEvent::FinalAnswerStep(_));
        for message in messages {
            self.push_step_message(message, final_step);
        }
        Ok(())
    }

    fn push_delta(&mut self, fragment: &str) {
        self.delta_buffer.push_str(fragment);
        let text = escape_angle_brackets(&self.delta_buffer);
        match self.verbose.last_mut() {
            Some(last) if last.is_pending() => *last = TranscriptMessage::pending(text),
            _ => self.verbose.push(TranscriptMessage::pending(text)),
        }
    }

    /// Close the streamed message, keeping its text
    fn finalize_delta(&mut self) {
        if let Some(last) = self.verbose.last_mut() {
            if last.is_pending() {
                last.status = MessageStatus::Done;
            }
        }
        self.delta_buffer.clear();
    }

    fn push_step_message(&mut self, message: TranscriptMessage, final_step: bool) {
        let text = message.text().unwrap_or_default().to_string();
        let mirrored = message.clone();
        self.verbose.push(message);

        if final_step || text.to_lowercase().contains(FINAL_ANSWER_MARKER) {
            self.answer(mirrored);
        } else if !self.answered {
            if let Some(step) = STEP_PATTERN.captures(&text).and_then(|c| c.get(1)) {
                self.show_placeholder(step.as_str());
            }
        }
    }

    fn answer(&mut self, message: TranscriptMessage) {
        match self.quiet_pending.take() {
            Some(idx) => self.quiet[idx] = message,
            None => self.quiet.push(message),
        }
        self.answered = true;
    }

    fn show_placeholder(&mut self, step: &str) {
        let placeholder = TranscriptMessage::pending(format!("⏳ Step {step}…"));
        match self.quiet_pending {
            Some(idx) => self.quiet[idx] = placeholder,
            None => {
                self.quiet.push(placeholder);
                self.quiet_pending = Some(self.quiet.len() - 1);
            }
        }
    }

    pub fn clear(&mut self) {
        self.verbose.clear();
        self.quiet.clear();
        self.delta_buffer.clear();
        self.quiet_pending = None;
        self.answered = false;
    }

    #[cfg(test)]
    pub fn verbose(&self) -> &[TranscriptMessage] {
        &self.verbose
    }

    #[cfg(test)]
    pub fn quiet(&self) -> &[TranscriptMessage] {
        &self.quiet
    }

    pub fn snapshot(&self) -> TranscriptSnapshot {
        TranscriptSnapshot {
            verbose: self.verbose.clone(),
            quiet: self.quiet.clone(),
        }
    }
}

/// Streamed text is shown as Markdown; raw tags must not render as HTML
fn escape_angle_brackets(text: &str) -> String {
    text.replace('<', r"\<").replace('>', r"\>")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{ActionStep, AgentOutput, FinalAnswerStep, StreamDelta};
    use crate::transcript::Role;

    fn delta(s: &str) -> StepEvent {
        StepEvent::StreamDelta(StreamDelta::new(s))
    }

    fn final_text(s: &str) -> StepEvent {
        StepEvent::FinalAnswerStep(FinalAnswerStep {
            output: AgentOutput::Text(s.to_string()),
        })
    }

    fn pending_count(messages: &[TranscriptMessage]) -> usize {
        messages.iter().filter(|m| m.is_pending()).count()
    }

    #[test]
    fn test_begin_run_mirrors_prompt() {
        let mut reducer = TranscriptReducer::new();
        reducer.begin_run("What is the capital of France?");
        assert_eq!(reducer.verbose().len(), 1);
        assert_eq!(reducer.quiet(), reducer.verbose());
        assert_eq!(reducer.quiet()[0].role, Role::User);
    }

    #[test]
    fn test_deltas_accumulate_into_one_pending_message() {
        let mut reducer = TranscriptReducer::new();
        reducer.begin_run("q");
        reducer.apply(&delta("Hel")).unwrap();
        reducer.apply(&delta("lo")).unwrap();

        assert_eq!(reducer.verbose().len(), 2);
        let last = &reducer.verbose()[1];
        assert!(last.is_pending());
        assert_eq!(last.text(), Some("Hello"));
        // Deltas never reach quiet
        assert_eq!(reducer.quiet().len(), 1);
    }

    #[test]
    fn test_delta_finalized_before_step() {
        let mut reducer = TranscriptReducer::new().with_skip_model_outputs(true);
        reducer.begin_run("q");
        reducer.apply(&delta("<thinking>")).unwrap();
        reducer.apply(&StepEvent::ActionStep(ActionStep::new(1))).unwrap();

        let verbose = reducer.verbose();
        assert_eq!(verbose[1].text(), Some(r"\<thinking\>"));
        assert_eq!(verbose[1].status, MessageStatus::Done);
        assert_eq!(pending_count(verbose), 0);

        // A new delta after a step starts a fresh buffer
        reducer.apply(&delta("next")).unwrap();
        assert_eq!(reducer.verbose().last().unwrap().text(), Some("next"));
    }

    #[test]
    fn test_final_answer_text() {
        let mut reducer = TranscriptReducer::new();
        reducer.begin_run("q");
        reducer.apply(&final_text("Paris")).unwrap();
        assert_eq!(
            reducer.verbose().last().unwrap().text(),
            Some("**Final answer:**\nParis\n")
        );
        assert_eq!(
            reducer.quiet().last().unwrap().text(),
            Some("**Final answer:**\nParis\n")
        );
    }

    #[test]
    fn test_placeholder_replaced_by_final_answer() {
        let mut reducer = TranscriptReducer::new();
        reducer.begin_run("q");
        reducer.apply(&StepEvent::ActionStep(ActionStep::new(3))).unwrap();

        assert_eq!(reducer.quiet().len(), 2);
        assert_eq!(reducer.quiet()[1].text(), Some("⏳ Step 3…"));
        assert!(reducer.quiet()[1].is_pending());

        reducer.apply(&final_text("Paris (see [1](https://example.com))")).unwrap();
        let quiet = reducer.quiet();
        assert_eq!(quiet.len(), 2);
        assert_eq!(pending_count(quiet), 0);
        assert!(quiet[1]
            .text()
            .unwrap()
            .contains("Paris (see [1](https://example.com))"));
    }

    #[test]
    fn test_placeholder_advances_in_place() {
        let mut reducer = TranscriptReducer::new();
        reducer.begin_run("q");
        reducer.apply(&StepEvent::ActionStep(ActionStep::new(1))).unwrap();
        reducer.apply(&StepEvent::ActionStep(ActionStep::new(2))).unwrap();
        assert_eq!(reducer.quiet().len(), 2);
        assert_eq!(reducer.quiet()[1].text(), Some("⏳ Step 2…"));
    }

    #[test]
    fn test_final_answer_substring_in_step_message() {
        let mut reducer = TranscriptReducer::new();
        reducer.begin_run("q");
        reducer.apply(&StepEvent::ActionStep(ActionStep::new(1))).unwrap();
        let mut step = ActionStep::new(2);
        step.model_output = Some("Final answer: Paris (see [1](https://example.com))".to_string());
        reducer.apply(&StepEvent::ActionStep(step)).unwrap();

        let quiet = reducer.quiet();
        assert_eq!(quiet.len(), 2);
        assert_eq!(
            quiet[1].text(),
            Some("Final answer: Paris (see [1](https://example.com))")
        );
        // Later step markers no longer produce placeholders
        reducer.apply(&StepEvent::ActionStep(ActionStep::new(3))).unwrap();
        assert_eq!(reducer.quiet().len(), 2);
    }

    #[test]
    fn test_image_final_answer_reaches_quiet() {
        let mut reducer = TranscriptReducer::new();
        reducer.begin_run("q");
        reducer.apply(&StepEvent::ActionStep(ActionStep::new(1))).unwrap();
        reducer.apply(&StepEvent::FinalAnswerStep(FinalAnswerStep {
            output: AgentOutput::Image {
                path: "/tmp/chart.png".to_string(),
            },
        }))
        .unwrap();
        assert_eq!(reducer.quiet().len(), 2);
        assert!(reducer.quiet()[1].text().is_none());
    }

    #[test]
    fn test_clear_empties_both() {
        let mut reducer = TranscriptReducer::new();
        reducer.begin_run("q");
        reducer.apply(&delta("x")).unwrap();
        reducer.clear();
        assert_eq!(reducer.snapshot(), TranscriptSnapshot::default());

        reducer.begin_run("again");
        assert_eq!(reducer.quiet().len(), 1);
        assert_eq!(reducer.quiet()[0].text(), Some("again"));
    }
}
