//! Property-based tests for the transcript reducer
//!
//! These tests verify the transcript invariants hold for arbitrary event
//! sequences.

use super::*;
use crate::agent::{
    ActionStep, AgentOutput, FinalAnswerStep, PlanningStep, StepEvent, StreamDelta, Timing,
    ToolCall,
};
use proptest::prelude::*;
use serde_json::json;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_delta() -> impl Strategy<Value = StepEvent> {
    "[a-zA-Z <>]{1,12}".prop_map(|s| StepEvent::StreamDelta(StreamDelta::new(s)))
}

fn arb_action_step() -> impl Strategy<Value = StepEvent> {
    (
        1u32..8,
        proptest::option::of("[a-zA-Z .]{0,40}"),
        proptest::option::of("[a-z]{1,10}"),
        proptest::option::of("[a-zA-Z ]{1,20}"),
        any::<bool>(),
    )
        .prop_map(|(n, model_output, tool, observations, errored)| {
            let mut step = ActionStep::new(n);
            step.model_output = model_output;
            step.tool_calls = tool
                .into_iter()
                .map(|name| ToolCall {
                    id: format!("call_{n}"),
                    name,
                    arguments: json!({"query": "x"}),
                })
                .collect();
            step.observations = observations;
            if errored {
                step.error = Some("tool failed".to_string());
            }
            StepEvent::ActionStep(step)
        })
}

fn arb_planning_step() -> impl Strategy<Value = StepEvent> {
    "[a-zA-Z .]{1,40}".prop_map(|plan| {
        StepEvent::PlanningStep(PlanningStep {
            plan,
            timing: Timing::start(),
            token_usage: None,
        })
    })
}

fn arb_final_answer() -> impl Strategy<Value = StepEvent> {
    "[a-zA-Z ]{1,20}".prop_map(|s| {
        StepEvent::FinalAnswerStep(FinalAnswerStep {
            output: AgentOutput::Text(s),
        })
    })
}

fn arb_event() -> impl Strategy<Value = StepEvent> {
    prop_oneof![
        3 => arb_delta(),
        3 => arb_action_step(),
        1 => arb_planning_step(),
        1 => arb_final_answer(),
    ]
}

fn pending(messages: &[TranscriptMessage]) -> usize {
    messages.iter().filter(|m| m.is_pending()).count()
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    // Quiet never holds more than one pending placeholder
    #[test]
    fn prop_quiet_has_at_most_one_pending(
        events in proptest::collection::vec(arb_event(), 0..30),
        skip in any::<bool>(),
    ) {
        let mut reducer = TranscriptReducer::new().with_skip_model_outputs(skip);
        reducer.begin_run("prompt");
        for event in &events {
            reducer.apply(event).unwrap();
            prop_assert!(pending(reducer.quiet()) <= 1, "quiet: {:?}", reducer.quiet());
        }
    }

    // Only the trailing verbose message may be pending
    #[test]
    fn prop_verbose_pending_only_at_tail(events in proptest::collection::vec(arb_event(), 0..30)) {
        let mut reducer = TranscriptReducer::new();
        reducer.begin_run("prompt");
        for event in &events {
            reducer.apply(event).unwrap();
            let verbose = reducer.verbose();
            let last = verbose.len() - 1;
            for (i, message) in verbose.iter().enumerate() {
                prop_assert!(!message.is_pending() || i == last);
            }
        }
    }

    // A run of deltas adds exactly one message holding their concatenation
    #[test]
    fn prop_deltas_never_duplicate(fragments in proptest::collection::vec("[a-z ]{1,8}", 1..20)) {
        let mut reducer = TranscriptReducer::new();
        reducer.begin_run("prompt");
        for fragment in &fragments {
            reducer.apply(&StepEvent::StreamDelta(StreamDelta::new(fragment.clone()))).unwrap();
        }
        prop_assert_eq!(reducer.verbose().len(), 2);
        let joined = fragments.concat();
        prop_assert_eq!(reducer.verbose()[1].text(), Some(joined.as_str()));
    }

    // The prompt always leads both transcripts
    #[test]
    fn prop_prompt_mirrored(
        prompt in "[a-zA-Z ?]{1,30}",
        events in proptest::collection::vec(arb_event(), 0..10),
    ) {
        let mut reducer = TranscriptReducer::new();
        reducer.begin_run(&prompt);
        for event in &events {
            reducer.apply(event).unwrap();
        }
        prop_assert_eq!(reducer.verbose()[0].text(), Some(prompt.as_str()));
        prop_assert_eq!(reducer.quiet()[0].text(), Some(prompt.as_str()));
        prop_assert_eq!(reducer.quiet()[0].role, Role::User);
    }

    // After a final answer, quiet has no placeholder left
    #[test]
    fn prop_final_answer_clears_placeholder(
        events in proptest::collection::vec(arb_event(), 0..20),
        answer in arb_final_answer(),
    ) {
        let mut reducer = TranscriptReducer::new();
        reducer.begin_run("prompt");
        for event in &events {
            reducer.apply(event).unwrap();
        }
        reducer.apply(&answer).unwrap();
        prop_assert_eq!(pending(reducer.quiet()), 0);
    }
}
