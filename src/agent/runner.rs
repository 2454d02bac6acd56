//! The step loop: plan, ask for an action, run tools, repeat until an answer
//!
//! ```text
//! task ─► [planning?] ─► action ─► tools ─► observations ─┐
//!                          ▲                               │
//!                          └────────── next step ◄─────────┘
//!          final_answer / plain reply ─► FinalAnswerStep
//!          step cap ─► "Reached max steps." ─► forced answer
//! ```

use super::{
    ActionStep, AgentError, AgentMemory, AgentOutput, FinalAnswerStep, PlanningStep, StepEvent,
    StreamDelta, Timing, TokenUsage, ToolCall,
};
use crate::llm::{ContentBlock, LlmMessage, LlmRequest, LlmResponse, LlmService, MessageRole};
use crate::tools::{FinalAnswerTool, ToolRegistry, FINAL_ANSWER_TOOL};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Receives every event in emission order
pub type EventSink<'a> = &'a (dyn Fn(StepEvent) + Send + Sync);

const PLANNING_PROMPT: &str = "Before acting, write a short numbered plan for solving the task above \
with the tools available. List the facts you already know and the facts you still need to look up. \
Do not call any tool yet.";

const MAX_STEPS_PROMPT: &str = "You have run out of steps. Based on the conversation above, \
give your best final answer to the task now, following the answer rules.";

pub(crate) const MAX_STEPS_ERROR: &str = "Reached max steps.";

pub struct AgentRunner {
    llm: Arc<dyn LlmService>,
    tools: ToolRegistry,
    instructions: String,
    max_steps: u32,
    planning_interval: Option<u32>,
    stream_outputs: bool,
}

impl AgentRunner {
    pub fn new(
        llm: Arc<dyn LlmService>,
        tools: ToolRegistry,
        instructions: impl Into<String>,
        max_steps: u32,
    ) -> Self {
        Self {
            llm,
            tools,
            instructions: instructions.into(),
            max_steps: max_steps.max(1),
            planning_interval: None,
            stream_outputs: false,
        }
    }

    #[must_use]
    pub fn with_planning_interval(mut self, interval: Option<u32>) -> Self {
        self.planning_interval = interval.filter(|i| *i > 0);
        self
    }

    #[must_use]
    pub fn with_stream_outputs(mut self, stream: bool) -> Self {
        self.stream_outputs = stream;
        self
    }

    pub fn stream_outputs(&self) -> bool {
        self.stream_outputs
    }

    #[cfg(test)]
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    fn planning_due(&self, step: u32) -> bool {
        self.planning_interval
            .is_some_and(|interval| step == 1 || (step - 1) % interval == 0)
    }

    fn request(&self, memory: &AgentMemory, extra: Option<&str>, with_tools: bool) -> LlmRequest {
        let mut messages = memory.messages().to_vec();
        if let Some(extra) = extra {
            messages.push(LlmMessage::user(extra));
        }
        LlmRequest {
            system: Some(self.instructions.clone()),
            messages,
            tools: if with_tools {
                self.tools.definitions()
            } else {
                Vec::new()
            },
            max_tokens: None,
        }
    }

    fn emit(memory: &mut AgentMemory, sink: EventSink<'_>, event: StepEvent) {
        memory.record(&event);
        sink(event);
    }

    /// Execute one run against `memory`, returning the final answer.
    ///
    /// Model failures are emitted as an errored `ActionStep` before the run
    /// fails; tool failures are observations and never end the run.
    pub async fn run(
        &self,
        task: &str,
        additional_args: Option<&Map<String, Value>>,
        memory: &mut AgentMemory,
        sink: EventSink<'_>,
    ) -> Result<AgentOutput, AgentError> {
        memory.push_message(LlmMessage::user(task_message(task, additional_args)));

        for step_number in 1..=self.max_steps {
            if self.planning_due(step_number) {
                self.plan(step_number, memory, sink).await?;
            }

            if let Some(output) = self.action(step_number, memory, sink).await? {
                return Ok(output);
            }
        }

        self.forced_answer(memory, sink).await
    }

    async fn plan(
        &self,
        step_number: u32,
        memory: &mut AgentMemory,
        sink: EventSink<'_>,
    ) -> Result<(), AgentError> {
        let mut timing = Timing::start();
        let request = self.request(memory, Some(PLANNING_PROMPT), false);

        let response = match self.llm.complete(&request).await {
            Ok(r) => r,
            Err(e) => {
                let mut step = ActionStep::new(step_number);
                step.error = Some(e.to_string());
                step.timing.finish();
                Self::emit(memory, sink, StepEvent::ActionStep(step));
                return Err(AgentError::Llm(e));
            }
        };
        timing.finish();

        let plan = response.text();
        tracing::debug!(step = step_number, "plan updated");
        memory.push_message(LlmMessage::assistant(vec![ContentBlock::text(format!(
            "Plan:\n{plan}"
        ))]));
        Self::emit(
            memory,
            sink,
            StepEvent::PlanningStep(PlanningStep {
                plan,
                timing,
                token_usage: usage_of(&response),
            }),
        );
        Ok(())
    }

    /// One action step. `Some` when the run produced its answer.
    async fn action(
        &self,
        step_number: u32,
        memory: &mut AgentMemory,
        sink: EventSink<'_>,
    ) -> Result<Option<AgentOutput>, AgentError> {
        let mut step = ActionStep::new(step_number);
        let request = self.request(memory, None, true);

        let result = if self.stream_outputs {
            let on_delta = |text: &str| sink(StepEvent::StreamDelta(StreamDelta::new(text)));
            self.llm.complete_streaming(&request, &on_delta).await
        } else {
            self.llm.complete(&request).await
        };

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(step = step_number, error = %e, "model call failed");
                step.error = Some(e.to_string());
                step.timing.finish();
                Self::emit(memory, sink, StepEvent::ActionStep(step));
                return Err(AgentError::Llm(e));
            }
        };

        let text = response.text();
        step.model_output = Some(text.clone()).filter(|t| !t.trim().is_empty());
        step.token_usage = usage_of(&response);
        step.tool_calls = response
            .tool_uses()
            .into_iter()
            .map(|(id, name, input)| ToolCall {
                id: id.to_string(),
                name: name.to_string(),
                arguments: input.clone(),
            })
            .collect();
        memory.push_message(LlmMessage::assistant(response.content.clone()));

        // A reply without tool calls is taken as the answer
        if step.tool_calls.is_empty() {
            step.is_final_answer = true;
            step.timing.finish();
            let output = AgentOutput::Text(text);
            Self::emit(memory, sink, StepEvent::ActionStep(step));
            Self::emit(
                memory,
                sink,
                StepEvent::FinalAnswerStep(FinalAnswerStep {
                    output: output.clone(),
                }),
            );
            return Ok(Some(output));
        }

        let mut observations = Vec::new();
        let mut results = Vec::new();
        let mut errors = Vec::new();
        let mut answer = None;

        for call in &step.tool_calls {
            if call.name == FINAL_ANSWER_TOOL {
                answer = Some(FinalAnswerTool::answer_of(&call.arguments));
                results.push(ContentBlock::tool_result(&call.id, "Final answer recorded.", false));
                continue;
            }

            tracing::debug!(step = step_number, tool = %call.name, "executing tool");
            match self.tools.execute(&call.name, call.arguments.clone()).await {
                Some(output) => {
                    if !output.success {
                        tracing::debug!(tool = %call.name, "tool returned an error output");
                    }
                    observations.push(output.output.clone());
                    step.observations_images.extend(output.images);
                    results.push(ContentBlock::tool_result(
                        &call.id,
                        output.output,
                        !output.success,
                    ));
                }
                None => {
                    let message = format!(
                        "Unknown tool '{}'. Available tools: {}",
                        call.name,
                        self.tools.names().join(", ")
                    );
                    results.push(ContentBlock::tool_result(&call.id, &message, true));
                    errors.push(message);
                }
            }
        }

        memory.push_message(LlmMessage {
            role: MessageRole::User,
            content: results,
        });
        if !observations.is_empty() {
            step.observations = Some(observations.join("\n"));
        }
        if !errors.is_empty() {
            step.error = Some(errors.join("\n"));
        }
        step.timing.finish();

        match answer {
            Some(answer) => {
                step.is_final_answer = true;
                let output = AgentOutput::from_answer(answer);
                Self::emit(memory, sink, StepEvent::ActionStep(step));
                Self::emit(
                    memory,
                    sink,
                    StepEvent::FinalAnswerStep(FinalAnswerStep {
                        output: output.clone(),
                    }),
                );
                Ok(Some(output))
            }
            None => {
                Self::emit(memory, sink, StepEvent::ActionStep(step));
                Ok(None)
            }
        }
    }

    async fn forced_answer(
        &self,
        memory: &mut AgentMemory,
        sink: EventSink<'_>,
    ) -> Result<AgentOutput, AgentError> {
        tracing::info!(max_steps = self.max_steps, "step cap reached, forcing an answer");
        let mut step = ActionStep::new(self.max_steps + 1);
        step.error = Some(MAX_STEPS_ERROR.to_string());

        let request = self.request(memory, Some(MAX_STEPS_PROMPT), false);
        let response = match self.llm.complete(&request).await {
            Ok(r) => r,
            Err(e) => {
                step.error = Some(format!("{MAX_STEPS_ERROR}\n{e}"));
                step.timing.finish();
                Self::emit(memory, sink, StepEvent::ActionStep(step));
                return Err(AgentError::Llm(e));
            }
        };

        let text = response.text();
        step.model_output = Some(text.clone()).filter(|t| !t.trim().is_empty());
        step.token_usage = usage_of(&response);
        step.is_final_answer = true;
        step.timing.finish();
        memory.push_message(LlmMessage::assistant(vec![ContentBlock::text(&text)]));

        let output = AgentOutput::Text(text);
        Self::emit(memory, sink, StepEvent::ActionStep(step));
        Self::emit(
            memory,
            sink,
            StepEvent::FinalAnswerStep(FinalAnswerStep {
                output: output.clone(),
            }),
        );
        Ok(output)
    }
}

fn usage_of(response: &LlmResponse) -> Option<TokenUsage> {
    if response.usage.is_zero() {
        None
    } else {
        Some(response.usage.into())
    }
}

fn task_message(task: &str, additional_args: Option<&Map<String, Value>>) -> String {
    match additional_args {
        Some(args) if !args.is_empty() => format!(
            "{task}\nYou have been provided with these additional arguments:\n{}",
            Value::Object(args.clone())
        ),
        _ => task.to_string(),
    }
}
