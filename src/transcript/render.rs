//! Expansion of step events into transcript messages

use super::{MessageContent, ReducerError, TranscriptMessage};
use crate::agent::{ActionStep, AgentOutput, PlanningStep, StepEvent, TokenUsage, ToolCall};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

pub const SEPARATOR: &str = "-----";
const CODE_TOOL: &str = "python_interpreter";

static END_CODE_AFTER_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*<end_code>").expect("valid regex"));
static END_CODE_BEFORE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<end_code>\s*```").expect("valid regex"));
static END_CODE_NEXT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```\s*\n\s*<end_code>").expect("valid regex"));
static FENCE_OPEN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"```.*?\n").expect("valid regex"));
static FENCE_CLOSE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n?```\s*$").expect("valid regex"));
static END_CODE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*<end_code>\s*").expect("valid regex"));
static LOGS_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Execution logs:\s*").expect("valid regex"));

/// Grey footnote: label, token counts and duration when known.
pub fn footnote(label: &str, usage: Option<TokenUsage>, duration: Option<f64>) -> String {
    let mut text = format!("**{label}**");
    if let Some(usage) = usage {
        text.push_str(&format!(
            " | Input tokens: {} | Output tokens: {}",
            group_thousands(usage.input_tokens),
            group_thousands(usage.output_tokens)
        ));
    }
    if let Some(secs) = duration.filter(|d| *d > 0.0) {
        text.push_str(&format!(" | Duration: {}s", format_seconds(secs)));
    }
    format!("<span style=\"color: #bbbbc2; font-size: 12px;\">{text}</span> ")
}

/// Two-decimal rounding, always printed with a fractional part (`1.0`, `1.5`, `1.23`)
fn format_seconds(secs: f64) -> String {
    let rounded = format!("{}", (secs * 100.0).round() / 100.0);
    if rounded.contains('.') {
        rounded
    } else {
        format!("{rounded}.0")
    }
}

fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Strip trailing end-of-code markers the model leaves around fences
pub fn clean_model_output(output: &str) -> String {
    let output = output.trim();
    let output = END_CODE_AFTER_FENCE.replace_all(output, "```");
    let output = END_CODE_BEFORE_FENCE.replace_all(&output, "```");
    let output = END_CODE_NEXT_LINE.replace_all(&output, "```");
    output.trim().to_string()
}

/// Fence code as a Python block unless it already is one
pub fn format_code_content(content: &str) -> String {
    let content = FENCE_OPEN.replace_all(content.trim(), "");
    let content = END_CODE.replace_all(&content, "");
    let content = FENCE_CLOSE.replace(content.trim(), "");
    let content = content.trim();
    if content.starts_with("```python") {
        content.to_string()
    } else {
        format!("```python\n{content}\n```")
    }
}

fn tool_call_content(call: &ToolCall) -> String {
    let used_code = call.name == CODE_TOOL;
    let content = match &call.arguments {
        Value::Object(map) => {
            let picked = if used_code { map.get("code") } else { None }.or_else(|| map.get("answer"));
            match picked {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => call.arguments.to_string(),
            }
        }
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if used_code {
        format_code_content(&content)
    } else {
        content
    }
}

fn image_mime(path: &str) -> String {
    let without_query = path.split(['?', '#']).next().unwrap_or(path);
    mime_guess::from_path(without_query)
        .first_raw()
        .filter(|m| m.starts_with("image/"))
        .unwrap_or("image/png")
        .to_string()
}

pub fn action_messages(step: &ActionStep, skip_model_outputs: bool) -> Vec<TranscriptMessage> {
    let label = format!("Step {}", step.step_number);
    let mut messages = Vec::new();

    if !skip_model_outputs {
        messages.push(TranscriptMessage::assistant(format!("**{label}**")));
        let reasoning = step
            .model_output
            .as_deref()
            .map(clean_model_output)
            .unwrap_or_default();
        if !reasoning.is_empty() {
            messages.push(TranscriptMessage::assistant(reasoning));
        }
    }

    for call in &step.tool_calls {
        messages.push(
            TranscriptMessage::assistant(tool_call_content(call))
                .titled(format!("🛠️ Used tool {}", call.name)),
        );
    }

    if let Some(logs) = step.observations.as_deref().map(str::trim) {
        if !logs.is_empty() {
            let logs = LOGS_PREFIX.replace(logs, "");
            messages.push(
                TranscriptMessage::assistant(format!("```bash\n{logs}\n```"))
                    .titled("📝 Execution Logs"),
            );
        }
    }

    for image in &step.observations_images {
        messages.push(
            TranscriptMessage::media(MessageContent::Image {
                path: image.clone(),
                mime_type: image_mime(image),
            })
            .titled("🖼️ Output Image"),
        );
    }

    if let Some(error) = step.error.as_deref().filter(|e| !e.is_empty()) {
        messages.push(TranscriptMessage::assistant(error).titled("💥 Error"));
    }

    messages.push(TranscriptMessage::assistant(footnote(
        &label,
        step.token_usage,
        step.timing.duration(),
    )));
    messages.push(TranscriptMessage::assistant(SEPARATOR));
    messages
}

pub fn planning_messages(step: &PlanningStep, skip_model_outputs: bool) -> Vec<TranscriptMessage> {
    let mut messages = Vec::new();
    if !skip_model_outputs {
        messages.push(TranscriptMessage::assistant("**Planning step**"));
        messages.push(TranscriptMessage::assistant(step.plan.clone()));
    }
    messages.push(TranscriptMessage::assistant(footnote(
        "Planning step",
        step.token_usage,
        step.timing.duration(),
    )));
    messages.push(TranscriptMessage::assistant(SEPARATOR));
    messages
}

pub fn final_answer_message(output: &AgentOutput) -> TranscriptMessage {
    match output {
        AgentOutput::Text(text) => TranscriptMessage::assistant(format!("**Final answer:**\n{text}\n")),
        AgentOutput::Image { path } => TranscriptMessage::media(MessageContent::Image {
            path: path.clone(),
            mime_type: "image/png".to_string(),
        }),
        AgentOutput::Audio { path } => TranscriptMessage::media(MessageContent::Audio {
            path: path.clone(),
            mime_type: "audio/wav".to_string(),
        }),
        AgentOutput::Other(value) => TranscriptMessage::assistant(format!("**Final answer:** {value}")),
    }
}

/// Messages for one step. Deltas are not steps and are rejected.
pub fn pull_messages(
    event: &StepEvent,
    skip_model_outputs: bool,
) -> Result<Vec<TranscriptMessage>, ReducerError> {
    match event {
        StepEvent::ActionStep(step) => Ok(action_messages(step, skip_model_outputs)),
        StepEvent::PlanningStep(step) => Ok(planning_messages(step, skip_model_outputs)),
        StepEvent::FinalAnswerStep(step) => Ok(vec![final_answer_message(&step.output)]),
        StepEvent::StreamDelta(_) => Err(ReducerError::UnsupportedStep(event.kind().to_string())),
    }
}
