//! Terminal tool: the agent calls it to hand back its answer

use super::{Tool, ToolOutput};
use async_trait::async_trait;
use serde_json::{json, Value};

pub const FINAL_ANSWER_TOOL: &str = "final_answer";

pub struct FinalAnswerTool;

impl FinalAnswerTool {
    /// The `answer` argument, or the whole input when the model skipped the wrapper
    pub fn answer_of(input: &Value) -> Value {
        input.get("answer").cloned().unwrap_or_else(|| input.clone())
    }
}

#[async_trait]
impl Tool for FinalAnswerTool {
    fn name(&self) -> &'static str {
        FINAL_ANSWER_TOOL
    }

    fn description(&self) -> String {
        "Provides a final answer to the given problem.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["answer"],
            "properties": {
                "answer": {
                    "type": "string",
                    "description": "The final answer to the problem"
                }
            }
        })
    }

    fn output_type(&self) -> &'static str {
        "any"
    }

    async fn run(&self, input: Value) -> ToolOutput {
        match Self::answer_of(&input) {
            Value::String(s) => ToolOutput::success(s),
            other => ToolOutput::success(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_of_unwraps() {
        assert_eq!(FinalAnswerTool::answer_of(&json!({"answer": 42})), json!(42));
        assert_eq!(FinalAnswerTool::answer_of(&json!("bare")), json!("bare"));
    }
}
