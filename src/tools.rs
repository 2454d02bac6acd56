//! Tools the research agent can call
//!
//! Every tool wraps one external operation behind the same contract: a name,
//! a description, a JSON input schema, a declared output type and `run`.
//! Provider failures come back as error *outputs* so the agent can see them.

mod final_answer;
mod image_query;
mod image_search;
mod web_extract;
mod web_search;

pub use final_answer::{FinalAnswerTool, FINAL_ANSWER_TOOL};
pub use image_query::ImageQueryTool;
pub use image_search::{ImageSearchTool, NO_IMAGE};
pub use web_extract::WebExtractTool;
pub use web_search::WebSearchTool;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
    /// Image URLs the tool surfaced, shown alongside the step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            images: Vec::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.images.push(url.into());
        self
    }
}

/// Trait for tools that can be executed by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Declared output type
    fn output_type(&self) -> &'static str {
        "string"
    }

    /// Execute the tool
    async fn run(&self, input: Value) -> ToolOutput;
}

/// Schema for tools taking a single string parameter
pub(crate) fn single_string_schema(param: &str, description: &str) -> Value {
    json!({
        "type": "object",
        "required": [param],
        "properties": {
            param: {
                "type": "string",
                "description": description
            }
        }
    })
}

/// Fixed collection of tools, decided at construction
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<crate::llm::ToolDefinition> {
        self.tools
            .iter()
            .map(|t| crate::llm::ToolDefinition {
                name: t.name().to_string(),
                description: format!("{} Returns: {}.", t.description(), t.output_type()),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    /// Execute a tool by name
    pub async fn execute(&self, name: &str, input: Value) -> Option<ToolOutput> {
        for tool in &self.tools {
            if tool.name() == name {
                return Some(tool.run(input).await);
            }
        }
        None
    }
}
