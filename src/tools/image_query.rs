//! Ask a vision model about an image by URL

use super::{Tool, ToolOutput};
use crate::llm::{ContentBlock, LlmMessage, LlmRequest, LlmService, MessageRole};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

pub struct ImageQueryTool {
    vision: Arc<dyn LlmService>,
}

#[derive(Debug, Deserialize)]
struct ImageQueryInput {
    image_url: String,
    question: String,
}

impl ImageQueryTool {
    pub fn new(vision: Arc<dyn LlmService>) -> Self {
        Self { vision }
    }
}

#[async_trait]
impl Tool for ImageQueryTool {
    fn name(&self) -> &'static str {
        "image_query"
    }

    fn description(&self) -> String {
        "Ask a question about an image given its URL.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["image_url", "question"],
            "properties": {
                "image_url": {
                    "type": "string",
                    "description": "The URL of the image to analyze."
                },
                "question": {
                    "type": "string",
                    "description": "The question to ask about the image."
                }
            }
        })
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: ImageQueryInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let request = LlmRequest {
            messages: vec![LlmMessage {
                role: MessageRole::User,
                content: vec![
                    ContentBlock::text(input.question),
                    ContentBlock::ImageUrl {
                        url: input.image_url,
                    },
                ],
            }],
            ..LlmRequest::default()
        };

        match self.vision.complete(&request).await {
            Ok(response) => ToolOutput::success(response.text()),
            Err(e) => ToolOutput::error(format!("Error querying image model: {e}")),
        }
    }
}
