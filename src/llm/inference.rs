//! OpenAI-compatible inference router client
//!
//! Hugging Face's router (and any OpenAI-compatible endpoint) accepts
//! `model:provider` to pin an inference provider; `auto` leaves the choice
//! to the router.

use super::types::{ContentBlock, LlmMessage, LlmRequest, LlmResponse, MessageRole, Usage};
use super::{DeltaSink, LlmError, LlmService};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Chat-completions client for one model on one provider
pub struct InferenceService {
    client: Client,
    api_key: String,
    endpoint: String,
    model_id: String,
    provider: String,
}

impl InferenceService {
    pub fn new(api_key: String, endpoint: &str, model_id: &str, provider: &str) -> Self {
        Self {
            client: Client::new(),
            api_key,
            endpoint: endpoint.to_string(),
            model_id: model_id.to_string(),
            provider: provider.to_string(),
        }
    }

    /// Model name as sent on the wire
    pub fn api_model_name(&self) -> String {
        if self.provider.is_empty() || self.provider == "auto" {
            self.model_id.clone()
        } else {
            format!("{}:{}", self.model_id, self.provider)
        }
    }

    fn translate_request(&self, request: &LlmRequest, stream: bool) -> ChatRequest {
        let mut messages = Vec::new();

        if let Some(system) = request.system.as_ref().filter(|s| !s.is_empty()) {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(ChatContent::Text(system.clone())),
                tool_calls: None,
                tool_call_id: None,
            });
        }

        for msg in &request.messages {
            // Tool results need separate "tool" messages
            messages.extend(Self::translate_message(msg));
        }

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(
                request
                    .tools
                    .iter()
                    .map(|t| ChatTool {
                        r#type: "function".to_string(),
                        function: ChatFunction {
                            name: t.name.clone(),
                            description: t.description.clone(),
                            parameters: t.input_schema.clone(),
                        },
                    })
                    .collect(),
            )
        };

        ChatRequest {
            model: self.api_model_name(),
            messages,
            tools,
            max_tokens: request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            stream,
            stream_options: stream.then_some(StreamOptions {
                include_usage: true,
            }),
        }
    }

    fn translate_message(msg: &LlmMessage) -> Vec<ChatMessage> {
        let role = match msg.role {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        };

        let mut parts = Vec::new();
        let mut tool_calls = Vec::new();
        let mut tool_results = Vec::new();

        for block in &msg.content {
            match block {
                ContentBlock::Text { text } => parts.push(ChatContentPart::Text { text: text.clone() }),
                ContentBlock::ImageUrl { url } => parts.push(ChatContentPart::ImageUrl {
                    image_url: ImageUrlRef { url: url.clone() },
                }),
                ContentBlock::ToolUse { id, name, input } => tool_calls.push(ChatToolCall {
                    id: id.clone(),
                    r#type: "function".to_string(),
                    function: ChatFunctionCall {
                        name: name.clone(),
                        arguments: serde_json::to_string(input).unwrap_or_else(|_| "{}".to_string()),
                    },
                }),
                ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } => tool_results.push((tool_use_id.clone(), content.clone(), *is_error)),
            }
        }

        let mut messages = Vec::new();

        if !parts.is_empty() || !tool_calls.is_empty() {
            let has_image = parts
                .iter()
                .any(|p| matches!(p, ChatContentPart::ImageUrl { .. }));
            let content = if parts.is_empty() {
                None
            } else if has_image {
                Some(ChatContent::Parts(parts))
            } else {
                let text = parts
                    .into_iter()
                    .filter_map(|p| match p {
                        ChatContentPart::Text { text } => Some(text),
                        ChatContentPart::ImageUrl { .. } => None,
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                Some(ChatContent::Text(text))
            };

            messages.push(ChatMessage {
                role: role.to_string(),
                content,
                tool_calls: if tool_calls.is_empty() {
                    None
                } else {
                    Some(tool_calls)
                },
                tool_call_id: None,
            });
        }

        for (tool_use_id, content, is_error) in tool_results {
            messages.push(ChatMessage {
                role: "tool".to_string(),
                content: Some(ChatContent::Text(if is_error {
                    format!("Error: {content}")
                } else {
                    content
                })),
                tool_calls: None,
                tool_call_id: Some(tool_use_id),
            });
        }

        messages
    }

    fn normalize_response(resp: ChatResponse) -> Result<LlmResponse, LlmError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::unknown("No choices in response"))?;

        let mut content = Vec::new();

        if let Some(text) = choice.message.content.filter(|t| !t.is_empty()) {
            content.push(ContentBlock::Text { text });
        }

        for (idx, tc) in choice.message.tool_calls.unwrap_or_default().into_iter().enumerate() {
            if tc.function.name.is_empty() {
                continue;
            }
            let id = tc.id.unwrap_or_else(|| format!("call_{idx}"));
            content.push(ContentBlock::tool_use(
                id,
                tc.function.name,
                parse_arguments(&tc.function.arguments),
            ));
        }

        Ok(LlmResponse {
            content,
            usage: resp.usage.map(ApiUsage::into_usage).unwrap_or_default(),
        })
    }

    async fn send(&self, body: &ChatRequest) -> Result<reqwest::Response, LlmError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::network(format!("Request timeout: {e}"))
                } else if e.is_connect() {
                    LlmError::network(format!("Connection failed: {e}"))
                } else {
                    LlmError::unknown(format!("Request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorResponse>(&body)
            .map(|e| e.error.message())
            .unwrap_or(body);
        Err(LlmError::from_status(status.as_u16(), &message))
    }
}

/// Model-produced arguments are sometimes not JSON; keep them as a string.
fn parse_arguments(raw: &str) -> serde_json::Value {
    if raw.trim().is_empty() {
        return serde_json::json!({});
    }
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

#[async_trait]
impl LlmService for InferenceService {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        let body = self.translate_request(request, false);
        let response = self.send(&body).await?;
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::network(format!("Failed to read response: {e}")))?;
        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|e| {
            LlmError::unknown(format!("Failed to parse response: {e} - body: {text}"))
        })?;
        Self::normalize_response(parsed)
    }

    async fn complete_streaming(
        &self,
        request: &LlmRequest,
        on_delta: DeltaSink<'_>,
    ) -> Result<LlmResponse, LlmError> {
        let body = self.translate_request(request, true);
        let response = self.send(&body).await?;

        let mut state = StreamState::default();
        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();

        'outer: while let Some(chunk) = stream.next().await {
            let bytes = chunk.map_err(|e| LlmError::network(format!("Stream interrupted: {e}")))?;
            buffer.extend_from_slice(&bytes);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let line = String::from_utf8_lossy(&line);
                if state.process_line(line.trim_end_matches(['\n', '\r']), on_delta) {
                    break 'outer;
                }
            }
        }

        if !buffer.is_empty() {
            let line = String::from_utf8_lossy(&buffer).into_owned();
            state.process_line(line.trim(), on_delta);
        }

        Ok(state.finish())
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Accumulates a streamed completion
#[derive(Debug, Default)]
struct StreamState {
    text: String,
    tool_calls: Vec<ToolCallAccumulator>,
    usage: Usage,
}

#[derive(Debug, Default)]
struct ToolCallAccumulator {
    id: Option<String>,
    name: String,
    arguments: String,
}

impl StreamState {
    /// Handle one SSE line; returns true on the `[DONE]` sentinel.
    fn process_line(&mut self, line: &str, on_delta: DeltaSink<'_>) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(':') || trimmed.starts_with("event:") {
            return false;
        }

        let payload = trimmed.strip_prefix("data:").map_or(trimmed, str::trim);
        if payload == "[DONE]" {
            return true;
        }

        // Keep-alives and vendor extensions are skipped
        let Ok(chunk) = serde_json::from_str::<StreamChunk>(payload) else {
            return false;
        };

        if let Some(usage) = chunk.usage {
            self.usage = usage.into_usage();
        }

        for choice in chunk.choices {
            let Some(delta) = choice.delta else { continue };

            if let Some(content) = delta.content.filter(|c| !c.is_empty()) {
                on_delta(&content);
                self.text.push_str(&content);
            }

            for call in delta.tool_calls.unwrap_or_default() {
                let idx = call.index.unwrap_or(0);
                if self.tool_calls.len() <= idx {
                    self.tool_calls
                        .resize_with(idx + 1, ToolCallAccumulator::default);
                }
                let entry = &mut self.tool_calls[idx];
                if let Some(id) = call.id.filter(|id| !id.is_empty()) {
                    entry.id = Some(id);
                }
                if let Some(function) = call.function {
                    if let Some(name) = function.name {
                        entry.name.push_str(&name);
                    }
                    if let Some(arguments) = function.arguments {
                        entry.arguments.push_str(&arguments);
                    }
                }
            }
        }

        false
    }

    fn finish(self) -> LlmResponse {
        let mut content = Vec::new();
        if !self.text.is_empty() {
            content.push(ContentBlock::Text { text: self.text });
        }
        for (idx, call) in self.tool_calls.into_iter().enumerate() {
            if call.name.trim().is_empty() {
                continue;
            }
            content.push(ContentBlock::ToolUse {
                id: call.id.unwrap_or_else(|| format!("call_{idx}")),
                name: call.name,
                input: parse_arguments(&call.arguments),
            });
        }
        LlmResponse {
            content,
            usage: self.usage,
        }
    }
}

// Wire types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ChatTool>>,
    max_tokens: u32,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stream_options: Option<StreamOptions>,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<ChatContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ChatToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum ChatContent {
    Text(String),
    Parts(Vec<ChatContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrlRef },
}

#[derive(Debug, Serialize)]
struct ImageUrlRef {
    url: String,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    r#type: String,
    function: ChatFunction,
}

#[derive(Debug, Serialize)]
struct ChatFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct ChatToolCall {
    id: String,
    r#type: String,
    function: ChatFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatResponseToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponseToolCall {
    id: Option<String>,
    function: ChatFunctionCall,
}

#[derive(Debug, Deserialize)]
#[allow(clippy::struct_field_names)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

impl ApiUsage {
    fn into_usage(self) -> Usage {
        Usage {
            input_tokens: self.prompt_tokens,
            output_tokens: self.completion_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
    tool_calls: Option<Vec<StreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct StreamToolCall {
    index: Option<usize>,
    id: Option<String>,
    function: Option<StreamFunction>,
}

#[derive(Debug, Deserialize)]
struct StreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Routers return either `{"error": "..."}` or `{"error": {"message": "..."}}`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorBody {
    Message(String),
    Detailed { message: String },
}

impl ErrorBody {
    fn message(self) -> String {
        match self {
            Self::Message(m) | Self::Detailed { message: m } => m,
        }
    }
}
