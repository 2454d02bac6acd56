//! Mock implementations for testing
//!
//! Queue-based stand-ins for the inference provider, the search provider and
//! individual tools, so runs can be driven without network I/O.

use crate::llm::{ContentBlock, LlmError, LlmRequest, LlmResponse, LlmService, Usage};
use crate::search::{ExtractParams, SearchApi, SearchError, SearchParams, UsageReport};
use crate::tools::{Tool, ToolOutput};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::Mutex;

// ============================================================================
// Mock LLM
// ============================================================================

/// Mock LLM that returns queued responses
pub struct MockLlm {
    responses: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    model_id: String,
    requests: Mutex<Vec<LlmRequest>>,
    next_call_id: Mutex<u32>,
}

impl MockLlm {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            model_id: model_id.into(),
            requests: Mutex::new(Vec::new()),
            next_call_id: Mutex::new(0),
        }
    }

    pub fn queue_response(&self, response: LlmResponse) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    pub fn queue_text(&self, text: &str) {
        self.queue_response(LlmResponse {
            content: vec![ContentBlock::text(text)],
            usage: Usage::default(),
        });
    }

    /// Queue a reply that calls one tool
    pub fn queue_tool_call(&self, name: &str, input: Value) {
        let id = {
            let mut next = self.next_call_id.lock().unwrap();
            *next += 1;
            format!("call_{next}")
        };
        self.queue_response(LlmResponse {
            content: vec![ContentBlock::tool_use(id, name, input)],
            usage: Usage::default(),
        });
    }

    pub fn queue_error(&self, error: LlmError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlm {
    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

// ============================================================================
// Mock search provider
// ============================================================================

#[derive(Default)]
pub struct MockSearchApi {
    searches: Mutex<VecDeque<Result<Value, SearchError>>>,
    extracts: Mutex<VecDeque<Result<Value, SearchError>>>,
    usage: Mutex<Option<Value>>,
    search_calls: Mutex<Vec<SearchParams>>,
    extract_calls: Mutex<Vec<ExtractParams>>,
}

impl MockSearchApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_search(&self, result: Result<Value, SearchError>) {
        self.searches.lock().unwrap().push_back(result);
    }

    pub fn queue_extract(&self, result: Result<Value, SearchError>) {
        self.extracts.lock().unwrap().push_back(result);
    }

    /// Body returned by `usage`; unset means a 401 from the provider
    pub fn set_usage(&self, body: Value) {
        *self.usage.lock().unwrap() = Some(body);
    }

    pub fn recorded_searches(&self) -> Vec<SearchParams> {
        self.search_calls.lock().unwrap().clone()
    }

    pub fn recorded_extracts(&self) -> Vec<ExtractParams> {
        self.extract_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl SearchApi for MockSearchApi {
    async fn search(&self, params: &SearchParams) -> Result<Value, SearchError> {
        self.search_calls.lock().unwrap().push(params.clone());
        self.searches
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"results": [], "images": []})))
    }

    async fn extract(&self, params: &ExtractParams) -> Result<Value, SearchError> {
        self.extract_calls.lock().unwrap().push(params.clone());
        self.extracts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"results": []})))
    }

    async fn usage(&self) -> Result<UsageReport, SearchError> {
        match self.usage.lock().unwrap().as_ref() {
            Some(body) => Ok(UsageReport::from_response(body)),
            None => Err(SearchError::Status {
                status: 401,
                body: "Unauthorized".to_string(),
            }),
        }
    }
}

// ============================================================================
// Mock tool
// ============================================================================

/// Tool that always returns the same output and records its inputs
pub struct MockTool {
    name: &'static str,
    output: ToolOutput,
    calls: Mutex<Vec<Value>>,
}

impl MockTool {
    pub fn new(name: &'static str, output: ToolOutput) -> Self {
        Self {
            name,
            output,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for MockTool {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> String {
        format!("Mock {}", self.name)
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn run(&self, input: Value) -> ToolOutput {
        self.calls.lock().unwrap().push(input);
        self.output.clone()
    }
}
