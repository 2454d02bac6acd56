//! Page extraction tool

use super::{single_string_schema, Tool, ToolOutput};
use crate::search::{ExtractDepth, ExtractParams, SearchApi};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct WebExtractTool {
    search: Arc<dyn SearchApi>,
    advanced: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct WebExtractInput {
    url: String,
}

impl WebExtractTool {
    pub fn new(search: Arc<dyn SearchApi>) -> Self {
        Self {
            search,
            advanced: AtomicBool::new(false),
        }
    }

    /// Advanced extraction retrieves more data (tables, embedded content)
    /// at a higher credit cost.
    pub fn enable_advanced_mode(&self, enable: bool) {
        self.advanced.store(enable, Ordering::Relaxed);
        tracing::info!(
            "tavily_extract advanced mode has been {}",
            if enable { "enabled" } else { "disabled" }
        );
    }

    pub fn depth(&self) -> ExtractDepth {
        if self.advanced.load(Ordering::Relaxed) {
            ExtractDepth::Advanced
        } else {
            ExtractDepth::Basic
        }
    }
}

#[async_trait]
impl Tool for WebExtractTool {
    fn name(&self) -> &'static str {
        "tavily_extract"
    }

    fn description(&self) -> String {
        "Extract raw information from web pages using Tavily.".to_string()
    }

    fn input_schema(&self) -> Value {
        single_string_schema(
            "url",
            "The URL of the web page to extract information from.",
        )
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: WebExtractInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let params = ExtractParams {
            urls: input.url,
            extract_depth: self.depth(),
        };
        match self.search.extract(&params).await {
            Ok(response) => ToolOutput::success(response.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, url = %params.urls, "extract call failed");
                ToolOutput::error(format!("Error calling Tavily extract API: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::MockSearchApi;
    use crate::search::SearchError;
    use serde_json::json;

    #[tokio::test]
    async fn test_extract_passes_url_and_depth() {
        let mock = Arc::new(MockSearchApi::new());
        mock.queue_extract(Ok(json!({"results": [{"raw_content": "hello"}]})));
        mock.queue_extract(Ok(json!({"results": []})));
        let tool = WebExtractTool::new(mock.clone());

        let out = tool.run(json!({"url": "https://example.com"})).await;
        assert!(out.success);
        assert!(out.output.contains("hello"));

        tool.enable_advanced_mode(true);
        tool.run(json!({"url": "https://example.com/2"})).await;

        let calls = mock.recorded_extracts();
        assert_eq!(calls[0].urls, "https://example.com");
        assert_eq!(calls[0].extract_depth, ExtractDepth::Basic);
        assert_eq!(calls[1].extract_depth, ExtractDepth::Advanced);
    }

    #[tokio::test]
    async fn test_extract_failure_becomes_output() {
        let mock = Arc::new(MockSearchApi::new());
        mock.queue_extract(Err(SearchError::Request("connection reset".to_string())));
        let tool = WebExtractTool::new(mock);

        let out = tool.run(json!({"url": "https://example.com"})).await;
        assert!(!out.success);
        assert_eq!(
            out.output,
            "Error calling Tavily extract API: request failed: connection reset"
        );
    }
}
