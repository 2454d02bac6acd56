//! Web search tool

use super::{single_string_schema, Tool, ToolOutput};
use crate::search::{SearchApi, SearchMode};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub struct WebSearchTool {
    search: Arc<dyn SearchApi>,
    advanced: AtomicBool,
}

#[derive(Debug, Deserialize)]
struct WebSearchInput {
    query: String,
}

impl WebSearchTool {
    pub fn new(search: Arc<dyn SearchApi>) -> Self {
        Self {
            search,
            advanced: AtomicBool::new(false),
        }
    }

    /// Switch between the basic (1 credit) and advanced (2 credits) presets
    pub fn enable_advanced_mode(&self, enable: bool) {
        self.advanced.store(enable, Ordering::Relaxed);
        tracing::info!(
            credits_per_query = self.mode().credits_per_query(),
            "tavily_search advanced mode has been {}",
            if enable { "enabled" } else { "disabled" }
        );
    }

    pub fn mode(&self) -> SearchMode {
        SearchMode::from_advanced(self.advanced.load(Ordering::Relaxed))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &'static str {
        "tavily_search"
    }

    fn description(&self) -> String {
        "Search the web using Tavily.".to_string()
    }

    fn input_schema(&self) -> Value {
        single_string_schema("query", "The search query string.")
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: WebSearchInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let params = self.mode().params(input.query);
        match self.search.search(&params).await {
            Ok(response) => ToolOutput::success(response.to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "search call failed");
                ToolOutput::error(format!("Error calling Tavily API: {e}"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::testing::MockSearchApi;
    use crate::search::{SearchDepth, SearchError};
    use serde_json::json;

    #[tokio::test]
    async fn test_search_uses_active_preset() {
        let mock = Arc::new(MockSearchApi::new());
        mock.queue_search(Ok(json!({"results": [{"url": "https://a"}]})));
        mock.queue_search(Ok(json!({"results": []})));
        let tool = WebSearchTool::new(mock.clone());

        let out = tool.run(json!({"query": "rust"})).await;
        assert!(out.success);
        assert!(out.output.contains("https://a"));

        tool.enable_advanced_mode(true);
        assert_eq!(tool.mode(), SearchMode::Advanced);
        tool.run(json!({"query": "rust"})).await;

        let calls = mock.recorded_searches();
        assert_eq!(calls[0].search_depth, SearchDepth::Basic);
        assert_eq!(calls[1].search_depth, SearchDepth::Advanced);
        assert_eq!(calls[1].chunks_per_source, Some(3));
        assert_eq!(calls[1].query, "rust");
    }

    #[tokio::test]
    async fn test_provider_failure_becomes_output() {
        let mock = Arc::new(MockSearchApi::new());
        mock.queue_search(Err(SearchError::Status {
            status: 432,
            body: "plan limit exceeded".to_string(),
        }));
        let tool = WebSearchTool::new(mock);

        let out = tool.run(json!({"query": "rust"})).await;
        assert!(!out.success);
        assert!(out.output.starts_with("Error calling Tavily API:"));
        assert!(out.output.contains("plan limit exceeded"));
    }

    #[tokio::test]
    async fn test_missing_query_rejected() {
        let tool = WebSearchTool::new(Arc::new(MockSearchApi::new()));
        let out = tool.run(json!({})).await;
        assert!(!out.success);
        assert!(out.output.starts_with("Invalid input"));
    }
}
