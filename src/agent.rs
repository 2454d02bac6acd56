//! Research agent
//!
//! `ResearchAgent` fixes the tool set and the answer rules at construction
//! and owns the conversational memory of one session. The step loop itself
//! lives in `runner`; the events it emits are defined in `events`.

mod events;
mod memory;
mod runner;
#[cfg(test)]
pub(crate) mod testing;

pub use events::*;
pub use memory::AgentMemory;
pub use runner::{AgentRunner, EventSink};

use crate::config::{AgentSettings, SearchConfig};
use crate::llm::{LlmError, LlmService};
use crate::search::{ExtractDepth, SearchApi, SearchMode};
use crate::tools::{
    FinalAnswerTool, ImageQueryTool, ImageSearchTool, Tool, ToolRegistry, WebExtractTool,
    WebSearchTool,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Rules appended to the system prompt of every request
pub const INSTRUCTIONS: &str = "You are a research assistant that answers questions using web search. \
Call the available tools to gather facts, then call `final_answer` with your answer.\n\
When writing the final answer, including the most relevant URL(s) from your search results as inline \
Markdown hyperlinks is MANDATORY. Example format: ... (see [1](https://example1.com)) ... \
(see [2](https://example2.com)) ... Do not invent URL(s): only use the ones you were provided. \
If the answer includes an image URL, include it as an inline Markdown image: ![image](<image_url>)";

#[derive(Debug, Error)]
pub enum AgentError {
    /// The model call failed; the errored step has already been emitted
    #[error("model call failed: {0}")]
    Llm(#[from] LlmError),
}

pub struct ResearchAgent {
    runner: AgentRunner,
    memory: AgentMemory,
    web_search: Arc<WebSearchTool>,
    web_extract: Arc<WebExtractTool>,
}

impl ResearchAgent {
    pub fn new(
        settings: &AgentSettings,
        llm: Arc<dyn LlmService>,
        search: Arc<dyn SearchApi>,
        vision: Option<Arc<dyn LlmService>>,
        search_config: &SearchConfig,
    ) -> Self {
        let web_search = Arc::new(WebSearchTool::new(search.clone()));
        web_search.enable_advanced_mode(search_config.advanced);
        let web_extract = Arc::new(WebExtractTool::new(search.clone()));
        web_extract.enable_advanced_mode(search_config.extract_advanced);

        let mut tools: Vec<Arc<dyn Tool>> = vec![web_search.clone(), web_extract.clone()];
        if settings.image_search {
            tools.push(Arc::new(ImageSearchTool::new(search)));
        }
        if settings.image_query {
            match vision {
                Some(vision) => tools.push(Arc::new(ImageQueryTool::new(vision))),
                None => tracing::warn!("image_query enabled but no vision model configured"),
            }
        }
        tools.push(Arc::new(FinalAnswerTool));

        let registry = ToolRegistry::new(tools);
        tracing::info!(model = %llm.model_id(), tools = ?registry.names(), "research agent created");

        let runner = AgentRunner::new(llm, registry, INSTRUCTIONS, settings.max_steps)
            .with_planning_interval(settings.planning_interval)
            .with_stream_outputs(settings.stream_outputs);

        Self {
            runner,
            memory: AgentMemory::new(),
            web_search,
            web_extract,
        }
    }

    /// Run a task and return the final answer text
    #[allow(dead_code)] // The server always streams; kept for non-UI callers and tests
    pub async fn run(
        &mut self,
        task: &str,
        additional_args: Option<&Map<String, Value>>,
    ) -> Result<String, AgentError> {
        self.run_streaming(task, additional_args, &|_: StepEvent| {}).await
    }

    /// Run a task, forwarding every step event to `sink` as it happens
    pub async fn run_streaming(
        &mut self,
        task: &str,
        additional_args: Option<&Map<String, Value>>,
        sink: EventSink<'_>,
    ) -> Result<String, AgentError> {
        let output = self
            .runner
            .run(task, additional_args, &mut self.memory, sink)
            .await?;
        Ok(output.to_string())
    }

    /// Clear conversational memory
    pub fn reset(&mut self) {
        if !self.memory.is_empty() {
            tracing::debug!("agent memory cleared");
        }
        self.memory.reset();
    }

    pub fn steps(&self) -> &[StepEvent] {
        self.memory.steps()
    }

    /// Whether text deltas are streamed ahead of each step
    pub fn stream_outputs(&self) -> bool {
        self.runner.stream_outputs()
    }

    #[cfg(test)]
    pub fn tool_names(&self) -> Vec<String> {
        self.runner.tools().names()
    }

    /// Switch search/extract presets; `None` leaves a tool as it is
    pub fn set_search_modes(&self, search_advanced: Option<bool>, extract_advanced: Option<bool>) {
        if let Some(advanced) = search_advanced {
            self.web_search.enable_advanced_mode(advanced);
        }
        if let Some(advanced) = extract_advanced {
            self.web_extract.enable_advanced_mode(advanced);
        }
    }

    /// Active presets as `(search advanced, extract advanced)`
    pub fn search_modes(&self) -> (bool, bool) {
        (
            self.web_search.mode() == SearchMode::Advanced,
            self.web_extract.depth() == ExtractDepth::Advanced,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{MockLlm, MockSearchApi};
    use super::*;
    use crate::tools::FINAL_ANSWER_TOOL;
    use serde_json::json;

    fn agent(settings: &AgentSettings, llm: Arc<MockLlm>, vision: Option<Arc<MockLlm>>) -> ResearchAgent {
        ResearchAgent::new(
            settings,
            llm,
            Arc::new(MockSearchApi::new()),
            vision.map(|v| v as Arc<dyn LlmService>),
            &SearchConfig::default(),
        )
    }

    #[test]
    fn test_tool_set_follows_settings() {
        let llm = Arc::new(MockLlm::new("m"));
        let default = agent(&AgentSettings::default(), llm.clone(), None);
        assert_eq!(
            default.tool_names(),
            vec!["tavily_search", "tavily_extract", "tavily_image_search", FINAL_ANSWER_TOOL]
        );

        let settings = AgentSettings {
            image_search: false,
            image_query: true,
            ..AgentSettings::default()
        };
        let with_vision = agent(&settings, llm.clone(), Some(Arc::new(MockLlm::new("v"))));
        assert_eq!(
            with_vision.tool_names(),
            vec!["tavily_search", "tavily_extract", "image_query", FINAL_ANSWER_TOOL]
        );

        // Without a vision model the tool is left out
        let without_vision = agent(&settings, llm, None);
        assert!(!without_vision.tool_names().contains(&"image_query".to_string()));
    }

    #[test]
    fn test_search_presets_from_config() {
        let config = SearchConfig {
            advanced: true,
            ..SearchConfig::default()
        };
        let agent = ResearchAgent::new(
            &AgentSettings::default(),
            Arc::new(MockLlm::new("m")),
            Arc::new(MockSearchApi::new()),
            None,
            &config,
        );
        assert_eq!(agent.search_modes(), (true, false));

        agent.set_search_modes(Some(false), Some(true));
        assert_eq!(agent.search_modes(), (false, true));
        agent.set_search_modes(None, None);
        assert_eq!(agent.search_modes(), (false, true));
    }

    #[tokio::test]
    async fn test_run_and_reset() {
        let llm = Arc::new(MockLlm::new("m"));
        llm.queue_tool_call(FINAL_ANSWER_TOOL, json!({"answer": "Paris (see [1](https://example.com))"}));
        let mut agent = agent(&AgentSettings::default(), llm.clone(), None);

        let answer = agent.run("Capital of France?", None).await.unwrap();
        assert_eq!(answer, "Paris (see [1](https://example.com))");
        assert_eq!(agent.steps().len(), 2);

        let request = &llm.recorded_requests()[0];
        assert!(request.system.as_deref().unwrap().contains("inline Markdown hyperlinks is MANDATORY"));

        agent.reset();
        assert!(agent.steps().is_empty());
    }
}
