//! Image URL search tool

use super::{single_string_schema, Tool, ToolOutput};
use crate::search::{first_image_url, SearchApi, SearchParams};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

/// Returned when the provider found no usable image. A valid answer, not an error.
pub const NO_IMAGE: &str = "none";

pub struct ImageSearchTool {
    search: Arc<dyn SearchApi>,
}

#[derive(Debug, Deserialize)]
struct ImageSearchInput {
    query: String,
}

impl ImageSearchTool {
    pub fn new(search: Arc<dyn SearchApi>) -> Self {
        Self { search }
    }
}

#[async_trait]
impl Tool for ImageSearchTool {
    fn name(&self) -> &'static str {
        "tavily_image_search"
    }

    fn description(&self) -> String {
        "Search for most relevant image URL on the web using Tavily. Returns 'none' when no image is found.".to_string()
    }

    fn input_schema(&self) -> Value {
        single_string_schema("query", "The search query string.")
    }

    async fn run(&self, input: Value) -> ToolOutput {
        let input: ImageSearchInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return ToolOutput::error(format!("Invalid input: {e}")),
        };

        let response = match self.search.search(&SearchParams::for_images(input.query)).await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "image search call failed");
                return ToolOutput::error(format!("Error calling Tavily API: {e}"));
            }
        };

        match first_image_url(&response) {
            Some(url) => ToolOutput::success(url.clone()).with_image(url),
            None => ToolOutput::success(NO_IMAGE),
        }
    }
}
