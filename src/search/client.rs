//! Tavily HTTP client

use super::{ExtractParams, SearchApi, SearchError, SearchParams, UsageReport};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;

/// Tavily REST client (`/search`, `/extract`, `/usage`)
#[derive(Clone)]
pub struct TavilyClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl TavilyClient {
    pub fn new(api_key: Option<String>, base_url: &str) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn authorized(&self, builder: RequestBuilder) -> Result<RequestBuilder, SearchError> {
        let key = self.api_key.as_deref().ok_or(SearchError::MissingApiKey)?;
        Ok(builder
            .header("Authorization", format!("Bearer {key}"))
            .header("Content-Type", "application/json"))
    }

    async fn post_json(&self, path: &str, body: &impl serde::Serialize) -> Result<Value, SearchError> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .authorized(self.client.post(&url))?
            .json(body)
            .send()
            .await?;
        read_json(response).await
    }
}

/// Non-2xx responses become `SearchError::Status` with the body attached.
async fn read_json(response: Response) -> Result<Value, SearchError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| SearchError::Request(format!("failed to read response: {e}")))?;

    if !status.is_success() {
        return Err(SearchError::Status {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| SearchError::Decode(format!("{e} - body: {body}")))
}

#[async_trait]
impl SearchApi for TavilyClient {
    async fn search(&self, params: &SearchParams) -> Result<Value, SearchError> {
        tracing::debug!(query = %params.query, depth = ?params.search_depth, "search request");
        self.post_json("/search", params).await
    }

    async fn extract(&self, params: &ExtractParams) -> Result<Value, SearchError> {
        tracing::debug!(url = %params.urls, depth = ?params.extract_depth, "extract request");
        self.post_json("/extract", params).await
    }

    async fn usage(&self) -> Result<UsageReport, SearchError> {
        let url = format!("{}/usage", self.base_url);
        let response = self.authorized(self.client.get(&url))?.send().await?;
        let body = read_json(response).await?;
        Ok(UsageReport::from_response(&body))
    }
}
