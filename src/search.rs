//! Web search provider access
//!
//! A single client implements the `SearchApi` capability and is shared by
//! reference between every tool that needs it.

mod client;
mod error;
mod types;

pub use client::TavilyClient;
pub use error::SearchError;
pub use types::*;

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Search, extract and account usage operations of the provider
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Run a web search, returning the provider's JSON response
    async fn search(&self, params: &SearchParams) -> Result<Value, SearchError>;

    /// Extract page content from one URL
    async fn extract(&self, params: &ExtractParams) -> Result<Value, SearchError>;

    /// Account usage against the plan limit.
    ///
    /// Any non-2xx response is an error; callers are expected to surface it.
    async fn usage(&self) -> Result<UsageReport, SearchError>;
}

#[async_trait]
impl<T: SearchApi + ?Sized> SearchApi for Arc<T> {
    async fn search(&self, params: &SearchParams) -> Result<Value, SearchError> {
        (**self).search(params).await
    }

    async fn extract(&self, params: &ExtractParams) -> Result<Value, SearchError> {
        (**self).extract(params).await
    }

    async fn usage(&self) -> Result<UsageReport, SearchError> {
        (**self).usage().await
    }
}
