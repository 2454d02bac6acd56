//! Request and response types for the search provider

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// How much effort the provider spends per search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchDepth {
    #[default]
    Basic,
    Advanced,
}

/// Extraction depth; advanced also pulls tables and embedded content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExtractDepth {
    #[default]
    Basic,
    Advanced,
}

/// Body of a search call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchParams {
    pub query: String,
    pub search_depth: SearchDepth,
    pub max_results: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunks_per_source: Option<u32>,
    pub auto_parameters: bool,
    pub include_raw_content: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_images: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_image_descriptions: Option<bool>,
}

impl SearchParams {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            search_depth: SearchDepth::Basic,
            max_results: 5,
            chunks_per_source: None,
            auto_parameters: false,
            include_raw_content: false,
            include_images: None,
            include_image_descriptions: None,
        }
    }

    /// Parameters for locating a representative image
    pub fn for_images(query: impl Into<String>) -> Self {
        Self {
            include_images: Some(true),
            include_image_descriptions: Some(true),
            max_results: 5,
            ..Self::new(query)
        }
    }
}

/// The two search presets. Not a spectrum: pick one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchMode {
    /// 1 credit per query
    #[default]
    Basic,
    /// 2 credits per query; more snippets per source, better relevance
    Advanced,
}

impl SearchMode {
    pub fn from_advanced(advanced: bool) -> Self {
        if advanced {
            Self::Advanced
        } else {
            Self::Basic
        }
    }

    pub fn credits_per_query(self) -> u32 {
        match self {
            Self::Basic => 1,
            Self::Advanced => 2,
        }
    }

    /// Full parameter set for `query` under this preset
    pub fn params(self, query: impl Into<String>) -> SearchParams {
        let base = SearchParams {
            max_results: 10,
            auto_parameters: false,
            include_raw_content: false,
            ..SearchParams::new(query)
        };
        match self {
            Self::Basic => base,
            Self::Advanced => SearchParams {
                search_depth: SearchDepth::Advanced,
                chunks_per_source: Some(3),
                ..base
            },
        }
    }
}

/// Body of an extract call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractParams {
    pub urls: String,
    pub extract_depth: ExtractDepth,
}

/// Account usage against the plan limit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageReport {
    pub plan_usage: Option<Value>,
    pub plan_limit: Option<Value>,
}

impl UsageReport {
    /// Read `{account: {plan_usage, plan_limit}}`; missing parts stay `None`.
    pub fn from_response(body: &Value) -> Self {
        let account = body.get("account");
        let field = |name: &str| {
            account
                .and_then(|a| a.get(name))
                .filter(|v| !v.is_null())
                .cloned()
        };
        Self {
            plan_usage: field("plan_usage"),
            plan_limit: field("plan_limit"),
        }
    }
}

impl fmt::Display for UsageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let show = |v: &Option<Value>| match v {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "None".to_string(),
        };
        write!(f, "{}/{}", show(&self.plan_usage), show(&self.plan_limit))
    }
}

/// First image URL in a search response, if any.
///
/// Entries may be plain URL strings or records with a `url` field.
pub fn first_image_url(response: &Value) -> Option<String> {
    let first = response.get("images")?.as_array()?.first()?;
    let url = match first {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("url")?.as_str()?,
        _ => return None,
    };
    if url.is_empty() {
        None
    } else {
        Some(url.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_basic_preset() {
        let params = SearchMode::Basic.params("rust");
        assert_eq!(params.search_depth, SearchDepth::Basic);
        assert_eq!(params.max_results, 10);
        assert!(params.chunks_per_source.is_none());
        assert!(!params.auto_parameters);
        assert!(!params.include_raw_content);

        let body = serde_json::to_value(&params).unwrap();
        assert_eq!(body["search_depth"], "basic");
        assert!(body.get("chunks_per_source").is_none());
        assert!(body.get("include_images").is_none());
    }

    #[test]
    fn test_advanced_preset() {
        let params = SearchMode::Advanced.params("rust");
        assert_eq!(params.search_depth, SearchDepth::Advanced);
        assert_eq!(params.chunks_per_source, Some(3));
        assert_eq!(params.max_results, 10);
        assert_eq!(SearchMode::Advanced.credits_per_query(), 2);
        assert_eq!(SearchMode::Basic.credits_per_query(), 1);
    }

    #[test]
    fn test_image_params() {
        let body = serde_json::to_value(SearchParams::for_images("eiffel tower")).unwrap();
        assert_eq!(body["include_images"], true);
        assert_eq!(body["include_image_descriptions"], true);
        assert_eq!(body["max_results"], 5);
    }

    #[test]
    fn test_usage_report_display() {
        let report = UsageReport::from_response(&json!({
            "account": {"plan_usage": 120, "plan_limit": 1000}
        }));
        assert_eq!(report.to_string(), "120/1000");

        let empty = UsageReport::from_response(&json!({}));
        assert_eq!(empty.to_string(), "None/None");
    }

    #[test]
    fn test_first_image_url_shapes() {
        assert_eq!(first_image_url(&json!({"images": []})), None);
        assert_eq!(first_image_url(&json!({"results": []})), None);
        assert_eq!(
            first_image_url(&json!({"images": ["http://x/y.png"]})).as_deref(),
            Some("http://x/y.png")
        );
        assert_eq!(
            first_image_url(&json!({"images": [{"url": "http://x/y.png", "description": "d"}]}))
                .as_deref(),
            Some("http://x/y.png")
        );
        assert_eq!(first_image_url(&json!({"images": [{"description": "d"}]})), None);
        assert_eq!(first_image_url(&json!({"images": [""]})), None);
    }
}
