//! Startup configuration
//!
//! Everything is read once from the environment in `main` and handed to
//! constructors explicitly. Nothing below reads the environment lazily.

use thiserror::Error;

pub const DEFAULT_MODEL: &str = "Qwen/Qwen3-235B-A22B-Instruct-2507";
pub const DEFAULT_VISION_MODEL: &str = "google/gemma-3-27b-it";
pub const DEFAULT_PROVIDER: &str = "auto";
pub const DEFAULT_INFERENCE_URL: &str = "https://router.huggingface.co/v1/chat/completions";
pub const DEFAULT_SEARCH_URL: &str = "https://api.tavily.com";
pub const DEFAULT_PORT: u16 = 7860;
pub const DEFAULT_MAX_STEPS: u32 = 5;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a boolean (1/0, true/false, yes/no, on/off), got {value:?}")]
    InvalidBool { var: &'static str, value: String },
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

/// Search provider settings
#[derive(Debug, Clone, Default)]
pub struct SearchConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    /// Start `tavily_search` in the advanced preset
    pub advanced: bool,
    /// Start `tavily_extract` with advanced extraction depth
    pub extract_advanced: bool,
}

/// Inference provider settings
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model_id: String,
    pub provider: String,
    pub vision_model_id: String,
}

/// Agent behavior knobs
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub max_steps: u32,
    pub planning_interval: Option<u32>,
    pub stream_outputs: bool,
    /// Clear conversational memory at the start of every run
    pub reset_memory_per_run: bool,
    pub image_search: bool,
    pub image_query: bool,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            planning_interval: None,
            stream_outputs: true,
            reset_memory_per_run: false,
            image_search: true,
            image_query: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub search: SearchConfig,
    pub llm: LlmConfig,
    pub agent: AgentSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let port = match get("ALBERT_PORT") {
            Some(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber {
                    var: "ALBERT_PORT",
                    value,
                })?,
            None => DEFAULT_PORT,
        };

        let search = SearchConfig {
            api_key: get("TAVILY_API_KEY"),
            base_url: get("ALBERT_SEARCH_URL").unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            advanced: parse_bool("ALBERT_SEARCH_ADVANCED", get("ALBERT_SEARCH_ADVANCED"), false)?,
            extract_advanced: parse_bool(
                "ALBERT_EXTRACT_ADVANCED",
                get("ALBERT_EXTRACT_ADVANCED"),
                false,
            )?,
        };

        let llm = LlmConfig {
            api_key: get("HF_API_KEY").or_else(|| get("HF_TOKEN")),
            endpoint: get("ALBERT_INFERENCE_URL")
                .unwrap_or_else(|| DEFAULT_INFERENCE_URL.to_string()),
            model_id: get("ALBERT_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            provider: get("ALBERT_PROVIDER").unwrap_or_else(|| DEFAULT_PROVIDER.to_string()),
            vision_model_id: get("ALBERT_VISION_MODEL")
                .unwrap_or_else(|| DEFAULT_VISION_MODEL.to_string()),
        };

        let defaults = AgentSettings::default();
        let agent = AgentSettings {
            max_steps: parse_count("ALBERT_MAX_STEPS", get("ALBERT_MAX_STEPS"))?
                .unwrap_or(defaults.max_steps),
            planning_interval: parse_count(
                "ALBERT_PLANNING_INTERVAL",
                get("ALBERT_PLANNING_INTERVAL"),
            )?,
            stream_outputs: parse_bool(
                "ALBERT_STREAM_OUTPUTS",
                get("ALBERT_STREAM_OUTPUTS"),
                defaults.stream_outputs,
            )?,
            reset_memory_per_run: parse_bool(
                "ALBERT_RESET_MEMORY",
                get("ALBERT_RESET_MEMORY"),
                defaults.reset_memory_per_run,
            )?,
            image_search: parse_bool(
                "ALBERT_IMAGE_SEARCH",
                get("ALBERT_IMAGE_SEARCH"),
                defaults.image_search,
            )?,
            image_query: parse_bool(
                "ALBERT_IMAGE_QUERY",
                get("ALBERT_IMAGE_QUERY"),
                defaults.image_query,
            )?,
        };

        Ok(Self {
            port,
            search,
            llm,
            agent,
        })
    }
}

fn parse_bool(var: &'static str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool { var, value }),
    }
}

fn parse_count(var: &'static str, value: Option<String>) -> Result<Option<u32>, ConfigError> {
    let Some(value) = value else {
        return Ok(None);
    };
    match value.trim().parse::<u32>() {
        Ok(n) if n > 0 => Ok(Some(n)),
        _ => Err(ConfigError::InvalidNumber { var, value }),
    }
}
