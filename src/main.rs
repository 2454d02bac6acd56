//! `smolalbert` - web research agent with a two-view chat UI
//!
//! An axum server that runs a tool-calling research agent against a hosted
//! inference router and a web search API, streaming each run to the browser
//! as a verbose trace and a quiet summary.

mod agent;
mod api;
mod config;
mod llm;
mod search;
mod session;
mod tools;
mod transcript;

use api::{create_router, AppState};
use config::AppConfig;
use llm::{InferenceService, LlmService, LoggingService};
use search::TavilyClient;
use session::{AgentFactory, SessionManager};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "smolalbert=info,tower_http=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env()?;

    if config.search.api_key.is_none() {
        tracing::warn!("TAVILY_API_KEY is not set; search tools will report errors");
    }
    let hf_key = config.llm.api_key.clone().unwrap_or_else(|| {
        tracing::warn!("HF_API_KEY is not set; model calls will fail authentication");
        String::new()
    });

    let search = Arc::new(TavilyClient::new(
        config.search.api_key.clone(),
        &config.search.base_url,
    ));

    let llm: Arc<dyn LlmService> = Arc::new(LoggingService::new(Arc::new(InferenceService::new(
        hf_key.clone(),
        &config.llm.endpoint,
        &config.llm.model_id,
        &config.llm.provider,
    ))));

    let vision: Option<Arc<dyn LlmService>> = config.agent.image_query.then(|| {
        Arc::new(LoggingService::new(Arc::new(InferenceService::new(
            hf_key,
            &config.llm.endpoint,
            &config.llm.vision_model_id,
            &config.llm.provider,
        )))) as Arc<dyn LlmService>
    });

    tracing::info!(
        model = %config.llm.model_id,
        provider = %config.llm.provider,
        max_steps = config.agent.max_steps,
        stream_outputs = config.agent.stream_outputs,
        "agent configured"
    );

    let sessions = SessionManager::new(AgentFactory {
        settings: config.agent.clone(),
        search_config: config.search.clone(),
        llm,
        search,
        vision,
    });
    let state = AppState::new(sessions);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("smolalbert server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
