//! HTTP API: sessions, SSE streaming and the embedded UI

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::session::SessionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(sessions: SessionManager) -> Self {
        Self {
            sessions: Arc::new(sessions),
        }
    }
}
