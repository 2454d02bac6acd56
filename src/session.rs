//! Per-client sessions
//!
//! A session owns one agent (and so one conversational memory) plus one pair
//! of transcripts. Runs are serialized behind the session lock: a second
//! prompt waits for the first run to finish instead of interleaving with it.

use crate::agent::{AgentError, ResearchAgent, StepEvent};
use crate::config::{AgentSettings, SearchConfig};
use crate::llm::LlmService;
use crate::search::SearchApi;
use crate::transcript::{ReducerError, TranscriptReducer, TranscriptSnapshot};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init {
        snapshot: TranscriptSnapshot,
        running: bool,
    },
    Transcripts {
        snapshot: TranscriptSnapshot,
    },
    RunDone,
    Error {
        message: String,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error(transparent)]
    Reducer(#[from] ReducerError),
}

/// Minimum gap between snapshots published for text deltas
const DELTA_PUBLISH_INTERVAL: Duration = Duration::from_millis(100);

/// Decides which reduced events are worth a snapshot. Step events always
/// are; deltas at most once per interval, the rest ride on the next publish.
struct PublishThrottle {
    interval: Duration,
    last_delta: Option<Instant>,
}

impl PublishThrottle {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_delta: None,
        }
    }

    fn should_publish(&mut self, event: &StepEvent, now: Instant) -> bool {
        if !matches!(event, StepEvent::StreamDelta(_)) {
            self.last_delta = None;
            return true;
        }
        match self.last_delta {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_delta = Some(now);
                true
            }
        }
    }
}

struct SessionState {
    agent: ResearchAgent,
    reducer: TranscriptReducer,
}

pub struct Session {
    id: String,
    created_at: DateTime<Utc>,
    state: Mutex<SessionState>,
    running: AtomicBool,
    reset_memory_per_run: bool,
    latest: watch::Sender<TranscriptSnapshot>,
    broadcast_tx: broadcast::Sender<SseEvent>,
}

impl Session {
    pub fn new(id: impl Into<String>, agent: ResearchAgent, reset_memory_per_run: bool) -> Self {
        let reducer = TranscriptReducer::new().with_skip_model_outputs(agent.stream_outputs());
        let (broadcast_tx, _) = broadcast::channel(256);
        Self {
            id: id.into(),
            created_at: Utc::now(),
            state: Mutex::new(SessionState { agent, reducer }),
            running: AtomicBool::new(false),
            reset_memory_per_run,
            latest: watch::Sender::new(TranscriptSnapshot::default()),
            broadcast_tx,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Latest published transcripts; never waits on a run in progress
    pub fn snapshot(&self) -> TranscriptSnapshot {
        self.latest.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SseEvent> {
        self.broadcast_tx.subscribe()
    }

    pub fn init_event(&self) -> SseEvent {
        SseEvent::Init {
            snapshot: self.snapshot(),
            running: self.is_running(),
        }
    }

    fn publish(&self, snapshot: TranscriptSnapshot) {
        self.latest.send_replace(snapshot.clone());
        let _ = self.broadcast_tx.send(SseEvent::Transcripts { snapshot });
    }

    /// Run one prompt to completion, streaming transcript updates.
    ///
    /// On failure the partial transcripts are still published before the
    /// error notification.
    pub async fn interact(&self, prompt: &str) -> Result<String, SessionError> {
        let mut guard = self.state.lock().await;
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(session_id = %self.id, "run started");
        let start = std::time::Instant::now();

        let SessionState { agent, reducer } = &mut *guard;
        if self.reset_memory_per_run {
            agent.reset();
        }
        reducer.set_skip_model_outputs(agent.stream_outputs());
        reducer.begin_run(prompt);
        self.publish(reducer.snapshot());

        let (tx, mut rx) = mpsc::unbounded_channel::<StepEvent>();
        let run = async move {
            let sink = move |event: StepEvent| {
                let _ = tx.send(event);
            };
            agent.run_streaming(prompt, None, &sink).await
        };
        let reduce = async {
            let mut throttle = PublishThrottle::new(DELTA_PUBLISH_INTERVAL);
            while let Some(event) = rx.recv().await {
                reducer.apply(&event)?;
                if throttle.should_publish(&event, Instant::now()) {
                    self.publish(reducer.snapshot());
                }
            }
            Ok::<(), ReducerError>(())
        };
        let (run_result, reduce_result) = tokio::join!(run, reduce);

        self.publish(reducer.snapshot());
        self.running.store(false, Ordering::SeqCst);

        let result = match (run_result, reduce_result) {
            (Ok(answer), Ok(())) => Ok(answer),
            (Err(e), _) => Err(SessionError::from(e)),
            (Ok(_), Err(e)) => Err(SessionError::from(e)),
        };

        match &result {
            Ok(_) => {
                tracing::info!(
                    session_id = %self.id,
                    duration_ms = %start.elapsed().as_millis(),
                    "run completed"
                );
                let _ = self.broadcast_tx.send(SseEvent::RunDone);
            }
            Err(e) => {
                tracing::error!(session_id = %self.id, error = %e, "run failed");
                let _ = self.broadcast_tx.send(SseEvent::Error {
                    message: format!("Error in interaction: {e}"),
                });
            }
        }
        result
    }

    /// Empty both transcripts and forget the conversation
    pub async fn clear(&self) {
        let mut guard = self.state.lock().await;
        guard.agent.reset();
        guard.reducer.clear();
        self.publish(guard.reducer.snapshot());
        tracing::info!(session_id = %self.id, "session cleared");
    }

    /// Rebuild the transcripts from recorded step events.
    ///
    /// Every event is decoded before anything is shown, so an unsupported
    /// kind leaves the transcripts untouched.
    pub async fn replay(&self, events: Vec<Value>) -> Result<TranscriptSnapshot, ReducerError> {
        let events = events
            .into_iter()
            .map(StepEvent::from_value)
            .collect::<Result<Vec<_>, _>>()?;

        let mut guard = self.state.lock().await;
        guard.reducer.clear();
        for event in &events {
            guard.reducer.apply(event)?;
        }
        let snapshot = guard.reducer.snapshot();
        self.publish(snapshot.clone());
        Ok(snapshot)
    }

    /// Switch the search/extract presets for subsequent runs
    pub async fn set_search_modes(
        &self,
        search_advanced: Option<bool>,
        extract_advanced: Option<bool>,
    ) -> (bool, bool) {
        let guard = self.state.lock().await;
        guard.agent.set_search_modes(search_advanced, extract_advanced);
        guard.agent.search_modes()
    }

    /// Recorded steps of the agent's memory
    pub async fn steps(&self) -> Vec<StepEvent> {
        self.state.lock().await.agent.steps().to_vec()
    }
}

/// Everything needed to build a fresh agent per session
pub struct AgentFactory {
    pub settings: AgentSettings,
    pub search_config: SearchConfig,
    pub llm: Arc<dyn LlmService>,
    pub search: Arc<dyn SearchApi>,
    pub vision: Option<Arc<dyn LlmService>>,
}

impl AgentFactory {
    fn build(&self) -> ResearchAgent {
        ResearchAgent::new(
            &self.settings,
            self.llm.clone(),
            self.search.clone(),
            self.vision.clone(),
            &self.search_config,
        )
    }
}

/// Manager for all live sessions
pub struct SessionManager {
    factory: AgentFactory,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
}

impl SessionManager {
    pub fn new(factory: AgentFactory) -> Self {
        Self {
            factory,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self) -> Arc<Session> {
        let id = uuid::Uuid::new_v4().to_string();
        let session = Arc::new(Session::new(
            id.clone(),
            self.factory.build(),
            self.factory.settings.reset_memory_per_run,
        ));
        let mut sessions = self.sessions.write().await;
        sessions.insert(id.clone(), session.clone());
        tracing::info!(session_id = %id, active = sessions.len(), "session created");
        session
    }

    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::info!(session_id = %id, "session closed");
        }
        removed
    }

    /// Search provider shared by every session
    pub fn search(&self) -> &Arc<dyn SearchApi> {
        &self.factory.search
    }

    pub fn model_id(&self) -> &str {
        self.factory.llm.model_id()
    }
}
