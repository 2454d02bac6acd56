//! Server-Sent Events support

use crate::session::SseEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

const KEEP_ALIVE: Duration = Duration::from_secs(15);

/// Session updates as an SSE response: the `init` event first, then whatever
/// the session broadcasts.
pub fn sse_stream(
    init: SseEvent,
    updates: broadcast::Receiver<SseEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Every transcripts event is a full snapshot, so lagged ones can be skipped
    let updates = BroadcastStream::new(updates).filter_map(Result::ok);
    let events = futures::stream::once(async move { init })
        .chain(updates)
        .map(|event| Ok::<_, Infallible>(to_sse(event)));

    Sse::new(events).keep_alive(KeepAlive::new().interval(KEEP_ALIVE).text("ping"))
}

fn to_sse(event: SseEvent) -> Event {
    let (event_type, data) = match event {
        SseEvent::Init { snapshot, running } => (
            "init",
            json!({
                "type": "init",
                "verbose": snapshot.verbose,
                "quiet": snapshot.quiet,
                "running": running
            }),
        ),
        SseEvent::Transcripts { snapshot } => (
            "transcripts",
            json!({
                "type": "transcripts",
                "verbose": snapshot.verbose,
                "quiet": snapshot.quiet
            }),
        ),
        SseEvent::RunDone => ("run_done", json!({ "type": "run_done" })),
        SseEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    };

    Event::default().event(event_type).data(data.to_string())
}
