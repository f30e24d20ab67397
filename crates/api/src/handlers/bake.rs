//! Handlers for bake submission, progress streaming and the catalog.

use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::Json;
use futures::Stream;
use hourglass_core::catalog::CatalogEntry;
use hourglass_core::options::BakeOptions;
use hourglass_core::protocol::ProgressEvent;
use hourglass_core::types::TaskId;
use hourglass_events::{SubscriberId, Subscription, TaskRegistry};
use serde::Serialize;
use tokio::sync::mpsc;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Response body of a successful submission.
#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub id: TaskId,
}

/// POST /api/bake
///
/// The body is a sparse [`BakeOptions`] object; an empty body bakes with
/// every default.
pub async fn submit_bake(
    State(state): State<AppState>,
    body: Bytes,
) -> AppResult<Json<SubmitResponse>> {
    let options = parse_options(&body)?;
    let id = state.registry.submit(options).await?;
    Ok(Json(SubmitResponse { id }))
}

fn parse_options(body: &[u8]) -> Result<BakeOptions, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(BakeOptions::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid bake options: {e}")))
}

/// GET /api/stream/{id}
///
/// Replays the task log, then follows it live until the worker exits.
pub async fn stream_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> AppResult<Sse<KeepAliveStream<TaskEventStream>>> {
    let subscription = state.registry.attach(&id).await?;
    tracing::debug!(task_id = %id, subscriber = subscription.id, "Stream attached");
    let stream = TaskEventStream::new(Arc::clone(&state.registry), id, subscription);
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// GET /api/index
///
/// A missing or unreadable catalog is reported as an empty list.
pub async fn bake_index(State(state): State<AppState>) -> Json<Vec<CatalogEntry>> {
    Json(state.catalog.load())
}

/// Frame one progress event as `event: <name>` / `data: <json>`.
pub fn sse_event(event: &ProgressEvent) -> Event {
    Event::default()
        .event(event.name())
        .data(event.payload().to_string())
}

// ---------------------------------------------------------------------------
// Event stream
// ---------------------------------------------------------------------------

/// Server-sent event body for one subscriber.
///
/// Ends when the registry closes the subscription after `exit`. Dropping it
/// (client disconnect) detaches the subscriber from its task.
pub struct TaskEventStream {
    receiver: mpsc::UnboundedReceiver<ProgressEvent>,
    _detach: DetachOnDrop,
}

impl TaskEventStream {
    fn new(registry: Arc<TaskRegistry>, task_id: TaskId, subscription: Subscription) -> Self {
        Self {
            receiver: subscription.receiver,
            _detach: DetachOnDrop {
                registry,
                task_id,
                subscriber: subscription.id,
            },
        }
    }
}

impl Stream for TaskEventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver
            .poll_recv(cx)
            .map(|event| event.map(|e| Ok(sse_event(&e))))
    }
}

struct DetachOnDrop {
    registry: Arc<TaskRegistry>,
    task_id: TaskId,
    subscriber: SubscriberId,
}

impl Drop for DetachOnDrop {
    fn drop(&mut self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let registry = Arc::clone(&self.registry);
        let task_id = std::mem::take(&mut self.task_id);
        let subscriber = self.subscriber;
        handle.spawn(async move {
            registry.detach(&task_id, subscriber).await;
            tracing::debug!(task_id = %task_id, subscriber, "Stream detached");
        });
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn blank_body_means_defaults() {
        assert_eq!(parse_options(b"").unwrap(), BakeOptions::default());
        assert_eq!(parse_options(b" \n").unwrap(), BakeOptions::default());
    }

    #[test]
    fn sparse_body_keeps_other_defaults() {
        let options = parse_options(br#"{"duration": 5, "halfHeight": 300}"#).unwrap();
        assert_eq!(options.duration, 5.0);
        assert_eq!(options.half_height, 300.0);
        assert_eq!(options.fps, BakeOptions::default().fps);
    }

    #[test]
    fn malformed_body_is_bad_request() {
        let err = parse_options(b"{duration:").unwrap_err();
        assert_matches!(err, AppError::BadRequest(_));
    }
}
