use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;

use crate::errors::AppError;
use crate::models::book::BookSnapshot;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/book",
    responses(
        (status = 200, description = "Open positions, pending exits and recent trades", body = BookSnapshot)
    )
)]
pub async fn get_book(State(state): State<AppState>) -> Result<Json<BookSnapshot>, AppError> {
    let snapshot = state.book.snapshot.read().await.clone();
    Ok(Json(snapshot))
}

#[utoipa::path(
    get,
    path = "/book/stream",
    responses(
        (status = 200, description = "SSE stream of book snapshots", content_type = "text/event-stream")
    )
)]
pub async fn get_book_stream(
    State(state): State<AppState>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    let initial_snapshot = state.book.snapshot.read().await.clone();

    let initial_events = match snapshot_event(initial_snapshot) {
        Some(event) => vec![Ok(event)],
        None => Vec::new(),
    };
    let initial_stream = tokio_stream::iter(initial_events);

    let rx = state.book.broadcaster.subscribe();
    let broadcast_stream = BroadcastStream::new(rx).filter_map(|message| match message {
        Ok(snapshot) => snapshot_event(snapshot).map(Ok),
        Err(BroadcastStreamRecvError::Lagged(skipped)) => {
            tracing::debug!("Book stream subscriber lagged by {} snapshots", skipped);
            None
        }
    });

    let stream = initial_stream.chain(broadcast_stream);

    Ok(Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

fn snapshot_event(snapshot: BookSnapshot) -> Option<Event> {
    let data = serde_json::to_string(&snapshot).ok()?;
    Some(
        Event::default()
            .event("snapshot")
            .id(snapshot.as_of_ms.to_string())
            .data(data),
    )
}
