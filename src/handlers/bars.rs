use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::errors::AppError;
use crate::models::requests::{AcceptedResponse, ClosedBarRequest};
use crate::services::engine_worker::EngineEvent;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/bars",
    request_body = ClosedBarRequest,
    responses(
        (status = 202, description = "Closed bar queued for the engine", body = AcceptedResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 503, description = "Engine not accepting events", body = crate::errors::ErrorResponse)
    )
)]
pub async fn post_bar(
    State(state): State<AppState>,
    Json(request): Json<ClosedBarRequest>,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    request
        .validate()
        .map_err(|err| AppError::Validation(err.to_string()))?;

    let received_at_ms = chrono::Utc::now().timestamp_millis() as u64;
    state
        .events
        .send(EngineEvent::BarClosed {
            request,
            received_at_ms,
        })
        .await
        .map_err(|_| AppError::QueueClosed)?;

    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::queued())))
}
