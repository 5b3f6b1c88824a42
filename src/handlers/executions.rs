use axum::{extract::State, http::StatusCode, Json};
use validator::Validate;

use crate::errors::AppError;
use crate::models::requests::{AcceptedResponse, ExecutionReport};
use crate::services::engine_worker::EngineEvent;
use crate::state::AppState;

#[utoipa::path(
    post,
    path = "/executions",
    request_body = ExecutionReport,
    responses(
        (status = 202, description = "Execution report queued for reconciliation", body = AcceptedResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
        (status = 503, description = "Engine not accepting events", body = crate::errors::ErrorResponse)
    )
)]
pub async fn post_execution(
    State(state): State<AppState>,
    Json(report): Json<ExecutionReport>,
) -> Result<(StatusCode, Json<AcceptedResponse>), AppError> {
    report
        .validate()
        .map_err(|err| AppError::Validation(err.to_string()))?;

    state
        .events
        .send(EngineEvent::Execution(report))
        .await
        .map_err(|_| AppError::QueueClosed)?;

    Ok((StatusCode::ACCEPTED, Json(AcceptedResponse::queued())))
}
