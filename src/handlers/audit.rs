use axum::{
    extract::{Query, State},
    Json,
};
use validator::Validate;

use crate::errors::AppError;
use crate::models::book::AuditResponse;
use crate::models::requests::AuditQuery;
use crate::state::AppState;

#[utoipa::path(
    get,
    path = "/audit",
    params(AuditQuery),
    responses(
        (status = 200, description = "Recent guard, entry and exit-correction records, newest first", body = AuditResponse),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    )
)]
pub async fn get_audit(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditResponse>, AppError> {
    query
        .validate()
        .map_err(|err| AppError::Validation(err.to_string()))?;

    let entries = state.book.recent_audit(query.limit).await;
    Ok(Json(AuditResponse { entries }))
}
