//! Analytics API Handlers

use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::repository::ProductRepository;
use crate::utils::{AppError, AppResult};
use shared::models::product::ProductAggregate;

#[derive(Debug, Serialize)]
pub struct BackfillStatus {
    pub running: bool,
}

/// Product sales rollups, highest revenue first (admin)
pub async fn product_aggregates(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<ProductAggregate>>> {
    if !user.is_admin() {
        return Err(AppError::forbidden("Admin only"));
    }
    let repo = ProductRepository::new(state.db.clone());
    let aggregates = repo
        .list_aggregates()
        .await
        .map_err(|e| AppError::database(e.to_string()))?;
    Ok(Json(
        aggregates.into_iter().map(ProductAggregate::from).collect(),
    ))
}

/// Start a reconciliation backfill batch (admin); 409 if one is running
pub async fn start_backfill(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<(StatusCode, Json<BackfillStatus>)> {
    if !user.is_admin() {
        return Err(AppError::forbidden("Admin only"));
    }
    state.backfill.start(state.db.clone())?;
    tracing::info!(by = %user.id, "Backfill started");
    Ok((StatusCode::ACCEPTED, Json(BackfillStatus { running: true })))
}

/// Request cancellation of the running backfill (admin)
pub async fn cancel_backfill(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<BackfillStatus>> {
    if !user.is_admin() {
        return Err(AppError::forbidden("Admin only"));
    }
    state.backfill.cancel();
    Ok(Json(BackfillStatus {
        running: state.backfill.is_running(),
    }))
}
