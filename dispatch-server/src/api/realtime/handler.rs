//! Realtime API Handlers

use axum::{Json, extract::State};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::realtime::ConnectedSession;
use crate::utils::{AppError, AppResult};

/// Connected realtime sessions (admin)
pub async fn sessions(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<ConnectedSession>>> {
    if !user.is_admin() {
        return Err(AppError::forbidden("Admin only"));
    }
    Ok(Json(state.registry.connected()))
}
