//! User API Handlers

use axum::{
    Json,
    extract::{Path, State},
};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::repository::UserRepository;
use crate::utils::{AppError, AppResult};
use shared::models::user::{ApprovalState, ApprovalUpdate, UserResponse};

/// Current account profile
pub async fn me(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<UserResponse>> {
    let repo = UserRepository::new(state.db.clone());
    let record = repo
        .find_by_id(&user.id)
        .await
        .map_err(|e| AppError::database(e.to_string()))?
        .ok_or_else(|| AppError::not_found(format!("User {} not found", user.id)))?;
    Ok(Json(record.into()))
}

/// Admin: approve or reject a delivery agent
pub async fn update_approval(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(id): Path<String>,
    Json(payload): Json<ApprovalUpdate>,
) -> AppResult<Json<UserResponse>> {
    if !user.is_admin() {
        return Err(AppError::forbidden("Admin only"));
    }

    let approval = match (payload.is_approved, payload.is_rejected) {
        (Some(true), Some(true)) => {
            return Err(AppError::validation(
                "is_approved and is_rejected are mutually exclusive",
            ));
        }
        (_, Some(true)) => ApprovalState::Rejected,
        (Some(true), _) => ApprovalState::Approved,
        (Some(false), _) | (None, Some(false)) => ApprovalState::Pending,
        (None, None) => {
            return Err(AppError::validation(
                "one of is_approved / is_rejected is required",
            ));
        }
    };

    let rejection_reason = if approval == ApprovalState::Rejected {
        payload.rejection_reason
    } else {
        None
    };

    let repo = UserRepository::new(state.db.clone());
    let updated = repo
        .set_approval(&id, approval, rejection_reason)
        .await
        .map_err(|e| AppError::database(e.to_string()))?
        .ok_or_else(|| AppError::not_found(format!("User {} not found", id)))?;

    tracing::info!(user_id = %id, approval = ?approval, by = %user.id, "Agent approval updated");

    Ok(Json(updated.into()))
}
