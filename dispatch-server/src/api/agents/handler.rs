//! Delivery Agent API Handlers

use axum::{Json, extract::State};

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::repository::UserRepository;
use crate::utils::{AppError, AppResult};
use shared::event::{AgentStatusPayload, Audience, DomainEvent};
use shared::models::user::{AgentStatusUpdate, Role, UserResponse};
use shared::util::now_millis;

/// Agent roster (admin)
pub async fn roster(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<UserResponse>>> {
    if !user.is_admin() {
        return Err(AppError::forbidden("Admin only"));
    }
    let repo = UserRepository::new(state.db.clone());
    let agents = repo
        .list_agents()
        .await
        .map_err(|e| AppError::database(e.to_string()))?;
    Ok(Json(agents.into_iter().map(UserResponse::from).collect()))
}

/// Agent toggles own online/offline flag
///
/// 身上还有在途订单时不允许下线（409）。
pub async fn update_status(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<AgentStatusUpdate>,
) -> AppResult<Json<UserResponse>> {
    if user.role != Role::DeliveryAgent {
        return Err(AppError::forbidden("Delivery agents only"));
    }

    let repo = UserRepository::new(state.db.clone());
    let updated = repo
        .set_online(&user.id, payload.is_online)
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

    let record = match updated {
        Some(record) => record,
        None => {
            // 守护条件未命中：区分订单占用与账号消失
            let exists = repo
                .find_by_id(&user.id)
                .await
                .map_err(|e| AppError::database(e.to_string()))?
                .is_some();
            if exists {
                return Err(AppError::conflict(
                    "Cannot go offline while active orders remain",
                ));
            }
            return Err(AppError::not_found(format!("User {} not found", user.id)));
        }
    };

    let event = DomainEvent::AgentStatusChanged(AgentStatusPayload {
        agent_id: user.id.clone(),
        timestamp: now_millis(),
        is_online: record.is_online,
    });
    state.fanout.publish(&event, Audience::Role(Role::Admin)).await;

    tracing::info!(agent_id = %user.id, is_online = record.is_online, "Agent status changed");

    Ok(Json(record.into()))
}
