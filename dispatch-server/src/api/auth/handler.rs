//! Auth API Handlers

use axum::{Json, extract::State, http::StatusCode};
use validator::Validate;

use crate::auth::password;
use crate::core::ServerState;
use crate::db::models::UserRecord;
use crate::db::repository::{RepoError, UserRepository};
use crate::utils::{AppError, AppResult};
use shared::models::user::{
    ApprovalState, AuthResponse, LoginRequest, RegisterRequest, Role, UserResponse,
};
use shared::util::now_millis;

/// Register a new account
///
/// 骑手账号创建后处于待审批状态；管理员账号仅允许在尚无管理员时
/// 自举创建。
pub async fn register(
    State(state): State<ServerState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<AuthResponse>)> {
    payload.validate()?;

    let repo = UserRepository::new(state.db.clone());

    // 管理员仅允许自举：已有管理员后不再开放注册
    if payload.role == Role::Admin
        && repo
            .any_admin_exists()
            .await
            .map_err(|e| AppError::database(e.to_string()))?
    {
        return Err(AppError::forbidden(
            "Admin accounts are created by an existing admin",
        ));
    }

    let approval = match payload.role {
        Role::DeliveryAgent => ApprovalState::Pending,
        _ => ApprovalState::Approved,
    };

    let record = UserRecord {
        id: None,
        username: payload.username.clone(),
        password_hash: password::hash_password(&payload.password)?,
        role: payload.role,
        approval,
        rejection_reason: None,
        is_online: false,
        active_order_count: 0,
        created_at: now_millis(),
    };

    let created = repo.create(record).await.map_err(|e| match e {
        RepoError::Duplicate(msg) => AppError::conflict(msg),
        other => AppError::database(other.to_string()),
    })?;

    let user: UserResponse = created.into();
    let token = state
        .jwt_service
        .generate_token(&user.id, &user.username, user.role)
        .map_err(|e| AppError::internal(format!("Token generation failed: {}", e)))?;

    tracing::info!(user_id = %user.id, role = %user.role, "User registered");

    Ok((StatusCode::CREATED, Json(AuthResponse { token, user })))
}

/// Login with username/password
pub async fn login(
    State(state): State<ServerState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<AuthResponse>> {
    let repo = UserRepository::new(state.db.clone());

    let record = repo
        .find_by_username(&payload.username)
        .await
        .map_err(|e| AppError::database(e.to_string()))?
        .ok_or_else(AppError::invalid_credentials)?;

    if !password::verify_password(&payload.password, &record.password_hash) {
        tracing::warn!(target: "security", username = %payload.username, "login_failed");
        return Err(AppError::invalid_credentials());
    }

    let user: UserResponse = record.into();
    let token = state
        .jwt_service
        .generate_token(&user.id, &user.username, user.role)
        .map_err(|e| AppError::internal(format!("Token generation failed: {}", e)))?;

    Ok(Json(AuthResponse { token, user }))
}
