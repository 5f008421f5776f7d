//! Product API Handlers

use axum::{Json, extract::State, http::StatusCode};
use validator::Validate;

use crate::auth::CurrentUser;
use crate::core::ServerState;
use crate::db::models::ProductRecord;
use crate::db::repository::ProductRepository;
use crate::utils::{AppError, AppResult};
use shared::models::product::{Product, ProductCreate};

/// List active catalog products
pub async fn list(
    State(state): State<ServerState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<Product>>> {
    let repo = ProductRepository::new(state.db.clone());
    let products = repo
        .find_all()
        .await
        .map_err(|e| AppError::database(e.to_string()))?;
    Ok(Json(products.into_iter().map(Product::from).collect()))
}

/// Create a catalog product (admin)
pub async fn create(
    State(state): State<ServerState>,
    user: CurrentUser,
    Json(payload): Json<ProductCreate>,
) -> AppResult<(StatusCode, Json<Product>)> {
    if !user.is_admin() {
        return Err(AppError::forbidden("Admin only"));
    }
    payload.validate()?;

    let repo = ProductRepository::new(state.db.clone());
    let created = repo
        .create(ProductRecord {
            id: None,
            name: payload.name,
            price: payload.price,
            is_active: true,
            placeholder: false,
        })
        .await
        .map_err(|e| AppError::database(e.to_string()))?;

    Ok((StatusCode::CREATED, Json(created.into())))
}
