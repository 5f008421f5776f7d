//! Order API Module
//!
//! 所有变更都经过 OrderService / AssignmentCoordinator，路由层只做
//! 鉴权与参数解析，不做任何状态判断。

mod handler;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create).get(handler::list))
        .route("/{id}", get(handler::get_by_id))
        .route("/{id}/status", patch(handler::update_status))
        .route("/{id}/payment", post(handler::record_payment))
}
