//! Delivery Agent API Module

mod handler;

use axum::{
    Router,
    routing::{get, patch},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/agents", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::roster))
        .route("/status", patch(handler::update_status))
}
