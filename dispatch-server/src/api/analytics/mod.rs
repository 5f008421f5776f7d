//! Analytics API Module

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/analytics", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/products", get(handler::product_aggregates))
        .route(
            "/backfill",
            post(handler::start_backfill).delete(handler::cancel_backfill),
        )
}
