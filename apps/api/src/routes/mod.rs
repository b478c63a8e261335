pub mod health;

use axum::{routing::get, Router};

use crate::messaging::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/messages/conversations",
            get(handlers::handle_list_conversations).post(handlers::handle_open_conversation),
        )
        .route(
            "/api/messages/conversations/:id",
            get(handlers::handle_view_conversation).post(handlers::handle_send_message),
        )
        .with_state(state)
}
