//! HTTP surface of the shelf service
//!
//! Read-only snapshots for the kiosk UI, the badge/override/presence/payment
//! inputs pushed by other local processes, and the SSE change feed.

pub mod handlers;
pub mod sse;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::checkout::Checkout;
use crate::collaborators::SharedPresence;
use crate::error::Error;
use crate::fanout::Fanout;
use crate::mode::ModeController;
use crate::state::SharedState;

/// Shared application context passed to all handlers
#[derive(Clone)]
pub struct AppContext {
    pub shelf_id: String,
    pub state: Arc<SharedState>,
    pub modes: ModeController,
    pub checkout: Checkout,
    pub presence: Arc<SharedPresence>,
    pub fanout: Fanout,
}

/// Build the router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/events", get(sse::event_stream))
        .nest(
            "/api/v1",
            Router::new()
                .route("/taken_quantity", get(handlers::get_taken_quantity))
                .route("/loadcell", get(handlers::get_loadcell))
                .route("/mode", get(handlers::get_mode))
                .route("/connections", get(handlers::get_connections))
                .route("/cart", get(handlers::get_cart))
                .route("/badge", post(handlers::submit_badge))
                .route("/override", post(handlers::set_override))
                .route("/presence", post(handlers::set_presence))
                .route("/payment", post(handlers::confirm_payment)),
        )
        .with_state(ctx)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            Error::InvalidSlot(_) | Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            Error::OverrideRejected { .. } => (StatusCode::CONFLICT, "OVERRIDE_REJECTED"),
            Error::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            Error::Persistence(_) => (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}
