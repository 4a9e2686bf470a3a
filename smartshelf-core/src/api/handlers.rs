//! HTTP request handlers

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use smartshelf_common::events::{CartLine, RejectReason, SlotErrorCode};
use smartshelf_common::slots::{LoadcellUnit, ShelfMode, SlotVector};

use crate::api::AppContext;
use crate::cart;
use crate::error::Result;
use crate::mode::BadgeOutcome;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    shelf_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SlotValuesResponse {
    pub values: SlotVector,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ModeResponse {
    pub mode: ShelfMode,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConnectionsResponse {
    pub unit1: bool,
    pub unit2: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CartResponse {
    pub cart: Vec<CartLine>,
    pub total: u64,
    pub error_codes: Vec<SlotErrorCode>,
}

#[derive(Debug, Deserialize)]
pub struct BadgeRequest {
    badge_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BadgeResponse {
    pub accepted: bool,
    pub mode: ShelfMode,
    pub reason: Option<RejectReason>,
}

#[derive(Debug, Deserialize)]
pub struct OverrideRequest {
    slot: usize,
    quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct PresenceRequest {
    present: bool,
}

#[derive(Debug, Deserialize)]
pub struct PaymentRequest {
    amount: u64,
    order_code: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub status: String,
    pub total: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

// ============================================================================
// Snapshots
// ============================================================================

/// GET /health
pub async fn health(State(ctx): State<AppContext>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "smartshelf".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        shelf_id: ctx.shelf_id,
    })
}

/// GET /api/v1/taken_quantity
pub async fn get_taken_quantity(State(ctx): State<AppContext>) -> Json<SlotValuesResponse> {
    Json(SlotValuesResponse {
        values: ctx.state.taken_quantity().await,
    })
}

/// GET /api/v1/loadcell - live weights with sentinels intact
pub async fn get_loadcell(State(ctx): State<AppContext>) -> Json<SlotValuesResponse> {
    Json(SlotValuesResponse {
        values: ctx.state.live_weight().await,
    })
}

/// GET /api/v1/mode
pub async fn get_mode(State(ctx): State<AppContext>) -> Json<ModeResponse> {
    Json(ModeResponse {
        mode: ctx.state.mode().await,
    })
}

/// GET /api/v1/connections
pub async fn get_connections(State(ctx): State<AppContext>) -> Json<ConnectionsResponse> {
    Json(ConnectionsResponse {
        unit1: ctx.state.connection(LoadcellUnit::Unit1),
        unit2: ctx.state.connection(LoadcellUnit::Unit2),
    })
}

/// GET /api/v1/cart
pub async fn get_cart(State(ctx): State<AppContext>) -> Json<CartResponse> {
    let lines = cart::current_cart(&ctx.state).await;
    let live = ctx.state.live_weight().await;
    Json(CartResponse {
        total: cart::cart_total(&lines),
        cart: lines,
        error_codes: cart::error_codes(&live),
    })
}

// ============================================================================
// Inputs
// ============================================================================

/// POST /api/v1/badge
pub async fn submit_badge(
    State(ctx): State<AppContext>,
    Json(req): Json<BadgeRequest>,
) -> Result<Json<BadgeResponse>> {
    let response = match ctx.modes.submit_badge_scan(&req.badge_id).await? {
        BadgeOutcome::Accepted(mode) => BadgeResponse {
            accepted: true,
            mode,
            reason: None,
        },
        BadgeOutcome::Rejected(reason) => BadgeResponse {
            accepted: false,
            mode: ctx.state.mode().await,
            reason: Some(reason),
        },
    };
    Ok(Json(response))
}

/// POST /api/v1/override - staff quantity for a slot whose loadcell failed
pub async fn set_override(
    State(ctx): State<AppContext>,
    Json(req): Json<OverrideRequest>,
) -> Result<Json<StatusResponse>> {
    ctx.state.set_manual_override(req.slot, req.quantity).await?;
    info!("Manual override: slot {} = {}", req.slot, req.quantity);
    ctx.fanout.publish().await;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}

/// POST /api/v1/presence - pushed by the vision pipeline
pub async fn set_presence(
    State(ctx): State<AppContext>,
    Json(req): Json<PresenceRequest>,
) -> Json<StatusResponse> {
    ctx.presence.set(req.present);
    Json(StatusResponse {
        status: "ok".to_string(),
    })
}

/// POST /api/v1/payment - payment gateway confirmation
pub async fn confirm_payment(
    State(ctx): State<AppContext>,
    Json(req): Json<PaymentRequest>,
) -> Result<Json<PaymentResponse>> {
    let total = ctx.checkout.confirm_payment(req.amount, req.order_code).await?;
    Ok(Json(PaymentResponse {
        status: "verified".to_string(),
        total,
    }))
}
