//! Request and response types for the order write-path HTTP surface.
//! Plain data only; decode/validate logic lives in `validation.rs`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// POST /order
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub user_uuid: String,
    pub products: Vec<ProductRequest>,
    pub payment_type: String,
    #[serde(default)]
    pub with_points: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductRequest {
    pub uuid: String,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderResponse {
    pub order_uuid: Uuid,
}

// ---------------------------------------------------------------------------
// POST /order/cancel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CancelOrderRequest {
    pub order_uuid: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CancelOrderResponse {
    pub message: &'static str,
}

// ---------------------------------------------------------------------------
// GET /order (batch)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct GetOrdersRequest {
    pub uuids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub order_uuid: Uuid,
    pub user_uuid: Uuid,
    pub payment_type: &'static str,
    pub status: &'static str,
    pub with_points: u64,
    pub products: Vec<ProductResponse>,
    pub total_amount: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductResponse {
    pub uuid: Uuid,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GetOrdersResponse {
    pub orders: Vec<OrderResponse>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Uniform error body for every non-2xx response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

// ---------------------------------------------------------------------------
// /health, /status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    /// Count of unprocessed outbox rows — the operator-visible backlog
    /// metric for the relay.
    pub outbox_backlog: i64,
}

impl From<orders_schemas::Order> for OrderResponse {
    fn from(order: orders_schemas::Order) -> Self {
        let total_amount = order.total_amount();
        Self {
            order_uuid: order.order_id.0,
            user_uuid: order.user_id.0,
            payment_type: match order.payment_kind {
                orders_schemas::PaymentKind::Card => "card",
                orders_schemas::PaymentKind::Points => "points",
            },
            status: match order.status {
                orders_schemas::OrderStatus::Created => "created",
                orders_schemas::OrderStatus::Paid => "paid",
                orders_schemas::OrderStatus::Delivered => "delivered",
                orders_schemas::OrderStatus::Cancelled => "cancelled",
            },
            with_points: order.points_redeemed,
            products: order
                .products
                .into_iter()
                .map(|p| ProductResponse { uuid: p.product_id.0, amount: p.amount })
                .collect(),
            total_amount,
        }
    }
}
