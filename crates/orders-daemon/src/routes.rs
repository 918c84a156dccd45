//! Axum router and handlers: one `build_router` entry point, handlers
//! `pub(crate)` so scenario tests can compose the bare router without
//! middleware.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::info;

use crate::{
    api_types::{
        CancelOrderRequest, CancelOrderResponse, CreateOrderRequest, CreateOrderResponse,
        ErrorResponse, GetOrdersRequest, GetOrdersResponse, HealthResponse, OrderResponse,
        StatusResponse,
    },
    state::{uptime_secs, AppState},
    validation::{self, ValidationError},
};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/status", get(status_handler))
        .route("/order", post(create_order).get(get_orders))
        .route("/orders", get(get_orders))
        .route("/order/cancel", post(cancel_order))
        .with_state(state)
}

pub(crate) async fn health(State(st): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse { ok: true, service: st.build.service, version: st.build.version }),
    )
}

pub(crate) async fn status_handler(State(st): State<AppState>) -> impl IntoResponse {
    let outbox_backlog = orders_db::count_unprocessed_outbox(&st.pool).await.unwrap_or(-1);
    (
        StatusCode::OK,
        Json(StatusResponse {
            service: st.build.service,
            version: st.build.version,
            uptime_secs: uptime_secs(),
            outbox_backlog,
        }),
    )
}

pub(crate) async fn create_order(
    State(st): State<AppState>,
    Json(req): Json<CreateOrderRequest>,
) -> Response {
    let new_order = match validation::validate_create(&req) {
        Ok(n) => n,
        Err(e) => return validation_error_response(e),
    };

    match st.creation.create(new_order).await {
        Ok(order_id) => {
            info!(order_id = %order_id, "order created");
            (StatusCode::OK, Json(CreateOrderResponse { order_uuid: order_id.0 })).into_response()
        }
        Err(e) => service_error_response(e),
    }
}

pub(crate) async fn cancel_order(
    State(st): State<AppState>,
    Json(req): Json<CancelOrderRequest>,
) -> Response {
    let order_uuid = match validation::validate_cancel(&req) {
        Ok(u) => u,
        Err(e) => return validation_error_response(e),
    };

    match st.cancellation.cancel(orders_schemas::OrderId(order_uuid)).await {
        Ok(()) => {
            info!(order_uuid = %order_uuid, "order cancelled");
            (StatusCode::OK, Json(CancelOrderResponse { message: "order canceled" })).into_response()
        }
        Err(e) => cancel_outcome_response(e),
    }
}

pub(crate) async fn get_orders(
    State(st): State<AppState>,
    Json(req): Json<GetOrdersRequest>,
) -> Response {
    let ids = match validation::validate_get_orders(&req) {
        Ok(ids) => ids,
        Err(e) => return validation_error_response(e),
    };

    match st.retrieval.get_orders_by_ids(&ids).await {
        Ok(orders) => {
            let orders: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
            (StatusCode::OK, Json(GetOrdersResponse { orders })).into_response()
        }
        Err(e) => service_error_response(e),
    }
}

fn validation_error_response(e: ValidationError) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: e.to_string() })).into_response()
}

/// `NotFound` surfaces as 404. `Conflict` (serialization retry exhaustion)
/// and storage failures surface as 500 — infrastructure conditions, not
/// client mistakes.
fn service_error_response(e: orders_service::ServiceError) -> Response {
    use orders_service::ServiceError::*;
    let status = match e {
        NotFound => StatusCode::NOT_FOUND,
        StorageUnavailable(_) | Conflict => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

/// 409 for `Already*` domain-rule violations, 404 for `NotFound`, 500 for
/// infrastructure kinds.
fn cancel_outcome_response(e: orders_service::CancelOutcome) -> Response {
    use orders_service::CancelOutcome::*;
    let status = match e {
        NotFound => StatusCode::NOT_FOUND,
        AlreadyCancelled | AlreadyDelivered | IllegalStatus => StatusCode::CONFLICT,
        Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}
