//! Request validation and decode-to-domain conversion. Validate first,
//! convert only once every field is known-good — the Creation Service
//! never sees a malformed `NewOrder`.

use orders_schemas::{NewOrder, PaymentKind, ProductId, ProductLine, UserId};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid user_uuid")]
    InvalidUserUuid,
    #[error("invalid payment type")]
    InvalidPaymentType,
    #[error("products can't be empty")]
    EmptyProducts,
    #[error("invalid product uuid: {0}")]
    InvalidProductUuid(String),
    #[error("invalid amount")]
    InvalidAmount,
    #[error("incorrect points value")]
    IncorrectPointsValue,
    #[error("invalid order_uuid")]
    InvalidOrderUuid,
}

fn parse_payment_type(s: &str) -> Option<PaymentKind> {
    match s {
        "card" => Some(PaymentKind::Card),
        "points" => Some(PaymentKind::Points),
        _ => None,
    }
}

/// Validates a decoded `CreateOrderRequest` and converts it to the domain
/// `NewOrder` the Creation Service accepts: user uuid, then payment type,
/// then products (non-empty, each uuid valid, each amount > 0), then the
/// points-bound check last since it needs the summed total.
pub fn validate_create(req: &crate::api_types::CreateOrderRequest) -> Result<NewOrder, ValidationError> {
    let user_uuid = Uuid::parse_str(&req.user_uuid).map_err(|_| ValidationError::InvalidUserUuid)?;

    let payment_kind = parse_payment_type(&req.payment_type).ok_or(ValidationError::InvalidPaymentType)?;

    if req.products.is_empty() {
        return Err(ValidationError::EmptyProducts);
    }

    let mut products = Vec::with_capacity(req.products.len());
    let mut total_amount: u64 = 0;
    for p in &req.products {
        let product_uuid =
            Uuid::parse_str(&p.uuid).map_err(|_| ValidationError::InvalidProductUuid(p.uuid.clone()))?;
        if p.amount == 0 {
            return Err(ValidationError::InvalidAmount);
        }
        total_amount += p.amount;
        products.push(ProductLine { product_id: ProductId(product_uuid), amount: p.amount });
    }

    if payment_kind == PaymentKind::Points && (req.with_points < 0 || req.with_points as u64 > total_amount) {
        return Err(ValidationError::IncorrectPointsValue);
    }

    Ok(NewOrder {
        user_id: UserId(user_uuid),
        payment_kind,
        points_redeemed: req.with_points.max(0) as u64,
        products,
    })
}

pub fn validate_cancel(req: &crate::api_types::CancelOrderRequest) -> Result<Uuid, ValidationError> {
    Uuid::parse_str(&req.order_uuid).map_err(|_| ValidationError::InvalidOrderUuid)
}

pub fn validate_get_orders(req: &crate::api_types::GetOrdersRequest) -> Result<Vec<orders_schemas::OrderId>, ValidationError> {
    req.uuids
        .iter()
        .map(|s| Uuid::parse_str(s).map(orders_schemas::OrderId).map_err(|_| ValidationError::InvalidOrderUuid))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api_types::{CreateOrderRequest, ProductRequest};

    fn base_request() -> CreateOrderRequest {
        CreateOrderRequest {
            user_uuid: Uuid::new_v4().to_string(),
            products: vec![ProductRequest { uuid: Uuid::new_v4().to_string(), amount: 10 }],
            payment_type: "card".to_string(),
            with_points: 0,
        }
    }

    #[test]
    fn valid_card_request_passes() {
        assert!(validate_create(&base_request()).is_ok());
    }

    #[test]
    fn empty_products_rejected() {
        let mut req = base_request();
        req.products.clear();
        assert!(matches!(validate_create(&req), Err(ValidationError::EmptyProducts)));
    }

    #[test]
    fn zero_amount_rejected() {
        let mut req = base_request();
        req.products[0].amount = 0;
        assert!(matches!(validate_create(&req), Err(ValidationError::InvalidAmount)));
    }

    #[test]
    fn unknown_payment_type_rejected() {
        let mut req = base_request();
        req.payment_type = "crypto".to_string();
        assert!(matches!(validate_create(&req), Err(ValidationError::InvalidPaymentType)));
    }

    #[test]
    fn points_over_total_rejected() {
        let mut req = base_request();
        req.payment_type = "points".to_string();
        req.with_points = 1000;
        assert!(matches!(validate_create(&req), Err(ValidationError::IncorrectPointsValue)));
    }

    #[test]
    fn points_within_total_accepted() {
        let mut req = base_request();
        req.payment_type = "points".to_string();
        req.with_points = 5;
        assert!(validate_create(&req).is_ok());
    }

    #[test]
    fn malformed_user_uuid_rejected() {
        let mut req = base_request();
        req.user_uuid = "not-a-uuid".to_string();
        assert!(matches!(validate_create(&req), Err(ValidationError::InvalidUserUuid)));
    }
}
