use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub Uuid);

impl From<Uuid> for OrderId {
    fn from(u: Uuid) -> Self {
        Self(u)
    }
}

impl From<Uuid> for UserId {
    fn from(u: Uuid) -> Self {
        Self(u)
    }
}

impl From<Uuid> for ProductId {
    fn from(u: Uuid) -> Self {
        Self(u)
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Payment method chosen at order creation. Stored as a small integer, never
/// a string, so the Store never compares payment kind by text equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum PaymentKind {
    Card = 1,
    Points = 2,
}

impl PaymentKind {
    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            1 => Some(PaymentKind::Card),
            2 => Some(PaymentKind::Points),
            _ => None,
        }
    }

    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

/// Order lifecycle status. Stored as a small integer (see design notes);
/// `Cancelled` and `Delivered` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i16)]
pub enum OrderStatus {
    Created = 1,
    Paid = 2,
    Delivered = 3,
    Cancelled = 4,
}

impl OrderStatus {
    pub fn from_i16(v: i16) -> Option<Self> {
        match v {
            1 => Some(OrderStatus::Created),
            2 => Some(OrderStatus::Paid),
            3 => Some(OrderStatus::Delivered),
            4 => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn as_i16(self) -> i16 {
        self as i16
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductLine {
    pub product_id: ProductId,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub payment_kind: PaymentKind,
    pub status: OrderStatus,
    pub points_redeemed: u64,
    pub products: Vec<ProductLine>,
}

impl Order {
    /// Sum of every product line's amount. The Store never trusts a cached
    /// total; callers recompute it from the line items they hold.
    pub fn total_amount(&self) -> u64 {
        self.products.iter().map(|p| p.amount).sum()
    }
}

/// Input to order creation, before a Store-assigned `OrderId` exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub user_id: UserId,
    pub payment_kind: PaymentKind,
    pub points_redeemed: u64,
    pub products: Vec<ProductLine>,
}

impl NewOrder {
    pub fn total_amount(&self) -> u64 {
        self.products.iter().map(|p| p.amount).sum()
    }
}

/// Kind of domain event recorded in the outbox. The string form is the wire
/// value published to the bus and persisted in `outbox.event_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutboxEventKind {
    OrderCreated,
    OrderCancelled,
}

impl OutboxEventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutboxEventKind::OrderCreated => "ORDER_CREATED",
            OutboxEventKind::OrderCancelled => "ORDER_CANCELLED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ORDER_CREATED" => Some(OutboxEventKind::OrderCreated),
            "ORDER_CANCELLED" => Some(OutboxEventKind::OrderCancelled),
            _ => None,
        }
    }
}

/// Payload carried by every outbox event: enough for a downstream consumer
/// to look the order back up, nothing more.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxPayload {
    pub order_uuid: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_roundtrips_through_i16() {
        for s in [
            OrderStatus::Created,
            OrderStatus::Paid,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::from_i16(s.as_i16()), Some(s));
        }
    }

    #[test]
    fn unknown_status_code_is_none() {
        assert_eq!(OrderStatus::from_i16(99), None);
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Delivered.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Created.is_terminal());
        assert!(!OrderStatus::Paid.is_terminal());
    }

    #[test]
    fn total_amount_sums_product_lines() {
        let order = NewOrder {
            user_id: UserId(Uuid::nil()),
            payment_kind: PaymentKind::Card,
            points_redeemed: 0,
            products: vec![
                ProductLine { product_id: ProductId(Uuid::nil()), amount: 10 },
                ProductLine { product_id: ProductId(Uuid::nil()), amount: 25 },
            ],
        };
        assert_eq!(order.total_amount(), 35);
    }

    #[test]
    fn outbox_event_kind_wire_strings() {
        assert_eq!(OutboxEventKind::OrderCreated.as_str(), "ORDER_CREATED");
        assert_eq!(OutboxEventKind::OrderCancelled.as_str(), "ORDER_CANCELLED");
        assert_eq!(OutboxEventKind::parse("ORDER_CREATED"), Some(OutboxEventKind::OrderCreated));
        assert_eq!(OutboxEventKind::parse("garbage"), None);
    }
}
