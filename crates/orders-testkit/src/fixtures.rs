use orders_schemas::{NewOrder, PaymentKind, ProductId, ProductLine, UserId};
use uuid::Uuid;

/// A single-line card order, amount 10 — the minimal valid fixture.
pub fn sample_new_order() -> NewOrder {
    sample_new_order_with_amounts(PaymentKind::Card, 0, &[10])
}

/// An order with one product line per entry in `amounts`.
pub fn sample_new_order_with_amounts(
    payment_kind: PaymentKind,
    points_redeemed: u64,
    amounts: &[u64],
) -> NewOrder {
    NewOrder {
        user_id: UserId(Uuid::new_v4()),
        payment_kind,
        points_redeemed,
        products: amounts
            .iter()
            .map(|&amount| ProductLine { product_id: ProductId(Uuid::new_v4()), amount })
            .collect(),
    }
}
