//! Domain events
use crate::domain::aggregates::OrderStatus;
use crate::domain::value_objects::OrderSlug;
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Product(ProductEvent),
    Order(OrderEvent),
    Delivery(DeliveryEvent),
    Payment(PaymentEvent),
    Refund(RefundEvent),
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ProductEvent {
    StockReserved { product_id: Uuid, quantity: u32, remaining: u32 },
    StockReleased { product_id: Uuid, quantity: u32, remaining: u32 },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OrderEvent {
    Placed { order_id: Uuid, order_slug: OrderSlug, user_id: Uuid, total_amount: Decimal },
    StatusChanged { order_id: Uuid, from: OrderStatus, to: OrderStatus },
    Cancelled { order_id: Uuid },
    Deleted { order_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum DeliveryEvent {
    Created { delivery_id: Uuid, order_id: Uuid },
    Cancelled { delivery_id: Uuid, order_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum PaymentEvent {
    Opened { payment_id: Uuid, session_id: String, user_id: Uuid, amount: Decimal },
    Completed { payment_id: Uuid, order_ids: Vec<Uuid>, amount: Decimal },
    Failed { payment_id: Uuid },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RefundEvent {
    Requested { refund_id: Uuid, order_id: Uuid, total: Decimal },
    Approved { refund_id: Uuid, order_id: Uuid },
    Rejected { refund_id: Uuid, order_id: Uuid },
}

impl DomainEvent {
    /// Messaging subject, `ecommerce.<aggregate>.<event>`.
    pub fn subject(&self) -> String {
        let (aggregate, name) = match self {
            Self::Product(ProductEvent::StockReserved { .. }) => ("product", "stock_reserved"),
            Self::Product(ProductEvent::StockReleased { .. }) => ("product", "stock_released"),
            Self::Order(OrderEvent::Placed { .. }) => ("order", "placed"),
            Self::Order(OrderEvent::StatusChanged { .. }) => ("order", "status_changed"),
            Self::Order(OrderEvent::Cancelled { .. }) => ("order", "cancelled"),
            Self::Order(OrderEvent::Deleted { .. }) => ("order", "deleted"),
            Self::Delivery(DeliveryEvent::Created { .. }) => ("delivery", "created"),
            Self::Delivery(DeliveryEvent::Cancelled { .. }) => ("delivery", "cancelled"),
            Self::Payment(PaymentEvent::Opened { .. }) => ("payment", "opened"),
            Self::Payment(PaymentEvent::Completed { .. }) => ("payment", "completed"),
            Self::Payment(PaymentEvent::Failed { .. }) => ("payment", "failed"),
            Self::Refund(RefundEvent::Requested { .. }) => ("refund", "requested"),
            Self::Refund(RefundEvent::Approved { .. }) => ("refund", "approved"),
            Self::Refund(RefundEvent::Rejected { .. }) => ("refund", "rejected"),
        };
        format!("ecommerce.{aggregate}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_subjects() {
        let e = DomainEvent::Order(OrderEvent::Cancelled { order_id: Uuid::nil() });
        assert_eq!(e.subject(), "ecommerce.order.cancelled");
        let e = DomainEvent::Product(ProductEvent::StockReleased { product_id: Uuid::nil(), quantity: 1, remaining: 3 });
        assert_eq!(e.subject(), "ecommerce.product.stock_released");
        let e = DomainEvent::Refund(RefundEvent::Approved { refund_id: Uuid::nil(), order_id: Uuid::nil() });
        assert_eq!(e.subject(), "ecommerce.refund.approved");
    }
    #[test]
    fn test_event_payload_is_tagged() {
        let e = DomainEvent::Order(OrderEvent::Deleted { order_id: Uuid::nil() });
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["type"], "deleted");
        assert_eq!(json["orderId"], Uuid::nil().to_string());
    }
}
