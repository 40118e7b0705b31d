//! Order Aggregate
//!
//! `pending -> processing -> paid -> shipped -> delivered`, with `cancelled` reachable from
//! every state but `delivered`. A cancelled order may be moved back to an active state as an
//! administrative correction; the caller must re-reserve its stock (see [`StockEffect`]).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::value_objects::OrderSlug;
use crate::domain::events::{DomainEvent, OrderEvent};

#[derive(Clone, Debug)]
pub struct Order {
    id: Uuid,
    order_number: u64,
    order_slug: OrderSlug,
    user_id: Uuid,
    items: Vec<LineItem>,
    total_amount: Decimal,
    status: OrderStatus,
    delivery_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

/// One product + quantity + price captured when the order was placed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub product_id: Uuid,
    pub quantity: u32,
    pub price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customization: Option<Customization>,
}

impl LineItem {
    /// `None` when price times quantity does not fit a `Decimal`.
    pub fn subtotal(&self) -> Option<Decimal> { self.price.checked_mul(Decimal::from(self.quantity)) }
}

/// Largest total the `orders.total_amount` column (NUMERIC(14,2)) can hold.
pub const MAX_ORDER_TOTAL: Decimal = Decimal::from_parts(276_447_231, 23_283, 0, false, 2);

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customization {
    pub color: Option<String>,
    pub size: Option<String>,
    pub front_customization_preview: Option<String>,
    pub logo_image: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Processing, Paid, Shipped, Delivered, Cancelled }

/// Inventory side effect a status transition requires.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StockEffect {
    Unchanged,
    /// Entering `cancelled`: give every line item's quantity back.
    Release,
    /// Leaving `cancelled`: take every line item's quantity again.
    Reserve,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 6] = [
        Self::Pending, Self::Processing, Self::Paid, Self::Shipped, Self::Delivered, Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn plan_transition(self, next: OrderStatus) -> Result<StockEffect, OrderError> {
        match (self, next) {
            (Self::Delivered, _) | (Self::Cancelled, Self::Cancelled) => {
                Err(OrderError::InvalidTransition { from: self, to: next })
            }
            (Self::Cancelled, _) => Ok(StockEffect::Reserve),
            (_, Self::Cancelled) => Ok(StockEffect::Release),
            _ => Ok(StockEffect::Unchanged),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str() == s).ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

/// Persisted order state, as read back from storage.
#[derive(Clone, Debug)]
pub struct OrderRecord {
    pub id: Uuid,
    pub order_number: u64,
    pub order_slug: String,
    pub user_id: Uuid,
    pub items: Vec<LineItem>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub delivery_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Places a new `pending` order. The total is fixed here from the captured prices.
    pub fn place(order_number: u64, user_id: Uuid, items: Vec<LineItem>) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        if let Some(item) = items.iter().find(|i| i.quantity == 0) {
            return Err(OrderError::InvalidQuantity { product_id: item.product_id });
        }
        let now = Utc::now();
        let total_amount = items
            .iter()
            .try_fold(Decimal::ZERO, |sum, item| item.subtotal().and_then(|sub| sum.checked_add(sub)))
            .filter(|total| *total <= MAX_ORDER_TOTAL)
            .ok_or(OrderError::TotalOutOfRange)?;
        let mut order = Self {
            id: Uuid::now_v7(), order_number, order_slug: OrderSlug::from_number(order_number), user_id,
            items, total_amount, status: OrderStatus::Pending, delivery_id: None,
            created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: order.id, order_slug: order.order_slug.clone(), user_id, total_amount,
        }));
        Ok(order)
    }

    pub fn restore(record: OrderRecord) -> Self {
        Self {
            id: record.id, order_number: record.order_number, order_slug: OrderSlug::from_stored(record.order_slug),
            user_id: record.user_id, items: record.items, total_amount: record.total_amount, status: record.status,
            delivery_id: record.delivery_id, created_at: record.created_at, updated_at: record.updated_at, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_number(&self) -> u64 { self.order_number }
    pub fn order_slug(&self) -> &OrderSlug { &self.order_slug }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn items(&self) -> &[LineItem] { &self.items }
    pub fn total_amount(&self) -> Decimal { self.total_amount }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn delivery_id(&self) -> Option<Uuid> { self.delivery_id }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Applies a status change and reports the stock effect the caller must carry out
    /// in the same unit of work.
    pub fn transition_to(&mut self, next: OrderStatus) -> Result<StockEffect, OrderError> {
        let effect = self.status.plan_transition(next)?;
        let from = self.status;
        if from != next {
            self.status = next;
            self.touch();
            self.raise_event(DomainEvent::Order(OrderEvent::StatusChanged { order_id: self.id, from, to: next }));
            if next == OrderStatus::Cancelled {
                self.raise_event(DomainEvent::Order(OrderEvent::Cancelled { order_id: self.id }));
            }
        }
        Ok(effect)
    }

    pub fn cancel(&mut self) -> Result<StockEffect, OrderError> {
        match self.status {
            OrderStatus::Cancelled => Err(OrderError::AlreadyCancelled),
            OrderStatus::Delivered => Err(OrderError::CannotCancelDelivered),
            _ => self.transition_to(OrderStatus::Cancelled),
        }
    }

    pub fn attach_delivery(&mut self, delivery_id: Uuid) { self.delivery_id = Some(delivery_id); self.touch(); }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    NoItems,
    InvalidQuantity { product_id: Uuid },
    UnknownStatus(String),
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    AlreadyCancelled,
    CannotCancelDelivered,
    TotalOutOfRange,
}
impl std::error::Error for OrderError {}
impl fmt::Display for OrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoItems => write!(f, "Products must be a non-empty array"),
            Self::InvalidQuantity { product_id } => write!(f, "Quantity must be at least 1 for product {product_id}"),
            Self::UnknownStatus(s) => write!(f, "Invalid status value '{s}'"),
            Self::InvalidTransition { from, to } => write!(f, "Cannot move order from {from} to {to}"),
            Self::AlreadyCancelled => write!(f, "Order is already cancelled"),
            Self::CannotCancelDelivered => write!(f, "Delivered orders cannot be cancelled"),
            Self::TotalOutOfRange => write!(f, "Order total exceeds {MAX_ORDER_TOTAL}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: i64, quantity: u32) -> LineItem {
        LineItem { product_id: Uuid::now_v7(), quantity, price: Decimal::new(price, 0), customization: None }
    }

    #[test]
    fn test_order_total_is_sum_of_subtotals() {
        let order = Order::place(7, Uuid::now_v7(), vec![item(10, 2), item(15, 2)]).unwrap();
        assert_eq!(order.total_amount(), Decimal::new(50, 0));
        assert_eq!(order.order_slug().as_str(), "ORD-007");
        assert_eq!(order.status(), OrderStatus::Pending);
    }

    #[test]
    fn test_place_rejects_empty_and_zero_quantity() {
        assert_eq!(Order::place(1, Uuid::now_v7(), vec![]).unwrap_err(), OrderError::NoItems);
        let bad = item(10, 0);
        let pid = bad.product_id;
        assert_eq!(Order::place(1, Uuid::now_v7(), vec![bad]).unwrap_err(), OrderError::InvalidQuantity { product_id: pid });
    }

    #[test]
    fn test_oversized_total_is_an_error() {
        let huge = LineItem { product_id: Uuid::now_v7(), quantity: 2, price: Decimal::MAX, customization: None };
        assert_eq!(huge.subtotal(), None);
        assert_eq!(Order::place(1, Uuid::now_v7(), vec![huge]).unwrap_err(), OrderError::TotalOutOfRange);

        let big = LineItem { price: Decimal::new(9_999_999_999, 0), quantity: 101, ..item(0, 1) };
        assert_eq!(Order::place(1, Uuid::now_v7(), vec![big.clone()]).unwrap_err(), OrderError::TotalOutOfRange);
        let fits = LineItem { quantity: 99, ..big };
        assert!(Order::place(1, Uuid::now_v7(), vec![fits]).is_ok());
        assert_eq!(MAX_ORDER_TOTAL.to_string(), "999999999999.99");
    }

    #[test]
    fn test_order_workflow() {
        let mut order = Order::place(1, Uuid::now_v7(), vec![item(10, 2)]).unwrap();
        for next in [OrderStatus::Processing, OrderStatus::Paid, OrderStatus::Shipped, OrderStatus::Delivered] {
            assert_eq!(order.transition_to(next).unwrap(), StockEffect::Unchanged);
        }
        assert_eq!(order.status(), OrderStatus::Delivered);
        assert!(matches!(order.transition_to(OrderStatus::Shipped), Err(OrderError::InvalidTransition { .. })));
        assert_eq!(order.cancel().unwrap_err(), OrderError::CannotCancelDelivered);
    }

    #[test]
    fn test_stock_effects() {
        use OrderStatus::*;
        assert_eq!(Pending.plan_transition(Cancelled), Ok(StockEffect::Release));
        assert_eq!(Shipped.plan_transition(Cancelled), Ok(StockEffect::Release));
        assert_eq!(Cancelled.plan_transition(Processing), Ok(StockEffect::Reserve));
        assert_eq!(Paid.plan_transition(Pending), Ok(StockEffect::Unchanged));
        assert!(Cancelled.plan_transition(Cancelled).is_err());
        assert!(Delivered.plan_transition(Delivered).is_err());
    }

    #[test]
    fn test_cancel_twice() {
        let mut order = Order::place(1, Uuid::now_v7(), vec![item(10, 1)]).unwrap();
        order.take_events();
        assert_eq!(order.cancel().unwrap(), StockEffect::Release);
        assert_eq!(order.take_events().len(), 2);
        assert_eq!(order.cancel().unwrap_err(), OrderError::AlreadyCancelled);
        assert!(order.take_events().is_empty());
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("paid".parse::<OrderStatus>().unwrap(), OrderStatus::Paid);
        assert_eq!("refunded".parse::<OrderStatus>().unwrap_err(), OrderError::UnknownStatus("refunded".into()));
    }
}
