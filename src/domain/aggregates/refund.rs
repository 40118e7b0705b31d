//! Refund Aggregate
//!
//! A customer's request to refund an order, decided once by an administrator.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::Order;
use crate::domain::events::{DomainEvent, RefundEvent};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    id: Uuid,
    order_id: Uuid,
    total: Decimal,
    reason: String,
    status: RefundStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RefundStatus { #[default] Pending, Approved, Rejected }

impl RefundStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RefundStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for RefundStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown refund status '{other}'")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RefundRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub total: Decimal,
    pub reason: String,
    pub status: RefundStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Refund {
    /// The refunded total is the order's total at request time.
    pub fn request(order: &Order, reason: &str) -> Result<Self, RefundError> {
        let reason = reason.trim();
        if reason.is_empty() { return Err(RefundError::MissingReason); }
        let now = Utc::now();
        let mut refund = Self {
            id: Uuid::now_v7(), order_id: order.id(), total: order.total_amount(), reason: reason.to_string(),
            status: RefundStatus::Pending, created_at: now, updated_at: now, events: vec![],
        };
        refund.raise_event(DomainEvent::Refund(RefundEvent::Requested {
            refund_id: refund.id, order_id: refund.order_id, total: refund.total,
        }));
        Ok(refund)
    }

    pub fn restore(record: RefundRecord) -> Self {
        Self {
            id: record.id, order_id: record.order_id, total: record.total, reason: record.reason,
            status: record.status, created_at: record.created_at, updated_at: record.updated_at, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_id(&self) -> Uuid { self.order_id }
    pub fn total(&self) -> Decimal { self.total }
    pub fn reason(&self) -> &str { &self.reason }
    pub fn status(&self) -> RefundStatus { self.status }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn approve(&mut self) -> Result<(), RefundError> {
        self.decide(RefundStatus::Approved)?;
        self.raise_event(DomainEvent::Refund(RefundEvent::Approved { refund_id: self.id, order_id: self.order_id }));
        Ok(())
    }

    /// A non-blank `reason` replaces the customer's reason.
    pub fn reject(&mut self, reason: Option<&str>) -> Result<(), RefundError> {
        self.decide(RefundStatus::Rejected)?;
        if let Some(reason) = reason.map(str::trim).filter(|r| !r.is_empty()) {
            self.reason = reason.to_string();
        }
        self.raise_event(DomainEvent::Refund(RefundEvent::Rejected { refund_id: self.id, order_id: self.order_id }));
        Ok(())
    }

    fn decide(&mut self, outcome: RefundStatus) -> Result<(), RefundError> {
        if self.status != RefundStatus::Pending {
            return Err(RefundError::AlreadyDecided(self.status));
        }
        self.status = outcome;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundError {
    MissingReason,
    AlreadyDecided(RefundStatus),
}
impl std::error::Error for RefundError {}
impl fmt::Display for RefundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingReason => write!(f, "Reason is required"),
            Self::AlreadyDecided(status) => write!(f, "Refund request is already {status}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::LineItem;

    fn order() -> Order {
        let item = LineItem { product_id: Uuid::now_v7(), quantity: 3, price: Decimal::new(1500, 2), customization: None };
        Order::place(1, Uuid::now_v7(), vec![item]).unwrap()
    }

    #[test]
    fn test_request_takes_order_total() {
        let order = order();
        let refund = Refund::request(&order, "  arrived broken ").unwrap();
        assert_eq!(refund.total(), Decimal::new(4500, 2));
        assert_eq!(refund.reason(), "arrived broken");
        assert_eq!(refund.status(), RefundStatus::Pending);
        assert_eq!(Refund::request(&order, " ").unwrap_err(), RefundError::MissingReason);
    }

    #[test]
    fn test_decided_once() {
        let mut refund = Refund::request(&order(), "wrong size").unwrap();
        refund.reject(Some("worn")).unwrap();
        assert_eq!(refund.status(), RefundStatus::Rejected);
        assert_eq!(refund.reason(), "worn");
        assert_eq!(refund.approve().unwrap_err(), RefundError::AlreadyDecided(RefundStatus::Rejected));

        let mut refund = Refund::request(&order(), "wrong size").unwrap();
        refund.take_events();
        refund.approve().unwrap();
        refund.reject(None).unwrap_err();
        assert_eq!(refund.reason(), "wrong size");
        assert_eq!(refund.take_events().len(), 1);
    }
}
