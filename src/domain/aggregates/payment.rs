//! Payment Aggregate
//!
//! One checkout session at the payment provider covering one or more orders of a single
//! user. `pending -> completed` when the provider confirms, `pending -> failed` otherwise.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::Order;
use crate::domain::events::{DomainEvent, PaymentEvent};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    id: Uuid,
    user_id: Uuid,
    order_ids: Vec<Uuid>,
    amount: Decimal,
    session_id: String,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus { #[default] Pending, Completed, Failed }

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for PaymentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown payment status '{other}'")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub order_ids: Vec<Uuid>,
    pub amount: Decimal,
    pub session_id: String,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Opens a pending payment for `orders`; the amount is the sum of their totals.
    pub fn open(user_id: Uuid, session_id: &str, orders: &[Order]) -> Result<Self, PaymentError> {
        let session_id = session_id.trim();
        if session_id.is_empty() { return Err(PaymentError::MissingSession); }
        if orders.is_empty() { return Err(PaymentError::NoOrders); }
        let amount = orders
            .iter()
            .try_fold(Decimal::ZERO, |sum, order| sum.checked_add(order.total_amount()))
            .ok_or(PaymentError::AmountOutOfRange)?;
        let now = Utc::now();
        let mut payment = Self {
            id: Uuid::now_v7(), user_id, order_ids: orders.iter().map(Order::id).collect(), amount,
            session_id: session_id.to_string(), payment_status: PaymentStatus::Pending,
            created_at: now, updated_at: now, events: vec![],
        };
        payment.raise_event(DomainEvent::Payment(PaymentEvent::Opened {
            payment_id: payment.id, session_id: payment.session_id.clone(), user_id, amount,
        }));
        Ok(payment)
    }

    pub fn restore(record: PaymentRecord) -> Self {
        Self {
            id: record.id, user_id: record.user_id, order_ids: record.order_ids, amount: record.amount,
            session_id: record.session_id, payment_status: record.payment_status,
            created_at: record.created_at, updated_at: record.updated_at, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn user_id(&self) -> Uuid { self.user_id }
    pub fn order_ids(&self) -> &[Uuid] { &self.order_ids }
    pub fn amount(&self) -> Decimal { self.amount }
    pub fn session_id(&self) -> &str { &self.session_id }
    pub fn payment_status(&self) -> PaymentStatus { self.payment_status }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn complete(&mut self) -> Result<(), PaymentError> {
        self.settle(PaymentStatus::Completed)?;
        self.raise_event(DomainEvent::Payment(PaymentEvent::Completed {
            payment_id: self.id, order_ids: self.order_ids.clone(), amount: self.amount,
        }));
        Ok(())
    }

    pub fn fail(&mut self) -> Result<(), PaymentError> {
        self.settle(PaymentStatus::Failed)?;
        self.raise_event(DomainEvent::Payment(PaymentEvent::Failed { payment_id: self.id }));
        Ok(())
    }

    fn settle(&mut self, outcome: PaymentStatus) -> Result<(), PaymentError> {
        if self.payment_status != PaymentStatus::Pending {
            return Err(PaymentError::AlreadySettled { session_id: self.session_id.clone(), status: self.payment_status });
        }
        self.payment_status = outcome;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentError {
    MissingSession,
    NoOrders,
    AmountOutOfRange,
    AlreadySettled { session_id: String, status: PaymentStatus },
}
impl std::error::Error for PaymentError {}
impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSession => write!(f, "sessionId is required"),
            Self::NoOrders => write!(f, "orderIds must be a non-empty array"),
            Self::AmountOutOfRange => write!(f, "Payment amount is too large"),
            Self::AlreadySettled { session_id, status } => write!(f, "Payment {session_id} is already {status}"),
        }
    }
}
