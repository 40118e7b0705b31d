//! Delivery Aggregate (zero or one per order)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::events::{DeliveryEvent, DomainEvent};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Delivery {
    id: Uuid,
    order_id: Uuid,
    #[serde(flatten)]
    address: DeliveryAddress,
    delivery_status: DeliveryStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryAddress {
    pub full_name: String,
    pub phone_number: String,
    pub house_no_street: String,
    pub colony_locality: String,
    pub region: String,
    pub city: String,
    pub area: String,
    pub address: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus { #[default] Pending, Processing, Shipped, Delivered, Cancelled }

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for DeliveryStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown delivery status '{other}'")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DeliveryRecord {
    pub id: Uuid,
    pub order_id: Uuid,
    pub address: DeliveryAddress,
    pub delivery_status: DeliveryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Delivery {
    pub fn create(order_id: Uuid, address: DeliveryAddress) -> Self {
        let now = Utc::now();
        let mut delivery = Self {
            id: Uuid::now_v7(), order_id, address, delivery_status: DeliveryStatus::Pending,
            created_at: now, updated_at: now, events: vec![],
        };
        delivery.raise_event(DomainEvent::Delivery(DeliveryEvent::Created { delivery_id: delivery.id, order_id }));
        delivery
    }

    pub fn restore(record: DeliveryRecord) -> Self {
        Self {
            id: record.id, order_id: record.order_id, address: record.address, delivery_status: record.delivery_status,
            created_at: record.created_at, updated_at: record.updated_at, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn order_id(&self) -> Uuid { self.order_id }
    pub fn address(&self) -> &DeliveryAddress { &self.address }
    pub fn delivery_status(&self) -> DeliveryStatus { self.delivery_status }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Mirrors an order cancellation. Returns false when already cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.delivery_status == DeliveryStatus::Cancelled { return false; }
        self.delivery_status = DeliveryStatus::Cancelled;
        self.updated_at = Utc::now();
        self.raise_event(DomainEvent::Delivery(DeliveryEvent::Cancelled { delivery_id: self.id, order_id: self.order_id }));
        true
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_cancel_is_idempotent() {
        let mut d = Delivery::create(Uuid::now_v7(), DeliveryAddress::default());
        d.take_events();
        assert!(d.cancel());
        assert_eq!(d.delivery_status(), DeliveryStatus::Cancelled);
        assert!(!d.cancel());
        assert_eq!(d.take_events().len(), 1);
    }
    #[test]
    fn test_serializes_flat_address() {
        let d = Delivery::create(Uuid::nil(), DeliveryAddress { city: "Lagos".into(), ..Default::default() });
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["city"], "Lagos");
        assert_eq!(json["deliveryStatus"], "pending");
    }
}
