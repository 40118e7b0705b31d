//! Persistence seam.
//!
//! [`Store`] serves reads and opens [`UnitOfWork`]s. A unit is one atomic, isolated
//! session: rows read through its `lock_*` methods stay locked until the unit ends,
//! writes become visible only on [`UnitOfWork::commit`], and dropping an uncommitted unit
//! discards everything it did.
//!
//! Do not call [`Store`] methods while holding an open unit in the same task; the
//! in-memory backend serializes units behind a single lock.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Delivery, Order, OrderStatus, Payment, Product, Refund};
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Account collaborator view of a user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
}

/// Filters and pagination for order listings. `page` is 1-based.
#[derive(Clone, Debug)]
pub struct OrderQuery {
    pub status: Option<OrderStatus>,
    pub user_id: Option<Uuid>,
    /// Case-insensitive substring matched against line item product names.
    pub product_name: Option<String>,
    pub page: u32,
    pub limit: u32,
}

impl OrderQuery {
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self { status: None, user_id: None, product_name: None, page: 1, limit: 10 }
    }
}

/// One page of orders plus the number of orders matching the filters.
#[derive(Clone, Debug)]
pub struct OrderPage {
    pub orders: Vec<Order>,
    pub total: u64,
}

/// Units sold per product across non-cancelled orders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProductSales {
    pub product_id: Uuid,
    pub quantity: u64,
}

#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    async fn find_user(&self, id: Uuid) -> Result<Option<UserSummary>>;
    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>>;

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;
    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>>;

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>>;
    async fn find_orders(&self, ids: &[Uuid]) -> Result<Vec<Order>>;
    /// Newest first.
    async fn list_orders(&self, query: &OrderQuery) -> Result<OrderPage>;
    /// Newest first.
    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>>;
    async fn product_sales(&self) -> Result<Vec<ProductSales>>;

    async fn find_delivery_by_order(&self, order_id: Uuid) -> Result<Option<Delivery>>;

    /// Newest first.
    async fn list_payments(&self) -> Result<Vec<Payment>>;
    /// Newest first.
    async fn list_refunds(&self) -> Result<Vec<Refund>>;
}

#[async_trait]
pub trait UnitOfWork: Send {
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>>;
    async fn insert_product(&mut self, product: &Product) -> Result<()>;
    async fn update_product(&mut self, product: &Product) -> Result<()>;

    /// Atomically advances the order sequence and returns the new value, or `None` when
    /// the sequence has never been started.
    async fn next_order_number(&mut self) -> Result<Option<u64>>;
    /// Starts the order sequence with `issued` as its most recently issued value. A no-op
    /// when the sequence already exists, including one started by a concurrent unit.
    async fn seed_order_sequence(&mut self, issued: u64) -> Result<()>;
    async fn order_slugs(&mut self) -> Result<Vec<String>>;

    async fn insert_order(&mut self, order: &Order) -> Result<()>;
    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>>;
    /// Persists status, delivery link and `updated_at`. Line items and totals are immutable.
    async fn update_order(&mut self, order: &Order) -> Result<()>;
    /// Removes the order with its line items and delivery. Returns false when absent.
    async fn delete_order(&mut self, id: Uuid) -> Result<bool>;

    async fn lock_delivery_for_order(&mut self, order_id: Uuid) -> Result<Option<Delivery>>;
    async fn insert_delivery(&mut self, delivery: &Delivery) -> Result<()>;
    async fn update_delivery(&mut self, delivery: &Delivery) -> Result<()>;

    /// Conflicts when the provider session already has a payment.
    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;
    async fn lock_payment_by_session(&mut self, session_id: &str) -> Result<Option<Payment>>;
    /// Persists status and `updated_at`.
    async fn update_payment(&mut self, payment: &Payment) -> Result<()>;

    async fn insert_refund(&mut self, refund: &Refund) -> Result<()>;
    async fn lock_refund(&mut self, id: Uuid) -> Result<Option<Refund>>;
    /// Persists status, reason and `updated_at`.
    async fn update_refund(&mut self, refund: &Refund) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;
}
