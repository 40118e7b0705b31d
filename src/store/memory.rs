//! In-memory store for tests and local runs.
//!
//! A unit of work owns the store-wide lock for its whole lifetime and mutates a staged copy
//! of the tables, which replaces the live tables on commit. Units are therefore fully
//! serialized and an uncommitted unit leaves no trace.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use super::{OrderPage, OrderQuery, ProductSales, Store, UnitOfWork, UserSummary};
use crate::domain::aggregates::{Delivery, Order, OrderStatus, Payment, Product, Refund};
use crate::{EcommerceError, Result};

#[derive(Clone, Default)]
struct Tables {
    users: HashMap<Uuid, UserSummary>,
    products: HashMap<Uuid, Product>,
    orders: HashMap<Uuid, Order>,
    deliveries: HashMap<Uuid, Delivery>,
    payments: HashMap<Uuid, Payment>,
    refunds: HashMap<Uuid, Refund>,
    order_sequence: Option<u64>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Registers an account; accounts are owned by the account service.
    pub async fn add_user(&self, user: UserSummary) {
        self.tables.lock().await.users.insert(user.id, user);
    }
}

fn newest_first(orders: &mut [Order]) {
    orders.sort_by(|a, b| {
        b.created_at().cmp(&a.created_at()).then_with(|| b.order_number().cmp(&a.order_number()))
    });
}

fn matches_product_name(tables: &Tables, order: &Order, needle: &str) -> bool {
    order.items().iter().any(|item| {
        tables.products.get(&item.product_id).is_some_and(|p| p.name().to_lowercase().contains(needle))
    })
}

/// Aggregates carry pending events; stored copies must not.
fn stored<T: Clone>(value: &T, clear: impl FnOnce(&mut T)) -> T {
    let mut copy = value.clone();
    clear(&mut copy);
    copy
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(MemoryUnit { guard, staged }))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserSummary>> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>> {
        let tables = self.tables.lock().await;
        Ok(ids.iter().filter_map(|id| tables.users.get(id).cloned()).collect())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.tables.lock().await.products.get(&id).cloned())
    }

    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let tables = self.tables.lock().await;
        Ok(ids.iter().filter_map(|id| tables.products.get(id).cloned()).collect())
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.tables.lock().await.orders.get(&id).cloned())
    }

    async fn find_orders(&self, ids: &[Uuid]) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;
        Ok(ids.iter().filter_map(|id| tables.orders.get(id).cloned()).collect())
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<OrderPage> {
        let tables = self.tables.lock().await;
        let needle = query.product_name.as_deref().map(str::to_lowercase);
        let mut matching: Vec<Order> = tables
            .orders
            .values()
            .filter(|o| query.status.map_or(true, |s| o.status() == s))
            .filter(|o| query.user_id.map_or(true, |u| o.user_id() == u))
            .filter(|o| needle.as_deref().map_or(true, |n| matches_product_name(&tables, o, n)))
            .cloned()
            .collect();
        newest_first(&mut matching);
        let total = matching.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let orders = matching.into_iter().skip(offset).take(query.limit as usize).collect();
        Ok(OrderPage { orders, total })
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        let tables = self.tables.lock().await;
        let mut orders: Vec<Order> = tables.orders.values().filter(|o| o.user_id() == user_id).cloned().collect();
        newest_first(&mut orders);
        Ok(orders)
    }

    async fn product_sales(&self) -> Result<Vec<ProductSales>> {
        let tables = self.tables.lock().await;
        let mut totals: HashMap<Uuid, u64> = HashMap::new();
        for order in tables.orders.values().filter(|o| o.status() != OrderStatus::Cancelled) {
            for item in order.items() {
                *totals.entry(item.product_id).or_default() += u64::from(item.quantity);
            }
        }
        Ok(totals.into_iter().map(|(product_id, quantity)| ProductSales { product_id, quantity }).collect())
    }

    async fn find_delivery_by_order(&self, order_id: Uuid) -> Result<Option<Delivery>> {
        let tables = self.tables.lock().await;
        Ok(tables.deliveries.values().find(|d| d.order_id() == order_id).cloned())
    }

    async fn list_payments(&self) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self.tables.lock().await.payments.values().cloned().collect();
        payments.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id().cmp(&a.id())));
        Ok(payments)
    }

    async fn list_refunds(&self) -> Result<Vec<Refund>> {
        let mut refunds: Vec<Refund> = self.tables.lock().await.refunds.values().cloned().collect();
        refunds.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id().cmp(&a.id())));
        Ok(refunds)
    }
}

struct MemoryUnit {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl UnitOfWork for MemoryUnit {
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>> {
        Ok(self.staged.products.get(&id).cloned())
    }

    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        let duplicate = self.staged.products.values().any(|p| {
            p.id() == product.id() || p.sku() == product.sku() || p.name() == product.name()
        });
        if duplicate {
            return Err(EcommerceError::Conflict(format!("product {} or its SKU/name already exists", product.id())));
        }
        self.staged.products.insert(product.id(), stored(product, |p| { p.take_events(); }));
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<()> {
        let slot = self.staged.products.get_mut(&product.id()).ok_or(EcommerceError::ProductNotFound(product.id()))?;
        *slot = stored(product, |p| { p.take_events(); });
        Ok(())
    }

    async fn next_order_number(&mut self) -> Result<Option<u64>> {
        Ok(self.staged.order_sequence.as_mut().map(|n| { *n += 1; *n }))
    }

    async fn seed_order_sequence(&mut self, issued: u64) -> Result<()> {
        self.staged.order_sequence.get_or_insert(issued);
        Ok(())
    }

    async fn order_slugs(&mut self) -> Result<Vec<String>> {
        Ok(self.staged.orders.values().map(|o| o.order_slug().as_str().to_string()).collect())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        if self.staged.orders.values().any(|o| o.order_slug() == order.order_slug()) {
            return Err(EcommerceError::Conflict(format!("order slug {} already exists", order.order_slug())));
        }
        self.staged.orders.insert(order.id(), stored(order, |o| { o.take_events(); }));
        Ok(())
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        Ok(self.staged.orders.get(&id).cloned())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let slot = self.staged.orders.get_mut(&order.id()).ok_or(EcommerceError::OrderNotFound(order.id()))?;
        *slot = stored(order, |o| { o.take_events(); });
        Ok(())
    }

    async fn delete_order(&mut self, id: Uuid) -> Result<bool> {
        let removed = self.staged.orders.remove(&id).is_some();
        if removed {
            self.staged.deliveries.retain(|_, d| d.order_id() != id);
        }
        Ok(removed)
    }

    async fn lock_delivery_for_order(&mut self, order_id: Uuid) -> Result<Option<Delivery>> {
        Ok(self.staged.deliveries.values().find(|d| d.order_id() == order_id).cloned())
    }

    async fn insert_delivery(&mut self, delivery: &Delivery) -> Result<()> {
        if self.staged.deliveries.values().any(|d| d.order_id() == delivery.order_id()) {
            return Err(EcommerceError::Conflict(format!("order {} already has a delivery", delivery.order_id())));
        }
        self.staged.deliveries.insert(delivery.id(), stored(delivery, |d| { d.take_events(); }));
        Ok(())
    }

    async fn update_delivery(&mut self, delivery: &Delivery) -> Result<()> {
        let slot = self.staged.deliveries.get_mut(&delivery.id()).ok_or(EcommerceError::DeliveryNotFound(delivery.id()))?;
        *slot = stored(delivery, |d| { d.take_events(); });
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        if self.staged.payments.values().any(|p| p.session_id() == payment.session_id()) {
            return Err(EcommerceError::Conflict(format!("session {} already has a payment", payment.session_id())));
        }
        self.staged.payments.insert(payment.id(), stored(payment, |p| { p.take_events(); }));
        Ok(())
    }

    async fn lock_payment_by_session(&mut self, session_id: &str) -> Result<Option<Payment>> {
        Ok(self.staged.payments.values().find(|p| p.session_id() == session_id).cloned())
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        let slot = self
            .staged
            .payments
            .get_mut(&payment.id())
            .ok_or_else(|| EcommerceError::PaymentNotFound(payment.session_id().to_string()))?;
        *slot = stored(payment, |p| { p.take_events(); });
        Ok(())
    }

    async fn insert_refund(&mut self, refund: &Refund) -> Result<()> {
        self.staged.refunds.insert(refund.id(), stored(refund, |r| { r.take_events(); }));
        Ok(())
    }

    async fn lock_refund(&mut self, id: Uuid) -> Result<Option<Refund>> {
        Ok(self.staged.refunds.get(&id).cloned())
    }

    async fn update_refund(&mut self, refund: &Refund) -> Result<()> {
        let slot = self.staged.refunds.get_mut(&refund.id()).ok_or(EcommerceError::RefundNotFound(refund.id()))?;
        *slot = stored(refund, |r| { r.take_events(); });
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        *self.guard = std::mem::take(&mut self.staged);
        debug!("memory unit committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{new_product, test_user};

    #[tokio::test]
    async fn test_uncommitted_unit_leaves_no_trace() {
        let store = MemoryStore::new();
        let product = Product::create(new_product("Mug", "12.50", 4)).unwrap();
        {
            let mut unit = store.begin().await.unwrap();
            unit.insert_product(&product).await.unwrap();
        }
        assert!(store.find_product(product.id()).await.unwrap().is_none());

        let mut unit = store.begin().await.unwrap();
        unit.insert_product(&product).await.unwrap();
        unit.commit().await.unwrap();
        drop(unit);
        assert!(store.find_product(product.id()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_duplicate_sku_conflicts() {
        let store = MemoryStore::new();
        let a = Product::create(new_product("Mug", "12.50", 4)).unwrap();
        let mut b_input = new_product("Other Mug", "9.00", 1);
        b_input.sku = a.sku().clone();
        let b = Product::create(b_input).unwrap();
        let mut unit = store.begin().await.unwrap();
        unit.insert_product(&a).await.unwrap();
        assert!(matches!(unit.insert_product(&b).await, Err(EcommerceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_sequence_seeds_once() {
        let store = MemoryStore::new();
        let mut unit = store.begin().await.unwrap();
        assert_eq!(unit.next_order_number().await.unwrap(), None);
        unit.seed_order_sequence(5).await.unwrap();
        assert_eq!(unit.next_order_number().await.unwrap(), Some(6));
        unit.seed_order_sequence(1).await.unwrap();
        assert_eq!(unit.next_order_number().await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_update_missing_delivery() {
        let store = MemoryStore::new();
        let delivery = Delivery::create(Uuid::now_v7(), crate::domain::aggregates::DeliveryAddress::default());
        let mut unit = store.begin().await.unwrap();
        let err = unit.update_delivery(&delivery).await.unwrap_err();
        assert!(matches!(err, EcommerceError::DeliveryNotFound(id) if id == delivery.id()));
    }

    #[tokio::test]
    async fn test_payment_session_is_unique() {
        let store = MemoryStore::new();
        let item = crate::domain::aggregates::LineItem {
            product_id: Uuid::now_v7(), quantity: 1, price: rust_decimal::Decimal::ONE, customization: None,
        };
        let order = Order::place(1, Uuid::now_v7(), vec![item]).unwrap();
        let first = Payment::open(order.user_id(), "cs_1", std::slice::from_ref(&order)).unwrap();
        let again = Payment::open(order.user_id(), "cs_1", std::slice::from_ref(&order)).unwrap();
        let mut unit = store.begin().await.unwrap();
        unit.insert_payment(&first).await.unwrap();
        assert!(matches!(unit.insert_payment(&again).await, Err(EcommerceError::Conflict(_))));
        assert_eq!(unit.lock_payment_by_session("cs_1").await.unwrap().map(|p| p.id()), Some(first.id()));
        assert!(matches!(unit.update_payment(&again).await, Err(EcommerceError::PaymentNotFound(_))));
    }

    #[tokio::test]
    async fn test_users() {
        let store = MemoryStore::new();
        let user = test_user("Ada");
        store.add_user(user.clone()).await;
        assert_eq!(store.find_user(user.id).await.unwrap(), Some(user));
    }
}
