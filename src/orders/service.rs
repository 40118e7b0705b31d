//! Order Service
//!
//! Every mutating operation runs in exactly one unit of work and publishes the events it
//! raised only after that unit commits.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use super::views::{OrderListing, OrderSummary, OrderWithProductSummary, Pagination, RankedProduct};
use super::{inventory, lifecycle, slug};
use crate::domain::aggregates::{Customization, LineItem, Order, OrderError, OrderStatus, ProductSummary};
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::publisher::EventPublisher;
use crate::store::{OrderQuery, Store, UserSummary};
use crate::{EcommerceError, Result};

/// Page size policy for order listings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Paging {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for Paging {
    fn default() -> Self {
        Self { default_limit: 10, max_limit: 100 }
    }
}

impl Paging {
    /// Returns `(page, limit)` with page at least 1 and limit within `1..=max_limit`.
    pub fn resolve(&self, page: Option<u32>, limit: Option<u32>) -> (u32, u32) {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(self.default_limit).clamp(1, self.max_limit.max(1));
        (page, limit)
    }
}

/// Requested line item. Quantity is signed so that zero and negative requests reach
/// validation instead of failing deserialization.
#[derive(Clone, Debug)]
pub struct NewLineItem {
    pub product_id: Uuid,
    pub quantity: i64,
    pub customization: Option<Customization>,
}

#[derive(Clone, Debug, Default)]
pub struct ListOrders {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
    /// Case-insensitive product name substring.
    pub search: Option<String>,
}

pub struct OrderService {
    store: Arc<dyn Store>,
    publisher: EventPublisher,
    paging: Paging,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, publisher: EventPublisher, paging: Paging) -> Self {
        Self { store, publisher, paging }
    }

    #[instrument(skip(self, items), fields(items = items.len()))]
    pub async fn create_order(&self, user_id: Uuid, items: Vec<NewLineItem>) -> Result<OrderWithProductSummary> {
        if items.is_empty() {
            return Err(OrderError::NoItems.into());
        }
        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            let quantity = u32::try_from(item.quantity)
                .ok()
                .filter(|q| *q >= 1)
                .ok_or(OrderError::InvalidQuantity { product_id: item.product_id })?;
            lines.push((item.product_id, quantity));
        }
        self.store.find_user(user_id).await?.ok_or(EcommerceError::UserNotFound(user_id))?;

        let mut uow = self.store.begin().await?;
        let reservation = inventory::reserve_all(uow.as_mut(), &lines).await?;
        let mut order_items = Vec::with_capacity(items.len());
        for (item, (product_id, quantity)) in items.into_iter().zip(lines) {
            let product = reservation.products.get(&product_id).ok_or(EcommerceError::ProductNotFound(product_id))?;
            if item.customization.is_some() && !product.is_customizable() {
                return Err(EcommerceError::Validation(format!("Product {} is not customizable", product.name())));
            }
            order_items.push(LineItem { product_id, quantity, price: product.price(), customization: item.customization });
        }
        let number = slug::allocate(uow.as_mut()).await?;
        let mut order = Order::place(number, user_id, order_items)?;
        uow.insert_order(&order).await?;
        uow.commit().await?;
        drop(uow);

        info!(order_id = %order.id(), slug = %order.order_slug(), total = %order.total_amount(), "order placed");
        let mut events = reservation.events;
        events.extend(order.take_events());
        self.publisher.publish(events).await;
        self.present_one(order).await
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self, params: ListOrders) -> Result<OrderListing> {
        let (page, limit) = self.paging.resolve(params.page, params.limit);
        let status = match params.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => Some(raw.parse::<OrderStatus>()?),
            None => None,
        };
        let product_name = params.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let query = OrderQuery { status, user_id: params.user_id, product_name, page, limit };
        let result = self.store.list_orders(&query).await?;
        Ok(OrderListing { orders: self.present(&result.orders).await?, pagination: Pagination::new(result.total, page, limit) })
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<OrderWithProductSummary> {
        let order = self.store.find_order(order_id).await?.ok_or(EcommerceError::OrderNotFound(order_id))?;
        self.present_one(order).await
    }

    #[instrument(skip(self))]
    pub async fn update_order_status(&self, order_id: Uuid, status: &str) -> Result<OrderWithProductSummary> {
        let next: OrderStatus = status.trim().parse()?;
        let mut uow = self.store.begin().await?;
        let done = lifecycle::update_status(uow.as_mut(), order_id, next).await?;
        uow.commit().await?;
        drop(uow);

        info!(%order_id, status = %next, "order status updated");
        self.publisher.publish(done.events).await;
        self.present_one(done.order).await
    }

    #[instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: Uuid, user_id: Uuid) -> Result<OrderWithProductSummary> {
        let mut uow = self.store.begin().await?;
        let done = lifecycle::cancel(uow.as_mut(), order_id, user_id).await?;
        uow.commit().await?;
        drop(uow);

        info!(%order_id, "order cancelled");
        self.publisher.publish(done.events).await;
        self.present_one(done.order).await
    }

    /// Administrative removal. Bypasses the lifecycle and leaves stock untouched.
    #[instrument(skip(self))]
    pub async fn delete_order(&self, order_id: Uuid) -> Result<()> {
        let mut uow = self.store.begin().await?;
        if !uow.delete_order(order_id).await? {
            return Err(EcommerceError::OrderNotFound(order_id));
        }
        uow.commit().await?;
        drop(uow);

        info!(%order_id, "order deleted");
        self.publisher.publish(vec![DomainEvent::Order(OrderEvent::Deleted { order_id })]).await;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn order_history(&self, user_id: Uuid) -> Result<Vec<OrderSummary>> {
        let orders = self.store.orders_for_user(user_id).await?;
        Ok(orders.iter().map(OrderSummary::from).collect())
    }

    #[instrument(skip(self))]
    pub async fn best_selling_products(&self) -> Result<Vec<RankedProduct>> {
        let mut sales = self.store.product_sales().await?;
        sales.sort_by(|a, b| b.quantity.cmp(&a.quantity).then_with(|| a.product_id.cmp(&b.product_id)));
        let ids: Vec<Uuid> = sales.iter().map(|s| s.product_id).collect();
        let products: HashMap<Uuid, _> = self.store.find_products(&ids).await?.into_iter().map(|p| (p.id(), p)).collect();
        Ok(sales
            .iter()
            .filter_map(|s| products.get(&s.product_id).map(|p| RankedProduct::new(p, s.quantity)))
            .collect())
    }

    async fn present(&self, orders: &[Order]) -> Result<Vec<OrderWithProductSummary>> {
        let mut product_ids: Vec<Uuid> = orders.iter().flat_map(|o| o.items().iter().map(|i| i.product_id)).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        let mut user_ids: Vec<Uuid> = orders.iter().map(Order::user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let products: HashMap<Uuid, ProductSummary> =
            self.store.find_products(&product_ids).await?.iter().map(|p| (p.id(), p.summary())).collect();
        let users: HashMap<Uuid, UserSummary> =
            self.store.find_users(&user_ids).await?.into_iter().map(|u| (u.id, u)).collect();
        Ok(orders
            .iter()
            .map(|o| OrderWithProductSummary::assemble(o, users.get(&o.user_id()).cloned(), &products))
            .collect())
    }

    async fn present_one(&self, order: Order) -> Result<OrderWithProductSummary> {
        let order_id = order.id();
        self.present(std::slice::from_ref(&order)).await?.into_iter().next().ok_or(EcommerceError::OrderNotFound(order_id))
    }
}
