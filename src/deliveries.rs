//! Delivery records: at most one per order, created by the order's owner.

use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Delivery, DeliveryAddress, OrderStatus};
use crate::orders::DeliveryWithOrder;
use crate::publisher::EventPublisher;
use crate::store::Store;
use crate::{EcommerceError, Result};

pub struct DeliveryService {
    store: Arc<dyn Store>,
    publisher: EventPublisher,
}

impl DeliveryService {
    pub fn new(store: Arc<dyn Store>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    #[instrument(skip(self, address))]
    pub async fn create_delivery(&self, user_id: Uuid, order_id: Uuid, address: DeliveryAddress) -> Result<Delivery> {
        self.store.find_user(user_id).await?.ok_or(EcommerceError::UserNotFound(user_id))?;

        let mut uow = self.store.begin().await?;
        let mut order = uow
            .lock_order(order_id)
            .await?
            .filter(|o| o.user_id() == user_id)
            .ok_or(EcommerceError::OrderNotFound(order_id))?;
        if order.status() == OrderStatus::Cancelled {
            return Err(EcommerceError::InvalidStatus(format!("Order {} is cancelled", order.order_slug())));
        }
        if uow.lock_delivery_for_order(order_id).await?.is_some() {
            return Err(EcommerceError::Conflict(format!("Order {} already has a delivery", order.order_slug())));
        }
        let mut delivery = Delivery::create(order_id, address);
        uow.insert_delivery(&delivery).await?;
        order.attach_delivery(delivery.id());
        uow.update_order(&order).await?;
        uow.commit().await?;
        drop(uow);

        info!(delivery_id = %delivery.id(), %order_id, "delivery created");
        self.publisher.publish(delivery.take_events()).await;
        Ok(delivery)
    }

    pub async fn get_by_order(&self, order_id: Uuid) -> Result<DeliveryWithOrder> {
        let delivery = self.store.find_delivery_by_order(order_id).await?.ok_or(EcommerceError::DeliveryNotFound(order_id))?;
        let order = self.store.find_order(order_id).await?.ok_or(EcommerceError::OrderNotFound(order_id))?;
        Ok(DeliveryWithOrder {
            delivery,
            order_slug: order.order_slug().clone(),
            order_status: order.status(),
            order_amount: order.total_amount(),
        })
    }
}
