//! Applies order status transitions inside a unit of work: the status change, its stock
//! effect and the delivery sync all land in the same commit.

use tracing::debug;
use uuid::Uuid;

use super::inventory;
use crate::domain::aggregates::{Order, OrderStatus, StockEffect};
use crate::domain::events::DomainEvent;
use crate::store::UnitOfWork;
use crate::{EcommerceError, Result};

/// An order after a persisted transition, with every event the transition raised.
#[derive(Debug)]
pub struct Transitioned {
    pub order: Order,
    pub events: Vec<DomainEvent>,
}

pub async fn update_status(uow: &mut dyn UnitOfWork, order_id: Uuid, next: OrderStatus) -> Result<Transitioned> {
    let mut order = uow.lock_order(order_id).await?.ok_or(EcommerceError::OrderNotFound(order_id))?;
    let effect = order.transition_to(next)?;
    apply(uow, order, effect).await
}

/// Cancels on behalf of `owner`. An order that belongs to someone else is reported as
/// not found.
pub async fn cancel(uow: &mut dyn UnitOfWork, order_id: Uuid, owner: Uuid) -> Result<Transitioned> {
    let mut order = uow
        .lock_order(order_id)
        .await?
        .filter(|o| o.user_id() == owner)
        .ok_or(EcommerceError::OrderNotFound(order_id))?;
    let effect = order.cancel()?;
    apply(uow, order, effect).await
}

async fn apply(uow: &mut dyn UnitOfWork, mut order: Order, effect: StockEffect) -> Result<Transitioned> {
    let mut events = order.take_events();
    let lines: Vec<(Uuid, u32)> = order.items().iter().map(|i| (i.product_id, i.quantity)).collect();
    match effect {
        StockEffect::Unchanged => {}
        StockEffect::Release => {
            events.extend(inventory::release_all(uow, &lines).await?);
            if let Some(mut delivery) = uow.lock_delivery_for_order(order.id()).await? {
                if delivery.cancel() {
                    uow.update_delivery(&delivery).await?;
                    events.extend(delivery.take_events());
                }
            }
        }
        StockEffect::Reserve => events.extend(inventory::reserve_all(uow, &lines).await?.events),
    }
    uow.update_order(&order).await?;
    debug!(order_id = %order.id(), status = %order.status(), ?effect, "order transition staged");
    Ok(Transitioned { order, events })
}
