//! Refund requests against orders, approved or rejected once by an administrator.
//! Deciding a refund records the outcome only; order status and stock are untouched.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus, Refund};
use crate::domain::value_objects::OrderSlug;
use crate::publisher::EventPublisher;
use crate::store::Store;
use crate::{EcommerceError, Result};

/// A refund with the current slug and status of its order, when the order still exists.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundWithOrder {
    #[serde(flatten)]
    pub refund: Refund,
    pub order_slug: Option<OrderSlug>,
    pub order_status: Option<OrderStatus>,
}

impl RefundWithOrder {
    fn new(refund: Refund, order: Option<&Order>) -> Self {
        Self {
            refund,
            order_slug: order.map(|o| o.order_slug().clone()),
            order_status: order.map(Order::status),
        }
    }
}

pub struct RefundService {
    store: Arc<dyn Store>,
    publisher: EventPublisher,
}

impl RefundService {
    pub fn new(store: Arc<dyn Store>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    #[instrument(skip(self, reason))]
    pub async fn request_refund(&self, order_id: Uuid, reason: &str) -> Result<RefundWithOrder> {
        let mut uow = self.store.begin().await?;
        let order = uow.lock_order(order_id).await?.ok_or(EcommerceError::OrderNotFound(order_id))?;
        let mut refund = Refund::request(&order, reason)?;
        uow.insert_refund(&refund).await?;
        uow.commit().await?;
        drop(uow);

        info!(refund_id = %refund.id(), %order_id, total = %refund.total(), "refund requested");
        self.publisher.publish(refund.take_events()).await;
        Ok(RefundWithOrder::new(refund, Some(&order)))
    }

    pub async fn list_refunds(&self) -> Result<Vec<RefundWithOrder>> {
        let refunds = self.store.list_refunds().await?;
        let mut order_ids: Vec<Uuid> = refunds.iter().map(Refund::order_id).collect();
        order_ids.sort_unstable();
        order_ids.dedup();
        let orders: HashMap<Uuid, Order> =
            self.store.find_orders(&order_ids).await?.into_iter().map(|o| (o.id(), o)).collect();
        Ok(refunds
            .into_iter()
            .map(|r| {
                let order = orders.get(&r.order_id());
                RefundWithOrder::new(r, order)
            })
            .collect())
    }

    #[instrument(skip(self))]
    pub async fn approve_refund(&self, refund_id: Uuid) -> Result<RefundWithOrder> {
        self.decide(refund_id, |refund| refund.approve().map_err(Into::into)).await
    }

    #[instrument(skip(self, reason))]
    pub async fn reject_refund(&self, refund_id: Uuid, reason: Option<&str>) -> Result<RefundWithOrder> {
        self.decide(refund_id, |refund| refund.reject(reason).map_err(Into::into)).await
    }

    async fn decide(&self, refund_id: Uuid, outcome: impl FnOnce(&mut Refund) -> Result<()>) -> Result<RefundWithOrder> {
        let mut uow = self.store.begin().await?;
        let mut refund = uow.lock_refund(refund_id).await?.ok_or(EcommerceError::RefundNotFound(refund_id))?;
        outcome(&mut refund)?;
        uow.update_refund(&refund).await?;
        let order = uow.lock_order(refund.order_id()).await?;
        uow.commit().await?;
        drop(uow);

        info!(%refund_id, status = %refund.status(), "refund decided");
        self.publisher.publish(refund.take_events()).await;
        Ok(RefundWithOrder::new(refund, order.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::RefundStatus;
    use crate::orders::NewLineItem;
    use crate::test_utils::Fixture;
    use rust_decimal::Decimal;

    async fn placed(fx: &Fixture) -> Uuid {
        let p = fx.product("Kite", "17.50", 5).await;
        let item = NewLineItem { product_id: p.id(), quantity: 2, customization: None };
        fx.orders.create_order(fx.user.id, vec![item]).await.unwrap().id
    }

    #[tokio::test]
    async fn test_request_and_approve() {
        let fx = Fixture::new().await;
        let order_id = placed(&fx).await;
        let requested = fx.refunds.request_refund(order_id, "torn sail").await.unwrap();
        assert_eq!(requested.refund.total(), Decimal::new(3500, 2));
        assert_eq!(requested.refund.status(), RefundStatus::Pending);
        assert_eq!(requested.order_slug.as_ref().map(OrderSlug::as_str), Some("ORD-001"));

        let approved = fx.refunds.approve_refund(requested.refund.id()).await.unwrap();
        assert_eq!(approved.refund.status(), RefundStatus::Approved);
        assert_eq!(approved.order_status, Some(OrderStatus::Pending));
        let err = fx.refunds.reject_refund(requested.refund.id(), None).await.unwrap_err();
        assert!(matches!(err, EcommerceError::InvalidStatus(_)));
    }

    #[tokio::test]
    async fn test_reject_replaces_reason() {
        let fx = Fixture::new().await;
        let order_id = placed(&fx).await;
        let requested = fx.refunds.request_refund(order_id, "changed my mind").await.unwrap();
        let rejected = fx.refunds.reject_refund(requested.refund.id(), Some("outside return window")).await.unwrap();
        assert_eq!(rejected.refund.status(), RefundStatus::Rejected);
        assert_eq!(rejected.refund.reason(), "outside return window");

        let listed = fx.refunds.list_refunds().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].refund.reason(), "outside return window");
    }

    #[tokio::test]
    async fn test_missing_order_refund_or_reason() {
        let fx = Fixture::new().await;
        let order_id = placed(&fx).await;
        let err = fx.refunds.request_refund(Uuid::now_v7(), "lost").await.unwrap_err();
        assert!(matches!(err, EcommerceError::OrderNotFound(_)));
        assert!(matches!(fx.refunds.request_refund(order_id, "  ").await, Err(EcommerceError::Validation(_))));
        assert!(matches!(fx.refunds.approve_refund(Uuid::now_v7()).await, Err(EcommerceError::RefundNotFound(_))));

        fx.refunds.request_refund(order_id, "late").await.unwrap();
        fx.orders.delete_order(order_id).await.unwrap();
        let listed = fx.refunds.list_refunds().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].order_slug, None);
    }
}
