//! Payment records.
//!
//! A checkout opens a pending [`Payment`] over some of a user's unpaid orders. When the
//! provider confirms the session, the payment completes and every covered order moves to
//! `paid` in the same unit of work, all-or-nothing.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderStatus, Payment, PaymentError};
use crate::domain::value_objects::OrderSlug;
use crate::orders::lifecycle;
use crate::publisher::EventPublisher;
use crate::store::{Store, UnitOfWork};
use crate::{EcommerceError, Result};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidOrder {
    pub order_id: Uuid,
    pub order_slug: OrderSlug,
    pub status: OrderStatus,
}

/// A payment with its payer's name and the current state of the orders it covers.
/// Orders removed since are left out of `orders` but still counted in `order_count`.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentView {
    #[serde(flatten)]
    pub payment: Payment,
    pub user_name: Option<String>,
    pub orders: Vec<PaidOrder>,
    pub order_count: usize,
}

pub struct PaymentService {
    store: Arc<dyn Store>,
    publisher: EventPublisher,
}

fn ensure_payable(order: &Order) -> Result<()> {
    match order.status() {
        OrderStatus::Pending | OrderStatus::Processing => Ok(()),
        status => Err(EcommerceError::InvalidStatus(format!(
            "Order {} is {status} and cannot be paid",
            order.order_slug()
        ))),
    }
}

async fn lock_payment(uow: &mut dyn UnitOfWork, session_id: &str) -> Result<Payment> {
    let session_id = session_id.trim();
    uow.lock_payment_by_session(session_id).await?.ok_or_else(|| EcommerceError::PaymentNotFound(session_id.to_string()))
}

impl PaymentService {
    pub fn new(store: Arc<dyn Store>, publisher: EventPublisher) -> Self {
        Self { store, publisher }
    }

    /// Opens a pending payment for the provider checkout `session_id`. Every order must
    /// belong to `user_id` and still be `pending` or `processing`.
    #[instrument(skip(self, order_ids), fields(orders = order_ids.len()))]
    pub async fn open_payment(&self, user_id: Uuid, mut order_ids: Vec<Uuid>, session_id: &str) -> Result<PaymentView> {
        order_ids.sort_unstable();
        order_ids.dedup();
        if order_ids.is_empty() {
            return Err(PaymentError::NoOrders.into());
        }
        self.store.find_user(user_id).await?.ok_or(EcommerceError::UserNotFound(user_id))?;

        let mut uow = self.store.begin().await?;
        let mut orders = Vec::with_capacity(order_ids.len());
        for order_id in order_ids {
            let order = uow
                .lock_order(order_id)
                .await?
                .filter(|o| o.user_id() == user_id)
                .ok_or(EcommerceError::OrderNotFound(order_id))?;
            ensure_payable(&order)?;
            orders.push(order);
        }
        let mut payment = Payment::open(user_id, session_id, &orders)?;
        uow.insert_payment(&payment).await?;
        uow.commit().await?;
        drop(uow);

        info!(payment_id = %payment.id(), amount = %payment.amount(), "payment opened");
        self.publisher.publish(payment.take_events()).await;
        self.present_one(payment).await
    }

    /// Provider confirmation: completes the payment and marks its orders `paid`.
    #[instrument(skip(self))]
    pub async fn confirm_payment(&self, session_id: &str) -> Result<PaymentView> {
        let mut uow = self.store.begin().await?;
        let mut payment = lock_payment(uow.as_mut(), session_id).await?;
        payment.complete()?;
        let mut events = payment.take_events();
        for &order_id in payment.order_ids() {
            let order = uow.lock_order(order_id).await?.ok_or(EcommerceError::OrderNotFound(order_id))?;
            ensure_payable(&order)?;
            events.extend(lifecycle::update_status(uow.as_mut(), order_id, OrderStatus::Paid).await?.events);
        }
        uow.update_payment(&payment).await?;
        uow.commit().await?;
        drop(uow);

        info!(payment_id = %payment.id(), orders = payment.order_ids().len(), "payment confirmed");
        self.publisher.publish(events).await;
        self.present_one(payment).await
    }

    /// Provider reported the session unpaid. Orders stay as they are.
    #[instrument(skip(self))]
    pub async fn fail_payment(&self, session_id: &str) -> Result<PaymentView> {
        let mut uow = self.store.begin().await?;
        let mut payment = lock_payment(uow.as_mut(), session_id).await?;
        payment.fail()?;
        uow.update_payment(&payment).await?;
        uow.commit().await?;
        drop(uow);

        info!(payment_id = %payment.id(), "payment failed");
        self.publisher.publish(payment.take_events()).await;
        self.present_one(payment).await
    }

    pub async fn list_payments(&self) -> Result<Vec<PaymentView>> {
        let payments = self.store.list_payments().await?;
        self.present(payments).await
    }

    async fn present(&self, payments: Vec<Payment>) -> Result<Vec<PaymentView>> {
        let mut user_ids: Vec<Uuid> = payments.iter().map(Payment::user_id).collect();
        user_ids.sort_unstable();
        user_ids.dedup();
        let mut order_ids: Vec<Uuid> = payments.iter().flat_map(|p| p.order_ids().iter().copied()).collect();
        order_ids.sort_unstable();
        order_ids.dedup();

        let users: HashMap<Uuid, String> =
            self.store.find_users(&user_ids).await?.into_iter().map(|u| (u.id, u.name)).collect();
        let orders: HashMap<Uuid, Order> =
            self.store.find_orders(&order_ids).await?.into_iter().map(|o| (o.id(), o)).collect();
        Ok(payments
            .into_iter()
            .map(|payment| {
                let covered = payment
                    .order_ids()
                    .iter()
                    .filter_map(|id| orders.get(id))
                    .map(|o| PaidOrder { order_id: o.id(), order_slug: o.order_slug().clone(), status: o.status() })
                    .collect();
                PaymentView {
                    user_name: users.get(&payment.user_id()).cloned(),
                    orders: covered,
                    order_count: payment.order_ids().len(),
                    payment,
                }
            })
            .collect())
    }

    async fn present_one(&self, payment: Payment) -> Result<PaymentView> {
        let session_id = payment.session_id().to_string();
        self.present(vec![payment]).await?.into_iter().next().ok_or(EcommerceError::PaymentNotFound(session_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::PaymentStatus;
    use crate::orders::NewLineItem;
    use crate::test_utils::Fixture;
    use rust_decimal::Decimal;

    async fn placed(fx: &Fixture, product_id: Uuid, user_id: Uuid) -> Uuid {
        let item = NewLineItem { product_id, quantity: 1, customization: None };
        fx.orders.create_order(user_id, vec![item]).await.unwrap().id
    }

    #[tokio::test]
    async fn test_confirm_completes_payment_and_pays_orders() {
        let fx = Fixture::new().await;
        let p = fx.product("Book", "12.00", 10).await;
        let first = placed(&fx, p.id(), fx.user.id).await;
        let second = placed(&fx, p.id(), fx.user.id).await;

        let opened = fx.payments.open_payment(fx.user.id, vec![first, second, first], "cs_live_1").await.unwrap();
        assert_eq!(opened.payment.payment_status(), PaymentStatus::Pending);
        assert_eq!(opened.payment.amount(), Decimal::new(2400, 2));
        assert_eq!(opened.order_count, 2);
        assert_eq!(opened.user_name.as_deref(), Some("Ada"));

        let confirmed = fx.payments.confirm_payment("cs_live_1").await.unwrap();
        assert_eq!(confirmed.payment.payment_status(), PaymentStatus::Completed);
        assert!(confirmed.orders.iter().all(|o| o.status == OrderStatus::Paid));
        assert_eq!(fx.orders.get_order(first).await.unwrap().status, OrderStatus::Paid);

        let err = fx.payments.confirm_payment("cs_live_1").await.unwrap_err();
        assert!(matches!(err, EcommerceError::InvalidStatus(_)));
        assert!(matches!(fx.payments.confirm_payment("cs_unknown").await, Err(EcommerceError::PaymentNotFound(_))));
    }

    #[tokio::test]
    async fn test_confirm_is_all_or_nothing() {
        let fx = Fixture::new().await;
        let p = fx.product("Vase", "14.00", 10).await;
        let first = placed(&fx, p.id(), fx.user.id).await;
        let second = placed(&fx, p.id(), fx.user.id).await;
        fx.payments.open_payment(fx.user.id, vec![first, second], "cs_live_2").await.unwrap();
        fx.orders.cancel_order(second, fx.user.id).await.unwrap();

        let err = fx.payments.confirm_payment("cs_live_2").await.unwrap_err();
        assert!(matches!(err, EcommerceError::InvalidStatus(_)));
        assert_eq!(fx.orders.get_order(first).await.unwrap().status, OrderStatus::Pending);
        let listed = fx.payments.list_payments().await.unwrap();
        assert_eq!(listed[0].payment.payment_status(), PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_open_checks_owner_status_and_session() {
        let fx = Fixture::new().await;
        let p = fx.product("Lamp", "30.00", 10).await;
        let mine = placed(&fx, p.id(), fx.user.id).await;
        let grace = fx.other_user("Grace").await;
        let theirs = placed(&fx, p.id(), grace.id).await;

        let err = fx.payments.open_payment(fx.user.id, vec![mine, theirs], "cs_a").await.unwrap_err();
        assert!(matches!(err, EcommerceError::OrderNotFound(id) if id == theirs));
        assert!(matches!(fx.payments.open_payment(fx.user.id, vec![], "cs_a").await, Err(EcommerceError::Validation(_))));
        assert!(matches!(fx.payments.open_payment(fx.user.id, vec![mine], " ").await, Err(EcommerceError::Validation(_))));

        fx.payments.open_payment(fx.user.id, vec![mine], "cs_a").await.unwrap();
        let err = fx.payments.open_payment(fx.user.id, vec![mine], "cs_a").await.unwrap_err();
        assert!(matches!(err, EcommerceError::Conflict(_)));

        fx.orders.update_order_status(mine, "shipped").await.unwrap();
        let err = fx.payments.open_payment(fx.user.id, vec![mine], "cs_b").await.unwrap_err();
        assert!(matches!(err, EcommerceError::InvalidStatus(_)));
        assert!(fx.payments.list_payments().await.unwrap().len() == 1);
    }

    #[tokio::test]
    async fn test_failed_payment_leaves_orders_and_lists_newest_first() {
        let fx = Fixture::new().await;
        let p = fx.product("Rug", "40.00", 10).await;
        let order = placed(&fx, p.id(), fx.user.id).await;
        fx.payments.open_payment(fx.user.id, vec![order], "cs_old").await.unwrap();
        let failed = fx.payments.fail_payment("cs_old").await.unwrap();
        assert_eq!(failed.payment.payment_status(), PaymentStatus::Failed);
        assert_eq!(fx.orders.get_order(order).await.unwrap().status, OrderStatus::Pending);
        assert!(matches!(fx.payments.confirm_payment("cs_old").await, Err(EcommerceError::InvalidStatus(_))));

        fx.payments.open_payment(fx.user.id, vec![order], "cs_new").await.unwrap();
        fx.orders.delete_order(order).await.unwrap();
        let listed = fx.payments.list_payments().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert!(listed[0].payment.created_at() >= listed[1].payment.created_at());
        assert!(listed.iter().all(|v| v.orders.is_empty() && v.order_count == 1));
    }
}
