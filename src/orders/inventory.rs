//! Inventory ledger.
//!
//! The only writer of product stock during the order lifecycle. Every function runs inside
//! the caller's unit of work; a failure part-way leaves earlier reservations in that unit,
//! and the caller drops the unit to roll them all back.

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, warn};
use uuid::Uuid;

use crate::domain::aggregates::Product;
use crate::domain::events::DomainEvent;
use crate::store::UnitOfWork;
use crate::{EcommerceError, Result};

/// Products touched by a batch reservation, after the reservation.
#[derive(Debug, Default)]
pub struct Reservation {
    pub products: HashMap<Uuid, Product>,
    pub events: Vec<DomainEvent>,
}

pub async fn reserve(uow: &mut dyn UnitOfWork, product_id: Uuid, quantity: u32) -> Result<Product> {
    let mut product = uow.lock_product(product_id).await?.ok_or(EcommerceError::ProductNotFound(product_id))?;
    product.reserve(quantity)?;
    uow.update_product(&product).await?;
    debug!(%product_id, quantity, remaining = product.quantity(), "stock reserved");
    Ok(product)
}

/// Returns `None` when the product has since been removed from the catalog.
pub async fn release(uow: &mut dyn UnitOfWork, product_id: Uuid, quantity: u32) -> Result<Option<Product>> {
    let Some(mut product) = uow.lock_product(product_id).await? else {
        warn!(%product_id, quantity, "cannot release stock for a product that no longer exists");
        return Ok(None);
    };
    product.release(quantity);
    uow.update_product(&product).await?;
    debug!(%product_id, quantity, remaining = product.quantity(), "stock released");
    Ok(Some(product))
}

/// Sums quantities per product. Iterates in ascending id order, which is also the
/// lock order, so two units never wait on each other's products.
fn demand(lines: &[(Uuid, u32)]) -> BTreeMap<Uuid, u32> {
    let mut totals = BTreeMap::new();
    for &(product_id, quantity) in lines {
        let total: &mut u32 = totals.entry(product_id).or_default();
        *total = total.saturating_add(quantity);
    }
    totals
}

pub async fn reserve_all(uow: &mut dyn UnitOfWork, lines: &[(Uuid, u32)]) -> Result<Reservation> {
    let mut reservation = Reservation::default();
    for (product_id, quantity) in demand(lines) {
        let mut product = reserve(uow, product_id, quantity).await?;
        reservation.events.extend(product.take_events());
        reservation.products.insert(product_id, product);
    }
    Ok(reservation)
}

pub async fn release_all(uow: &mut dyn UnitOfWork, lines: &[(Uuid, u32)]) -> Result<Vec<DomainEvent>> {
    let mut events = Vec::new();
    for (product_id, quantity) in demand(lines) {
        if let Some(mut product) = release(uow, product_id, quantity).await? {
            events.extend(product.take_events());
        }
    }
    Ok(events)
}
