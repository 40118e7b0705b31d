//! Order slug allocation.
//!
//! Numbers come from a store-held counter advanced inside the placing unit of work, so two
//! concurrent placements never share a number and a rolled-back placement never consumes
//! one on the in-memory backend. A counter that has never been started is seeded from the
//! highest number already used by a stored slug; when two units seed at once, the second
//! seed is ignored and both draw from the same counter.

use tracing::info;

use crate::domain::value_objects::OrderSlug;
use crate::store::UnitOfWork;
use crate::{EcommerceError, Result};

/// Returns the next order number; its slug is [`OrderSlug::from_number`].
pub async fn allocate(uow: &mut dyn UnitOfWork) -> Result<u64> {
    if let Some(number) = uow.next_order_number().await? {
        return Ok(number);
    }
    let highest = uow
        .order_slugs()
        .await?
        .iter()
        .filter_map(|slug| OrderSlug::parse_number(slug))
        .max()
        .unwrap_or(0);
    uow.seed_order_sequence(highest).await?;
    info!(seeded_from = highest, "order sequence started");
    uow.next_order_number()
        .await?
        .ok_or_else(|| EcommerceError::StorageError("order sequence missing after seeding".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{LineItem, Order};
    use crate::store::{MemoryStore, Store};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_first_order_is_one() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        assert_eq!(allocate(uow.as_mut()).await.unwrap(), 1);
        assert_eq!(allocate(uow.as_mut()).await.unwrap(), 2);
        assert_eq!(OrderSlug::from_number(2).as_str(), "ORD-002");
    }

    #[tokio::test]
    async fn test_seeds_from_highest_existing_slug() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let item = LineItem { product_id: Uuid::now_v7(), quantity: 1, price: Decimal::ONE, customization: None };
        for number in [4, 41, 9] {
            let order = Order::place(number, Uuid::now_v7(), vec![item.clone()]).unwrap();
            uow.insert_order(&order).await.unwrap();
        }
        assert_eq!(allocate(uow.as_mut()).await.unwrap(), 42);
        assert_eq!(allocate(uow.as_mut()).await.unwrap(), 43);
    }

    #[tokio::test]
    async fn test_existing_sequence_wins_over_seed() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        uow.seed_order_sequence(10).await.unwrap();
        uow.seed_order_sequence(3).await.unwrap();
        assert_eq!(allocate(uow.as_mut()).await.unwrap(), 11);
    }

    #[tokio::test]
    async fn test_rolled_back_unit_does_not_consume_a_number() {
        let store = MemoryStore::new();
        {
            let mut uow = store.begin().await.unwrap();
            assert_eq!(allocate(uow.as_mut()).await.unwrap(), 1);
        }
        let mut uow = store.begin().await.unwrap();
        assert_eq!(allocate(uow.as_mut()).await.unwrap(), 1);
    }
}
