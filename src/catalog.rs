//! Minimal product catalog: create, fetch, and price/stock edits.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{NewProduct, Product};
use crate::store::Store;
use crate::{EcommerceError, Result};

#[derive(Clone, Debug, Default)]
pub struct ProductUpdate {
    pub price: Option<Decimal>,
    pub quantity: Option<u32>,
}

pub struct CatalogService {
    store: Arc<dyn Store>,
}

impl CatalogService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, input), fields(sku = %input.sku, name = %input.name))]
    pub async fn create_product(&self, input: NewProduct) -> Result<Product> {
        let product = Product::create(input)?;
        let mut uow = self.store.begin().await?;
        uow.insert_product(&product).await?;
        uow.commit().await?;
        info!(product_id = %product.id(), "product created");
        Ok(product)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<Product> {
        self.store.find_product(product_id).await?.ok_or(EcommerceError::ProductNotFound(product_id))
    }

    /// Catalog edits never reach placed orders; their prices were captured at placement.
    #[instrument(skip(self))]
    pub async fn update_product(&self, product_id: Uuid, update: ProductUpdate) -> Result<Product> {
        let mut uow = self.store.begin().await?;
        let mut product = uow.lock_product(product_id).await?.ok_or(EcommerceError::ProductNotFound(product_id))?;
        if let Some(price) = update.price {
            product.update_price(price)?;
        }
        if let Some(quantity) = update.quantity {
            product.set_quantity(quantity);
        }
        uow.update_product(&product).await?;
        uow.commit().await?;
        Ok(product)
    }
}
