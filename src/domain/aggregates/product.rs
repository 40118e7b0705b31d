//! Product Aggregate
//!
//! Stock is only changed through [`Product::reserve`], [`Product::release`] and the catalog
//! edit [`Product::set_quantity`]; each keeps `in_stock == (quantity > 0)`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::{Sku, Quantity};
use crate::domain::events::{DomainEvent, ProductEvent};

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    id: Uuid,
    sku: Sku,
    name: String,
    description: String,
    price: Decimal,
    category_id: Option<Uuid>,
    subcategory_id: Option<Uuid>,
    quantity: Quantity,
    in_stock: bool,
    is_customizable: bool,
    media: Media,
    sizes: Vec<String>,
    colors: Vec<ColorVariant>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<DomainEvent>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    #[serde(default)] pub images: Vec<String>,
    #[serde(default)] pub videos: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorImages { pub front: Option<String>, pub back: Option<String>, pub side: Option<String> }

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorVariant {
    pub name: String,
    pub hex: String,
    #[serde(default)] pub images: ColorImages,
}

/// Catalog input for a new product.
#[derive(Clone, Debug)]
pub struct NewProduct {
    pub sku: Sku,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub quantity: u32,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub is_customizable: bool,
    pub media: Media,
    pub sizes: Vec<String>,
    pub colors: Vec<ColorVariant>,
}

/// Persisted product state, as read back from storage.
#[derive(Clone, Debug)]
pub struct ProductRecord {
    pub id: Uuid,
    pub sku: Sku,
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    pub quantity: u32,
    pub is_customizable: bool,
    pub media: Media,
    pub sizes: Vec<String>,
    pub colors: Vec<ColorVariant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Display fields of a product embedded in order views.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary { pub id: Uuid, pub name: String, pub price: Decimal, pub images: Vec<String> }

/// Largest price the `products.price` column (NUMERIC(12,2)) can hold.
pub const MAX_PRICE: Decimal = Decimal::from_parts(3_567_587_327, 232, 0, false, 2);

/// Prices are whole cents between zero and [`MAX_PRICE`].
fn check_price(price: Decimal) -> Result<Decimal, ProductError> {
    if price.is_sign_negative() { return Err(ProductError::NegativePrice); }
    if price.normalize().scale() > 2 || price > MAX_PRICE { return Err(ProductError::PriceOutOfRange(price)); }
    Ok(price.round_dp(2))
}

impl Product {
    pub fn create(input: NewProduct) -> Result<Self, ProductError> {
        if input.name.trim().is_empty() { return Err(ProductError::MissingName); }
        let price = check_price(input.price)?;
        let now = Utc::now();
        let quantity = Quantity::new(input.quantity);
        Ok(Self {
            id: Uuid::now_v7(), sku: input.sku, name: input.name.trim().to_string(), description: input.description,
            price, category_id: input.category_id, subcategory_id: input.subcategory_id,
            quantity, in_stock: !quantity.is_zero(), is_customizable: input.is_customizable,
            media: input.media, sizes: input.sizes, colors: input.colors,
            created_at: now, updated_at: now, events: vec![],
        })
    }

    pub fn restore(record: ProductRecord) -> Self {
        let quantity = Quantity::new(record.quantity);
        Self {
            id: record.id, sku: record.sku, name: record.name, description: record.description,
            price: record.price, category_id: record.category_id, subcategory_id: record.subcategory_id,
            quantity, in_stock: !quantity.is_zero(), is_customizable: record.is_customizable,
            media: record.media, sizes: record.sizes, colors: record.colors,
            created_at: record.created_at, updated_at: record.updated_at, events: vec![],
        }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn sku(&self) -> &Sku { &self.sku }
    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.description }
    pub fn price(&self) -> Decimal { self.price }
    pub fn category_id(&self) -> Option<Uuid> { self.category_id }
    pub fn subcategory_id(&self) -> Option<Uuid> { self.subcategory_id }
    pub fn quantity(&self) -> u32 { self.quantity.value() }
    pub fn in_stock(&self) -> bool { self.in_stock }
    pub fn is_customizable(&self) -> bool { self.is_customizable }
    pub fn media(&self) -> &Media { &self.media }
    pub fn sizes(&self) -> &[String] { &self.sizes }
    pub fn colors(&self) -> &[ColorVariant] { &self.colors }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    pub fn summary(&self) -> ProductSummary {
        ProductSummary { id: self.id, name: self.name.clone(), price: self.price, images: self.media.images.clone() }
    }

    /// Main media images followed by every color variant's front/back/side image.
    pub fn gallery(&self) -> Vec<String> {
        let mut images = self.media.images.clone();
        for color in &self.colors {
            let ColorImages { front, back, side } = &color.images;
            images.extend([front, back, side].into_iter().flatten().cloned());
        }
        images
    }

    pub fn reserve(&mut self, qty: u32) -> Result<(), ProductError> {
        self.quantity = self.quantity.subtract(qty).ok_or(ProductError::InsufficientStock {
            product_id: self.id, requested: qty, available: self.quantity.value(),
        })?;
        self.sync_stock_flag();
        self.raise_event(DomainEvent::Product(ProductEvent::StockReserved {
            product_id: self.id, quantity: qty, remaining: self.quantity.value(),
        }));
        Ok(())
    }

    pub fn release(&mut self, qty: u32) {
        self.quantity = self.quantity.add(qty);
        self.sync_stock_flag();
        self.raise_event(DomainEvent::Product(ProductEvent::StockReleased {
            product_id: self.id, quantity: qty, remaining: self.quantity.value(),
        }));
    }

    /// Catalog stock edit.
    pub fn set_quantity(&mut self, qty: u32) {
        self.quantity = Quantity::new(qty);
        self.sync_stock_flag();
    }

    pub fn update_price(&mut self, new_price: Decimal) -> Result<(), ProductError> {
        self.price = check_price(new_price)?;
        self.touch();
        Ok(())
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
    fn sync_stock_flag(&mut self) { self.in_stock = !self.quantity.is_zero(); self.touch(); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProductError {
    MissingName,
    NegativePrice,
    PriceOutOfRange(Decimal),
    InsufficientStock { product_id: Uuid, requested: u32, available: u32 },
}
impl std::error::Error for ProductError {}
impl std::fmt::Display for ProductError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "Missing name"),
            Self::NegativePrice => write!(f, "Price cannot be negative"),
            Self::PriceOutOfRange(p) => write!(f, "Price {p} must have at most 2 decimals and not exceed {MAX_PRICE}"),
            Self::InsufficientStock { product_id, requested, available } => {
                write!(f, "Insufficient stock for product {product_id}: requested {requested}, available {available}")
            }
        }
    }
}
