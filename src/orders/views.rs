//! Read models returned by the order workflow.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Customization, Delivery, Order, OrderStatus, Product, ProductSummary};
use crate::domain::value_objects::OrderSlug;
use crate::store::UserSummary;

/// An order with its line items' product display fields.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderWithProductSummary {
    pub id: Uuid,
    pub order_slug: OrderSlug,
    pub user_id: Uuid,
    /// `None` when the account no longer resolves.
    pub user: Option<UserSummary>,
    pub products: Vec<LineItemView>,
    pub total_amount: Decimal,
    pub status: OrderStatus,
    pub delivery_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItemView {
    pub product_id: Uuid,
    /// `None` when the product was removed from the catalog after the order was placed.
    pub product: Option<ProductSummary>,
    pub quantity: u32,
    /// Unit price captured at placement.
    pub price: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customization: Option<Customization>,
}

impl OrderWithProductSummary {
    pub fn assemble(order: &Order, user: Option<UserSummary>, products: &HashMap<Uuid, ProductSummary>) -> Self {
        let items = order
            .items()
            .iter()
            .map(|item| LineItemView {
                product_id: item.product_id,
                product: products.get(&item.product_id).cloned(),
                quantity: item.quantity,
                price: item.price,
                customization: item.customization.clone(),
            })
            .collect();
        Self {
            id: order.id(),
            order_slug: order.order_slug().clone(),
            user_id: order.user_id(),
            user,
            products: items,
            total_amount: order.total_amount(),
            status: order.status(),
            delivery_id: order.delivery_id(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
        }
    }
}

/// One row of a user's order history.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub order_no: OrderSlug,
    /// Display string, e.g. `"50 (2 Products)"`.
    pub total: String,
    pub status: OrderStatus,
    pub date: DateTime<Utc>,
    pub order_id: Uuid,
}

impl From<&Order> for OrderSummary {
    fn from(order: &Order) -> Self {
        Self {
            order_no: order.order_slug().clone(),
            total: format!("{} ({} Products)", order.total_amount().normalize(), order.items().len()),
            status: order.status(),
            date: order.created_at(),
            order_id: order.id(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedProduct {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub images: Vec<String>,
    pub total_quantity_sold: u64,
}

impl RankedProduct {
    pub fn new(product: &Product, total_quantity_sold: u64) -> Self {
        Self {
            id: product.id(),
            name: product.name().to_string(),
            price: product.price(),
            images: product.gallery(),
            total_quantity_sold,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub total_pages: u64,
}

impl Pagination {
    pub fn new(total: u64, page: u32, limit: u32) -> Self {
        let total_pages = if limit == 0 { 0 } else { total.div_ceil(u64::from(limit)) };
        Self { total, page, limit, total_pages }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderListing {
    pub orders: Vec<OrderWithProductSummary>,
    pub pagination: Pagination,
}

/// A delivery with the status and amount of the order it ships.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryWithOrder {
    #[serde(flatten)]
    pub delivery: Delivery,
    pub order_slug: OrderSlug,
    pub order_status: OrderStatus,
    pub order_amount: Decimal,
}
