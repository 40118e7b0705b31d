//! PostgreSQL store.
//!
//! Units of work are database transactions. Rows read through `lock_*` use
//! `SELECT ... FOR UPDATE`, so concurrent reservations against the same product and
//! concurrent transitions of the same order are serialized by the database.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::{PgConnection, PgExecutor, Postgres, QueryBuilder, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{OrderPage, OrderQuery, ProductSales, Store, UnitOfWork, UserSummary};
use crate::domain::aggregates::{
    ColorVariant, Customization, Delivery, DeliveryAddress, DeliveryRecord, LineItem, Media, Order, OrderRecord,
    Payment, PaymentRecord, Product, ProductRecord, Refund, RefundRecord,
};
use crate::domain::value_objects::Sku;
use crate::{EcommerceError, Result};

const ORDER_SEQUENCE: &str = "orders";

const PRODUCT_COLUMNS: &str = "id, sku, name, description, price, category_id, subcategory_id, quantity, \
     is_customizable, media, sizes, colors, created_at, updated_at";

const ORDER_COLUMNS: &str = "o.id, o.order_number, o.order_slug, o.user_id, o.total_amount, o.status, \
     o.delivery_id, o.created_at, o.updated_at";

const DELIVERY_COLUMNS: &str = "id, order_id, full_name, phone_number, house_no_street, colony_locality, \
     region, city, area, address, delivery_status, created_at, updated_at";

const PAYMENT_COLUMNS: &str = "id, user_id, order_ids, amount, session_id, payment_status, created_at, updated_at";

const REFUND_COLUMNS: &str = "id, order_id, total, reason, status, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    sku: String,
    name: String,
    description: String,
    price: Decimal,
    category_id: Option<Uuid>,
    subcategory_id: Option<Uuid>,
    quantity: i32,
    is_customizable: bool,
    media: Json<Media>,
    sizes: Vec<String>,
    colors: Json<Vec<ColorVariant>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = EcommerceError;
    fn try_from(row: ProductRow) -> Result<Self> {
        let sku = Sku::new(row.sku).map_err(|e| corrupt("products.sku", e))?;
        Ok(Product::restore(ProductRecord {
            id: row.id, sku, name: row.name, description: row.description, price: row.price,
            category_id: row.category_id, subcategory_id: row.subcategory_id, quantity: to_u32(row.quantity)?,
            is_customizable: row.is_customizable, media: row.media.0, sizes: row.sizes, colors: row.colors.0,
            created_at: row.created_at, updated_at: row.updated_at,
        }))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: i64,
    order_slug: String,
    user_id: Uuid,
    total_amount: Decimal,
    status: String,
    delivery_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    order_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    unit_price: Decimal,
    customization: Option<Json<Customization>>,
}

#[derive(Debug, sqlx::FromRow)]
struct DeliveryRow {
    id: Uuid,
    order_id: Uuid,
    full_name: String,
    phone_number: String,
    house_no_street: String,
    colony_locality: String,
    region: String,
    city: String,
    area: String,
    address: String,
    delivery_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DeliveryRow> for Delivery {
    type Error = EcommerceError;
    fn try_from(row: DeliveryRow) -> Result<Self> {
        let delivery_status = row.delivery_status.parse().map_err(|e| corrupt("deliveries.delivery_status", e))?;
        Ok(Delivery::restore(DeliveryRecord {
            id: row.id,
            order_id: row.order_id,
            address: DeliveryAddress {
                full_name: row.full_name, phone_number: row.phone_number, house_no_street: row.house_no_street,
                colony_locality: row.colony_locality, region: row.region, city: row.city, area: row.area,
                address: row.address,
            },
            delivery_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    order_ids: Vec<Uuid>,
    amount: Decimal,
    session_id: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = EcommerceError;
    fn try_from(row: PaymentRow) -> Result<Self> {
        let payment_status = row.payment_status.parse().map_err(|e| corrupt("payments.payment_status", e))?;
        Ok(Payment::restore(PaymentRecord {
            id: row.id, user_id: row.user_id, order_ids: row.order_ids, amount: row.amount, session_id: row.session_id,
            payment_status, created_at: row.created_at, updated_at: row.updated_at,
        }))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RefundRow {
    id: Uuid,
    order_id: Uuid,
    total: Decimal,
    reason: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RefundRow> for Refund {
    type Error = EcommerceError;
    fn try_from(row: RefundRow) -> Result<Self> {
        let status = row.status.parse().map_err(|e| corrupt("refunds.status", e))?;
        Ok(Refund::restore(RefundRecord {
            id: row.id, order_id: row.order_id, total: row.total, reason: row.reason, status,
            created_at: row.created_at, updated_at: row.updated_at,
        }))
    }
}

fn corrupt(column: &str, err: impl std::fmt::Display) -> EcommerceError {
    EcommerceError::StorageError(format!("unreadable {column}: {err}"))
}

fn to_u32(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| EcommerceError::StorageError(format!("negative quantity {value}")))
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| EcommerceError::Validation(format!("quantity {value} is too large")))
}

fn to_i64(value: u64) -> Result<i64> {
    i64::try_from(value).map_err(|_| EcommerceError::StorageError(format!("value {value} out of range")))
}

/// Joins order rows with their line items, keeping row order.
fn assemble(rows: Vec<OrderRow>, items: Vec<ItemRow>) -> Result<Vec<Order>> {
    let mut by_order: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
    for item in items {
        by_order.entry(item.order_id).or_default().push(LineItem {
            product_id: item.product_id,
            quantity: to_u32(item.quantity)?,
            price: item.unit_price,
            customization: item.customization.map(|c| c.0),
        });
    }
    rows.into_iter()
        .map(|row| {
            let status = row.status.parse().map_err(|e| corrupt("orders.status", e))?;
            let order_number = u64::try_from(row.order_number).map_err(|e| corrupt("orders.order_number", e))?;
            Ok(Order::restore(OrderRecord {
                id: row.id,
                order_number,
                order_slug: row.order_slug,
                user_id: row.user_id,
                items: by_order.remove(&row.id).unwrap_or_default(),
                total_amount: row.total_amount,
                status,
                delivery_id: row.delivery_id,
                created_at: row.created_at,
                updated_at: row.updated_at,
            }))
        })
        .collect()
}

async fn load_items<'e>(executor: impl PgExecutor<'e>, order_ids: &[Uuid]) -> Result<Vec<ItemRow>> {
    let items = sqlx::query_as::<_, ItemRow>(
        "SELECT order_id, product_id, quantity, unit_price, customization FROM order_items \
         WHERE order_id = ANY($1) ORDER BY order_id, position",
    )
    .bind(order_ids.to_vec())
    .fetch_all(executor)
    .await?;
    Ok(items)
}

fn push_order_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &OrderQuery) {
    qb.push(" WHERE TRUE");
    if let Some(status) = query.status {
        qb.push(" AND o.status = ").push_bind(status.as_str());
    }
    if let Some(user_id) = query.user_id {
        qb.push(" AND o.user_id = ").push_bind(user_id);
    }
    if let Some(name) = &query.product_name {
        qb.push(
            " AND EXISTS (SELECT 1 FROM order_items oi JOIN products p ON p.id = oi.product_id \
             WHERE oi.order_id = o.id AND strpos(lower(p.name), lower(",
        )
        .push_bind(name.clone())
        .push(")) > 0)");
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
    pub fn pool(&self) -> &PgPool { &self.pool }

    async fn orders_where(&self, sql: String, bind: Uuid) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&sql).bind(bind).fetch_all(&self.pool).await?;
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = load_items(&self.pool, &ids).await?;
        assemble(rows, items)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnit { tx: Some(tx) }))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<UserSummary>> {
        let row: Option<(Uuid, String, String)> = sqlx::query_as("SELECT id, name, email FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|(id, name, email)| UserSummary { id, name, email }))
    }

    async fn find_users(&self, ids: &[Uuid]) -> Result<Vec<UserSummary>> {
        let rows: Vec<(Uuid, String, String)> = sqlx::query_as("SELECT id, name, email FROM users WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.into_iter().map(|(id, name, email)| UserSummary { id, name, email }).collect())
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
        let row = sqlx::query_as::<_, ProductRow>(&sql).bind(id).fetch_optional(&self.pool).await?;
        row.map(Product::try_from).transpose()
    }

    async fn find_products(&self, ids: &[Uuid]) -> Result<Vec<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)");
        let rows = sqlx::query_as::<_, ProductRow>(&sql).bind(ids.to_vec()).fetch_all(&self.pool).await?;
        rows.into_iter().map(Product::try_from).collect()
    }

    async fn find_order(&self, id: Uuid) -> Result<Option<Order>> {
        let orders = self.orders_where(format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1"), id).await?;
        Ok(orders.into_iter().next())
    }

    async fn find_orders(&self, ids: &[Uuid]) -> Result<Vec<Order>> {
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = ANY($1)");
        let rows = sqlx::query_as::<_, OrderRow>(&sql).bind(ids.to_vec()).fetch_all(&self.pool).await?;
        let found: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = load_items(&self.pool, &found).await?;
        assemble(rows, items)
    }

    async fn list_orders(&self, query: &OrderQuery) -> Result<OrderPage> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders o");
        push_order_filters(&mut count, query);
        let (total,) = count.build_query_as::<(i64,)>().fetch_one(&self.pool).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders o"));
        push_order_filters(&mut select, query);
        select
            .push(" ORDER BY o.created_at DESC, o.order_number DESC LIMIT ")
            .push_bind(i64::from(query.limit))
            .push(" OFFSET ")
            .push_bind(to_i64(query.offset())?);
        let rows = select.build_query_as::<OrderRow>().fetch_all(&self.pool).await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let items = load_items(&self.pool, &ids).await?;
        Ok(OrderPage { orders: assemble(rows, items)?, total: u64::try_from(total).unwrap_or_default() })
    }

    async fn orders_for_user(&self, user_id: Uuid) -> Result<Vec<Order>> {
        self.orders_where(
            format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.user_id = $1 ORDER BY o.created_at DESC, o.order_number DESC"),
            user_id,
        )
        .await
    }

    async fn product_sales(&self) -> Result<Vec<ProductSales>> {
        let rows: Vec<(Uuid, i64)> = sqlx::query_as(
            "SELECT oi.product_id, SUM(oi.quantity)::BIGINT FROM order_items oi \
             JOIN orders o ON o.id = oi.order_id WHERE o.status <> 'cancelled' GROUP BY oi.product_id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(product_id, quantity)| ProductSales { product_id, quantity: u64::try_from(quantity).unwrap_or_default() })
            .collect())
    }

    async fn find_delivery_by_order(&self, order_id: Uuid) -> Result<Option<Delivery>> {
        let sql = format!("SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE order_id = $1");
        let row = sqlx::query_as::<_, DeliveryRow>(&sql).bind(order_id).fetch_optional(&self.pool).await?;
        row.map(Delivery::try_from).transpose()
    }

    async fn list_payments(&self) -> Result<Vec<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, PaymentRow>(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn list_refunds(&self) -> Result<Vec<Refund>> {
        let sql = format!("SELECT {REFUND_COLUMNS} FROM refunds ORDER BY created_at DESC, id DESC");
        let rows = sqlx::query_as::<_, RefundRow>(&sql).fetch_all(&self.pool).await?;
        rows.into_iter().map(Refund::try_from).collect()
    }
}

pub struct PgUnit {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnit {
    fn conn(&mut self) -> Result<&mut PgConnection> {
        self.tx.as_deref_mut().ok_or_else(|| EcommerceError::StorageError("unit of work already committed".into()))
    }
}

#[async_trait]
impl UnitOfWork for PgUnit {
    async fn lock_product(&mut self, id: Uuid) -> Result<Option<Product>> {
        let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, ProductRow>(&sql).bind(id).fetch_optional(self.conn()?).await?;
        row.map(Product::try_from).transpose()
    }

    async fn insert_product(&mut self, product: &Product) -> Result<()> {
        let quantity = to_i32(product.quantity())?;
        sqlx::query(
            "INSERT INTO products (id, sku, name, description, price, category_id, subcategory_id, quantity, \
             in_stock, is_customizable, media, sizes, colors, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)",
        )
        .bind(product.id())
        .bind(product.sku().as_str().to_string())
        .bind(product.name().to_string())
        .bind(product.description().to_string())
        .bind(product.price())
        .bind(product.category_id())
        .bind(product.subcategory_id())
        .bind(quantity)
        .bind(product.in_stock())
        .bind(product.is_customizable())
        .bind(Json(product.media().clone()))
        .bind(product.sizes().to_vec())
        .bind(Json(product.colors().to_vec()))
        .bind(product.created_at())
        .bind(product.updated_at())
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn update_product(&mut self, product: &Product) -> Result<()> {
        let quantity = to_i32(product.quantity())?;
        let result = sqlx::query(
            "UPDATE products SET price = $2, quantity = $3, in_stock = $4, updated_at = $5 WHERE id = $1",
        )
        .bind(product.id())
        .bind(product.price())
        .bind(quantity)
        .bind(product.in_stock())
        .bind(product.updated_at())
        .execute(self.conn()?)
        .await?;
        if result.rows_affected() == 0 {
            return Err(EcommerceError::ProductNotFound(product.id()));
        }
        Ok(())
    }

    async fn next_order_number(&mut self) -> Result<Option<u64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("UPDATE order_sequences SET value = value + 1 WHERE name = $1 RETURNING value")
                .bind(ORDER_SEQUENCE)
                .fetch_optional(self.conn()?)
                .await?;
        row.map(|(value,)| u64::try_from(value).map_err(|e| corrupt("order_sequences.value", e))).transpose()
    }

    async fn seed_order_sequence(&mut self, issued: u64) -> Result<()> {
        sqlx::query("INSERT INTO order_sequences (name, value) VALUES ($1, $2) ON CONFLICT (name) DO NOTHING")
            .bind(ORDER_SEQUENCE)
            .bind(to_i64(issued)?)
            .execute(self.conn()?)
            .await?;
        Ok(())
    }

    async fn order_slugs(&mut self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT order_slug FROM orders").fetch_all(self.conn()?).await?;
        Ok(rows.into_iter().map(|(slug,)| slug).collect())
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        let conn = self.conn()?;
        sqlx::query(
            "INSERT INTO orders (id, order_number, order_slug, user_id, total_amount, status, delivery_id, \
             created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(order.id())
        .bind(to_i64(order.order_number())?)
        .bind(order.order_slug().as_str().to_string())
        .bind(order.user_id())
        .bind(order.total_amount())
        .bind(order.status().as_str())
        .bind(order.delivery_id())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *conn)
        .await?;

        for (position, item) in order.items().iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (order_id, position, product_id, quantity, unit_price, customization) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(order.id())
            .bind(i32::try_from(position).map_err(|_| EcommerceError::Validation("too many line items".into()))?)
            .bind(item.product_id)
            .bind(to_i32(item.quantity)?)
            .bind(item.price)
            .bind(item.customization.clone().map(Json))
            .execute(&mut *conn)
            .await?;
        }
        debug!(order_id = %order.id(), slug = %order.order_slug(), "order rows inserted");
        Ok(())
    }

    async fn lock_order(&mut self, id: Uuid) -> Result<Option<Order>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {ORDER_COLUMNS} FROM orders o WHERE o.id = $1 FOR UPDATE");
        let Some(row) = sqlx::query_as::<_, OrderRow>(&sql).bind(id).fetch_optional(&mut *conn).await? else {
            return Ok(None);
        };
        let items = load_items(&mut *conn, &[id]).await?;
        Ok(assemble(vec![row], items)?.into_iter().next())
    }

    async fn update_order(&mut self, order: &Order) -> Result<()> {
        let result = sqlx::query("UPDATE orders SET status = $2, delivery_id = $3, updated_at = $4 WHERE id = $1")
            .bind(order.id())
            .bind(order.status().as_str())
            .bind(order.delivery_id())
            .bind(order.updated_at())
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EcommerceError::OrderNotFound(order.id()));
        }
        Ok(())
    }

    async fn delete_order(&mut self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM orders WHERE id = $1").bind(id).execute(self.conn()?).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn lock_delivery_for_order(&mut self, order_id: Uuid) -> Result<Option<Delivery>> {
        let sql = format!("SELECT {DELIVERY_COLUMNS} FROM deliveries WHERE order_id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, DeliveryRow>(&sql).bind(order_id).fetch_optional(self.conn()?).await?;
        row.map(Delivery::try_from).transpose()
    }

    async fn insert_delivery(&mut self, delivery: &Delivery) -> Result<()> {
        let a = delivery.address();
        sqlx::query(
            "INSERT INTO deliveries (id, order_id, full_name, phone_number, house_no_street, colony_locality, \
             region, city, area, address, delivery_status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(delivery.id())
        .bind(delivery.order_id())
        .bind(a.full_name.clone())
        .bind(a.phone_number.clone())
        .bind(a.house_no_street.clone())
        .bind(a.colony_locality.clone())
        .bind(a.region.clone())
        .bind(a.city.clone())
        .bind(a.area.clone())
        .bind(a.address.clone())
        .bind(delivery.delivery_status().as_str())
        .bind(delivery.created_at())
        .bind(delivery.updated_at())
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn update_delivery(&mut self, delivery: &Delivery) -> Result<()> {
        let result = sqlx::query("UPDATE deliveries SET delivery_status = $2, updated_at = $3 WHERE id = $1")
            .bind(delivery.id())
            .bind(delivery.delivery_status().as_str())
            .bind(delivery.updated_at())
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EcommerceError::DeliveryNotFound(delivery.id()));
        }
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        sqlx::query(
            "INSERT INTO payments (id, user_id, order_ids, amount, session_id, payment_status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(payment.id())
        .bind(payment.user_id())
        .bind(payment.order_ids().to_vec())
        .bind(payment.amount())
        .bind(payment.session_id().to_string())
        .bind(payment.payment_status().as_str())
        .bind(payment.created_at())
        .bind(payment.updated_at())
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn lock_payment_by_session(&mut self, session_id: &str) -> Result<Option<Payment>> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE session_id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, PaymentRow>(&sql).bind(session_id.to_string()).fetch_optional(self.conn()?).await?;
        row.map(Payment::try_from).transpose()
    }

    async fn update_payment(&mut self, payment: &Payment) -> Result<()> {
        let result = sqlx::query("UPDATE payments SET payment_status = $2, updated_at = $3 WHERE id = $1")
            .bind(payment.id())
            .bind(payment.payment_status().as_str())
            .bind(payment.updated_at())
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EcommerceError::PaymentNotFound(payment.session_id().to_string()));
        }
        Ok(())
    }

    async fn insert_refund(&mut self, refund: &Refund) -> Result<()> {
        sqlx::query(
            "INSERT INTO refunds (id, order_id, total, reason, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(refund.id())
        .bind(refund.order_id())
        .bind(refund.total())
        .bind(refund.reason().to_string())
        .bind(refund.status().as_str())
        .bind(refund.created_at())
        .bind(refund.updated_at())
        .execute(self.conn()?)
        .await?;
        Ok(())
    }

    async fn lock_refund(&mut self, id: Uuid) -> Result<Option<Refund>> {
        let sql = format!("SELECT {REFUND_COLUMNS} FROM refunds WHERE id = $1 FOR UPDATE");
        let row = sqlx::query_as::<_, RefundRow>(&sql).bind(id).fetch_optional(self.conn()?).await?;
        row.map(Refund::try_from).transpose()
    }

    async fn update_refund(&mut self, refund: &Refund) -> Result<()> {
        let result = sqlx::query("UPDATE refunds SET status = $2, reason = $3, updated_at = $4 WHERE id = $1")
            .bind(refund.id())
            .bind(refund.status().as_str())
            .bind(refund.reason().to_string())
            .bind(refund.updated_at())
            .execute(self.conn()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(EcommerceError::RefundNotFound(refund.id()));
        }
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await?;
        }
        Ok(())
    }
}
