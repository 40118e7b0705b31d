use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{ApiResponse, ApiResult, AppState, ValidJson, ValidPath, ValidQuery};
use crate::domain::aggregates::Customization;
use crate::orders::{ListOrders, NewLineItem, OrderListing, OrderSummary, OrderWithProductSummary, RankedProduct};
use crate::EcommerceError;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(alias = "user")]
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "Products must be a non-empty array"))]
    pub products: Vec<OrderItemRequest>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    #[serde(alias = "product")]
    pub product_id: Uuid,
    pub quantity: i64,
    #[serde(default)]
    pub customization: Option<Customization>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub status: Option<String>,
    pub user_id: Option<Uuid>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderRequest {
    pub user_id: Uuid,
}

pub async fn create_order(
    State(s): State<AppState>,
    ValidJson(r): ValidJson<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderWithProductSummary>>), EcommerceError> {
    let items = r
        .products
        .into_iter()
        .map(|p| NewLineItem { product_id: p.product_id, quantity: p.quantity, customization: p.customization })
        .collect();
    let order = s.orders.create_order(r.user_id, items).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Order created successfully", order))))
}

pub async fn list_orders(State(s): State<AppState>, ValidQuery(p): ValidQuery<ListOrdersParams>) -> ApiResult<OrderListing> {
    let params = ListOrders { page: p.page, limit: p.limit, status: p.status, user_id: p.user_id, search: p.search };
    Ok(Json(ApiResponse::ok("Orders fetched successfully", s.orders.list_orders(params).await?)))
}

pub async fn get_order(State(s): State<AppState>, ValidPath(id): ValidPath<Uuid>) -> ApiResult<OrderWithProductSummary> {
    Ok(Json(ApiResponse::ok("Order fetched successfully", s.orders.get_order(id).await?)))
}

pub async fn update_order_status(
    State(s): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(r): ValidJson<UpdateStatusRequest>,
) -> ApiResult<OrderWithProductSummary> {
    Ok(Json(ApiResponse::ok("Order status updated successfully", s.orders.update_order_status(id, &r.status).await?)))
}

pub async fn cancel_order(
    State(s): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(r): ValidJson<CancelOrderRequest>,
) -> ApiResult<OrderWithProductSummary> {
    Ok(Json(ApiResponse::ok("Order cancelled successfully", s.orders.cancel_order(id, r.user_id).await?)))
}

pub async fn delete_order(State(s): State<AppState>, ValidPath(id): ValidPath<Uuid>) -> ApiResult<()> {
    s.orders.delete_order(id).await?;
    Ok(Json(ApiResponse::ok("Order deleted successfully", ())))
}

pub async fn order_history(State(s): State<AppState>, ValidPath(user_id): ValidPath<Uuid>) -> ApiResult<Vec<OrderSummary>> {
    Ok(Json(ApiResponse::ok("Order history fetched successfully", s.orders.order_history(user_id).await?)))
}

pub async fn best_selling_products(State(s): State<AppState>) -> ApiResult<Vec<RankedProduct>> {
    Ok(Json(ApiResponse::ok("Best selling products fetched successfully", s.orders.best_selling_products().await?)))
}
