use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{ApiResponse, ApiResult, AppState, ValidJson, ValidPath};
use crate::catalog::ProductUpdate;
use crate::domain::aggregates::{ColorVariant, Media, NewProduct, Product};
use crate::domain::value_objects::Sku;
use crate::EcommerceError;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 50))]
    pub sku: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    pub quantity: u32,
    pub category_id: Option<Uuid>,
    pub subcategory_id: Option<Uuid>,
    #[serde(default)]
    pub is_customizable: bool,
    #[serde(default)]
    pub media: Media,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub colors: Vec<ColorVariant>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    pub price: Option<Decimal>,
    pub quantity: Option<u32>,
}

pub async fn create_product(
    State(s): State<AppState>,
    ValidJson(r): ValidJson<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Product>>), EcommerceError> {
    let input = NewProduct {
        sku: Sku::new(r.sku)?,
        name: r.name,
        description: r.description,
        price: r.price,
        quantity: r.quantity,
        category_id: r.category_id,
        subcategory_id: r.subcategory_id,
        is_customizable: r.is_customizable,
        media: r.media,
        sizes: r.sizes,
        colors: r.colors,
    };
    let product = s.catalog.create_product(input).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Product created successfully", product))))
}

pub async fn get_product(State(s): State<AppState>, ValidPath(id): ValidPath<Uuid>) -> ApiResult<Product> {
    Ok(Json(ApiResponse::ok("Product fetched successfully", s.catalog.get_product(id).await?)))
}

pub async fn update_product(
    State(s): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(r): ValidJson<UpdateProductRequest>,
) -> ApiResult<Product> {
    let update = ProductUpdate { price: r.price, quantity: r.quantity };
    Ok(Json(ApiResponse::ok("Product updated successfully", s.catalog.update_product(id, update).await?)))
}
