use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{ApiResponse, ApiResult, AppState, ValidJson, ValidPath};
use crate::refunds::RefundWithOrder;
use crate::EcommerceError;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub order_id: Uuid,
    #[validate(length(min = 1, message = "Reason is required"))]
    pub reason: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectRefundRequest {
    pub reason: Option<String>,
}

pub async fn request_refund(
    State(s): State<AppState>,
    ValidJson(r): ValidJson<RefundRequest>,
) -> Result<(StatusCode, Json<ApiResponse<RefundWithOrder>>), EcommerceError> {
    let refund = s.refunds.request_refund(r.order_id, &r.reason).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Refund request created successfully", refund))))
}

pub async fn list_refunds(State(s): State<AppState>) -> ApiResult<Vec<RefundWithOrder>> {
    Ok(Json(ApiResponse::ok("Refund requests retrieved successfully", s.refunds.list_refunds().await?)))
}

pub async fn approve_refund(State(s): State<AppState>, ValidPath(id): ValidPath<Uuid>) -> ApiResult<RefundWithOrder> {
    Ok(Json(ApiResponse::ok("Refund request approved", s.refunds.approve_refund(id).await?)))
}

pub async fn reject_refund(
    State(s): State<AppState>,
    ValidPath(id): ValidPath<Uuid>,
    ValidJson(r): ValidJson<RejectRefundRequest>,
) -> ApiResult<RefundWithOrder> {
    Ok(Json(ApiResponse::ok("Refund request rejected", s.refunds.reject_refund(id, r.reason.as_deref()).await?)))
}
