//! HTTP surface
//!
//! Every response uses one envelope:
//! ```json
//! { "status": true, "message": "Order created successfully", "data": { ... } }
//! { "status": false, "message": "Order not found", "error": "ORDER_NOT_FOUND" }
//! ```

pub mod catalog;
pub mod deliveries;
pub mod orders;
pub mod payments;
pub mod refunds;

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::error;
use validator::Validate;

use crate::catalog::CatalogService;
use crate::deliveries::DeliveryService;
use crate::orders::{OrderService, Paging};
use crate::payments::PaymentService;
use crate::publisher::EventPublisher;
use crate::refunds::RefundService;
use crate::store::Store;
use crate::EcommerceError;

#[derive(Clone)]
pub struct AppState {
    pub orders: Arc<OrderService>,
    pub deliveries: Arc<DeliveryService>,
    pub catalog: Arc<CatalogService>,
    pub payments: Arc<PaymentService>,
    pub refunds: Arc<RefundService>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, publisher: EventPublisher, paging: Paging) -> Self {
        Self {
            orders: Arc::new(OrderService::new(store.clone(), publisher.clone(), paging)),
            deliveries: Arc::new(DeliveryService::new(store.clone(), publisher.clone())),
            payments: Arc::new(PaymentService::new(store.clone(), publisher.clone())),
            refunds: Arc::new(RefundService::new(store.clone(), publisher)),
            catalog: Arc::new(CatalogService::new(store)),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "opensase-orders"})) }))
        .route("/orders", get(orders::list_orders).post(orders::create_order))
        .route("/orders/best-selling", get(orders::best_selling_products))
        .route("/orders/history/:id", get(orders::order_history))
        .route("/orders/:id", get(orders::get_order).delete(orders::delete_order))
        .route("/orders/:id/status", put(orders::update_order_status))
        .route("/orders/:id/cancel", put(orders::cancel_order))
        .route("/deliveries", post(deliveries::create_delivery))
        .route("/deliveries/order/:id", get(deliveries::get_delivery_by_order))
        .route("/payments", get(payments::list_payments).post(payments::open_payment))
        .route("/payments/confirm", post(payments::confirm_payment))
        .route("/payments/fail", post(payments::fail_payment))
        .route("/refunds", get(refunds::list_refunds).post(refunds::request_refund))
        .route("/refunds/:id/approve", put(refunds::approve_refund))
        .route("/refunds/:id/reject", put(refunds::reject_refund))
        .route("/products", post(catalog::create_product))
        .route("/products/:id", get(catalog::get_product).put(catalog::update_product))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub status: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    /// Machine-readable error code, failures only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self { status: true, message: message.into(), data: Some(data), error: None }
    }
}

impl ApiResponse<()> {
    pub fn failure(message: impl Into<String>, code: &str) -> Self {
        Self { status: false, message: message.into(), data: None, error: Some(code.to_string()) }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, EcommerceError>;

impl EcommerceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::InsufficientStock { .. }
            | Self::InvalidStatus(_)
            | Self::AlreadyCancelled
            | Self::CannotCancelDelivered => StatusCode::BAD_REQUEST,
            Self::UserNotFound(_)
            | Self::ProductNotFound(_)
            | Self::OrderNotFound(_)
            | Self::DeliveryNotFound(_)
            | Self::PaymentNotFound(_)
            | Self::RefundNotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Config(_) | Self::Database(_) | Self::StorageError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::ProductNotFound(_) => "PRODUCT_NOT_FOUND",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::DeliveryNotFound(_) => "DELIVERY_NOT_FOUND",
            Self::PaymentNotFound(_) => "PAYMENT_NOT_FOUND",
            Self::RefundNotFound(_) => "REFUND_NOT_FOUND",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::InvalidStatus(_) => "INVALID_STATUS",
            Self::AlreadyCancelled => "ALREADY_CANCELLED",
            Self::CannotCancelDelivered => "CANNOT_CANCEL_DELIVERED",
            Self::Conflict(_) => "CONFLICT",
            Self::Config(_) | Self::Database(_) | Self::StorageError(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for EcommerceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status.is_server_error() {
            error!(error = %self, "request failed");
            "Internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ApiResponse::failure(message, self.code()))).into_response()
    }
}

/// JSON body extractor that also runs `validator` rules. Both malformed bodies and rule
/// violations are rejected as validation errors inside the standard envelope.
pub struct ValidJson<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequest<S> for ValidJson<T>
where
    T: DeserializeOwned + Validate + Send,
    S: Send + Sync,
{
    type Rejection = EcommerceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| EcommerceError::Validation(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Path extractor whose rejections use the standard envelope.
pub struct ValidPath<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ValidPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(value) = Path::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: PathRejection| EcommerceError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Query string extractor whose rejections use the standard envelope.
pub struct ValidQuery<T>(pub T);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = EcommerceError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection: QueryRejection| EcommerceError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}


#[cfg(test)]
mod tests {
    use super::testing::call;
    use super::*;
    use crate::test_utils::Fixture;
    use axum::http::Method;

    #[tokio::test]
    async fn test_health() {
        let fx = Fixture::new().await;
        let app = router(fx.app_state());
        let (status, body) = call(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[test]
    fn test_error_mapping() {
        let cases = [
            (EcommerceError::Validation("x".into()), StatusCode::BAD_REQUEST),
            (EcommerceError::AlreadyCancelled, StatusCode::BAD_REQUEST),
            (EcommerceError::OrderNotFound(uuid::Uuid::nil()), StatusCode::NOT_FOUND),
            (EcommerceError::PaymentNotFound("cs".into()), StatusCode::NOT_FOUND),
            (EcommerceError::RefundNotFound(uuid::Uuid::nil()), StatusCode::NOT_FOUND),
            (EcommerceError::Conflict("slug".into()), StatusCode::CONFLICT),
            (EcommerceError::StorageError("disk".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, expected) in cases {
            assert_eq!(err.status_code(), expected);
        }
    }

    #[tokio::test]
    async fn test_internal_errors_hide_details() {
        let response = EcommerceError::StorageError("connection reset".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], false);
        assert_eq!(body["message"], "Internal server error");
        assert_eq!(body["error"], "INTERNAL_ERROR");
    }
}
