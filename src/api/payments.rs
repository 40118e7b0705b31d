use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{ApiResponse, ApiResult, AppState, ValidJson};
use crate::payments::PaymentView;
use crate::EcommerceError;

/// Checkout session opened at the payment provider for some of a user's orders.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OpenPaymentRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "orderIds must be a non-empty array"))]
    pub order_ids: Vec<Uuid>,
    #[validate(length(min = 1, message = "sessionId is required"))]
    pub session_id: String,
}

/// Outcome reported by the payment provider for a checkout session.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SessionOutcomeRequest {
    #[validate(length(min = 1, message = "sessionId is required"))]
    pub session_id: String,
}

pub async fn open_payment(
    State(s): State<AppState>,
    ValidJson(r): ValidJson<OpenPaymentRequest>,
) -> Result<(StatusCode, Json<ApiResponse<PaymentView>>), EcommerceError> {
    let payment = s.payments.open_payment(r.user_id, r.order_ids, &r.session_id).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Payment session recorded", payment))))
}

pub async fn confirm_payment(
    State(s): State<AppState>,
    ValidJson(r): ValidJson<SessionOutcomeRequest>,
) -> ApiResult<PaymentView> {
    Ok(Json(ApiResponse::ok("Payment confirmed", s.payments.confirm_payment(&r.session_id).await?)))
}

pub async fn fail_payment(
    State(s): State<AppState>,
    ValidJson(r): ValidJson<SessionOutcomeRequest>,
) -> ApiResult<PaymentView> {
    Ok(Json(ApiResponse::ok("Payment marked as failed", s.payments.fail_payment(&r.session_id).await?)))
}

pub async fn list_payments(State(s): State<AppState>) -> ApiResult<Vec<PaymentView>> {
    Ok(Json(ApiResponse::ok("Payments fetched successfully", s.payments.list_payments().await?)))
}

#[cfg(test)]
mod tests {
    use super::super::router;
    use super::super::testing::call;
    use crate::orders::NewLineItem;
    use crate::test_utils::Fixture;
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    #[tokio::test]
    async fn test_checkout_confirm_and_listing() {
        let fx = Fixture::new().await;
        let p = fx.product("Vase", "14.00", 4).await;
        let mut ids = Vec::new();
        for _ in 0..2 {
            let item = NewLineItem { product_id: p.id(), quantity: 1, customization: None };
            ids.push(fx.orders.create_order(fx.user.id, vec![item]).await.unwrap().id);
        }
        let app = router(fx.app_state());

        let open = json!({"userId": fx.user.id, "orderIds": ids, "sessionId": "cs_test_a1"});
        let (status, body) = call(&app, Method::POST, "/payments", Some(open)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["data"]["paymentStatus"], "pending");
        assert_eq!(body["data"]["amount"], "28.00");

        let session = Some(json!({"sessionId": "cs_test_a1"}));
        let (status, body) = call(&app, Method::POST, "/payments/confirm", session.clone()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["paymentStatus"], "completed");
        let orders = body["data"]["orders"].as_array().unwrap();
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o["status"] == "paid"));

        let (status, body) = call(&app, Method::POST, "/payments/confirm", session).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "INVALID_STATUS");

        let (status, body) = call(&app, Method::POST, "/payments/fail", Some(json!({"sessionId": "cs_nope"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "PAYMENT_NOT_FOUND");

        let (status, body) = call(&app, Method::GET, "/payments", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"][0]["orderCount"], 2);
        assert_eq!(body["data"][0]["userName"], "Ada");
        assert_eq!(body["data"][0]["orders"][0]["orderSlug"], "ORD-001");
    }

    #[tokio::test]
    async fn test_open_rejects_bad_input() {
        let fx = Fixture::new().await;
        let app = router(fx.app_state());
        let empty = json!({"userId": fx.user.id, "orderIds": [], "sessionId": "cs"});
        let (status, body) = call(&app, Method::POST, "/payments", Some(empty)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");

        let (status, _) = call(&app, Method::POST, "/payments/confirm", Some(json!({"orderIds": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
