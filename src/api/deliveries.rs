use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::{ApiResponse, ApiResult, AppState, ValidJson, ValidPath};
use crate::domain::aggregates::{Delivery, DeliveryAddress};
use crate::orders::DeliveryWithOrder;
use crate::EcommerceError;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDeliveryRequest {
    pub order_id: Uuid,
    pub user_id: Uuid,
    #[validate(length(min = 1, message = "Full name is required"))]
    pub full_name: String,
    #[validate(length(min = 1, message = "Phone number is required"))]
    pub phone_number: String,
    #[serde(default)]
    pub house_no_street: String,
    #[serde(default)]
    pub colony_locality: String,
    #[serde(default)]
    pub region: String,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[serde(default)]
    pub area: String,
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,
}

pub async fn create_delivery(
    State(s): State<AppState>,
    ValidJson(r): ValidJson<CreateDeliveryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Delivery>>), EcommerceError> {
    let address = DeliveryAddress {
        full_name: r.full_name,
        phone_number: r.phone_number,
        house_no_street: r.house_no_street,
        colony_locality: r.colony_locality,
        region: r.region,
        city: r.city,
        area: r.area,
        address: r.address,
    };
    let delivery = s.deliveries.create_delivery(r.user_id, r.order_id, address).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok("Delivery created successfully", delivery))))
}

pub async fn get_delivery_by_order(State(s): State<AppState>, ValidPath(order_id): ValidPath<Uuid>) -> ApiResult<DeliveryWithOrder> {
    Ok(Json(ApiResponse::ok("Delivery fetched successfully", s.deliveries.get_by_order(order_id).await?)))
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
    async fn test_create_and_fetch_delivery() {
        let fx = Fixture::new().await;
        let p = fx.product("Rug", "60.00", 2).await;
        let item = NewLineItem { product_id: p.id(), quantity: 1, customization: None };
        let order = fx.orders.create_order(fx.user.id, vec![item]).await.unwrap();
        let app = router(fx.app_state());

        let incomplete = json!({"orderId": order.id, "userId": fx.user.id, "fullName": "", "phoneNumber": "1", "city": "Lagos", "address": "1 Road"});
        let (status, body) = call(&app, Method::POST, "/deliveries", Some(incomplete)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "VALIDATION_ERROR");

        let request = json!({
            "orderId": order.id, "userId": fx.user.id, "fullName": "Ada Lovelace", "phoneNumber": "+234800",
            "city": "Lagos", "address": "1 Marina Road", "region": "Lagos State"
        });
        let (status, created) = call(&app, Method::POST, "/deliveries", Some(request.clone())).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["data"]["deliveryStatus"], "pending");
        assert_eq!(created["data"]["fullName"], "Ada Lovelace");

        let (status, _) = call(&app, Method::POST, "/deliveries", Some(request)).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, found) = call(&app, Method::GET, &format!("/deliveries/order/{}", order.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(found["data"]["orderStatus"], "pending");
        assert_eq!(found["data"]["orderAmount"], "60.00");
        assert_eq!(found["data"]["orderSlug"], "ORD-001");
    }
}
