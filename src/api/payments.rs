// src/api/payments.rs

use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitializePaymentRequest {
    /// Major currency unit; the gateway adapter converts to minor units.
    pub amount: i64,
    pub plan_type: String,
    pub plan_duration_months: i32,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct InitializePaymentResponse {
    pub authorization_url: String,
    pub reference: String,
    pub transaction_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyPaymentRequest {
    pub reference: String,
}

#[utoipa::path(
    request_body = InitializePaymentRequest,
    responses(
        (status = 200, description = "Payment initialized", body = InitializePaymentResponse),
        (status = 400, description = "Invalid amount or duration"),
        (status = 500, description = "Payment gateway not configured")
    ),
    tag = "payments"
)]
#[post("/payments/initialize")]
pub async fn initialize_payment(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<InitializePaymentRequest>,
) -> Result<HttpResponse, ApiError> {
    let user = user.into_inner();

    let initiated = state
        .lifecycle
        .initiate_purchase(
            user.id,
            &user.email,
            payload.amount,
            &payload.plan_type,
            payload.plan_duration_months,
        )
        .await?;

    Ok(HttpResponse::Ok().json(InitializePaymentResponse {
        authorization_url: initiated.authorization_url,
        reference: initiated.reference,
        transaction_id: initiated.transaction_id,
    }))
}

#[utoipa::path(
    request_body = VerifyPaymentRequest,
    responses(
        (status = 200, description = "Payment settled, instance provisioned"),
        (status = 400, description = "Payment not successful"),
        (status = 503, description = "Verification unavailable, retry")
    ),
    tag = "payments"
)]
#[post("/payments/verify")]
pub async fn verify_payment(
    state: web::Data<AppState>,
    payload: web::Json<VerifyPaymentRequest>,
) -> Result<HttpResponse, ApiError> {
    let confirmed = state.lifecycle.confirm_purchase(&payload.reference).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "instance_id": confirmed.instance_id,
        "already_provisioned": confirmed.already_provisioned,
    })))
}
