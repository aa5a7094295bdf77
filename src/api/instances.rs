// src/api/instances.rs

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::error::ApiError;
use crate::models::InstanceStatus;
use crate::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PairInstanceRequest {
    pub instance_id: Uuid,
    pub phone_number: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DeleteInstanceRequest {
    pub instance_id: Uuid,
}

#[utoipa::path(
    responses((status = 200, description = "Caller's instances, newest first")),
    tag = "instances"
)]
#[get("/instances")]
pub async fn list_instances(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    let instances = state.lifecycle.instances_for_user(user.id).await?;
    Ok(HttpResponse::Ok().json(instances))
}

#[utoipa::path(
    request_body = PairInstanceRequest,
    responses(
        (status = 200, description = "Pairing code issued"),
        (status = 400, description = "Invalid phone number"),
        (status = 404, description = "Instance not found or not active")
    ),
    tag = "instances"
)]
#[post("/instances/pair")]
pub async fn pair_instance(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<PairInstanceRequest>,
) -> Result<HttpResponse, ApiError> {
    let paired = state
        .lifecycle
        .pair_phone_number(user.id, payload.instance_id, &payload.phone_number)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "pairing_code": paired.pairing_code,
        "degraded": paired.degraded,
    })))
}

#[utoipa::path(
    request_body = DeleteInstanceRequest,
    responses(
        (status = 200, description = "Instance retired (or already terminal)"),
        (status = 404, description = "Instance not found")
    ),
    tag = "instances"
)]
#[post("/instances/delete")]
pub async fn delete_instance(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<DeleteInstanceRequest>,
) -> Result<HttpResponse, ApiError> {
    let outcome = state
        .lifecycle
        .retire_instance(user.id, payload.instance_id, InstanceStatus::Deleted, false)
        .await?;

    let mut body = json!({
        "success": true,
        "status": outcome.status,
        "changed": outcome.changed,
    });
    if !outcome.changed {
        body["notice"] = json!("instance was already retired");
    }

    Ok(HttpResponse::Ok().json(body))
}
