// src/api/admin.rs
//
// Privileged layer over the same ledger and pairing adapter. Every entry
// point checks the admin role once, against user_roles only.

use actix_web::{get, post, web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use sqlx::{PgPool, Row};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{InstanceStatus, Profile};
use crate::AppState;

async fn require_admin(pool: &PgPool, user_id: Uuid) -> Result<(), ApiError> {
    let row = sqlx::query("SELECT 1 AS ok FROM user_roles WHERE user_id = $1 AND role = 'admin'")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    if row.is_none() {
        return Err(ApiError::Unauthorized("admin access required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminCreateInstanceRequest {
    /// Defaults to the calling admin's own account.
    pub user_id: Option<Uuid>,
    pub plan_type: Option<String>,
    pub plan_duration_months: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminUpdateInstanceRequest {
    pub instance_id: Uuid,
    /// Must be `expired` or `deleted`; reactivation is rejected.
    pub status: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminDeleteUserRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdminSendEmailRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[get("/admin/users")]
pub async fn list_users(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&state.pool, user.id).await?;

    let rows = sqlx::query(
        r#"SELECT id, email, username, email_verified, created_at
           FROM users
           ORDER BY created_at DESC"#,
    )
    .fetch_all(&state.pool)
    .await?;

    let profiles: Vec<Profile> = rows
        .into_iter()
        .map(|r| Profile {
            id: r.get("id"),
            email: r.get("email"),
            username: r.get("username"),
            email_verified: r.get("email_verified"),
            created_at: r.get("created_at"),
        })
        .collect();

    Ok(HttpResponse::Ok().json(profiles))
}

#[get("/admin/instances")]
pub async fn list_all_instances(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&state.pool, user.id).await?;
    let instances = state.ledger.list_all_instances().await?;
    Ok(HttpResponse::Ok().json(instances))
}

#[get("/admin/transactions")]
pub async fn list_all_transactions(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&state.pool, user.id).await?;
    let transactions = state.ledger.list_all_transactions().await?;
    Ok(HttpResponse::Ok().json(transactions))
}

#[post("/admin/instances/create")]
pub async fn create_instance(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<AdminCreateInstanceRequest>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&state.pool, user.id).await?;

    let target_user = payload.user_id.unwrap_or(user.id);
    let plan_type = payload.plan_type.as_deref().unwrap_or("Admin Pro");
    let months = payload.plan_duration_months.unwrap_or(12);

    let instance = state
        .lifecycle
        .force_create_instance(target_user, plan_type, months)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "instance": instance,
    })))
}

#[post("/admin/instances/update")]
pub async fn update_instance(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<AdminUpdateInstanceRequest>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&state.pool, user.id).await?;

    let target: InstanceStatus = payload
        .status
        .parse()
        .map_err(|_| ApiError::InvalidInput("unknown instance status".to_string()))?;
    if !target.is_terminal() {
        return Err(ApiError::InvalidInput(
            "instances cannot be reactivated".to_string(),
        ));
    }

    let outcome = state
        .lifecycle
        .retire_instance(user.id, payload.instance_id, target, true)
        .await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "status": outcome.status,
        "changed": outcome.changed,
    })))
}

#[post("/admin/users/delete")]
pub async fn delete_user(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<AdminDeleteUserRequest>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&state.pool, user.id).await?;

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(payload.user_id)
        .execute(&state.pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound("user not found".to_string()));
    }

    log::info!("admin {} removed user {}", user.id, payload.user_id);
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[post("/admin/send-email")]
pub async fn send_email(
    state: web::Data<AppState>,
    user: web::ReqData<AuthUser>,
    payload: web::Json<AdminSendEmailRequest>,
) -> Result<HttpResponse, ApiError> {
    require_admin(&state.pool, user.id).await?;

    let mailer = state
        .mailer
        .as_ref()
        .ok_or_else(|| ApiError::Config("smtp is not configured".to_string()))?;

    mailer
        .send(&payload.to, &payload.subject, &payload.body, &payload.body)
        .await?;

    log::info!("admin {} sent mail to {}", user.id, payload.to);
    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}
