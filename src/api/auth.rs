// src/api/auth.rs

use actix_web::body::MessageBody;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform};
use actix_web::{post, web, HttpMessage, HttpResponse};
use actix_web::Error;
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use futures_util::future::{ready, LocalBoxFuture, Ready};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::Row;
use std::rc::Rc;
use std::task::{Context, Poll};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::error::ApiError;
use crate::AppState;

const OTP_TTL_MINUTES: i64 = 10;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    exp: usize,
}

/// Authenticated identity injected into request extensions by
/// [`JwtMiddleware`].
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AuthResponse {
    pub token: String,
    pub user_id: Uuid,
}

#[utoipa::path(
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Account created, email verification pending"),
        (status = 400, description = "Invalid input or email already registered")
    ),
    tag = "auth"
)]
#[post("/auth/register")]
pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = payload.email.trim().to_lowercase();
    if !email.contains('@') || !email.contains('.') {
        return Err(ApiError::InvalidInput("invalid email address".to_string()));
    }
    if payload.password.len() < 8 {
        return Err(ApiError::InvalidInput(
            "password must be at least 8 characters".to_string(),
        ));
    }

    let password_hash = hash(&payload.password, DEFAULT_COST)
        .map_err(|e| ApiError::Persistence(format!("password hash failed: {e}")))?;

    let row = sqlx::query(
        r#"INSERT INTO users (email, username, password_hash)
           VALUES ($1, $2, $3)
           RETURNING id"#,
    )
    .bind(&email)
    .bind(payload.username.as_deref())
    .bind(password_hash)
    .fetch_one(&state.pool)
    .await
    .map_err(|e| {
        log::warn!("register insert error: {e}");
        ApiError::InvalidInput("user already exists or invalid data".to_string())
    })?;

    let user_id: Uuid = row.get("id");

    // The OTP row is written before the mail attempt, so a pending
    // verification always exists even if dispatch fails.
    let code = format!("{:06}", rand::thread_rng().gen_range(0..1_000_000));
    let expires_at = Utc::now() + Duration::minutes(OTP_TTL_MINUTES);

    sqlx::query("INSERT INTO email_verifications (email, code, expires_at) VALUES ($1, $2, $3)")
        .bind(&email)
        .bind(&code)
        .bind(expires_at)
        .execute(&state.pool)
        .await?;

    if let Some(mailer) = state.mailer.as_ref() {
        let html = format!(
            "<p>Your WhatsMe verification code is <b>{code}</b>. \
             It expires in {OTP_TTL_MINUTES} minutes.</p>"
        );
        let text = format!(
            "Your WhatsMe verification code is {code}. \
             It expires in {OTP_TTL_MINUTES} minutes."
        );
        if let Err(e) = mailer.send(&email, "Verify your email", &html, &text).await {
            log::warn!("verification mail to {email} failed: {e}");
        }
    } else {
        log::warn!("smtp not configured, skipping verification mail for {email}");
    }

    Ok(HttpResponse::Ok().json(json!({
        "user_id": user_id,
        "verification_pending": true,
    })))
}

#[utoipa::path(
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Email verified"),
        (status = 400, description = "Invalid or expired code")
    ),
    tag = "auth"
)]
#[post("/auth/verify-otp")]
pub async fn verify_otp(
    state: web::Data<AppState>,
    payload: web::Json<VerifyOtpRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = payload.email.trim().to_lowercase();

    let row = sqlx::query(
        r#"SELECT id FROM email_verifications
           WHERE email = $1 AND code = $2 AND verified = FALSE AND expires_at >= NOW()
           ORDER BY created_at DESC
           LIMIT 1"#,
    )
    .bind(&email)
    .bind(payload.code.trim())
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| ApiError::InvalidInput("invalid or expired code".to_string()))?;

    let verification_id: Uuid = row.get("id");

    sqlx::query("UPDATE email_verifications SET verified = TRUE WHERE id = $1")
        .bind(verification_id)
        .execute(&state.pool)
        .await?;

    sqlx::query("UPDATE users SET email_verified = TRUE WHERE email = $1")
        .bind(&email)
        .execute(&state.pool)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "success": true })))
}

#[utoipa::path(
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = AuthResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 403, description = "Email not verified")
    ),
    tag = "auth"
)]
#[post("/auth/login")]
pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = payload.email.trim().to_lowercase();

    let row = sqlx::query(
        "SELECT id, password_hash, email_verified FROM users WHERE email = $1",
    )
    .bind(&email)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::Unauthenticated)?;

    let user_id: Uuid = row.get("id");
    let password_hash: String = row.get("password_hash");
    let email_verified: bool = row.get("email_verified");

    match verify(&payload.password, &password_hash) {
        Ok(true) => {}
        Ok(false) => return Err(ApiError::Unauthenticated),
        Err(e) => {
            log::error!("bcrypt verify error: {e}");
            return Err(ApiError::Persistence("credential check failed".to_string()));
        }
    }

    if !email_verified {
        return Err(ApiError::Unauthorized("email not verified".to_string()));
    }

    let token = generate_jwt(user_id, &email, &state.jwt_secret)
        .map_err(|e| ApiError::Persistence(format!("token issue failed: {e}")))?;

    Ok(HttpResponse::Ok().json(AuthResponse { token, user_id }))
}

fn generate_jwt(
    user_id: Uuid,
    email: &str,
    secret: &str,
) -> Result<String, jsonwebtoken::errors::Error> {
    let expiration = Utc::now()
        .checked_add_signed(Duration::days(30))
        .expect("valid timestamp")
        .timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
}

/// Middleware guarding the `/api` scope:
/// - takes `Authorization: Bearer <jwt>`
/// - validates the token against the configured secret
/// - puts an [`AuthUser`] into `req.extensions_mut()`
pub struct JwtMiddleware {
    secret: Rc<String>,
}

impl JwtMiddleware {
    pub fn new(secret: String) -> Self {
        Self {
            secret: Rc::new(secret),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Transform = JwtMiddlewareInner<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(JwtMiddlewareInner {
            service,
            secret: self.secret.clone(),
        }))
    }
}

pub struct JwtMiddlewareInner<S> {
    service: S,
    secret: Rc<String>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareInner<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let auth_header = req
            .headers()
            .get(actix_web::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            match decode::<Claims>(
                token,
                &DecodingKey::from_secret(self.secret.as_ref().as_bytes()),
                &Validation::default(),
            ) {
                Ok(token_data) => {
                    let user_id = match Uuid::parse_str(&token_data.claims.sub) {
                        Ok(id) => id,
                        Err(_) => {
                            return Box::pin(async move {
                                Err(ApiError::Unauthenticated.into())
                            })
                        }
                    };
                    req.extensions_mut().insert(AuthUser {
                        id: user_id,
                        email: token_data.claims.email,
                    });
                    let fut = self.service.call(req);
                    return Box::pin(async move { fut.await });
                }
                Err(_) => {
                    return Box::pin(async move { Err(ApiError::Unauthenticated.into()) })
                }
            }
        }

        Box::pin(async move { Err(ApiError::Unauthenticated.into()) })
    }
}
