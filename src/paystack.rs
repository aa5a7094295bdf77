// src/paystack.rs
//
// Client for the Paystack transaction API. Authorization: Bearer header,
// amounts in the minor currency unit (kobo), the transaction id reused as
// the idempotency reference.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::PaystackConfig;
use crate::error::ApiError;
use crate::lifecycle::{InitializedPayment, PaymentGateway, PaymentVerification};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct PaystackClient {
    http: reqwest::Client,
    config: PaystackConfig,
}

impl PaystackClient {
    pub fn new(config: PaystackConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }
}

#[derive(Debug, Deserialize)]
struct InitializeResponse {
    status: bool,
    #[serde(default)]
    message: Option<String>,
    data: Option<InitializeData>,
}

#[derive(Debug, Deserialize)]
struct InitializeData {
    authorization_url: String,
    reference: String,
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    status: bool,
    data: Option<VerifyData>,
}

#[derive(Debug, Deserialize)]
struct VerifyData {
    status: String,
    #[serde(default)]
    metadata: Option<VerifyMetadata>,
}

#[derive(Debug, Deserialize)]
struct VerifyMetadata {
    #[serde(default)]
    plan_type: Option<String>,
    #[serde(default)]
    plan_duration_months: Option<i32>,
}

#[async_trait]
impl PaymentGateway for PaystackClient {
    fn configured(&self) -> bool {
        !self.config.secret_key.is_empty()
    }

    async fn initialize(
        &self,
        email: &str,
        amount_major: i64,
        reference: Uuid,
        plan_type: &str,
        plan_duration_months: i32,
    ) -> Result<InitializedPayment, ApiError> {
        let body = json!({
            "email": email,
            // Paystack expects the minor unit (kobo).
            "amount": amount_major * 100,
            "reference": reference,
            "callback_url": format!("{}/payment-callback", self.config.callback_base_url),
            "metadata": {
                "plan_type": plan_type,
                "plan_duration_months": plan_duration_months,
                "transaction_id": reference,
            },
        });

        let resp = self
            .http
            .post(format!("{}/transaction/initialize", self.config.base_url))
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ApiError::GatewayUnavailable(format!("payment gateway unreachable: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::GatewayUnavailable(format!("payment gateway read error: {e}")))?;

        if !status.is_success() {
            log::error!("paystack initialize status={status} body={text}");
            return Err(ApiError::GatewayUnavailable(
                "payment gateway returned an error".to_string(),
            ));
        }

        let parsed: InitializeResponse = serde_json::from_str(&text).map_err(|e| {
            ApiError::GatewayUnavailable(format!("unexpected payment gateway response: {e}"))
        })?;

        if !parsed.status {
            log::error!(
                "paystack initialize declined: {}",
                parsed.message.as_deref().unwrap_or("no message")
            );
            return Err(ApiError::GatewayRejected(
                "payment initialization failed".to_string(),
            ));
        }

        let data = parsed.data.ok_or_else(|| {
            ApiError::GatewayUnavailable("payment gateway response missing data".to_string())
        })?;

        Ok(InitializedPayment {
            authorization_url: data.authorization_url,
            reference: data.reference,
        })
    }

    async fn verify(&self, reference: &str) -> Result<PaymentVerification, ApiError> {
        let resp = self
            .http
            .get(format!(
                "{}/transaction/verify/{reference}",
                self.config.base_url
            ))
            .bearer_auth(&self.config.secret_key)
            .send()
            .await
            .map_err(|e| ApiError::GatewayUnavailable(format!("payment gateway unreachable: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ApiError::GatewayUnavailable(format!("payment gateway read error: {e}")))?;

        // Non-2xx is an uncertain answer, not a declined payment: the
        // provider may already hold the money.
        if !status.is_success() {
            log::error!("paystack verify status={status} body={text}");
            return Err(ApiError::GatewayUnavailable(
                "payment verification unavailable".to_string(),
            ));
        }

        let parsed: VerifyResponse = serde_json::from_str(&text).map_err(|e| {
            ApiError::GatewayUnavailable(format!("unexpected payment gateway response: {e}"))
        })?;

        let success = parsed.status
            && parsed
                .data
                .as_ref()
                .map(|d| d.status == "success")
                .unwrap_or(false);
        let metadata = parsed.data.and_then(|d| d.metadata);

        Ok(PaymentVerification {
            success,
            plan_type: metadata.as_ref().and_then(|m| m.plan_type.clone()),
            plan_duration_months: metadata.and_then(|m| m.plan_duration_months),
        })
    }
}
