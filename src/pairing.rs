// src/pairing.rs
//
// Client for the WhatsMe pairing API. Shared-secret auth via the
// x-whatsme-auth header; both endpoints take the digit-only phone as the
// jid query parameter.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::PairingConfig;
use crate::error::ApiError;
use crate::lifecycle::PairingGateway;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WhatsmeClient {
    http: reqwest::Client,
    config: PairingConfig,
}

impl WhatsmeClient {
    pub fn new(config: PairingConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http, config })
    }
}

#[derive(Debug, Deserialize)]
struct PairResponse {
    #[serde(default)]
    code: Option<String>,
}

#[async_trait]
impl PairingGateway for WhatsmeClient {
    async fn request_pairing_code(&self, phone: &str) -> Result<String, ApiError> {
        let resp = self
            .http
            .get(format!("{}/pair", self.config.base_url))
            .query(&[("jid", phone)])
            .header("x-whatsme-auth", &self.config.auth_key)
            .send()
            .await
            .map_err(|e| ApiError::GatewayUnavailable(format!("pairing gateway unreachable: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::GatewayUnavailable(format!(
                "pairing gateway returned status {status}"
            )));
        }

        let parsed: PairResponse = resp.json().await.map_err(|e| {
            ApiError::GatewayUnavailable(format!("unexpected pairing gateway response: {e}"))
        })?;

        match parsed.code {
            Some(code) if !code.is_empty() => Ok(code),
            _ => Err(ApiError::GatewayUnavailable(
                "pairing gateway response missing code".to_string(),
            )),
        }
    }

    async fn request_unpair(&self, phone: &str) -> Result<(), ApiError> {
        let resp = self
            .http
            .get(format!("{}/delpair", self.config.base_url))
            .query(&[("jid", phone)])
            .header("x-whatsme-auth", &self.config.auth_key)
            .send()
            .await
            .map_err(|e| ApiError::GatewayUnavailable(format!("pairing gateway unreachable: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ApiError::GatewayUnavailable(format!(
                "pairing gateway returned status {status}"
            )));
        }

        Ok(())
    }
}
