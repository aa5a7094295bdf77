// src/config.rs
//
// All environment access happens here, once, at startup. Adapters receive
// their slice of the configuration at construction instead of reading
// ambient variables in handlers.

use std::env;

#[derive(Debug, Clone)]
pub struct PaystackConfig {
    pub base_url: String,
    pub secret_key: String,
    pub callback_base_url: String,
}

#[derive(Debug, Clone)]
pub struct PairingConfig {
    pub base_url: String,
    pub auth_key: String,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub paystack: PaystackConfig,
    pub pairing: PairingConfig,
    pub smtp: Option<SmtpConfig>,
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, String> {
        let database_url = require("DATABASE_URL")?;
        let jwt_secret = require("JWT_SECRET")?;

        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(8080);

        let paystack = PaystackConfig {
            base_url: env::var("PAYSTACK_API_BASE_URL")
                .unwrap_or_else(|_| "https://api.paystack.co".to_string()),
            // Empty secret means "payments unconfigured"; purchase initiation
            // refuses before any row is written.
            secret_key: env::var("PAYSTACK_SECRET_KEY").unwrap_or_default(),
            callback_base_url: env::var("CALLBACK_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),
        };

        let pairing = PairingConfig {
            base_url: env::var("WHATSME_API_URL")
                .unwrap_or_else(|_| "http://localhost:2001".to_string()),
            auth_key: env::var("WHATSME_AUTH_KEY").unwrap_or_default(),
        };

        let smtp = match env::var("SMTP_HOST") {
            Ok(smtp_host) => {
                let username = require("SMTP_USER")?;
                let password = require("SMTP_PASS")?;
                let from = env::var("SMTP_FROM")
                    .unwrap_or_else(|_| format!("WhatsMe <{username}>"));
                Some(SmtpConfig {
                    host: smtp_host,
                    port: env::var("SMTP_PORT")
                        .ok()
                        .and_then(|v| v.parse::<u16>().ok())
                        .unwrap_or(465),
                    username,
                    password,
                    from,
                })
            }
            Err(_) => None,
        };

        let sweep_interval_secs = env::var("EXPIRATION_SWEEP_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3600);

        Ok(AppConfig {
            database_url,
            host,
            port,
            jwt_secret,
            paystack,
            pairing,
            smtp,
            sweep_interval_secs,
        })
    }
}

fn require(name: &str) -> Result<String, String> {
    env::var(name).map_err(|_| format!("{name} must be set"))
}
