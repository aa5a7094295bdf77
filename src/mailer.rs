// src/mailer.rs

use lettre::message::header::ContentType;
use lettre::message::{MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::config::SmtpConfig;
use crate::error::ApiError;

/// Fire-and-forget SMTP sender for OTP delivery and admin notices.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl Mailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, ApiError> {
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
            .map_err(|e| ApiError::Config(format!("smtp relay setup failed: {e}")))?
            .port(config.port)
            .credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ))
            .build();

        Ok(Self {
            transport,
            from: config.from.clone(),
        })
    }

    pub async fn send(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
        text_body: &str,
    ) -> Result<(), ApiError> {
        let message = Message::builder()
            .from(self
                .from
                .parse()
                .map_err(|e| ApiError::Config(format!("invalid sender address: {e}")))?)
            .to(to
                .parse()
                .map_err(|e| ApiError::InvalidInput(format!("invalid recipient address: {e}")))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )
            .map_err(|e| ApiError::InvalidInput(format!("could not build message: {e}")))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| ApiError::GatewayUnavailable(format!("mail dispatch failed: {e}")))?;

        Ok(())
    }
}
