// src/lifecycle.rs
//
// Orchestration of the purchase -> settlement -> provisioning -> pairing ->
// retirement workflow. All coordination goes through the Ledger; the two
// gateway traits are the seams to the payment provider and the WhatsApp
// pairing API.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Months, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::error::ApiError;
use crate::ledger::{Ledger, MarkOutcome, TransitionOutcome, TxOutcome};
use crate::models::{Instance, InstanceStatus, TransactionStatus, PENDING_PHONE};

#[derive(Debug, Clone)]
pub struct InitializedPayment {
    pub authorization_url: String,
    pub reference: String,
}

#[derive(Debug, Clone)]
pub struct PaymentVerification {
    pub success: bool,
    pub plan_type: Option<String>,
    pub plan_duration_months: Option<i32>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn configured(&self) -> bool {
        true
    }

    async fn initialize(
        &self,
        email: &str,
        amount_major: i64,
        reference: Uuid,
        plan_type: &str,
        plan_duration_months: i32,
    ) -> Result<InitializedPayment, ApiError>;

    /// Failure to reach the provider must surface as `GatewayUnavailable`,
    /// never as a failed verification: the provider may already hold the
    /// money, and the caller has to be able to retry.
    async fn verify(&self, reference: &str) -> Result<PaymentVerification, ApiError>;
}

#[async_trait]
pub trait PairingGateway: Send + Sync {
    async fn request_pairing_code(&self, phone: &str) -> Result<String, ApiError>;

    async fn request_unpair(&self, phone: &str) -> Result<(), ApiError>;
}

#[derive(Debug, Clone)]
pub struct PurchaseInitiated {
    pub transaction_id: Uuid,
    pub authorization_url: String,
    pub reference: String,
}

#[derive(Debug, Clone)]
pub struct ConfirmedPurchase {
    pub instance_id: Uuid,
    /// True when this call found the transaction already settled and the
    /// instance already linked (duplicate webhook, double click).
    pub already_provisioned: bool,
}

#[derive(Debug, Clone)]
pub struct PairingResult {
    pub pairing_code: String,
    /// True when the code was synthesized locally because the upstream
    /// pairing call failed; it may not correspond to a real session.
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub struct RetireOutcome {
    pub status: InstanceStatus,
    /// False when the instance was already terminal and nothing happened.
    pub changed: bool,
}

#[derive(Clone)]
pub struct LifecycleService {
    ledger: Arc<dyn Ledger>,
    payments: Arc<dyn PaymentGateway>,
    pairing: Arc<dyn PairingGateway>,
}

impl LifecycleService {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        payments: Arc<dyn PaymentGateway>,
        pairing: Arc<dyn PairingGateway>,
    ) -> Self {
        Self {
            ledger,
            payments,
            pairing,
        }
    }

    /// Creates the pending transaction BEFORE touching the payment provider,
    /// so a store failure never leaves a payment intent pointing at a
    /// missing local record.
    pub async fn initiate_purchase(
        &self,
        user_id: Uuid,
        email: &str,
        amount: i64,
        plan_type: &str,
        plan_duration_months: i32,
    ) -> Result<PurchaseInitiated, ApiError> {
        if amount <= 0 {
            return Err(ApiError::InvalidInput(
                "amount must be a positive integer".to_string(),
            ));
        }
        if plan_duration_months < 1 {
            return Err(ApiError::InvalidInput(
                "plan duration must be at least one month".to_string(),
            ));
        }
        if !self.payments.configured() {
            return Err(ApiError::Config(
                "payment gateway is not configured".to_string(),
            ));
        }

        let tx = self
            .ledger
            .create_transaction(user_id, amount, plan_type)
            .await?;

        let initialized = self
            .payments
            .initialize(email, amount, tx.id, plan_type, plan_duration_months)
            .await?;

        self.ledger
            .set_payment_reference(tx.id, &initialized.reference)
            .await?;

        log::info!(
            "purchase initiated user={user_id} tx={} plan={plan_type} months={plan_duration_months}",
            tx.id
        );

        Ok(PurchaseInitiated {
            transaction_id: tx.id,
            authorization_url: initialized.authorization_url,
            reference: initialized.reference,
        })
    }

    /// Settles a transaction by its gateway reference and provisions the
    /// funded instance. Safe to call any number of times with the same
    /// reference: the settlement write is conditional, and a reference that
    /// already produced an instance returns that instance instead of a
    /// duplicate.
    pub async fn confirm_purchase(&self, reference: &str) -> Result<ConfirmedPurchase, ApiError> {
        let tx_id = Uuid::parse_str(reference)
            .map_err(|_| ApiError::InvalidInput("invalid payment reference".to_string()))?;

        let verification = self.payments.verify(reference).await?;

        if !verification.success {
            if let MarkOutcome::AlreadyTerminal(tx) = self
                .ledger
                .mark_transaction_terminal(tx_id, TxOutcome::Failed)
                .await?
            {
                // A settled success outlives a flapping gateway answer.
                if tx.status == TransactionStatus::Success {
                    if let Some(instance_id) = tx.instance_id {
                        return Ok(ConfirmedPurchase {
                            instance_id,
                            already_provisioned: true,
                        });
                    }
                }
            }
            return Err(ApiError::GatewayRejected(
                "payment not successful".to_string(),
            ));
        }

        // Validate plan metadata before settling; a success with unusable
        // metadata stays pending and retryable.
        let months = verification
            .plan_duration_months
            .filter(|m| *m >= 1)
            .ok_or_else(|| {
                ApiError::GatewayUnavailable(
                    "verification response missing plan metadata".to_string(),
                )
            })?;

        match self
            .ledger
            .mark_transaction_terminal(tx_id, TxOutcome::Success)
            .await?
        {
            MarkOutcome::Updated(tx) => {
                let plan_type = verification
                    .plan_type
                    .unwrap_or_else(|| tx.plan_type.clone());
                let expires_at = expiry_from(Utc::now(), months)?;
                let instance = self
                    .ledger
                    .create_instance(tx.user_id, &plan_type, months, expires_at)
                    .await?;
                self.ledger.link_instance(tx.id, instance.id).await?;

                log::info!(
                    "transaction {} settled, instance {} provisioned for user {}",
                    tx.id,
                    instance.id,
                    tx.user_id
                );

                Ok(ConfirmedPurchase {
                    instance_id: instance.id,
                    already_provisioned: false,
                })
            }
            MarkOutcome::AlreadyTerminal(tx) => match (tx.status, tx.instance_id) {
                (TransactionStatus::Success, Some(instance_id)) => Ok(ConfirmedPurchase {
                    instance_id,
                    already_provisioned: true,
                }),
                (TransactionStatus::Success, None) => Err(ApiError::Persistence(
                    "instance provisioning in progress, retry verification".to_string(),
                )),
                _ => Err(ApiError::GatewayRejected(
                    "payment not successful".to_string(),
                )),
            },
        }
    }

    /// Pairs an active instance to a phone number. The upstream pairing call
    /// is allowed to fail: the user still gets a locally synthesized 6-digit
    /// code, and the instance is flagged degraded so the discrepancy stays
    /// visible.
    pub async fn pair_phone_number(
        &self,
        user_id: Uuid,
        instance_id: Uuid,
        raw_phone: &str,
    ) -> Result<PairingResult, ApiError> {
        let phone = normalize_phone(raw_phone)?;

        let instance = self
            .ledger
            .find_instance(instance_id)
            .await?
            .filter(|i| i.user_id == user_id && i.status == InstanceStatus::Active)
            .ok_or_else(|| ApiError::NotFound("instance not found or not active".to_string()))?;

        let (code, degraded) = match self.pairing.request_pairing_code(&phone).await {
            Ok(code) => (code, false),
            Err(e) => {
                let fallback = fallback_pairing_code();
                log::warn!(
                    "pairing gateway failed for instance {}, issuing fallback code: {e}",
                    instance.id
                );
                (fallback, true)
            }
        };

        self.ledger
            .set_instance_phone(instance.id, &phone, &code, degraded)
            .await?;

        Ok(PairingResult {
            pairing_code: code,
            degraded,
        })
    }

    /// Retires an active instance. The conditional status write happens
    /// first, so a repeated call (or a race with another retire) is a no-op
    /// and never produces a second unpair attempt. Unpairing is best-effort
    /// cleanup and never blocks the transition.
    pub async fn retire_instance(
        &self,
        user_id: Uuid,
        instance_id: Uuid,
        target: InstanceStatus,
        admin_override: bool,
    ) -> Result<RetireOutcome, ApiError> {
        if !target.is_terminal() {
            return Err(ApiError::InvalidInput(
                "target status must be expired or deleted".to_string(),
            ));
        }

        let instance = self
            .ledger
            .find_instance(instance_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("instance not found".to_string()))?;

        // Ownership failures are indistinguishable from missing rows.
        if !admin_override && instance.user_id != user_id {
            return Err(ApiError::NotFound("instance not found".to_string()));
        }

        match self.ledger.transition_instance(instance_id, target).await? {
            TransitionOutcome::AlreadyTerminal(current) => {
                log::info!(
                    "retire on instance {} skipped, already {}",
                    current.id,
                    current.status
                );
                Ok(RetireOutcome {
                    status: current.status,
                    changed: false,
                })
            }
            TransitionOutcome::Transitioned(updated) => {
                if instance.phone_number != PENDING_PHONE {
                    if let Err(e) = self.pairing.request_unpair(&instance.phone_number).await {
                        log::warn!(
                            "unpair failed for instance {} (non-fatal): {e}",
                            instance.id
                        );
                    }
                }
                log::info!("instance {} retired to {}", updated.id, updated.status);
                Ok(RetireOutcome {
                    status: updated.status,
                    changed: true,
                })
            }
        }
    }

    /// Administrative grant: provisions an instance with no payment trail.
    pub async fn force_create_instance(
        &self,
        user_id: Uuid,
        plan_type: &str,
        plan_duration_months: i32,
    ) -> Result<Instance, ApiError> {
        if plan_duration_months < 1 {
            return Err(ApiError::InvalidInput(
                "plan duration must be at least one month".to_string(),
            ));
        }
        let expires_at = expiry_from(Utc::now(), plan_duration_months)?;
        let instance = self
            .ledger
            .create_instance(user_id, plan_type, plan_duration_months, expires_at)
            .await?;
        log::info!(
            "admin grant: instance {} created for user {user_id}",
            instance.id
        );
        Ok(instance)
    }

    pub async fn instances_for_user(&self, user_id: Uuid) -> Result<Vec<Instance>, ApiError> {
        self.ledger.list_instances_for_user(user_id).await
    }
}

/// Calendar-month expiry arithmetic with day-of-month clamping: Oct 31 plus
/// four months lands on the last day of February.
pub fn expiry_from(start: DateTime<Utc>, months: i32) -> Result<DateTime<Utc>, ApiError> {
    start
        .checked_add_months(Months::new(months as u32))
        .ok_or_else(|| ApiError::InvalidInput("plan duration out of range".to_string()))
}

/// Strips everything but digits and enforces the 10..=15 length window.
pub fn normalize_phone(raw: &str) -> Result<String, ApiError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() < 10 || digits.len() > 15 {
        return Err(ApiError::InvalidInput(
            "phone number must contain 10 to 15 digits".to_string(),
        ));
    }
    Ok(digits)
}

fn fallback_pairing_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn normalize_strips_formatting() {
        assert_eq!(
            normalize_phone("+234 810 000 0000").unwrap(),
            "2348100000000"
        );
    }

    #[test]
    fn normalize_rejects_short_numbers() {
        assert!(matches!(
            normalize_phone("123"),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn normalize_rejects_overlong_numbers() {
        assert!(matches!(
            normalize_phone("1234567890123456"),
            Err(ApiError::InvalidInput(_))
        ));
    }

    #[test]
    fn expiry_clamps_month_end_over_year_boundary() {
        let start = Utc.with_ymd_and_hms(2024, 10, 31, 12, 0, 0).unwrap();
        let expires = expiry_from(start, 4).unwrap();
        assert_eq!(
            expires,
            Utc.with_ymd_and_hms(2025, 2, 28, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn expiry_lands_on_leap_day() {
        let start = Utc.with_ymd_and_hms(2023, 12, 31, 0, 0, 0).unwrap();
        let expires = expiry_from(start, 2).unwrap();
        assert_eq!(expires, Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn fallback_codes_are_six_digits() {
        for _ in 0..32 {
            let code = fallback_pairing_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
