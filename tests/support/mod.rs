use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use whatsme_control::error::ApiError;
use whatsme_control::ledger::{Ledger, MarkOutcome, TransitionOutcome, TxOutcome};
use whatsme_control::lifecycle::{
    InitializedPayment, LifecycleService, PairingGateway, PaymentGateway, PaymentVerification,
};
use whatsme_control::models::{
    Instance, InstanceStatus, Transaction, TransactionStatus, PENDING_PHONE,
};

#[derive(Default)]
struct Store {
    transactions: HashMap<Uuid, Transaction>,
    instances: HashMap<Uuid, Instance>,
}

/// In-memory ledger mirroring the conditional-write semantics of the
/// Postgres implementation: terminal rows never change again.
#[derive(Default)]
pub struct InMemoryLedger {
    inner: Mutex<Store>,
}

impl InMemoryLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn transaction_count(&self) -> usize {
        self.inner.lock().await.transactions.len()
    }

    pub async fn instance_count(&self) -> usize {
        self.inner.lock().await.instances.len()
    }

    pub async fn get_transaction(&self, id: Uuid) -> Option<Transaction> {
        self.inner.lock().await.transactions.get(&id).cloned()
    }

    pub async fn get_instance(&self, id: Uuid) -> Option<Instance> {
        self.inner.lock().await.instances.get(&id).cloned()
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    async fn create_transaction(
        &self,
        user_id: Uuid,
        amount: i64,
        plan_type: &str,
    ) -> Result<Transaction, ApiError> {
        let tx = Transaction {
            id: Uuid::new_v4(),
            user_id,
            amount,
            plan_type: plan_type.to_string(),
            status: TransactionStatus::Pending,
            payment_reference: None,
            instance_id: None,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .await
            .transactions
            .insert(tx.id, tx.clone());
        Ok(tx)
    }

    async fn set_payment_reference(&self, tx_id: Uuid, reference: &str) -> Result<(), ApiError> {
        if let Some(tx) = self.inner.lock().await.transactions.get_mut(&tx_id) {
            tx.payment_reference = Some(reference.to_string());
        }
        Ok(())
    }

    async fn find_transaction(&self, tx_id: Uuid) -> Result<Option<Transaction>, ApiError> {
        Ok(self.inner.lock().await.transactions.get(&tx_id).cloned())
    }

    async fn mark_transaction_terminal(
        &self,
        tx_id: Uuid,
        outcome: TxOutcome,
    ) -> Result<MarkOutcome, ApiError> {
        let mut store = self.inner.lock().await;
        let tx = store
            .transactions
            .get_mut(&tx_id)
            .ok_or_else(|| ApiError::NotFound("transaction not found".to_string()))?;

        if tx.status == TransactionStatus::Pending {
            tx.status = outcome.status();
            Ok(MarkOutcome::Updated(tx.clone()))
        } else {
            Ok(MarkOutcome::AlreadyTerminal(tx.clone()))
        }
    }

    async fn create_instance(
        &self,
        user_id: Uuid,
        plan_type: &str,
        plan_duration_months: i32,
        expires_at: DateTime<Utc>,
    ) -> Result<Instance, ApiError> {
        let instance = Instance {
            id: Uuid::new_v4(),
            user_id,
            phone_number: PENDING_PHONE.to_string(),
            plan_type: plan_type.to_string(),
            plan_duration_months,
            status: InstanceStatus::Active,
            pairing_code: None,
            pairing_degraded: false,
            expires_at,
            created_at: Utc::now(),
        };
        self.inner
            .lock()
            .await
            .instances
            .insert(instance.id, instance.clone());
        Ok(instance)
    }

    async fn link_instance(&self, tx_id: Uuid, instance_id: Uuid) -> Result<(), ApiError> {
        if let Some(tx) = self.inner.lock().await.transactions.get_mut(&tx_id) {
            tx.instance_id = Some(instance_id);
        }
        Ok(())
    }

    async fn find_instance(&self, instance_id: Uuid) -> Result<Option<Instance>, ApiError> {
        Ok(self.inner.lock().await.instances.get(&instance_id).cloned())
    }

    async fn set_instance_phone(
        &self,
        instance_id: Uuid,
        phone: &str,
        pairing_code: &str,
        degraded: bool,
    ) -> Result<(), ApiError> {
        if let Some(instance) = self.inner.lock().await.instances.get_mut(&instance_id) {
            instance.phone_number = phone.to_string();
            instance.pairing_code = Some(pairing_code.to_string());
            instance.pairing_degraded = degraded;
        }
        Ok(())
    }

    async fn transition_instance(
        &self,
        instance_id: Uuid,
        target: InstanceStatus,
    ) -> Result<TransitionOutcome, ApiError> {
        if !target.is_terminal() {
            return Err(ApiError::InvalidInput(
                "instances cannot transition back to active".to_string(),
            ));
        }

        let mut store = self.inner.lock().await;
        let instance = store
            .instances
            .get_mut(&instance_id)
            .ok_or_else(|| ApiError::NotFound("instance not found".to_string()))?;

        if instance.status == InstanceStatus::Active {
            instance.status = target;
            Ok(TransitionOutcome::Transitioned(instance.clone()))
        } else {
            Ok(TransitionOutcome::AlreadyTerminal(instance.clone()))
        }
    }

    async fn list_instances_for_user(&self, user_id: Uuid) -> Result<Vec<Instance>, ApiError> {
        Ok(self
            .inner
            .lock()
            .await
            .instances
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn list_all_instances(&self) -> Result<Vec<Instance>, ApiError> {
        Ok(self.inner.lock().await.instances.values().cloned().collect())
    }

    async fn list_all_transactions(&self) -> Result<Vec<Transaction>, ApiError> {
        Ok(self
            .inner
            .lock()
            .await
            .transactions
            .values()
            .cloned()
            .collect())
    }
}

pub enum VerifyBehavior {
    Success {
        plan_type: &'static str,
        months: i32,
    },
    SuccessWithoutMetadata,
    Failure,
    Unavailable,
}

pub struct StubPaymentGateway {
    behavior: VerifyBehavior,
    fail_initialize: bool,
    unconfigured: bool,
    pub initialize_calls: AtomicUsize,
}

impl StubPaymentGateway {
    pub fn success(plan_type: &'static str, months: i32) -> Arc<Self> {
        Arc::new(Self {
            behavior: VerifyBehavior::Success { plan_type, months },
            fail_initialize: false,
            unconfigured: false,
            initialize_calls: AtomicUsize::new(0),
        })
    }

    pub fn with_behavior(behavior: VerifyBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            fail_initialize: false,
            unconfigured: false,
            initialize_calls: AtomicUsize::new(0),
        })
    }

    pub fn failing_initialize() -> Arc<Self> {
        Arc::new(Self {
            behavior: VerifyBehavior::Failure,
            fail_initialize: true,
            unconfigured: false,
            initialize_calls: AtomicUsize::new(0),
        })
    }

    pub fn unconfigured() -> Arc<Self> {
        Arc::new(Self {
            behavior: VerifyBehavior::Failure,
            fail_initialize: false,
            unconfigured: true,
            initialize_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PaymentGateway for StubPaymentGateway {
    fn configured(&self) -> bool {
        !self.unconfigured
    }

    async fn initialize(
        &self,
        _email: &str,
        _amount_major: i64,
        reference: Uuid,
        _plan_type: &str,
        _plan_duration_months: i32,
    ) -> Result<InitializedPayment, ApiError> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_initialize {
            return Err(ApiError::GatewayUnavailable(
                "stub initialize down".to_string(),
            ));
        }
        Ok(InitializedPayment {
            authorization_url: format!("https://checkout.example/{reference}"),
            reference: reference.to_string(),
        })
    }

    async fn verify(&self, _reference: &str) -> Result<PaymentVerification, ApiError> {
        match &self.behavior {
            VerifyBehavior::Success { plan_type, months } => Ok(PaymentVerification {
                success: true,
                plan_type: Some(plan_type.to_string()),
                plan_duration_months: Some(*months),
            }),
            VerifyBehavior::SuccessWithoutMetadata => Ok(PaymentVerification {
                success: true,
                plan_type: None,
                plan_duration_months: None,
            }),
            VerifyBehavior::Failure => Ok(PaymentVerification {
                success: false,
                plan_type: None,
                plan_duration_months: None,
            }),
            VerifyBehavior::Unavailable => Err(ApiError::GatewayUnavailable(
                "stub verify down".to_string(),
            )),
        }
    }
}

pub struct StubPairingGateway {
    fail_pairing: bool,
    pub pair_calls: AtomicUsize,
    pub unpair_calls: AtomicUsize,
}

impl StubPairingGateway {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self {
            fail_pairing: false,
            pair_calls: AtomicUsize::new(0),
            unpair_calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail_pairing: true,
            pair_calls: AtomicUsize::new(0),
            unpair_calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PairingGateway for StubPairingGateway {
    async fn request_pairing_code(&self, _phone: &str) -> Result<String, ApiError> {
        self.pair_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_pairing {
            return Err(ApiError::GatewayUnavailable(
                "stub pairing down".to_string(),
            ));
        }
        Ok("654321".to_string())
    }

    async fn request_unpair(&self, _phone: &str) -> Result<(), ApiError> {
        self.unpair_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn service(
    ledger: Arc<InMemoryLedger>,
    payments: Arc<StubPaymentGateway>,
    pairing: Arc<StubPairingGateway>,
) -> LifecycleService {
    LifecycleService::new(ledger, payments, pairing)
}
