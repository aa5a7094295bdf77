// src/ledger.rs
//
// Persistence contract for the two core entities (transactions, instances)
// and its PostgreSQL implementation. Both state machines are enforced here
// with conditional writes: a terminal row can never be updated again, no
// matter how the callers race.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ApiError;
use crate::models::{Instance, InstanceStatus, Transaction, TransactionStatus, PENDING_PHONE};

/// Terminal outcome for a payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    Success,
    Failed,
}

impl TxOutcome {
    pub fn status(&self) -> TransactionStatus {
        match self {
            TxOutcome::Success => TransactionStatus::Success,
            TxOutcome::Failed => TransactionStatus::Failed,
        }
    }
}

/// Result of a conditional transaction settlement write.
#[derive(Debug, Clone)]
pub enum MarkOutcome {
    /// This call won the pending -> terminal transition.
    Updated(Transaction),
    /// The transaction was already terminal; carries the settled row.
    AlreadyTerminal(Transaction),
}

/// Result of a conditional instance status write.
#[derive(Debug, Clone)]
pub enum TransitionOutcome {
    Transitioned(Instance),
    AlreadyTerminal(Instance),
}

#[async_trait]
pub trait Ledger: Send + Sync {
    async fn create_transaction(
        &self,
        user_id: Uuid,
        amount: i64,
        plan_type: &str,
    ) -> Result<Transaction, ApiError>;

    async fn set_payment_reference(&self, tx_id: Uuid, reference: &str) -> Result<(), ApiError>;

    async fn find_transaction(&self, tx_id: Uuid) -> Result<Option<Transaction>, ApiError>;

    /// Settles a pending transaction. The write is conditional on the current
    /// status, so concurrent callers cannot both win; the loser sees
    /// [`MarkOutcome::AlreadyTerminal`] with the settled row.
    async fn mark_transaction_terminal(
        &self,
        tx_id: Uuid,
        outcome: TxOutcome,
    ) -> Result<MarkOutcome, ApiError>;

    async fn create_instance(
        &self,
        user_id: Uuid,
        plan_type: &str,
        plan_duration_months: i32,
        expires_at: DateTime<Utc>,
    ) -> Result<Instance, ApiError>;

    async fn link_instance(&self, tx_id: Uuid, instance_id: Uuid) -> Result<(), ApiError>;

    async fn find_instance(&self, instance_id: Uuid) -> Result<Option<Instance>, ApiError>;

    async fn set_instance_phone(
        &self,
        instance_id: Uuid,
        phone: &str,
        pairing_code: &str,
        degraded: bool,
    ) -> Result<(), ApiError>;

    /// Moves an active instance to a terminal status. Only `active ->
    /// expired` and `active -> deleted` are legal; the status is re-checked
    /// at write time, not merely at read time.
    async fn transition_instance(
        &self,
        instance_id: Uuid,
        target: InstanceStatus,
    ) -> Result<TransitionOutcome, ApiError>;

    async fn list_instances_for_user(&self, user_id: Uuid) -> Result<Vec<Instance>, ApiError>;

    async fn list_all_instances(&self) -> Result<Vec<Instance>, ApiError>;

    async fn list_all_transactions(&self) -> Result<Vec<Transaction>, ApiError>;
}

pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const TX_COLUMNS: &str =
    "id, user_id, amount, plan_type, status, payment_reference, instance_id, created_at";
const INSTANCE_COLUMNS: &str = "id, user_id, phone_number, plan_type, plan_duration_months, \
     status, pairing_code, pairing_degraded, expires_at, created_at";

fn map_transaction(row: &PgRow) -> Result<Transaction, ApiError> {
    let status: String = row.get("status");
    Ok(Transaction {
        id: row.get("id"),
        user_id: row.get("user_id"),
        amount: row.get("amount"),
        plan_type: row.get("plan_type"),
        status: status.parse().map_err(ApiError::Persistence)?,
        payment_reference: row.get("payment_reference"),
        instance_id: row.get("instance_id"),
        created_at: row.get("created_at"),
    })
}

fn map_instance(row: &PgRow) -> Result<Instance, ApiError> {
    let status: String = row.get("status");
    Ok(Instance {
        id: row.get("id"),
        user_id: row.get("user_id"),
        phone_number: row.get("phone_number"),
        plan_type: row.get("plan_type"),
        plan_duration_months: row.get("plan_duration_months"),
        status: status.parse().map_err(ApiError::Persistence)?,
        pairing_code: row.get("pairing_code"),
        pairing_degraded: row.get("pairing_degraded"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    })
}

#[async_trait]
impl Ledger for PgLedger {
    async fn create_transaction(
        &self,
        user_id: Uuid,
        amount: i64,
        plan_type: &str,
    ) -> Result<Transaction, ApiError> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO transactions (user_id, amount, plan_type, status)
               VALUES ($1, $2, $3, 'pending')
               RETURNING {TX_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(amount)
        .bind(plan_type)
        .fetch_one(&self.pool)
        .await?;

        map_transaction(&row)
    }

    async fn set_payment_reference(&self, tx_id: Uuid, reference: &str) -> Result<(), ApiError> {
        sqlx::query("UPDATE transactions SET payment_reference = $2 WHERE id = $1")
            .bind(tx_id)
            .bind(reference)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_transaction(&self, tx_id: Uuid) -> Result<Option<Transaction>, ApiError> {
        let row = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM transactions WHERE id = $1"
        ))
        .bind(tx_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_transaction).transpose()
    }

    async fn mark_transaction_terminal(
        &self,
        tx_id: Uuid,
        outcome: TxOutcome,
    ) -> Result<MarkOutcome, ApiError> {
        let row = sqlx::query(&format!(
            r#"UPDATE transactions SET status = $2
               WHERE id = $1 AND status = 'pending'
               RETURNING {TX_COLUMNS}"#
        ))
        .bind(tx_id)
        .bind(outcome.status().as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(MarkOutcome::Updated(map_transaction(&row)?));
        }

        let settled = self
            .find_transaction(tx_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("transaction not found".to_string()))?;
        Ok(MarkOutcome::AlreadyTerminal(settled))
    }

    async fn create_instance(
        &self,
        user_id: Uuid,
        plan_type: &str,
        plan_duration_months: i32,
        expires_at: DateTime<Utc>,
    ) -> Result<Instance, ApiError> {
        let row = sqlx::query(&format!(
            r#"INSERT INTO instances
               (user_id, phone_number, plan_type, plan_duration_months, status, expires_at)
               VALUES ($1, $2, $3, $4, 'active', $5)
               RETURNING {INSTANCE_COLUMNS}"#
        ))
        .bind(user_id)
        .bind(PENDING_PHONE)
        .bind(plan_type)
        .bind(plan_duration_months)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        map_instance(&row)
    }

    async fn link_instance(&self, tx_id: Uuid, instance_id: Uuid) -> Result<(), ApiError> {
        sqlx::query("UPDATE transactions SET instance_id = $2 WHERE id = $1")
            .bind(tx_id)
            .bind(instance_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn find_instance(&self, instance_id: Uuid) -> Result<Option<Instance>, ApiError> {
        let row = sqlx::query(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM instances WHERE id = $1"
        ))
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(map_instance).transpose()
    }

    async fn set_instance_phone(
        &self,
        instance_id: Uuid,
        phone: &str,
        pairing_code: &str,
        degraded: bool,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r#"UPDATE instances
               SET phone_number = $2, pairing_code = $3, pairing_degraded = $4
               WHERE id = $1"#,
        )
        .bind(instance_id)
        .bind(phone)
        .bind(pairing_code)
        .bind(degraded)
        .execute(&self.pool)
        .await?;
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

        let row = sqlx::query(&format!(
            r#"UPDATE instances SET status = $2
               WHERE id = $1 AND status = 'active'
               RETURNING {INSTANCE_COLUMNS}"#
        ))
        .bind(instance_id)
        .bind(target.as_str())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Ok(TransitionOutcome::Transitioned(map_instance(&row)?));
        }

        let current = self
            .find_instance(instance_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("instance not found".to_string()))?;
        Ok(TransitionOutcome::AlreadyTerminal(current))
    }

    async fn list_instances_for_user(&self, user_id: Uuid) -> Result<Vec<Instance>, ApiError> {
        let rows = sqlx::query(&format!(
            r#"SELECT {INSTANCE_COLUMNS} FROM instances
               WHERE user_id = $1
               ORDER BY created_at DESC"#
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_instance).collect()
    }

    async fn list_all_instances(&self) -> Result<Vec<Instance>, ApiError> {
        let rows = sqlx::query(&format!(
            "SELECT {INSTANCE_COLUMNS} FROM instances ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_instance).collect()
    }

    async fn list_all_transactions(&self) -> Result<Vec<Transaction>, ApiError> {
        let rows = sqlx::query(&format!(
            "SELECT {TX_COLUMNS} FROM transactions ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(map_transaction).collect()
    }
}
