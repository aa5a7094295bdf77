// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

/// Sentinel phone number carried by an instance from provisioning until a
/// successful pairing call replaces it with real digits.
pub const PENDING_PHONE: &str = "pending";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "success" => Ok(TransactionStatus::Success),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum InstanceStatus {
    Active,
    Expired,
    Deleted,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::Active => "active",
            InstanceStatus::Expired => "expired",
            InstanceStatus::Deleted => "deleted",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, InstanceStatus::Active)
    }
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(InstanceStatus::Active),
            "expired" => Ok(InstanceStatus::Expired),
            "deleted" => Ok(InstanceStatus::Deleted),
            other => Err(format!("unknown instance status: {other}")),
        }
    }
}

/// A payment attempt. The row id doubles as the payment gateway's
/// idempotency reference. Rows are never deleted; `pending` moves to
/// `success` or `failed` exactly once.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Transaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub amount: i64,
    pub plan_type: String,
    pub status: TransactionStatus,
    pub payment_reference: Option<String>,
    pub instance_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// A provisioned WhatsApp instance. `phone_number` holds [`PENDING_PHONE`]
/// until pairing succeeds. `pairing_degraded` marks codes that were
/// synthesized locally because the upstream pairing call failed.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Instance {
    pub id: Uuid,
    pub user_id: Uuid,
    pub phone_number: String,
    pub plan_type: String,
    pub plan_duration_months: i32,
    pub status: InstanceStatus,
    pub pairing_code: Option<String>,
    pub pairing_degraded: bool,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Account view for admin listings. Password hashes never leave the store.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}
