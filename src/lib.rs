pub mod api;
pub mod config;
pub mod docs;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod mailer;
pub mod models;
pub mod pairing;
pub mod paystack;
pub mod sweep;

use sqlx::PgPool;
use std::sync::Arc;

use crate::ledger::Ledger;
use crate::lifecycle::LifecycleService;
use crate::mailer::Mailer;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub ledger: Arc<dyn Ledger>,
    pub lifecycle: LifecycleService,
    pub mailer: Option<Mailer>,
    pub jwt_secret: String,
}
