// src/sweep.rs

use sqlx::PgPool;
use std::time::Duration;

/// Periodic reconciliation: instances past their expiry move from `active`
/// to `expired` in one conditional bulk write. Expiration is otherwise only
/// computed, never enforced.
pub fn start_expiration_sweep(pool: PgPool, interval_secs: u64) {
    tokio::spawn(async move {
        loop {
            match expire_overdue(&pool).await {
                Ok(0) => {}
                Ok(n) => log::info!("expiration sweep retired {n} instances"),
                Err(e) => log::error!("expiration sweep error: {e}"),
            }
            tokio::time::sleep(Duration::from_secs(interval_secs)).await;
        }
    });
}

async fn expire_overdue(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"UPDATE instances SET status = 'expired'
           WHERE status = 'active' AND expires_at < NOW()"#,
    )
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
