//! tokio-postgres implementations of the store traits.
//!
//! Compound operations run as a single statement where Postgres can express
//! them (conditional upsert, `RETURNING` compare-and-set) and otherwise inside
//! a transaction holding a transaction-scoped advisory lock on the logical key.

mod conversations;
mod events;
mod interests;
mod matches;
mod messages;
mod plans;
mod reactions;
mod receipts;
mod usage;

use deadpool_postgres::{Object, Pool, Transaction};

use super::StoreResult;

#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}

impl PgStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    async fn client(&self) -> StoreResult<Object> {
        Ok(self.pool.get().await?)
    }
}

/// Serialize writers on `key` until the surrounding transaction ends.
async fn advisory_lock(tx: &Transaction<'_>, key: &str) -> StoreResult<()> {
    tx.execute("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))", &[&key])
        .await?;
    Ok(())
}
