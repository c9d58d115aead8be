use sea_orm::{
    ConnectionTrait, DatabaseTransaction, DbBackend, Statement, TransactionTrait, Value,
};

use crate::config::AdvisoryLockStrategy;
use crate::error::ClosureTreeError;

/// Transaction wrapping one structural mutation.
///
/// On PostgreSQL the transaction also holds a transaction-scoped advisory
/// lock, so mutations of the same closure table are serialized and the lock
/// is released by commit or rollback. Opened on an existing transaction it
/// becomes a savepoint.
pub struct LockedTransaction {
    txn: DatabaseTransaction,
}

impl LockedTransaction {
    pub async fn acquire<C>(strategy: &AdvisoryLockStrategy, db: &C) -> Result<Self, ClosureTreeError>
    where
        C: ConnectionTrait + TransactionTrait,
    {
        let backend = db.get_database_backend();
        let txn = db.begin().await.map_err(ClosureTreeError::Transaction)?;

        if backend == DbBackend::Postgres {
            if let Some(key) = strategy.key() {
                if let Err(err) = acquire_lock(&txn, key.as_str()).await {
                    let _ = txn.rollback().await;
                    return Err(err);
                }
            }
        }

        Ok(Self { txn })
    }

    pub fn connection(&self) -> &DatabaseTransaction {
        &self.txn
    }

    pub async fn commit(self) -> Result<(), ClosureTreeError> {
        self.txn.commit().await.map_err(ClosureTreeError::Transaction)
    }

    pub async fn rollback(self) -> Result<(), ClosureTreeError> {
        self.txn
            .rollback()
            .await
            .map_err(ClosureTreeError::Transaction)
    }

    /// Commits when `result` is `Ok`, rolls back otherwise and hands the
    /// original error back.
    pub async fn finish<T>(
        self,
        result: Result<T, ClosureTreeError>,
    ) -> Result<T, ClosureTreeError> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = self.rollback().await {
                    tracing::warn!("rollback after failed mutation also failed: {}", rollback_err);
                }
                Err(err)
            }
        }
    }
}

async fn acquire_lock(txn: &DatabaseTransaction, key: &str) -> Result<(), ClosureTreeError> {
    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "SELECT pg_advisory_xact_lock(hashtext($1))",
        vec![Value::from(key)],
    ))
    .await?;
    Ok(())
}
