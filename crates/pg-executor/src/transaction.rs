use crate::batch::{self, Batch, BatchResults};
use crate::copy::{self, CopyFromSource, Identifier};
use crate::rows::{Row, Rows};
use crate::{value, CommandTag, Error, Executor, Result, Value};
use sqlx::postgres::{PgPool, Postgres};
use std::sync::Arc;

/// Transaction is an Executor which runs within an open database transaction.
///
/// Transactions are begun and finished by their owner, typically a
/// unit-of-work which injects the Transaction into a Context for the
/// duration of its work.
#[async_trait::async_trait]
pub trait Transaction: Executor {
    /// Commit the transaction. Further operations fail.
    async fn commit(&self) -> Result<()>;
    /// Roll back the transaction. Further operations fail.
    async fn rollback(&self) -> Result<()>;
}

/// PgTransaction is a Transaction over a sqlx Postgres transaction.
///
/// A Postgres connection runs one statement at a time, so operations are
/// serialized through an async lock. Each Executor handed out for a Context
/// shares the same PgTransaction.
pub struct PgTransaction {
    // None once committed or rolled back.
    txn: tokio::sync::Mutex<Option<sqlx::Transaction<'static, Postgres>>>,
}

impl PgTransaction {
    pub fn new(txn: sqlx::Transaction<'static, Postgres>) -> Arc<Self> {
        Arc::new(Self {
            txn: tokio::sync::Mutex::new(Some(txn)),
        })
    }

    /// Begin a new transaction on a connection of `pool`.
    pub async fn begin(pool: &PgPool) -> Result<Arc<Self>> {
        Ok(Self::new(pool.begin().await?))
    }

    /// True if the transaction has not been committed or rolled back.
    pub async fn is_open(&self) -> bool {
        self.txn.lock().await.is_some()
    }
}

impl std::fmt::Debug for PgTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgTransaction").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl Executor for PgTransaction {
    async fn exec(&self, sql: &str, args: &[Value]) -> Result<CommandTag> {
        let mut guard = self.txn.lock().await;
        let txn = guard.as_mut().ok_or(Error::TransactionClosed)?;

        let done = value::query(sql, args).execute(&mut *txn).await?;
        Ok(CommandTag::new(done.rows_affected()))
    }

    async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows> {
        let mut guard = self.txn.lock().await;
        let txn = guard.as_mut().ok_or(Error::TransactionClosed)?;

        // The lock can't be handed out with the Rows, so they're read in full.
        let rows = value::query(sql, args).fetch_all(&mut *txn).await?;
        Ok(Rows::buffered(rows))
    }

    async fn query_row(&self, sql: &str, args: &[Value]) -> Row {
        let mut guard = self.txn.lock().await;
        let Some(txn) = guard.as_mut() else {
            return Row::from_error(Error::TransactionClosed);
        };

        Row::from(value::query(sql, args).fetch_one(&mut *txn).await)
    }

    async fn send_batch(&self, batch: &Batch) -> BatchResults {
        if batch.is_empty() {
            return BatchResults::default();
        }
        let mut guard = self.txn.lock().await;
        let Some(txn) = guard.as_mut() else {
            return BatchResults::failed(Error::TransactionClosed, batch.len());
        };

        batch::dispatch(txn, batch).await
    }

    async fn copy_from(
        &self,
        table: &Identifier,
        columns: &[&str],
        source: &mut dyn CopyFromSource,
    ) -> Result<u64> {
        let mut guard = self.txn.lock().await;
        let txn = guard.as_mut().ok_or(Error::TransactionClosed)?;

        let statement = copy::copy_statement(table, columns);
        let conn: &mut sqlx::postgres::PgConnection = &mut **txn;
        let copy_in = conn.copy_in_raw(&statement).await?;

        copy::copy_in(copy_in, columns.len(), source).await
    }
}

#[async_trait::async_trait]
impl Transaction for PgTransaction {
    async fn commit(&self) -> Result<()> {
        let txn = self.txn.lock().await.take().ok_or(Error::TransactionClosed)?;
        Ok(txn.commit().await?)
    }

    async fn rollback(&self) -> Result<()> {
        let txn = self.txn.lock().await.take().ok_or(Error::TransactionClosed)?;
        Ok(txn.rollback().await?)
    }
}
