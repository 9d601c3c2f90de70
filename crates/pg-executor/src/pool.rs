use crate::batch::{self, Batch, BatchResults};
use crate::copy::{self, CopyFromSource, Identifier};
use crate::rows::{Row, Rows};
use crate::{value, CommandTag, Error, Executor, Result, Value};
use async_stream::try_stream;
use futures::TryStreamExt;
use sqlx::postgres::PgPool;

/// PoolExecutor runs each operation on a connection of the shared pool,
/// outside of any transaction. Connections are acquired and released by
/// the pool itself.
#[derive(Debug, Clone)]
pub struct PoolExecutor {
    pool: PgPool,
}

impl PoolExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Executor for PoolExecutor {
    async fn exec(&self, sql: &str, args: &[Value]) -> Result<CommandTag> {
        let done = value::query(sql, args).execute(&self.pool).await?;
        Ok(CommandTag::new(done.rows_affected()))
    }

    // Rows are streamed from a pooled connection, which is held until
    // the Rows are read to completion or dropped.
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows> {
        let (pool, sql, args) = (self.pool.clone(), sql.to_string(), args.to_vec());

        Rows::prefetch(try_stream! {
            let mut rows = value::query(&sql, &args).fetch(&pool);
            while let Some(row) = rows.try_next().await.map_err(Error::from)? {
                yield row;
            }
        })
        .await
    }

    async fn query_row(&self, sql: &str, args: &[Value]) -> Row {
        Row::from(value::query(sql, args).fetch_one(&self.pool).await)
    }

    // A batch dispatched on the pool runs within its own implicit transaction:
    // either every statement applies, or none do.
    async fn send_batch(&self, batch: &Batch) -> BatchResults {
        if batch.is_empty() {
            return BatchResults::default();
        }
        let mut txn = match self.pool.begin().await {
            Ok(txn) => txn,
            Err(err) => return BatchResults::failed(err, batch.len()),
        };

        let mut results = batch::dispatch(&mut txn, batch).await;

        let finished = if results.failed_at().is_some() {
            txn.rollback().await
        } else {
            txn.commit().await
        };
        if let Err(err) = finished {
            results = BatchResults::failed(err, batch.len());
        }
        results
    }

    async fn copy_from(
        &self,
        table: &Identifier,
        columns: &[&str],
        source: &mut dyn CopyFromSource,
    ) -> Result<u64> {
        let statement = copy::copy_statement(table, columns);
        let copy_in = self.pool.copy_in_raw(&statement).await?;

        copy::copy_in(copy_in, columns.len(), source).await
    }
}
