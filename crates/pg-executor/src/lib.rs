//! Context-scoped selection of the executor which runs a database operation.
//!
//! Application code runs its statements through an [`Executor`], and asks a
//! [`Manager`] which one to use for its current [`Context`]. The owner of a
//! unit of work may inject a transaction or a batch into the Context, and
//! everything downstream of it then transparently joins that transaction or
//! queues into that batch:
//!
//! ```ignore
//! let txn = PgTransaction::begin(manager.pool()).await?;
//! let ctx = manager.inject_transaction(&ctx, txn.clone());
//!
//! create_user(&manager, &ctx, "alice").await?;
//! txn.commit().await?;
//!
//! async fn create_user(manager: &Manager, ctx: &Context, name: &str) -> Result<()> {
//!     manager
//!         .executor(ctx)
//!         .exec("insert into users (name) values ($1)", &[name.into()])
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! A batch takes precedence over a transaction, which takes precedence over
//! the shared connection pool.

mod batch;
mod config;
mod context;
mod copy;
mod error;
mod manager;
mod pool;
mod rows;
mod transaction;
mod value;

pub use batch::{Batch, BatchExecutor, BatchResults, Statement};
pub use config::PoolConfig;
pub use context::Context;
pub use copy::{CopyFromIter, CopyFromRows, CopyFromSource, Identifier};
pub use error::{Error, Result};
pub use manager::{ExecutorRef, Manager};
pub use pool::PoolExecutor;
pub use rows::{Row, Rows};
pub use transaction::{PgTransaction, Transaction};
pub use value::Value;

/// CommandTag reports the completion of a statement.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommandTag {
    rows_affected: u64,
    queued: bool,
}

impl CommandTag {
    pub fn new(rows_affected: u64) -> Self {
        Self {
            rows_affected,
            queued: false,
        }
    }

    /// Tag of a statement which was queued into a batch rather than run.
    pub fn queued() -> Self {
        Self {
            rows_affected: 0,
            queued: true,
        }
    }

    pub fn rows_affected(&self) -> u64 {
        self.rows_affected
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }
}

/// Executor runs database operations.
///
/// Errors of the database driver are returned unmodified as `Error::Sqlx`.
#[async_trait::async_trait]
pub trait Executor: Send + Sync {
    /// Run a statement which returns no rows.
    async fn exec(&self, sql: &str, args: &[Value]) -> Result<CommandTag>;

    /// Run a statement and return its rows.
    async fn query(&self, sql: &str, args: &[Value]) -> Result<Rows>;

    /// Run a statement which returns at most one row.
    /// Errors are deferred until the Row is read.
    async fn query_row(&self, sql: &str, args: &[Value]) -> Row;

    /// Run the statements of `batch`, returning one result per statement.
    async fn send_batch(&self, batch: &Batch) -> BatchResults;

    /// Bulk-load rows of `source` into `columns` of `table`,
    /// returning the number of rows copied.
    async fn copy_from(
        &self,
        table: &Identifier,
        columns: &[&str],
        source: &mut dyn CopyFromSource,
    ) -> Result<u64>;
}
