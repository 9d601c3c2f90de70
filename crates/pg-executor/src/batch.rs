use crate::copy::{CopyFromSource, Identifier};
use crate::rows::{Row, Rows};
use crate::{value, CommandTag, Error, Executor, Result, Value};
use futures::TryStreamExt;
use sqlx::postgres::{PgRow, Postgres};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Statement is a single queued SQL statement and its positional arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Batch is an append-only queue of statements which are dispatched together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    statements: Vec<Statement>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a statement for later dispatch.
    pub fn queue(&mut self, sql: impl Into<String>, args: Vec<Value>) -> &mut Self {
        self.statements.push(Statement {
            sql: sql.into(),
            args,
        });
        self
    }

    /// Queue every statement of `other`, in order.
    pub fn extend(&mut self, other: &Batch) -> &mut Self {
        self.statements.extend(other.statements.iter().cloned());
        self
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }
}

/// BatchExecutor is a shareable Batch which is itself an Executor.
///
/// It's placed into a Context so that code further down a call tree
/// queues its statements rather than running them. Statements can only be
/// deferred if nothing is expected back, so `exec` and `send_batch` queue
/// while `query`, `query_row` and `copy_from` fail with `Error::Unsupported`.
/// The owner eventually `take`s the queued Batch and dispatches it with
/// `Executor::send_batch` on a pool or transaction.
#[derive(Debug, Default)]
pub struct BatchExecutor {
    // Never held across an await point.
    queue: Mutex<Batch>,
}

impl BatchExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a statement for later dispatch.
    pub fn queue(&self, sql: impl Into<String>, args: Vec<Value>) {
        self.queue.lock().unwrap().queue(sql, args);
    }

    pub fn len(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    /// Drain queued statements, leaving this BatchExecutor empty.
    pub fn take(&self) -> Batch {
        std::mem::take(&mut *self.queue.lock().unwrap())
    }

    /// Copy of the currently queued statements.
    pub fn snapshot(&self) -> Batch {
        self.queue.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Executor for BatchExecutor {
    async fn exec(&self, sql: &str, args: &[Value]) -> Result<CommandTag> {
        self.queue(sql, args.to_vec());
        Ok(CommandTag::queued())
    }

    async fn query(&self, _sql: &str, _args: &[Value]) -> Result<Rows> {
        Err(Error::Unsupported("query"))
    }

    async fn query_row(&self, _sql: &str, _args: &[Value]) -> Row {
        Row::from_error(Error::Unsupported("query_row"))
    }

    async fn send_batch(&self, batch: &Batch) -> BatchResults {
        self.queue.lock().unwrap().extend(batch);
        BatchResults::default()
    }

    async fn copy_from(
        &self,
        _table: &Identifier,
        _columns: &[&str],
        _source: &mut dyn CopyFromSource,
    ) -> Result<u64> {
        Err(Error::Unsupported("copy_from"))
    }
}

/// Outcome of one dispatched statement.
#[derive(Default)]
pub(crate) struct Outcome {
    pub tag: CommandTag,
    pub rows: Vec<PgRow>,
}

/// BatchResults holds one outcome per dispatched statement, which are read
/// back in the order the statements were queued.
#[derive(Default)]
pub struct BatchResults {
    outcomes: VecDeque<Result<Outcome>>,
    total: usize,
    failed_at: Option<usize>,
}

impl BatchResults {
    fn with_capacity(len: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(len),
            total: 0,
            failed_at: None,
        }
    }

    /// Append the outcome of the next statement.
    /// The first failed outcome marks where the batch was aborted.
    pub(crate) fn record(&mut self, outcome: Result<Outcome>) {
        if outcome.is_err() && self.failed_at.is_none() {
            self.failed_at = Some(self.total);
        }
        self.outcomes.push_back(outcome);
        self.total += 1;
    }

    /// Results of a batch of `len` statements which could not be started.
    /// The first outcome is `err` and the rest are aborted.
    /// An empty batch has no outcomes to fail.
    pub(crate) fn failed(err: impl Into<Error>, len: usize) -> Self {
        let mut results = Self::with_capacity(len);
        if len == 0 {
            return results;
        }
        results.record(Err(err.into()));
        for _ in 1..len {
            results.record(Err(Error::BatchAborted { index: 0 }));
        }
        results
    }

    /// Number of statements in the batch.
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Number of outcomes not yet read.
    pub fn remaining(&self) -> usize {
        self.outcomes.len()
    }

    /// Index of the statement which failed and aborted the batch, if any.
    pub fn failed_at(&self) -> Option<usize> {
        self.failed_at
    }

    fn next(&mut self) -> Result<Outcome> {
        self.outcomes.pop_front().unwrap_or(Err(Error::BatchExhausted))
    }

    /// Read the next outcome as a statement execution.
    pub fn exec(&mut self) -> Result<CommandTag> {
        self.next().map(|outcome| outcome.tag)
    }

    /// Read the next outcome as a query.
    pub fn query(&mut self) -> Result<Rows> {
        self.next().map(|outcome| Rows::buffered(outcome.rows))
    }

    /// Read the next outcome as a single-row query.
    pub fn query_row(&mut self) -> Row {
        match self.next() {
            Ok(outcome) => match outcome.rows.into_iter().next() {
                Some(row) => Row::from(Ok::<_, Error>(row)),
                None => Row::from_error(sqlx::Error::RowNotFound),
            },
            Err(err) => Row::from_error(err),
        }
    }

    /// Discard unread outcomes, returning the first error among them.
    pub fn close(self) -> Result<()> {
        for outcome in self.outcomes {
            outcome?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for BatchResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchResults")
            .field("len", &self.total)
            .field("remaining", &self.outcomes.len())
            .field("failed_at", &self.failed_at)
            .finish()
    }
}

/// Run one statement to completion, collecting its rows and rows affected.
pub(crate) async fn run<'e, E>(executor: E, statement: &Statement) -> sqlx::Result<Outcome>
where
    E: sqlx::Executor<'e, Database = Postgres>,
{
    let mut outcome = Outcome::default();
    let mut stream = value::query(&statement.sql, &statement.args).fetch_many(executor);

    // Each step is either the completion of a statement, or a row it produced.
    while let Some(step) = stream.try_next().await? {
        step.either_with(
            &mut outcome,
            |outcome, done| {
                outcome.tag = CommandTag::new(outcome.tag.rows_affected() + done.rows_affected())
            },
            |outcome, row| outcome.rows.push(row),
        );
    }
    Ok(outcome)
}

/// Run every statement of `batch` within `txn`, in order.
/// Statements after the first failure are not run.
pub(crate) async fn dispatch(
    txn: &mut sqlx::Transaction<'_, Postgres>,
    batch: &Batch,
) -> BatchResults {
    let mut results = BatchResults::with_capacity(batch.len());

    for statement in batch.statements() {
        let outcome = match results.failed_at() {
            Some(index) => Err(Error::BatchAborted { index }),
            None => run(&mut *txn, statement).await.map_err(Error::from),
        };
        results.record(outcome);
    }

    tracing::debug!(
        statements = batch.len(),
        failed_at = ?results.failed_at(),
        "dispatched batch"
    );
    results
}
