use crate::{Error, Result};
use futures::stream::BoxStream;
use futures::{Stream, StreamExt, TryStreamExt};
use sqlx::postgres::{PgRow, Postgres};
use sqlx::{ColumnIndex, Decode, Row as _, Type};
use std::pin::Pin;
use std::task::{Context, Poll};

/// Rows is a forward-only, single-pass stream of result rows.
///
/// Rows of a pooled query are fetched from the server as the stream is
/// read. The first row is fetched before Rows is returned, so failures to
/// execute the statement are reported by the query itself. Once a row has
/// been yielded it cannot be revisited.
pub struct Rows {
    head: Option<PgRow>,
    tail: BoxStream<'static, Result<PgRow>>,
}

impl Rows {
    /// Rows which have already been read in full.
    pub(crate) fn buffered(rows: Vec<PgRow>) -> Self {
        Self {
            head: None,
            tail: futures::stream::iter(rows.into_iter().map(Ok)).boxed(),
        }
    }

    /// Begin reading `stream`, failing if its first step fails.
    pub(crate) async fn prefetch<S>(stream: S) -> Result<Self>
    where
        S: Stream<Item = Result<PgRow>> + Send + 'static,
    {
        let mut tail = stream.boxed();
        let head = tail.try_next().await?;

        Ok(Self { head, tail })
    }

    /// Read all remaining rows.
    pub async fn collect_all(self) -> Result<Vec<PgRow>> {
        self.try_collect().await
    }
}

impl Stream for Rows {
    type Item = Result<PgRow>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(row) = self.head.take() {
            return Poll::Ready(Some(Ok(row)));
        }
        self.tail.poll_next_unpin(cx)
    }
}

impl std::fmt::Debug for Rows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows").finish_non_exhaustive()
    }
}

/// Row is the outcome of a single-row query.
///
/// Failure of the query is deferred until the Row is read:
/// a statement that produced no rows yields `sqlx::Error::RowNotFound`,
/// and a statement which failed to execute yields its execution error,
/// exactly as the driver reported it.
pub struct Row {
    inner: Result<PgRow>,
}

impl Row {
    pub(crate) fn from_error(err: impl Into<Error>) -> Self {
        Self {
            inner: Err(err.into()),
        }
    }

    /// Decode column `index` of the row, consuming it.
    pub fn try_get<T, I>(self, index: I) -> Result<T>
    where
        T: for<'r> Decode<'r, Postgres> + Type<Postgres>,
        I: ColumnIndex<PgRow>,
    {
        let row = self.inner?;
        Ok(row.try_get::<T, I>(index)?)
    }

    /// Take the underlying row, or the error which prevented it.
    pub fn into_inner(self) -> Result<PgRow> {
        self.inner
    }

    /// True if the statement produced a row.
    pub fn is_ok(&self) -> bool {
        self.inner.is_ok()
    }
}

impl std::fmt::Debug for Row {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Ok(row) => f.debug_tuple("Row").field(&row.len()).finish(),
            Err(err) => f.debug_tuple("Row").field(err).finish(),
        }
    }
}

impl From<sqlx::Result<PgRow>> for Row {
    fn from(inner: sqlx::Result<PgRow>) -> Self {
        Self {
            inner: inner.map_err(Error::from),
        }
    }
}

impl From<Result<PgRow>> for Row {
    fn from(inner: Result<PgRow>) -> Self {
        Self { inner }
    }
}
