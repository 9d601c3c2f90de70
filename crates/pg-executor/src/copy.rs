use crate::{Error, Result, Value};
use sqlx::postgres::{PgConnection, PgCopyIn};
use std::ops::DerefMut;

// Encoded rows are sent to the server whenever this many bytes are buffered.
const FLUSH_THRESHOLD: usize = 1 << 16;

/// Identifier is a possibly schema-qualified SQL name, such as a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identifier(pub Vec<String>);

impl Identifier {
    /// Quote each part of the Identifier and join them with '.',
    /// producing a form which is safe to interpolate into SQL.
    pub fn sanitize(&self) -> String {
        self.0
            .iter()
            .map(|part| quote(part))
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier(vec![name.to_string()])
    }
}

impl<const N: usize> From<[&str; N]> for Identifier {
    fn from(parts: [&str; N]) -> Self {
        Identifier(parts.iter().map(|p| p.to_string()).collect())
    }
}

fn quote(part: &str) -> String {
    let escaped = part.replace('"', "\"\"").replace('\0', "");
    format!("\"{escaped}\"")
}

/// CopyFromSource produces the rows of a bulk copy.
pub trait CopyFromSource: Send {
    /// Next row to copy, or None if the source is exhausted.
    fn next_row(&mut self) -> Option<anyhow::Result<Vec<Value>>>;
}

/// CopyFromRows is a CopyFromSource over rows held in memory.
pub struct CopyFromRows {
    rows: std::vec::IntoIter<Vec<Value>>,
}

impl CopyFromRows {
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self {
            rows: rows.into_iter(),
        }
    }
}

impl CopyFromSource for CopyFromRows {
    fn next_row(&mut self) -> Option<anyhow::Result<Vec<Value>>> {
        self.rows.next().map(Ok)
    }
}

/// CopyFromIter adapts a fallible iterator of rows into a CopyFromSource.
pub struct CopyFromIter<I>(pub I);

impl<I> CopyFromSource for CopyFromIter<I>
where
    I: Iterator<Item = anyhow::Result<Vec<Value>>> + Send,
{
    fn next_row(&mut self) -> Option<anyhow::Result<Vec<Value>>> {
        self.0.next()
    }
}

/// `COPY ... FROM STDIN` statement for `table` and its `columns`.
pub(crate) fn copy_statement(table: &Identifier, columns: &[&str]) -> String {
    let columns = columns
        .iter()
        .map(|c| quote(c))
        .collect::<Vec<_>>()
        .join(", ");

    format!("COPY {} ( {columns} ) FROM STDIN", table.sanitize())
}

/// Append `row` to `buf` in the COPY text format.
pub(crate) fn encode_row(buf: &mut Vec<u8>, row: &[Value], columns: usize) -> Result<()> {
    if row.len() != columns {
        return Err(Error::CopyColumnMismatch {
            expected: columns,
            actual: row.len(),
        });
    }

    for (index, value) in row.iter().enumerate() {
        if index != 0 {
            buf.push(b'\t');
        }
        match value.to_copy_text() {
            None => buf.extend_from_slice(b"\\N"),
            Some(text) => escape_into(buf, &text),
        }
    }
    buf.push(b'\n');
    Ok(())
}

fn escape_into(buf: &mut Vec<u8>, text: &str) {
    for b in text.bytes() {
        match b {
            b'\\' => buf.extend_from_slice(b"\\\\"),
            b'\t' => buf.extend_from_slice(b"\\t"),
            b'\n' => buf.extend_from_slice(b"\\n"),
            b'\r' => buf.extend_from_slice(b"\\r"),
            other => buf.push(other),
        }
    }
}

/// Stream every row of `source` into an open `copy`, returning the number
/// of rows the server reports as copied. A failed or malformed row aborts
/// the copy so that nothing is committed.
pub(crate) async fn copy_in<C>(
    mut copy: PgCopyIn<C>,
    columns: usize,
    source: &mut dyn CopyFromSource,
) -> Result<u64>
where
    C: DerefMut<Target = PgConnection>,
{
    let mut buf = Vec::with_capacity(FLUSH_THRESHOLD);

    while let Some(row) = source.next_row() {
        let encoded = match row {
            Ok(row) => encode_row(&mut buf, &row, columns),
            Err(err) => Err(Error::Source(err)),
        };
        if let Err(err) = encoded {
            copy.abort(err.to_string()).await?;
            return Err(err);
        }

        if buf.len() >= FLUSH_THRESHOLD {
            copy.send(buf.as_slice()).await?;
            buf.clear();
        }
    }
    if !buf.is_empty() {
        copy.send(buf.as_slice()).await?;
    }

    let rows = copy.finish().await?;
    tracing::debug!(rows, "finished copy");

    Ok(rows)
}
