use chrono::{DateTime, Utc};
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::Query;

/// Value is a positional statement argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Json(serde_json::Value),
    Uuid(uuid::Uuid),
    Timestamp(DateTime<Utc>),
}

impl Value {
    /// Render this Value as a column of the COPY text format,
    /// or None for SQL NULL. The result is not yet escaped.
    pub fn to_copy_text(&self) -> Option<String> {
        let text = match self {
            Value::Null => return None,
            Value::Bool(b) => (if *b { "t" } else { "f" }).to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) if f.is_nan() => "NaN".to_string(),
            Value::Float(f) if f.is_infinite() && *f > 0.0 => "Infinity".to_string(),
            Value::Float(f) if f.is_infinite() => "-Infinity".to_string(),
            Value::Float(f) => f.to_string(),
            Value::Text(s) => s.clone(),
            Value::Bytes(b) => {
                // bytea hex format.
                let mut out = String::with_capacity(2 + b.len() * 2);
                out.push_str("\\x");
                out.extend(b.iter().map(|byte| format!("{byte:02x}")));
                out
            }
            Value::Json(j) => j.to_string(),
            Value::Uuid(u) => u.hyphenated().to_string(),
            Value::Timestamp(t) => t.to_rfc3339(),
        };
        Some(text)
    }
}

/// Bind `args` positionally onto `query`.
pub(crate) fn bind<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    args: &[Value],
) -> Query<'q, Postgres, PgArguments> {
    for arg in args {
        query = match arg.clone() {
            // Untyped NULLs are sent as text. Cast the placeholder in SQL
            // (`$1::bigint`) when the column is of another type.
            Value::Null => query.bind(Option::<String>::None),
            Value::Bool(b) => query.bind(b),
            Value::Int(i) => query.bind(i),
            Value::Float(f) => query.bind(f),
            Value::Text(s) => query.bind(s),
            Value::Bytes(b) => query.bind(b),
            Value::Json(j) => query.bind(sqlx::types::Json(j)),
            Value::Uuid(u) => query.bind(u),
            Value::Timestamp(t) => query.bind(t),
        };
    }
    query
}

/// Build a query over `sql` with `args` bound.
pub(crate) fn query<'q>(sql: &'q str, args: &[Value]) -> Query<'q, Postgres, PgArguments> {
    bind(sqlx::query::<Postgres>(sql), args)
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<Vec<u8>> for Value {
    fn from(b: Vec<u8>) -> Self {
        Value::Bytes(b)
    }
}

impl From<serde_json::Value> for Value {
    fn from(j: serde_json::Value) -> Self {
        Value::Json(j)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(u: uuid::Uuid) -> Self {
        Value::Uuid(u)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Value::Timestamp(t)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(o: Option<T>) -> Self {
        match o {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod test {
    use super::Value;
    use chrono::TimeZone;

    #[test]
    fn test_copy_text_rendering() {
        let rendered: Vec<Option<String>> = [
            Value::Null,
            true.into(),
            42i64.into(),
            1.5f64.into(),
            f64::NAN.into(),
            f64::NEG_INFINITY.into(),
            "hello".into(),
            vec![0u8, 171, 255].into(),
            serde_json::json!({"a": [1, 2]}).into(),
            uuid::Uuid::nil().into(),
            chrono::Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap().into(),
            Option::<i64>::None.into(),
        ]
        .iter()
        .map(Value::to_copy_text)
        .collect();

        insta::assert_debug_snapshot!(rendered, @r###"
        [
            None,
            Some(
                "t",
            ),
            Some(
                "42",
            ),
            Some(
                "1.5",
            ),
            Some(
                "NaN",
            ),
            Some(
                "-Infinity",
            ),
            Some(
                "hello",
            ),
            Some(
                "\\x00abff",
            ),
            Some(
                "{\"a\":[1,2]}",
            ),
            Some(
                "00000000-0000-0000-0000-000000000000",
            ),
            Some(
                "2024-03-01T12:30:00+00:00",
            ),
            None,
        ]
        "###);
    }
}
