use crate::ExecutorRef;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    // Returned by `Manager::transaction_executor` and `Manager::batch_executor`
    // when the slot *is* populated. The found executor rides along.
    #[error("no transaction found in context")]
    NoTransaction(ExecutorRef),
    #[error("no batch found in context")]
    NoBatch(ExecutorRef),

    #[error("context does not carry a transaction")]
    MissingTransaction,
    #[error("context does not carry a batch")]
    MissingBatch,

    #[error("transaction has already been committed or rolled back")]
    TransactionClosed,
    #[error("{0} cannot be deferred into a batch")]
    Unsupported(&'static str),
    #[error("batch aborted: statement {index} failed")]
    BatchAborted { index: usize },
    #[error("no more results in batch")]
    BatchExhausted,

    #[error("copy row has {actual} values but {expected} columns were named")]
    CopyColumnMismatch { expected: usize, actual: usize },
    #[error("copy source failed: {0:#}")]
    Source(anyhow::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Recover the executor carried by an inverted-polarity lookup error.
    pub fn into_executor(self) -> Option<ExecutorRef> {
        match self {
            Error::NoTransaction(found) | Error::NoBatch(found) => Some(found),
            _ => None,
        }
    }

    /// The underlying driver error, if this error was passed through from sqlx.
    pub fn as_sqlx(&self) -> Option<&sqlx::Error> {
        match self {
            Error::Sqlx(err) => Some(err),
            _ => None,
        }
    }
}
