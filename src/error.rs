use thiserror::Error;

#[derive(Debug, Error)]
pub enum CardpostError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("{0}")]
    Validation(String),

    #[error("Cannot {action} a transaction in status '{status}'")]
    InvalidState {
        action: &'static str,
        status: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Journal entry does not balance: debits {debits:.2} != credits {credits:.2}")]
    Balance { debits: f64, credits: f64 },

    #[error("No transaction with id {0}")]
    UnknownTransaction(i64),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, CardpostError>;
