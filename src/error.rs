use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompensationError {
    #[error("Schema error: {table} data is missing required column '{column}'")]
    Schema { table: String, column: String },

    #[error("Deal '{opportunity_id}' references unknown AE '{ae}'")]
    UnknownAe { opportunity_id: String, ae: String },

    #[error("Exception #{index} ({kind}) references deal '{deal_id}' which is not in the ledger")]
    DealNotFound {
        index: usize,
        kind: String,
        deal_id: String,
    },

    #[error("Division by zero: AE '{ae}' has a quota of zero")]
    DivisionByZero { ae: String },

    #[error("AE '{ae}' has no usable {field}")]
    IncompleteRoster { ae: String, field: String },

    #[error("AE '{0}' appears more than once in the roster")]
    DuplicateAe(String),

    #[error("Invalid exception #{index}: {details}")]
    InvalidException { index: usize, details: String },

    #[error("Invalid month {0}: must be between 1 and 12")]
    InvalidMonth(u32),

    #[error("No compensation snapshot has been published yet")]
    NoSnapshot,

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CompensationError>;
