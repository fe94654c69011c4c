use thiserror::Error;

/// Everything that can go wrong while running a practice round
#[derive(Error, Debug)]
pub enum DrillError {
    #[error("character table is missing required column `{column}`")]
    Schema { column: String },

    #[error("invalid character record `{content}`: {reason}")]
    InvalidRecord { content: String, reason: String },

    #[error("cannot sample from an empty character store")]
    EmptyStore,

    #[error("unparsable recognition line: {line:?}")]
    UnparsableObservation { line: String },

    #[error("collaborator failed: {0}")]
    Collaborator(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DrillError>;
