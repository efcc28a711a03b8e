use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Catalog source error: {0}")]
    Source(String),

    #[error("Snapshot database not found: {0}")]
    StoreNotFound(String),

    #[error("Unsupported snapshot database: schema version {found} (this build reads version {expected})")]
    SchemaVersion { found: i64, expected: i64 },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL_ERROR: i32 = 1;
    pub const INVALID_ARGUMENTS: i32 = 2;
    pub const SOURCE_ERROR: i32 = 3;
    pub const DATABASE_ERROR: i32 = 4;
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Source(_) => exit_code::SOURCE_ERROR,
            Error::StoreNotFound(_) | Error::SchemaVersion { .. } | Error::Database(_) => {
                exit_code::DATABASE_ERROR
            }
            Error::InvalidArgument(_) => exit_code::INVALID_ARGUMENTS,
            _ => exit_code::GENERAL_ERROR,
        }
    }
}
