//! Store and configuration errors shared by the title-analysis crates
//!
//! `fcti-ta` wraps these in its own `TitleError` taxonomy; the variants
//! here describe where a failure came from, not how it is handled.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// SQLite query, transaction or pool failure in the title store
    #[cfg(feature = "sqlx")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unreadable or unparseable TOML config file
    #[error("Configuration error: {0}")]
    Config(String),

    /// Property (or other record) the caller asked for was never stored
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record that cannot be written as given, e.g. a document with no key
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// JSON list column (party names, references, members) failed to encode
    /// or decode
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Corrupt stored value or exhausted lock retries
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when SQLite reported `database is locked`
    ///
    /// `retry_on_lock` retries only these; every other error is returned
    /// to the caller on first occurrence.
    pub fn is_lock_contention(&self) -> bool {
        match self {
            #[cfg(feature = "sqlx")]
            Error::Database(db_err) => db_err.to_string().contains("database is locked"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_database_locks_are_contention() {
        assert!(!Error::NotFound("property 01-3022-005-0050".into()).is_lock_contention());
        assert!(!Error::Internal("database is locked".into()).is_lock_contention());
    }

    #[cfg(feature = "sqlx")]
    #[test]
    fn test_pool_timeout_is_not_contention() {
        assert!(!Error::Database(sqlx::Error::PoolTimedOut).is_lock_contention());
    }

    #[test]
    fn test_json_column_errors_convert() {
        let err: Error = serde_json::from_str::<Vec<String>>("[\"DOE JANE\"")
            .unwrap_err()
            .into();
        assert!(matches!(err, Error::Serialization(_)));
        assert!(err.to_string().starts_with("Serialization error"));
    }
}
