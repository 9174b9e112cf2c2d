use thiserror::Error;
use uuid::Uuid;

use crate::validation::ValidationErrors;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Recurring task {id} has an unreadable record: {reason}")]
    CorruptRecord { id: Uuid, reason: String },
}

impl CoreError {
    /// Whether the error means a collaborator is unreachable rather than
    /// that a single operation was rejected.
    ///
    /// The materializer records rejected operations and keeps going, but
    /// propagates infrastructure failures so the whole pass is retried.
    pub fn is_infrastructure(&self) -> bool {
        match self {
            CoreError::Database(err) => matches!(
                err,
                sqlx::Error::Io(_)
                    | sqlx::Error::Tls(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ) || is_busy(err),
            CoreError::Migration(_) | CoreError::Io(_) => true,
            _ => false,
        }
    }
}

/// SQLITE_BUSY or SQLITE_LOCKED, including their extended codes.
fn is_busy(err: &sqlx::Error) -> bool {
    let sqlx::Error::Database(db) = err else {
        return false;
    };
    db.code()
        .and_then(|code| code.parse::<i32>().ok())
        .is_some_and(|code| matches!(code & 0xff, 5 | 6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;

    #[derive(Debug)]
    struct SqliteCode(&'static str);

    impl std::fmt::Display for SqliteCode {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "sqlite error {}", self.0)
        }
    }

    impl std::error::Error for SqliteCode {}

    impl DatabaseError for SqliteCode {
        fn message(&self) -> &str {
            "database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            Some(Cow::Borrowed(self.0))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::Other
        }
    }

    fn sqlite_error(code: &'static str) -> CoreError {
        CoreError::Database(sqlx::Error::Database(Box::new(SqliteCode(code))))
    }

    #[test]
    fn busy_and_locked_databases_are_infrastructure() {
        // SQLITE_BUSY, SQLITE_LOCKED, SQLITE_BUSY_SNAPSHOT
        assert!(sqlite_error("5").is_infrastructure());
        assert!(sqlite_error("6").is_infrastructure());
        assert!(sqlite_error("517").is_infrastructure());
        // SQLITE_CONSTRAINT_UNIQUE
        assert!(!sqlite_error("2067").is_infrastructure());
    }

    #[test]
    fn pool_failures_are_infrastructure() {
        assert!(CoreError::Database(sqlx::Error::PoolTimedOut).is_infrastructure());
        assert!(CoreError::Database(sqlx::Error::PoolClosed).is_infrastructure());
        assert!(CoreError::Io(std::io::Error::other("disk gone")).is_infrastructure());
    }

    #[test]
    fn rejected_operations_are_not_infrastructure() {
        assert!(!CoreError::Database(sqlx::Error::RowNotFound).is_infrastructure());
        assert!(!CoreError::NotFound("x".into()).is_infrastructure());
        assert!(!CoreError::Conflict("x".into()).is_infrastructure());
    }
}
