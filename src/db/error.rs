//! Store-layer error taxonomy and sqlx error classification.
//!
//! Driver errors are pattern-matched into typed variants: SQLSTATE codes
//! for constraint violations, connection-class codes and connectivity
//! substrings for [`StoreError::Unavailable`]. Callers use the latter to
//! decide retry vs fail-request.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user with this login already exists")]
    UserAlreadyExists,
    #[error("user with this login does not exist")]
    UserNotFound,
    #[error("invalid password")]
    InvalidPassword,
    #[error("unknown user id")]
    UnknownUser,
    #[error("unknown expression id")]
    UnknownExpression,
    #[error("unknown task id")]
    UnknownTask,
    #[error("no tasks depend on the completed task")]
    UnknownTaskDependency,
    #[error("invalid task")]
    InvalidTask,
    #[error("database is not available")]
    Unavailable,
    #[error("database error: {0}")]
    Internal(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if is_unavailable(&err) {
            StoreError::Unavailable
        } else {
            StoreError::Internal(err)
        }
    }
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|c| c.into_owned()),
        _ => None,
    }
}

/// SQLSTATE 23505.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    sqlstate(err).as_deref() == Some("23505")
}

/// SQLSTATE 23503.
pub(crate) fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    sqlstate(err).as_deref() == Some("23503")
}

/// Connection-level failures: connection-class SQLSTATEs (08xxx), server
/// shutdown codes (57P01..57P03), pool/IO errors, and the usual
/// connectivity substrings surfaced by the OS resolver and TCP stack.
pub(crate) fn is_unavailable(err: &sqlx::Error) -> bool {
    if let Some(code) = sqlstate(err) {
        if code.starts_with("08") || matches!(code.as_str(), "57P01" | "57P02" | "57P03") {
            return true;
        }
    }

    match err {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed => return true,
        _ => {}
    }

    let msg = err.to_string();
    [
        "connection refused",
        "connection reset",
        "broken pipe",
        "no connection",
        "unable to connect",
        "no such host",
        "temporary failure in name resolution",
        "lookup",
        "timed out",
    ]
    .iter()
    .any(|needle| msg.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_errors_are_unavailable() {
        assert!(is_unavailable(&sqlx::Error::PoolTimedOut));
        assert!(is_unavailable(&sqlx::Error::PoolClosed));
        assert!(matches!(
            StoreError::from(sqlx::Error::PoolClosed),
            StoreError::Unavailable
        ));
    }

    #[test]
    fn io_errors_are_unavailable() {
        let io = sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        ));
        assert!(is_unavailable(&io));
    }

    #[test]
    fn row_not_found_is_not_unavailable() {
        assert!(!is_unavailable(&sqlx::Error::RowNotFound));
        assert!(matches!(
            StoreError::from(sqlx::Error::RowNotFound),
            StoreError::Internal(_)
        ));
    }
}
