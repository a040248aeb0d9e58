//! SQLite error mapping.
//!
//! Maps `tokio_rusqlite::Error` and `rusqlite::Error` to `BackendError` from
//! `idbridge_core::identity`. Constraint violations on the key column become
//! `UserAlreadyExists`; everything else is a store failure.

use idbridge_core::identity::BackendError;

/// Maps a rusqlite error to a store failure.
///
/// # Error Mapping
///
/// - Cannot open / not a database → `BackendError::ConnectionFailed`
/// - Column type mismatches → `BackendError::InvalidData`
/// - All other errors → `BackendError::QueryFailed`
pub fn map_rusqlite_error(err: rusqlite::Error) -> BackendError {
    match &err {
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if matches!(
                sqlite_err.code,
                rusqlite::ErrorCode::CannotOpen | rusqlite::ErrorCode::NotADatabase
            ) =>
        {
            BackendError::ConnectionFailed(format!("Cannot open database: {err}"))
        }

        rusqlite::Error::InvalidColumnType(..) | rusqlite::Error::FromSqlConversionFailure(..) => {
            BackendError::InvalidData(err.to_string())
        }

        _ => BackendError::QueryFailed(err.to_string()),
    }
}

/// Maps an error raised while writing the row of `user`.
///
/// UNIQUE and PRIMARY KEY violations mean another row already holds the key.
pub fn map_write_error(err: rusqlite::Error, user: &str, backend: &str) -> BackendError {
    match &err {
        rusqlite::Error::SqliteFailure(sqlite_err, _)
            if sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || sqlite_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY =>
        {
            BackendError::user_already_exists(user, backend)
        }
        _ => map_rusqlite_error(err),
    }
}

/// Maps a tokio_rusqlite error to a BackendError.
///
/// This is the entry point for failures of the connection itself; errors
/// raised inside a call are mapped where they occur.
pub fn map_tokio_rusqlite_error(err: tokio_rusqlite::Error) -> BackendError {
    match err {
        tokio_rusqlite::Error::Rusqlite(rusqlite_err) => map_rusqlite_error(rusqlite_err),
        tokio_rusqlite::Error::ConnectionClosed => {
            BackendError::ConnectionFailed("Connection closed unexpectedly".to_string())
        }
        tokio_rusqlite::Error::Close((_, rusqlite_err)) => {
            BackendError::ConnectionFailed(format!("Failed to close connection: {rusqlite_err}"))
        }
        other => BackendError::QueryFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::ffi;

    fn failure(code: rusqlite::ErrorCode, extended_code: std::os::raw::c_int) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            ffi::Error {
                code,
                extended_code,
            },
            None,
        )
    }

    #[test]
    fn test_unique_constraint_maps_to_user_already_exists() {
        let err = failure(
            rusqlite::ErrorCode::ConstraintViolation,
            ffi::SQLITE_CONSTRAINT_UNIQUE,
        );

        let result = map_write_error(err, "alice", "sql");

        assert_eq!(result, BackendError::user_already_exists("alice", "sql"));
    }

    #[test]
    fn test_not_null_constraint_is_query_failure() {
        let err = failure(
            rusqlite::ErrorCode::ConstraintViolation,
            ffi::SQLITE_CONSTRAINT_NOTNULL,
        );

        let result = map_write_error(err, "alice", "sql");

        assert!(matches!(result, BackendError::QueryFailed(_)));
    }

    #[test]
    fn test_cannot_open_maps_to_connection_failed() {
        let err = failure(rusqlite::ErrorCode::CannotOpen, ffi::SQLITE_CANTOPEN);

        let result = map_rusqlite_error(err);

        assert!(matches!(result, BackendError::ConnectionFailed(_)));
    }

    #[test]
    fn test_invalid_column_type_maps_to_invalid_data() {
        let err = rusqlite::Error::InvalidColumnType(
            0,
            "groups".to_string(),
            rusqlite::types::Type::Blob,
        );

        let result = map_rusqlite_error(err);

        assert!(matches!(result, BackendError::InvalidData(_)));
    }

    #[test]
    fn test_tokio_wrapper_is_unwrapped() {
        let err = tokio_rusqlite::Error::Rusqlite(rusqlite::Error::QueryReturnedNoRows);

        let result = map_tokio_rusqlite_error(err);

        assert!(matches!(result, BackendError::QueryFailed(_)));
    }

    #[test]
    fn test_connection_closed_maps_to_connection_failed() {
        let result = map_tokio_rusqlite_error(tokio_rusqlite::Error::ConnectionClosed);
        assert!(matches!(result, BackendError::ConnectionFailed(_)));
    }

    #[test]
    fn test_other_error_maps_to_query_failed() {
        let err = tokio_rusqlite::Error::Other(Box::new(std::io::Error::other("test error")));

        let result = map_tokio_rusqlite_error(err);

        assert!(matches!(result, BackendError::QueryFailed(_)));
    }
}
