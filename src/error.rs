use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0} is not implemented")]
    Unimplemented(String),

    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("database error: {0}")]
    Storage(#[source] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wire code sent back in `error.code`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Forbidden(_) => "forbidden",
            Self::Validation(_) => "bad_params",
            Self::Unimplemented(_) => "not_implemented",
            Self::Unavailable(_) => "unavailable",
            Self::Storage(_) => "db_error",
            Self::Internal(_) => "internal",
        }
    }

    /// Only transient storage failures are safe to retry as-is.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Keeps the kind, prefixes the message (used to point at a bulk entry).
    pub fn prefixed(self, prefix: &str) -> Self {
        match self {
            Self::NotFound(m) => Self::NotFound(format!("{prefix}: {m}")),
            Self::Conflict(m) => Self::Conflict(format!("{prefix}: {m}")),
            Self::Forbidden(m) => Self::Forbidden(format!("{prefix}: {m}")),
            Self::Validation(m) => Self::Validation(format!("{prefix}: {m}")),
            other => other,
        }
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy)
            | Some(ErrorCode::DatabaseLocked)
            | Some(ErrorCode::CannotOpen) => Self::Unavailable(e.to_string()),
            _ => Self::Storage(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unavailable_is_retryable() {
        assert!(AppError::Unavailable("busy".into()).retryable());
        assert!(!AppError::conflict("dup").retryable());
        assert!(!AppError::forbidden("no").retryable());
        assert!(!AppError::validation("bad").retryable());
        assert!(!AppError::not_found("course").retryable());
    }

    #[test]
    fn busy_sqlite_errors_map_to_unavailable() {
        let busy = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        let mapped = AppError::from(busy);
        assert_eq!(mapped.code(), "unavailable");

        let mapped = AppError::from(rusqlite::Error::QueryReturnedNoRows);
        assert_eq!(mapped.code(), "db_error");
    }

    #[test]
    fn prefixed_keeps_kind() {
        let e = AppError::validation("score out of range").prefixed("entry 3");
        assert_eq!(e.code(), "bad_params");
        assert_eq!(e.to_string(), "entry 3: score out of range");
    }
}
