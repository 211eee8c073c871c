use std::error::Error as StdError;
use thiserror::Error;
use tokio_postgres::error::SqlState;

/// Everything that can stop a reconciliation run.
///
/// Every variant that originates from the database carries the name of the
/// operation that was in flight, so an operator can tell which step failed
/// without turning on debug logging.
#[derive(Debug, Error)]
pub enum Error {
    /// A required setting is missing or malformed. Raised before any network I/O.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The database could not be reached, rejected authentication, failed TLS
    /// negotiation, or dropped the connection mid-operation.
    #[error("connection error during {operation}: {message}")]
    Connection { operation: String, message: String },

    /// The server rejected a schema or data change because of existing state
    /// (missing table, wrong type, missing privilege, dependent objects).
    #[error("schema conflict during {operation}: {message} (SQLSTATE {code})")]
    SchemaConflict {
        operation: String,
        code: String,
        message: String,
    },

    /// A uniqueness, foreign-key, not-null or check constraint was violated.
    #[error("constraint violation during {operation}: {message}{}", constraint_suffix(.constraint))]
    ConstraintViolation {
        operation: String,
        constraint: Option<String>,
        message: String,
    },

    /// An action was declared in a way that cannot be rendered.
    #[error("invalid action {action}: {reason}")]
    InvalidAction { action: String, reason: String },

    /// A destructive migration is pending and the operator did not opt in.
    #[error(
        "migration {version} is destructive; rerun with --allow-destructive to apply it"
    )]
    DestructiveRefused { version: String },

    /// Hashing a credential failed.
    #[error("credential error: {0}")]
    Credential(String),
}

fn constraint_suffix(constraint: &Option<String>) -> String {
    constraint
        .as_deref()
        .map(|c| format!(" (constraint {})", c))
        .unwrap_or_default()
}

/// SQLSTATE class 23 is "integrity constraint violation".
pub(crate) fn is_constraint_class(code: &str) -> bool {
    code.starts_with("23")
}

impl Error {
    /// Classify a driver error raised while performing `operation`.
    ///
    /// Anything the server answered with a SQLSTATE is either a constraint
    /// violation (class 23) or a schema conflict. Without a SQLSTATE, an I/O
    /// cause (or no cause at all, as for a closed connection) is a connection
    /// problem, and any other cause was raised while converting a value to or
    /// from the column's type, which is reported as a datatype mismatch.
    pub fn from_pg(operation: impl Into<String>, err: tokio_postgres::Error) -> Self {
        let operation = operation.into();
        if let Some(db) = err.as_db_error() {
            return if is_constraint_class(db.code().code()) {
                Error::ConstraintViolation {
                    operation,
                    constraint: db.constraint().map(str::to_owned),
                    message: db.message().to_owned(),
                }
            } else {
                Error::SchemaConflict {
                    operation,
                    code: db.code().code().to_owned(),
                    message: db.message().to_owned(),
                }
            };
        }

        match StdError::source(&err) {
            Some(cause) if !cause.is::<std::io::Error>() => Error::SchemaConflict {
                operation,
                code: SqlState::DATATYPE_MISMATCH.code().to_owned(),
                message: error_chain(&err),
            },
            _ => Error::Connection {
                operation,
                message: error_chain(&err),
            },
        }
    }
}

/// `err` followed by each of its causes, joined with `: `.
pub(crate) fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Attach an operation name to a driver result.
pub(crate) trait Context<T> {
    fn context(self, operation: impl Into<String>) -> crate::Result<T>;
}

impl<T> Context<T> for Result<T, tokio_postgres::Error> {
    fn context(self, operation: impl Into<String>) -> crate::Result<T> {
        self.map_err(|e| Error::from_pg(operation, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_class() {
        assert!(is_constraint_class(SqlState::UNIQUE_VIOLATION.code()));
        assert!(is_constraint_class(SqlState::FOREIGN_KEY_VIOLATION.code()));
        assert!(is_constraint_class(SqlState::NOT_NULL_VIOLATION.code()));
        assert!(!is_constraint_class(SqlState::UNDEFINED_TABLE.code()));
        assert!(!is_constraint_class(SqlState::INSUFFICIENT_PRIVILEGE.code()));
        assert!(!is_constraint_class(SqlState::DATATYPE_MISMATCH.code()));
    }

    #[test]
    fn test_display_carries_operation() {
        let err = Error::SchemaConflict {
            operation: "add column courses.is_active".into(),
            code: "42P01".into(),
            message: "relation \"courses\" does not exist".into(),
        };
        assert_eq!(
            err.to_string(),
            "schema conflict during add column courses.is_active: \
             relation \"courses\" does not exist (SQLSTATE 42P01)"
        );

        let err = Error::ConstraintViolation {
            operation: "upsert users".into(),
            constraint: Some("users_username_key".into()),
            message: "duplicate key value violates unique constraint".into(),
        };
        assert!(err.to_string().ends_with("(constraint users_username_key)"));
    }

    #[derive(Debug)]
    struct Outer(std::io::Error);

    impl std::fmt::Display for Outer {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "error serializing parameter 0")
        }
    }

    impl StdError for Outer {
        fn source(&self) -> Option<&(dyn StdError + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_error_chain_includes_causes() {
        let err = Outer(std::io::Error::other("cannot convert text to bool"));
        assert_eq!(
            error_chain(&err),
            "error serializing parameter 0: cannot convert text to bool"
        );
        assert_eq!(
            error_chain(&std::io::Error::other("reset")),
            "reset"
        );
    }
}
