//! Database-specific error types and conversions.

use sessionstore_core::error::SessionError;

/// Database-layer error type.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SurrealDB error: {0}")]
    Surreal(#[from] surrealdb::Error),

    #[error("Migration failed: {0}")]
    Migration(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Record not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate key on {entity}")]
    DuplicateKey { entity: String },
}

impl DbError {
    /// Classify a statement failure from a write.
    ///
    /// SurrealDB reports both a taken record id ("already exists") and a
    /// UNIQUE index violation ("already contains") as plain statement
    /// errors.
    pub(crate) fn from_write(entity: &str, err: impl std::fmt::Display) -> Self {
        let message = err.to_string();
        if message.contains("already exists") || message.contains("already contains") {
            DbError::DuplicateKey {
                entity: entity.into(),
            }
        } else {
            DbError::Query(message)
        }
    }
}

impl From<DbError> for SessionError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => SessionError::NotFound { entity, id },
            DbError::DuplicateKey { entity } => SessionError::DuplicateKey { entity },
            other => SessionError::Database(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_domain_not_found() {
        let err: SessionError = DbError::NotFound {
            entity: "session".into(),
            id: "abc".into(),
        }
        .into();
        assert!(err.is_not_found());
    }

    #[test]
    fn write_failures_are_classified() {
        let taken = DbError::from_write(
            "session",
            "Database record `session:abc` already exists",
        );
        assert!(matches!(taken, DbError::DuplicateKey { .. }));

        let index = DbError::from_write(
            "session",
            "Database index `idx_session_secret` already contains 'x', with record `session:y`",
        );
        assert!(matches!(index, DbError::DuplicateKey { .. }));

        let other = DbError::from_write("session", "Found NONE for field `secret`");
        assert!(matches!(other, DbError::Query(_)));
    }

    #[test]
    fn query_failure_maps_to_database_error() {
        let err: SessionError = DbError::Query("connection reset".into()).into();
        assert!(matches!(err, SessionError::Database(ref m) if m.contains("connection reset")));
    }
}
