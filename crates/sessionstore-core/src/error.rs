//! Error types for the session store.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Duplicate key: {entity}")]
    DuplicateKey { entity: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid service name: {0:?}")]
    InvalidService(String),

    #[error("Operation deadline exceeded")]
    DeadlineExceeded,

    /// Both halves of a two-record write failed.
    #[error("{}", join_messages(.0))]
    Joined(Vec<SessionError>),
}

pub type SessionResult<T> = Result<T, SessionError>;

fn join_messages(errors: &[SessionError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl SessionError {
    /// Combine the outcomes of two independent writes.
    ///
    /// Returns `Ok(())` when both succeeded, the lone error when exactly
    /// one failed, and [`SessionError::Joined`] when both failed. No
    /// rollback is implied: a failed side may leave the other committed.
    pub fn join(first: SessionResult<()>, second: SessionResult<()>) -> SessionResult<()> {
        match (first, second) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(a), Err(b)) => Err(SessionError::Joined(vec![a, b])),
        }
    }

    /// The underlying causes: the joined parts, or `self` alone.
    pub fn causes(&self) -> Vec<&SessionError> {
        match self {
            SessionError::Joined(errors) => errors.iter().flat_map(|e| e.causes()).collect(),
            other => vec![other],
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.causes()
            .iter()
            .any(|e| matches!(e, SessionError::NotFound { .. }))
    }

    pub fn is_duplicate_key(&self) -> bool {
        self.causes()
            .iter()
            .any(|e| matches!(e, SessionError::DuplicateKey { .. }))
    }
}
