//! Use-case error taxonomy shared by every ordered-entity service.
//!
//! # Invariants
//! - `NotFound` and `AccessDenied` reach callers untouched.
//! - `Conflict` is only produced from a storage uniqueness violation, after
//!   the engine's retry budget is exhausted.

use crate::collab::AccessError;
use crate::db::DbError;
use crate::model::{EntityKind, UserId, ValueError};
use crate::repo::RepoError;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors from ordered-entity service operations.
#[derive(Debug)]
pub enum ServiceError {
    /// Ref, pivot or container does not resolve.
    NotFound { kind: EntityKind, id: Uuid },
    /// Access check refused the actor.
    AccessDenied {
        actor: UserId,
        kind: EntityKind,
        id: Uuid,
    },
    /// Operation is not allowed in the entity's current state.
    InvalidState(String),
    /// Payload failed validation.
    InvalidInput(String),
    /// Position uniqueness violation under a concurrent writer.
    Conflict { kind: EntityKind },
    /// Persisted data cannot be mapped to a valid record.
    InvalidData(String),
    /// Access-check collaborator could not answer.
    Collaborator(String),
    /// Storage failure.
    Db(DbError),
}

impl ServiceError {
    pub fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    /// Stable code used in `error_code=` log fields.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AccessDenied { .. } => "access_denied",
            Self::InvalidState(_) => "invalid_state",
            Self::InvalidInput(_) => "invalid_input",
            Self::Conflict { .. } => "conflict",
            Self::InvalidData(_) => "invalid_data",
            Self::Collaborator(_) => "collaborator_unavailable",
            Self::Db(_) => "db_error",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Rewrites a storage uniqueness violation as `Conflict` for `kind`.
    pub(crate) fn into_conflict(self, kind: EntityKind) -> Self {
        match self {
            Self::Db(err) if err.is_unique_violation() => Self::Conflict { kind },
            other => other,
        }
    }
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            Self::AccessDenied { actor, kind, id } => {
                write!(f, "actor {actor} may not act on {kind} {id}")
            }
            Self::InvalidState(message) => write!(f, "invalid state: {message}"),
            Self::InvalidInput(message) => write!(f, "invalid input: {message}"),
            Self::Conflict { kind } => write!(f, "{kind} position conflict, retry later"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Collaborator(message) => write!(f, "{message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(entity) => Self::NotFound {
                kind: entity.kind,
                id: entity.id,
            },
            RepoError::InvalidData(message) => Self::InvalidData(message),
            RepoError::Db(err) => Self::Db(err),
        }
    }
}

impl From<DbError> for ServiceError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<ValueError> for ServiceError {
    fn from(value: ValueError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

impl From<AccessError> for ServiceError {
    fn from(value: AccessError) -> Self {
        match value {
            AccessError::NotFound(entity) => Self::NotFound {
                kind: entity.kind,
                id: entity.id,
            },
            AccessError::Denied { actor, entity, .. } => Self::AccessDenied {
                actor,
                kind: entity.kind,
                id: entity.id,
            },
            AccessError::Unavailable(message) => Self::Collaborator(message),
        }
    }
}
