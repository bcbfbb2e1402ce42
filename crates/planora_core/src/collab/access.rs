//! Access-check collaborator interface and its SQLite-backed adapter.
//!
//! # Responsibility
//! - Answer "may `actor` act on `entity` with `capability`, and who owns it".
//!
//! # Invariants
//! - The owner always holds every capability.
//! - Collaborator grants live on projects and apply to the project, its
//!   descendant projects, and the tasks/habits attached to them.
//! - Labels, filters and unfiled tasks/habits are owner-only.

use crate::model::project::CollaboratorGrant;
use crate::model::{EntityKind, EntityRef, OwnerId, UserId};
use crate::order::scope::owner_of;
use crate::repo::project_repo::collaborator_grant;
use crate::repo::{parse_optional_uuid, RepoError};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Capability required by one operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    View,
    /// Toggle completion only (tasks, habits).
    CompleteOnly,
    Edit,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::CompleteOnly => "complete_only",
            Self::Edit => "edit",
        }
    }

    /// Whether a collaborator holding `grant` may exercise this capability.
    pub fn is_granted_by(self, grant: CollaboratorGrant) -> bool {
        let required = match self {
            Self::View => CollaboratorGrant::View,
            Self::CompleteOnly => CollaboratorGrant::CompleteOnly,
            Self::Edit => CollaboratorGrant::Edit,
        };
        grant >= required
    }
}

/// Access-check failure.
#[derive(Debug)]
pub enum AccessError {
    /// Entity does not exist.
    NotFound(EntityRef),
    /// Entity exists but the actor lacks the capability.
    Denied {
        actor: UserId,
        entity: EntityRef,
        capability: Capability,
    },
    /// The check itself could not be evaluated.
    Unavailable(String),
}

impl Display for AccessError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(entity) => write!(f, "entity not found: {entity}"),
            Self::Denied {
                actor,
                entity,
                capability,
            } => write!(
                f,
                "actor {actor} lacks `{}` on {entity}",
                capability.as_str()
            ),
            Self::Unavailable(message) => write!(f, "access check unavailable: {message}"),
        }
    }
}

impl Error for AccessError {}

impl From<RepoError> for AccessError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(entity) => Self::NotFound(entity),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for AccessError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Unavailable(value.to_string())
    }
}

/// Capability check consumed by every ordered-entity service.
pub trait AccessCheck {
    /// Returns the owner of `entity` when `actor` may act on it.
    fn can_act(
        &self,
        actor: UserId,
        entity: EntityRef,
        capability: Capability,
    ) -> Result<OwnerId, AccessError>;
}

impl<T: AccessCheck + ?Sized> AccessCheck for &T {
    fn can_act(
        &self,
        actor: UserId,
        entity: EntityRef,
        capability: Capability,
    ) -> Result<OwnerId, AccessError> {
        (**self).can_act(actor, entity, capability)
    }
}

/// Access check over the `project_collaborators` table.
pub struct SqliteAccessCheck<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAccessCheck<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    fn governing_project(&self, entity: EntityRef) -> Result<Option<Uuid>, AccessError> {
        let column_sql = match entity.kind {
            EntityKind::Project => return Ok(Some(entity.id)),
            EntityKind::Task => "SELECT project_uuid FROM tasks WHERE uuid = ?1;",
            EntityKind::Habit => "SELECT project_uuid FROM habits WHERE uuid = ?1;",
            EntityKind::Label | EntityKind::Filter => return Ok(None),
        };
        let value: Option<Option<String>> = self
            .conn
            .query_row(column_sql, [entity.id.to_string()], |row| row.get(0))
            .optional()?;
        Ok(parse_optional_uuid(value.flatten(), "project_uuid")?)
    }

    fn parent_project(&self, project: Uuid) -> Result<Option<Uuid>, AccessError> {
        let value: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT parent_uuid FROM projects WHERE uuid = ?1;",
                [project.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(parse_optional_uuid(value.flatten(), "projects.parent_uuid")?)
    }
}

impl AccessCheck for SqliteAccessCheck<'_> {
    fn can_act(
        &self,
        actor: UserId,
        entity: EntityRef,
        capability: Capability,
    ) -> Result<OwnerId, AccessError> {
        let owner_id = owner_of(self.conn, entity)?.ok_or(AccessError::NotFound(entity))?;
        if owner_id == actor {
            return Ok(owner_id);
        }

        let mut visited = HashSet::new();
        let mut cursor = self.governing_project(entity)?;
        while let Some(project) = cursor {
            if !visited.insert(project) {
                break;
            }
            if let Some(grant) = collaborator_grant(self.conn, project, actor)? {
                if capability.is_granted_by(grant) {
                    return Ok(owner_id);
                }
            }
            cursor = self.parent_project(project)?;
        }

        Err(AccessError::Denied {
            actor,
            entity,
            capability,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::Capability;
    use crate::model::project::CollaboratorGrant;

    #[test]
    fn grants_are_ordered_by_strength() {
        assert!(Capability::View.is_granted_by(CollaboratorGrant::View));
        assert!(Capability::View.is_granted_by(CollaboratorGrant::Edit));
        assert!(Capability::CompleteOnly.is_granted_by(CollaboratorGrant::CompleteOnly));
        assert!(!Capability::CompleteOnly.is_granted_by(CollaboratorGrant::View));
        assert!(!Capability::Edit.is_granted_by(CollaboratorGrant::CompleteOnly));
        assert!(Capability::Edit.is_granted_by(CollaboratorGrant::Edit));
    }
}
