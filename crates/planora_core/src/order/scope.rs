//! Scope Key Resolver.
//!
//! # Responsibility
//! - Derive the ordering scope `(owner, container)` for every entity kind.
//! - Render a scope as a SQL predicate shared by allocation and shifting.
//! - Load the current placement of one stored row.
//!
//! # Invariants
//! - Labels and filters only live in the owner root scope.
//! - A sub-task is scoped by its parent task alone; a top-level task by its
//!   project; a task with neither is "unfiled" (root).
//! - The predicate of a scope matches exactly the rows covered by the
//!   table's `ux_*_scope_position` index key.

use crate::model::project::ProjectId;
use crate::model::task::TaskId;
use crate::model::{EntityKind, EntityRef, OwnerId};
use crate::repo::{parse_optional_uuid, parse_uuid, RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Container part of a scope key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "id")]
pub enum Container {
    /// Top-level (or unfiled) collection of the owner.
    Root,
    /// Tasks/habits attached directly to a project.
    Project(ProjectId),
    /// Child projects of a parent project.
    ParentProject(ProjectId),
    /// Sub-tasks of a parent task.
    ParentTask(TaskId),
}

impl Container {
    /// Entity referenced by this container, if any.
    pub fn entity(self) -> Option<EntityRef> {
        match self {
            Self::Root => None,
            Self::Project(id) | Self::ParentProject(id) => {
                Some(EntityRef::new(EntityKind::Project, id))
            }
            Self::ParentTask(id) => Some(EntityRef::new(EntityKind::Task, id)),
        }
    }

    fn supported_by(self, kind: EntityKind) -> bool {
        matches!(
            (kind, self),
            (_, Self::Root)
                | (EntityKind::Project, Self::ParentProject(_))
                | (EntityKind::Task, Self::Project(_))
                | (EntityKind::Task, Self::ParentTask(_))
                | (EntityKind::Habit, Self::Project(_))
        )
    }
}

/// Ordering scope: positions are unique inside one scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub kind: EntityKind,
    pub owner_id: OwnerId,
    pub container: Container,
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.container.entity() {
            Some(entity) => write!(f, "{}@{}/{}", self.kind, self.owner_id, entity),
            None => write!(f, "{}@{}/root", self.kind, self.owner_id),
        }
    }
}

impl Scope {
    /// Owner root scope for `kind`.
    pub fn root(kind: EntityKind, owner_id: OwnerId) -> Self {
        Self {
            kind,
            owner_id,
            container: Container::Root,
        }
    }

    /// Renders `owner_id = ? AND <container columns>` with bound values.
    pub(crate) fn predicate(&self) -> (String, Vec<Value>) {
        let mut values = vec![Value::Text(self.owner_id.to_string())];
        let container_sql = match (self.kind, self.container) {
            (EntityKind::Label | EntityKind::Filter, _) => "",
            (EntityKind::Project, Container::ParentProject(id)) => {
                values.push(Value::Text(id.to_string()));
                " AND parent_uuid = ?"
            }
            (EntityKind::Project, _) => " AND parent_uuid IS NULL",
            (EntityKind::Task, Container::ParentTask(id)) => {
                values.push(Value::Text(id.to_string()));
                " AND parent_uuid = ?"
            }
            (EntityKind::Task, Container::Project(id)) => {
                values.push(Value::Text(id.to_string()));
                " AND project_uuid = ? AND parent_uuid IS NULL"
            }
            (EntityKind::Task, _) => " AND project_uuid IS NULL AND parent_uuid IS NULL",
            (EntityKind::Habit, Container::Project(id)) => {
                values.push(Value::Text(id.to_string()));
                " AND project_uuid = ?"
            }
            (EntityKind::Habit, _) => " AND project_uuid IS NULL",
        };
        (format!("owner_id = ?{container_sql}"), values)
    }
}

/// Resolves and validates the scope for `kind` inside `container`.
///
/// # Errors
/// - `RepoError::NotFound` when the container does not resolve to a stored
///   entity owned by `owner_id`.
/// - `RepoError::InvalidData` when `kind` cannot live in `container`.
pub fn resolve_scope(
    conn: &Connection,
    kind: EntityKind,
    owner_id: OwnerId,
    container: Container,
) -> RepoResult<Scope> {
    if !container.supported_by(kind) {
        return Err(RepoError::InvalidData(format!(
            "{kind} cannot be ordered inside {container:?}"
        )));
    }
    if let Some(entity) = container.entity() {
        let stored_owner = owner_of(conn, entity)?;
        if stored_owner != Some(owner_id) {
            return Err(RepoError::NotFound(entity));
        }
    }
    Ok(Scope {
        kind,
        owner_id,
        container,
    })
}

/// Where one stored row currently sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub entity: EntityRef,
    pub scope: Scope,
    pub position: i64,
}

/// Loads the placement of one stored entity.
pub fn load_placement(conn: &Connection, entity: EntityRef) -> RepoResult<Placement> {
    let sql = match entity.kind {
        EntityKind::Project => {
            "SELECT owner_id, position, parent_uuid, NULL FROM projects WHERE uuid = ?1;"
        }
        EntityKind::Task => {
            "SELECT owner_id, position, project_uuid, parent_uuid FROM tasks WHERE uuid = ?1;"
        }
        EntityKind::Habit => {
            "SELECT owner_id, position, project_uuid, NULL FROM habits WHERE uuid = ?1;"
        }
        EntityKind::Label => "SELECT owner_id, position, NULL, NULL FROM labels WHERE uuid = ?1;",
        EntityKind::Filter => {
            "SELECT owner_id, position, NULL, NULL FROM filters WHERE uuid = ?1;"
        }
    };
    let row = conn
        .query_row(sql, [entity.id.to_string()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
            ))
        })
        .optional()?;
    let Some((owner_text, position, first, second)) = row else {
        return Err(RepoError::NotFound(entity));
    };

    let owner_id = parse_uuid(&owner_text, "owner_id")?;
    let first = parse_optional_uuid(first, "container")?;
    let second = parse_optional_uuid(second, "parent_uuid")?;
    let container = match (entity.kind, first, second) {
        (EntityKind::Task, _, Some(parent)) => Container::ParentTask(parent),
        (EntityKind::Task | EntityKind::Habit, Some(project), _) => Container::Project(project),
        (EntityKind::Project, Some(parent), _) => Container::ParentProject(parent),
        _ => Container::Root,
    };

    Ok(Placement {
        entity,
        scope: Scope {
            kind: entity.kind,
            owner_id,
            container,
        },
        position,
    })
}

/// Read-model row of one scope listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeEntry {
    pub id: Uuid,
    pub position: i64,
}

/// Lists `(id, position)` of every item in `scope`, ordered by position.
pub fn list_scope(conn: &Connection, scope: &Scope) -> RepoResult<Vec<ScopeEntry>> {
    let (predicate, values) = scope.predicate();
    let mut stmt = conn.prepare(&format!(
        "SELECT uuid, position FROM {} WHERE {predicate} ORDER BY position ASC, uuid ASC;",
        scope.kind.table()
    ))?;
    let mut rows = stmt.query(params_from_iter(values))?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let id_text: String = row.get(0)?;
        items.push(ScopeEntry {
            id: parse_uuid(&id_text, "uuid")?,
            position: row.get(1)?,
        });
    }
    Ok(items)
}

/// Returns the owner of a stored entity, or `None` when it does not exist.
pub(crate) fn owner_of(conn: &Connection, entity: EntityRef) -> RepoResult<Option<OwnerId>> {
    let owner: Option<String> = conn
        .query_row(
            &format!("SELECT owner_id FROM {} WHERE uuid = ?1;", entity.kind.table()),
            [entity.id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    owner
        .map(|value| parse_uuid(&value, "owner_id"))
        .transpose()
}
