//! Project persistence.
//!
//! # Invariants
//! - Child listing is deterministic: `position ASC, uuid ASC`.
//! - Collaborator rows disappear with their project (`ON DELETE CASCADE`).

use super::{flag, parse_flag, parse_optional_uuid, parse_uuid, RepoError, RepoResult};
use crate::model::project::{Collaborator, CollaboratorGrant, Project, ProjectId};
use crate::model::{EntityKind, EntityRef, OwnerId, UserId};
use rusqlite::{params, Connection, OptionalExtension, Row};

const PROJECT_SELECT_SQL: &str = "SELECT
    uuid,
    owner_id,
    parent_uuid,
    name,
    color,
    is_favorite,
    position,
    is_archived,
    created_at,
    modified_at
FROM projects";

pub(crate) fn insert_project(conn: &Connection, project: &Project) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO projects (
            uuid,
            owner_id,
            parent_uuid,
            name,
            color,
            is_favorite,
            position,
            is_archived,
            created_at,
            modified_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10);",
        params![
            project.id.to_string(),
            project.owner_id.to_string(),
            project.parent_id.map(|value| value.to_string()),
            project.name.as_str(),
            project.color.as_str(),
            flag(project.is_favorite),
            project.position,
            flag(project.is_archived),
            project.created_at,
            project.modified_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn find_project(conn: &Connection, id: ProjectId) -> RepoResult<Option<Project>> {
    let mut stmt = conn.prepare(&format!("{PROJECT_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_project_row(row)?));
    }
    Ok(None)
}

pub(crate) fn require_project(conn: &Connection, id: ProjectId) -> RepoResult<Project> {
    find_project(conn, id)?.ok_or(RepoError::NotFound(EntityRef::new(EntityKind::Project, id)))
}

pub(crate) fn list_project_children(
    conn: &Connection,
    owner_id: OwnerId,
    parent_id: Option<ProjectId>,
) -> RepoResult<Vec<Project>> {
    let mut stmt = conn.prepare(&format!(
        "{PROJECT_SELECT_SQL}
         WHERE owner_id = ?1 AND parent_uuid IS ?2
         ORDER BY position ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query(params![
        owner_id.to_string(),
        parent_id.map(|value| value.to_string())
    ])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_project_row(row)?);
    }
    Ok(items)
}

pub(crate) fn update_project_attrs(
    conn: &Connection,
    project: &Project,
    now_ms: i64,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE projects
         SET name = ?2,
             color = ?3,
             is_favorite = ?4,
             modified_at = ?5
         WHERE uuid = ?1;",
        params![
            project.id.to_string(),
            project.name.as_str(),
            project.color.as_str(),
            flag(project.is_favorite),
            now_ms,
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound(EntityRef::new(
            EntityKind::Project,
            project.id,
        )));
    }
    Ok(())
}

pub(crate) fn projects_changed_since(
    conn: &Connection,
    owner_id: OwnerId,
    since_ms: i64,
) -> RepoResult<Vec<Project>> {
    let mut stmt = conn.prepare(&format!(
        "{PROJECT_SELECT_SQL}
         WHERE owner_id = ?1 AND modified_at > ?2
         ORDER BY modified_at ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query(params![owner_id.to_string(), since_ms])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_project_row(row)?);
    }
    Ok(items)
}

pub(crate) fn upsert_collaborator(
    conn: &Connection,
    project_id: ProjectId,
    collaborator: Collaborator,
) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO project_collaborators (project_uuid, user_id, grant_level)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (project_uuid, user_id) DO UPDATE SET grant_level = excluded.grant_level;",
        params![
            project_id.to_string(),
            collaborator.user_id.to_string(),
            collaborator.grant.as_str(),
        ],
    )?;
    Ok(())
}

/// Returns whether a collaborator row was removed.
pub(crate) fn delete_collaborator(
    conn: &Connection,
    project_id: ProjectId,
    user_id: UserId,
) -> RepoResult<bool> {
    let changed = conn.execute(
        "DELETE FROM project_collaborators WHERE project_uuid = ?1 AND user_id = ?2;",
        params![project_id.to_string(), user_id.to_string()],
    )?;
    Ok(changed > 0)
}

pub(crate) fn list_collaborators(
    conn: &Connection,
    project_id: ProjectId,
) -> RepoResult<Vec<Collaborator>> {
    let mut stmt = conn.prepare(
        "SELECT user_id, grant_level
         FROM project_collaborators
         WHERE project_uuid = ?1
         ORDER BY user_id ASC;",
    )?;
    let mut rows = stmt.query([project_id.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        let user_text: String = row.get(0)?;
        let grant_text: String = row.get(1)?;
        let grant = CollaboratorGrant::parse(&grant_text).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid grant `{grant_text}` in project_collaborators.grant_level"
            ))
        })?;
        items.push(Collaborator {
            user_id: parse_uuid(&user_text, "project_collaborators.user_id")?,
            grant,
        });
    }
    Ok(items)
}

pub(crate) fn collaborator_grant(
    conn: &Connection,
    project_id: ProjectId,
    user_id: UserId,
) -> RepoResult<Option<CollaboratorGrant>> {
    let value: Option<String> = conn
        .query_row(
            "SELECT grant_level
             FROM project_collaborators
             WHERE project_uuid = ?1 AND user_id = ?2;",
            params![project_id.to_string(), user_id.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match value {
        None => Ok(None),
        Some(text) => CollaboratorGrant::parse(&text).map(Some).ok_or_else(|| {
            RepoError::InvalidData(format!(
                "invalid grant `{text}` in project_collaborators.grant_level"
            ))
        }),
    }
}

fn parse_project_row(row: &Row<'_>) -> RepoResult<Project> {
    let id_text: String = row.get("uuid")?;
    let owner_text: String = row.get("owner_id")?;
    Ok(Project {
        id: parse_uuid(&id_text, "projects.uuid")?,
        owner_id: parse_uuid(&owner_text, "projects.owner_id")?,
        parent_id: parse_optional_uuid(row.get("parent_uuid")?, "projects.parent_uuid")?,
        name: row.get("name")?,
        color: row.get("color")?,
        is_favorite: parse_flag(row.get("is_favorite")?, "projects.is_favorite")?,
        position: row.get("position")?,
        is_archived: parse_flag(row.get("is_archived")?, "projects.is_archived")?,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
    })
}
