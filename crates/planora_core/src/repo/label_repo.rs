//! Label persistence.

use super::{parse_uuid, RepoError, RepoResult};
use crate::model::label::{Label, LabelId};
use crate::model::{EntityKind, EntityRef, OwnerId};
use rusqlite::{params, Connection, Row};

const LABEL_SELECT_SQL: &str = "SELECT
    uuid,
    owner_id,
    name,
    color,
    position,
    created_at,
    modified_at
FROM labels";

pub(crate) fn insert_label(conn: &Connection, label: &Label) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO labels (uuid, owner_id, name, color, position, created_at, modified_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
        params![
            label.id.to_string(),
            label.owner_id.to_string(),
            label.name.as_str(),
            label.color.as_str(),
            label.position,
            label.created_at,
            label.modified_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn find_label(conn: &Connection, id: LabelId) -> RepoResult<Option<Label>> {
    let mut stmt = conn.prepare(&format!("{LABEL_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_label_row(row)?));
    }
    Ok(None)
}

pub(crate) fn require_label(conn: &Connection, id: LabelId) -> RepoResult<Label> {
    find_label(conn, id)?.ok_or(RepoError::NotFound(EntityRef::new(EntityKind::Label, id)))
}

pub(crate) fn list_labels(conn: &Connection, owner_id: OwnerId) -> RepoResult<Vec<Label>> {
    let mut stmt = conn.prepare(&format!(
        "{LABEL_SELECT_SQL} WHERE owner_id = ?1 ORDER BY position ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query([owner_id.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_label_row(row)?);
    }
    Ok(items)
}

pub(crate) fn update_label_attrs(conn: &Connection, label: &Label, now_ms: i64) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE labels SET name = ?2, color = ?3, modified_at = ?4 WHERE uuid = ?1;",
        params![
            label.id.to_string(),
            label.name.as_str(),
            label.color.as_str(),
            now_ms,
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound(EntityRef::new(EntityKind::Label, label.id)));
    }
    Ok(())
}

pub(crate) fn labels_changed_since(
    conn: &Connection,
    owner_id: OwnerId,
    since_ms: i64,
) -> RepoResult<Vec<Label>> {
    let mut stmt = conn.prepare(&format!(
        "{LABEL_SELECT_SQL}
         WHERE owner_id = ?1 AND modified_at > ?2
         ORDER BY modified_at ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query(params![owner_id.to_string(), since_ms])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_label_row(row)?);
    }
    Ok(items)
}

fn parse_label_row(row: &Row<'_>) -> RepoResult<Label> {
    let id_text: String = row.get("uuid")?;
    let owner_text: String = row.get("owner_id")?;
    Ok(Label {
        id: parse_uuid(&id_text, "labels.uuid")?,
        owner_id: parse_uuid(&owner_text, "labels.owner_id")?,
        name: row.get("name")?,
        color: row.get("color")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
    })
}
