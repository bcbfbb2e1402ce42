//! Saved filter persistence.

use super::{flag, parse_flag, parse_uuid, RepoError, RepoResult};
use crate::model::filter::{Filter, FilterId};
use crate::model::{EntityKind, EntityRef, OwnerId};
use rusqlite::{params, Connection, Row};

const FILTER_SELECT_SQL: &str = "SELECT
    uuid,
    owner_id,
    name,
    query,
    color,
    is_favorite,
    position,
    created_at,
    modified_at
FROM filters";

pub(crate) fn insert_filter(conn: &Connection, filter: &Filter) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO filters (
            uuid,
            owner_id,
            name,
            query,
            color,
            is_favorite,
            position,
            created_at,
            modified_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9);",
        params![
            filter.id.to_string(),
            filter.owner_id.to_string(),
            filter.name.as_str(),
            filter.query.as_str(),
            filter.color.as_str(),
            flag(filter.is_favorite),
            filter.position,
            filter.created_at,
            filter.modified_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn find_filter(conn: &Connection, id: FilterId) -> RepoResult<Option<Filter>> {
    let mut stmt = conn.prepare(&format!("{FILTER_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_filter_row(row)?));
    }
    Ok(None)
}

pub(crate) fn require_filter(conn: &Connection, id: FilterId) -> RepoResult<Filter> {
    find_filter(conn, id)?.ok_or(RepoError::NotFound(EntityRef::new(EntityKind::Filter, id)))
}

pub(crate) fn list_filters(conn: &Connection, owner_id: OwnerId) -> RepoResult<Vec<Filter>> {
    let mut stmt = conn.prepare(&format!(
        "{FILTER_SELECT_SQL} WHERE owner_id = ?1 ORDER BY position ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query([owner_id.to_string()])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_filter_row(row)?);
    }
    Ok(items)
}

pub(crate) fn update_filter_attrs(
    conn: &Connection,
    filter: &Filter,
    now_ms: i64,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE filters
         SET name = ?2,
             query = ?3,
             color = ?4,
             is_favorite = ?5,
             modified_at = ?6
         WHERE uuid = ?1;",
        params![
            filter.id.to_string(),
            filter.name.as_str(),
            filter.query.as_str(),
            filter.color.as_str(),
            flag(filter.is_favorite),
            now_ms,
        ],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound(EntityRef::new(
            EntityKind::Filter,
            filter.id,
        )));
    }
    Ok(())
}

pub(crate) fn filters_changed_since(
    conn: &Connection,
    owner_id: OwnerId,
    since_ms: i64,
) -> RepoResult<Vec<Filter>> {
    let mut stmt = conn.prepare(&format!(
        "{FILTER_SELECT_SQL}
         WHERE owner_id = ?1 AND modified_at > ?2
         ORDER BY modified_at ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query(params![owner_id.to_string(), since_ms])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_filter_row(row)?);
    }
    Ok(items)
}

fn parse_filter_row(row: &Row<'_>) -> RepoResult<Filter> {
    let id_text: String = row.get("uuid")?;
    let owner_text: String = row.get("owner_id")?;
    Ok(Filter {
        id: parse_uuid(&id_text, "filters.uuid")?,
        owner_id: parse_uuid(&owner_text, "filters.owner_id")?,
        name: row.get("name")?,
        query: row.get("query")?,
        color: row.get("color")?,
        is_favorite: parse_flag(row.get("is_favorite")?, "filters.is_favorite")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
    })
}
