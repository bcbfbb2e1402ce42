//! Habit persistence.

use super::{flag, parse_flag, parse_optional_uuid, parse_uuid, RepoError, RepoResult};
use crate::model::habit::{Habit, HabitId, HabitPolarity};
use crate::model::project::ProjectId;
use crate::model::{EntityKind, EntityRef, OwnerId};
use rusqlite::{params, Connection, Row};

const HABIT_SELECT_SQL: &str = "SELECT
    uuid,
    owner_id,
    project_uuid,
    title,
    is_positive,
    is_negative,
    positive_count,
    negative_count,
    position,
    is_archived,
    created_at,
    modified_at
FROM habits";

pub(crate) fn insert_habit(conn: &Connection, habit: &Habit) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO habits (
            uuid,
            owner_id,
            project_uuid,
            title,
            is_positive,
            is_negative,
            positive_count,
            negative_count,
            position,
            is_archived,
            created_at,
            modified_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);",
        params![
            habit.id.to_string(),
            habit.owner_id.to_string(),
            habit.project_id.map(|value| value.to_string()),
            habit.title.as_str(),
            flag(habit.is_positive),
            flag(habit.is_negative),
            habit.positive_count,
            habit.negative_count,
            habit.position,
            flag(habit.is_archived),
            habit.created_at,
            habit.modified_at,
        ],
    )?;
    Ok(())
}

pub(crate) fn find_habit(conn: &Connection, id: HabitId) -> RepoResult<Option<Habit>> {
    let mut stmt = conn.prepare(&format!("{HABIT_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_habit_row(row)?));
    }
    Ok(None)
}

pub(crate) fn require_habit(conn: &Connection, id: HabitId) -> RepoResult<Habit> {
    find_habit(conn, id)?.ok_or(RepoError::NotFound(EntityRef::new(EntityKind::Habit, id)))
}

pub(crate) fn list_habits_in_scope(
    conn: &Connection,
    owner_id: OwnerId,
    project_id: Option<ProjectId>,
) -> RepoResult<Vec<Habit>> {
    let mut stmt = conn.prepare(&format!(
        "{HABIT_SELECT_SQL}
         WHERE owner_id = ?1 AND project_uuid IS ?2
         ORDER BY position ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query(params![
        owner_id.to_string(),
        project_id.map(|value| value.to_string())
    ])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_habit_row(row)?);
    }
    Ok(items)
}

pub(crate) fn increment_habit_counter(
    conn: &Connection,
    id: HabitId,
    polarity: HabitPolarity,
    now_ms: i64,
) -> RepoResult<()> {
    let sql = match polarity {
        HabitPolarity::Positive => {
            "UPDATE habits SET positive_count = positive_count + 1, modified_at = ?2 WHERE uuid = ?1;"
        }
        HabitPolarity::Negative => {
            "UPDATE habits SET negative_count = negative_count + 1, modified_at = ?2 WHERE uuid = ?1;"
        }
    };
    let changed = conn.execute(sql, params![id.to_string(), now_ms])?;
    ensure_changed(changed, id)
}

pub(crate) fn reset_habit_counters(conn: &Connection, id: HabitId, now_ms: i64) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE habits
         SET positive_count = 0,
             negative_count = 0,
             modified_at = ?2
         WHERE uuid = ?1;",
        params![id.to_string(), now_ms],
    )?;
    ensure_changed(changed, id)
}

pub(crate) fn habits_changed_since(
    conn: &Connection,
    owner_id: OwnerId,
    since_ms: i64,
) -> RepoResult<Vec<Habit>> {
    let mut stmt = conn.prepare(&format!(
        "{HABIT_SELECT_SQL}
         WHERE owner_id = ?1 AND modified_at > ?2
         ORDER BY modified_at ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query(params![owner_id.to_string(), since_ms])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_habit_row(row)?);
    }
    Ok(items)
}

fn ensure_changed(changed: usize, id: HabitId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound(EntityRef::new(EntityKind::Habit, id)));
    }
    Ok(())
}

fn parse_habit_row(row: &Row<'_>) -> RepoResult<Habit> {
    let id_text: String = row.get("uuid")?;
    let owner_text: String = row.get("owner_id")?;
    Ok(Habit {
        id: parse_uuid(&id_text, "habits.uuid")?,
        owner_id: parse_uuid(&owner_text, "habits.owner_id")?,
        project_id: parse_optional_uuid(row.get("project_uuid")?, "habits.project_uuid")?,
        title: row.get("title")?,
        is_positive: parse_flag(row.get("is_positive")?, "habits.is_positive")?,
        is_negative: parse_flag(row.get("is_negative")?, "habits.is_negative")?,
        positive_count: row.get("positive_count")?,
        negative_count: row.get("negative_count")?,
        position: row.get("position")?,
        is_archived: parse_flag(row.get("is_archived")?, "habits.is_archived")?,
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
    })
}
