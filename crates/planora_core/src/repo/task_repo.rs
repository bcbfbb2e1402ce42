//! Task persistence, including the `task_labels` association.
//!
//! # Invariants
//! - `Task::labels` is always loaded sorted by label uuid.
//! - Replacing labels touches `modified_at` of the task.

use super::{
    flag, parse_flag, parse_optional_uuid, parse_uuid, uuid_in_list, RepoError, RepoResult,
};
use crate::model::label::LabelId;
use crate::model::project::ProjectId;
use crate::model::task::{Priority, Task, TaskId};
use crate::model::{EntityKind, EntityRef, OwnerId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};

const TASK_SELECT_SQL: &str = "SELECT
    uuid,
    owner_id,
    project_uuid,
    parent_uuid,
    title,
    description,
    priority,
    due_at,
    position,
    is_completed,
    is_archived,
    created_at,
    modified_at
FROM tasks";

pub(crate) fn insert_task(conn: &Connection, task: &Task) -> RepoResult<()> {
    conn.execute(
        "INSERT INTO tasks (
            uuid,
            owner_id,
            project_uuid,
            parent_uuid,
            title,
            description,
            priority,
            due_at,
            position,
            is_completed,
            is_archived,
            created_at,
            modified_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13);",
        params![
            task.id.to_string(),
            task.owner_id.to_string(),
            task.project_id.map(|value| value.to_string()),
            task.parent_id.map(|value| value.to_string()),
            task.title.as_str(),
            task.description.as_str(),
            task.priority.as_i64(),
            task.due_at,
            task.position,
            flag(task.is_completed),
            flag(task.is_archived),
            task.created_at,
            task.modified_at,
        ],
    )?;
    insert_task_labels(conn, task.id, &task.labels)?;
    Ok(())
}

pub(crate) fn find_task(conn: &Connection, id: TaskId) -> RepoResult<Option<Task>> {
    let mut stmt = conn.prepare(&format!("{TASK_SELECT_SQL} WHERE uuid = ?1;"))?;
    let mut rows = stmt.query([id.to_string()])?;
    let Some(row) = rows.next()? else {
        return Ok(None);
    };
    let mut task = parse_task_row(row)?;
    task.labels = load_task_labels(conn, task.id)?;
    Ok(Some(task))
}

pub(crate) fn require_task(conn: &Connection, id: TaskId) -> RepoResult<Task> {
    find_task(conn, id)?.ok_or(RepoError::NotFound(EntityRef::new(EntityKind::Task, id)))
}

/// Lists tasks ordered inside one scope: children of `parent_id` when set,
/// otherwise top-level tasks of `project_id` (or unfiled when both are `None`).
pub(crate) fn list_tasks_in_scope(
    conn: &Connection,
    owner_id: OwnerId,
    project_id: Option<ProjectId>,
    parent_id: Option<TaskId>,
) -> RepoResult<Vec<Task>> {
    let (sql, values): (String, Vec<Value>) = match parent_id {
        Some(parent_id) => (
            format!(
                "{TASK_SELECT_SQL} WHERE owner_id = ? AND parent_uuid = ? ORDER BY position ASC, uuid ASC;"
            ),
            vec![
                Value::Text(owner_id.to_string()),
                Value::Text(parent_id.to_string()),
            ],
        ),
        None => (
            format!(
                "{TASK_SELECT_SQL}
                 WHERE owner_id = ? AND project_uuid IS ? AND parent_uuid IS NULL
                 ORDER BY position ASC, uuid ASC;"
            ),
            vec![
                Value::Text(owner_id.to_string()),
                project_id.map_or(Value::Null, |value| Value::Text(value.to_string())),
            ],
        ),
    };
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params_from_iter(values))?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_task_row(row)?);
    }
    for task in &mut items {
        task.labels = load_task_labels(conn, task.id)?;
    }
    Ok(items)
}

pub(crate) fn update_task_content(
    conn: &Connection,
    id: TaskId,
    title: &str,
    description: &str,
    now_ms: i64,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE tasks SET title = ?2, description = ?3, modified_at = ?4 WHERE uuid = ?1;",
        params![id.to_string(), title, description, now_ms],
    )?;
    ensure_changed(changed, id)
}

pub(crate) fn update_task_priority(
    conn: &Connection,
    id: TaskId,
    priority: Priority,
    now_ms: i64,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE tasks SET priority = ?2, modified_at = ?3 WHERE uuid = ?1;",
        params![id.to_string(), priority.as_i64(), now_ms],
    )?;
    ensure_changed(changed, id)
}

pub(crate) fn update_task_due(
    conn: &Connection,
    id: TaskId,
    due_at: Option<i64>,
    now_ms: i64,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE tasks SET due_at = ?2, modified_at = ?3 WHERE uuid = ?1;",
        params![id.to_string(), due_at, now_ms],
    )?;
    ensure_changed(changed, id)
}

pub(crate) fn set_task_completed(
    conn: &Connection,
    id: TaskId,
    is_completed: bool,
    now_ms: i64,
) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE tasks SET is_completed = ?2, modified_at = ?3 WHERE uuid = ?1;",
        params![id.to_string(), flag(is_completed), now_ms],
    )?;
    ensure_changed(changed, id)
}

/// Replaces the full label set of one task.
pub(crate) fn replace_task_labels(
    conn: &Connection,
    id: TaskId,
    labels: &[LabelId],
    now_ms: i64,
) -> RepoResult<()> {
    conn.execute(
        "DELETE FROM task_labels WHERE task_uuid = ?1;",
        [id.to_string()],
    )?;
    insert_task_labels(conn, id, labels)?;
    let changed = conn.execute(
        "UPDATE tasks SET modified_at = ?2 WHERE uuid = ?1;",
        params![id.to_string(), now_ms],
    )?;
    ensure_changed(changed, id)
}

/// Counts labels from `labels` owned by `owner_id`.
pub(crate) fn count_owned_labels(
    conn: &Connection,
    owner_id: OwnerId,
    labels: &[LabelId],
) -> RepoResult<usize> {
    if labels.is_empty() {
        return Ok(0);
    }
    let (placeholders, mut values) = uuid_in_list(labels);
    values.insert(0, Value::Text(owner_id.to_string()));
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM labels WHERE owner_id = ? AND uuid IN ({placeholders});"),
        params_from_iter(values),
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

/// Stamps `modified_at` of every task carrying `label`. Returns touched rows.
pub(crate) fn touch_tasks_with_label(
    conn: &Connection,
    label: LabelId,
    now_ms: i64,
) -> RepoResult<usize> {
    let changed = conn.execute(
        "UPDATE tasks
         SET modified_at = ?2
         WHERE uuid IN (SELECT task_uuid FROM task_labels WHERE label_uuid = ?1);",
        params![label.to_string(), now_ms],
    )?;
    Ok(changed)
}

pub(crate) fn tasks_changed_since(
    conn: &Connection,
    owner_id: OwnerId,
    since_ms: i64,
) -> RepoResult<Vec<Task>> {
    let mut stmt = conn.prepare(&format!(
        "{TASK_SELECT_SQL}
         WHERE owner_id = ?1 AND modified_at > ?2
         ORDER BY modified_at ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query(params![owner_id.to_string(), since_ms])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_task_row(row)?);
    }
    for task in &mut items {
        task.labels = load_task_labels(conn, task.id)?;
    }
    Ok(items)
}

fn insert_task_labels(conn: &Connection, id: TaskId, labels: &[LabelId]) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "INSERT OR IGNORE INTO task_labels (task_uuid, label_uuid) VALUES (?1, ?2);",
    )?;
    for label in labels {
        stmt.execute(params![id.to_string(), label.to_string()])?;
    }
    Ok(())
}

fn load_task_labels(conn: &Connection, id: TaskId) -> RepoResult<Vec<LabelId>> {
    let mut stmt = conn.prepare(
        "SELECT label_uuid FROM task_labels WHERE task_uuid = ?1 ORDER BY label_uuid ASC;",
    )?;
    let mut rows = stmt.query([id.to_string()])?;
    let mut labels = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        labels.push(parse_uuid(&value, "task_labels.label_uuid")?);
    }
    Ok(labels)
}

fn ensure_changed(changed: usize, id: TaskId) -> RepoResult<()> {
    if changed == 0 {
        return Err(RepoError::NotFound(EntityRef::new(EntityKind::Task, id)));
    }
    Ok(())
}

fn parse_task_row(row: &Row<'_>) -> RepoResult<Task> {
    let id_text: String = row.get("uuid")?;
    let owner_text: String = row.get("owner_id")?;
    Ok(Task {
        id: parse_uuid(&id_text, "tasks.uuid")?,
        owner_id: parse_uuid(&owner_text, "tasks.owner_id")?,
        project_id: parse_optional_uuid(row.get("project_uuid")?, "tasks.project_uuid")?,
        parent_id: parse_optional_uuid(row.get("parent_uuid")?, "tasks.parent_uuid")?,
        title: row.get("title")?,
        description: row.get("description")?,
        priority: Priority::from_i64(row.get("priority")?)?,
        due_at: row.get("due_at")?,
        position: row.get("position")?,
        is_completed: parse_flag(row.get("is_completed")?, "tasks.is_completed")?,
        is_archived: parse_flag(row.get("is_archived")?, "tasks.is_archived")?,
        labels: Vec::new(),
        created_at: row.get("created_at")?,
        modified_at: row.get("modified_at")?,
    })
}
