//! Position Allocator.
//!
//! # Responsibility
//! - Compute the slot a new or moved item takes inside a scope.
//! - Run the required shift before the slot is written.
//!
//! # Invariants
//! - Shift always precedes insert/assign inside the caller's transaction.
//! - A move never compacts the origin scope; the vacated slot stays a gap.
//! - Appending to an empty scope yields 1; otherwise `max + 1`.

use super::renumber::shift_positions_greater_than;
use super::scope::{Container, Placement, Scope};
use crate::model::EntityKind;
use crate::repo::{RepoError, RepoResult};
use rusqlite::{params, params_from_iter, Connection};

/// Returns `max(position) + 1` for `scope`, or 1 for an empty scope.
pub fn append_position(conn: &Connection, scope: &Scope) -> RepoResult<i64> {
    let (predicate, values) = scope.predicate();
    let next = conn.query_row(
        &format!(
            "SELECT COALESCE(MAX(position), 0) + 1 FROM {} WHERE {predicate};",
            scope.kind.table()
        ),
        params_from_iter(values),
        |row| row.get(0),
    )?;
    Ok(next)
}

/// Frees `pivot_position` by shifting `>= pivot_position`; returns it.
pub fn insert_before(
    conn: &Connection,
    scope: &Scope,
    pivot_position: i64,
    now_ms: i64,
) -> RepoResult<i64> {
    shift_positions_greater_than(conn, scope, pivot_position, true, now_ms)?;
    Ok(pivot_position)
}

/// Frees `pivot_position + 1` by shifting `> pivot_position`; returns it.
pub fn insert_after(
    conn: &Connection,
    scope: &Scope,
    pivot_position: i64,
    now_ms: i64,
) -> RepoResult<i64> {
    shift_positions_greater_than(conn, scope, pivot_position, false, now_ms)?;
    Ok(pivot_position + 1)
}

/// Frees position 1 by shifting the whole scope; returns 1.
pub fn insert_first(conn: &Connection, scope: &Scope, now_ms: i64) -> RepoResult<i64> {
    shift_positions_greater_than(conn, scope, 1, true, now_ms)?;
    Ok(1)
}

/// Moves an item right after `pivot_position` inside `target`.
///
/// When `target` differs from the item's current scope this re-scopes the
/// item. Returns the assigned position.
pub fn move_after(
    conn: &Connection,
    moved: &Placement,
    target: &Scope,
    pivot_position: i64,
    now_ms: i64,
) -> RepoResult<i64> {
    let slot = insert_after(conn, target, pivot_position, now_ms)?;
    assign_slot(conn, moved, target, slot, now_ms)?;
    Ok(slot)
}

/// Moves an item to position 1 of `target`.
pub fn move_as_first(
    conn: &Connection,
    moved: &Placement,
    target: &Scope,
    now_ms: i64,
) -> RepoResult<i64> {
    let slot = insert_first(conn, target, now_ms)?;
    assign_slot(conn, moved, target, slot, now_ms)?;
    Ok(slot)
}

/// Moves an item to the end of `target` (re-scoping append).
pub fn move_to_end(
    conn: &Connection,
    moved: &Placement,
    target: &Scope,
    now_ms: i64,
) -> RepoResult<i64> {
    if moved.scope == *target {
        return Ok(moved.position);
    }
    let slot = append_position(conn, target)?;
    assign_slot(conn, moved, target, slot, now_ms)?;
    Ok(slot)
}

/// Writes container columns and position of one row.
fn assign_slot(
    conn: &Connection,
    moved: &Placement,
    target: &Scope,
    position: i64,
    now_ms: i64,
) -> RepoResult<()> {
    if moved.entity.kind != target.kind || moved.scope.owner_id != target.owner_id {
        return Err(RepoError::InvalidData(format!(
            "cannot place {} into scope {target}",
            moved.entity
        )));
    }

    let id = moved.entity.id.to_string();
    let changed = match (target.kind, target.container) {
        (EntityKind::Project, container) => conn.execute(
            "UPDATE projects
             SET parent_uuid = ?2, position = ?3, modified_at = ?4
             WHERE uuid = ?1;",
            params![id, container_id(container), position, now_ms],
        )?,
        (EntityKind::Task, Container::ParentTask(parent)) => conn.execute(
            "UPDATE tasks
             SET parent_uuid = ?2,
                 project_uuid = (SELECT project_uuid FROM tasks WHERE uuid = ?2),
                 position = ?3,
                 modified_at = ?4
             WHERE uuid = ?1;",
            params![id, parent.to_string(), position, now_ms],
        )?,
        (EntityKind::Task, container) => conn.execute(
            "UPDATE tasks
             SET parent_uuid = NULL, project_uuid = ?2, position = ?3, modified_at = ?4
             WHERE uuid = ?1;",
            params![id, container_id(container), position, now_ms],
        )?,
        (EntityKind::Habit, container) => conn.execute(
            "UPDATE habits
             SET project_uuid = ?2, position = ?3, modified_at = ?4
             WHERE uuid = ?1;",
            params![id, container_id(container), position, now_ms],
        )?,
        (kind @ (EntityKind::Label | EntityKind::Filter), _) => conn.execute(
            &format!(
                "UPDATE {} SET position = ?2, modified_at = ?3 WHERE uuid = ?1;",
                kind.table()
            ),
            params![id, position, now_ms],
        )?,
    };
    if changed == 0 {
        return Err(RepoError::NotFound(moved.entity));
    }
    Ok(())
}

fn container_id(container: Container) -> Option<String> {
    container.entity().map(|entity| entity.id.to_string())
}
