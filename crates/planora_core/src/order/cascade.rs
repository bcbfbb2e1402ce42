//! Tree Cascade Engine.
//!
//! # Responsibility
//! - Compute transitive closures of the project and task trees.
//! - Propagate delete/archive/complete from a root to its descendants and
//!   attached collections.
//! - Duplicate tasks, habits and projects next to their source.
//!
//! # Invariants
//! - Tree walks use an explicit stack with a visited set; a corrupted cycle
//!   terminates instead of recursing forever.
//! - Delete snapshots are taken before the delete executes; the store's
//!   `ON DELETE CASCADE` keys remove the subtree itself.
//! - Archive cascades down; unarchive touches the root only.
//! - Every cascaded row gets `modified_at = now_ms`.

use super::allocator::insert_after;
use super::scope::load_placement;
use crate::model::habit::{Habit, HabitId};
use crate::model::project::{Project, ProjectId};
use crate::model::task::{Task, TaskId};
use crate::model::{EntityKind, EntityRef, OwnerId, UserId};
use crate::repo::habit_repo::{insert_habit, list_habits_in_scope};
use crate::repo::project_repo::insert_project;
use crate::repo::task_repo::{insert_task, list_tasks_in_scope};
use crate::repo::{parse_uuid, uuid_in_list, RepoError, RepoResult};
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection};
use std::collections::{BTreeSet, HashMap, HashSet};
use uuid::Uuid;

/// Entities removed by one delete, captured before the delete runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteSnapshot {
    pub root: EntityRef,
    pub owner_id: OwnerId,
    /// Root first when the root is a project.
    pub projects: Vec<ProjectId>,
    /// Root first when the root is a task.
    pub tasks: Vec<TaskId>,
    pub habits: Vec<HabitId>,
    /// Collaborators of any project touched by the delete, deduplicated.
    pub collaborators: Vec<UserId>,
}

impl DeleteSnapshot {
    /// Every removed entity, root first.
    pub fn entities(&self) -> Vec<EntityRef> {
        let mut items = Vec::with_capacity(self.projects.len() + self.tasks.len() + self.habits.len());
        items.extend(
            self.projects
                .iter()
                .map(|id| EntityRef::new(EntityKind::Project, *id)),
        );
        items.extend(self.tasks.iter().map(|id| EntityRef::new(EntityKind::Task, *id)));
        items.extend(
            self.habits
                .iter()
                .map(|id| EntityRef::new(EntityKind::Habit, *id)),
        );
        items
    }
}

/// Row counts touched by a project archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveOutcome {
    pub projects: usize,
    pub tasks: usize,
    pub habits: usize,
}

/// Returns `root` followed by all descendant project ids (depth-first).
pub fn collect_project_subtree(conn: &Connection, root: ProjectId) -> RepoResult<Vec<ProjectId>> {
    collect_subtree(
        conn,
        root,
        "SELECT uuid FROM projects WHERE parent_uuid = ?1 ORDER BY position DESC;",
    )
}

/// Returns `root` followed by all descendant task ids (depth-first).
pub fn collect_task_subtree(conn: &Connection, root: TaskId) -> RepoResult<Vec<TaskId>> {
    collect_subtree(
        conn,
        root,
        "SELECT uuid FROM tasks WHERE parent_uuid = ?1 ORDER BY position DESC;",
    )
}

fn collect_subtree(conn: &Connection, root: Uuid, children_sql: &str) -> RepoResult<Vec<Uuid>> {
    let mut stmt = conn.prepare(children_sql)?;
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    let mut stack = vec![root];
    while let Some(current) = stack.pop() {
        if !visited.insert(current) {
            continue;
        }
        order.push(current);
        let mut rows = stmt.query([current.to_string()])?;
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            stack.push(parse_uuid(&value, "uuid")?);
        }
    }
    Ok(order)
}

/// Snapshot of everything a project delete removes.
pub fn snapshot_project_delete(
    conn: &Connection,
    root: ProjectId,
    owner_id: OwnerId,
) -> RepoResult<DeleteSnapshot> {
    let projects = collect_project_subtree(conn, root)?;
    let tasks = ids_where_project_in(conn, "tasks", &projects)?;
    let habits = ids_where_project_in(conn, "habits", &projects)?;
    let collaborators = collaborators_of(conn, &projects)?;
    Ok(DeleteSnapshot {
        root: EntityRef::new(EntityKind::Project, root),
        owner_id,
        projects,
        tasks,
        habits,
        collaborators,
    })
}

/// Snapshot of everything a task delete removes.
pub fn snapshot_task_delete(conn: &Connection, task: &Task) -> RepoResult<DeleteSnapshot> {
    let tasks = collect_task_subtree(conn, task.id)?;
    let collaborators = match task.project_id {
        Some(project_id) => collaborators_of(conn, &[project_id])?,
        None => Vec::new(),
    };
    Ok(DeleteSnapshot {
        root: EntityRef::new(EntityKind::Task, task.id),
        owner_id: task.owner_id,
        projects: Vec::new(),
        tasks,
        habits: Vec::new(),
        collaborators,
    })
}

/// Deletes the root row; dependent rows go through `ON DELETE CASCADE`.
pub fn delete_root(conn: &Connection, root: EntityRef) -> RepoResult<()> {
    let changed = conn.execute(
        &format!("DELETE FROM {} WHERE uuid = ?1;", root.kind.table()),
        [root.id.to_string()],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound(root));
    }
    debug!(
        "event=cascade_delete module=order status=ok kind={}",
        root.kind
    );
    Ok(())
}

/// Archives `root`, its descendant projects, and their tasks and habits.
pub fn archive_project_subtree(
    conn: &Connection,
    root: ProjectId,
    now_ms: i64,
) -> RepoResult<ArchiveOutcome> {
    let projects = collect_project_subtree(conn, root)?;
    let outcome = ArchiveOutcome {
        projects: set_archived_where(conn, "projects", "uuid", &projects, now_ms)?,
        tasks: set_archived_where(conn, "tasks", "project_uuid", &projects, now_ms)?,
        habits: set_archived_where(conn, "habits", "project_uuid", &projects, now_ms)?,
    };
    debug!(
        "event=cascade_archive module=order status=ok projects={} tasks={} habits={}",
        outcome.projects, outcome.tasks, outcome.habits
    );
    Ok(outcome)
}

/// Clears `is_archived` on one project only.
pub fn unarchive_project(conn: &Connection, root: ProjectId, now_ms: i64) -> RepoResult<()> {
    let changed = conn.execute(
        "UPDATE projects SET is_archived = 0, modified_at = ?2 WHERE uuid = ?1;",
        params![root.to_string(), now_ms],
    )?;
    if changed == 0 {
        return Err(RepoError::NotFound(EntityRef::new(EntityKind::Project, root)));
    }
    Ok(())
}

/// Archives every completed, not yet archived task of one project.
pub fn archive_completed_tasks(
    conn: &Connection,
    project: ProjectId,
    now_ms: i64,
) -> RepoResult<usize> {
    let changed = conn.execute(
        "UPDATE tasks
         SET is_archived = 1, modified_at = ?2
         WHERE project_uuid = ?1
           AND is_completed = 1
           AND is_archived = 0;",
        params![project.to_string(), now_ms],
    )?;
    Ok(changed)
}

/// Marks `root` and all its sub-tasks completed. Returns touched rows.
pub fn complete_task_subtree(conn: &Connection, root: TaskId, now_ms: i64) -> RepoResult<usize> {
    let tasks = collect_task_subtree(conn, root)?;
    let (placeholders, mut values) = uuid_in_list(&tasks);
    values.insert(0, Value::Integer(now_ms));
    let changed = conn.execute(
        &format!(
            "UPDATE tasks SET is_completed = 1, modified_at = ? WHERE uuid IN ({placeholders});"
        ),
        params_from_iter(values),
    )?;
    Ok(changed)
}

/// Rewrites the project of every strict descendant of `root`.
///
/// Sub-task positions are keyed by their parent, so they stay valid.
pub fn reassign_task_subtree_project(
    conn: &Connection,
    root: TaskId,
    project: Option<ProjectId>,
    now_ms: i64,
) -> RepoResult<usize> {
    let descendants: Vec<TaskId> = collect_task_subtree(conn, root)?
        .into_iter()
        .skip(1)
        .collect();
    if descendants.is_empty() {
        return Ok(0);
    }
    let (placeholders, mut values) = uuid_in_list(&descendants);
    values.insert(
        0,
        project.map_or(Value::Null, |id| Value::Text(id.to_string())),
    );
    values.insert(1, Value::Integer(now_ms));
    let changed = conn.execute(
        &format!(
            "UPDATE tasks SET project_uuid = ?, modified_at = ? WHERE uuid IN ({placeholders});"
        ),
        params_from_iter(values),
    )?;
    Ok(changed)
}

/// Inserts a sibling copy of `source` right after it. Sub-tasks are not
/// copied; completion and archive flags start cleared.
pub fn duplicate_task(conn: &Connection, source: &Task, now_ms: i64) -> RepoResult<Task> {
    let placement = load_placement(conn, EntityRef::new(EntityKind::Task, source.id))?;
    let position = insert_after(conn, &placement.scope, placement.position, now_ms)?;
    let copy = Task {
        id: Uuid::new_v4(),
        position,
        is_completed: false,
        is_archived: false,
        created_at: now_ms,
        modified_at: now_ms,
        ..source.clone()
    };
    insert_task(conn, &copy)?;
    Ok(copy)
}

/// Inserts a sibling copy of `source` right after it with zeroed counters.
pub fn duplicate_habit(conn: &Connection, source: &Habit, now_ms: i64) -> RepoResult<Habit> {
    let placement = load_placement(conn, EntityRef::new(EntityKind::Habit, source.id))?;
    let position = insert_after(conn, &placement.scope, placement.position, now_ms)?;
    let copy = Habit {
        id: Uuid::new_v4(),
        position,
        positive_count: 0,
        negative_count: 0,
        is_archived: false,
        created_at: now_ms,
        modified_at: now_ms,
        ..source.clone()
    };
    insert_habit(conn, &copy)?;
    Ok(copy)
}

/// Inserts a copy of `source` right after it, together with its task tree
/// and habits. Child projects are not copied.
pub fn duplicate_project(conn: &Connection, source: &Project, now_ms: i64) -> RepoResult<Project> {
    let placement = load_placement(conn, EntityRef::new(EntityKind::Project, source.id))?;
    let position = insert_after(conn, &placement.scope, placement.position, now_ms)?;
    let copy = Project {
        id: Uuid::new_v4(),
        position,
        is_archived: false,
        created_at: now_ms,
        modified_at: now_ms,
        ..source.clone()
    };
    insert_project(conn, &copy)?;

    let copied_tasks = copy_task_tree(conn, source, copy.id, now_ms)?;
    let mut copied_habits = 0usize;
    for habit in list_habits_in_scope(conn, source.owner_id, Some(source.id))? {
        insert_habit(
            conn,
            &Habit {
                id: Uuid::new_v4(),
                project_id: Some(copy.id),
                positive_count: 0,
                negative_count: 0,
                is_archived: false,
                created_at: now_ms,
                modified_at: now_ms,
                ..habit
            },
        )?;
        copied_habits += 1;
    }

    debug!(
        "event=cascade_duplicate module=order status=ok kind=project tasks={} habits={}",
        copied_tasks, copied_habits
    );
    Ok(copy)
}

/// Copies the task forest of `source` into `target`. The target scopes are
/// empty, so source positions are reused verbatim.
fn copy_task_tree(
    conn: &Connection,
    source: &Project,
    target: ProjectId,
    now_ms: i64,
) -> RepoResult<usize> {
    let mut id_map: HashMap<TaskId, TaskId> = HashMap::new();
    let mut queue: Vec<Task> = list_tasks_in_scope(conn, source.owner_id, Some(source.id), None)?;
    queue.reverse();

    while let Some(task) = queue.pop() {
        if id_map.contains_key(&task.id) {
            continue;
        }
        let parent_id = match task.parent_id {
            Some(parent) => Some(*id_map.get(&parent).ok_or_else(|| {
                RepoError::InvalidData(format!("sub-task {} copied before its parent", task.id))
            })?),
            None => None,
        };
        let copy_id = Uuid::new_v4();
        insert_task(
            conn,
            &Task {
                id: copy_id,
                project_id: Some(target),
                parent_id,
                is_archived: false,
                created_at: now_ms,
                modified_at: now_ms,
                ..task.clone()
            },
        )?;
        id_map.insert(task.id, copy_id);

        let mut children = list_tasks_in_scope(conn, source.owner_id, None, Some(task.id))?;
        children.reverse();
        queue.extend(children);
    }
    Ok(id_map.len())
}

fn ids_where_project_in(
    conn: &Connection,
    table: &'static str,
    projects: &[ProjectId],
) -> RepoResult<Vec<Uuid>> {
    if projects.is_empty() {
        return Ok(Vec::new());
    }
    let (placeholders, values) = uuid_in_list(projects);
    let mut stmt = conn.prepare(&format!(
        "SELECT uuid FROM {table} WHERE project_uuid IN ({placeholders}) ORDER BY position ASC, uuid ASC;"
    ))?;
    let mut rows = stmt.query(params_from_iter(values))?;
    let mut ids = Vec::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        ids.push(parse_uuid(&value, "uuid")?);
    }
    Ok(ids)
}

fn collaborators_of(conn: &Connection, projects: &[ProjectId]) -> RepoResult<Vec<UserId>> {
    if projects.is_empty() {
        return Ok(Vec::new());
    }
    let (placeholders, values) = uuid_in_list(projects);
    let mut stmt = conn.prepare(&format!(
        "SELECT user_id FROM project_collaborators WHERE project_uuid IN ({placeholders});"
    ))?;
    let mut rows = stmt.query(params_from_iter(values))?;
    let mut users = BTreeSet::new();
    while let Some(row) = rows.next()? {
        let value: String = row.get(0)?;
        users.insert(parse_uuid(&value, "project_collaborators.user_id")?);
    }
    Ok(users.into_iter().collect())
}

fn set_archived_where(
    conn: &Connection,
    table: &'static str,
    column: &'static str,
    ids: &[Uuid],
    now_ms: i64,
) -> RepoResult<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let (placeholders, mut values) = uuid_in_list(ids);
    values.insert(0, Value::Integer(now_ms));
    let changed = conn.execute(
        &format!(
            "UPDATE {table}
             SET is_archived = 1, modified_at = ?
             WHERE {column} IN ({placeholders})
               AND is_archived = 0;"
        ),
        params_from_iter(values),
    )?;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::collect_subtree;
    use crate::db::open_db_in_memory;
    use rusqlite::params;
    use uuid::Uuid;

    #[test]
    fn subtree_walk_terminates_on_cycles() {
        let conn = open_db_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
        let owner = Uuid::new_v4().to_string();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        for (id, parent, position) in [(a, b, 1), (b, a, 1)] {
            conn.execute(
                "INSERT INTO projects (uuid, owner_id, parent_uuid, name, position, created_at, modified_at)
                 VALUES (?1, ?2, ?3, 'p', ?4, 0, 0);",
                params![id.to_string(), owner, parent.to_string(), position],
            )
            .unwrap();
        }

        let ids = collect_subtree(
            &conn,
            a,
            "SELECT uuid FROM projects WHERE parent_uuid = ?1 ORDER BY position DESC;",
        )
        .unwrap();
        assert_eq!(ids, vec![a, b]);
    }
}
