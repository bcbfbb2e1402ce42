//! Task use-case service.
//!
//! # Responsibility
//! - Ordered create/move/duplicate/delete for tasks and sub-task trees.
//! - Content, priority, due date, label and project updates.
//! - Completion: complete cascades to sub-tasks, uncomplete is local.
//!
//! # Invariants
//! - A sub-task always shares the project of its parent.
//! - A task is never moved under itself or one of its sub-tasks.
//! - Labels attached to a task belong to the task owner.

use super::engine::Engine;
use super::error::{ServiceError, ServiceResult};
use super::{
    audience, move_after_pivot, move_to_scope_start, record_change, record_delete, SlotAllocator,
};
use crate::collab::{AccessCheck, Capability, ChangeNotifier};
use crate::model::label::LabelId;
use crate::model::project::ProjectId;
use crate::model::task::{NewTask, Priority, Task, TaskId};
use crate::model::{normalize_name, now_epoch_ms, EntityKind, EntityRef, OwnerId, UserId};
use crate::order::allocator::{
    append_position, insert_after, insert_before, move_as_first, move_to_end,
};
use crate::order::cascade::{
    collect_task_subtree, complete_task_subtree, delete_root, duplicate_task,
    reassign_task_subtree_project, snapshot_task_delete, DeleteSnapshot,
};
use crate::order::scope::{load_placement, resolve_scope, Container};
use crate::repo::task_repo::{
    count_owned_labels, insert_task, list_tasks_in_scope, replace_task_labels, require_task,
    set_task_completed, update_task_content, update_task_due, update_task_priority,
};
use rusqlite::Connection;
use std::collections::BTreeSet;
use uuid::Uuid;

fn task_ref(id: TaskId) -> EntityRef {
    EntityRef::new(EntityKind::Task, id)
}

/// Validated task payload.
struct TaskDraft {
    title: String,
    description: String,
    priority: Priority,
    due_at: Option<i64>,
    labels: Vec<LabelId>,
}

impl TaskDraft {
    fn validate(payload: &NewTask) -> ServiceResult<Self> {
        Ok(Self {
            title: normalize_name("task title", &payload.title)?,
            description: payload.description.clone(),
            priority: payload.priority,
            due_at: payload.due_at,
            labels: dedup_labels(&payload.labels),
        })
    }

    fn build(
        &self,
        owner_id: OwnerId,
        project_id: Option<ProjectId>,
        parent_id: Option<TaskId>,
        position: i64,
        now_ms: i64,
    ) -> Task {
        Task {
            id: Uuid::new_v4(),
            owner_id,
            project_id,
            parent_id,
            title: self.title.clone(),
            description: self.description.clone(),
            priority: self.priority,
            due_at: self.due_at,
            position,
            is_completed: false,
            is_archived: false,
            labels: self.labels.clone(),
            created_at: now_ms,
            modified_at: now_ms,
        }
    }
}

/// Task service facade over one engine.
pub struct TaskService<'e, A: AccessCheck, N: ChangeNotifier> {
    engine: &'e Engine<'e, A, N>,
}

impl<'e, A: AccessCheck, N: ChangeNotifier> TaskService<'e, A, N> {
    pub(crate) fn new(engine: &'e Engine<'e, A, N>) -> Self {
        Self { engine }
    }

    pub fn get(&self, actor: UserId, id: TaskId) -> ServiceResult<Task> {
        self.engine.authorize(actor, task_ref(id), Capability::View)?;
        self.engine.read(|conn| Ok(require_task(conn, id)?))
    }

    /// Lists the tasks of one scope ordered by position.
    pub fn list_scope(&self, actor: UserId, container: Container) -> ServiceResult<Vec<Task>> {
        let owner_id = self
            .engine
            .authorize_container(actor, container, Capability::View)?;
        self.engine.read(|conn| {
            resolve_scope(conn, EntityKind::Task, owner_id, container)?;
            let items = match container {
                Container::ParentTask(parent_id) => {
                    list_tasks_in_scope(conn, owner_id, None, Some(parent_id))?
                }
                Container::Project(project_id) => {
                    list_tasks_in_scope(conn, owner_id, Some(project_id), None)?
                }
                _ => list_tasks_in_scope(conn, owner_id, None, None)?,
            };
            Ok(items)
        })
    }

    /// Appends a task at the end of `container` (project, parent task or
    /// the actor's unfiled list).
    pub fn add(
        &self,
        actor: UserId,
        container: Container,
        payload: NewTask,
    ) -> ServiceResult<Task> {
        let draft = TaskDraft::validate(&payload)?;
        self.engine.write("task_add", EntityKind::Task, |conn, outbox| {
            let owner_id = self
                .engine
                .authorize_container(actor, container, Capability::Edit)?;
            let scope = resolve_scope(conn, EntityKind::Task, owner_id, container)?;
            ensure_labels_owned(conn, owner_id, &draft.labels)?;
            let (project_id, parent_id) = match container {
                Container::ParentTask(parent_id) => {
                    (require_task(conn, parent_id)?.project_id, Some(parent_id))
                }
                Container::Project(project_id) => (Some(project_id), None),
                _ => (None, None),
            };
            let now_ms = now_epoch_ms();
            let position = append_position(conn, &scope)?;
            let task = draft.build(owner_id, project_id, parent_id, position, now_ms);
            insert_task(conn, &task)?;
            record_change(conn, outbox, owner_id, project_id, now_ms)?;
            Ok(task)
        })
    }

    /// Appends a sub-task under `parent`.
    pub fn add_as_child(
        &self,
        actor: UserId,
        parent: TaskId,
        payload: NewTask,
    ) -> ServiceResult<Task> {
        self.add(actor, Container::ParentTask(parent), payload)
    }

    /// Inserts a sibling right after `pivot`.
    pub fn add_after(
        &self,
        actor: UserId,
        pivot: TaskId,
        payload: NewTask,
    ) -> ServiceResult<Task> {
        self.add_next_to(actor, pivot, payload, "task_add_after", insert_after)
    }

    /// Inserts a sibling right before `pivot`.
    pub fn add_before(
        &self,
        actor: UserId,
        pivot: TaskId,
        payload: NewTask,
    ) -> ServiceResult<Task> {
        self.add_next_to(actor, pivot, payload, "task_add_before", insert_before)
    }

    fn add_next_to(
        &self,
        actor: UserId,
        pivot: TaskId,
        payload: NewTask,
        op: &'static str,
        allocate: SlotAllocator,
    ) -> ServiceResult<Task> {
        let draft = TaskDraft::validate(&payload)?;
        self.engine.write(op, EntityKind::Task, |conn, outbox| {
            let owner_id = self
                .engine
                .authorize(actor, task_ref(pivot), Capability::Edit)?;
            ensure_labels_owned(conn, owner_id, &draft.labels)?;
            let pivot_task = require_task(conn, pivot)?;
            let placement = load_placement(conn, task_ref(pivot))?;
            let now_ms = now_epoch_ms();
            let position = allocate(conn, &placement.scope, placement.position, now_ms)?;
            let task = draft.build(
                owner_id,
                pivot_task.project_id,
                pivot_task.parent_id,
                position,
                now_ms,
            );
            insert_task(conn, &task)?;
            record_change(conn, outbox, owner_id, task.project_id, now_ms)?;
            Ok(task)
        })
    }

    /// Moves `id` right after `pivot`, adopting the pivot's parent and
    /// project.
    pub fn move_after(&self, actor: UserId, id: TaskId, pivot: TaskId) -> ServiceResult<Task> {
        if id == pivot {
            return self.get(actor, id);
        }
        self.engine
            .write("task_move_after", EntityKind::Task, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize_pair(actor, task_ref(id), task_ref(pivot))?;
                let task = require_task(conn, id)?;
                let pivot_task = require_task(conn, pivot)?;
                if let Some(new_parent) = pivot_task.parent_id {
                    ensure_not_within(conn, id, new_parent)?;
                }
                let now_ms = now_epoch_ms();
                move_after_pivot(conn, task_ref(id), task_ref(pivot), now_ms)?;
                if task.project_id != pivot_task.project_id {
                    reassign_task_subtree_project(conn, id, pivot_task.project_id, now_ms)?;
                    record_change(conn, outbox, owner_id, task.project_id, now_ms)?;
                }
                record_change(conn, outbox, owner_id, pivot_task.project_id, now_ms)?;
                Ok(require_task(conn, id)?)
            })
    }

    /// Moves `id` to position 1 among its siblings.
    pub fn move_as_first(&self, actor: UserId, id: TaskId) -> ServiceResult<Task> {
        self.engine
            .write("task_move_as_first", EntityKind::Task, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, task_ref(id), Capability::Edit)?;
                let now_ms = now_epoch_ms();
                move_to_scope_start(conn, task_ref(id), now_ms)?;
                let task = require_task(conn, id)?;
                record_change(conn, outbox, owner_id, task.project_id, now_ms)?;
                Ok(task)
            })
    }

    /// Re-parents `id` under `parent` at position 1.
    pub fn move_as_first_child(
        &self,
        actor: UserId,
        id: TaskId,
        parent: TaskId,
    ) -> ServiceResult<Task> {
        self.engine
            .write("task_move_as_first_child", EntityKind::Task, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize_pair(actor, task_ref(id), task_ref(parent))?;
                ensure_not_within(conn, id, parent)?;
                let task = require_task(conn, id)?;
                let parent_task = require_task(conn, parent)?;
                let moved = load_placement(conn, task_ref(id))?;
                let target = resolve_scope(
                    conn,
                    EntityKind::Task,
                    owner_id,
                    Container::ParentTask(parent),
                )?;
                let now_ms = now_epoch_ms();
                move_as_first(conn, &moved, &target, now_ms)?;
                if task.project_id != parent_task.project_id {
                    reassign_task_subtree_project(conn, id, parent_task.project_id, now_ms)?;
                    record_change(conn, outbox, owner_id, task.project_id, now_ms)?;
                }
                record_change(conn, outbox, owner_id, parent_task.project_id, now_ms)?;
                Ok(require_task(conn, id)?)
            })
    }

    /// Inserts a copy of `id` right after it. Sub-tasks are not copied.
    pub fn duplicate(&self, actor: UserId, id: TaskId) -> ServiceResult<Task> {
        self.engine
            .write("task_duplicate", EntityKind::Task, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, task_ref(id), Capability::Edit)?;
                let source = require_task(conn, id)?;
                let now_ms = now_epoch_ms();
                let copy = duplicate_task(conn, &source, now_ms)?;
                record_change(conn, outbox, owner_id, source.project_id, now_ms)?;
                Ok(copy)
            })
    }

    /// Deletes `id` and its sub-task tree.
    pub fn delete(&self, actor: UserId, id: TaskId) -> ServiceResult<DeleteSnapshot> {
        self.engine
            .write("task_delete", EntityKind::Task, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, task_ref(id), Capability::Edit)?;
                let task = require_task(conn, id)?;
                let snapshot = snapshot_task_delete(conn, &task)?;
                let recipients: BTreeSet<UserId> = snapshot
                    .collaborators
                    .iter()
                    .copied()
                    .chain(audience(conn, task.project_id)?)
                    .collect();
                delete_root(conn, task_ref(id))?;
                record_delete(
                    outbox,
                    owner_id,
                    task_ref(id),
                    recipients.into_iter().collect(),
                );
                Ok(snapshot)
            })
    }

    pub fn update_content(
        &self,
        actor: UserId,
        id: TaskId,
        title: &str,
        description: &str,
    ) -> ServiceResult<Task> {
        let title = normalize_name("task title", title)?;
        self.edit("task_update_content", actor, id, |conn, now_ms| {
            Ok(update_task_content(conn, id, &title, description, now_ms)?)
        })
    }

    pub fn update_priority(
        &self,
        actor: UserId,
        id: TaskId,
        priority: Priority,
    ) -> ServiceResult<Task> {
        self.edit("task_update_priority", actor, id, |conn, now_ms| {
            Ok(update_task_priority(conn, id, priority, now_ms)?)
        })
    }

    /// Sets or clears the due date (epoch ms).
    pub fn update_due_date(
        &self,
        actor: UserId,
        id: TaskId,
        due_at: Option<i64>,
    ) -> ServiceResult<Task> {
        self.edit("task_update_due_date", actor, id, |conn, now_ms| {
            Ok(update_task_due(conn, id, due_at, now_ms)?)
        })
    }

    /// Replaces the label set of `id`.
    pub fn update_labels(
        &self,
        actor: UserId,
        id: TaskId,
        labels: &[LabelId],
    ) -> ServiceResult<Task> {
        let labels = dedup_labels(labels);
        self.engine
            .write("task_update_labels", EntityKind::Task, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, task_ref(id), Capability::Edit)?;
                ensure_labels_owned(conn, owner_id, &labels)?;
                let now_ms = now_epoch_ms();
                replace_task_labels(conn, id, &labels, now_ms)?;
                let task = require_task(conn, id)?;
                record_change(conn, outbox, owner_id, task.project_id, now_ms)?;
                Ok(task)
            })
    }

    /// Re-scopes `id` (and its sub-tasks) to the end of `project`, or to the
    /// unfiled list when `None`. A sub-task becomes top-level.
    pub fn update_project(
        &self,
        actor: UserId,
        id: TaskId,
        project: Option<ProjectId>,
    ) -> ServiceResult<Task> {
        self.engine
            .write("task_update_project", EntityKind::Task, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, task_ref(id), Capability::Edit)?;
                let task = require_task(conn, id)?;
                let container = match project {
                    Some(project_id) => Container::Project(project_id),
                    None => Container::Root,
                };
                let target_owner = self
                    .engine
                    .authorize_container(actor, container, Capability::Edit)?;
                if target_owner != owner_id {
                    return Err(ServiceError::InvalidState(format!(
                        "task {id} cannot move to a project of another owner"
                    )));
                }
                let target = resolve_scope(conn, EntityKind::Task, owner_id, container)?;
                let moved = load_placement(conn, task_ref(id))?;
                if moved.scope == target {
                    return Ok(task);
                }
                let now_ms = now_epoch_ms();
                move_to_end(conn, &moved, &target, now_ms)?;
                reassign_task_subtree_project(conn, id, project, now_ms)?;
                record_change(conn, outbox, owner_id, task.project_id, now_ms)?;
                record_change(conn, outbox, owner_id, project, now_ms)?;
                Ok(require_task(conn, id)?)
            })
    }

    /// Completes `id` and every sub-task below it.
    pub fn complete(&self, actor: UserId, id: TaskId) -> ServiceResult<Task> {
        self.engine
            .write("task_complete", EntityKind::Task, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, task_ref(id), Capability::CompleteOnly)?;
                let now_ms = now_epoch_ms();
                complete_task_subtree(conn, id, now_ms)?;
                let task = require_task(conn, id)?;
                record_change(conn, outbox, owner_id, task.project_id, now_ms)?;
                Ok(task)
            })
    }

    /// Reopens `id` only; sub-tasks keep their state.
    pub fn uncomplete(&self, actor: UserId, id: TaskId) -> ServiceResult<Task> {
        self.engine
            .write("task_uncomplete", EntityKind::Task, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, task_ref(id), Capability::CompleteOnly)?;
                let now_ms = now_epoch_ms();
                set_task_completed(conn, id, false, now_ms)?;
                let task = require_task(conn, id)?;
                record_change(conn, outbox, owner_id, task.project_id, now_ms)?;
                Ok(task)
            })
    }

    /// Runs one attribute edit with edit rights, returning the fresh task.
    fn edit(
        &self,
        op: &'static str,
        actor: UserId,
        id: TaskId,
        mut apply: impl FnMut(&Connection, i64) -> ServiceResult<()>,
    ) -> ServiceResult<Task> {
        self.engine.write(op, EntityKind::Task, |conn, outbox| {
            let owner_id = self
                .engine
                .authorize(actor, task_ref(id), Capability::Edit)?;
            let now_ms = now_epoch_ms();
            apply(conn, now_ms)?;
            let task = require_task(conn, id)?;
            record_change(conn, outbox, owner_id, task.project_id, now_ms)?;
            Ok(task)
        })
    }
}

fn dedup_labels(labels: &[LabelId]) -> Vec<LabelId> {
    labels
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn ensure_labels_owned(
    conn: &Connection,
    owner_id: OwnerId,
    labels: &[LabelId],
) -> ServiceResult<()> {
    if count_owned_labels(conn, owner_id, labels)? != labels.len() {
        return Err(ServiceError::InvalidInput(
            "task labels must exist and belong to the task owner".to_string(),
        ));
    }
    Ok(())
}

/// Rejects placing `moved` under `new_parent` when that would form a cycle.
fn ensure_not_within(conn: &Connection, moved: TaskId, new_parent: TaskId) -> ServiceResult<()> {
    if collect_task_subtree(conn, moved)?.contains(&new_parent) {
        return Err(ServiceError::InvalidState(format!(
            "task {moved} cannot be moved under its own subtree ({new_parent})"
        )));
    }
    Ok(())
}
