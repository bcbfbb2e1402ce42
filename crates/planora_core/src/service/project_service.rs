//! Project use-case service.
//!
//! # Responsibility
//! - Ordered create/move/duplicate/delete for the project forest.
//! - Archive lifecycle and collaborator management.
//!
//! # Invariants
//! - A project is never moved under itself or one of its descendants.
//! - Archive cascades to descendant projects, their tasks and habits;
//!   unarchive touches the target project only.
//! - Only the owner may change the collaborator set.

use super::engine::Engine;
use super::error::{ServiceError, ServiceResult};
use super::{
    audience, move_after_pivot, move_to_scope_start, record_change, record_delete, SlotAllocator,
};
use crate::collab::{AccessCheck, Capability, ChangeNotifier};
use crate::model::project::{
    Collaborator, CollaboratorGrant, NewProject, Project, ProjectId, ProjectPatch,
};
use crate::model::{
    normalize_color, normalize_name, now_epoch_ms, EntityKind, EntityRef, OwnerId, UserId,
};
use crate::order::allocator::{append_position, insert_after, insert_before, move_as_first};
use crate::order::cascade::{
    archive_completed_tasks, archive_project_subtree, collect_project_subtree, delete_root,
    duplicate_project, snapshot_project_delete, unarchive_project, ArchiveOutcome,
    DeleteSnapshot,
};
use crate::order::scope::{load_placement, resolve_scope, Container};
use crate::repo::project_repo::{
    delete_collaborator, insert_project, list_collaborators, list_project_children,
    require_project, update_project_attrs, upsert_collaborator,
};
use rusqlite::Connection;
use std::collections::BTreeSet;
use uuid::Uuid;

fn project_ref(id: ProjectId) -> EntityRef {
    EntityRef::new(EntityKind::Project, id)
}

/// Validated project payload.
struct ProjectDraft {
    name: String,
    color: String,
    is_favorite: bool,
}

impl ProjectDraft {
    fn validate(payload: &NewProject) -> ServiceResult<Self> {
        Ok(Self {
            name: normalize_name("project name", &payload.name)?,
            color: normalize_color(payload.color.as_deref())?,
            is_favorite: payload.is_favorite,
        })
    }

    fn build(
        &self,
        owner_id: OwnerId,
        parent_id: Option<ProjectId>,
        position: i64,
        now_ms: i64,
    ) -> Project {
        Project {
            id: Uuid::new_v4(),
            owner_id,
            parent_id,
            name: self.name.clone(),
            color: self.color.clone(),
            is_favorite: self.is_favorite,
            position,
            is_archived: false,
            created_at: now_ms,
            modified_at: now_ms,
        }
    }
}

/// Project service facade over one engine.
pub struct ProjectService<'e, A: AccessCheck, N: ChangeNotifier> {
    engine: &'e Engine<'e, A, N>,
}

impl<'e, A: AccessCheck, N: ChangeNotifier> ProjectService<'e, A, N> {
    pub(crate) fn new(engine: &'e Engine<'e, A, N>) -> Self {
        Self { engine }
    }

    pub fn get(&self, actor: UserId, id: ProjectId) -> ServiceResult<Project> {
        self.engine.authorize(actor, project_ref(id), Capability::View)?;
        self.engine.read(|conn| Ok(require_project(conn, id)?))
    }

    /// Lists direct children of `parent`, or the actor's top-level projects.
    pub fn list_children(
        &self,
        actor: UserId,
        parent: Option<ProjectId>,
    ) -> ServiceResult<Vec<Project>> {
        let owner_id = match parent {
            Some(parent_id) => {
                self.engine
                    .authorize(actor, project_ref(parent_id), Capability::View)?
            }
            None => actor,
        };
        self.engine
            .read(|conn| Ok(list_project_children(conn, owner_id, parent)?))
    }

    pub fn collaborators(&self, actor: UserId, id: ProjectId) -> ServiceResult<Vec<Collaborator>> {
        self.engine.authorize(actor, project_ref(id), Capability::View)?;
        self.engine.read(|conn| Ok(list_collaborators(conn, id)?))
    }

    /// Appends a project at the end of `parent` (or the actor's root).
    pub fn add(
        &self,
        actor: UserId,
        parent: Option<ProjectId>,
        payload: NewProject,
    ) -> ServiceResult<Project> {
        let draft = ProjectDraft::validate(&payload)?;
        self.engine
            .write("project_add", EntityKind::Project, |conn, outbox| {
                let (owner_id, container) = match parent {
                    Some(parent_id) => (
                        self.engine
                            .authorize(actor, project_ref(parent_id), Capability::Edit)?,
                        Container::ParentProject(parent_id),
                    ),
                    None => (actor, Container::Root),
                };
                let scope = resolve_scope(conn, EntityKind::Project, owner_id, container)?;
                let now_ms = now_epoch_ms();
                let position = append_position(conn, &scope)?;
                let project = draft.build(owner_id, parent, position, now_ms);
                insert_project(conn, &project)?;
                record_change(conn, outbox, owner_id, Some(project.id), now_ms)?;
                Ok(project)
            })
    }

    /// Inserts a sibling right after `pivot`.
    pub fn add_after(
        &self,
        actor: UserId,
        pivot: ProjectId,
        payload: NewProject,
    ) -> ServiceResult<Project> {
        self.add_next_to(actor, pivot, payload, "project_add_after", insert_after)
    }

    /// Inserts a sibling right before `pivot`.
    pub fn add_before(
        &self,
        actor: UserId,
        pivot: ProjectId,
        payload: NewProject,
    ) -> ServiceResult<Project> {
        self.add_next_to(actor, pivot, payload, "project_add_before", insert_before)
    }

    fn add_next_to(
        &self,
        actor: UserId,
        pivot: ProjectId,
        payload: NewProject,
        op: &'static str,
        allocate: SlotAllocator,
    ) -> ServiceResult<Project> {
        let draft = ProjectDraft::validate(&payload)?;
        self.engine.write(op, EntityKind::Project, |conn, outbox| {
            let owner_id = self
                .engine
                .authorize(actor, project_ref(pivot), Capability::Edit)?;
            let pivot_project = require_project(conn, pivot)?;
            let placement = load_placement(conn, project_ref(pivot))?;
            let now_ms = now_epoch_ms();
            let position = allocate(conn, &placement.scope, placement.position, now_ms)?;
            let project = draft.build(owner_id, pivot_project.parent_id, position, now_ms);
            insert_project(conn, &project)?;
            record_change(conn, outbox, owner_id, Some(project.id), now_ms)?;
            Ok(project)
        })
    }

    /// Moves `id` right after `pivot`, re-parenting it to the pivot's parent.
    pub fn move_after(
        &self,
        actor: UserId,
        id: ProjectId,
        pivot: ProjectId,
    ) -> ServiceResult<Project> {
        if id == pivot {
            return self.get(actor, id);
        }
        self.engine
            .write("project_move_after", EntityKind::Project, |conn, outbox| {
                let owner_id =
                    self.engine
                        .authorize_pair(actor, project_ref(id), project_ref(pivot))?;
                let pivot_project = require_project(conn, pivot)?;
                if let Some(new_parent) = pivot_project.parent_id {
                    ensure_not_within(conn, id, new_parent)?;
                }
                let now_ms = now_epoch_ms();
                move_after_pivot(conn, project_ref(id), project_ref(pivot), now_ms)?;
                record_change(conn, outbox, owner_id, Some(id), now_ms)?;
                Ok(require_project(conn, id)?)
            })
    }

    /// Moves `id` to position 1 among its siblings.
    pub fn move_as_first(&self, actor: UserId, id: ProjectId) -> ServiceResult<Project> {
        self.engine
            .write("project_move_as_first", EntityKind::Project, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, project_ref(id), Capability::Edit)?;
                let now_ms = now_epoch_ms();
                move_to_scope_start(conn, project_ref(id), now_ms)?;
                record_change(conn, outbox, owner_id, Some(id), now_ms)?;
                Ok(require_project(conn, id)?)
            })
    }

    /// Re-parents `id` under `parent` at position 1.
    pub fn move_as_first_child(
        &self,
        actor: UserId,
        id: ProjectId,
        parent: ProjectId,
    ) -> ServiceResult<Project> {
        self.engine.write(
            "project_move_as_first_child",
            EntityKind::Project,
            |conn, outbox| {
                let owner_id =
                    self.engine
                        .authorize_pair(actor, project_ref(id), project_ref(parent))?;
                ensure_not_within(conn, id, parent)?;
                let moved = load_placement(conn, project_ref(id))?;
                let target = resolve_scope(
                    conn,
                    EntityKind::Project,
                    owner_id,
                    Container::ParentProject(parent),
                )?;
                let now_ms = now_epoch_ms();
                move_as_first(conn, &moved, &target, now_ms)?;
                record_change(conn, outbox, owner_id, Some(id), now_ms)?;
                Ok(require_project(conn, id)?)
            },
        )
    }

    /// Copies `id` (with its task tree and habits) right after itself.
    pub fn duplicate(&self, actor: UserId, id: ProjectId) -> ServiceResult<Project> {
        self.engine
            .write("project_duplicate", EntityKind::Project, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, project_ref(id), Capability::Edit)?;
                let source = require_project(conn, id)?;
                let now_ms = now_epoch_ms();
                let copy = duplicate_project(conn, &source, now_ms)?;
                record_change(conn, outbox, owner_id, source.parent_id, now_ms)?;
                Ok(copy)
            })
    }

    /// Deletes `id` with its descendant projects, tasks and habits.
    pub fn delete(&self, actor: UserId, id: ProjectId) -> ServiceResult<DeleteSnapshot> {
        self.engine
            .write("project_delete", EntityKind::Project, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, project_ref(id), Capability::Edit)?;
                let project = require_project(conn, id)?;
                let snapshot = snapshot_project_delete(conn, id, owner_id)?;
                let recipients: BTreeSet<UserId> = snapshot
                    .collaborators
                    .iter()
                    .copied()
                    .chain(audience(conn, project.parent_id)?)
                    .collect();
                delete_root(conn, project_ref(id))?;
                record_delete(
                    outbox,
                    owner_id,
                    project_ref(id),
                    recipients.into_iter().collect(),
                );
                Ok(snapshot)
            })
    }

    pub fn update(
        &self,
        actor: UserId,
        id: ProjectId,
        patch: ProjectPatch,
    ) -> ServiceResult<Project> {
        let name = patch
            .name
            .as_deref()
            .map(|value| normalize_name("project name", value))
            .transpose()?;
        let color = patch
            .color
            .as_deref()
            .map(|value| normalize_color(Some(value)))
            .transpose()?;
        self.engine
            .write("project_update", EntityKind::Project, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, project_ref(id), Capability::Edit)?;
                let mut project = require_project(conn, id)?;
                if let Some(name) = &name {
                    project.name = name.clone();
                }
                if let Some(color) = &color {
                    project.color = color.clone();
                }
                if let Some(is_favorite) = patch.is_favorite {
                    project.is_favorite = is_favorite;
                }
                let now_ms = now_epoch_ms();
                update_project_attrs(conn, &project, now_ms)?;
                record_change(conn, outbox, owner_id, Some(id), now_ms)?;
                Ok(require_project(conn, id)?)
            })
    }

    /// Archives `id` and everything below it.
    pub fn archive(&self, actor: UserId, id: ProjectId) -> ServiceResult<ArchiveOutcome> {
        self.engine
            .write("project_archive", EntityKind::Project, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, project_ref(id), Capability::Edit)?;
                let now_ms = now_epoch_ms();
                let outcome = archive_project_subtree(conn, id, now_ms)?;
                record_change(conn, outbox, owner_id, Some(id), now_ms)?;
                Ok(outcome)
            })
    }

    /// Restores `id` alone; descendants keep their archived flag.
    pub fn unarchive(&self, actor: UserId, id: ProjectId) -> ServiceResult<Project> {
        self.engine
            .write("project_unarchive", EntityKind::Project, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, project_ref(id), Capability::Edit)?;
                let now_ms = now_epoch_ms();
                unarchive_project(conn, id, now_ms)?;
                record_change(conn, outbox, owner_id, Some(id), now_ms)?;
                Ok(require_project(conn, id)?)
            })
    }

    /// Archives every completed task of `id`. Returns archived task count.
    pub fn archive_completed_tasks(&self, actor: UserId, id: ProjectId) -> ServiceResult<usize> {
        self.engine.write(
            "project_archive_completed_tasks",
            EntityKind::Project,
            |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, project_ref(id), Capability::Edit)?;
                let now_ms = now_epoch_ms();
                let archived = archive_completed_tasks(conn, id, now_ms)?;
                if archived > 0 {
                    record_change(conn, outbox, owner_id, Some(id), now_ms)?;
                }
                Ok(archived)
            },
        )
    }

    /// Grants `user_id` access to `id`; re-granting replaces the level.
    pub fn add_collaborator(
        &self,
        actor: UserId,
        id: ProjectId,
        user_id: UserId,
        grant: CollaboratorGrant,
    ) -> ServiceResult<Vec<Collaborator>> {
        self.engine
            .write("project_add_collaborator", EntityKind::Project, |conn, outbox| {
                let owner_id = self.require_owner(actor, id)?;
                if user_id == owner_id {
                    return Err(ServiceError::InvalidInput(
                        "the owner cannot be added as a collaborator".to_string(),
                    ));
                }
                upsert_collaborator(conn, id, Collaborator { user_id, grant })?;
                let now_ms = now_epoch_ms();
                record_change(conn, outbox, owner_id, Some(id), now_ms)?;
                Ok(list_collaborators(conn, id)?)
            })
    }

    /// Revokes access of `user_id`. Returns whether a grant existed.
    pub fn remove_collaborator(
        &self,
        actor: UserId,
        id: ProjectId,
        user_id: UserId,
    ) -> ServiceResult<bool> {
        self.engine.write(
            "project_remove_collaborator",
            EntityKind::Project,
            |conn, outbox| {
                let owner_id = self.require_owner(actor, id)?;
                let now_ms = now_epoch_ms();
                let removed = delete_collaborator(conn, id, user_id)?;
                if removed {
                    record_change(conn, outbox, owner_id, Some(id), now_ms)?;
                    outbox.collaborators_changed(vec![user_id], now_ms);
                }
                Ok(removed)
            },
        )
    }

    fn require_owner(&self, actor: UserId, id: ProjectId) -> ServiceResult<OwnerId> {
        let owner_id = self
            .engine
            .authorize(actor, project_ref(id), Capability::View)?;
        if owner_id != actor {
            return Err(ServiceError::AccessDenied {
                actor,
                kind: EntityKind::Project,
                id,
            });
        }
        Ok(owner_id)
    }
}

/// Rejects placing `moved` under `new_parent` when that would form a cycle.
fn ensure_not_within(
    conn: &Connection,
    moved: ProjectId,
    new_parent: ProjectId,
) -> ServiceResult<()> {
    if collect_project_subtree(conn, moved)?.contains(&new_parent) {
        return Err(ServiceError::InvalidState(format!(
            "project {moved} cannot be moved under its own subtree ({new_parent})"
        )));
    }
    Ok(())
}
