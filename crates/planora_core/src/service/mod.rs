//! Ordered-entity services.
//!
//! # Responsibility
//! - Orchestrate scope resolution, allocation, shifting and cascades into
//!   per-kind use-case APIs.
//! - Keep access checks and notifications at the use-case boundary.
//!
//! # Invariants
//! - Every mutation runs through [`Engine::write`]; reads go through
//!   [`Engine::read`].
//! - Moving an item never compacts its origin scope.

use crate::collab::Outbox;
use crate::model::project::ProjectId;
use crate::model::{EntityRef, OwnerId, UserId};
use crate::order::allocator;
use crate::order::scope::load_placement;
use crate::order::Scope;
use crate::repo::project_repo::{find_project, list_collaborators};
use crate::repo::RepoResult;
use rusqlite::Connection;
use std::collections::{BTreeSet, HashSet};

pub mod engine;
pub mod error;
pub mod filter_service;
pub mod habit_service;
pub mod label_service;
pub mod project_service;
pub mod task_service;

pub use engine::Engine;
pub use error::{ServiceError, ServiceResult};
pub use filter_service::FilterService;
pub use habit_service::HabitService;
pub use label_service::LabelService;
pub use project_service::ProjectService;
pub use task_service::TaskService;

/// Pivot-relative slot allocation (`insert_after` / `insert_before`).
pub(crate) type SlotAllocator = fn(&Connection, &Scope, i64, i64) -> RepoResult<i64>;

/// Collaborators of `project` and of every ancestor project.
pub(crate) fn audience(
    conn: &Connection,
    project: Option<ProjectId>,
) -> ServiceResult<Vec<UserId>> {
    let mut users = BTreeSet::new();
    let mut visited = HashSet::new();
    let mut cursor = project;
    while let Some(project_id) = cursor {
        if !visited.insert(project_id) {
            break;
        }
        for collaborator in list_collaborators(conn, project_id)? {
            users.insert(collaborator.user_id);
        }
        cursor = find_project(conn, project_id)?.and_then(|project| project.parent_id);
    }
    Ok(users.into_iter().collect())
}

/// Buffers owner and collaborator change notifications.
pub(crate) fn record_change(
    conn: &Connection,
    outbox: &mut Outbox,
    owner_id: OwnerId,
    project: Option<ProjectId>,
    now_ms: i64,
) -> ServiceResult<()> {
    outbox.changed(owner_id, now_ms);
    outbox.collaborators_changed(audience(conn, project)?, now_ms);
    Ok(())
}

/// Buffers delete notifications for the root of a removed subtree.
pub(crate) fn record_delete(
    outbox: &mut Outbox,
    owner_id: OwnerId,
    root: EntityRef,
    recipients: Vec<UserId>,
) {
    outbox.deleted(owner_id, root.kind, root.id);
    outbox.collaborators_deleted(recipients, root.kind, root.id);
}

/// Places `moved` right after `pivot`, adopting the pivot's scope.
///
/// An item already sitting right after its pivot stays where it is.
pub(crate) fn move_after_pivot(
    conn: &Connection,
    moved: EntityRef,
    pivot: EntityRef,
    now_ms: i64,
) -> ServiceResult<i64> {
    let moved = load_placement(conn, moved)?;
    let target = load_placement(conn, pivot)?;
    if moved.scope == target.scope && moved.position == target.position + 1 {
        return Ok(moved.position);
    }
    Ok(allocator::move_after(
        conn,
        &moved,
        &target.scope,
        target.position,
        now_ms,
    )?)
}

/// Places `entity` at position 1 of its current scope.
pub(crate) fn move_to_scope_start(
    conn: &Connection,
    entity: EntityRef,
    now_ms: i64,
) -> ServiceResult<i64> {
    let placement = load_placement(conn, entity)?;
    if placement.position == 1 {
        return Ok(1);
    }
    Ok(allocator::move_as_first(
        conn,
        &placement,
        &placement.scope,
        now_ms,
    )?)
}
