//! Habit use-case service.
//!
//! # Responsibility
//! - Ordered create/move/duplicate/delete for habits, per project or unfiled.
//! - Polarity-checked counter increments.
//!
//! # Invariants
//! - A habit allows at least one polarity.
//! - Completing a disallowed polarity is `InvalidState` and changes nothing.

use super::engine::Engine;
use super::error::{ServiceError, ServiceResult};
use super::{
    audience, move_after_pivot, move_to_scope_start, record_change, record_delete, SlotAllocator,
};
use crate::collab::{AccessCheck, Capability, ChangeNotifier};
use crate::model::habit::{Habit, HabitId, HabitPolarity, NewHabit};
use crate::model::project::ProjectId;
use crate::model::{normalize_name, now_epoch_ms, EntityKind, EntityRef, OwnerId, UserId};
use crate::order::allocator::{append_position, insert_after, insert_before, move_to_end};
use crate::order::cascade::{delete_root, duplicate_habit};
use crate::order::scope::{load_placement, resolve_scope, Container};
use crate::repo::habit_repo::{
    increment_habit_counter, insert_habit, list_habits_in_scope, require_habit,
    reset_habit_counters,
};
use uuid::Uuid;

fn habit_ref(id: HabitId) -> EntityRef {
    EntityRef::new(EntityKind::Habit, id)
}

fn habit_container(project: Option<ProjectId>) -> Container {
    match project {
        Some(project_id) => Container::Project(project_id),
        None => Container::Root,
    }
}

/// Validated habit payload.
struct HabitDraft {
    title: String,
    is_positive: bool,
    is_negative: bool,
}

impl HabitDraft {
    fn validate(payload: &NewHabit) -> ServiceResult<Self> {
        if !payload.is_positive && !payload.is_negative {
            return Err(ServiceError::InvalidInput(
                "habit must allow at least one polarity".to_string(),
            ));
        }
        Ok(Self {
            title: normalize_name("habit title", &payload.title)?,
            is_positive: payload.is_positive,
            is_negative: payload.is_negative,
        })
    }

    fn build(
        &self,
        owner_id: OwnerId,
        project_id: Option<ProjectId>,
        position: i64,
        now_ms: i64,
    ) -> Habit {
        Habit {
            id: Uuid::new_v4(),
            owner_id,
            project_id,
            title: self.title.clone(),
            is_positive: self.is_positive,
            is_negative: self.is_negative,
            positive_count: 0,
            negative_count: 0,
            position,
            is_archived: false,
            created_at: now_ms,
            modified_at: now_ms,
        }
    }
}

/// Habit service facade over one engine.
pub struct HabitService<'e, A: AccessCheck, N: ChangeNotifier> {
    engine: &'e Engine<'e, A, N>,
}

impl<'e, A: AccessCheck, N: ChangeNotifier> HabitService<'e, A, N> {
    pub(crate) fn new(engine: &'e Engine<'e, A, N>) -> Self {
        Self { engine }
    }

    pub fn get(&self, actor: UserId, id: HabitId) -> ServiceResult<Habit> {
        self.engine.authorize(actor, habit_ref(id), Capability::View)?;
        self.engine.read(|conn| Ok(require_habit(conn, id)?))
    }

    /// Lists habits of `project` (or the actor's unfiled habits).
    pub fn list_scope(
        &self,
        actor: UserId,
        project: Option<ProjectId>,
    ) -> ServiceResult<Vec<Habit>> {
        let owner_id =
            self.engine
                .authorize_container(actor, habit_container(project), Capability::View)?;
        self.engine
            .read(|conn| Ok(list_habits_in_scope(conn, owner_id, project)?))
    }

    /// Appends a habit at the end of `project` (or the unfiled list).
    pub fn add(
        &self,
        actor: UserId,
        project: Option<ProjectId>,
        payload: NewHabit,
    ) -> ServiceResult<Habit> {
        let draft = HabitDraft::validate(&payload)?;
        let container = habit_container(project);
        self.engine.write("habit_add", EntityKind::Habit, |conn, outbox| {
            let owner_id = self
                .engine
                .authorize_container(actor, container, Capability::Edit)?;
            let scope = resolve_scope(conn, EntityKind::Habit, owner_id, container)?;
            let now_ms = now_epoch_ms();
            let position = append_position(conn, &scope)?;
            let habit = draft.build(owner_id, project, position, now_ms);
            insert_habit(conn, &habit)?;
            record_change(conn, outbox, owner_id, project, now_ms)?;
            Ok(habit)
        })
    }

    pub fn add_after(
        &self,
        actor: UserId,
        pivot: HabitId,
        payload: NewHabit,
    ) -> ServiceResult<Habit> {
        self.add_next_to(actor, pivot, payload, "habit_add_after", insert_after)
    }

    pub fn add_before(
        &self,
        actor: UserId,
        pivot: HabitId,
        payload: NewHabit,
    ) -> ServiceResult<Habit> {
        self.add_next_to(actor, pivot, payload, "habit_add_before", insert_before)
    }

    fn add_next_to(
        &self,
        actor: UserId,
        pivot: HabitId,
        payload: NewHabit,
        op: &'static str,
        allocate: SlotAllocator,
    ) -> ServiceResult<Habit> {
        let draft = HabitDraft::validate(&payload)?;
        self.engine.write(op, EntityKind::Habit, |conn, outbox| {
            let owner_id = self
                .engine
                .authorize(actor, habit_ref(pivot), Capability::Edit)?;
            let pivot_habit = require_habit(conn, pivot)?;
            let placement = load_placement(conn, habit_ref(pivot))?;
            let now_ms = now_epoch_ms();
            let position = allocate(conn, &placement.scope, placement.position, now_ms)?;
            let habit = draft.build(owner_id, pivot_habit.project_id, position, now_ms);
            insert_habit(conn, &habit)?;
            record_change(conn, outbox, owner_id, habit.project_id, now_ms)?;
            Ok(habit)
        })
    }

    /// Moves `id` right after `pivot`, adopting the pivot's project.
    pub fn move_after(&self, actor: UserId, id: HabitId, pivot: HabitId) -> ServiceResult<Habit> {
        if id == pivot {
            return self.get(actor, id);
        }
        self.engine
            .write("habit_move_after", EntityKind::Habit, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize_pair(actor, habit_ref(id), habit_ref(pivot))?;
                let origin = require_habit(conn, id)?.project_id;
                let now_ms = now_epoch_ms();
                move_after_pivot(conn, habit_ref(id), habit_ref(pivot), now_ms)?;
                let habit = require_habit(conn, id)?;
                if origin != habit.project_id {
                    record_change(conn, outbox, owner_id, origin, now_ms)?;
                }
                record_change(conn, outbox, owner_id, habit.project_id, now_ms)?;
                Ok(habit)
            })
    }

    pub fn move_as_first(&self, actor: UserId, id: HabitId) -> ServiceResult<Habit> {
        self.engine
            .write("habit_move_as_first", EntityKind::Habit, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, habit_ref(id), Capability::Edit)?;
                let now_ms = now_epoch_ms();
                move_to_scope_start(conn, habit_ref(id), now_ms)?;
                let habit = require_habit(conn, id)?;
                record_change(conn, outbox, owner_id, habit.project_id, now_ms)?;
                Ok(habit)
            })
    }

    /// Inserts a copy of `id` right after it with zeroed counters.
    pub fn duplicate(&self, actor: UserId, id: HabitId) -> ServiceResult<Habit> {
        self.engine
            .write("habit_duplicate", EntityKind::Habit, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, habit_ref(id), Capability::Edit)?;
                let source = require_habit(conn, id)?;
                let now_ms = now_epoch_ms();
                let copy = duplicate_habit(conn, &source, now_ms)?;
                record_change(conn, outbox, owner_id, source.project_id, now_ms)?;
                Ok(copy)
            })
    }

    pub fn delete(&self, actor: UserId, id: HabitId) -> ServiceResult<()> {
        self.engine
            .write("habit_delete", EntityKind::Habit, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, habit_ref(id), Capability::Edit)?;
                let habit = require_habit(conn, id)?;
                let recipients = audience(conn, habit.project_id)?;
                delete_root(conn, habit_ref(id))?;
                record_delete(outbox, owner_id, habit_ref(id), recipients);
                Ok(())
            })
    }

    /// Re-scopes `id` to the end of `project` (or the unfiled list).
    pub fn update_project(
        &self,
        actor: UserId,
        id: HabitId,
        project: Option<ProjectId>,
    ) -> ServiceResult<Habit> {
        let container = habit_container(project);
        self.engine
            .write("habit_update_project", EntityKind::Habit, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, habit_ref(id), Capability::Edit)?;
                let target_owner = self
                    .engine
                    .authorize_container(actor, container, Capability::Edit)?;
                if target_owner != owner_id {
                    return Err(ServiceError::InvalidState(format!(
                        "habit {id} cannot move to a project of another owner"
                    )));
                }
                let origin = require_habit(conn, id)?.project_id;
                let target = resolve_scope(conn, EntityKind::Habit, owner_id, container)?;
                let moved = load_placement(conn, habit_ref(id))?;
                let now_ms = now_epoch_ms();
                move_to_end(conn, &moved, &target, now_ms)?;
                if origin != project {
                    record_change(conn, outbox, owner_id, origin, now_ms)?;
                    record_change(conn, outbox, owner_id, project, now_ms)?;
                }
                Ok(require_habit(conn, id)?)
            })
    }

    pub fn complete_positive(&self, actor: UserId, id: HabitId) -> ServiceResult<Habit> {
        self.complete(actor, id, HabitPolarity::Positive, "habit_complete_positive")
    }

    pub fn complete_negative(&self, actor: UserId, id: HabitId) -> ServiceResult<Habit> {
        self.complete(actor, id, HabitPolarity::Negative, "habit_complete_negative")
    }

    fn complete(
        &self,
        actor: UserId,
        id: HabitId,
        polarity: HabitPolarity,
        op: &'static str,
    ) -> ServiceResult<Habit> {
        self.engine.write(op, EntityKind::Habit, |conn, outbox| {
            let owner_id = self
                .engine
                .authorize(actor, habit_ref(id), Capability::CompleteOnly)?;
            let habit = require_habit(conn, id)?;
            if !habit.allows(polarity) {
                return Err(ServiceError::InvalidState(format!(
                    "habit {id} does not allow {} completions",
                    polarity.as_str()
                )));
            }
            let now_ms = now_epoch_ms();
            increment_habit_counter(conn, id, polarity, now_ms)?;
            record_change(conn, outbox, owner_id, habit.project_id, now_ms)?;
            Ok(require_habit(conn, id)?)
        })
    }

    /// Zeroes both counters.
    pub fn reset_counters(&self, actor: UserId, id: HabitId) -> ServiceResult<Habit> {
        self.engine
            .write("habit_reset_counters", EntityKind::Habit, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, habit_ref(id), Capability::Edit)?;
                let now_ms = now_epoch_ms();
                reset_habit_counters(conn, id, now_ms)?;
                let habit = require_habit(conn, id)?;
                record_change(conn, outbox, owner_id, habit.project_id, now_ms)?;
                Ok(habit)
            })
    }
}
