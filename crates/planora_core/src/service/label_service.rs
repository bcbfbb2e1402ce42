//! Label use-case service.
//!
//! Labels live in one ordered list per owner. Deleting a label detaches it
//! from every task and stamps those tasks for sync.

use super::engine::Engine;
use super::error::ServiceResult;
use super::{move_after_pivot, move_to_scope_start, SlotAllocator};
use crate::collab::{AccessCheck, Capability, ChangeNotifier};
use crate::model::label::{Label, LabelId, NewLabel};
use crate::model::{normalize_color, normalize_name, now_epoch_ms, EntityKind, EntityRef, UserId};
use crate::order::allocator::{append_position, insert_after, insert_before};
use crate::order::cascade::delete_root;
use crate::order::scope::{load_placement, Scope};
use crate::repo::label_repo::{insert_label, list_labels, require_label, update_label_attrs};
use crate::repo::task_repo::touch_tasks_with_label;
use uuid::Uuid;

fn label_ref(id: LabelId) -> EntityRef {
    EntityRef::new(EntityKind::Label, id)
}

/// Label service facade over one engine.
pub struct LabelService<'e, A: AccessCheck, N: ChangeNotifier> {
    engine: &'e Engine<'e, A, N>,
}

impl<'e, A: AccessCheck, N: ChangeNotifier> LabelService<'e, A, N> {
    pub(crate) fn new(engine: &'e Engine<'e, A, N>) -> Self {
        Self { engine }
    }

    pub fn get(&self, actor: UserId, id: LabelId) -> ServiceResult<Label> {
        self.engine.authorize(actor, label_ref(id), Capability::View)?;
        self.engine.read(|conn| Ok(require_label(conn, id)?))
    }

    /// Lists the actor's labels ordered by position.
    pub fn list(&self, actor: UserId) -> ServiceResult<Vec<Label>> {
        self.engine.read(|conn| Ok(list_labels(conn, actor)?))
    }

    /// Appends a label at the end of the actor's list.
    pub fn add(&self, actor: UserId, payload: NewLabel) -> ServiceResult<Label> {
        let name = normalize_name("label name", &payload.name)?;
        let color = normalize_color(payload.color.as_deref())?;
        self.engine.write("label_add", EntityKind::Label, |conn, outbox| {
            let now_ms = now_epoch_ms();
            let position = append_position(conn, &Scope::root(EntityKind::Label, actor))?;
            let label = Label {
                id: Uuid::new_v4(),
                owner_id: actor,
                name: name.clone(),
                color: color.clone(),
                position,
                created_at: now_ms,
                modified_at: now_ms,
            };
            insert_label(conn, &label)?;
            outbox.changed(actor, now_ms);
            Ok(label)
        })
    }

    pub fn add_after(
        &self,
        actor: UserId,
        pivot: LabelId,
        payload: NewLabel,
    ) -> ServiceResult<Label> {
        self.add_next_to(actor, pivot, payload, "label_add_after", insert_after)
    }

    pub fn add_before(
        &self,
        actor: UserId,
        pivot: LabelId,
        payload: NewLabel,
    ) -> ServiceResult<Label> {
        self.add_next_to(actor, pivot, payload, "label_add_before", insert_before)
    }

    fn add_next_to(
        &self,
        actor: UserId,
        pivot: LabelId,
        payload: NewLabel,
        op: &'static str,
        allocate: SlotAllocator,
    ) -> ServiceResult<Label> {
        let name = normalize_name("label name", &payload.name)?;
        let color = normalize_color(payload.color.as_deref())?;
        self.engine.write(op, EntityKind::Label, |conn, outbox| {
            let owner_id = self
                .engine
                .authorize(actor, label_ref(pivot), Capability::Edit)?;
            let placement = load_placement(conn, label_ref(pivot))?;
            let now_ms = now_epoch_ms();
            let position = allocate(conn, &placement.scope, placement.position, now_ms)?;
            let label = Label {
                id: Uuid::new_v4(),
                owner_id,
                name: name.clone(),
                color: color.clone(),
                position,
                created_at: now_ms,
                modified_at: now_ms,
            };
            insert_label(conn, &label)?;
            outbox.changed(owner_id, now_ms);
            Ok(label)
        })
    }

    pub fn move_after(&self, actor: UserId, id: LabelId, pivot: LabelId) -> ServiceResult<Label> {
        if id == pivot {
            return self.get(actor, id);
        }
        self.engine
            .write("label_move_after", EntityKind::Label, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize_pair(actor, label_ref(id), label_ref(pivot))?;
                let now_ms = now_epoch_ms();
                move_after_pivot(conn, label_ref(id), label_ref(pivot), now_ms)?;
                outbox.changed(owner_id, now_ms);
                Ok(require_label(conn, id)?)
            })
    }

    pub fn move_as_first(&self, actor: UserId, id: LabelId) -> ServiceResult<Label> {
        self.engine
            .write("label_move_as_first", EntityKind::Label, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, label_ref(id), Capability::Edit)?;
                let now_ms = now_epoch_ms();
                move_to_scope_start(conn, label_ref(id), now_ms)?;
                outbox.changed(owner_id, now_ms);
                Ok(require_label(conn, id)?)
            })
    }

    /// Inserts a copy of `id` right after it.
    pub fn duplicate(&self, actor: UserId, id: LabelId) -> ServiceResult<Label> {
        self.engine
            .write("label_duplicate", EntityKind::Label, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, label_ref(id), Capability::Edit)?;
                let source = require_label(conn, id)?;
                let placement = load_placement(conn, label_ref(id))?;
                let now_ms = now_epoch_ms();
                let position = insert_after(conn, &placement.scope, placement.position, now_ms)?;
                let copy = Label {
                    id: Uuid::new_v4(),
                    position,
                    created_at: now_ms,
                    modified_at: now_ms,
                    ..source
                };
                insert_label(conn, &copy)?;
                outbox.changed(owner_id, now_ms);
                Ok(copy)
            })
    }

    /// Deletes `id`; survivors keep their positions.
    pub fn delete(&self, actor: UserId, id: LabelId) -> ServiceResult<()> {
        self.engine
            .write("label_delete", EntityKind::Label, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, label_ref(id), Capability::Edit)?;
                let now_ms = now_epoch_ms();
                touch_tasks_with_label(conn, id, now_ms)?;
                delete_root(conn, label_ref(id))?;
                outbox.deleted(owner_id, EntityKind::Label, id);
                Ok(())
            })
    }

    /// Replaces name and color.
    pub fn update(&self, actor: UserId, id: LabelId, payload: NewLabel) -> ServiceResult<Label> {
        let name = normalize_name("label name", &payload.name)?;
        let color = normalize_color(payload.color.as_deref())?;
        self.engine
            .write("label_update", EntityKind::Label, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, label_ref(id), Capability::Edit)?;
                let mut label = require_label(conn, id)?;
                label.name = name.clone();
                label.color = color.clone();
                let now_ms = now_epoch_ms();
                update_label_attrs(conn, &label, now_ms)?;
                outbox.changed(owner_id, now_ms);
                Ok(require_label(conn, id)?)
            })
    }
}
