//! Saved filter use-case service.
//!
//! Filters live in one ordered list per owner; the query text is stored
//! verbatim and never interpreted here.

use super::engine::Engine;
use super::error::ServiceResult;
use super::{move_after_pivot, move_to_scope_start, SlotAllocator};
use crate::collab::{AccessCheck, Capability, ChangeNotifier};
use crate::model::filter::{Filter, FilterId, NewFilter};
use crate::model::{
    normalize_color, normalize_name, now_epoch_ms, EntityKind, EntityRef, OwnerId, UserId,
};
use crate::order::allocator::{append_position, insert_after, insert_before};
use crate::order::cascade::delete_root;
use crate::order::scope::{load_placement, Scope};
use crate::repo::filter_repo::{insert_filter, list_filters, require_filter, update_filter_attrs};
use uuid::Uuid;

fn filter_ref(id: FilterId) -> EntityRef {
    EntityRef::new(EntityKind::Filter, id)
}

/// Validated filter payload.
struct FilterDraft {
    name: String,
    query: String,
    color: String,
    is_favorite: bool,
}

impl FilterDraft {
    fn validate(payload: &NewFilter) -> ServiceResult<Self> {
        Ok(Self {
            name: normalize_name("filter name", &payload.name)?,
            query: normalize_name("filter query", &payload.query)?,
            color: normalize_color(payload.color.as_deref())?,
            is_favorite: payload.is_favorite,
        })
    }

    fn build(&self, owner_id: OwnerId, position: i64, now_ms: i64) -> Filter {
        Filter {
            id: Uuid::new_v4(),
            owner_id,
            name: self.name.clone(),
            query: self.query.clone(),
            color: self.color.clone(),
            is_favorite: self.is_favorite,
            position,
            created_at: now_ms,
            modified_at: now_ms,
        }
    }
}

/// Filter service facade over one engine.
pub struct FilterService<'e, A: AccessCheck, N: ChangeNotifier> {
    engine: &'e Engine<'e, A, N>,
}

impl<'e, A: AccessCheck, N: ChangeNotifier> FilterService<'e, A, N> {
    pub(crate) fn new(engine: &'e Engine<'e, A, N>) -> Self {
        Self { engine }
    }

    pub fn get(&self, actor: UserId, id: FilterId) -> ServiceResult<Filter> {
        self.engine.authorize(actor, filter_ref(id), Capability::View)?;
        self.engine.read(|conn| Ok(require_filter(conn, id)?))
    }

    /// Lists the actor's filters ordered by position.
    pub fn list(&self, actor: UserId) -> ServiceResult<Vec<Filter>> {
        self.engine.read(|conn| Ok(list_filters(conn, actor)?))
    }

    pub fn add(&self, actor: UserId, payload: NewFilter) -> ServiceResult<Filter> {
        let draft = FilterDraft::validate(&payload)?;
        self.engine
            .write("filter_add", EntityKind::Filter, |conn, outbox| {
                let now_ms = now_epoch_ms();
                let position = append_position(conn, &Scope::root(EntityKind::Filter, actor))?;
                let filter = draft.build(actor, position, now_ms);
                insert_filter(conn, &filter)?;
                outbox.changed(actor, now_ms);
                Ok(filter)
            })
    }

    pub fn add_after(
        &self,
        actor: UserId,
        pivot: FilterId,
        payload: NewFilter,
    ) -> ServiceResult<Filter> {
        self.add_next_to(actor, pivot, payload, "filter_add_after", insert_after)
    }

    pub fn add_before(
        &self,
        actor: UserId,
        pivot: FilterId,
        payload: NewFilter,
    ) -> ServiceResult<Filter> {
        self.add_next_to(actor, pivot, payload, "filter_add_before", insert_before)
    }

    fn add_next_to(
        &self,
        actor: UserId,
        pivot: FilterId,
        payload: NewFilter,
        op: &'static str,
        allocate: SlotAllocator,
    ) -> ServiceResult<Filter> {
        let draft = FilterDraft::validate(&payload)?;
        self.engine.write(op, EntityKind::Filter, |conn, outbox| {
            let owner_id = self
                .engine
                .authorize(actor, filter_ref(pivot), Capability::Edit)?;
            let placement = load_placement(conn, filter_ref(pivot))?;
            let now_ms = now_epoch_ms();
            let position = allocate(conn, &placement.scope, placement.position, now_ms)?;
            let filter = draft.build(owner_id, position, now_ms);
            insert_filter(conn, &filter)?;
            outbox.changed(owner_id, now_ms);
            Ok(filter)
        })
    }

    pub fn move_after(
        &self,
        actor: UserId,
        id: FilterId,
        pivot: FilterId,
    ) -> ServiceResult<Filter> {
        if id == pivot {
            return self.get(actor, id);
        }
        self.engine
            .write("filter_move_after", EntityKind::Filter, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize_pair(actor, filter_ref(id), filter_ref(pivot))?;
                let now_ms = now_epoch_ms();
                move_after_pivot(conn, filter_ref(id), filter_ref(pivot), now_ms)?;
                outbox.changed(owner_id, now_ms);
                Ok(require_filter(conn, id)?)
            })
    }

    pub fn move_as_first(&self, actor: UserId, id: FilterId) -> ServiceResult<Filter> {
        self.engine
            .write("filter_move_as_first", EntityKind::Filter, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, filter_ref(id), Capability::Edit)?;
                let now_ms = now_epoch_ms();
                move_to_scope_start(conn, filter_ref(id), now_ms)?;
                outbox.changed(owner_id, now_ms);
                Ok(require_filter(conn, id)?)
            })
    }

    /// Inserts a copy of `id` right after it.
    pub fn duplicate(&self, actor: UserId, id: FilterId) -> ServiceResult<Filter> {
        self.engine
            .write("filter_duplicate", EntityKind::Filter, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, filter_ref(id), Capability::Edit)?;
                let source = require_filter(conn, id)?;
                let placement = load_placement(conn, filter_ref(id))?;
                let now_ms = now_epoch_ms();
                let position = insert_after(conn, &placement.scope, placement.position, now_ms)?;
                let copy = Filter {
                    id: Uuid::new_v4(),
                    position,
                    created_at: now_ms,
                    modified_at: now_ms,
                    ..source
                };
                insert_filter(conn, &copy)?;
                outbox.changed(owner_id, now_ms);
                Ok(copy)
            })
    }

    pub fn delete(&self, actor: UserId, id: FilterId) -> ServiceResult<()> {
        self.engine
            .write("filter_delete", EntityKind::Filter, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, filter_ref(id), Capability::Edit)?;
                delete_root(conn, filter_ref(id))?;
                outbox.deleted(owner_id, EntityKind::Filter, id);
                Ok(())
            })
    }

    /// Replaces name, query, color and favorite flag.
    pub fn update(&self, actor: UserId, id: FilterId, payload: NewFilter) -> ServiceResult<Filter> {
        let draft = FilterDraft::validate(&payload)?;
        self.engine
            .write("filter_update", EntityKind::Filter, |conn, outbox| {
                let owner_id = self
                    .engine
                    .authorize(actor, filter_ref(id), Capability::Edit)?;
                let mut filter = require_filter(conn, id)?;
                filter.name = draft.name.clone();
                filter.query = draft.query.clone();
                filter.color = draft.color.clone();
                filter.is_favorite = draft.is_favorite;
                let now_ms = now_epoch_ms();
                update_filter_attrs(conn, &filter, now_ms)?;
                outbox.changed(owner_id, now_ms);
                Ok(require_filter(conn, id)?)
            })
    }
}
