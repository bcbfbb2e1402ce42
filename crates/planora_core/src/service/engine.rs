//! Transactional mutation engine.
//!
//! # Responsibility
//! - Run every ordering mutation inside one `BEGIN IMMEDIATE` transaction.
//! - Retry the whole mutation after a position uniqueness conflict.
//! - Deliver buffered notifications after commit, swallowing failures.
//!
//! # Invariants
//! - A failed attempt rolls back completely; its outbox is discarded.
//! - Notifier errors never change the result of a committed mutation.

use super::error::{ServiceError, ServiceResult};
use super::filter_service::FilterService;
use super::habit_service::HabitService;
use super::label_service::LabelService;
use super::project_service::ProjectService;
use super::task_service::TaskService;
use crate::collab::{
    AccessCheck, Capability, ChangeEvent, ChangeNotifier, NoopNotifier, Outbox, SqliteAccessCheck,
};
use crate::config::EngineConfig;
use crate::model::{EntityKind, EntityRef, OwnerId, UserId};
use crate::order::Container;
use log::{error, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// Entry point for ordered-entity services over one connection.
pub struct Engine<'conn, A: AccessCheck, N: ChangeNotifier> {
    conn: &'conn Connection,
    access: A,
    notifier: N,
    config: EngineConfig,
}

impl<'conn> Engine<'conn, SqliteAccessCheck<'conn>, NoopNotifier> {
    /// Engine with the SQLite access check, no notifications and default
    /// config.
    pub fn with_defaults(conn: &'conn Connection) -> Self {
        Self::new(
            conn,
            SqliteAccessCheck::new(conn),
            NoopNotifier,
            EngineConfig::default(),
        )
    }
}

impl<'conn, A: AccessCheck, N: ChangeNotifier> Engine<'conn, A, N> {
    pub fn new(conn: &'conn Connection, access: A, notifier: N, config: EngineConfig) -> Self {
        Self {
            conn,
            access,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn projects(&self) -> ProjectService<'_, A, N> {
        ProjectService::new(self)
    }

    pub fn tasks(&self) -> TaskService<'_, A, N> {
        TaskService::new(self)
    }

    pub fn labels(&self) -> LabelService<'_, A, N> {
        LabelService::new(self)
    }

    pub fn filters(&self) -> FilterService<'_, A, N> {
        FilterService::new(self)
    }

    pub fn habits(&self) -> HabitService<'_, A, N> {
        HabitService::new(self)
    }

    /// Checks `capability` and returns the entity owner.
    pub(crate) fn authorize(
        &self,
        actor: UserId,
        entity: EntityRef,
        capability: Capability,
    ) -> ServiceResult<OwnerId> {
        Ok(self.access.can_act(actor, entity, capability)?)
    }

    /// Owner of the collection behind `container`; the actor's own root
    /// collection when the container is `Root`.
    pub(crate) fn authorize_container(
        &self,
        actor: UserId,
        container: Container,
        capability: Capability,
    ) -> ServiceResult<OwnerId> {
        match container.entity() {
            Some(entity) => self.authorize(actor, entity, capability),
            None => Ok(actor),
        }
    }

    /// Checks edit rights on an item and its pivot, which must share an owner.
    pub(crate) fn authorize_pair(
        &self,
        actor: UserId,
        moved: EntityRef,
        pivot: EntityRef,
    ) -> ServiceResult<OwnerId> {
        let owner_id = self.authorize(actor, moved, Capability::Edit)?;
        let pivot_owner = self.authorize(actor, pivot, Capability::Edit)?;
        if pivot_owner != owner_id {
            return Err(ServiceError::InvalidState(format!(
                "{moved} and {pivot} belong to different owners"
            )));
        }
        Ok(owner_id)
    }

    /// Runs a read-only query on the engine connection.
    pub(crate) fn read<T>(
        &self,
        body: impl FnOnce(&Connection) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        body(self.conn)
    }

    /// Runs `body` inside an immediate transaction, retrying conflicts.
    ///
    /// `body` may run more than once; it must derive everything from the
    /// connection state it observes.
    pub(crate) fn write<T>(
        &self,
        op: &'static str,
        kind: EntityKind,
        mut body: impl FnMut(&Connection, &mut Outbox) -> ServiceResult<T>,
    ) -> ServiceResult<T> {
        let started_at = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            let mut outbox = Outbox::new();
            match self.run_once(&mut body, &mut outbox) {
                Ok(value) => {
                    info!(
                        "event={} module=service status=ok kind={} attempts={} duration_ms={}",
                        op,
                        kind,
                        attempt + 1,
                        started_at.elapsed().as_millis()
                    );
                    self.dispatch(op, outbox.into_events());
                    return Ok(value);
                }
                Err(err) => {
                    let err = err.into_conflict(kind);
                    if err.is_conflict() && attempt < self.config.conflict_retries {
                        attempt += 1;
                        warn!(
                            "event={} module=service status=retry kind={} attempt={} error_code=conflict",
                            op, kind, attempt
                        );
                        continue;
                    }
                    error!(
                        "event={} module=service status=error kind={} attempts={} duration_ms={} error_code={} error={}",
                        op,
                        kind,
                        attempt + 1,
                        started_at.elapsed().as_millis(),
                        err.code(),
                        err
                    );
                    return Err(err);
                }
            }
        }
    }

    fn run_once<T>(
        &self,
        body: &mut impl FnMut(&Connection, &mut Outbox) -> ServiceResult<T>,
        outbox: &mut Outbox,
    ) -> ServiceResult<T> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let value = body(&*tx, outbox)?;
        tx.commit()?;
        Ok(value)
    }

    fn dispatch(&self, op: &'static str, events: Vec<ChangeEvent>) {
        for event in events {
            if let Err(err) = event.deliver(&self.notifier) {
                warn!(
                    "event=notify_dispatch module=service status=error op={} notification={} error_code=notify_failed error={}",
                    op,
                    event.name(),
                    err
                );
            }
        }
    }
}
