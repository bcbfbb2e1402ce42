//! Change-notifier collaborator interface and post-commit outbox.
//!
//! # Responsibility
//! - Describe the "entity changed/deleted" side channel consumed after a
//!   successful commit.
//! - Buffer events raised inside a transaction until it commits.
//!
//! # Invariants
//! - Events are delivered only after `COMMIT` succeeds.
//! - Delivery is best-effort: failures are reported to the engine, which
//!   logs and drops them.

use crate::model::{EntityKind, OwnerId, UserId};
use log::info;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

/// Delivery failure reported by a notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotifyError(pub String);

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification delivery failed: {}", self.0)
    }
}

impl Error for NotifyError {}

/// Fire-and-forget change side channel.
pub trait ChangeNotifier {
    fn notify_changed(&self, owner_id: OwnerId, timestamp_ms: i64) -> Result<(), NotifyError>;

    fn notify_deleted(
        &self,
        owner_id: OwnerId,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<(), NotifyError>;

    fn notify_collaborators_changed(
        &self,
        collaborators: &[UserId],
        timestamp_ms: i64,
    ) -> Result<(), NotifyError>;

    fn notify_collaborators_deleted(
        &self,
        collaborators: &[UserId],
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<(), NotifyError>;
}

impl<T: ChangeNotifier + ?Sized> ChangeNotifier for Arc<T> {
    fn notify_changed(&self, owner_id: OwnerId, timestamp_ms: i64) -> Result<(), NotifyError> {
        (**self).notify_changed(owner_id, timestamp_ms)
    }

    fn notify_deleted(
        &self,
        owner_id: OwnerId,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<(), NotifyError> {
        (**self).notify_deleted(owner_id, kind, entity_id)
    }

    fn notify_collaborators_changed(
        &self,
        collaborators: &[UserId],
        timestamp_ms: i64,
    ) -> Result<(), NotifyError> {
        (**self).notify_collaborators_changed(collaborators, timestamp_ms)
    }

    fn notify_collaborators_deleted(
        &self,
        collaborators: &[UserId],
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<(), NotifyError> {
        (**self).notify_collaborators_deleted(collaborators, kind, entity_id)
    }
}

/// Notifier that drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl ChangeNotifier for NoopNotifier {
    fn notify_changed(&self, _owner_id: OwnerId, _timestamp_ms: i64) -> Result<(), NotifyError> {
        Ok(())
    }

    fn notify_deleted(
        &self,
        _owner_id: OwnerId,
        _kind: EntityKind,
        _entity_id: Uuid,
    ) -> Result<(), NotifyError> {
        Ok(())
    }

    fn notify_collaborators_changed(
        &self,
        _collaborators: &[UserId],
        _timestamp_ms: i64,
    ) -> Result<(), NotifyError> {
        Ok(())
    }

    fn notify_collaborators_deleted(
        &self,
        _collaborators: &[UserId],
        _kind: EntityKind,
        _entity_id: Uuid,
    ) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Notifier that records events as metadata-only log lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

impl ChangeNotifier for LoggingNotifier {
    fn notify_changed(&self, owner_id: OwnerId, timestamp_ms: i64) -> Result<(), NotifyError> {
        info!("event=entity_changed module=notify status=ok owner={owner_id} ts={timestamp_ms}");
        Ok(())
    }

    fn notify_deleted(
        &self,
        owner_id: OwnerId,
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<(), NotifyError> {
        info!(
            "event=entity_deleted module=notify status=ok owner={owner_id} kind={kind} id={entity_id}"
        );
        Ok(())
    }

    fn notify_collaborators_changed(
        &self,
        collaborators: &[UserId],
        timestamp_ms: i64,
    ) -> Result<(), NotifyError> {
        info!(
            "event=collaborators_changed module=notify status=ok recipients={} ts={timestamp_ms}",
            collaborators.len()
        );
        Ok(())
    }

    fn notify_collaborators_deleted(
        &self,
        collaborators: &[UserId],
        kind: EntityKind,
        entity_id: Uuid,
    ) -> Result<(), NotifyError> {
        info!(
            "event=collaborators_deleted module=notify status=ok recipients={} kind={kind} id={entity_id}",
            collaborators.len()
        );
        Ok(())
    }
}

/// One buffered notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    Changed {
        owner_id: OwnerId,
        timestamp_ms: i64,
    },
    Deleted {
        owner_id: OwnerId,
        kind: EntityKind,
        entity_id: Uuid,
    },
    CollaboratorsChanged {
        collaborators: Vec<UserId>,
        timestamp_ms: i64,
    },
    CollaboratorsDeleted {
        collaborators: Vec<UserId>,
        kind: EntityKind,
        entity_id: Uuid,
    },
}

impl ChangeEvent {
    /// Short name used in delivery-failure logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Changed { .. } => "changed",
            Self::Deleted { .. } => "deleted",
            Self::CollaboratorsChanged { .. } => "collaborators_changed",
            Self::CollaboratorsDeleted { .. } => "collaborators_deleted",
        }
    }

    pub fn deliver(&self, notifier: &dyn ChangeNotifier) -> Result<(), NotifyError> {
        match self {
            Self::Changed {
                owner_id,
                timestamp_ms,
            } => notifier.notify_changed(*owner_id, *timestamp_ms),
            Self::Deleted {
                owner_id,
                kind,
                entity_id,
            } => notifier.notify_deleted(*owner_id, *kind, *entity_id),
            Self::CollaboratorsChanged {
                collaborators,
                timestamp_ms,
            } => notifier.notify_collaborators_changed(collaborators, *timestamp_ms),
            Self::CollaboratorsDeleted {
                collaborators,
                kind,
                entity_id,
            } => notifier.notify_collaborators_deleted(collaborators, *kind, *entity_id),
        }
    }
}

/// Events raised by one transaction, delivered after commit.
#[derive(Debug, Default)]
pub struct Outbox {
    events: Vec<ChangeEvent>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an owner-level change; repeated changes collapse into one.
    pub fn changed(&mut self, owner_id: OwnerId, timestamp_ms: i64) {
        let already = self.events.iter().any(|event| {
            matches!(event, ChangeEvent::Changed { owner_id: existing, .. } if *existing == owner_id)
        });
        if !already {
            self.events.push(ChangeEvent::Changed {
                owner_id,
                timestamp_ms,
            });
        }
    }

    pub fn deleted(&mut self, owner_id: OwnerId, kind: EntityKind, entity_id: Uuid) {
        self.events.push(ChangeEvent::Deleted {
            owner_id,
            kind,
            entity_id,
        });
    }

    /// No-op for an empty recipient list.
    pub fn collaborators_changed(&mut self, collaborators: Vec<UserId>, timestamp_ms: i64) {
        if collaborators.is_empty() {
            return;
        }
        self.events.push(ChangeEvent::CollaboratorsChanged {
            collaborators,
            timestamp_ms,
        });
    }

    /// No-op for an empty recipient list.
    pub fn collaborators_deleted(
        &mut self,
        collaborators: Vec<UserId>,
        kind: EntityKind,
        entity_id: Uuid,
    ) {
        if collaborators.is_empty() {
            return;
        }
        self.events.push(ChangeEvent::CollaboratorsDeleted {
            collaborators,
            kind,
            entity_id,
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn into_events(self) -> Vec<ChangeEvent> {
        self.events
    }
}
