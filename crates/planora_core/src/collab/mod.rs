//! Collaborator interfaces consumed by the ordering services.
//!
//! # Responsibility
//! - `access`: who may act on an entity, and who owns it.
//! - `notifier`: post-commit change side channel.

pub mod access;
pub mod notifier;

pub use access::{AccessCheck, AccessError, Capability, SqliteAccessCheck};
pub use notifier::{
    ChangeEvent, ChangeNotifier, LoggingNotifier, NoopNotifier, NotifyError, Outbox,
};
