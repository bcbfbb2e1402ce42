//! Core ordering engine for Planora.
//!
//! Projects, tasks, labels, saved filters and habits live in ordered
//! scopes. This crate owns every positioning invariant: unique,
//! gap-tolerant positions per scope, set-based shifting on insert, and
//! structural cascades through project and task trees.

pub mod collab;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod order;
pub mod repo;
pub mod service;
pub mod sync;

pub use collab::{
    AccessCheck, AccessError, Capability, ChangeEvent, ChangeNotifier, LoggingNotifier,
    NoopNotifier, NotifyError, SqliteAccessCheck,
};
pub use config::EngineConfig;
pub use db::{open_db, open_db_in_memory, open_db_with_config, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::filter::{Filter, FilterId, NewFilter};
pub use model::habit::{Habit, HabitId, HabitPolarity, NewHabit};
pub use model::label::{Label, LabelId, NewLabel};
pub use model::project::{
    Collaborator, CollaboratorGrant, NewProject, Project, ProjectId, ProjectPatch,
};
pub use model::task::{NewTask, Priority, Task, TaskId};
pub use model::{EntityKind, EntityRef, OwnerId, UserId, ValueError};
pub use order::cascade::{ArchiveOutcome, DeleteSnapshot};
pub use order::{Container, Scope};
pub use repo::{RepoError, RepoResult};
pub use service::{Engine, ServiceError, ServiceResult};
pub use sync::{SyncBatch, SyncReader};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
