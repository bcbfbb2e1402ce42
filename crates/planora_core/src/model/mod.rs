//! Domain model for ordered productivity entities.
//!
//! # Responsibility
//! - Define canonical records for projects, tasks, labels, filters and habits.
//! - Provide shared identity aliases and value normalization helpers.
//!
//! # Invariants
//! - Every record is identified by a stable UUID that is never reused.
//! - Every record carries a scope-relative `position` (1 = first) and a
//!   `modified_at` epoch-ms stamp refreshed on every mutation.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub mod filter;
pub mod habit;
pub mod label;
pub mod project;
pub mod task;

/// Identity of an acting user or collection owner.
pub type UserId = Uuid;
/// Owner of an ordered collection. Same identity space as [`UserId`].
pub type OwnerId = UserId;

static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("valid color regex"));

/// Color assigned when a payload does not provide one.
pub const DEFAULT_COLOR: &str = "#808080";

/// Ordered entity families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Project,
    Task,
    Label,
    Filter,
    Habit,
}

impl EntityKind {
    /// Stable lowercase name used in logs and notifications.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Project => "project",
            Self::Task => "task",
            Self::Label => "label",
            Self::Filter => "filter",
            Self::Habit => "habit",
        }
    }

    /// Backing SQLite table.
    pub(crate) fn table(self) -> &'static str {
        match self {
            Self::Project => "projects",
            Self::Task => "tasks",
            Self::Label => "labels",
            Self::Filter => "filters",
            Self::Habit => "habits",
        }
    }
}

impl Display for EntityKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reference to one entity of any kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id: Uuid,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl Display for EntityRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

/// Value rejected by model-level normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// Name/title is blank after trim.
    BlankName(&'static str),
    /// Color is not `#rrggbb`.
    InvalidColor(String),
    /// Priority outside `1..=4`.
    InvalidPriority(i64),
}

impl Display for ValueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankName(field) => write!(f, "{field} must not be blank"),
            Self::InvalidColor(value) => write!(f, "color must be #rrggbb, got `{value}`"),
            Self::InvalidPriority(value) => write!(f, "priority must be 1..=4, got {value}"),
        }
    }
}

impl std::error::Error for ValueError {}

/// Trims a user-facing name and rejects blank values.
pub fn normalize_name(field: &'static str, value: &str) -> Result<String, ValueError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ValueError::BlankName(field));
    }
    Ok(trimmed.to_string())
}

/// Validates an optional color, falling back to [`DEFAULT_COLOR`].
pub fn normalize_color(value: Option<&str>) -> Result<String, ValueError> {
    match value.map(str::trim) {
        None => Ok(DEFAULT_COLOR.to_string()),
        Some(color) if COLOR_RE.is_match(color) => Ok(color.to_ascii_lowercase()),
        Some(color) => Err(ValueError::InvalidColor(color.to_string())),
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}
