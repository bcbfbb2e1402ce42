//! Task domain model.
//!
//! # Invariants
//! - A sub-task shares the project of its root task.
//! - `is_completed` and `is_archived` are independent flags.

use super::label::LabelId;
use super::project::ProjectId;
use super::{OwnerId, ValueError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type TaskId = Uuid;

/// Task urgency. `P1` is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    P1,
    P2,
    P3,
    #[default]
    P4,
}

impl Priority {
    pub fn as_i64(self) -> i64 {
        match self {
            Self::P1 => 1,
            Self::P2 => 2,
            Self::P3 => 3,
            Self::P4 => 4,
        }
    }

    pub fn from_i64(value: i64) -> Result<Self, ValueError> {
        match value {
            1 => Ok(Self::P1),
            2 => Ok(Self::P2),
            3 => Ok(Self::P3),
            4 => Ok(Self::P4),
            other => Err(ValueError::InvalidPriority(other)),
        }
    }
}

/// Canonical task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub owner_id: OwnerId,
    pub project_id: Option<ProjectId>,
    /// When set, the task is ordered among its parent's children.
    pub parent_id: Option<TaskId>,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    /// Epoch milliseconds.
    pub due_at: Option<i64>,
    pub position: i64,
    pub is_completed: bool,
    pub is_archived: bool,
    /// Sorted label ids.
    pub labels: Vec<LabelId>,
    pub created_at: i64,
    pub modified_at: i64,
}

/// Payload for task creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub due_at: Option<i64>,
    pub labels: Vec<LabelId>,
}

impl NewTask {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }
}
