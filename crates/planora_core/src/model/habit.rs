//! Habit domain model.
//!
//! A habit is tracked with two polarity flags: a positive habit counts
//! "did it", a negative habit counts "slipped". A habit may allow both.

use super::project::ProjectId;
use super::OwnerId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type HabitId = Uuid;

/// Which counter a completion targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HabitPolarity {
    Positive,
    Negative,
}

impl HabitPolarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

/// Canonical habit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Habit {
    pub id: HabitId,
    pub owner_id: OwnerId,
    pub project_id: Option<ProjectId>,
    pub title: String,
    pub is_positive: bool,
    pub is_negative: bool,
    pub positive_count: i64,
    pub negative_count: i64,
    pub position: i64,
    pub is_archived: bool,
    pub created_at: i64,
    pub modified_at: i64,
}

impl Habit {
    /// Whether completions of `polarity` are allowed for this habit.
    pub fn allows(&self, polarity: HabitPolarity) -> bool {
        match polarity {
            HabitPolarity::Positive => self.is_positive,
            HabitPolarity::Negative => self.is_negative,
        }
    }
}

/// Payload for habit creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHabit {
    pub title: String,
    pub is_positive: bool,
    pub is_negative: bool,
}

impl NewHabit {
    /// Positive-only habit.
    pub fn positive(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            is_positive: true,
            is_negative: false,
        }
    }

    /// Negative-only habit.
    pub fn negative(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            is_positive: false,
            is_negative: true,
        }
    }
}
