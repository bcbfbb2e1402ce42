//! Project domain model.
//!
//! # Invariants
//! - `parent_id` forms a forest; a project is never its own ancestor.
//! - `is_archived` cascades down on archive but not on restore.

use super::{OwnerId, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ProjectId = Uuid;

/// Canonical project record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub owner_id: OwnerId,
    /// `None` means top-level project.
    pub parent_id: Option<ProjectId>,
    pub name: String,
    pub color: String,
    pub is_favorite: bool,
    /// Rank within `(owner_id, parent_id)`; 1 = first.
    pub position: i64,
    pub is_archived: bool,
    pub created_at: i64,
    pub modified_at: i64,
}

/// Payload for project creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewProject {
    pub name: String,
    pub color: Option<String>,
    pub is_favorite: bool,
}

impl NewProject {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}

/// Partial update for mutable project attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub color: Option<String>,
    pub is_favorite: Option<bool>,
}

/// Collaboration grant on a shared project, ordered by strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollaboratorGrant {
    View,
    CompleteOnly,
    Edit,
}

impl CollaboratorGrant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::View => "view",
            Self::CompleteOnly => "complete_only",
            Self::Edit => "edit",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "view" => Some(Self::View),
            "complete_only" => Some(Self::CompleteOnly),
            "edit" => Some(Self::Edit),
            _ => None,
        }
    }
}

/// One collaborator attached to a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collaborator {
    pub user_id: UserId,
    pub grant: CollaboratorGrant,
}
