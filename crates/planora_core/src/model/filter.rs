//! Saved filter domain model.

use super::OwnerId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type FilterId = Uuid;

/// Owner-scoped saved query; ordered by `position` within the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub id: FilterId,
    pub owner_id: OwnerId,
    pub name: String,
    /// Opaque query text; interpreted by callers, not by the core.
    pub query: String,
    pub color: String,
    pub is_favorite: bool,
    pub position: i64,
    pub created_at: i64,
    pub modified_at: i64,
}

/// Payload for filter creation and update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewFilter {
    pub name: String,
    pub query: String,
    pub color: Option<String>,
    pub is_favorite: bool,
}

impl NewFilter {
    pub fn new(name: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            query: query.into(),
            ..Self::default()
        }
    }
}
