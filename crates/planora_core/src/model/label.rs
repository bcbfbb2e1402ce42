//! Label domain model.

use super::OwnerId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type LabelId = Uuid;

/// Owner-scoped label; ordered by `position` within the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub owner_id: OwnerId,
    pub name: String,
    pub color: String,
    pub position: i64,
    pub created_at: i64,
    pub modified_at: i64,
}

/// Payload for label creation and update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewLabel {
    pub name: String,
    pub color: Option<String>,
}

impl NewLabel {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            color: None,
        }
    }
}
