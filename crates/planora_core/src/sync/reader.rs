//! Per-owner change feed keyed by `modified_at`.
//!
//! # Invariants
//! - Rows are returned only when `modified_at > since_ms`.
//! - Each kind is ordered by `modified_at ASC, uuid ASC`.
//! - Deleted rows never appear; deletions travel through the notifier.

use crate::model::filter::Filter;
use crate::model::habit::Habit;
use crate::model::label::Label;
use crate::model::project::Project;
use crate::model::task::Task;
use crate::model::OwnerId;
use crate::repo::filter_repo::filters_changed_since;
use crate::repo::habit_repo::habits_changed_since;
use crate::repo::label_repo::labels_changed_since;
use crate::repo::project_repo::projects_changed_since;
use crate::repo::task_repo::tasks_changed_since;
use crate::service::ServiceResult;
use log::debug;
use rusqlite::Connection;
use serde::Serialize;

/// Everything one owner changed after a given instant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncBatch {
    pub projects: Vec<Project>,
    pub tasks: Vec<Task>,
    pub labels: Vec<Label>,
    pub filters: Vec<Filter>,
    pub habits: Vec<Habit>,
    /// Largest `modified_at` in the batch, or the requested `since` when empty.
    pub high_water_ms: i64,
}

impl SyncBatch {
    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
            && self.tasks.is_empty()
            && self.labels.is_empty()
            && self.filters.is_empty()
            && self.habits.is_empty()
    }

    pub fn len(&self) -> usize {
        self.projects.len()
            + self.tasks.len()
            + self.labels.len()
            + self.filters.len()
            + self.habits.len()
    }

    fn stamps(&self) -> impl Iterator<Item = i64> + '_ {
        self.projects
            .iter()
            .map(|item| item.modified_at)
            .chain(self.tasks.iter().map(|item| item.modified_at))
            .chain(self.labels.iter().map(|item| item.modified_at))
            .chain(self.filters.iter().map(|item| item.modified_at))
            .chain(self.habits.iter().map(|item| item.modified_at))
    }
}

/// Read-only view over one connection.
pub struct SyncReader<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SyncReader<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    pub fn projects_since(&self, owner: OwnerId, since_ms: i64) -> ServiceResult<Vec<Project>> {
        Ok(projects_changed_since(self.conn, owner, since_ms)?)
    }

    pub fn tasks_since(&self, owner: OwnerId, since_ms: i64) -> ServiceResult<Vec<Task>> {
        Ok(tasks_changed_since(self.conn, owner, since_ms)?)
    }

    pub fn labels_since(&self, owner: OwnerId, since_ms: i64) -> ServiceResult<Vec<Label>> {
        Ok(labels_changed_since(self.conn, owner, since_ms)?)
    }

    pub fn filters_since(&self, owner: OwnerId, since_ms: i64) -> ServiceResult<Vec<Filter>> {
        Ok(filters_changed_since(self.conn, owner, since_ms)?)
    }

    pub fn habits_since(&self, owner: OwnerId, since_ms: i64) -> ServiceResult<Vec<Habit>> {
        Ok(habits_changed_since(self.conn, owner, since_ms)?)
    }

    /// Collects all kinds for `owner` changed after `since_ms`.
    pub fn changes_since(&self, owner: OwnerId, since_ms: i64) -> ServiceResult<SyncBatch> {
        let mut batch = SyncBatch {
            projects: self.projects_since(owner, since_ms)?,
            tasks: self.tasks_since(owner, since_ms)?,
            labels: self.labels_since(owner, since_ms)?,
            filters: self.filters_since(owner, since_ms)?,
            habits: self.habits_since(owner, since_ms)?,
            high_water_ms: since_ms,
        };
        batch.high_water_ms = batch.stamps().max().unwrap_or(since_ms);
        debug!(
            "event=sync_changes_since module=sync status=ok since_ms={} high_water_ms={} rows={}",
            since_ms,
            batch.high_water_ms,
            batch.len()
        );
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::SyncBatch;

    #[test]
    fn empty_batch_reports_no_rows() {
        let batch = SyncBatch {
            high_water_ms: 42,
            ..SyncBatch::default()
        };
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);
        assert_eq!(batch.stamps().max(), None);
    }
}
