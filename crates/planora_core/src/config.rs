//! Engine configuration.
//!
//! # Responsibility
//! - Hold tunables shared by connection bootstrap and the mutation engine.
//!
//! # Invariants
//! - `Default` values are the ones used by `open_db` / `open_db_in_memory`.

use std::time::Duration;

/// Default wait for the SQLite write lock before a mutation fails.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);
/// Default number of internal retries after a position uniqueness conflict.
pub const DEFAULT_CONFLICT_RETRIES: u32 = 1;

/// Tunables for connection bootstrap and transactional mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long a writer waits on a locked database before giving up.
    pub busy_timeout: Duration,
    /// Extra attempts made after a `Conflict` before surfacing it.
    pub conflict_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            conflict_retries: DEFAULT_CONFLICT_RETRIES,
        }
    }
}

impl EngineConfig {
    /// Returns a copy with a different busy timeout.
    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.busy_timeout = busy_timeout;
        self
    }

    /// Returns a copy with a different conflict retry budget.
    pub fn with_conflict_retries(mut self, conflict_retries: u32) -> Self {
        self.conflict_retries = conflict_retries;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::{EngineConfig, DEFAULT_BUSY_TIMEOUT};
    use std::time::Duration;

    #[test]
    fn default_retries_once() {
        let config = EngineConfig::default();
        assert_eq!(config.conflict_retries, 1);
        assert_eq!(config.busy_timeout, DEFAULT_BUSY_TIMEOUT);
    }

    #[test]
    fn setters_override_single_field() {
        let config = EngineConfig::default()
            .with_busy_timeout(Duration::from_millis(250))
            .with_conflict_retries(0);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
        assert_eq!(config.conflict_retries, 0);
    }
}
