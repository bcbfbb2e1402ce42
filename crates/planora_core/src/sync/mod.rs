//! Incremental sync read side.
//!
//! Consumes the `modified_at` stamps written by every ordering mutation.

mod reader;

pub use reader::{SyncBatch, SyncReader};
