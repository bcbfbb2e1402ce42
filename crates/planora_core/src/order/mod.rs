//! Ordered positioning and hierarchical reordering.
//!
//! # Responsibility
//! - Resolve ordering scopes, allocate slots, shift siblings and propagate
//!   structural changes through project/task trees.
//!
//! # Invariants
//! - For a fixed scope no two stored items share a `position`.
//! - Every function here runs on the caller's transaction; none commits.

pub mod allocator;
pub mod cascade;
pub mod renumber;
pub mod scope;

pub use scope::{Container, Placement, Scope, ScopeEntry};
