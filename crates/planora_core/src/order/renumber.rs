//! Bulk Renumber Executor.
//!
//! # Responsibility
//! - Shift every item of one scope above a pivot by +1 with set-based writes.
//!
//! # Invariants
//! - No read-modify-write loop: the shift set is selected by the UPDATE
//!   predicate, evaluated against the pre-shift rows.
//! - Shifted rows get `modified_at = now_ms`.
//! - Must run inside the caller's transaction; a partial shift is never
//!   committed.
//!
//! SQLite checks UNIQUE indexes row by row during an UPDATE, so `+1` on a
//! dense range would trip `ux_*_scope_position` midway. Shifted rows are
//! first parked at `-(position + 1)` (unique, and disjoint from every live
//! positive position) and then flipped back in a second statement.

use super::scope::Scope;
use crate::repo::RepoResult;
use log::debug;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};

/// Increments `position` of every item in `scope` above `threshold`.
///
/// `inclusive = true` shifts `position >= threshold`, otherwise
/// `position > threshold`. Returns the number of shifted rows; zero rows is
/// a valid no-op.
pub fn shift_positions_greater_than(
    conn: &Connection,
    scope: &Scope,
    threshold: i64,
    inclusive: bool,
    now_ms: i64,
) -> RepoResult<usize> {
    let table = scope.kind.table();
    let (predicate, scope_values) = scope.predicate();
    let comparator = if inclusive { ">=" } else { ">" };

    let mut park_values = vec![Value::Integer(now_ms)];
    park_values.extend(scope_values.iter().cloned());
    park_values.push(Value::Integer(threshold));
    let shifted = conn.execute(
        &format!(
            "UPDATE {table}
             SET position = -(position + 1),
                 modified_at = ?
             WHERE {predicate}
               AND position > 0
               AND position {comparator} ?;"
        ),
        params_from_iter(park_values),
    )?;

    if shifted > 0 {
        conn.execute(
            &format!(
                "UPDATE {table}
                 SET position = -position
                 WHERE {predicate}
                   AND position < 0;"
            ),
            params_from_iter(scope_values),
        )?;
    }

    debug!(
        "event=positions_shift module=order status=ok kind={} threshold={} inclusive={} shifted={}",
        scope.kind, threshold, inclusive, shifted
    );
    Ok(shifted)
}
