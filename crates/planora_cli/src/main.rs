//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `planora_core` linkage and schema bootstrap from a terminal.
//! - Optionally print one owner's change feed summary.
//!
//! Usage: `planora_cli [db_path|:memory:] [owner_uuid] [since_ms]`

use log::{error, info};
use planora_core::db::migrations::current_user_version;
use planora_core::{open_db, open_db_in_memory, DbResult, SyncReader, UserId};
use rusqlite::Connection;
use std::process::ExitCode;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    println!("planora_core ping={}", planora_core::ping());
    println!("planora_core version={}", planora_core::core_version());

    let db_arg = args.first().map(String::as_str).unwrap_or(":memory:");
    let conn = match open(db_arg) {
        Ok(conn) => conn,
        Err(err) => {
            error!("event=cli_open module=cli status=error error_code=db_open");
            eprintln!("failed to open database `{db_arg}`: {err}");
            return ExitCode::FAILURE;
        }
    };
    match current_user_version(&conn) {
        Ok(version) => println!("schema version={version}"),
        Err(err) => {
            eprintln!("failed to read schema version: {err}");
            return ExitCode::FAILURE;
        }
    }

    let Some(owner_arg) = args.get(1) else {
        return ExitCode::SUCCESS;
    };
    let owner = match UserId::parse_str(owner_arg) {
        Ok(owner) => owner,
        Err(err) => {
            eprintln!("owner must be a uuid: {err}");
            return ExitCode::FAILURE;
        }
    };
    let since_ms = match args.get(2).map(|value| value.parse::<i64>()).transpose() {
        Ok(value) => value.unwrap_or(0),
        Err(err) => {
            eprintln!("since_ms must be an integer: {err}");
            return ExitCode::FAILURE;
        }
    };

    match SyncReader::new(&conn).changes_since(owner, since_ms) {
        Ok(batch) => {
            info!(
                "event=cli_changes module=cli status=ok rows={}",
                batch.len()
            );
            println!(
                "changes projects={} tasks={} labels={} filters={} habits={} high_water_ms={}",
                batch.projects.len(),
                batch.tasks.len(),
                batch.labels.len(),
                batch.filters.len(),
                batch.habits.len(),
                batch.high_water_ms
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to read changes: {err}");
            ExitCode::FAILURE
        }
    }
}

fn open(db_arg: &str) -> DbResult<Connection> {
    if db_arg == ":memory:" {
        open_db_in_memory()
    } else {
        open_db(db_arg)
    }
}
