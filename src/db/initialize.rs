use crate::db::migrate::{run_pending_migrations, table_exists};
use crate::errors::{AppError, AppResult};
use rusqlite::Connection;

/// Tables the scheduler, resolver and auto-creator read and write.
const REQUIRED_TABLES: [&str; 5] = [
    "log",
    "sessions",
    "session_instances",
    "attendance",
    "person_current_location",
];

/// Bring the schema up to date, then confirm every scheduling table is present.
pub fn init_db(conn: &Connection) -> AppResult<()> {
    run_pending_migrations(conn)?;

    for table in REQUIRED_TABLES {
        if !table_exists(conn, table)? {
            return Err(AppError::Consistency(format!(
                "table '{table}' is missing after migrations"
            )));
        }
    }

    Ok(())
}
