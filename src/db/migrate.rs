use rusqlite::{Connection, Error, OptionalExtension, Result};
use tracing::info;

/// Ensure that the `log` table exists.
fn ensure_log_table(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS log (
            id        INTEGER PRIMARY KEY AUTOINCREMENT,
            date      TEXT NOT NULL,
            operation TEXT NOT NULL,
            target    TEXT DEFAULT '',
            message   TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

pub(crate) fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' AND name=?1")?;
    let exists: Option<String> = stmt.query_row([table], |row| row.get(0)).optional()?;
    Ok(exists.is_some())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info('{table}')"))?;
    let cols = stmt.query_map([], |row| row.get::<_, String>(1))?;

    for c in cols {
        if c? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Create the scheduling tables with the current schema.
fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            id                      INTEGER PRIMARY KEY AUTOINCREMENT,
            name                    TEXT NOT NULL DEFAULT '',
            timezone                TEXT NOT NULL DEFAULT 'UTC',
            recurrence              TEXT,
            buffer_before_minutes   INTEGER NOT NULL DEFAULT 60,
            buffer_after_minutes    INTEGER NOT NULL DEFAULT 60,
            initiation_date         TEXT NOT NULL,
            termination_date        TEXT,
            auto_create             INTEGER NOT NULL DEFAULT 0,
            auto_create_hours_ahead INTEGER NOT NULL DEFAULT 48
        );

        CREATE TABLE IF NOT EXISTS session_instances (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id   INTEGER NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
            date         TEXT NOT NULL,
            start_time   TEXT,
            end_time     TEXT,
            is_active    INTEGER NOT NULL DEFAULT 0,
            is_cancelled INTEGER NOT NULL DEFAULT 0
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_instances_session_date
            ON session_instances(session_id, date);
        CREATE INDEX IF NOT EXISTS idx_instances_active
            ON session_instances(is_active);

        CREATE TABLE IF NOT EXISTS attendance (
            instance_id       INTEGER NOT NULL REFERENCES session_instances(id) ON DELETE CASCADE,
            person_id         INTEGER NOT NULL,
            attendance        TEXT NOT NULL DEFAULT 'unknown'
                              CHECK(attendance IN ('yes','maybe','no','unknown')),
            checkin_timestamp TEXT,
            PRIMARY KEY (instance_id, person_id)
        );

        CREATE INDEX IF NOT EXISTS idx_attendance_person ON attendance(person_id, attendance);

        CREATE TABLE IF NOT EXISTS person_current_location (
            person_id   INTEGER PRIMARY KEY,
            instance_id INTEGER REFERENCES session_instances(id) ON DELETE SET NULL,
            updated_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_location_instance
            ON person_current_location(instance_id);
        "#,
    )?;
    Ok(())
}

fn migration_applied(conn: &Connection, version: &str) -> Result<bool> {
    let mut chk = conn.prepare(
        "SELECT 1 FROM log
         WHERE operation = 'migration_applied' AND target = ?1
         LIMIT 1",
    )?;
    Ok(chk.query_row([version], |_| Ok(())).optional()?.is_some())
}

fn mark_applied(conn: &Connection, version: &str, message: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO log (date, operation, target, message)
         VALUES (datetime('now'), 'migration_applied', ?1, ?2)",
        [version, message],
    )?;
    Ok(())
}

/// Sessions tables created before auto-creation existed lack the flag columns.
fn migrate_add_auto_create_columns(conn: &Connection) -> Result<(), Error> {
    let version = "20240301_0002_session_auto_create";

    if migration_applied(conn, version)? {
        return Ok(());
    }

    if !table_has_column(conn, "sessions", "auto_create")? {
        conn.execute(
            "ALTER TABLE sessions ADD COLUMN auto_create INTEGER NOT NULL DEFAULT 0;",
            [],
        )?;
    }
    if !table_has_column(conn, "sessions", "auto_create_hours_ahead")? {
        conn.execute(
            "ALTER TABLE sessions ADD COLUMN auto_create_hours_ahead INTEGER NOT NULL DEFAULT 48;",
            [],
        )?;
    }

    mark_applied(conn, version, "Added auto-create flags to sessions")?;

    info!(version, "migration applied: added auto-create flags to sessions");

    Ok(())
}

/// Public entry point: run all pending migrations.
///
/// Invoked by db::initialize::init_db().
pub fn run_pending_migrations(conn: &Connection) -> Result<()> {
    ensure_log_table(conn)?;

    let fresh = !table_exists(conn, "sessions")?;

    create_schema(conn)?;

    if fresh {
        mark_applied(
            conn,
            "20240301_0002_session_auto_create",
            "Created scheduling schema",
        )?;
        info!("created scheduling schema");
    } else {
        migrate_add_auto_create_columns(conn)?;
    }

    Ok(())
}
