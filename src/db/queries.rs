//! Storage collaborator: row mapping and the reads/writes the scheduler needs.
//!
//! Every function takes a plain `&Connection`, so it runs inside whatever
//! unit of work the caller opened.

use crate::errors::{AppError, AppResult};
use crate::models::attendance::AttendanceMark;
use crate::models::instance::SessionInstance;
use crate::models::recurrence::Occurrence;
use crate::models::session::SessionDefinition;
use crate::utils::date::{format_date, parse_instant};
use crate::utils::time::{format_time, parse_wall_clock};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::{Connection, OptionalExtension, Result, Row, params};
use std::collections::HashSet;

/// Conversion failure pointing at the column that held the bad text.
fn conversion_error(row: &Row, col: &str, err: AppError) -> rusqlite::Error {
    match row.as_ref().column_index(col) {
        Ok(idx) => {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
        }
        Err(e) => e,
    }
}

fn get_date(row: &Row, col: &str) -> Result<NaiveDate> {
    let raw: String = row.get(col)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|_| conversion_error(row, col, AppError::InvalidDate(raw.clone())))
}

fn get_optional_date(row: &Row, col: &str) -> Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(col)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| conversion_error(row, col, AppError::InvalidDate(s.to_string()))),
    }
}

fn get_optional_time(row: &Row, col: &str) -> Result<Option<NaiveTime>> {
    let raw: Option<String> = row.get(col)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_wall_clock(s)
            .map(Some)
            .ok_or_else(|| conversion_error(row, col, AppError::InvalidTime(s.to_string()))),
    }
}

fn get_optional_instant(row: &Row, col: &str) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(col)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_instant(s)
            .map(Some)
            .ok_or_else(|| conversion_error(row, col, AppError::InvalidDate(s.to_string()))),
    }
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

const SESSION_COLUMNS: &str = "id, name, timezone, recurrence, buffer_before_minutes, \
     buffer_after_minutes, initiation_date, termination_date, auto_create, auto_create_hours_ahead";

pub fn map_session(row: &Row) -> Result<SessionDefinition> {
    Ok(SessionDefinition {
        id: row.get("id")?,
        name: row.get("name")?,
        timezone: row.get("timezone")?,
        recurrence: row
            .get::<_, Option<String>>("recurrence")?
            .filter(|r| !r.trim().is_empty()),
        buffer_before_minutes: row.get("buffer_before_minutes")?,
        buffer_after_minutes: row.get("buffer_after_minutes")?,
        initiation_date: get_date(row, "initiation_date")?,
        termination_date: get_optional_date(row, "termination_date")?,
        auto_create: row.get::<_, i64>("auto_create")? == 1,
        auto_create_hours_ahead: row.get("auto_create_hours_ahead")?,
    })
}

pub fn load_session(conn: &Connection, session_id: i64) -> AppResult<SessionDefinition> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
    conn.query_row(&sql, [session_id], map_session)
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("session {session_id}")))
}

/// Recurring sessions not terminated before `cutoff`, ascending id.
pub fn load_recurring_sessions(
    conn: &Connection,
    cutoff: NaiveDate,
) -> AppResult<Vec<SessionDefinition>> {
    let sql = format!(
        "SELECT {SESSION_COLUMNS} FROM sessions
         WHERE recurrence IS NOT NULL AND TRIM(recurrence) <> ''
           AND (termination_date IS NULL OR termination_date = '' OR termination_date >= ?1)
         ORDER BY id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([format_date(cutoff)], map_session)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Seeding entry point for the admin workflow and tests. `session.id` is ignored.
pub fn insert_session(conn: &Connection, session: &SessionDefinition) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO sessions (name, timezone, recurrence, buffer_before_minutes,
             buffer_after_minutes, initiation_date, termination_date, auto_create,
             auto_create_hours_ahead)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            session.name,
            session.timezone,
            session.recurrence,
            session.buffer_before_minutes,
            session.buffer_after_minutes,
            format_date(session.initiation_date),
            session.termination_date.map(format_date),
            if session.auto_create { 1 } else { 0 },
            session.auto_create_hours_ahead,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

// ---------------------------------------------------------------------------
// Instances
// ---------------------------------------------------------------------------

const INSTANCE_COLUMNS: &str =
    "id, session_id, date, start_time, end_time, is_active, is_cancelled";

pub fn map_instance(row: &Row) -> Result<SessionInstance> {
    Ok(SessionInstance {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        date: get_date(row, "date")?,
        start_time: get_optional_time(row, "start_time")?,
        end_time: get_optional_time(row, "end_time")?,
        is_active: row.get::<_, i64>("is_active")? == 1,
        is_cancelled: row.get::<_, i64>("is_cancelled")? == 1,
    })
}

pub fn load_instance(conn: &Connection, instance_id: i64) -> AppResult<SessionInstance> {
    let sql = format!("SELECT {INSTANCE_COLUMNS} FROM session_instances WHERE id = ?1");
    conn.query_row(&sql, [instance_id], map_instance)
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("instance {instance_id}")))
}

/// All instances of a session dated within `[from, to]`, cancelled ones included.
pub fn load_instances_in_range(
    conn: &Connection,
    session_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<Vec<SessionInstance>> {
    let sql = format!(
        "SELECT {INSTANCE_COLUMNS} FROM session_instances
         WHERE session_id = ?1 AND date >= ?2 AND date <= ?3
         ORDER BY date ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![session_id, format_date(from), format_date(to)],
        map_instance,
    )?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Instances stored as active, whatever their date. `None` covers every session.
pub fn load_active_instances(
    conn: &Connection,
    session_id: Option<i64>,
) -> AppResult<Vec<SessionInstance>> {
    let sql = format!(
        "SELECT {INSTANCE_COLUMNS} FROM session_instances
         WHERE is_active = 1 AND (?1 IS NULL OR session_id = ?1)
         ORDER BY session_id ASC, date ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([session_id], map_instance)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn load_instances_by_date(conn: &Connection, date: NaiveDate) -> AppResult<Vec<SessionInstance>> {
    let sql = format!(
        "SELECT {INSTANCE_COLUMNS} FROM session_instances
         WHERE date = ?1
         ORDER BY session_id ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([format_date(date)], map_instance)?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

pub fn instance_dates(
    conn: &Connection,
    session_id: i64,
    from: NaiveDate,
    to: NaiveDate,
) -> AppResult<HashSet<NaiveDate>> {
    Ok(load_instances_in_range(conn, session_id, from, to)?
        .into_iter()
        .map(|i| i.date)
        .collect())
}

/// Insert an instance for an occurrence. Returns `false` when the
/// `(session_id, date)` pair already exists.
pub fn insert_instance(conn: &Connection, session_id: i64, occ: &Occurrence) -> AppResult<bool> {
    let changed = conn.execute(
        "INSERT OR IGNORE INTO session_instances (session_id, date, start_time, end_time)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            session_id,
            format_date(occ.date),
            format_time(occ.start_time),
            format_time(occ.end_time),
        ],
    )?;
    Ok(changed > 0)
}

/// Insert an instance whose times may still be unknown.
pub fn insert_unscheduled_instance(
    conn: &Connection,
    session_id: i64,
    date: NaiveDate,
) -> AppResult<i64> {
    conn.execute(
        "INSERT INTO session_instances (session_id, date) VALUES (?1, ?2)",
        params![session_id, format_date(date)],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn instance_id_for_date(
    conn: &Connection,
    session_id: i64,
    date: NaiveDate,
) -> AppResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT id FROM session_instances WHERE session_id = ?1 AND date = ?2",
            params![session_id, format_date(date)],
            |row| row.get(0),
        )
        .optional()?)
}

/// Returns `true` when the stored flag actually changed.
pub fn set_instance_active(conn: &Connection, instance_id: i64, active: bool) -> AppResult<bool> {
    let changed = conn.execute(
        "UPDATE session_instances SET is_active = ?1 WHERE id = ?2 AND is_active <> ?1",
        params![if active { 1 } else { 0 }, instance_id],
    )?;
    Ok(changed > 0)
}

/// Cancellation workflow hook.
pub fn set_instance_cancelled(
    conn: &Connection,
    instance_id: i64,
    cancelled: bool,
) -> AppResult<()> {
    let changed = conn.execute(
        "UPDATE session_instances SET is_cancelled = ?1 WHERE id = ?2",
        params![if cancelled { 1 } else { 0 }, instance_id],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound(format!("instance {instance_id}")));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Attendance
// ---------------------------------------------------------------------------

pub fn upsert_attendance(conn: &Connection, mark: &AttendanceMark) -> AppResult<()> {
    conn.execute(
        "INSERT INTO attendance (instance_id, person_id, attendance, checkin_timestamp)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(instance_id, person_id) DO UPDATE SET
             attendance = excluded.attendance,
             checkin_timestamp = excluded.checkin_timestamp",
        params![
            mark.instance_id,
            mark.person_id,
            mark.attendance.to_db_str(),
            mark.checkin_timestamp.map(|t| t.to_rfc3339()),
        ],
    )?;
    Ok(())
}

/// People marked `yes` on an instance, ascending id.
pub fn confirmed_attendees(conn: &Connection, instance_id: i64) -> AppResult<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT person_id FROM attendance
         WHERE instance_id = ?1 AND attendance = 'yes'
         ORDER BY person_id ASC",
    )?;
    let rows = stmt.query_map([instance_id], |row| row.get(0))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// An active instance a person confirmed, joined with its session's
/// timezone so the resolver can order by absolute start.
#[derive(Debug, Clone)]
pub struct LocationCandidate {
    pub instance: SessionInstance,
    pub timezone: String,
    pub checkin_timestamp: Option<DateTime<Utc>>,
}

pub fn active_confirmed_instances(
    conn: &Connection,
    person_id: i64,
) -> AppResult<Vec<LocationCandidate>> {
    let mut stmt = conn.prepare(
        "SELECT i.id, i.session_id, i.date, i.start_time, i.end_time, i.is_active,
                i.is_cancelled, s.timezone, a.checkin_timestamp
         FROM attendance a
         JOIN session_instances i ON i.id = a.instance_id
         JOIN sessions s ON s.id = i.session_id
         WHERE a.person_id = ?1
           AND a.attendance = 'yes'
           AND i.is_active = 1
           AND i.is_cancelled = 0
         ORDER BY i.id ASC",
    )?;
    let rows = stmt.query_map([person_id], |row| {
        Ok(LocationCandidate {
            instance: map_instance(row)?,
            timezone: row.get("timezone")?,
            checkin_timestamp: get_optional_instant(row, "checkin_timestamp")?,
        })
    })?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Person current location
// ---------------------------------------------------------------------------

pub fn current_location(conn: &Connection, person_id: i64) -> AppResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT instance_id FROM person_current_location WHERE person_id = ?1",
            [person_id],
            |row| row.get::<_, Option<i64>>(0),
        )
        .optional()?
        .flatten())
}

pub fn set_current_location(
    conn: &Connection,
    person_id: i64,
    instance_id: Option<i64>,
    now: DateTime<Utc>,
) -> AppResult<()> {
    conn.execute(
        "INSERT INTO person_current_location (person_id, instance_id, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(person_id) DO UPDATE SET
             instance_id = excluded.instance_id,
             updated_at = excluded.updated_at",
        params![person_id, instance_id, now.to_rfc3339()],
    )?;
    Ok(())
}

/// People whose recorded location is `instance_id`.
pub fn persons_located_at(conn: &Connection, instance_id: i64) -> AppResult<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT person_id FROM person_current_location
         WHERE instance_id = ?1
         ORDER BY person_id ASC",
    )?;
    let rows = stmt.query_map([instance_id], |row| row.get(0))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}

/// Every person with a non-null location.
pub fn located_persons(conn: &Connection) -> AppResult<Vec<i64>> {
    let mut stmt = conn.prepare(
        "SELECT person_id FROM person_current_location
         WHERE instance_id IS NOT NULL
         ORDER BY person_id ASC",
    )?;
    let rows = stmt.query_map([], |row| row.get(0))?;

    let mut out = Vec::new();
    for r in rows {
        out.push(r?);
    }
    Ok(out)
}
