//! Materialization of upcoming instances.
//!
//! Occurrences are computed from the session's recurrence and inserted
//! unless the `(session_id, date)` pair already exists. The unique index on
//! that pair backs the check, so concurrent or repeated runs never
//! duplicate a row.

use crate::core::recurrence::occurrences_anchored;
use crate::core::scheduler::SessionError;
use crate::db::pool::DbPool;
use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::models::session::SessionDefinition;
use chrono::{DateTime, Duration, NaiveDate, TimeDelta, Utc};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{error, info};

/// How far ahead to materialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Horizon {
    /// Session-local today through today + n calendar days.
    Days(i64),
    /// From now through now + n hours, by session-local date.
    Hours(i64),
}

impl Default for Horizon {
    fn default() -> Self {
        Horizon::Days(7)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Session(i64),
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CreatedInstance {
    pub session_id: i64,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AutoCreateReport {
    pub created_count: usize,
    pub created: Vec<CreatedInstance>,
    pub errors: Vec<SessionError>,
}

impl AutoCreateReport {
    fn record(&mut self, session_id: i64, outcome: AppResult<Vec<NaiveDate>>) {
        match outcome {
            Ok(dates) => {
                self.created_count += dates.len();
                self.created
                    .extend(dates.into_iter().map(|date| CreatedInstance { session_id, date }));
            }
            Err(e) => {
                error!(session_id, kind = e.kind(), error = %e, "auto-create skipped session");
                self.errors.push(SessionError::new(session_id, &e));
            }
        }
    }

    pub fn created_dates(&self) -> Vec<NaiveDate> {
        self.created.iter().map(|c| c.date).collect()
    }
}

/// Local date range covered by `horizon`, clipped to the session's lifetime.
pub fn horizon_range(
    session: &SessionDefinition,
    horizon: Horizon,
    now: DateTime<Utc>,
) -> AppResult<Option<(NaiveDate, NaiveDate)>> {
    let tz = session.tz()?;
    let local_now = now.with_timezone(&tz);

    let today = local_now.date_naive();
    let to = match horizon {
        Horizon::Days(n) => TimeDelta::try_days(n.max(0)).and_then(|d| today.checked_add_signed(d)),
        Horizon::Hours(h) => TimeDelta::try_hours(h.max(0))
            .and_then(|d| local_now.checked_add_signed(d))
            .map(|end| end.date_naive()),
    }
    .ok_or_else(|| AppError::Configuration(format!("horizon {horizon:?} is out of range")))?;
    let from = today;

    let from = from.max(session.initiation_date);
    let to = match session.termination_date {
        Some(t) => to.min(t),
        None => to,
    };

    Ok((from <= to).then_some((from, to)))
}

/// Create the missing instances of one session. Returns the dates created.
pub fn ensure_materialized(
    conn: &Connection,
    session: &SessionDefinition,
    horizon: Horizon,
    now: DateTime<Utc>,
) -> AppResult<Vec<NaiveDate>> {
    let spec = session.recurrence_spec()?.ok_or_else(|| {
        AppError::Configuration(format!("session {} has no recurrence", session.id))
    })?;

    let Some((from, to)) = horizon_range(session, horizon, now)? else {
        return Ok(Vec::new());
    };

    let existing = queries::instance_dates(conn, session.id, from, to)?;

    let mut created = Vec::new();
    for occ in occurrences_anchored(&spec, from, to, session.initiation_date) {
        if existing.contains(&occ.date) {
            continue;
        }
        if queries::insert_instance(conn, session.id, &occ)? {
            created.push(occ.date);
        }
    }

    if !created.is_empty() {
        info!(
            session_id = session.id,
            created = created.len(),
            %from,
            %to,
            "instances materialized"
        );
    }

    Ok(created)
}

/// Materialize upcoming instances for one session or for every live
/// recurring session. Each session is its own unit of work.
pub fn auto_create_upcoming(
    pool: &mut DbPool,
    target: Target,
    horizon: Horizon,
    now: DateTime<Utc>,
) -> AppResult<AutoCreateReport> {
    let mut report = AutoCreateReport::default();

    match target {
        Target::Session(session_id) => {
            let outcome = pool.unit_of_work().run(|conn| {
                let session = queries::load_session(conn, session_id)?;
                ensure_materialized(conn, &session, horizon, now)
            });
            report.record(session_id, outcome);
        }
        Target::All => {
            let sessions = live_sessions(pool, now)?;
            for session in &sessions {
                let outcome = pool
                    .unit_of_work()
                    .run(|conn| ensure_materialized(conn, session, horizon, now));
                report.record(session.id, outcome);
            }
        }
    }

    Ok(report)
}

/// Periodic-job variant: sessions flagged for auto-creation, each with its
/// own hours-ahead horizon.
pub fn auto_create_flagged(pool: &mut DbPool, now: DateTime<Utc>) -> AppResult<AutoCreateReport> {
    let mut report = AutoCreateReport::default();

    let sessions = live_sessions(pool, now)?;
    for session in sessions.iter().filter(|s| s.auto_create) {
        let horizon = Horizon::Hours(session.auto_create_hours_ahead);
        let outcome = pool
            .unit_of_work()
            .run(|conn| ensure_materialized(conn, session, horizon, now));
        report.record(session.id, outcome);
    }

    Ok(report)
}

fn live_sessions(pool: &DbPool, now: DateTime<Utc>) -> AppResult<Vec<SessionDefinition>> {
    queries::load_recurring_sessions(&pool.conn, now.date_naive() - Duration::days(1))
}
