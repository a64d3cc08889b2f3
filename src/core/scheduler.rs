//! Session activation scheduler.
//!
//! One pass walks every live recurring session in ascending id order, looks
//! at its materialized instances around "today" (in the session timezone),
//! and flips `is_active` wherever the stored flag disagrees with the
//! activation window. Each session runs in its own unit of work: a failure
//! rolls back that session only and is recorded in the pass result.
//!
//! Instances still flagged active after their session left the live set
//! (terminated, recurrence removed) are deactivated at the end of the pass.

use crate::core::clock::Clock;
use crate::core::location::LocationResolver;
use crate::core::window::should_be_active;
use crate::db::log::{instance_target, ttlog};
use crate::db::pool::DbPool;
use crate::db::queries;
use crate::db::unit_of_work::UnitOfWork;
use crate::errors::{AppError, AppResult};
use crate::models::instance::SessionInstance;
use crate::models::session::SessionDefinition;
use chrono::{DateTime, Duration, NaiveDate, TimeDelta, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

/// Bounds of the candidate window around the session-local "today".
#[derive(Debug, Clone, Copy)]
pub struct SchedulerSettings {
    pub window_days_before: i64,
    pub window_days_after: i64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            window_days_before: 1,
            window_days_after: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub session_id: i64,
    pub instance_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionError {
    pub session_id: i64,
    pub kind: String,
    pub message: String,
}

impl SessionError {
    pub fn new(session_id: i64, err: &AppError) -> Self {
        Self {
            session_id,
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PassResult {
    pub activated: Vec<Transition>,
    pub deactivated: Vec<Transition>,
    pub errors: Vec<SessionError>,
}

impl PassResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_noop(&self) -> bool {
        self.activated.is_empty() && self.deactivated.is_empty()
    }
}

#[derive(Debug, Default)]
struct SessionOutcome {
    activated: Vec<i64>,
    deactivated: Vec<i64>,
}

pub struct ActivationScheduler<'a> {
    clock: &'a dyn Clock,
    settings: SchedulerSettings,
}

impl<'a> ActivationScheduler<'a> {
    pub fn new(clock: &'a dyn Clock, settings: SchedulerSettings) -> Self {
        Self { clock, settings }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// One full reconciliation pass at the clock's current time.
    ///
    /// Only a failure to enumerate sessions is returned as `Err`; everything
    /// scoped to a single session ends up in `PassResult::errors`.
    pub fn run_pass(&self, pool: &mut DbPool) -> AppResult<PassResult> {
        let now = self.clock.now();
        let mut result = PassResult::default();

        // One day of slack: a session's local date may lag the UTC date.
        let cutoff = now.date_naive() - Duration::days(1);
        let sessions = queries::load_recurring_sessions(&pool.conn, cutoff)?;

        info!(%now, sessions = sessions.len(), "activation pass started");

        for session in &sessions {
            let outcome = pool
                .unit_of_work()
                .run(|conn| reconcile_session(conn, session, now, &self.settings));

            match outcome {
                Ok(o) => {
                    result.activated.extend(o.activated.into_iter().map(|instance_id| Transition {
                        session_id: session.id,
                        instance_id,
                    }));
                    result.deactivated.extend(o.deactivated.into_iter().map(|instance_id| {
                        Transition {
                            session_id: session.id,
                            instance_id,
                        }
                    }));
                }
                Err(e) => {
                    error!(session_id = session.id, kind = e.kind(), error = %e, "session skipped");
                    result.errors.push(SessionError::new(session.id, &e));
                }
            }
        }

        // Active instances of sessions outside the live set.
        let covered: BTreeSet<i64> = sessions.iter().map(|s| s.id).collect();
        let orphaned: BTreeSet<i64> = queries::load_active_instances(&pool.conn, None)?
            .into_iter()
            .map(|i| i.session_id)
            .filter(|id| !covered.contains(id))
            .collect();

        for session_id in orphaned {
            match pool
                .unit_of_work()
                .run(|conn| retire_orphans(conn, session_id, now))
            {
                Ok(ids) => result.deactivated.extend(ids.into_iter().map(|instance_id| {
                    Transition {
                        session_id,
                        instance_id,
                    }
                })),
                Err(e) => {
                    error!(session_id, kind = e.kind(), error = %e, "orphaned instances kept");
                    result.errors.push(SessionError::new(session_id, &e));
                }
            }
        }

        info!(
            activated = result.activated.len(),
            deactivated = result.deactivated.len(),
            errors = result.errors.len(),
            "activation pass finished"
        );

        Ok(result)
    }

    /// Mark an instance active and place its confirmed attendees.
    /// Returns `false` when it was already active.
    pub fn activate_instance(
        &self,
        work: UnitOfWork<'_>,
        session_id: i64,
        instance_id: i64,
    ) -> AppResult<bool> {
        let now = self.clock.now();
        work.run(|conn| {
            let instance = load_owned_instance(conn, session_id, instance_id)?;
            if instance.is_cancelled {
                return Err(AppError::Consistency(format!(
                    "instance {instance_id} is cancelled"
                )));
            }
            instance.require_occurrence()?;
            activate(conn, &instance, now)
        })
    }

    /// Mark an instance inactive and re-place everyone who was there.
    /// Returns `false` when it was already inactive.
    pub fn deactivate_instance(
        &self,
        work: UnitOfWork<'_>,
        session_id: i64,
        instance_id: i64,
    ) -> AppResult<bool> {
        let now = self.clock.now();
        work.run(|conn| {
            let instance = load_owned_instance(conn, session_id, instance_id)?;
            deactivate(conn, &instance, now)
        })
    }

    /// Bring a single instance up to date right now, e.g. during a check-in.
    ///
    /// Returns whether the instance is active afterwards. Never fails:
    /// errors are logged and reported as `false`.
    pub fn ensure_instance_activation_current(&self, work: UnitOfWork<'_>, instance_id: i64) -> bool {
        let now = self.clock.now();
        match work.run(|conn| refresh_instance(conn, instance_id, now)) {
            Ok(active) => active,
            Err(e) => {
                warn!(instance_id, kind = e.kind(), error = %e, "activation check failed");
                false
            }
        }
    }
}

fn load_owned_instance(
    conn: &Connection,
    session_id: i64,
    instance_id: i64,
) -> AppResult<SessionInstance> {
    let instance = queries::load_instance(conn, instance_id)?;
    if instance.session_id != session_id {
        return Err(AppError::NotFound(format!(
            "instance {instance_id} in session {session_id}"
        )));
    }
    Ok(instance)
}

fn desired_state(
    session: &SessionDefinition,
    instance: &SessionInstance,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    if instance.is_cancelled {
        return Ok(false);
    }
    let Some(occ) = instance.occurrence() else {
        return Ok(false);
    };
    let tz = session.tz()?;
    should_be_active(
        &occ,
        &tz,
        session.buffer_before_minutes,
        session.buffer_after_minutes,
        now,
    )
}

fn reconcile_session(
    conn: &Connection,
    session: &SessionDefinition,
    now: DateTime<Utc>,
    settings: &SchedulerSettings,
) -> AppResult<SessionOutcome> {
    let tz = session.tz()?;
    // A malformed recurrence document fails the session even though the
    // instances are already materialized.
    session.recurrence_spec()?;

    let local_today = now.with_timezone(&tz).date_naive();
    let from = shift_days(local_today, -settings.window_days_before)?;
    let to = shift_days(local_today, settings.window_days_after)?;

    // Instances left active outside the window (scheduler downtime, edited
    // dates) are reconciled too, so nobody stays pinned to them.
    let mut candidates = queries::load_instances_in_range(conn, session.id, from, to)?;
    for stale in queries::load_active_instances(conn, Some(session.id))? {
        if !candidates.iter().any(|c| c.id == stale.id) {
            candidates.push(stale);
        }
    }

    let mut outcome = SessionOutcome::default();

    for instance in candidates {
        if instance.occurrence().is_none() && !instance.is_cancelled {
            debug!(
                session_id = session.id,
                instance_id = instance.id,
                "instance has no times yet"
            );
        }

        let desired = desired_state(session, &instance, now)?;

        if desired && !instance.is_active {
            if activate(conn, &instance, now)? {
                outcome.activated.push(instance.id);
            }
        } else if !desired && instance.is_active && deactivate(conn, &instance, now)? {
            outcome.deactivated.push(instance.id);
        }
    }

    Ok(outcome)
}

fn shift_days(date: NaiveDate, days: i64) -> AppResult<NaiveDate> {
    TimeDelta::try_days(days)
        .and_then(|delta| date.checked_add_signed(delta))
        .ok_or_else(|| {
            AppError::Configuration(format!("candidate window of {days} days is out of range"))
        })
}

/// Deactivate instances still flagged active whose session the pass no
/// longer covers (terminated, or recurrence removed).
fn retire_orphans(
    conn: &Connection,
    session_id: i64,
    now: DateTime<Utc>,
) -> AppResult<Vec<i64>> {
    let mut retired = Vec::new();
    for instance in queries::load_active_instances(conn, Some(session_id))? {
        if deactivate(conn, &instance, now)? {
            retired.push(instance.id);
        }
    }
    Ok(retired)
}

fn refresh_instance(conn: &Connection, instance_id: i64, now: DateTime<Utc>) -> AppResult<bool> {
    let instance = queries::load_instance(conn, instance_id)?;
    let session = queries::load_session(conn, instance.session_id)?;

    let desired = desired_state(&session, &instance, now)?;

    if desired && !instance.is_active {
        activate(conn, &instance, now)?;
    } else if !desired && instance.is_active {
        deactivate(conn, &instance, now)?;
    }

    Ok(desired)
}

fn activate(conn: &Connection, instance: &SessionInstance, now: DateTime<Utc>) -> AppResult<bool> {
    if !queries::set_instance_active(conn, instance.id, true)? {
        return Ok(false);
    }

    let attendees = queries::confirmed_attendees(conn, instance.id)?;
    for person_id in &attendees {
        LocationResolver::assign(conn, *person_id, instance.id, now)?;
    }

    ttlog(
        conn,
        "activate",
        &instance_target(instance.session_id, instance.id),
        &format!("{} attendee(s) placed", attendees.len()),
    )?;
    info!(
        session_id = instance.session_id,
        instance_id = instance.id,
        date = %instance.date,
        attendees = attendees.len(),
        "instance activated"
    );

    Ok(true)
}

fn deactivate(conn: &Connection, instance: &SessionInstance, now: DateTime<Utc>) -> AppResult<bool> {
    // Same connection and transaction as the recalculation below, so the
    // recalculation already sees this instance as inactive.
    if !queries::set_instance_active(conn, instance.id, false)? {
        return Ok(false);
    }

    let occupants = LocationResolver::recalculate_occupants(conn, instance.id, now)?;

    ttlog(
        conn,
        "deactivate",
        &instance_target(instance.session_id, instance.id),
        &format!("{} occupant(s) relocated", occupants.len()),
    )?;
    info!(
        session_id = instance.session_id,
        instance_id = instance.id,
        date = %instance.date,
        occupants = occupants.len(),
        "instance deactivated"
    );

    Ok(true)
}
