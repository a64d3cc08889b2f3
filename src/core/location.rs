//! Person location resolution.
//!
//! `person_current_location` is derived state and this module is its only
//! writer. A person's location is the active instance they confirmed
//! (`attendance = yes`) that started earliest; ties go to the most recent
//! check-in, then to the lowest instance id.
//!
//! All functions run on the caller's connection. Callers hold a
//! `BEGIN IMMEDIATE` unit of work (see [`crate::db::unit_of_work`]), so the
//! read of candidate instances and the write of the result happen under the
//! database write lock and cannot interleave with another resolver.

use crate::core::window::start_instant;
use crate::db::queries::{self, LocationCandidate};
use crate::errors::AppResult;
use crate::models::session::parse_timezone;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::cmp::{Ordering, Reverse};
use tracing::{debug, warn};

pub struct LocationResolver;

impl LocationResolver {
    /// Called when `instance_id` became active for a confirmed attendee.
    /// No-op unless the instance is currently active.
    pub fn assign(
        conn: &Connection,
        person_id: i64,
        instance_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Option<i64>> {
        let instance = queries::load_instance(conn, instance_id)?;
        if !instance.is_active || instance.is_cancelled {
            debug!(person_id, instance_id, "assign skipped, instance not active");
            return queries::current_location(conn, person_id);
        }
        Self::recalculate(conn, person_id, now)
    }

    /// Re-derive a person's location from the current data.
    pub fn recalculate(conn: &Connection, person_id: i64, now: DateTime<Utc>) -> AppResult<Option<i64>> {
        let selected = Self::select(conn, person_id)?;
        let current = queries::current_location(conn, person_id)?;

        if selected != current {
            queries::set_current_location(conn, person_id, selected, now)?;
            debug!(person_id, from = ?current, to = ?selected, "person location updated");
        }

        Ok(selected)
    }

    /// Pick the instance a person should be recorded at, without writing.
    pub fn select(conn: &Connection, person_id: i64) -> AppResult<Option<i64>> {
        let candidates = queries::active_confirmed_instances(conn, person_id)?;

        let mut ranked: Vec<(DateTime<Utc>, &LocationCandidate)> = Vec::new();
        for c in &candidates {
            let Some(occ) = c.instance.occurrence() else {
                warn!(person_id, instance_id = c.instance.id, "active instance without times ignored");
                continue;
            };
            let tz = match parse_timezone(&c.timezone) {
                Ok(tz) => tz,
                Err(e) => {
                    warn!(person_id, instance_id = c.instance.id, error = %e, "candidate skipped");
                    continue;
                }
            };
            ranked.push((start_instant(&occ, &tz), c));
        }

        ranked.sort_by(rank);

        Ok(ranked.first().map(|(_, c)| c.instance.id))
    }

    pub fn location_of(conn: &Connection, person_id: i64) -> AppResult<Option<i64>> {
        queries::current_location(conn, person_id)
    }

    /// Recalculate everyone at `instance_id`. Used after a deactivation.
    pub fn recalculate_occupants(
        conn: &Connection,
        instance_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<i64>> {
        let occupants = queries::persons_located_at(conn, instance_id)?;
        for person_id in &occupants {
            Self::recalculate(conn, *person_id, now)?;
        }
        Ok(occupants)
    }

    /// Re-derive every recorded location. Returns how many changed.
    pub fn sweep(conn: &Connection, now: DateTime<Utc>) -> AppResult<usize> {
        let mut changed = 0;
        for person_id in queries::located_persons(conn)? {
            let before = queries::current_location(conn, person_id)?;
            if Self::recalculate(conn, person_id, now)? != before {
                changed += 1;
            }
        }
        Ok(changed)
    }
}

/// Earliest start first, then latest check-in (missing check-ins last), then id.
fn rank(
    a: &(DateTime<Utc>, &LocationCandidate),
    b: &(DateTime<Utc>, &LocationCandidate),
) -> Ordering {
    a.0.cmp(&b.0)
        .then_with(|| Reverse(a.1.checkin_timestamp).cmp(&Reverse(b.1.checkin_timestamp)))
        .then_with(|| a.1.instance.id.cmp(&b.1.instance.id))
}
