use crate::errors::{AppError, AppResult};
use crate::models::recurrence::Occurrence;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;

/// One dated occurrence of a session, as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInstance {
    pub id: i64,
    pub session_id: i64,
    pub date: NaiveDate,                // ⇔ session_instances.date (TEXT "YYYY-MM-DD")
    pub start_time: Option<NaiveTime>,  // ⇔ session_instances.start_time (TEXT "HH:MM", NULL until scheduled)
    pub end_time: Option<NaiveTime>,    // ⇔ session_instances.end_time
    pub is_active: bool,
    pub is_cancelled: bool,
}

impl SessionInstance {
    /// The wall-clock span of this instance, when both times are known.
    pub fn occurrence(&self) -> Option<Occurrence> {
        match (self.start_time, self.end_time) {
            (Some(start_time), Some(end_time)) => Some(Occurrence {
                date: self.date,
                start_time,
                end_time,
            }),
            _ => None,
        }
    }

    pub fn require_occurrence(&self) -> AppResult<Occurrence> {
        self.occurrence().ok_or_else(|| {
            AppError::Consistency(format!(
                "instance {} ({}) has no start/end time",
                self.id, self.date
            ))
        })
    }
}
