use crate::errors::{AppError, AppResult};
use crate::models::recurrence::RecurrenceSpec;
use chrono::NaiveDate;
use chrono_tz::Tz;
use serde::Serialize;

/// A session definition as maintained by the admin workflow.
/// Read-only to the scheduler.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDefinition {
    pub id: i64,
    pub name: String,
    pub timezone: String,           // ⇔ sessions.timezone (IANA name)
    pub recurrence: Option<String>, // ⇔ sessions.recurrence (JSON, NULL = one-off)
    pub buffer_before_minutes: i64,
    pub buffer_after_minutes: i64,
    pub initiation_date: NaiveDate,
    pub termination_date: Option<NaiveDate>,
    pub auto_create: bool,
    pub auto_create_hours_ahead: i64,
}

impl SessionDefinition {
    /// Resolve the IANA timezone name.
    pub fn tz(&self) -> AppResult<Tz> {
        parse_timezone(&self.timezone)
    }

    /// Parse the stored recurrence document, if any.
    pub fn recurrence_spec(&self) -> AppResult<Option<RecurrenceSpec>> {
        self.recurrence
            .as_deref()
            .map(RecurrenceSpec::parse)
            .transpose()
    }
}

pub fn parse_timezone(name: &str) -> AppResult<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| AppError::Configuration(format!("unknown timezone '{name}'")))
}
