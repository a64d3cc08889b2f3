use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Attendance {
    Yes,
    Maybe,
    No,
    Unknown,
}

impl Attendance {
    /// Convert enum → DB string
    pub fn to_db_str(&self) -> &'static str {
        match self {
            Attendance::Yes => "yes",
            Attendance::Maybe => "maybe",
            Attendance::No => "no",
            Attendance::Unknown => "unknown",
        }
    }

    /// Convert DB string → enum
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "yes" => Some(Attendance::Yes),
            "maybe" => Some(Attendance::Maybe),
            "no" => Some(Attendance::No),
            "unknown" => Some(Attendance::Unknown),
            _ => None,
        }
    }

    /// Helper: convert CLI input (any case)
    pub fn from_code(code: &str) -> Option<Self> {
        Attendance::from_db_str(&code.trim().to_lowercase())
    }
}

/// A person's attendance on one instance, owned by the check-in workflow.
#[derive(Debug, Clone, Serialize)]
pub struct AttendanceMark {
    pub instance_id: i64,
    pub person_id: i64,
    pub attendance: Attendance,
    pub checkin_timestamp: Option<DateTime<Utc>>,
}
