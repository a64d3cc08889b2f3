//! Recurrence rules attached to a recurring session.
//!
//! The stored form is a JSON document:
//! `{ "schedules": [{ "type", "weekday", "start_time", "end_time", "every_n_weeks"?, "which"? }] }`.
//! It is parsed once into a [`RecurrenceSpec`]; every validation problem is
//! reported as [`AppError::Configuration`] at parse time, never on first use.

use crate::errors::{AppError, AppResult};
use crate::utils::time::parse_wall_clock;
use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Kind of a single schedule rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleKind {
    /// Every `every_n_weeks`-th week on the rule's weekday.
    Weekly { every_n_weeks: u32 },
    /// The listed ordinals (1..=4, or -1 for "last") of the weekday in each month.
    MonthlyNthWeekday { which: Vec<i8> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRule {
    pub kind: RuleKind,
    pub weekday: Weekday,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Ordered set of schedule rules. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecurrenceSpec {
    rules: Vec<ScheduleRule>,
}

/// A concrete date and wall-clock span implied by a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Occurrence {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

// ---------------------------------------------------------------------------
// Raw document shape
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    schedules: Vec<RawSchedule>,
}

#[derive(Debug, Deserialize)]
struct RawSchedule {
    #[serde(rename = "type")]
    kind: String,
    weekday: String,
    start_time: String,
    end_time: String,
    #[serde(default)]
    every_n_weeks: Option<i64>,
    #[serde(default)]
    which: Option<OneOrMany>,
}

/// Older documents store `which` as a bare integer.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(i64),
    Many(Vec<i64>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<i64> {
        match self {
            OneOrMany::One(v) => vec![v],
            OneOrMany::Many(v) => v,
        }
    }
}

impl RecurrenceSpec {
    pub fn new(rules: Vec<ScheduleRule>) -> AppResult<Self> {
        if rules.is_empty() {
            return Err(AppError::Configuration(
                "recurrence has no schedules".to_string(),
            ));
        }
        Ok(Self { rules })
    }

    /// Parse and validate a recurrence JSON document.
    pub fn parse(json: &str) -> AppResult<Self> {
        let doc: RawDocument = serde_json::from_str(json)
            .map_err(|e| AppError::Configuration(format!("malformed recurrence document: {e}")))?;

        let rules = doc
            .schedules
            .into_iter()
            .enumerate()
            .map(|(idx, raw)| parse_rule(raw).map_err(|e| prefix_rule(idx, e)))
            .collect::<AppResult<Vec<_>>>()?;

        Self::new(rules)
    }

    pub fn rules(&self) -> &[ScheduleRule] {
        &self.rules
    }
}

fn prefix_rule(idx: usize, err: AppError) -> AppError {
    match err {
        AppError::Configuration(msg) => AppError::Configuration(format!("schedule #{idx}: {msg}")),
        other => other,
    }
}

fn parse_rule(raw: RawSchedule) -> AppResult<ScheduleRule> {
    let weekday = parse_weekday(&raw.weekday)?;

    let start_time = parse_wall_clock(&raw.start_time).ok_or_else(|| {
        AppError::Configuration(format!("invalid start_time '{}'", raw.start_time))
    })?;
    let end_time = parse_wall_clock(&raw.end_time)
        .ok_or_else(|| AppError::Configuration(format!("invalid end_time '{}'", raw.end_time)))?;

    let kind = match raw.kind.trim().to_lowercase().as_str() {
        "weekly" => {
            let n = raw.every_n_weeks.unwrap_or(1);
            if !(1..=52).contains(&n) {
                return Err(AppError::Configuration(format!(
                    "every_n_weeks must be between 1 and 52, got {n}"
                )));
            }
            RuleKind::Weekly {
                every_n_weeks: n as u32,
            }
        }
        "monthly_nth_weekday" => {
            let which = raw
                .which
                .map(OneOrMany::into_vec)
                .filter(|w| !w.is_empty())
                .ok_or_else(|| {
                    AppError::Configuration("monthly_nth_weekday requires 'which'".to_string())
                })?;

            let mut ordinals = Vec::with_capacity(which.len());
            for w in which {
                if !matches!(w, -1 | 1..=4) {
                    return Err(AppError::Configuration(format!(
                        "'which' must be 1..4 or -1, got {w}"
                    )));
                }
                if !ordinals.contains(&(w as i8)) {
                    ordinals.push(w as i8);
                }
            }
            RuleKind::MonthlyNthWeekday { which: ordinals }
        }
        other => {
            return Err(AppError::Configuration(format!(
                "unknown schedule type '{other}'"
            )));
        }
    };

    Ok(ScheduleRule {
        kind,
        weekday,
        start_time,
        end_time,
    })
}

/// Accepts full or three-letter English names, any case.
pub fn parse_weekday(s: &str) -> AppResult<Weekday> {
    s.trim()
        .parse::<Weekday>()
        .map_err(|_| AppError::Configuration(format!("invalid weekday '{s}'")))
}
