//! Expansion of a [`RecurrenceSpec`] into concrete occurrences.
//!
//! Pure: no I/O, no state. The same spec and range always yield the same
//! sorted list.

use crate::models::recurrence::{Occurrence, RecurrenceSpec, RuleKind, ScheduleRule};
use crate::utils::date::{first_of_month, last_day_of_month, next_month, week_start};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::collections::BTreeMap;
use tracing::warn;

/// Monday 1970-01-05, the first full ISO week of the Unix epoch.
pub fn default_week_anchor() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 5).unwrap_or(NaiveDate::MIN)
}

/// Occurrences in `[from, to]` (inclusive), using the default week anchor.
pub fn occurrences(spec: &RecurrenceSpec, from: NaiveDate, to: NaiveDate) -> Vec<Occurrence> {
    occurrences_anchored(spec, from, to, default_week_anchor())
}

/// Occurrences in `[from, to]` (inclusive).
///
/// `anchor` fixes which weeks count for `every_n_weeks > 1`: a week is kept
/// when the number of whole weeks between the anchor's week and the date's
/// week is a multiple of `every_n_weeks`.
///
/// When two rules land on the same date the first rule in document order
/// wins.
pub fn occurrences_anchored(
    spec: &RecurrenceSpec,
    from: NaiveDate,
    to: NaiveDate,
    anchor: NaiveDate,
) -> Vec<Occurrence> {
    if from > to {
        return Vec::new();
    }

    let mut by_date: BTreeMap<NaiveDate, Occurrence> = BTreeMap::new();

    for rule in spec.rules() {
        for date in rule_dates(rule, from, to, anchor) {
            let occ = Occurrence {
                date,
                start_time: rule.start_time,
                end_time: rule.end_time,
            };

            match by_date.get(&date) {
                None => {
                    by_date.insert(date, occ);
                }
                Some(existing)
                    if existing.start_time != occ.start_time
                        || existing.end_time != occ.end_time =>
                {
                    warn!(
                        %date,
                        kept_start = %existing.start_time,
                        dropped_start = %occ.start_time,
                        "schedule rules disagree on times for the same date, keeping the first"
                    );
                }
                Some(_) => {}
            }
        }
    }

    by_date.into_values().collect()
}

fn rule_dates(rule: &ScheduleRule, from: NaiveDate, to: NaiveDate, anchor: NaiveDate) -> Vec<NaiveDate> {
    match &rule.kind {
        RuleKind::Weekly { every_n_weeks } => {
            weekly_dates(rule.weekday, *every_n_weeks, from, to, anchor)
        }
        RuleKind::MonthlyNthWeekday { which } => monthly_dates(rule.weekday, which, from, to),
    }
}

fn weekly_dates(
    weekday: Weekday,
    every_n_weeks: u32,
    from: NaiveDate,
    to: NaiveDate,
    anchor: NaiveDate,
) -> Vec<NaiveDate> {
    let step = i64::from(every_n_weeks.max(1));
    let anchor_week = week_start(anchor);

    let offset = (weekday.num_days_from_monday() as i64 - from.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    let mut d = from + Duration::days(offset);

    let mut out = Vec::new();
    while d <= to {
        let weeks = (week_start(d) - anchor_week).num_days().div_euclid(7);
        if weeks.rem_euclid(step) == 0 {
            out.push(d);
        }
        d += Duration::days(7);
    }
    out
}

fn monthly_dates(weekday: Weekday, which: &[i8], from: NaiveDate, to: NaiveDate) -> Vec<NaiveDate> {
    let mut out = Vec::new();
    let mut month = first_of_month(from);

    while month <= to {
        for &n in which {
            if let Some(d) = nth_weekday_of_month(month.year(), month.month(), weekday, n)
                && d >= from
                && d <= to
            {
                out.push(d);
            }
        }
        match next_month(month) {
            Some(m) => month = m,
            None => break,
        }
    }

    out.sort();
    out.dedup();
    out
}

/// The `n`-th `weekday` of a month (1-based), or the last one for `n == -1`.
pub fn nth_weekday_of_month(year: i32, month: u32, weekday: Weekday, n: i8) -> Option<NaiveDate> {
    if n == -1 {
        let last = last_day_of_month(year, month)?;
        let back = (last.weekday().num_days_from_monday() as i64
            - weekday.num_days_from_monday() as i64)
            .rem_euclid(7);
        return Some(last - Duration::days(back));
    }

    if n < 1 {
        return None;
    }

    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = (weekday.num_days_from_monday() as i64 - first.weekday().num_days_from_monday() as i64)
        .rem_euclid(7);
    let d = first + Duration::days(offset + 7 * (i64::from(n) - 1));

    (d.month() == month).then_some(d)
}
