//! Activation window arithmetic.
//!
//! An occurrence is active while `now + LOOKAHEAD_SECONDS` lies in
//! `[start - buffer_before, end + buffer_after]`, both ends inclusive, with
//! start and end interpreted as wall-clock times in the session timezone.

use crate::errors::{AppError, AppResult};
use crate::models::recurrence::Occurrence;
use chrono::{DateTime, Duration, NaiveDateTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;

/// Fixed offset added to "now" so that a pass firing one polling tick
/// early still activates a session at its exact scheduled minute.
pub const LOOKAHEAD_SECONDS: i64 = 60;

/// Resolve a local wall-clock time in `tz`.
///
/// Ambiguous times (clocks going back) take the earlier instant. Times in a
/// spring-forward gap are moved forward by one hour.
pub fn localize(tz: &Tz, naive: NaiveDateTime) -> DateTime<Utc> {
    if let Some(dt) = tz.from_local_datetime(&naive).earliest() {
        return dt.with_timezone(&Utc);
    }
    naive
        .checked_add_signed(Duration::hours(1))
        .and_then(|shifted| tz.from_local_datetime(&shifted).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| tz.from_utc_datetime(&naive).with_timezone(&Utc))
}

/// Absolute start of an occurrence.
pub fn start_instant(occ: &Occurrence, tz: &Tz) -> DateTime<Utc> {
    localize(tz, occ.date.and_time(occ.start_time))
}

/// Absolute `[start, end]` of an occurrence.
///
/// An end time earlier than the start time (e.g. 21:00–00:00) belongs to the
/// following calendar day.
pub fn occurrence_span(occ: &Occurrence, tz: &Tz) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = start_instant(occ, tz);

    let end_date = if occ.end_time < occ.start_time {
        occ.date.succ_opt().unwrap_or(occ.date)
    } else {
        occ.date
    };
    let end = localize(tz, end_date.and_time(occ.end_time));

    (start, end)
}

fn buffer(minutes: i64) -> AppResult<TimeDelta> {
    TimeDelta::try_minutes(minutes)
        .ok_or_else(|| AppError::Configuration(format!("buffer of {minutes} minutes is out of range")))
}

/// Buffered activation window of an occurrence.
///
/// Buffers that push the window outside chrono's representable range are a
/// configuration error of the session.
pub fn activation_window(
    occ: &Occurrence,
    tz: &Tz,
    buffer_before_minutes: i64,
    buffer_after_minutes: i64,
) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
    let (start, end) = occurrence_span(occ, tz);

    let open = start
        .checked_sub_signed(buffer(buffer_before_minutes)?)
        .ok_or_else(|| {
            AppError::Configuration(format!(
                "buffer_before_minutes {buffer_before_minutes} overflows the window of {}",
                occ.date
            ))
        })?;
    let close = end
        .checked_add_signed(buffer(buffer_after_minutes)?)
        .ok_or_else(|| {
            AppError::Configuration(format!(
                "buffer_after_minutes {buffer_after_minutes} overflows the window of {}",
                occ.date
            ))
        })?;

    Ok((open, close))
}

pub fn should_be_active(
    occ: &Occurrence,
    tz: &Tz,
    buffer_before_minutes: i64,
    buffer_after_minutes: i64,
    now: DateTime<Utc>,
) -> AppResult<bool> {
    let (open, close) = activation_window(occ, tz, buffer_before_minutes, buffer_after_minutes)?;
    let probe = now
        .checked_add_signed(Duration::seconds(LOOKAHEAD_SECONDS))
        .unwrap_or(now);
    Ok(open <= probe && probe <= close)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};

    fn occ(date: (i32, u32, u32), start: (u32, u32), end: (u32, u32)) -> Occurrence {
        Occurrence {
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).unwrap(),
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        }
    }

    fn local(tz: &Tz, s: &str) -> DateTime<Utc> {
        let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").unwrap();
        localize(tz, naive)
    }

    #[test]
    fn chicago_thursday_activates_one_minute_early() {
        let tz: Tz = "America/Chicago".parse().unwrap();
        let o = occ((2024, 3, 14), (19, 0), (22, 30));

        // 18:59 local + 60s lookahead = 19:00, inside [18:00, 23:30].
        assert!(should_be_active(&o, &tz, 60, 60, local(&tz, "2024-03-14T18:59:00")).unwrap());

        let (open, close) = activation_window(&o, &tz, 60, 60).unwrap();
        assert_eq!(open, local(&tz, "2024-03-14T18:00:00"));
        assert_eq!(close, local(&tz, "2024-03-14T23:30:00"));
        // CDT is UTC-5 after the 2024-03-10 switch.
        assert_eq!(open.to_rfc3339(), "2024-03-14T23:00:00+00:00");
    }

    #[test]
    fn window_edges_are_inclusive_after_lookahead() {
        let tz: Tz = "America/Chicago".parse().unwrap();
        let o = occ((2024, 3, 14), (19, 0), (22, 30));

        assert!(!should_be_active(&o, &tz, 60, 60, local(&tz, "2024-03-14T17:58:59")).unwrap());
        assert!(should_be_active(&o, &tz, 60, 60, local(&tz, "2024-03-14T17:59:00")).unwrap());
        assert!(should_be_active(&o, &tz, 60, 60, local(&tz, "2024-03-14T23:29:00")).unwrap());
        assert!(!should_be_active(&o, &tz, 60, 60, local(&tz, "2024-03-14T23:29:01")).unwrap());
    }

    #[test]
    fn midnight_end_rolls_to_next_day() {
        let tz: Tz = "Europe/Dublin".parse().unwrap();
        let o = occ((2024, 6, 7), (21, 0), (0, 0));

        let (start, end) = occurrence_span(&o, &tz);
        assert_eq!(end - start, Duration::hours(3));

        assert!(should_be_active(&o, &tz, 0, 0, local(&tz, "2024-06-07T23:30:00")).unwrap());
        assert!(!should_be_active(&o, &tz, 0, 0, local(&tz, "2024-06-08T00:30:00")).unwrap());
    }

    #[test]
    fn oversized_buffers_are_configuration_errors() {
        let tz: Tz = "America/Chicago".parse().unwrap();
        let o = occ((2024, 3, 14), (19, 0), (22, 30));
        let now = local(&tz, "2024-03-14T18:59:00");

        let huge_before = should_be_active(&o, &tz, i64::MAX / 2, 60, now);
        assert!(matches!(huge_before, Err(AppError::Configuration(_))));

        let huge_after = activation_window(&o, &tz, 60, i64::MAX);
        assert!(matches!(huge_after, Err(AppError::Configuration(_))));
    }

    #[test]
    fn spring_forward_gap_moves_start_later() {
        let tz: Tz = "America/Chicago".parse().unwrap();
        // 02:30 does not exist on 2024-03-10 in Chicago.
        let o = occ((2024, 3, 10), (2, 30), (4, 0));
        let start = start_instant(&o, &tz);
        assert_eq!(start.to_rfc3339(), "2024-03-10T08:30:00+00:00");
    }

    #[test]
    fn fall_back_ambiguity_takes_earlier_instant() {
        let tz: Tz = "America/Chicago".parse().unwrap();
        // 01:30 happens twice on 2024-11-03; the first is CDT (UTC-5).
        let o = occ((2024, 11, 3), (1, 30), (3, 0));
        assert_eq!(start_instant(&o, &tz).to_rfc3339(), "2024-11-03T06:30:00+00:00");
    }
}
