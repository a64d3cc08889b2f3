//! Time utilities: parsing and formatting HH:MM wall-clock values.

use chrono::NaiveTime;

/// Strict `HH:MM`.
pub fn parse_time(t: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(t, "%H:%M").ok()
}

/// `HH:MM`, tolerating a trailing `:SS` as written by some admin tools.
pub fn parse_wall_clock(t: &str) -> Option<NaiveTime> {
    let t = t.trim();
    parse_time(t).or_else(|| NaiveTime::parse_from_str(t, "%H:%M:%S").ok())
}

pub fn format_time(t: NaiveTime) -> String {
    t.format("%H:%M").to_string()
}

pub fn format_optional_time(t: Option<NaiveTime>) -> String {
    t.map(format_time).unwrap_or_else(|| "--:--".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_accepts_seconds() {
        assert_eq!(
            parse_wall_clock("19:00:00"),
            NaiveTime::from_hms_opt(19, 0, 0)
        );
        assert_eq!(parse_wall_clock(" 07:05 "), NaiveTime::from_hms_opt(7, 5, 0));
        assert!(parse_wall_clock("7pm").is_none());
    }

    #[test]
    fn missing_time_renders_placeholder() {
        assert_eq!(format_optional_time(None), "--:--");
        assert_eq!(format_optional_time(NaiveTime::from_hms_opt(22, 30, 0)), "22:30");
    }
}
