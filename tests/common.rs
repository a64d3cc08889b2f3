#![allow(dead_code)]
use assert_cmd::{Command, cargo_bin_cmd};
use chrono::{DateTime, NaiveDate, Utc};
use sessionkeeper::db::initialize::init_db;
use sessionkeeper::db::pool::DbPool;
use sessionkeeper::db::queries;
use sessionkeeper::models::attendance::{Attendance, AttendanceMark};
use sessionkeeper::models::recurrence::Occurrence;
use sessionkeeper::models::session::SessionDefinition;
use sessionkeeper::utils::time::parse_wall_clock;
use std::env;
use std::fs;
use std::path::PathBuf;

pub fn skp() -> Command {
    cargo_bin_cmd!("sessionkeeper")
}

/// Create a unique test DB path inside the system temp dir and remove any existing file
pub fn setup_test_db(name: &str) -> String {
    let mut path: PathBuf = env::temp_dir();
    path.push(format!("{}_sessionkeeper.sqlite", name));
    let db_path = path.to_string_lossy().to_string();
    fs::remove_file(&db_path).ok();
    db_path
}

/// Fresh in-memory database with the full schema.
pub fn memory_pool() -> DbPool {
    let pool = DbPool::in_memory().expect("open in-memory db");
    init_db(&pool.conn).expect("init db");
    pool
}

pub fn utc(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .expect("valid RFC 3339")
        .with_timezone(&Utc)
}

pub fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
}

/// Single weekly rule.
pub fn weekly(weekday: &str, start: &str, end: &str) -> String {
    format!(
        r#"{{"schedules":[{{"type":"weekly","weekday":"{weekday}","start_time":"{start}","end_time":"{end}"}}]}}"#
    )
}

pub fn session(name: &str, timezone: &str, recurrence: Option<String>) -> SessionDefinition {
    SessionDefinition {
        id: 0,
        name: name.to_string(),
        timezone: timezone.to_string(),
        recurrence,
        buffer_before_minutes: 60,
        buffer_after_minutes: 60,
        initiation_date: day("2024-01-01"),
        termination_date: None,
        auto_create: false,
        auto_create_hours_ahead: 48,
    }
}

pub fn add_session(pool: &DbPool, def: &SessionDefinition) -> i64 {
    queries::insert_session(&pool.conn, def).expect("insert session")
}

/// Insert one instance and return its id.
pub fn add_instance(pool: &DbPool, session_id: i64, date: &str, start: &str, end: &str) -> i64 {
    let occ = Occurrence {
        date: day(date),
        start_time: parse_wall_clock(start).expect("start"),
        end_time: parse_wall_clock(end).expect("end"),
    };
    assert!(queries::insert_instance(&pool.conn, session_id, &occ).expect("insert instance"));
    queries::instance_id_for_date(&pool.conn, session_id, occ.date)
        .expect("lookup instance")
        .expect("instance exists")
}

pub fn mark(pool: &DbPool, instance_id: i64, person_id: i64, attendance: Attendance, at: Option<&str>) {
    queries::upsert_attendance(
        &pool.conn,
        &AttendanceMark {
            instance_id,
            person_id,
            attendance,
            checkin_timestamp: at.map(utc),
        },
    )
    .expect("upsert attendance");
}

pub fn is_active(pool: &DbPool, instance_id: i64) -> bool {
    queries::load_instance(&pool.conn, instance_id)
        .expect("load instance")
        .is_active
}

/// Seed a file database for CLI tests: a Chicago Thursday session flagged
/// for auto-creation, initialized through the library.
pub fn seed_file_db(db_path: &str) -> i64 {
    let pool = DbPool::new(db_path).expect("open db");
    init_db(&pool.conn).expect("init db");
    let mut def = session(
        "Thursday Night Session",
        "America/Chicago",
        Some(weekly("Thursday", "19:00", "22:30")),
    );
    def.auto_create = true;
    add_session(&pool, &def)
}
