use sessionkeeper::core::clock::FixedClock;
use sessionkeeper::core::location::LocationResolver;
use sessionkeeper::core::scheduler::{ActivationScheduler, SchedulerSettings, Transition};
use sessionkeeper::db::pool::DbPool;
use sessionkeeper::db::queries;
use sessionkeeper::db::unit_of_work::UnitOfWork;
use sessionkeeper::errors::AppError;
use sessionkeeper::models::attendance::Attendance;

mod common;
use common::{add_instance, add_session, day, is_active, mark, memory_pool, session, utc, weekly};

/// Chicago, Thursdays 19:00-22:30, buffers 60/60, with the 2024-03-14 instance.
fn chicago(pool: &DbPool) -> (i64, i64) {
    let sid = add_session(
        pool,
        &session(
            "Chicago Thursday",
            "America/Chicago",
            Some(weekly("Thursday", "19:00", "22:30")),
        ),
    );
    let iid = add_instance(pool, sid, "2024-03-14", "19:00", "22:30");
    (sid, iid)
}

fn pass_at(pool: &mut DbPool, instant: &str) -> sessionkeeper::core::scheduler::PassResult {
    let clock = FixedClock(utc(instant));
    ActivationScheduler::new(&clock, SchedulerSettings::default())
        .run_pass(pool)
        .expect("pass runs")
}

#[test]
fn chicago_instance_activates_at_1859_local() {
    let mut pool = memory_pool();
    let (sid, iid) = chicago(&pool);

    // 18:59 CDT
    let result = pass_at(&mut pool, "2024-03-14T23:59:00Z");

    assert_eq!(
        result.activated,
        vec![Transition {
            session_id: sid,
            instance_id: iid
        }]
    );
    assert!(result.deactivated.is_empty());
    assert!(result.is_clean());
    assert!(is_active(&pool, iid));
}

#[test]
fn lookahead_opens_the_window_one_minute_early() {
    let mut pool = memory_pool();
    let (_, iid) = chicago(&pool);

    // 17:58:59 local: 17:59:59 is still outside [18:00, 23:30]
    let result = pass_at(&mut pool, "2024-03-14T22:58:59Z");
    assert!(result.is_noop());
    assert!(!is_active(&pool, iid));

    // 17:59:00 local: lookahead lands exactly on the inclusive start
    let result = pass_at(&mut pool, "2024-03-14T22:59:00Z");
    assert_eq!(result.activated.len(), 1);
    assert!(is_active(&pool, iid));
}

#[test]
fn instance_deactivates_after_buffered_end() {
    let mut pool = memory_pool();
    let (sid, iid) = chicago(&pool);

    pass_at(&mut pool, "2024-03-14T23:59:00Z");

    // 23:29:00 local: 23:30:00 is the inclusive end
    let result = pass_at(&mut pool, "2024-03-15T04:29:00Z");
    assert!(result.is_noop());
    assert!(is_active(&pool, iid));

    let result = pass_at(&mut pool, "2024-03-15T04:29:01Z");
    assert_eq!(
        result.deactivated,
        vec![Transition {
            session_id: sid,
            instance_id: iid
        }]
    );
    assert!(!is_active(&pool, iid));
}

#[test]
fn second_pass_without_changes_is_a_noop() {
    let mut pool = memory_pool();
    let (_, iid) = chicago(&pool);
    mark(&pool, iid, 7, Attendance::Yes, Some("2024-03-14T20:00:00Z"));

    let first = pass_at(&mut pool, "2024-03-14T23:59:00Z");
    assert!(!first.is_noop());

    let second = pass_at(&mut pool, "2024-03-14T23:59:00Z");
    assert!(second.is_noop());
    assert!(second.is_clean());
    assert_eq!(
        LocationResolver::location_of(&pool.conn, 7).unwrap(),
        Some(iid)
    );
}

#[test]
fn cancelled_instance_is_never_activated() {
    let mut pool = memory_pool();
    let (_, iid) = chicago(&pool);
    queries::set_instance_cancelled(&pool.conn, iid, true).unwrap();

    let result = pass_at(&mut pool, "2024-03-14T23:59:00Z");

    assert!(result.activated.is_empty());
    assert!(!is_active(&pool, iid));
}

#[test]
fn cancelling_an_active_instance_deactivates_it_on_next_pass() {
    let mut pool = memory_pool();
    let (_, iid) = chicago(&pool);
    mark(&pool, iid, 7, Attendance::Yes, None);

    pass_at(&mut pool, "2024-03-14T23:59:00Z");
    assert!(is_active(&pool, iid));

    queries::set_instance_cancelled(&pool.conn, iid, true).unwrap();
    let result = pass_at(&mut pool, "2024-03-14T23:59:00Z");

    assert_eq!(result.deactivated.len(), 1);
    assert!(!is_active(&pool, iid));
    assert_eq!(LocationResolver::location_of(&pool.conn, 7).unwrap(), None);
}

#[test]
fn instance_without_times_is_not_activated_and_stale_flag_is_cleared() {
    let mut pool = memory_pool();
    let (sid, _) = chicago(&pool);
    let pending =
        queries::insert_unscheduled_instance(&pool.conn, sid, day("2024-03-15")).unwrap();
    queries::set_instance_active(&pool.conn, pending, true).unwrap();

    let result = pass_at(&mut pool, "2024-03-14T23:59:00Z");

    assert!(result.is_clean());
    assert!(result.deactivated.iter().any(|t| t.instance_id == pending));
    assert!(!is_active(&pool, pending));
}

#[test]
fn instance_crossing_midnight_stays_active_after_midnight() {
    let mut pool = memory_pool();
    let mut def = session(
        "Late Session",
        "Europe/Dublin",
        Some(weekly("Thursday", "22:00", "01:00")),
    );
    def.buffer_before_minutes = 0;
    def.buffer_after_minutes = 0;
    let sid = add_session(&pool, &def);
    let iid = add_instance(&pool, sid, "2024-06-06", "22:00", "01:00");

    // 00:30 IST on Friday
    let result = pass_at(&mut pool, "2024-06-06T23:30:00Z");

    assert_eq!(result.activated.len(), 1);
    assert!(is_active(&pool, iid));
}

#[test]
fn bad_timezone_is_recorded_and_other_sessions_proceed() {
    let mut pool = memory_pool();
    let bad = add_session(
        &pool,
        &session("Nowhere", "Mars/Olympus", Some(weekly("Thursday", "19:00", "22:30"))),
    );
    add_instance(&pool, bad, "2024-03-14", "19:00", "22:30");
    let (good, iid) = chicago(&pool);

    let result = pass_at(&mut pool, "2024-03-14T23:59:00Z");

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].session_id, bad);
    assert_eq!(result.errors[0].kind, "configuration");
    assert_eq!(
        result.activated,
        vec![Transition {
            session_id: good,
            instance_id: iid
        }]
    );
}

#[test]
fn malformed_recurrence_is_recorded_and_rolled_back() {
    let mut pool = memory_pool();
    let bad = add_session(
        &pool,
        &session("Broken", "America/Chicago", Some("{ not json".to_string())),
    );
    let stuck = add_instance(&pool, bad, "2024-03-14", "19:00", "22:30");
    chicago(&pool);

    let result = pass_at(&mut pool, "2024-03-14T23:59:00Z");

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].session_id, bad);
    assert_eq!(result.activated.len(), 1);
    assert!(!is_active(&pool, stuck));
}

#[test]
fn one_off_and_terminated_sessions_are_skipped() {
    let mut pool = memory_pool();
    let one_off = add_session(&pool, &session("One-off", "America/Chicago", None));
    let one_off_instance = add_instance(&pool, one_off, "2024-03-14", "19:00", "22:30");

    let mut ended = session(
        "Ended",
        "America/Chicago",
        Some(weekly("Thursday", "19:00", "22:30")),
    );
    ended.termination_date = Some(day("2024-03-01"));
    let ended = add_session(&pool, &ended);
    let ended_instance = add_instance(&pool, ended, "2024-03-14", "19:00", "22:30");

    let result = pass_at(&mut pool, "2024-03-14T23:59:00Z");

    assert!(result.is_noop());
    assert!(!is_active(&pool, one_off_instance));
    assert!(!is_active(&pool, ended_instance));
}

#[test]
fn inline_check_reports_false_for_missing_instance() {
    let mut pool = memory_pool();
    let clock = FixedClock(utc("2024-03-14T23:59:00Z"));
    let scheduler = ActivationScheduler::new(&clock, SchedulerSettings::default());

    assert!(!scheduler.ensure_instance_activation_current(pool.unit_of_work(), 999));
}

#[test]
fn inline_check_activates_and_places_attendees() {
    let mut pool = memory_pool();
    let (_, iid) = chicago(&pool);
    mark(&pool, iid, 7, Attendance::Yes, Some("2024-03-14T23:00:00Z"));

    let clock = FixedClock(utc("2024-03-14T23:59:00Z"));
    let scheduler = ActivationScheduler::new(&clock, SchedulerSettings::default());

    assert!(scheduler.ensure_instance_activation_current(pool.unit_of_work(), iid));
    assert!(is_active(&pool, iid));
    assert_eq!(
        LocationResolver::location_of(&pool.conn, 7).unwrap(),
        Some(iid)
    );
}

#[test]
fn manual_overrides_validate_and_report_changes() {
    let mut pool = memory_pool();
    let (sid, iid) = chicago(&pool);
    let clock = FixedClock(utc("2024-03-14T12:00:00Z"));
    let scheduler = ActivationScheduler::new(&clock, SchedulerSettings::default());

    let wrong_session = scheduler.activate_instance(pool.unit_of_work(), sid + 1, iid);
    assert!(matches!(wrong_session, Err(AppError::NotFound(_))));

    assert!(scheduler.activate_instance(pool.unit_of_work(), sid, iid).unwrap());
    assert!(!scheduler.activate_instance(pool.unit_of_work(), sid, iid).unwrap());

    assert!(scheduler.deactivate_instance(pool.unit_of_work(), sid, iid).unwrap());
    assert!(!scheduler.deactivate_instance(pool.unit_of_work(), sid, iid).unwrap());

    queries::set_instance_cancelled(&pool.conn, iid, true).unwrap();
    let cancelled = scheduler.activate_instance(pool.unit_of_work(), sid, iid);
    assert!(matches!(cancelled, Err(AppError::Consistency(_))));
    assert!(!is_active(&pool, iid));
}

#[test]
fn overflowing_buffer_fails_only_its_session() {
    let mut pool = memory_pool();
    let mut bad = session(
        "Bad",
        "America/Chicago",
        Some(weekly("Thursday", "19:00", "22:30")),
    );
    bad.buffer_before_minutes = i64::MAX / 2;
    let bad = add_session(&pool, &bad);
    add_instance(&pool, bad, "2024-03-14", "19:00", "22:30");
    let (good, iid) = chicago(&pool);

    let result = pass_at(&mut pool, "2024-03-14T23:59:00Z");

    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].session_id, bad);
    assert_eq!(result.errors[0].kind, "configuration");
    assert_eq!(
        result.activated,
        vec![Transition {
            session_id: good,
            instance_id: iid
        }]
    );
    assert!(is_active(&pool, iid));
}

#[test]
fn instance_left_active_before_the_window_is_deactivated() {
    let mut pool = memory_pool();
    let (sid, current) = chicago(&pool);
    let old = add_instance(&pool, sid, "2024-03-07", "19:00", "22:30");
    mark(&pool, old, 7, Attendance::Yes, None);

    // activated a week ago, then the scheduler was down
    let clock = FixedClock(utc("2024-03-08T01:00:00Z"));
    let scheduler = ActivationScheduler::new(&clock, SchedulerSettings::default());
    assert!(scheduler.activate_instance(pool.unit_of_work(), sid, old).unwrap());
    assert_eq!(LocationResolver::location_of(&pool.conn, 7).unwrap(), Some(old));

    let result = pass_at(&mut pool, "2024-03-14T23:59:00Z");

    assert!(result.deactivated.iter().any(|t| t.instance_id == old));
    assert!(result.activated.iter().any(|t| t.instance_id == current));
    assert!(!is_active(&pool, old));
    assert_eq!(LocationResolver::location_of(&pool.conn, 7).unwrap(), None);
}

#[test]
fn instances_of_sessions_leaving_the_live_set_are_deactivated() {
    let mut pool = memory_pool();
    let (unrecurred, first) = chicago(&pool);
    let (terminated, second) = chicago(&pool);
    mark(&pool, first, 7, Attendance::Yes, None);
    mark(&pool, second, 8, Attendance::Yes, None);

    pass_at(&mut pool, "2024-03-14T23:59:00Z");
    assert!(is_active(&pool, first));
    assert!(is_active(&pool, second));

    pool.conn
        .execute("UPDATE sessions SET recurrence = NULL WHERE id = ?1", [unrecurred])
        .unwrap();
    pool.conn
        .execute(
            "UPDATE sessions SET termination_date = '2024-03-01' WHERE id = ?1",
            [terminated],
        )
        .unwrap();

    let result = pass_at(&mut pool, "2024-03-14T23:59:00Z");

    assert!(result.is_clean());
    assert!(result.deactivated.contains(&Transition {
        session_id: unrecurred,
        instance_id: first
    }));
    assert!(result.deactivated.contains(&Transition {
        session_id: terminated,
        instance_id: second
    }));
    assert!(!is_active(&pool, first));
    assert!(!is_active(&pool, second));
    assert_eq!(LocationResolver::location_of(&pool.conn, 7).unwrap(), None);
    assert_eq!(LocationResolver::location_of(&pool.conn, 8).unwrap(), None);

    // nothing left to retire
    assert!(pass_at(&mut pool, "2024-03-14T23:59:00Z").is_noop());
}

#[test]
fn failed_inline_activation_leaves_no_partial_writes() {
    let mut pool = memory_pool();
    let (_, iid) = chicago(&pool);
    mark(&pool, iid, 7, Attendance::Yes, None);
    pool.conn
        .execute_batch(
            "CREATE TRIGGER audit_down BEFORE INSERT ON log
             WHEN NEW.operation = 'activate'
             BEGIN SELECT RAISE(ABORT, 'audit unavailable'); END;",
        )
        .unwrap();

    let clock = FixedClock(utc("2024-03-14T23:59:00Z"));
    let scheduler = ActivationScheduler::new(&clock, SchedulerSettings::default());

    let tx = pool.conn.transaction().unwrap();
    assert!(!scheduler.ensure_instance_activation_current(UnitOfWork::Borrowed(&*tx), iid));
    tx.commit().unwrap();

    assert!(!is_active(&pool, iid));
    assert_eq!(LocationResolver::location_of(&pool.conn, 7).unwrap(), None);
}
