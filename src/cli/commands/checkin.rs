//! Attendance check-in.
//!
//! Records (or replaces) the person's mark, brings the instance's activation
//! up to date inline, then re-derives where the person is. All of it runs in
//! one unit of work.

use crate::cli::commands::{clock_for, open_pool};
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::location::LocationResolver;
use crate::core::scheduler::ActivationScheduler;
use crate::db::log::{instance_target, ttlog};
use crate::db::queries;
use crate::db::unit_of_work::UnitOfWork;
use crate::errors::{AppError, AppResult};
use crate::models::attendance::{Attendance, AttendanceMark};
use crate::ui::messages::success;
use tracing::info;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Checkin {
        instance,
        person,
        attendance,
        at,
    } = cmd
    {
        let attendance = Attendance::from_code(attendance)
            .ok_or_else(|| AppError::InvalidAttendance(attendance.clone()))?;

        let clock = clock_for(at.as_ref())?;
        let now = clock.now();
        let scheduler = ActivationScheduler::new(clock.as_ref(), cfg.scheduler_settings());
        let mut pool = open_pool(cfg)?;

        let (active, location) = pool.unit_of_work().run(|conn| {
            let target = queries::load_instance(conn, *instance)?;

            queries::upsert_attendance(
                conn,
                &AttendanceMark {
                    instance_id: target.id,
                    person_id: *person,
                    attendance,
                    checkin_timestamp: Some(now),
                },
            )?;

            let active =
                scheduler.ensure_instance_activation_current(UnitOfWork::Borrowed(conn), target.id);
            let location = LocationResolver::recalculate(conn, *person, now)?;

            ttlog(
                conn,
                "checkin",
                &instance_target(target.session_id, target.id),
                &format!("person {} marked {}", person, attendance.to_db_str()),
            )?;
            info!(
                person_id = *person,
                instance_id = target.id,
                attendance = attendance.to_db_str(),
                active,
                "check-in recorded"
            );

            Ok((active, location))
        })?;

        success(format!(
            "Person {person} checked in to instance {instance} ({}).",
            attendance.to_db_str()
        ));
        println!(
            "  instance is {}",
            if active { "active" } else { "inactive" }
        );
        match location {
            Some(id) => println!("  current location: instance {id}"),
            None => println!("  current location: none"),
        }
    }

    Ok(())
}
