use crate::cli::commands::{clock_for, open_pool};
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::autocreate::{Horizon, Target, auto_create_upcoming};
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{info, success, warning};

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::AutoCreate {
        session,
        days,
        hours,
        at,
    } = cmd
    {
        let horizon = match (days, hours) {
            (_, Some(h)) => Horizon::Hours(*h),
            (Some(d), None) => Horizon::Days(*d),
            (None, None) => Horizon::Days(cfg.default_lookahead_days),
        };
        let target = session.map_or(Target::All, Target::Session);

        let now = clock_for(at.as_ref())?.now();
        let mut pool = open_pool(cfg)?;

        let report = auto_create_upcoming(&mut pool, target, horizon, now)?;

        if report.created_count == 0 {
            info("No new instances needed.");
        } else {
            success(format!("{} instance(s) created:", report.created_count));
            for c in &report.created {
                println!("  session {} on {}", c.session_id, c.date);
            }
        }

        for e in &report.errors {
            warning(format!(
                "session {}: [{}] {}",
                e.session_id, e.kind, e.message
            ));
        }

        if !report.errors.is_empty() {
            return Err(AppError::Other(format!(
                "{} session(s) could not be materialized",
                report.errors.len()
            )));
        }
    }

    Ok(())
}
