use crate::cli::commands::{clock_for, open_pool};
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::autocreate::{AutoCreateReport, auto_create_flagged};
use crate::core::location::LocationResolver;
use crate::core::scheduler::{ActivationScheduler, PassResult};
use crate::errors::{AppError, AppResult};
use crate::ui::messages::{info, success, warning};
use crate::utils::colors::{GREEN, RED, RESET};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Everything one periodic invocation did.
#[derive(Debug, Serialize)]
struct RunReport {
    now: DateTime<Utc>,
    auto_create: Option<AutoCreateReport>,
    pass: PassResult,
    relocated: usize,
}

impl RunReport {
    fn error_count(&self) -> usize {
        self.pass.errors.len() + self.auto_create.as_ref().map_or(0, |r| r.errors.len())
    }
}

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Run {
        at,
        json,
        no_auto_create,
    } = cmd
    {
        let clock = clock_for(at.as_ref())?;
        let now = clock.now();
        let mut pool = open_pool(cfg)?;

        let auto_create = if *no_auto_create {
            None
        } else {
            Some(auto_create_flagged(&mut pool, now)?)
        };

        let scheduler = ActivationScheduler::new(clock.as_ref(), cfg.scheduler_settings());
        let pass = scheduler.run_pass(&mut pool)?;

        // repair locations left stale by anything outside the pass
        let relocated = pool
            .unit_of_work()
            .run(|conn| LocationResolver::sweep(conn, now))?;

        let report = RunReport {
            now,
            auto_create,
            pass,
            relocated,
        };

        if *json {
            let out = serde_json::to_string_pretty(&report)
                .map_err(|e| AppError::Other(e.to_string()))?;
            println!("{out}");
        } else {
            print_report(&report);
        }

        let errors = report.error_count();
        if errors > 0 {
            return Err(AppError::Other(format!(
                "{errors} session(s) failed during the run"
            )));
        }
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    info(format!("Activation pass at {}", report.now.to_rfc3339()));

    if let Some(ac) = &report.auto_create
        && ac.created_count > 0
    {
        println!("  📅 {} instance(s) created", ac.created_count);
        for c in &ac.created {
            println!("     session {} on {}", c.session_id, c.date);
        }
    }

    for t in &report.pass.activated {
        println!(
            "  {GREEN}▲ activated{RESET}   session {} instance {}",
            t.session_id, t.instance_id
        );
    }
    for t in &report.pass.deactivated {
        println!(
            "  {RED}▼ deactivated{RESET} session {} instance {}",
            t.session_id, t.instance_id
        );
    }
    if report.relocated > 0 {
        println!("  🧭 {} location(s) repaired", report.relocated);
    }

    let auto_errors = report.auto_create.iter().flat_map(|r| r.errors.iter());
    for e in report.pass.errors.iter().chain(auto_errors) {
        warning(format!(
            "session {}: [{}] {}",
            e.session_id, e.kind, e.message
        ));
    }

    if report.pass.is_noop() && report.error_count() == 0 {
        success("Nothing to change.");
    } else if report.error_count() == 0 {
        success("Pass completed.");
    }
}
