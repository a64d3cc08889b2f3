//! Manual overrides: `activate` and `deactivate`.

use crate::cli::commands::open_pool;
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::clock::SystemClock;
use crate::core::scheduler::ActivationScheduler;
use crate::errors::AppResult;
use crate::ui::messages::{info, success};

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    let clock = SystemClock;
    let scheduler = ActivationScheduler::new(&clock, cfg.scheduler_settings());

    match cmd {
        Commands::Activate { session, instance } => {
            let mut pool = open_pool(cfg)?;
            if scheduler.activate_instance(pool.unit_of_work(), *session, *instance)? {
                success(format!("Instance {instance} of session {session} activated."));
            } else {
                info(format!("Instance {instance} is already active."));
            }
        }
        Commands::Deactivate { session, instance } => {
            let mut pool = open_pool(cfg)?;
            if scheduler.deactivate_instance(pool.unit_of_work(), *session, *instance)? {
                success(format!("Instance {instance} of session {session} deactivated."));
            } else {
                info(format!("Instance {instance} is already inactive."));
            }
        }
        _ => {}
    }

    Ok(())
}
