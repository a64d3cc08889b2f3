use crate::cli::commands::{clock_for, open_pool};
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::location::LocationResolver;
use crate::core::scheduler::ActivationScheduler;
use crate::errors::AppResult;
use crate::utils::colors::{GREEN, GREY, RESET};

/// Re-evaluate one instance and print `active` or `inactive`.
pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Check { instance, at } = cmd {
        let clock = clock_for(at.as_ref())?;
        let mut pool = open_pool(cfg)?;

        let scheduler = ActivationScheduler::new(clock.as_ref(), cfg.scheduler_settings());
        let active = scheduler.ensure_instance_activation_current(pool.unit_of_work(), *instance);

        let now = clock.now();
        pool.unit_of_work()
            .run(|conn| LocationResolver::sweep(conn, now))?;

        if active {
            println!("{GREEN}active{RESET}");
        } else {
            println!("{GREY}inactive{RESET}");
        }
    }

    Ok(())
}
