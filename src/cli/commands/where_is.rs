use crate::cli::commands::open_pool;
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::core::location::LocationResolver;
use crate::db::queries;
use crate::errors::AppResult;
use crate::utils::time::format_optional_time;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::Where { person } = cmd {
        let pool = open_pool(cfg)?;

        match LocationResolver::location_of(&pool.conn, *person)? {
            Some(instance_id) => {
                let instance = queries::load_instance(&pool.conn, instance_id)?;
                let session = queries::load_session(&pool.conn, instance.session_id)?;
                println!(
                    "📍 Person {} is at \"{}\" (instance {}, {} {}-{} {})",
                    person,
                    session.name,
                    instance.id,
                    instance.date,
                    format_optional_time(instance.start_time),
                    format_optional_time(instance.end_time),
                    session.timezone
                );
            }
            None => println!("📍 Person {person} is not at any active session."),
        }
    }

    Ok(())
}
