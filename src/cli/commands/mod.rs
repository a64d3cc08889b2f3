pub mod activate;
pub mod auto_create;
pub mod check;
pub mod checkin;
pub mod config;
pub mod db;
pub mod init;
pub mod list;
pub mod log;
pub mod run;
pub mod where_is;

use crate::config::Config;
use crate::core::clock::{Clock, FixedClock, SystemClock};
use crate::db::initialize::init_db;
use crate::db::pool::DbPool;
use crate::errors::{AppError, AppResult};
use crate::utils::date::parse_instant;

/// `--at` override, or the system clock.
pub(crate) fn clock_for(at: Option<&String>) -> AppResult<Box<dyn Clock>> {
    match at {
        Some(s) => {
            let instant = parse_instant(s).ok_or_else(|| AppError::InvalidDate(s.to_string()))?;
            Ok(Box::new(FixedClock(instant)))
        }
        None => Ok(Box::new(SystemClock)),
    }
}

/// Open the configured database and bring its schema up to date.
pub(crate) fn open_pool(cfg: &Config) -> AppResult<DbPool> {
    let pool = DbPool::new(&cfg.database)?;
    init_db(&pool.conn)?;
    Ok(pool)
}
