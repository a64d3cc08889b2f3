use crate::db::pool::DbPool;
use crate::utils::colors::{CYAN, GREEN, GREY, RESET, YELLOW};
use rusqlite::OptionalExtension;
use std::fs;

pub fn print_db_info(pool: &mut DbPool, db_path: &str) -> rusqlite::Result<()> {
    println!();

    //
    // 1) FILE SIZE
    //
    let file_size = fs::metadata(db_path).map(|m| m.len()).unwrap_or(0);
    let file_mb = (file_size as f64) / (1024.0 * 1024.0);

    println!("{}• File:{} {}{}{}", CYAN, RESET, YELLOW, db_path, RESET);
    println!("{}• Size:{} {:.2} MB", CYAN, RESET, file_mb);

    //
    // 2) COUNTS
    //
    let count = |sql: &str| -> rusqlite::Result<i64> { pool.conn.query_row(sql, [], |row| row.get(0)) };

    let sessions = count("SELECT COUNT(*) FROM sessions")?;
    let recurring = count("SELECT COUNT(*) FROM sessions WHERE recurrence IS NOT NULL")?;
    let instances = count("SELECT COUNT(*) FROM session_instances")?;
    let active = count("SELECT COUNT(*) FROM session_instances WHERE is_active = 1")?;
    let located =
        count("SELECT COUNT(*) FROM person_current_location WHERE instance_id IS NOT NULL")?;

    println!(
        "{}• Sessions:{} {}{}{} ({} recurring)",
        CYAN, RESET, GREEN, sessions, RESET, recurring
    );
    println!(
        "{}• Instances:{} {}{}{} ({} active)",
        CYAN, RESET, GREEN, instances, RESET, active
    );
    println!("{}• People located:{} {}", CYAN, RESET, located);

    //
    // 3) DATE RANGE
    //
    let first_date: Option<String> = pool
        .conn
        .query_row(
            "SELECT date FROM session_instances ORDER BY date ASC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    let last_date: Option<String> = pool
        .conn
        .query_row(
            "SELECT date FROM session_instances ORDER BY date DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    let fmt_first = first_date.unwrap_or_else(|| format!("{GREY}--{RESET}"));
    let fmt_last = last_date.unwrap_or_else(|| format!("{GREY}--{RESET}"));

    println!("{}• Instance dates:{}", CYAN, RESET);
    println!("    from: {}", fmt_first);
    println!("    to:   {}", fmt_last);

    println!();
    Ok(())
}
