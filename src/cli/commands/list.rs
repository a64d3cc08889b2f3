use crate::cli::commands::open_pool;
use crate::cli::parser::Commands;
use crate::config::Config;
use crate::db::queries;
use crate::errors::{AppError, AppResult};
use crate::utils::colors::{GREEN, GREY, RED, RESET, colorize_optional};
use crate::utils::date;
use crate::utils::table::{Column, Table};
use crate::utils::time::format_optional_time;
use chrono::Utc;

pub fn handle(cmd: &Commands, cfg: &Config) -> AppResult<()> {
    if let Commands::List { date: d } = cmd {
        let day = match d {
            Some(s) => date::parse_date(s).ok_or_else(|| AppError::InvalidDate(s.clone()))?,
            None => Utc::now().date_naive(),
        };

        let pool = open_pool(cfg)?;
        let instances = queries::load_instances_by_date(&pool.conn, day)?;

        if instances.is_empty() {
            println!("No instances for {}", day);
            return Ok(());
        }

        let mut table = Table::new(vec![
            col("ID", 6),
            col("SESSION", 24),
            col("START", 8),
            col("END", 8),
            col("STATUS", 10),
            col("YES", 5),
        ]);

        for inst in &instances {
            let session = queries::load_session(&pool.conn, inst.session_id)?;
            let confirmed = queries::confirmed_attendees(&pool.conn, inst.id)?;

            // padding is applied by the table, colour is added after
            let status = if inst.is_cancelled {
                "cancelled"
            } else if inst.is_active {
                "active"
            } else {
                "inactive"
            };

            table.add_row(vec![
                inst.id.to_string(),
                truncate(&session.name, 24),
                format_optional_time(inst.start_time),
                format_optional_time(inst.end_time),
                status.to_string(),
                confirmed.len().to_string(),
            ]);
        }

        println!("📅 Instances on {}\n", date::format_date(day));
        for line in table.render().lines() {
            println!("{}", paint_line(line));
        }
    }

    Ok(())
}

fn col(header: &str, width: usize) -> Column {
    Column {
        header: header.to_string(),
        width,
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn paint_line(line: &str) -> String {
    let line = line
        .replacen(" active ", &format!(" {GREEN}active{RESET} "), 1)
        .replacen(" cancelled ", &format!(" {RED}cancelled{RESET} "), 1)
        .replacen(" inactive ", &format!(" {GREY}inactive{RESET} "), 1);
    line.split("--:--")
        .collect::<Vec<_>>()
        .join(&colorize_optional("--:--"))
}
