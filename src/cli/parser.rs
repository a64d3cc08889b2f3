use clap::{Parser, Subcommand};

/// Command-line interface definition for sessionkeeper
/// Activation scheduler and attendance tracker for recurring sessions
#[derive(Parser)]
#[command(
    name = "sessionkeeper",
    version = env!("CARGO_PKG_VERSION"),
    about = "Keep recurring sessions active on schedule and track where attendees are, using SQLite",
    long_about = None
)]
pub struct Cli {
    /// Override database path (useful for tests or custom DB)
    #[arg(global = true, long = "db")]
    pub db: Option<String>,

    /// Run in test mode (no config file update)
    #[arg(global = true, long = "test", hide = true)]
    pub test: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database and configuration
    Init,

    /// Print the current configuration
    Config {
        #[arg(long = "print", help = "Print the current configuration file")]
        print_config: bool,
    },

    /// Manage the database (migrations, integrity checks, etc.)
    Db {
        #[arg(long = "migrate", help = "Run pending database migrations")]
        migrate: bool,

        #[arg(long = "check", help = "Check database integrity")]
        check: bool,

        #[arg(long = "info", help = "Show database information")]
        info: bool,
    },

    /// Print the internal audit log
    Log {
        #[arg(long = "print", help = "Print rows from the internal log table")]
        print: bool,

        #[arg(long = "last", help = "Only show the last N rows")]
        last: Option<usize>,
    },

    /// Run one activation pass (periodic job entry point)
    Run {
        #[arg(long = "at", value_name = "RFC3339", help = "Evaluate at this instant instead of now")]
        at: Option<String>,

        #[arg(long = "json", help = "Print the pass result as JSON")]
        json: bool,

        #[arg(long = "no-auto-create", help = "Skip materializing instances for flagged sessions")]
        no_auto_create: bool,
    },

    /// Force an instance active
    Activate { session: i64, instance: i64 },

    /// Force an instance inactive
    Deactivate { session: i64, instance: i64 },

    /// Re-evaluate a single instance now
    Check {
        instance: i64,

        #[arg(long = "at", value_name = "RFC3339")]
        at: Option<String>,
    },

    /// Materialize upcoming instances
    AutoCreate {
        #[arg(long = "session", help = "Only this session (default: all recurring sessions)")]
        session: Option<i64>,

        #[arg(long = "days", conflicts_with = "hours", help = "Calendar days ahead")]
        days: Option<i64>,

        #[arg(long = "hours", help = "Hours ahead")]
        hours: Option<i64>,

        #[arg(long = "at", value_name = "RFC3339")]
        at: Option<String>,
    },

    /// Record a check-in and refresh the person's location
    Checkin {
        instance: i64,
        person: i64,

        #[arg(long = "attendance", default_value = "yes", help = "yes, maybe, no or unknown")]
        attendance: String,

        #[arg(long = "at", value_name = "RFC3339")]
        at: Option<String>,
    },

    /// Show where a person currently is
    Where { person: i64 },

    /// List instances for a date
    List {
        #[arg(long, value_name = "YYYY-MM-DD", help = "Date to list (default: today, UTC)")]
        date: Option<String>,
    },
}
