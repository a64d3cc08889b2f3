//! SQLite connection wrapper (one connection per process invocation).

use crate::db::unit_of_work::UnitOfWork;
use rusqlite::{Connection, Result};
use std::path::Path;
use std::time::Duration;

pub struct DbPool {
    pub conn: Connection,
}

impl DbPool {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(Path::new(path))?;
        Self::configure(conn)
    }

    /// Private database, used by tests and dry runs.
    pub fn in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// A unit of work that owns its transaction.
    pub fn unit_of_work(&mut self) -> UnitOfWork<'_> {
        UnitOfWork::Owned(&mut self.conn)
    }
}
