//! Explicit unit of work.
//!
//! Callers either hand over a connection and let the unit own a fresh
//! transaction (committed on `Ok`, rolled back on `Err`), or lend a
//! connection that already sits inside their own transaction. A borrowed
//! unit runs inside a savepoint: on `Err` its own writes are undone and the
//! caller's transaction is left as it was before the unit started.

use crate::errors::AppResult;
use rusqlite::{Connection, TransactionBehavior};
use tracing::warn;

pub enum UnitOfWork<'a> {
    /// Begin, commit and roll back here.
    Owned(&'a mut Connection),
    /// Nested in the caller's transaction through a savepoint; the outer
    /// transaction is never committed here.
    Borrowed(&'a Connection),
}

impl<'a> UnitOfWork<'a> {
    /// Run `work` inside this unit.
    ///
    /// Owned units use `BEGIN IMMEDIATE`: the write lock is taken before the
    /// first read, so every read-then-write inside `work` is serialized
    /// against other writers of the same database file.
    pub fn run<T, F>(self, work: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T>,
    {
        match self {
            UnitOfWork::Owned(conn) => {
                let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
                // Dropping `tx` on the error path rolls back.
                let value = work(&*tx)?;
                tx.commit()?;
                Ok(value)
            }
            UnitOfWork::Borrowed(conn) => {
                conn.execute_batch("SAVEPOINT unit_of_work")?;
                match work(conn) {
                    Ok(value) => {
                        conn.execute_batch("RELEASE unit_of_work")?;
                        Ok(value)
                    }
                    Err(e) => {
                        if let Err(rollback) =
                            conn.execute_batch("ROLLBACK TO unit_of_work; RELEASE unit_of_work")
                        {
                            warn!(error = %rollback, "savepoint rollback failed");
                        }
                        Err(e)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AppError;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER NOT NULL);").unwrap();
        conn
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM t", [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn owned_commits_on_ok() {
        let mut conn = setup();
        UnitOfWork::Owned(&mut conn)
            .run(|c| {
                c.execute("INSERT INTO t (v) VALUES (1)", [])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(count(&conn), 1);
    }

    #[test]
    fn owned_rolls_back_on_err() {
        let mut conn = setup();
        let res: AppResult<()> = UnitOfWork::Owned(&mut conn).run(|c| {
            c.execute("INSERT INTO t (v) VALUES (1)", [])?;
            Err(AppError::Consistency("boom".into()))
        });
        assert!(res.is_err());
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn borrowed_leaves_outer_transaction_in_charge() {
        let mut conn = setup();
        {
            let tx = conn.transaction().unwrap();
            UnitOfWork::Borrowed(&*tx)
                .run(|c| {
                    c.execute("INSERT INTO t (v) VALUES (7)", [])?;
                    Ok(())
                })
                .unwrap();
            // outer transaction dropped without commit
        }
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn borrowed_error_undoes_only_its_own_writes() {
        let mut conn = setup();
        {
            let tx = conn.transaction().unwrap();
            tx.execute("INSERT INTO t (v) VALUES (1)", []).unwrap();

            let res: AppResult<()> = UnitOfWork::Borrowed(&*tx).run(|c| {
                c.execute("INSERT INTO t (v) VALUES (2)", [])?;
                Err(AppError::Consistency("boom".into()))
            });
            assert!(res.is_err());
            tx.commit().unwrap();
        }
        let values: Vec<i64> = conn
            .prepare("SELECT v FROM t ORDER BY v")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .map(|r| r.unwrap())
            .collect();
        assert_eq!(values, vec![1]);
    }

    #[test]
    fn borrowed_on_plain_connection_commits_on_ok() {
        let conn = setup();
        UnitOfWork::Borrowed(&conn)
            .run(|c| {
                c.execute("INSERT INTO t (v) VALUES (3)", [])?;
                Ok(())
            })
            .unwrap();
        assert_eq!(count(&conn), 1);
    }
}
