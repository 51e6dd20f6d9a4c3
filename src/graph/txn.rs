//! Deadlines and the transaction wrappers every public operation runs in.
//!
//! Writes take SQLite's write lock up front (`BEGIN IMMEDIATE`) so concurrent
//! writers serialize on the lock rather than failing mid-transaction. Lock
//! waits are bounded by the operation's deadline through `busy_timeout`, and
//! the deadline is re-checked before commit: an operation that overruns rolls
//! back and reports [`GraphError::Timeout`] instead of applying late.

use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::{Duration, Instant};

use crate::db::DEFAULT_BUSY_TIMEOUT;
use crate::error::{GraphError, GraphResult};

/// Point in time after which an operation must not apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No caller deadline; lock waits still stop at the default busy timeout.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn instant(&self) -> Option<Instant> {
        self.0
    }

    /// The tighter of two deadlines.
    pub fn earliest(self, other: Deadline) -> Deadline {
        match (self.0, other.0) {
            (Some(a), Some(b)) => Self(Some(a.min(b))),
            (a, b) => Self(a.or(b)),
        }
    }

    /// Time left, or `None` when unbounded. Zero once expired.
    pub fn remaining(&self) -> Option<Duration> {
        self.0
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    pub fn check(&self, operation: &str) -> GraphResult<()> {
        if self.is_expired() {
            return Err(GraphError::Timeout {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}

/// Run `op` inside an IMMEDIATE transaction and commit if it succeeds before
/// the deadline. Any error, including an expired deadline, rolls back.
pub fn write<T>(
    conn: &mut Connection,
    deadline: Deadline,
    operation: &str,
    op: impl FnOnce(&Transaction) -> GraphResult<T>,
) -> GraphResult<T> {
    deadline.check(operation)?;
    bound_lock_wait(conn, deadline)?;

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| relabel(e.into(), operation))?;
    let value = op(&tx).map_err(|e| relabel(e, operation))?;

    if let Err(e) = deadline.check(operation) {
        tracing::warn!(operation, "deadline passed before commit; rolling back");
        return Err(e);
    }
    tx.commit().map_err(|e| relabel(e.into(), operation))?;
    Ok(value)
}

/// Run `op` against one consistent snapshot of the graph.
pub fn read<T>(
    conn: &mut Connection,
    deadline: Deadline,
    operation: &str,
    op: impl FnOnce(&Transaction) -> GraphResult<T>,
) -> GraphResult<T> {
    deadline.check(operation)?;
    bound_lock_wait(conn, deadline)?;

    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Deferred)
        .map_err(|e| relabel(e.into(), operation))?;
    let value = op(&tx).map_err(|e| relabel(e, operation))?;
    deadline.check(operation)?;
    tx.commit().map_err(|e| relabel(e.into(), operation))?;
    Ok(value)
}

fn bound_lock_wait(conn: &Connection, deadline: Deadline) -> GraphResult<()> {
    let wait = deadline
        .remaining()
        .map_or(DEFAULT_BUSY_TIMEOUT, |left| left.min(DEFAULT_BUSY_TIMEOUT));
    conn.busy_timeout(wait)?;
    Ok(())
}

fn relabel(err: GraphError, operation: &str) -> GraphError {
    match err {
        GraphError::Timeout { .. } => GraphError::Timeout {
            operation: operation.to_string(),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[test]
    fn earliest_picks_tighter_deadline() {
        let soon = Deadline::after(Duration::from_millis(10));
        let later = Deadline::after(Duration::from_secs(60));
        assert_eq!(soon.earliest(later), soon);
        assert_eq!(later.earliest(soon), soon);
        assert_eq!(Deadline::none().earliest(later), later);
        assert_eq!(Deadline::none().earliest(Deadline::none()), Deadline::none());
    }

    #[test]
    fn expired_deadline_fails_before_touching_database() {
        let mut conn = open_memory_database().unwrap();
        let past = Deadline::at(Instant::now() - Duration::from_millis(1));
        assert!(past.is_expired());

        let err = write(&mut conn, past, "tag", |_| Ok(())).unwrap_err();
        assert!(matches!(err, GraphError::Timeout { ref operation } if operation == "tag"));
    }

    #[test]
    fn failed_op_rolls_back() {
        let mut conn = open_memory_database().unwrap();
        let result: GraphResult<()> = write(&mut conn, Deadline::none(), "create", |tx| {
            tx.execute(
                "INSERT INTO tags (label) VALUES ('doomed')",
                [],
            )?;
            Err(GraphError::invalid("abort"))
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn deadline_expiring_mid_operation_rolls_back() {
        let mut conn = open_memory_database().unwrap();
        let deadline = Deadline::after(Duration::from_millis(20));
        let err = write(&mut conn, deadline, "create", |tx| {
            tx.execute("INSERT INTO tags (label) VALUES ('late')", [])?;
            std::thread::sleep(Duration::from_millis(40));
            Ok(())
        })
        .unwrap_err();
        assert_eq!(err.kind(), "timeout");

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM tags", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn committed_write_is_visible() {
        let mut conn = open_memory_database().unwrap();
        write(&mut conn, Deadline::after(Duration::from_secs(5)), "create", |tx| {
            tx.execute("INSERT INTO tags (label) VALUES ('kept')", [])?;
            Ok(())
        })
        .unwrap();

        let n = read(&mut conn, Deadline::none(), "read", |tx| {
            Ok(tx.query_row("SELECT COUNT(*) FROM tags", [], |r| r.get::<_, i64>(0))?)
        })
        .unwrap();
        assert_eq!(n, 1);
    }
}
