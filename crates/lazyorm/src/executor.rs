//! Single-statement execution against a borrowed connection.

use crate::client::{Connection, ConnectionPool};
use crate::clause::Statement;
use crate::error::OrmResult;
use crate::row::RawRow;
use std::time::Instant;

/// SQL longer than this (in bytes) is truncated in log events.
pub const MAX_LOGGED_SQL: usize = 200;

/// Result of [`execute`]: rows when fetching, otherwise the affected-row count.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecOutcome {
    Rows(Vec<RawRow>),
    Affected(u64),
}

impl ExecOutcome {
    pub fn into_rows(self) -> Vec<RawRow> {
        match self {
            ExecOutcome::Rows(rows) => rows,
            ExecOutcome::Affected(_) => Vec::new(),
        }
    }

    /// Affected rows, or the number of returned rows when fetching.
    pub fn affected(&self) -> u64 {
        match self {
            ExecOutcome::Rows(rows) => rows.len() as u64,
            ExecOutcome::Affected(n) => *n,
        }
    }
}

/// The type of SQL operation being performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    Other,
}

impl QueryType {
    pub fn from_sql(sql: &str) -> Self {
        let head = sql
            .trim_start()
            .split(|c: char| c.is_whitespace() || c == '(')
            .next()
            .unwrap_or_default();
        if head.eq_ignore_ascii_case("SELECT") {
            QueryType::Select
        } else if head.eq_ignore_ascii_case("INSERT") {
            QueryType::Insert
        } else if head.eq_ignore_ascii_case("UPDATE") {
            QueryType::Update
        } else if head.eq_ignore_ascii_case("DELETE") {
            QueryType::Delete
        } else {
            QueryType::Other
        }
    }
}

pub(crate) fn truncate_sql(sql: &str) -> String {
    if sql.len() <= MAX_LOGGED_SQL {
        return sql.to_string();
    }
    let mut end = MAX_LOGGED_SQL;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &sql[..end])
}

/// Borrow a connection from `pool`, run `stmt` once, and give the connection back.
///
/// With `fetch` the raw rows are returned for mapping; otherwise the backend's
/// affected-row count. The connection is released before this returns, whether the
/// statement succeeded or not.
pub async fn execute<P: ConnectionPool>(
    pool: &P,
    stmt: &Statement,
    fetch: bool,
) -> OrmResult<ExecOutcome> {
    let query_type = QueryType::from_sql(stmt.sql());
    let conn = match pool.acquire().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::warn!(
                target: "lazyorm.sql",
                query_type = ?query_type,
                error = %e,
                "could not acquire a connection"
            );
            return Err(e);
        }
    };

    let start = Instant::now();
    let result = if fetch {
        conn.query(stmt.sql(), stmt.params())
            .await
            .map(ExecOutcome::Rows)
    } else {
        conn.execute(stmt.sql(), stmt.params())
            .await
            .map(ExecOutcome::Affected)
    };
    drop(conn);
    let elapsed_ms = start.elapsed().as_millis() as u64;

    match &result {
        Ok(outcome) => tracing::debug!(
            target: "lazyorm.sql",
            query_type = ?query_type,
            sql = %truncate_sql(stmt.sql()),
            param_count = stmt.params().len(),
            elapsed_ms,
            rows = outcome.affected(),
            "statement executed"
        ),
        Err(e) => tracing::error!(
            target: "lazyorm.sql",
            query_type = ?query_type,
            sql = %truncate_sql(stmt.sql()),
            param_count = stmt.params().len(),
            elapsed_ms,
            error = %e,
            "statement failed"
        ),
    }
    result
}

/// [`execute`] with `fetch = true`.
pub async fn fetch_rows<P: ConnectionPool>(pool: &P, stmt: &Statement) -> OrmResult<Vec<RawRow>> {
    execute(pool, stmt, true).await.map(ExecOutcome::into_rows)
}

/// [`execute`] with `fetch = false`.
pub async fn execute_affected<P: ConnectionPool>(pool: &P, stmt: &Statement) -> OrmResult<u64> {
    execute(pool, stmt, false).await.map(|outcome| outcome.affected())
}
