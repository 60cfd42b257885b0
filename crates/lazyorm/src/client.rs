//! Connection and pool contracts.
//!
//! The engine never opens connections itself. It borrows one from a
//! [`ConnectionPool`], runs statements through the [`Connection`] it gets back, and
//! releases it by dropping it, so every exit path (`?`, early return, panic) hands
//! the connection back to the pool.

use crate::error::{OrmError, OrmResult};
use crate::row::RawRow;
use crate::value::{Value, value_from_pg};
use tokio_postgres::types::ToSql;

/// A live database connection that speaks [`Value`] parameters and rows.
pub trait Connection: Send + Sync {
    /// Run a statement and return all rows.
    fn query(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<Vec<RawRow>>> + Send;

    /// Run a statement and return the number of affected rows.
    fn execute(
        &self,
        sql: &str,
        params: &[Value],
    ) -> impl std::future::Future<Output = OrmResult<u64>> + Send;

    /// Round-trip a trivial query.
    fn ping(&self) -> impl std::future::Future<Output = OrmResult<()>> + Send {
        async move { self.query("SELECT 1", &[]).await.map(|_| ()) }
    }
}

/// "Lend me a connection; I give it back when I drop it."
pub trait ConnectionPool: Send + Sync {
    type Conn: Connection + Send;

    /// Borrow a connection, waiting up to the pool's acquire timeout.
    ///
    /// Fails with [`OrmError::PoolExhausted`] when the wait times out and
    /// [`OrmError::Connection`] when the pool cannot produce a connection at all.
    fn acquire(&self) -> impl std::future::Future<Output = OrmResult<Self::Conn>> + Send;

    /// Whether a connection can be borrowed and answers `SELECT 1`.
    fn test(&self) -> impl std::future::Future<Output = bool> + Send {
        async move {
            match self.acquire().await {
                Ok(conn) => conn.ping().await.is_ok(),
                Err(_) => false,
            }
        }
    }
}

fn as_refs(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn raw_row(row: &tokio_postgres::Row) -> OrmResult<RawRow> {
    (0..row.len())
        .map(|idx| {
            value_from_pg(row, idx).map_err(|message| OrmError::mapping(row.columns()[idx].name(), message))
        })
        .collect()
}

impl Connection for tokio_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<RawRow>> {
        let rows = tokio_postgres::Client::query(self, sql, &as_refs(params))
            .await
            .map_err(OrmError::from_db_error)?;
        rows.iter().map(raw_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        tokio_postgres::Client::execute(self, sql, &as_refs(params))
            .await
            .map_err(OrmError::from_db_error)
    }
}

// ===== deadpool-postgres support =====

#[cfg(feature = "pool")]
impl Connection for deadpool_postgres::ClientWrapper {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<RawRow>> {
        Connection::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        Connection::execute(&**self, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl Connection for deadpool_postgres::Client {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<RawRow>> {
        // Delegate to the deref target (ClientWrapper / tokio_postgres::Client).
        Connection::query(&**self, sql, params).await
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        Connection::execute(&**self, sql, params).await
    }
}

#[cfg(feature = "pool")]
impl ConnectionPool for deadpool_postgres::Pool {
    type Conn = deadpool_postgres::Client;

    async fn acquire(&self) -> OrmResult<Self::Conn> {
        self.get().await.map_err(|err| match err {
            deadpool_postgres::PoolError::Timeout(_) => {
                OrmError::PoolExhausted(self.timeouts().wait.unwrap_or_default())
            }
            other => OrmError::from(other),
        })
    }
}
