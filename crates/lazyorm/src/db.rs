//! The handle builders execute against.

use crate::cache::{CacheKey, QueryCache};
use crate::clause::Statement;
use crate::client::ConnectionPool;
use crate::error::OrmResult;
use crate::executor::{self, ExecOutcome};
use crate::row::{RawRow, Record, map_rows};
use std::sync::Arc;

/// A connection pool plus the result cache shared by everything that runs through it.
///
/// ```ignore
/// let db = lazyorm::Db::new(lazyorm::create_pool(&config)?);
/// let adults = lazyorm::qb::select::<User>().gt("age", 25).fetch_all(&db).await?;
/// ```
#[derive(Debug)]
pub struct Db<P> {
    pool: P,
    cache: Arc<QueryCache>,
}

impl<P: ConnectionPool> Db<P> {
    /// Wrap `pool` with a fresh cache.
    pub fn new(pool: P) -> Self {
        Self::with_cache(pool, Arc::new(QueryCache::new()))
    }

    /// Wrap `pool`, sharing an existing cache (e.g. across several pools of one process).
    pub fn with_cache(pool: P, cache: Arc<QueryCache>) -> Self {
        Self { pool, cache }
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    /// Whether the pool can lend a working connection.
    pub async fn ping(&self) -> bool {
        self.pool.test().await
    }

    /// Run `stmt` once; see [`executor::execute`].
    pub async fn run(&self, stmt: &Statement, fetch: bool) -> OrmResult<ExecOutcome> {
        executor::execute(&self.pool, stmt, fetch).await
    }

    /// Run `stmt` and return the affected-row count.
    pub async fn execute(&self, stmt: &Statement) -> OrmResult<u64> {
        executor::execute_affected(&self.pool, stmt).await
    }

    /// Run `stmt` and return raw rows.
    pub async fn query_rows(&self, stmt: &Statement) -> OrmResult<Vec<RawRow>> {
        executor::fetch_rows(&self.pool, stmt).await
    }

    /// Run `stmt` and map every row onto `M`.
    pub async fn query_as<M: Record>(&self, stmt: &Statement) -> OrmResult<Vec<M>> {
        map_rows(self.query_rows(stmt).await?)
    }

    /// Like [`Db::query_as`], but served from the cache when the same
    /// `(M::MODEL, sql, params)` was fetched before.
    pub async fn query_cached<M: Record>(&self, stmt: &Statement) -> OrmResult<Arc<Vec<M>>> {
        let key = CacheKey::new(M::MODEL, stmt.sql(), stmt.params());
        self.cache
            .get_or_compute(key, || self.query_as::<M>(stmt))
            .await
    }

    /// Drop cached results for one model, or all of them.
    pub fn invalidate(&self, model: Option<&str>) -> usize {
        self.cache.invalidate(model)
    }
}
