//! Caller-written SELECTs mapped onto a record type.

use std::marker::PhantomData;
use std::sync::Arc;

use crate::clause::Statement;
use crate::client::ConnectionPool;
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::row::Record;
use crate::value::Value;

/// Raw SQL fetch with optional result caching.
///
/// The SQL is sent as written, so it must use `$1..$n` placeholders for every value
/// and the number of bound values must match them. Columns must come back in `M`'s
/// declared field order.
///
/// ```ignore
/// let users = lazyorm::fetch::<User>("SELECT id, name, age, joined FROM users WHERE age > $1")
///     .bind(25)
///     .get(&db)
///     .await?;
/// ```
#[must_use]
pub struct Fetch<M> {
    sql: String,
    params: Vec<Value>,
    use_cache: bool,
    _marker: PhantomData<fn() -> M>,
}

/// Start a raw fetch for `M`. Results are cached unless [`Fetch::use_cache`] turns it off.
pub fn fetch<M: Record>(sql: impl Into<String>) -> Fetch<M> {
    Fetch {
        sql: sql.into(),
        params: Vec::new(),
        use_cache: true,
        _marker: PhantomData,
    }
}

impl<M: Record> Fetch<M> {
    /// Bind the next positional parameter.
    pub fn bind(mut self, value: impl Into<Value>) -> Self {
        self.params.push(value.into());
        self
    }

    /// Bind several parameters in order.
    pub fn bind_all<V: Into<Value>>(mut self, values: impl IntoIterator<Item = V>) -> Self {
        self.params.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn use_cache(mut self, enabled: bool) -> Self {
        self.use_cache = enabled;
        self
    }

    fn statement(&self) -> OrmResult<Statement> {
        if self.sql.trim().is_empty() {
            return Err(OrmError::validation("fetch requires a non-empty SQL query"));
        }
        Ok(Statement::new(self.sql.clone()).with_params(self.params.clone()))
    }

    /// Run the query (or serve it from the cache) and return the mapped rows.
    pub async fn get<P: ConnectionPool>(&self, db: &Db<P>) -> OrmResult<Arc<Vec<M>>> {
        let stmt = self.statement()?;
        if self.use_cache {
            db.query_cached::<M>(&stmt).await
        } else {
            db.query_as::<M>(&stmt).await.map(Arc::new)
        }
    }
}

impl<M> Clone for Fetch<M> {
    fn clone(&self) -> Self {
        Self {
            sql: self.sql.clone(),
            params: self.params.clone(),
            use_cache: self.use_cache,
            _marker: PhantomData,
        }
    }
}

impl<M> std::fmt::Debug for Fetch<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fetch")
            .field("sql", &self.sql)
            .field("param_count", &self.params.len())
            .field("use_cache", &self.use_cache)
            .finish()
    }
}
