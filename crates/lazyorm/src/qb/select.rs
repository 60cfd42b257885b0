//! SELECT query builder.

use crate::clause::{Statement, WhereList};
use crate::client::ConnectionPool;
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::qb::traits::{WhereQb, check, keep_first};
use crate::row::{RawRow, Record};
use crate::value::FromValue;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Sort direction for [`SelectQb::order_by`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn as_sql(self) -> &'static str {
        match self {
            Order::Asc => "ASC",
            Order::Desc => "DESC",
        }
    }
}

/// SELECT builder for record type `M`.
///
/// Reads `M::TABLE` and selects `M`'s declared columns in declared order unless told
/// otherwise. Builders are plain values: chain methods consume and return `Self`, and
/// executing borrows the builder, so the same builder can be run again.
pub struct SelectQb<M> {
    table: Option<Ident>,
    columns: Option<Vec<Ident>>,
    wheres: WhereList,
    order: Option<(Ident, Order)>,
    limit: Option<u64>,
    offset: Option<u64>,
    build_error: Option<String>,
    _model: PhantomData<fn() -> M>,
}

impl<M> Clone for SelectQb<M> {
    fn clone(&self) -> Self {
        Self {
            table: self.table.clone(),
            columns: self.columns.clone(),
            wheres: self.wheres.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
            build_error: self.build_error.clone(),
            _model: PhantomData,
        }
    }
}

impl<M> fmt::Debug for SelectQb<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectQb")
            .field("table", &self.table)
            .field("columns", &self.columns)
            .field("wheres", &self.wheres)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .field("build_error", &self.build_error)
            .finish()
    }
}

impl<M: Record> Default for SelectQb<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: Record> SelectQb<M> {
    pub fn new() -> Self {
        Self {
            table: None,
            columns: None,
            wheres: WhereList::new(),
            order: None,
            limit: None,
            offset: None,
            build_error: None,
            _model: PhantomData,
        }
    }

    /// Read from `table` instead of `M::TABLE`.
    pub fn from(mut self, table: &str) -> Self {
        match Ident::parse(table) {
            Ok(t) => self.table = Some(t),
            Err(e) => keep_first(&mut self.build_error, e),
        }
        self
    }

    /// Select these columns instead of `M`'s declared fields.
    ///
    /// Rows are still mapped positionally, so only use a projection that lines up with
    /// `M`, or read it with [`SelectQb::fetch_rows`].
    pub fn select(mut self, columns: &[&str]) -> Self {
        match columns
            .iter()
            .map(|c| Ident::parse(c))
            .collect::<OrmResult<Vec<_>>>()
        {
            Ok(cols) if cols.is_empty() => {
                keep_first(&mut self.build_error, OrmError::validation("Empty column list"))
            }
            Ok(cols) => self.columns = Some(cols),
            Err(e) => keep_first(&mut self.build_error, e),
        }
        self
    }

    /// Set the single ORDER BY column; a later call replaces an earlier one.
    pub fn order_by(mut self, column: &str, order: Order) -> Self {
        match Ident::parse(column) {
            Ok(col) => self.order = Some((col, order)),
            Err(e) => keep_first(&mut self.build_error, e),
        }
        self
    }

    pub fn order_by_asc(self, column: &str) -> Self {
        self.order_by(column, Order::Asc)
    }

    pub fn order_by_desc(self, column: &str) -> Self {
        self.order_by(column, Order::Desc)
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    fn table(&self) -> OrmResult<Ident> {
        match &self.table {
            Some(t) => Ok(t.clone()),
            None => Ident::parse(M::TABLE),
        }
    }

    fn columns(&self) -> OrmResult<Vec<Ident>> {
        match &self.columns {
            Some(cols) => Ok(cols.clone()),
            None => M::fields().iter().map(|f| Ident::parse(f.name)).collect(),
        }
    }

    /// Build the SELECT statement.
    pub fn build(&self) -> OrmResult<Statement> {
        check(&self.build_error)?;
        let mut stmt = Statement::new("SELECT ");
        for (i, col) in self.columns()?.iter().enumerate() {
            if i > 0 {
                stmt.push(", ");
            }
            stmt.push_ident(col);
        }
        stmt.push(" FROM ").push_ident(&self.table()?);
        self.wheres.append_to(&mut stmt);

        if let Some((col, order)) = &self.order {
            stmt.push(" ORDER BY ").push_ident(col).push(" ").push(order.as_sql());
        }
        if let Some(limit) = self.limit {
            stmt.push(&format!(" LIMIT {limit}"));
        }
        if let Some(offset) = self.offset {
            stmt.push(&format!(" OFFSET {offset}"));
        }
        Ok(stmt)
    }

    /// Build `SELECT COUNT(*)` over the same table and WHERE clauses.
    ///
    /// ORDER BY, LIMIT and OFFSET are dropped.
    pub fn build_count(&self) -> OrmResult<Statement> {
        check(&self.build_error)?;
        let mut stmt = Statement::new("SELECT COUNT(*) FROM ");
        stmt.push_ident(&self.table()?);
        self.wheres.append_to(&mut stmt);
        Ok(stmt)
    }

    /// Get the built SQL string (for debugging).
    pub fn to_sql(&self) -> String {
        self.build()
            .map(|stmt| stmt.sql().to_string())
            .unwrap_or_default()
    }

    // ==================== Execution ====================

    /// Fetch every matching row as `M`. Never cached.
    pub async fn fetch_all<P: ConnectionPool>(&self, db: &Db<P>) -> OrmResult<Vec<M>> {
        let stmt = self.build()?;
        db.query_as::<M>(&stmt).await
    }

    /// Fetch every matching row, served from the result cache when the same statement
    /// was fetched for `M` before.
    pub async fn fetch_cached<P: ConnectionPool>(&self, db: &Db<P>) -> OrmResult<Arc<Vec<M>>> {
        let stmt = self.build()?;
        db.query_cached::<M>(&stmt).await
    }

    /// `LIMIT 1`, then the first row if any.
    pub async fn first<P: ConnectionPool>(&self, db: &Db<P>) -> OrmResult<Option<M>> {
        let rows = self.clone().limit(1).fetch_all(db).await?;
        Ok(rows.into_iter().next())
    }

    /// Count matching rows on the server.
    pub async fn count<P: ConnectionPool>(&self, db: &Db<P>) -> OrmResult<i64> {
        let stmt = self.build_count()?;
        let rows = db.query_rows(&stmt).await?;
        let value = rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .ok_or_else(|| OrmError::mapping("count", "COUNT(*) returned no rows"))?;
        i64::from_value(value).map_err(|message| OrmError::mapping("count", message))
    }

    /// Fetch raw rows, e.g. for a projection that does not line up with `M`.
    pub async fn fetch_rows<P: ConnectionPool>(&self, db: &Db<P>) -> OrmResult<Vec<RawRow>> {
        let stmt = self.build()?;
        db.query_rows(&stmt).await
    }
}

impl<M> WhereQb for SelectQb<M> {
    fn where_list_mut(&mut self) -> &mut WhereList {
        &mut self.wheres
    }

    fn record_error(&mut self, err: OrmError) {
        keep_first(&mut self.build_error, err);
    }
}
