//! DELETE query builder.

use crate::clause::{Statement, WhereList};
use crate::client::ConnectionPool;
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::qb::traits::{WhereQb, check, keep_first};

/// DELETE query builder.
///
/// Deleting without any WHERE clause is refused unless the caller passes
/// `confirm_delete_all = true` to [`DeleteQb::execute`].
#[derive(Clone, Debug)]
pub struct DeleteQb {
    table: Option<Ident>,
    wheres: WhereList,
    limit: Option<u64>,
    build_error: Option<String>,
}

impl DeleteQb {
    /// Create a new DELETE query builder.
    pub fn new(table: &str) -> Self {
        let mut qb = Self {
            table: None,
            wheres: WhereList::new(),
            limit: None,
            build_error: None,
        };
        match Ident::parse(table) {
            Ok(t) => qb.table = Some(t),
            Err(e) => keep_first(&mut qb.build_error, e),
        }
        qb
    }

    /// Delete at most `n` matching rows.
    ///
    /// PostgreSQL has no `DELETE ... LIMIT`, so the limit is applied to a `ctid`
    /// subquery over the same table and WHERE clauses.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn has_where(&self) -> bool {
        !self.wheres.is_empty()
    }

    /// Build the DELETE statement.
    ///
    /// Fails with [`OrmError::Validation`] when there is no WHERE clause and
    /// `confirm_delete_all` is false.
    pub fn build(&self, confirm_delete_all: bool) -> OrmResult<Statement> {
        check(&self.build_error)?;
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| OrmError::validation("DELETE requires a table"))?;
        if self.wheres.is_empty() && !confirm_delete_all {
            return Err(OrmError::validation(format!(
                "Refusing to DELETE FROM {table} without a WHERE clause; \
                 pass confirm_delete_all = true to delete every row"
            )));
        }

        let mut stmt = Statement::new("DELETE FROM ");
        stmt.push_ident(table);
        match self.limit {
            None => self.wheres.append_to(&mut stmt),
            Some(n) => {
                stmt.push(" WHERE ctid IN (SELECT ctid FROM ").push_ident(table);
                self.wheres.append_to(&mut stmt);
                stmt.push(&format!(" LIMIT {n})"));
            }
        }
        Ok(stmt)
    }

    /// Get the built SQL string (for debugging), as if deletion were confirmed.
    pub fn to_sql(&self) -> String {
        self.build(true)
            .map(|stmt| stmt.sql().to_string())
            .unwrap_or_default()
    }

    /// Execute and return the number of deleted rows.
    pub async fn execute<P: ConnectionPool>(
        &self,
        db: &Db<P>,
        confirm_delete_all: bool,
    ) -> OrmResult<u64> {
        let stmt = self.build(confirm_delete_all)?;
        if self.wheres.is_empty() {
            tracing::warn!(
                target: "lazyorm.builder",
                table = %self.table.as_ref().map(Ident::to_sql).unwrap_or_default(),
                limit = ?self.limit,
                "confirmed DELETE without WHERE clause"
            );
        }
        db.execute(&stmt).await
    }
}

impl WhereQb for DeleteQb {
    fn where_list_mut(&mut self) -> &mut WhereList {
        &mut self.wheres
    }

    fn record_error(&mut self, err: OrmError) {
        keep_first(&mut self.build_error, err);
    }
}
