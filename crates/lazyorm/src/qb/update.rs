//! UPDATE query builder.

use crate::clause::{SetList, Statement, WhereList};
use crate::client::ConnectionPool;
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::qb::traits::{WhereQb, check, keep_first};
use crate::value::Value;

/// UPDATE query builder.
///
/// At least one SET column is required. An UPDATE without WHERE is allowed and
/// touches every row; it is logged as a warning on `lazyorm.builder`.
#[derive(Clone, Debug)]
pub struct UpdateQb {
    table: Option<Ident>,
    sets: SetList,
    wheres: WhereList,
    build_error: Option<String>,
}

impl UpdateQb {
    /// Create a new UPDATE query builder.
    pub fn new(table: &str) -> Self {
        let mut qb = Self {
            table: None,
            sets: SetList::new(),
            wheres: WhereList::new(),
            build_error: None,
        };
        match Ident::parse(table) {
            Ok(t) => qb.table = Some(t),
            Err(e) => keep_first(&mut qb.build_error, e),
        }
        qb
    }

    /// Add SET: column = value. Setting the same column again replaces its value.
    pub fn set<V: Into<Value>>(mut self, column: &str, value: V) -> Self {
        if let Err(e) = self.sets.set(column, value) {
            keep_first(&mut self.build_error, e);
        }
        self
    }

    /// Add several SET entries, in iteration order.
    pub fn set_many<'a, V, I>(self, entries: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = (&'a str, V)>,
    {
        entries
            .into_iter()
            .fold(self, |qb, (column, value)| qb.set(column, value))
    }

    pub fn has_where(&self) -> bool {
        !self.wheres.is_empty()
    }

    /// Build the UPDATE statement. SET placeholders come before WHERE placeholders.
    pub fn build(&self) -> OrmResult<Statement> {
        check(&self.build_error)?;
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| OrmError::validation("UPDATE requires a table"))?;
        if self.sets.is_empty() {
            return Err(OrmError::validation(format!(
                "UPDATE {table} requires at least one SET column"
            )));
        }
        let mut stmt = Statement::new("UPDATE ");
        stmt.push_ident(table);
        self.sets.append_to(&mut stmt);
        self.wheres.append_to(&mut stmt);
        Ok(stmt)
    }

    /// Get the built SQL string (for debugging).
    pub fn to_sql(&self) -> String {
        self.build()
            .map(|stmt| stmt.sql().to_string())
            .unwrap_or_default()
    }

    /// Execute and return the number of updated rows.
    pub async fn execute<P: ConnectionPool>(&self, db: &Db<P>) -> OrmResult<u64> {
        let stmt = self.build()?;
        if self.wheres.is_empty() {
            tracing::warn!(
                target: "lazyorm.builder",
                table = %self.table.as_ref().map(Ident::to_sql).unwrap_or_default(),
                "UPDATE without WHERE clause affects every row"
            );
        }
        db.execute(&stmt).await
    }
}

impl WhereQb for UpdateQb {
    fn where_list_mut(&mut self) -> &mut WhereList {
        &mut self.wheres
    }

    fn record_error(&mut self, err: OrmError) {
        keep_first(&mut self.build_error, err);
    }
}
