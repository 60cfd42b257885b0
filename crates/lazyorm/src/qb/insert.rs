//! Multi-row INSERT query builder.

use crate::clause::{MAX_BIND_PARAMS, Statement};
use crate::client::ConnectionPool;
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::ident::Ident;
use crate::qb::traits::{check, keep_first};
use crate::row::{Record, ToValues};
use crate::value::Value;

/// `INSERT INTO t (a, b) VALUES ($1, $2), ($3, $4), ...`
#[derive(Clone, Debug)]
pub struct InsertQb {
    table: Option<Ident>,
    columns: Vec<Ident>,
    rows: Vec<Vec<Value>>,
    build_error: Option<String>,
}

impl InsertQb {
    /// Create a new INSERT query builder.
    pub fn new(table: &str) -> Self {
        let mut qb = Self {
            table: None,
            columns: Vec::new(),
            rows: Vec::new(),
            build_error: None,
        };
        match Ident::parse(table) {
            Ok(t) => qb.table = Some(t),
            Err(e) => keep_first(&mut qb.build_error, e),
        }
        qb
    }

    /// INSERT into `table` using `M`'s declared fields as the column list.
    pub fn for_record<M: Record>(table: &str) -> Self {
        Self::new(table).columns(&M::column_names())
    }

    /// Set the column list. Every row must have exactly this many values.
    pub fn columns(mut self, columns: &[&str]) -> Self {
        match columns
            .iter()
            .map(|c| Ident::parse(c))
            .collect::<OrmResult<Vec<_>>>()
        {
            Ok(cols) => self.columns = cols,
            Err(e) => keep_first(&mut self.build_error, e),
        }
        self
    }

    /// Append one row of values.
    pub fn values<V, I>(mut self, row: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        self.push_row(row.into_iter().map(Into::into).collect());
        self
    }

    /// Append one row per record, in declared field order.
    pub fn records<M: ToValues>(mut self, records: &[M]) -> Self {
        for record in records {
            self.push_row(record.to_values());
        }
        self
    }

    fn push_row(&mut self, row: Vec<Value>) {
        if row.len() != self.columns.len() {
            keep_first(
                &mut self.build_error,
                OrmError::validation(format!(
                    "INSERT row {} has {} values for {} columns",
                    self.rows.len() + 1,
                    row.len(),
                    self.columns.len()
                )),
            );
            return;
        }
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Build the INSERT statement.
    pub fn build(&self) -> OrmResult<Statement> {
        check(&self.build_error)?;
        let table = self
            .table
            .as_ref()
            .ok_or_else(|| OrmError::validation("INSERT requires a table"))?;
        if self.columns.is_empty() {
            return Err(OrmError::validation(format!(
                "INSERT INTO {table} requires at least one column"
            )));
        }
        if self.rows.is_empty() {
            return Err(OrmError::validation(format!(
                "INSERT INTO {table} requires at least one row"
            )));
        }
        let total = self.rows.len() * self.columns.len();
        if total > MAX_BIND_PARAMS {
            return Err(OrmError::validation(format!(
                "INSERT INTO {table} binds {total} parameters; the limit is {MAX_BIND_PARAMS}"
            )));
        }

        let mut stmt = Statement::new("INSERT INTO ");
        stmt.push_ident(table).push(" (");
        for (i, col) in self.columns.iter().enumerate() {
            if i > 0 {
                stmt.push(", ");
            }
            stmt.push_ident(col);
        }
        stmt.push(") VALUES ");
        for (i, row) in self.rows.iter().enumerate() {
            if i > 0 {
                stmt.push(", ");
            }
            stmt.push("(").push_bind_list(row.iter().cloned()).push(")");
        }
        Ok(stmt)
    }

    /// Get the built SQL string (for debugging).
    pub fn to_sql(&self) -> String {
        self.build()
            .map(|stmt| stmt.sql().to_string())
            .unwrap_or_default()
    }

    /// Execute and return the number of inserted rows.
    pub async fn execute<P: ConnectionPool>(&self, db: &Db<P>) -> OrmResult<u64> {
        let stmt = self.build()?;
        db.execute(&stmt).await
    }
}
