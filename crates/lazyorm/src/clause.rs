//! WHERE/SET clause assembly.
//!
//! Builders accumulate [`Clause`]s and SET entries; at execution time they are
//! rendered into a [`Statement`], which keeps SQL text and bound [`Value`]s side by
//! side and numbers `$n` placeholders as values are pushed. Values never reach the
//! SQL text, only identifiers that passed [`crate::ident`] validation do.

use crate::error::{OrmError, OrmResult};
use crate::ident::{Ident, IntoIdent};
use crate::value::Value;
use std::fmt;
use std::str::FromStr;

/// PostgreSQL accepts at most this many bind parameters in one statement.
pub const MAX_BIND_PARAMS: usize = 65_535;

/// Whitelisted comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Like,
    In,
    NotIn,
}

impl Op {
    pub const ALL: [Op; 9] = [
        Op::Eq,
        Op::Ne,
        Op::Gt,
        Op::Lt,
        Op::Gte,
        Op::Lte,
        Op::Like,
        Op::In,
        Op::NotIn,
    ];

    pub fn as_sql(self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "!=",
            Op::Gt => ">",
            Op::Lt => "<",
            Op::Gte => ">=",
            Op::Lte => "<=",
            Op::Like => "LIKE",
            Op::In => "IN",
            Op::NotIn => "NOT IN",
        }
    }

    /// `IN` and `NOT IN` take a list of values instead of a scalar.
    pub fn takes_list(self) -> bool {
        matches!(self, Op::In | Op::NotIn)
    }

    /// Parse an operator token. Keywords are case-insensitive and `NOT IN` may use
    /// any run of whitespace between its words.
    pub fn parse(op: &str) -> OrmResult<Self> {
        let normalized = op
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_ascii_uppercase();
        Op::ALL
            .into_iter()
            .find(|candidate| candidate.as_sql() == normalized)
            .ok_or_else(|| OrmError::validation(format!("Invalid operator '{op}'")))
    }
}

impl FromStr for Op {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Op::parse(s)
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Check an operator against the whitelist and return it unchanged.
pub fn validate_operator(op: &str) -> OrmResult<&str> {
    Op::parse(op).map(|_| op)
}

#[derive(Debug, Clone, PartialEq)]
enum ClauseValue {
    Single(Value),
    List(Vec<Value>),
}

/// A single `column <op> value` comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    column: Ident,
    op: Op,
    value: ClauseValue,
}

impl Clause {
    /// A scalar comparison. List operators are rejected here; use [`Clause::list`].
    pub fn compare(column: impl IntoIdent, op: Op, value: impl Into<Value>) -> OrmResult<Self> {
        let column = column.into_ident()?;
        if op.takes_list() {
            return Err(OrmError::validation(format!(
                "Operator {op} on '{column}' requires a list of values"
            )));
        }
        Ok(Self {
            column,
            op,
            value: ClauseValue::Single(value.into()),
        })
    }

    /// An `IN` / `NOT IN` comparison over a non-empty list.
    pub fn list<V>(column: impl IntoIdent, op: Op, values: impl IntoIterator<Item = V>) -> OrmResult<Self>
    where
        V: Into<Value>,
    {
        let column = column.into_ident()?;
        if !op.takes_list() {
            return Err(OrmError::validation(format!(
                "Operator {op} on '{column}' does not take a list"
            )));
        }
        let values: Vec<Value> = values.into_iter().map(Into::into).collect();
        if values.is_empty() {
            return Err(OrmError::validation(format!(
                "{op} on '{column}' requires at least one value"
            )));
        }
        Ok(Self {
            column,
            op,
            value: ClauseValue::List(values),
        })
    }

    pub fn column(&self) -> &Ident {
        &self.column
    }

    pub fn op(&self) -> Op {
        self.op
    }

    /// Number of placeholders this clause renders.
    pub fn param_count(&self) -> usize {
        match &self.value {
            ClauseValue::Single(_) => 1,
            ClauseValue::List(values) => values.len(),
        }
    }

    fn append_to(&self, stmt: &mut Statement) {
        stmt.push_ident(&self.column);
        stmt.push(" ");
        stmt.push(self.op.as_sql());
        match &self.value {
            ClauseValue::Single(v) => {
                stmt.push(" ");
                stmt.push_bind(v.clone());
            }
            ClauseValue::List(values) => {
                stmt.push(" (");
                stmt.push_bind_list(values.iter().cloned());
                stmt.push(")");
            }
        }
    }
}

/// WHERE clauses, joined with `AND` in the order they were added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WhereList {
    clauses: Vec<Clause>,
}

impl WhereList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, clause: Clause) {
        self.clauses.push(clause);
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    /// Append ` WHERE ...`; no-op when empty.
    pub fn append_to(&self, stmt: &mut Statement) {
        for (i, clause) in self.clauses.iter().enumerate() {
            stmt.push(if i == 0 { " WHERE " } else { " AND " });
            clause.append_to(stmt);
        }
    }
}

/// Ordered `column = value` assignments for UPDATE.
///
/// Setting a column twice replaces the earlier value but keeps its position.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetList {
    entries: Vec<(Ident, Value)>,
}

impl SetList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, column: impl IntoIdent, value: impl Into<Value>) -> OrmResult<()> {
        let column = column.into_ident()?;
        let value = value.into();
        match self.entries.iter_mut().find(|(c, _)| *c == column) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((column, value)),
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append ` SET a = $1, b = $2`.
    pub fn append_to(&self, stmt: &mut Statement) {
        for (i, (column, value)) in self.entries.iter().enumerate() {
            stmt.push(if i == 0 { " SET " } else { ", " });
            stmt.push_ident(column);
            stmt.push(" = ");
            stmt.push_bind(value.clone());
        }
    }
}

/// SQL text plus the parameters its `$n` placeholders refer to.
///
/// Placeholders are only ever produced by [`Statement::push_bind`], so the number of
/// placeholders always equals `params().len()`.
#[derive(Debug, Clone, Default, PartialEq)]
#[must_use]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    pub fn new(initial_sql: impl Into<String>) -> Self {
        Self {
            sql: initial_sql.into(),
            params: Vec::new(),
        }
    }

    /// Append raw SQL. Never pass caller-supplied text here.
    pub fn push(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    pub fn push_ident(&mut self, ident: &Ident) -> &mut Self {
        ident.write_sql(&mut self.sql);
        self
    }

    /// Append the next `$n` placeholder and bind `value` to it.
    pub fn push_bind(&mut self, value: impl Into<Value>) -> &mut Self {
        self.params.push(value.into());
        self.sql.push('$');
        self.sql.push_str(&self.params.len().to_string());
        self
    }

    /// Append comma-separated placeholders, one per value.
    pub fn push_bind_list<V: Into<Value>>(&mut self, values: impl IntoIterator<Item = V>) -> &mut Self {
        for (i, v) in values.into_iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.push_bind(v);
        }
        self
    }

    /// Bind parameters for caller-written SQL that already contains `$n` markers.
    pub(crate) fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<Value>) {
        (self.sql, self.params)
    }

    /// Count `$n` markers in the SQL text.
    pub fn placeholder_count(&self) -> usize {
        let bytes = self.sql.as_bytes();
        bytes
            .iter()
            .enumerate()
            .filter(|(i, b)| {
                **b == b'$' && bytes.get(i + 1).is_some_and(|next| next.is_ascii_digit())
            })
            .count()
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
