//! Trait definitions for query builders.

use crate::clause::{Clause, Op, WhereList};
use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// WHERE accumulation shared by the SELECT, UPDATE and DELETE builders.
///
/// Every method validates its column and operator immediately. A failure does not
/// panic or return early: the builder remembers the first error and reports it as
/// [`OrmError::Validation`] when it is built or executed, before any I/O.
pub trait WhereQb: Sized {
    #[doc(hidden)]
    fn where_list_mut(&mut self) -> &mut WhereList;

    #[doc(hidden)]
    fn record_error(&mut self, err: OrmError);

    /// Add a prebuilt clause (or the error that building it produced).
    fn filter(mut self, clause: OrmResult<Clause>) -> Self {
        match clause {
            Ok(clause) => self.where_list_mut().push(clause),
            Err(e) => self.record_error(e),
        }
        self
    }

    /// Add WHERE: `column <op> value`, with `op` taken from the operator whitelist.
    ///
    /// `IN` / `NOT IN` need a list; use [`WhereQb::where_in_op`] for those.
    fn where_op<V: Into<Value>>(self, column: &str, op: &str, value: V) -> Self {
        let clause = Op::parse(op).and_then(|op| Clause::compare(column, op, value));
        self.filter(clause)
    }

    /// Add WHERE: `column IN (...)` / `column NOT IN (...)` by operator string.
    fn where_in_op<V, I>(self, column: &str, op: &str, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        let clause = Op::parse(op).and_then(|op| Clause::list(column, op, values));
        self.filter(clause)
    }

    /// Add WHERE: column = value
    fn eq<V: Into<Value>>(self, column: &str, value: V) -> Self {
        self.filter(Clause::compare(column, Op::Eq, value))
    }

    /// Add WHERE: column != value
    fn ne<V: Into<Value>>(self, column: &str, value: V) -> Self {
        self.filter(Clause::compare(column, Op::Ne, value))
    }

    /// Add WHERE: column > value
    fn gt<V: Into<Value>>(self, column: &str, value: V) -> Self {
        self.filter(Clause::compare(column, Op::Gt, value))
    }

    /// Add WHERE: column >= value
    fn gte<V: Into<Value>>(self, column: &str, value: V) -> Self {
        self.filter(Clause::compare(column, Op::Gte, value))
    }

    /// Add WHERE: column < value
    fn lt<V: Into<Value>>(self, column: &str, value: V) -> Self {
        self.filter(Clause::compare(column, Op::Lt, value))
    }

    /// Add WHERE: column <= value
    fn lte<V: Into<Value>>(self, column: &str, value: V) -> Self {
        self.filter(Clause::compare(column, Op::Lte, value))
    }

    /// Add WHERE: column LIKE pattern
    fn like<V: Into<Value>>(self, column: &str, pattern: V) -> Self {
        self.filter(Clause::compare(column, Op::Like, pattern))
    }

    /// Add WHERE: column IN (values...). An empty list is a validation error.
    fn in_list<V, I>(self, column: &str, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        self.filter(Clause::list(column, Op::In, values))
    }

    /// Add WHERE: column NOT IN (values...). An empty list is a validation error.
    fn not_in<V, I>(self, column: &str, values: I) -> Self
    where
        V: Into<Value>,
        I: IntoIterator<Item = V>,
    {
        self.filter(Clause::list(column, Op::NotIn, values))
    }
}

/// Keep the first error; builders report one problem at a time.
pub(crate) fn keep_first(slot: &mut Option<String>, err: OrmError) {
    if slot.is_none() {
        *slot = Some(match err {
            OrmError::Validation(message) => message,
            other => other.to_string(),
        });
    }
}

pub(crate) fn check(slot: &Option<String>) -> OrmResult<()> {
    match slot {
        Some(message) => Err(OrmError::Validation(message.clone())),
        None => Ok(()),
    }
}
