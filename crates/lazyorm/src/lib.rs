//! # lazyorm
//!
//! A lazy-loading PostgreSQL data-access layer.
//!
//! ## Features
//!
//! - **Parameterized only**: values always travel as `$n` binds; identifiers and
//!   operators are whitelisted before they reach SQL text
//! - **Fluent builders**: SELECT / UPDATE / DELETE / INSERT accumulate clauses and run
//!   nothing until awaited
//! - **Typed records**: rows map positionally onto a [`Record`] field table, written by
//!   hand or with `#[derive(Record)]`
//! - **Result cache**: opt-in, keyed by model, canonical SQL and parameters, with
//!   explicit invalidation
//! - **CSV bulk loads**: schema inference by sampling, table creation, chunked INSERTs
//! - **Safe defaults**: DELETE without WHERE needs explicit confirmation, UPDATE
//!   requires SET
//!
//! ## Quick start
//!
//! ```ignore
//! use lazyorm::prelude::*;
//!
//! #[derive(Debug, Clone, lazyorm::Record)]
//! #[orm(table = "users")]
//! struct User {
//!     id: i64,
//!     name: String,
//!     age: Option<i64>,
//! }
//!
//! let db = Db::new(create_pool(&PoolConfig::from_env()?)?);
//!
//! let adults = qb::select::<User>()
//!     .gt("age", 25)
//!     .order_by_asc("name")
//!     .fetch_all(&db)
//!     .await?;
//!
//! let n = qb::select::<User>().gt("age", 25).count(&db).await?;
//!
//! qb::update("users").set("age", 31).eq("id", 1).execute(&db).await?;
//! qb::delete("users").eq("id", 1).execute(&db, false).await?;
//! ```

pub mod bulk;
pub mod cache;
pub mod clause;
pub mod client;
pub mod date;
pub mod db;
pub mod error;
pub mod executor;
pub mod fetch;
pub mod ident;
pub mod prelude;
pub mod qb;
pub mod row;
pub mod value;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(test)]
mod testing;

pub use bulk::{BulkLoader, LoadError, LoadOptions, LoadReport, insert_records};
pub use cache::{CacheKey, CacheStats, QueryCache};
pub use clause::{Clause, Op, SetList, Statement, WhereList, validate_operator};
pub use client::{Connection, ConnectionPool};
pub use date::parse_date;
pub use db::Db;
pub use error::{OrmError, OrmResult};
pub use executor::{ExecOutcome, QueryType};
pub use fetch::{Fetch, fetch};
pub use ident::{Ident, IntoIdent, validate_identifier};
pub use row::{Field, FieldType, MappedRow, RawRow, Record, ToValues, map_row, map_rows};
pub use value::{FromValue, Value};

pub use qb::{DeleteQb, InsertQb, Order, SelectQb, UpdateQb, WhereQb};

#[cfg(feature = "pool")]
pub use pool::{PoolConfig, create_pool, create_pool_from_url};

#[cfg(feature = "derive")]
pub use lazyorm_derive::Record;
