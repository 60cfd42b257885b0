//! Fluent statement builders.
//!
//! Builders only accumulate validated state; nothing touches the database until an
//! execution method is awaited with a [`crate::Db`]. Validation problems found while
//! chaining are held and reported as [`crate::OrmError::Validation`] at build or
//! execution time, before a connection is borrowed.
//!
//! # Usage
//!
//! ```ignore
//! use lazyorm::prelude::*;
//!
//! // SELECT
//! let adults = qb::select::<User>()
//!     .gt("age", 25)
//!     .order_by_desc("age")
//!     .limit(20)
//!     .fetch_all(&db)
//!     .await?;
//!
//! // UPDATE
//! qb::update("users")
//!     .set("status", "inactive")
//!     .eq("id", user_id)
//!     .execute(&db)
//!     .await?;
//!
//! // DELETE (no WHERE needs explicit confirmation)
//! qb::delete("users")
//!     .eq("id", user_id)
//!     .execute(&db, false)
//!     .await?;
//! ```

mod delete;
mod insert;
mod select;
mod traits;
mod update;

pub use delete::DeleteQb;
pub use insert::InsertQb;
pub use select::{Order, SelectQb};
pub use traits::WhereQb;
pub use update::UpdateQb;

use crate::row::Record;

/// Create a SELECT builder for record type `M`.
pub fn select<M: Record>() -> SelectQb<M> {
    SelectQb::new()
}

/// Create an UPDATE builder for `table`.
pub fn update(table: &str) -> UpdateQb {
    UpdateQb::new(table)
}

/// Create a DELETE builder for `table`.
pub fn delete(table: &str) -> DeleteQb {
    DeleteQb::new(table)
}

/// Create an INSERT builder for `table`.
pub fn insert(table: &str) -> InsertQb {
    InsertQb::new(table)
}

#[cfg(test)]
mod tests;
