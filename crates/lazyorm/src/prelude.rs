//! Common imports.
//!
//! ```ignore
//! use lazyorm::prelude::*;
//! ```

pub use crate::qb::{self, Order, WhereQb};
pub use crate::{
    BulkLoader, Db, FromValue, LoadOptions, MappedRow, OrmError, OrmResult, Record, ToValues,
    Value, fetch, insert_records,
};

#[cfg(feature = "pool")]
pub use crate::{PoolConfig, create_pool, create_pool_from_url};
