//! CSV ingestion and chunked record inserts.
//!
//! A load reads the header, samples a bounded prefix of rows to infer column types,
//! prepares the target table, then streams the whole source through parameterized
//! multi-row INSERTs of `chunk_size` rows each.
//!
//! Chunks are committed independently. When a chunk fails the load stops and the
//! error carries the number of rows already committed; earlier chunks stay in the
//! table.
//!
//! # Example
//! ```ignore
//! use lazyorm::bulk::{BulkLoader, LoadOptions};
//!
//! let report = BulkLoader::new(&db, "staging_sales")
//!     .options(LoadOptions::new().chunk_size(500).drop_if_exists(true))
//!     .load_path("sales.csv")
//!     .await?;
//! println!("{} rows in {} batches", report.rows_inserted, report.batches);
//! ```

mod schema;

pub use schema::{ColumnType, TableSchema, normalize_header};

use std::io;
use std::path::Path;

use csv::StringRecord;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::clause::MAX_BIND_PARAMS;
use crate::client::ConnectionPool;
use crate::db::Db;
use crate::error::{OrmError, OrmResult};
use crate::executor::truncate_sql;
use crate::ident::Ident;
use crate::qb::InsertQb;
use crate::row::{Record, ToValues};
use crate::value::{FromValue, Value};

/// Settings for one CSV load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Rows per INSERT statement.
    pub chunk_size: usize,
    /// Data rows read before the column types are fixed.
    pub sample_size: usize,
    pub drop_if_exists: bool,
    pub create_if_not_exists: bool,
    /// Prepend a `{table}_id` identity primary key when the table is created.
    pub auto_increment: bool,
    pub log_create_table_query: bool,
    pub log_insert_query: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            sample_size: 100,
            drop_if_exists: false,
            create_if_not_exists: true,
            auto_increment: false,
            log_create_table_query: false,
            log_insert_query: false,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n;
        self
    }

    pub fn sample_size(mut self, n: usize) -> Self {
        self.sample_size = n;
        self
    }

    pub fn drop_if_exists(mut self, yes: bool) -> Self {
        self.drop_if_exists = yes;
        self
    }

    pub fn create_if_not_exists(mut self, yes: bool) -> Self {
        self.create_if_not_exists = yes;
        self
    }

    pub fn auto_increment(mut self, yes: bool) -> Self {
        self.auto_increment = yes;
        self
    }

    pub fn log_create_table_query(mut self, yes: bool) -> Self {
        self.log_create_table_query = yes;
        self
    }

    pub fn log_insert_query(mut self, yes: bool) -> Self {
        self.log_insert_query = yes;
        self
    }

    pub fn validate(&self) -> OrmResult<()> {
        if self.chunk_size == 0 {
            return Err(OrmError::validation("chunk_size must be greater than 0"));
        }
        if self.sample_size == 0 {
            return Err(OrmError::configuration("sample_size must be greater than 0"));
        }
        Ok(())
    }
}

/// Reject chunks whose INSERT would bind more parameters than PostgreSQL accepts.
fn check_bind_limit(chunk_size: usize, columns: usize) -> OrmResult<()> {
    let total = chunk_size.saturating_mul(columns);
    if total > MAX_BIND_PARAMS {
        return Err(OrmError::validation(format!(
            "chunk_size {chunk_size} x {columns} columns binds {total} parameters; \
             the limit is {MAX_BIND_PARAMS}"
        )));
    }
    Ok(())
}

/// Outcome of a successful load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub rows_inserted: u64,
    /// INSERT statements executed.
    pub batches: usize,
}

impl LoadReport {
    fn fail(&self, error: OrmError) -> LoadError {
        LoadError {
            rows_committed: self.rows_inserted,
            error,
        }
    }
}

/// A load that stopped part-way.
#[derive(Debug, Error)]
#[error("bulk load stopped after {rows_committed} committed rows: {error}")]
pub struct LoadError {
    /// Rows inserted by chunks that completed before the failure.
    pub rows_committed: u64,
    #[source]
    pub error: OrmError,
}

impl From<OrmError> for LoadError {
    fn from(error: OrmError) -> Self {
        Self {
            rows_committed: 0,
            error,
        }
    }
}

impl From<LoadError> for OrmError {
    fn from(err: LoadError) -> Self {
        err.error
    }
}

/// Loads CSV data into one table.
#[derive(Debug)]
pub struct BulkLoader<'a, P> {
    db: &'a Db<P>,
    table: String,
    options: LoadOptions,
}

impl<'a, P: ConnectionPool> BulkLoader<'a, P> {
    pub fn new(db: &'a Db<P>, table: &str) -> Self {
        Self {
            db,
            table: table.to_string(),
            options: LoadOptions::default(),
        }
    }

    pub fn options(mut self, options: LoadOptions) -> Self {
        self.options = options;
        self
    }

    /// Load a CSV file. The file is read on Tokio's blocking pool.
    pub async fn load_path(&self, path: impl AsRef<Path>) -> Result<LoadReport, LoadError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            OrmError::validation(format!("cannot open CSV file {}: {e}", path.display()))
        })?;
        self.load_reader(io::BufReader::new(file)).await
    }

    /// Load CSV data from any reader. The first record is the header.
    ///
    /// Parsing runs on Tokio's blocking pool and hands records over one chunk at a
    /// time, so a slow or large source never stalls the async workers.
    pub async fn load_reader<R>(&self, reader: R) -> Result<LoadReport, LoadError>
    where
        R: io::Read + Send + 'static,
    {
        self.options.validate()?;
        let table = Ident::parse(&self.table)?;

        let (sampled_tx, sampled_rx) = oneshot::channel();
        let (chunk_tx, mut chunk_rx) = mpsc::channel(READ_AHEAD);
        let options = self.options.clone();
        let reader_task = tokio::task::spawn_blocking(move || {
            read_source(reader, &options, sampled_tx, chunk_tx)
        });

        let Sampled { mut schema, rows } = match sampled_rx.await {
            Ok(sampled) => sampled?,
            Err(_) => return Err(reader_stopped(reader_task.await).into()),
        };
        if rows == 0 {
            tracing::warn!(target: "lazyorm.bulk", table = %table, "CSV source has no data rows; nothing to insert");
            return Ok(LoadReport::default());
        }
        if self.options.auto_increment {
            schema.identity_column(&table)?;
        }

        self.prepare_table(&table, &mut schema).await?;

        let columns = schema.column_names();
        let mut report = LoadReport::default();
        while let Some(chunk) = chunk_rx.recv().await {
            let records = chunk.map_err(|e| report.fail(e))?;
            let rows = records
                .iter()
                .map(|record| {
                    let line = record.position().map_or(0, |p| p.line());
                    schema.values(record.iter(), line)
                })
                .collect::<OrmResult<Vec<_>>>()
                .map_err(|e| report.fail(e))?;
            self.flush(&table, &columns, rows, &mut report).await?;
        }
        reader_task
            .await
            .map_err(|e| report.fail(reader_stopped(Err(e))))?;

        tracing::info!(
            target: "lazyorm.bulk",
            table = %table,
            rows = report.rows_inserted,
            batches = report.batches,
            "bulk load finished"
        );
        Ok(report)
    }

    async fn prepare_table(&self, table: &Ident, schema: &mut TableSchema) -> OrmResult<()> {
        if self.options.drop_if_exists {
            self.db.execute(&schema::drop_table(table)).await?;
            tracing::info!(target: "lazyorm.bulk", table = %table, "table dropped");
        } else if self.table_exists(table).await? {
            let existing = self.existing_columns(table).await?;
            schema.adopt(existing.iter().map(|(n, t)| (n.as_str(), t.as_str())));
            tracing::info!(
                target: "lazyorm.bulk",
                table = %table,
                columns = existing.len(),
                "appending to existing table"
            );
            return Ok(());
        } else if !self.options.create_if_not_exists {
            return Err(OrmError::query(format!(
                "table {table} does not exist and create_if_not_exists is false"
            )));
        }

        let ddl = schema.create_table(table, self.options.auto_increment);
        if self.options.log_create_table_query {
            tracing::info!(target: "lazyorm.bulk", sql = %truncate_sql(ddl.sql()), "creating table");
        } else {
            tracing::debug!(target: "lazyorm.bulk", sql = %truncate_sql(ddl.sql()), "creating table");
        }
        self.db.execute(&ddl).await?;
        tracing::info!(target: "lazyorm.bulk", table = %table, columns = schema.len(), "table created");
        Ok(())
    }

    async fn table_exists(&self, table: &Ident) -> OrmResult<bool> {
        let rows = self.db.query_rows(&schema::table_exists(table)).await?;
        match rows.into_iter().next().and_then(|row| row.into_iter().next()) {
            Some(value) => bool::from_value(value).map_err(|m| OrmError::mapping("exists", m)),
            None => Ok(false),
        }
    }

    async fn existing_columns(&self, table: &Ident) -> OrmResult<Vec<(String, String)>> {
        let rows = self.db.query_rows(&schema::table_columns(table)).await?;
        rows.into_iter()
            .map(|row| {
                let mut cells = row.into_iter();
                let mut text = |field: &str| {
                    String::from_value(cells.next().unwrap_or(Value::Null))
                        .map_err(|m| OrmError::mapping(field, m))
                };
                Ok((text("column_name")?, text("data_type")?))
            })
            .collect()
    }

    async fn flush(
        &self,
        table: &Ident,
        columns: &[&str],
        rows: Vec<Vec<Value>>,
        report: &mut LoadReport,
    ) -> Result<(), LoadError> {
        let row_count = rows.len();
        let stmt = rows
            .into_iter()
            .fold(InsertQb::new(&table.to_sql()).columns(columns), |qb, row| {
                qb.values(row)
            })
            .build()
            .map_err(|e| report.fail(e))?;

        if self.options.log_insert_query {
            tracing::info!(target: "lazyorm.bulk", sql = %truncate_sql(stmt.sql()), rows = row_count, "inserting chunk");
        } else {
            tracing::debug!(target: "lazyorm.bulk", table = %table, rows = row_count, "inserting chunk");
        }
        let affected = self.db.execute(&stmt).await.map_err(|e| {
            tracing::error!(
                target: "lazyorm.bulk",
                table = %table,
                rows_committed = report.rows_inserted,
                error = %e,
                "chunk insert failed"
            );
            report.fail(e)
        })?;
        report.rows_inserted += affected;
        report.batches += 1;
        Ok(())
    }
}

/// Chunks parsed ahead of the inserts.
const READ_AHEAD: usize = 2;

type Chunk = OrmResult<Vec<StringRecord>>;

/// Header and sample outcome, sent before any record chunk.
struct Sampled {
    schema: TableSchema,
    rows: usize,
}

/// Blocking half of a load: read the header, infer types from the sample, then send
/// every record (sample first) in chunks of `chunk_size`. Stops when the receiver is gone.
fn read_source<R: io::Read>(
    reader: R,
    options: &LoadOptions,
    sampled_tx: oneshot::Sender<OrmResult<Sampled>>,
    chunk_tx: mpsc::Sender<Chunk>,
) {
    let mut csv = csv::Reader::from_reader(reader);
    let (schema, sample) = match sample_source(&mut csv, options) {
        Ok(sampled) => sampled,
        Err(e) => {
            let _ = sampled_tx.send(Err(e));
            return;
        }
    };
    let rows = sample.len();
    if sampled_tx.send(Ok(Sampled { schema, rows })).is_err() || rows == 0 {
        return;
    }

    let mut chunk = Vec::with_capacity(options.chunk_size);
    for record in sample.into_iter().map(Ok).chain(csv.into_records()) {
        match record {
            Ok(record) => chunk.push(record),
            Err(e) => {
                let _ = chunk_tx.blocking_send(Err(e.into()));
                return;
            }
        }
        if chunk.len() == options.chunk_size {
            let full = std::mem::replace(&mut chunk, Vec::with_capacity(options.chunk_size));
            if chunk_tx.blocking_send(Ok(full)).is_err() {
                return;
            }
        }
    }
    if !chunk.is_empty() {
        let _ = chunk_tx.blocking_send(Ok(chunk));
    }
}

fn sample_source<R: io::Read>(
    csv: &mut csv::Reader<R>,
    options: &LoadOptions,
) -> OrmResult<(TableSchema, Vec<StringRecord>)> {
    let headers = csv.headers()?.clone();
    if headers.iter().all(|h| h.trim().is_empty()) {
        return Err(OrmError::validation("CSV source has no header row"));
    }
    let mut schema = TableSchema::from_headers(headers.iter())?;
    check_bind_limit(options.chunk_size, schema.len())?;

    let mut sample = Vec::with_capacity(options.sample_size.min(1024));
    let mut record = StringRecord::new();
    while sample.len() < options.sample_size && csv.read_record(&mut record)? {
        schema.observe(record.iter());
        sample.push(record.clone());
    }
    Ok((schema, sample))
}

fn reader_stopped(joined: Result<(), tokio::task::JoinError>) -> OrmError {
    match joined {
        Err(e) => OrmError::Csv(format!("CSV reader stopped: {e}")),
        Ok(()) => OrmError::Csv("CSV reader stopped before reading the header".to_string()),
    }
}

/// Insert typed records in chunks of `chunk_size`, one multi-row INSERT per chunk.
///
/// Columns are `M`'s declared fields, in order.
pub async fn insert_records<P, M>(
    db: &Db<P>,
    table: &str,
    records: &[M],
    chunk_size: usize,
) -> Result<LoadReport, LoadError>
where
    P: ConnectionPool,
    M: Record + ToValues,
{
    if chunk_size == 0 {
        return Err(OrmError::validation("chunk_size must be greater than 0").into());
    }
    if records.is_empty() {
        return Err(OrmError::validation(format!("no records to insert into {table}")).into());
    }
    check_bind_limit(chunk_size, M::fields().len())?;
    Ident::parse(table)?;

    let mut report = LoadReport::default();
    for chunk in records.chunks(chunk_size) {
        let affected = InsertQb::for_record::<M>(table)
            .records(chunk)
            .execute(db)
            .await
            .map_err(|e| report.fail(e))?;
        report.rows_inserted += affected;
        report.batches += 1;
        tracing::debug!(target: "lazyorm.bulk", table, rows = chunk.len(), "records inserted");
    }
    tracing::info!(
        target: "lazyorm.bulk",
        table,
        rows = report.rows_inserted,
        batches = report.batches,
        "records inserted"
    );
    Ok(report)
}
