//! In-memory pool for unit tests.
//!
//! `ScriptedPool` hands out connections that answer from a queue of [`Reply`]s, record
//! every statement they receive, and count how many connections are currently borrowed.

use crate::client::{Connection, ConnectionPool};
use crate::error::{OrmError, OrmResult};
use crate::row::{Field, FieldType, MappedRow, RawRow, Record, ToValues};
use crate::value::Value;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Rows(Vec<RawRow>),
    Affected(u64),
    Error(String),
}

impl Reply {
    pub(crate) fn rows(rows: Vec<RawRow>) -> Self {
        Reply::Rows(rows)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AcquireMode {
    Ok,
    Exhausted,
    Unavailable,
}

#[derive(Debug)]
struct Inner {
    replies: Mutex<VecDeque<Reply>>,
    log: Mutex<Vec<(String, Vec<Value>)>>,
    outstanding: AtomicUsize,
    acquired: AtomicUsize,
    mode: AcquireMode,
    latency: Option<Duration>,
}

#[derive(Debug, Clone)]
pub(crate) struct ScriptedPool {
    inner: Arc<Inner>,
}

impl ScriptedPool {
    pub(crate) fn new() -> Self {
        Self::build(AcquireMode::Ok, None)
    }

    fn build(mode: AcquireMode, latency: Option<Duration>) -> Self {
        Self {
            inner: Arc::new(Inner {
                replies: Mutex::new(VecDeque::new()),
                log: Mutex::new(Vec::new()),
                outstanding: AtomicUsize::new(0),
                acquired: AtomicUsize::new(0),
                mode,
                latency,
            }),
        }
    }

    /// Every `acquire` times out.
    pub(crate) fn exhausted(self) -> Self {
        Self::build(AcquireMode::Exhausted, self.inner.latency)
    }

    /// Every `acquire` fails as if the server were unreachable.
    pub(crate) fn unavailable(self) -> Self {
        Self::build(AcquireMode::Unavailable, self.inner.latency)
    }

    /// Each statement sleeps this long before answering.
    pub(crate) fn with_latency(self, latency: Duration) -> Self {
        Self::build(self.inner.mode, Some(latency))
    }

    pub(crate) fn push(&self, reply: Reply) {
        self.inner
            .replies
            .lock()
            .expect("replies lock")
            .push_back(reply);
    }

    pub(crate) fn statements(&self) -> Vec<(String, Vec<Value>)> {
        self.inner.log.lock().expect("log lock").clone()
    }

    pub(crate) fn sql_log(&self) -> Vec<String> {
        self.statements().into_iter().map(|(sql, _)| sql).collect()
    }

    pub(crate) fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::SeqCst)
    }

    pub(crate) fn acquired(&self) -> usize {
        self.inner.acquired.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub(crate) struct ScriptedConn {
    inner: Arc<Inner>,
}

impl Drop for ScriptedConn {
    fn drop(&mut self) {
        self.inner.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ScriptedConn {
    async fn answer(&self, sql: &str, params: &[Value]) -> Option<Reply> {
        self.inner
            .log
            .lock()
            .expect("log lock")
            .push((sql.to_string(), params.to_vec()));
        if let Some(latency) = self.inner.latency {
            tokio::time::sleep(latency).await;
        }
        self.inner.replies.lock().expect("replies lock").pop_front()
    }
}

impl Connection for ScriptedConn {
    async fn query(&self, sql: &str, params: &[Value]) -> OrmResult<Vec<RawRow>> {
        match self.answer(sql, params).await {
            Some(Reply::Rows(rows)) => Ok(rows),
            Some(Reply::Affected(_)) | None => Ok(Vec::new()),
            Some(Reply::Error(message)) => Err(OrmError::query(message)),
        }
    }

    async fn execute(&self, sql: &str, params: &[Value]) -> OrmResult<u64> {
        match self.answer(sql, params).await {
            Some(Reply::Affected(n)) => Ok(n),
            Some(Reply::Rows(rows)) => Ok(rows.len() as u64),
            None => Ok(0),
            Some(Reply::Error(message)) => Err(OrmError::query(message)),
        }
    }
}

impl ConnectionPool for ScriptedPool {
    type Conn = ScriptedConn;

    async fn acquire(&self) -> OrmResult<ScriptedConn> {
        match self.inner.mode {
            AcquireMode::Exhausted => Err(OrmError::PoolExhausted(Duration::from_millis(10))),
            AcquireMode::Unavailable => Err(OrmError::Connection("connection refused".into())),
            AcquireMode::Ok => {
                self.inner.outstanding.fetch_add(1, Ordering::SeqCst);
                self.inner.acquired.fetch_add(1, Ordering::SeqCst);
                Ok(ScriptedConn {
                    inner: Arc::clone(&self.inner),
                })
            }
        }
    }
}

/// Hand-written record used across unit tests.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct User {
    pub id: i64,
    pub name: String,
    pub age: Option<i64>,
    pub joined: Option<NaiveDate>,
}

impl Record for User {
    const MODEL: &'static str = "User";
    const TABLE: &'static str = "users";

    fn fields() -> &'static [Field] {
        const FIELDS: &[Field] = &[
            Field::new(0, "id", FieldType::Int),
            Field::new(1, "name", FieldType::Text),
            Field::new(2, "age", FieldType::Int).nullable(),
            Field::new(3, "joined", FieldType::Date).nullable(),
        ];
        FIELDS
    }

    fn from_row(mut row: MappedRow) -> OrmResult<Self> {
        Ok(Self {
            id: row.take(0)?,
            name: row.take(1)?,
            age: row.take(2)?,
            joined: row.take(3)?,
        })
    }
}

impl ToValues for User {
    fn to_values(&self) -> Vec<Value> {
        vec![
            self.id.into(),
            self.name.as_str().into(),
            self.age.into(),
            self.joined.into(),
        ]
    }
}

pub(crate) fn user_row(id: i64, name: &str, age: Option<i64>) -> RawRow {
    vec![Value::Int(id), Value::Text(name.into()), age.into(), Value::Null]
}
