//! Process-local result cache.
//!
//! A [`QueryCache`] maps `(model, canonical SQL, parameters)` to a materialized result.
//! It is an explicit service object: construct one, share it behind an `Arc`, and pass
//! it to whatever needs it ([`crate::Db`] does this for builders).
//!
//! - Each key owns a `tokio::sync::OnceCell`, so concurrent callers asking for the same
//!   key run the computation once; the others wait for its result.
//! - A failed computation leaves the key empty and the error goes to the caller.
//! - Entries have no TTL or size bound; callers invalidate explicitly.

use crate::error::OrmResult;
use crate::value::Value;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;
use tokio::sync::OnceCell;

/// Identity of a cacheable result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    model: String,
    sql: String,
    params: Vec<Value>,
}

impl CacheKey {
    /// Build a key; `sql` is canonicalized with [`canonical_sql`].
    pub fn new(model: impl Into<String>, sql: &str, params: &[Value]) -> Self {
        Self {
            model: model.into(),
            sql: canonical_sql(sql),
            params: params.to_vec(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }
}

/// Collapse whitespace runs outside quoted text and trim the ends.
///
/// String literals, quoted identifiers and dollar-quoted bodies are copied verbatim.
pub fn canonical_sql(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql.trim();
    let mut pending_space = false;
    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            pending_space = true;
            rest = &rest[c.len_utf8()..];
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        let len = match c {
            '\'' | '"' => quoted_len(rest, c),
            '$' => dollar_quoted_len(rest).unwrap_or(1),
            _ => c.len_utf8(),
        };
        out.push_str(&rest[..len]);
        rest = &rest[len..];
    }
    out
}

/// Byte length of the quoted run at the start of `s`, closing quote included.
/// A doubled quote closes one run and opens the next.
fn quoted_len(s: &str, quote: char) -> usize {
    s[1..].find(quote).map_or(s.len(), |i| i + 2)
}

/// Byte length of a `$tag$ ... $tag$` body at the start of `s`. `None` for `$1` and the like.
fn dollar_quoted_len(s: &str) -> Option<usize> {
    let tag_len = s[1..].find('$')? + 2;
    let tag = &s[..tag_len];
    let name = &tag[1..tag_len - 1];
    let valid = name
        .chars()
        .next()
        .is_none_or(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if !valid {
        return None;
    }
    Some(
        s[tag_len..]
            .find(tag)
            .map_or(s.len(), |i| tag_len + i + tag_len),
    )
}

#[derive(Clone)]
struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    created_at: Instant,
}

type Slot = Arc<OnceCell<CacheEntry>>;

/// Counters reported by [`QueryCache::stats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Default)]
pub struct QueryCache {
    slots: Mutex<HashMap<CacheKey, Slot>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("stats", &self.stats())
            .finish()
    }
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-updated: every
    // mutation is a single insert/remove/retain call.
    fn slots(&self) -> MutexGuard<'_, HashMap<CacheKey, Slot>> {
        self.slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Return the cached result for `key`, or run `compute`, store and return its result.
    pub async fn get_or_compute<T, F, Fut>(&self, key: CacheKey, compute: F) -> OrmResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = OrmResult<T>>,
    {
        let slot = Arc::clone(self.slots().entry(key.clone()).or_default());

        if let Some(entry) = slot.get() {
            match Arc::clone(&entry.value).downcast::<T>() {
                Ok(value) => {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(target: "lazyorm.cache", model = key.model(), "cache hit");
                    return Ok(value);
                }
                // Same key cached under another Rust type: recompute and replace.
                Err(_) => return self.replace(key, compute).await,
            }
        }

        let mut computed = false;
        let result = slot
            .get_or_try_init(|| {
                computed = true;
                let fut = compute();
                async move { fut.await.map(CacheEntry::new) }
            })
            .await;

        match result {
            Ok(entry) => {
                if computed {
                    self.misses.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(target: "lazyorm.cache", model = key.model(), "cache miss");
                } else {
                    self.hits.fetch_add(1, Ordering::Relaxed);
                    tracing::debug!(target: "lazyorm.cache", model = key.model(), "cache hit after wait");
                }
                Arc::clone(&entry.value)
                    .downcast::<T>()
                    .map_err(|_| type_conflict(&key))
            }
            Err(e) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                self.discard_empty(&key, &slot);
                Err(e)
            }
        }
    }

    async fn replace<T, F, Fut>(&self, key: CacheKey, compute: F) -> OrmResult<Arc<T>>
    where
        T: Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = OrmResult<T>>,
    {
        self.misses.fetch_add(1, Ordering::Relaxed);
        let value = Arc::new(compute().await?);
        let entry = CacheEntry {
            value: Arc::clone(&value) as Arc<dyn Any + Send + Sync>,
            created_at: Instant::now(),
        };
        self.slots()
            .insert(key, Arc::new(OnceCell::new_with(Some(entry))));
        Ok(value)
    }

    fn discard_empty(&self, key: &CacheKey, slot: &Slot) {
        let mut slots = self.slots();
        if let Some(current) = slots.get(key) {
            if Arc::ptr_eq(current, slot) && !current.initialized() {
                slots.remove(key);
            }
        }
    }

    /// Drop every entry (`None`) or only the entries of one model.
    ///
    /// Returns the number of entries removed. Runs under the map lock, so readers see
    /// the cache either before or after the whole invalidation.
    pub fn invalidate(&self, model: Option<&str>) -> usize {
        let mut slots = self.slots();
        let before = slots.len();
        match model {
            None => slots.clear(),
            Some(name) => slots.retain(|key, _| key.model != name),
        }
        let removed = before - slots.len();
        drop(slots);
        tracing::info!(
            target: "lazyorm.cache",
            model = model.unwrap_or("*"),
            removed,
            "cache invalidated"
        );
        removed
    }

    /// Whether a completed entry exists for `key`.
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.slots().get(key).is_some_and(|slot| slot.initialized())
    }

    /// When the entry for `key` was stored.
    pub fn created_at(&self, key: &CacheKey) -> Option<Instant> {
        self.slots()
            .get(key)
            .and_then(|slot| slot.get().map(|entry| entry.created_at))
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.slots().values().filter(|s| s.initialized()).count(),
        }
    }
}

impl CacheEntry {
    fn new<T: Send + Sync + 'static>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            created_at: Instant::now(),
        }
    }
}

fn type_conflict(key: &CacheKey) -> crate::error::OrmError {
    crate::error::OrmError::mapping(
        key.model(),
        "cached result has a different type than requested",
    )
}
