//! # Cache Module
//!
//! Request-scoped caching used by the Builder for point lookups (`find`) and
//! query results (`get`).
//!
//! ## Keys
//!
//! Keys are structured, never concatenated strings:
//!
//! - [`CacheKey::Lookup`]: `(model type, column, coerced value)` for `find`.
//! - [`CacheKey::Query`]: rendered SQL plus its bound arguments for `get`.
//!
//! ## Triggers
//!
//! An entry may be stored under a [`Trigger`]. Every write operation bumps
//! [`Trigger::WRITE`] through `set_last_occurrence`, and any entry stored
//! under that trigger before the bump is stale from then on. Writes also
//! delete the lookup keys they can name, which keeps point lookups precise.
//!
//! ## Implementations
//!
//! [`MemoryCache`] is a mutex guarded [`lru::LruCache`] with optional TTL,
//! bounded by default. Any other store can be plugged in by implementing
//! [`Cache`] and passing it to `DatabaseBuilder::cache`.

// ============================================================================
// External Crate Imports
// ============================================================================

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;

// ============================================================================
// Internal Crate Imports
// ============================================================================

use crate::value::{Row, Value};

// ============================================================================
// Keys, Triggers and Payloads
// ============================================================================

/// Structured cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Point lookup of one model by one column value.
    Lookup {
        /// Fully qualified Rust type name of the model.
        entity: &'static str,
        field: String,
        /// JSON encoding of the coerced value, so `Int(1)` and `Text("1")` differ.
        value: String,
    },
    /// Result set of a rendered SELECT.
    Query { sql: String, args: String },
}

impl CacheKey {
    /// Key for the lookup of model `M` by `field = value`.
    pub fn lookup<M: 'static>(field: &str, value: &Value) -> Self {
        CacheKey::Lookup {
            entity: type_name::<M>(),
            field: field.to_string(),
            value: serde_json::to_string(value).unwrap_or_default(),
        }
    }

    /// Key for a SELECT and the arguments bound to it.
    pub fn query(sql: &str, args: &[Value]) -> Self {
        CacheKey::Query { sql: sql.to_string(), args: serde_json::to_string(args).unwrap_or_default() }
    }
}

/// Name of an invalidation event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Trigger(pub &'static str);

impl Trigger {
    /// Bumped by every successful write made through a Builder.
    pub const WRITE: Trigger = Trigger("cask_orm.write");
}

/// What the Builder stores in the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// A single model row, from `find`.
    Row(Row),
    /// Raw result rows, from `get`.
    Rows(Vec<Row>),
}

// ============================================================================
// Cache Trait
// ============================================================================

/// Storage contract used by the Builder.
pub trait Cache: Send + Sync {
    /// Returns the entry for `key`, unless it expired or `trigger` (or the
    /// trigger it was stored under) fired after it was stored.
    fn get(&self, key: &CacheKey, trigger: Option<Trigger>) -> Option<CachedValue>;

    /// Stores `value`, optionally expiring after `ttl` and tied to `trigger`.
    fn set(&self, key: CacheKey, value: CachedValue, ttl: Option<Duration>, trigger: Option<Trigger>);

    fn delete(&self, key: &CacheKey);

    /// Records that `trigger` fired now.
    fn set_last_occurrence(&self, trigger: Trigger);

    /// Monotonic marker of the last time `trigger` fired, 0 if never.
    fn last_occurrence(&self, trigger: Trigger) -> u64;

    /// Drops every entry.
    fn flush(&self);
}

// ============================================================================
// MemoryCache
// ============================================================================

/// Entries kept by [`MemoryCache::new`].
pub const DEFAULT_CAPACITY: usize = 1_024;

/// In-memory [`Cache`] on top of an LRU map.
///
/// Entries stored under a trigger are dropped as soon as it fires, so stale
/// result sets do not pile up between evictions.
///
/// ```rust,ignore
/// let db = Database::builder()
///     .cache(Arc::new(MemoryCache::with_capacity(NonZeroUsize::new(10_000).unwrap())))
///     .connect("sqlite::memory:")
///     .await?;
/// ```
pub struct MemoryCache {
    inner: Mutex<MemoryCacheInner>,
}

struct MemoryCacheInner {
    clock: u64,
    entries: LruCache<CacheKey, Entry>,
    occurrences: HashMap<Trigger, u64>,
}

#[derive(Debug)]
struct Entry {
    value: CachedValue,
    stamp: u64,
    trigger: Option<Trigger>,
    expires_at: Option<Instant>,
}

impl MemoryCache {
    /// Cache holding at most [`DEFAULT_CAPACITY`] entries.
    pub fn new() -> Self {
        Self::with_capacity(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }

    /// Cache holding at most `capacity` entries, least recently used first out.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self::from_entries(LruCache::new(capacity))
    }

    /// Cache without size limit. Only triggers, TTLs and `flush` drop entries.
    pub fn unbounded() -> Self {
        Self::from_entries(LruCache::unbounded())
    }

    fn from_entries(entries: LruCache<CacheKey, Entry>) -> Self {
        Self { inner: Mutex::new(MemoryCacheInner { clock: 0, entries, occurrences: HashMap::new() }) }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, MemoryCacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryCache")
            .field("len", &inner.entries.len())
            .field("capacity", &inner.entries.cap())
            .field("occurrences", &inner.occurrences)
            .finish()
    }
}

impl MemoryCacheInner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn is_stale(&self, entry: &Entry, trigger: Option<Trigger>) -> bool {
        if entry.expires_at.is_some_and(|at| Instant::now() >= at) {
            return true;
        }

        [trigger, entry.trigger]
            .into_iter()
            .flatten()
            .any(|t| self.occurrences.get(&t).is_some_and(|fired| *fired > entry.stamp))
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &CacheKey, trigger: Option<Trigger>) -> Option<CachedValue> {
        let mut inner = self.lock();
        let stale = inner.is_stale(inner.entries.peek(key)?, trigger);
        if stale {
            inner.entries.pop(key);
            return None;
        }
        inner.entries.get(key).map(|entry| entry.value.clone())
    }

    fn set(&self, key: CacheKey, value: CachedValue, ttl: Option<Duration>, trigger: Option<Trigger>) {
        let mut inner = self.lock();
        let stamp = inner.tick();
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        inner.entries.put(key, Entry { value, stamp, trigger, expires_at });
    }

    fn delete(&self, key: &CacheKey) {
        self.lock().entries.pop(key);
    }

    fn set_last_occurrence(&self, trigger: Trigger) {
        let mut inner = self.lock();
        let now = inner.tick();
        inner.occurrences.insert(trigger, now);

        let stale: Vec<CacheKey> = inner
            .entries
            .iter()
            .filter(|(_, entry)| entry.trigger == Some(trigger))
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            inner.entries.pop(&key);
        }
    }

    fn last_occurrence(&self, trigger: Trigger) -> u64 {
        self.lock().occurrences.get(&trigger).copied().unwrap_or(0)
    }

    fn flush(&self) {
        self.lock().entries.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================
