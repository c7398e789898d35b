//! # Builder Configuration
//!
//! Behaviour toggles shared by every `Builder` created from a `Database`.
//!
//! ```rust,ignore
//! let config = BuilderConfig { use_query_cache: false, ..BuilderConfig::default() };
//! let db = Database::builder().config(config).connect("sqlite::memory:").await?;
//! ```

use std::env;
use std::time::Duration;

/// Default number of rows per batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Upper bound of the batch used by `find_all`.
pub const MAX_FIND_ALL_BATCH: usize = 5000;

/// Configuration applied to each `Builder` at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BuilderConfig {
    /// When `false` every terminal is a dry run: SQL is assembled and logged
    /// in `Builder::queries()` but nothing is sent to the database.
    pub execute_queries: bool,

    /// Cache `get()` results keyed by SQL and arguments.
    pub use_query_cache: bool,

    /// Cache `find()` point lookups.
    pub memoize_lookups: bool,

    /// Rows per batch for inserts and lazy iteration.
    pub batch_size: usize,

    /// Decide upsert outcomes with a `SELECT` before writing.
    pub upsert_precheck: bool,

    /// Expiration of query-cache entries. `None` keeps them for the cache's lifetime.
    pub query_cache_ttl: Option<Duration>,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            execute_queries: true,
            use_query_cache: true,
            memoize_lookups: true,
            batch_size: DEFAULT_BATCH_SIZE,
            upsert_precheck: true,
            query_cache_ttl: None,
        }
    }
}

impl BuilderConfig {
    /// Reads overrides from the environment, falling back to the defaults.
    ///
    /// | variable                  | field                         |
    /// |---------------------------|-------------------------------|
    /// | `CASK_EXECUTE_QUERIES`    | `execute_queries`             |
    /// | `CASK_QUERY_CACHE`        | `use_query_cache`             |
    /// | `CASK_NO_MEMOIZE_MODELS`  | `memoize_lookups` (inverted)  |
    /// | `CASK_QUERY_BATCH_SIZE`   | `batch_size`                  |
    /// | `CASK_UPSERT_PRECHECK`    | `upsert_precheck`             |
    /// | `CASK_QUERY_CACHE_TTL`    | `query_cache_ttl` (seconds)   |
    ///
    /// Unparseable values are ignored with a warning.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(flag) = env_flag("CASK_EXECUTE_QUERIES") {
            config.execute_queries = flag;
        }
        if let Some(flag) = env_flag("CASK_QUERY_CACHE") {
            config.use_query_cache = flag;
        }
        if let Some(flag) = env_flag("CASK_NO_MEMOIZE_MODELS") {
            config.memoize_lookups = !flag;
        }
        if let Some(flag) = env_flag("CASK_UPSERT_PRECHECK") {
            config.upsert_precheck = flag;
        }
        if let Some(size) = env_number("CASK_QUERY_BATCH_SIZE") {
            config.batch_size = (size as usize).max(1);
        }
        if let Some(seconds) = env_number("CASK_QUERY_CACHE_TTL") {
            config.query_cache_ttl = (seconds > 0).then(|| Duration::from_secs(seconds));
        }

        config
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = env::var(name).ok()?;
    let flag = parse_flag(&raw);
    if flag.is_none() {
        log::warn!(variable = name, value = raw.as_str(); "Ignoring unrecognized boolean setting.");
    }
    flag
}

fn env_number(name: &str) -> Option<u64> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(n) => Some(n),
        Err(_) => {
            log::warn!(variable = name, value = raw.as_str(); "Ignoring unrecognized numeric setting.");
            None
        }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}
