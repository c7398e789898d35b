//! # Cask ORM
//!
//! A cache-aware, batch-capable query builder over schema-validated,
//! table-backed models ("custom tables").
//!
//! - [`Model`]: the schema contract, usually derived with `#[derive(Model)]`.
//! - [`Builder`]: per-chain query state. Clause methods compose predicates,
//!   terminal methods assemble one statement, consult the [`Cache`] and
//!   execute through the [`Connection`] trait.
//! - [`Database`]: the `sqlx::AnyPool` backed connection (MySQL, SQLite,
//!   Postgres), carrying the table prefix, the cache and the
//!   [`BuilderConfig`].
//!
//! ```rust,ignore
//! use cask_orm::{Database, Model, Row};
//!
//! #[derive(Model, Debug, Clone)]
//! #[orm(table = "tec_occurrences")]
//! struct Occurrence {
//!     #[orm(primary_key, auto_increment)]
//!     occurrence_id: i64,
//!     #[orm(index)]
//!     post_id: i64,
//!     #[orm(unique, size = 40)]
//!     hash: String,
//!     start_date: chrono::NaiveDateTime,
//!     duration: Option<i64>,
//! }
//!
//! let db = Database::builder().table_prefix("wp_").connect("sqlite::memory:").await?;
//! db.migrator().register::<Occurrence>().run().await?;
//!
//! let next = db.model::<Occurrence>().equals("post_id", 23).order_by("start_date", "ASC").first().await;
//! ```

extern crate self as cask_orm;

pub use cask_orm_macro::Model;

pub mod cache;
pub mod config;
pub mod database;
pub mod errors;
pub mod migration;
pub mod model;
pub mod query_builder;
pub mod temporal;
pub mod validation;
pub mod value;
pub mod value_binding;

pub use cache::{Cache, CacheKey, CachedValue, MemoryCache, Trigger};
pub use config::BuilderConfig;
pub use database::{Connection, Database, DatabaseBuilder, Drivers};
pub use errors::{Error, ValidationError, ValidationErrors};
pub use migration::Migrator;
pub use model::{ColumnInfo, Model, Validator};
pub use query_builder::{
    Builder, Direction, Operation, Operator, OutputFormat, Predicate, Record, Statement, UpsertResult,
};
pub use value::{FieldValue, Format, Row, Value};
