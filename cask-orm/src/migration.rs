//! # Migration Module
//!
//! Table bootstrap for Cask ORM models.
//!
//! Each registered model gets a `CREATE TABLE IF NOT EXISTS` statement (plus
//! its indexes) rendered for the connected driver, using the table prefix of
//! the `Database`. Registration order is execution order.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use cask_orm::Database;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), cask_orm::Error> {
//!     let db = Database::builder().table_prefix("wp_").connect("sqlite::memory:").await?;
//!
//!     db.migrator()
//!         .register::<Event>()
//!         .register::<Occurrence>()
//!         .run()
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

// ============================================================================
// External Crate Imports
// ============================================================================

use futures::future::BoxFuture;

// ============================================================================
// Internal Crate Imports
// ============================================================================

use crate::{
    Error,
    database::{Database, Drivers},
    model::{ColumnInfo, Model},
    temporal,
    value::Format,
};

// ============================================================================
// Type Aliases
// ============================================================================

/// Type alias for migration tasks.
///
/// Migration tasks are async closures that take a `Database` instance and
/// return a boxed future resolving to a Result.
///
/// ```rust,ignore
/// let task: MigrationTask = Box::new(|db: Database| {
///     Box::pin(async move {
///         db.create_table::<Occurrence>().await?;
///         Ok(())
///     })
/// });
/// ```
pub type MigrationTask = Box<dyn Fn(Database) -> BoxFuture<'static, Result<(), Error>> + Send + Sync>;

// ============================================================================
// Migrator Struct
// ============================================================================

/// Schema bootstrap manager.
pub struct Migrator<'a> {
    pub(crate) db: &'a Database,

    pub(crate) tasks: Vec<MigrationTask>,
}

impl<'a> Migrator<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db, tasks: Vec::new() }
    }

    /// Queues the creation of the table of `M`.
    pub fn register<M: Model>(mut self) -> Self {
        let task = Box::new(|db: Database| -> BoxFuture<'static, Result<(), Error>> {
            Box::pin(async move {
                db.create_table::<M>().await?;
                Ok(())
            })
        });

        self.tasks.push(task);
        self
    }

    /// Runs every queued task in registration order.
    pub async fn run(self) -> Result<Database, Error> {
        for task in self.tasks {
            (task)(self.db.clone()).await?;
        }

        Ok(self.db.clone())
    }
}

// ============================================================================
// DDL Rendering
// ============================================================================

/// Renders the `CREATE TABLE` statement of `M`, followed by its standalone
/// index statements.
///
/// MySQL has no `CREATE INDEX IF NOT EXISTS`, so its indexes are declared
/// inline instead.
pub fn create_table_statements<M: Model>(driver: Drivers, prefix: &str) -> Vec<String> {
    let table = format!("{}{}", prefix, M::table_name());
    let columns = M::columns();

    let mut definitions: Vec<String> = columns.iter().map(|col| column_definition(col, driver)).collect();
    let mut statements = Vec::new();

    for col in columns.iter().filter(|c| c.index && !c.unique && !c.is_primary_key) {
        let index_name = format!("idx_{}_{}", table, col.name);
        match driver {
            Drivers::MySQL => {
                definitions.push(format!("INDEX {} ({})", driver.quote(&index_name), driver.quote(col.name)))
            }
            Drivers::SQLite | Drivers::Postgres => statements.push(format!(
                "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                driver.quote(&index_name),
                driver.quote(&table),
                driver.quote(col.name)
            )),
        }
    }

    let create = format!("CREATE TABLE IF NOT EXISTS {} ({})", driver.quote(&table), definitions.join(", "));
    statements.insert(0, create);
    statements
}

fn column_definition(col: &ColumnInfo, driver: Drivers) -> String {
    let name = driver.quote(col.name);

    if col.is_primary_key && col.auto_increment {
        return match driver {
            Drivers::SQLite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name),
            Drivers::MySQL => format!("{} {} NOT NULL AUTO_INCREMENT PRIMARY KEY", name, column_type(col, driver)),
            Drivers::Postgres => {
                let serial = if col.sql_type == "BIGINT" { "BIGSERIAL" } else { "SERIAL" };
                format!("{} {} PRIMARY KEY", name, serial)
            }
        };
    }

    let mut def = format!("{} {}", name, column_type(col, driver));

    if col.is_primary_key {
        def.push_str(" PRIMARY KEY");
    } else if !col.is_nullable {
        def.push_str(" NOT NULL");
    }

    if col.create_time {
        def.push(' ');
        def.push_str(temporal::current_timestamp_default(&driver));
    }

    if col.unique && !col.is_primary_key {
        def.push_str(" UNIQUE");
    }

    def
}

/// Concrete column type of `col` on `driver`.
fn column_type(col: &ColumnInfo, driver: Drivers) -> String {
    if temporal::is_temporal_type(col.sql_type) {
        return temporal::temporal_column_type(col.sql_type, &driver).to_string();
    }

    if col.format == Format::Str {
        if let Some(size) = col.size {
            return format!("VARCHAR({})", size);
        }
    }

    let keyed = col.is_primary_key || col.unique || col.index;

    match (driver, col.sql_type) {
        (Drivers::SQLite, "UUID") => "TEXT".to_string(),
        (_, "UUID") => "CHAR(36)".to_string(),
        // Booleans are bound as integers.
        (Drivers::Postgres, "BOOLEAN") => "SMALLINT".to_string(),
        (Drivers::MySQL, "TEXT") if keyed => "VARCHAR(191)".to_string(),
        (_, other) => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
