//! # Model Module
//!
//! This module defines the core `Model` trait and the column metadata it
//! exposes. A Model is a schema-validated entity bound to one custom table:
//! the Builder reads its schema to validate every value it binds, and uses
//! `to_row` / `from_row` to move instances in and out of the database.
//!
//! ## Automatic Implementation
//!
//! The trait is normally implemented with `#[derive(Model)]`, which reads
//! field types (through [`FieldValue`](crate::FieldValue)) and `#[orm(...)]`
//! attributes.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use cask_orm::Model;
//! use chrono::NaiveDateTime;
//!
//! fn known_status(value: &cask_orm::Value) -> Result<(), String> {
//!     match value.as_str() {
//!         Some("publish" | "draft") => Ok(()),
//!         _ => Err("is not a known status".into()),
//!     }
//! }
//!
//! #[derive(Model, Debug, Clone)]
//! #[orm(table = "tec_occurrences")]
//! struct Occurrence {
//!     #[orm(primary_key, auto_increment)]
//!     occurrence_id: i64,
//!
//!     #[orm(index)]
//!     post_id: i64,
//!
//!     #[orm(size = 40, unique)]
//!     hash: String,
//!
//!     start_date: NaiveDateTime,
//!
//!     #[orm(size = 20, validate = "known_status")]
//!     status: String,
//!
//!     duration: Option<i32>,
//!
//!     #[orm(create_time)]
//!     updated_at: Option<NaiveDateTime>,
//! }
//! ```
//!
//! ## Supported ORM Attributes
//!
//! - `#[orm(table = "name")]` (struct) - Table name without prefix
//! - `#[orm(primary_key)]` - Marks field as primary key
//! - `#[orm(auto_increment)]` - Primary key assigned by the database
//! - `#[orm(unique)]` - Adds UNIQUE constraint, used for lookup invalidation
//! - `#[orm(index)]` - Creates database index
//! - `#[orm(size = N)]` - Maximum length, enforced by validation and DDL
//! - `#[orm(create_time)]` - Filled with the current timestamp by the database
//! - `#[orm(validate = "path")]` - Extra `fn(&Value) -> Result<(), String>` check

// ============================================================================
// Internal Crate Imports
// ============================================================================

use crate::{
    Error,
    errors::ValidationErrors,
    validation::{self, FormattedRow},
    value::{Format, Row, Value},
};

// ============================================================================
// Column Metadata Structure
// ============================================================================

/// Custom validation hook attached to a column.
///
/// Receives the value after it was coerced to the column's format and
/// returns a human readable reason on failure.
pub type Validator = fn(&Value) -> Result<(), String>;

/// Metadata information about a database column.
///
/// Populated by `#[derive(Model)]`. The validation layer, the SQL writer and
/// the migrator all read the schema from here.
///
/// # Example
///
/// ```rust,ignore
/// // For this field:
/// #[orm(size = 40, unique)]
/// hash: String,
///
/// // The generated ColumnInfo is:
/// ColumnInfo {
///     name: "hash",
///     sql_type: "TEXT",
///     format: Format::Str,
///     is_primary_key: false,
///     auto_increment: false,
///     is_nullable: false,
///     unique: true,
///     index: false,
///     size: Some(40),
///     create_time: false,
///     validator: None,
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ColumnInfo {
    /// The column name in the database.
    ///
    /// Taken from the struct field name, with a leading `r#` stripped.
    pub name: &'static str,

    /// Portable SQL type of the column (e.g. "BIGINT", "TEXT", "TIMESTAMP").
    ///
    /// The migrator maps it to the concrete type of the connected driver.
    pub sql_type: &'static str,

    /// Placeholder format used to coerce and bind values of this column.
    pub format: Format,

    /// Whether this column is the Primary Key.
    ///
    /// A table has exactly one. When none is marked the Builder assumes `id`.
    pub is_primary_key: bool,

    /// Whether the database assigns the primary key.
    ///
    /// Auto-increment keys may be left out of inserted rows.
    pub auto_increment: bool,

    /// Whether NULL values are allowed (`Option<T>` fields).
    pub is_nullable: bool,

    /// Whether a UNIQUE constraint applies.
    ///
    /// Unique columns, like the primary key, address a single row, so the
    /// Builder flushes their point-lookup cache entries on writes.
    pub unique: bool,

    /// Whether to create an index on this column.
    pub index: bool,

    /// Maximum length of the value's text form.
    pub size: Option<usize>,

    /// Whether the database fills the column with the current timestamp.
    pub create_time: bool,

    /// Optional custom validator.
    pub validator: Option<Validator>,
}

impl ColumnInfo {
    /// A plain, non-null column with the given format.
    ///
    /// Mostly useful for hand-written `Model` implementations.
    pub const fn new(name: &'static str, sql_type: &'static str, format: Format) -> Self {
        Self {
            name,
            sql_type,
            format,
            is_primary_key: false,
            auto_increment: false,
            is_nullable: false,
            unique: false,
            index: false,
            size: None,
            create_time: false,
            validator: None,
        }
    }

    /// Whether whole-row validation may leave this column out, letting the
    /// database fill it in.
    pub fn database_assigned(&self) -> bool {
        self.is_primary_key || self.create_time
    }
}

// ============================================================================
// Model Trait
// ============================================================================

/// The core trait defining a table-backed entity.
///
/// All methods but the first four have default implementations derived
/// from the schema.
pub trait Model: Sized + Clone + Send + Sync + 'static {
    /// Table name without prefix.
    fn table_name() -> &'static str;

    /// Schema, in column order.
    fn columns() -> Vec<ColumnInfo>;

    /// All columns with their current values, in schema order.
    fn to_row(&self) -> Row;

    /// Builds an instance out of a result row.
    ///
    /// Missing columns are read as NULL.
    fn from_row(row: &Row) -> Result<Self, Error>;

    /// Name of the primary key column, `id` when none is marked.
    fn primary_key_name() -> &'static str {
        Self::columns().iter().find(|c| c.is_primary_key).map(|c| c.name).unwrap_or("id")
    }

    /// Metadata of one column.
    fn column(name: &str) -> Option<ColumnInfo> {
        Self::columns().into_iter().find(|c| c.name == name)
    }

    /// Primary key and unique columns.
    fn unique_columns() -> Vec<&'static str> {
        Self::columns().iter().filter(|c| c.is_primary_key || c.unique).map(|c| c.name).collect()
    }

    /// Current primary key value, `None` until the row is persisted.
    fn primary_key_value(&self) -> Option<Value> {
        let value = self.to_row().remove(Self::primary_key_name())?;
        match value {
            Value::Null => None,
            // Auto-increment keys default to zero before the first save.
            Value::Int(0) if Self::column(Self::primary_key_name()).is_some_and(|c| c.auto_increment) => None,
            other => Some(other),
        }
    }

    /// Validates every column and returns the formatted row.
    fn validate(&self) -> Result<FormattedRow, ValidationErrors> {
        validation::validate_row(&Self::columns(), &self.to_row(), None)
    }

    /// Validates only `fields`.
    fn validate_fields(&self, fields: &[&str]) -> Result<FormattedRow, ValidationErrors> {
        validation::validate_row(&Self::columns(), &self.to_row(), Some(fields))
    }

    fn is_invalid(&self) -> bool {
        self.validate().is_err()
    }

    /// Validation errors, empty when the model is valid.
    fn errors(&self) -> ValidationErrors {
        self.validate().err().unwrap_or_default()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Tag {
        id: i64,
        slug: String,
    }

    impl Model for Tag {
        fn table_name() -> &'static str {
            "tags"
        }

        fn columns() -> Vec<ColumnInfo> {
            vec![
                ColumnInfo { is_primary_key: true, auto_increment: true, ..ColumnInfo::new("id", "BIGINT", Format::Int) },
                ColumnInfo { unique: true, size: Some(8), ..ColumnInfo::new("slug", "TEXT", Format::Str) },
            ]
        }

        fn to_row(&self) -> Row {
            Row::new().with("id", self.id).with("slug", self.slug.as_str())
        }

        fn from_row(row: &Row) -> Result<Self, Error> {
            Ok(Self {
                id: row.get("id").and_then(Value::as_i64).unwrap_or_default(),
                slug: row.get("slug").map(ToString::to_string).unwrap_or_default(),
            })
        }
    }

    #[test]
    fn test_schema_defaults() {
        assert_eq!(Tag::primary_key_name(), "id");
        assert_eq!(Tag::unique_columns(), vec!["id", "slug"]);
        assert!(Tag::column("slug").is_some_and(|c| c.size == Some(8)));
        assert!(Tag::column("missing").is_none());
    }

    #[test]
    fn test_unsaved_auto_increment_key_is_none() {
        let tag = Tag { id: 0, slug: "music".into() };
        assert_eq!(tag.primary_key_value(), None);

        let saved = Tag { id: 4, ..tag };
        assert_eq!(saved.primary_key_value(), Some(Value::Int(4)));
    }

    #[test]
    fn test_validate_reports_errors() {
        let tag = Tag { id: 1, slug: "far-too-long".into() };
        assert!(tag.is_invalid());
        assert_eq!(tag.errors().0.len(), 1);
        assert!(tag.validate_fields(&["id"]).is_ok());
    }
}
