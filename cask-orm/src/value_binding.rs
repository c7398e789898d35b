//! # Value Binding Module
//!
//! Moves [`Value`]s across the `sqlx` Any driver boundary:
//!
//! - [`ValueBinder`] binds values into `AnyArguments`, one positional
//!   placeholder each.
//! - [`decode_row`] turns an `AnyRow` into a [`Row`], probing the column's
//!   runtime type (integer, float, text, boolean, blob).
//!
//! `NULL` is never bound: the SQL writer renders it as a literal, which keeps
//! placeholder types unambiguous on every driver.

use sqlx::any::{AnyArguments, AnyRow};
use sqlx::{Arguments, Column, Row as _, ValueRef};

use crate::Error;
use crate::value::{Row, Value};

// ============================================================================
// Value Binding Trait
// ============================================================================

/// Extension trait for binding [`Value`]s to `AnyArguments`.
pub trait ValueBinder {
    /// Binds a single value.
    ///
    /// # Errors
    ///
    /// `Error::Conversion` for `Value::Null`, or when the driver refuses the value.
    fn bind_value(&mut self, value: &Value) -> Result<(), Error>;

    /// Binds every value, in order.
    fn bind_all(&mut self, values: &[Value]) -> Result<(), Error> {
        values.iter().try_for_each(|value| self.bind_value(value))
    }
}

impl ValueBinder for AnyArguments<'_> {
    fn bind_value(&mut self, value: &Value) -> Result<(), Error> {
        let bound = match value {
            Value::Int(i) => self.add(*i),
            Value::Float(f) => self.add(*f),
            Value::Text(s) => self.add(s.clone()),
            Value::Null => return Err(Error::conversion("NULL must be rendered as a literal, not bound")),
        };
        bound.map_err(|e| Error::Conversion(format!("Failed to bind {}: {}", value.kind(), e)))
    }
}

/// Builds the argument list for one statement.
///
/// # Example
///
/// ```rust,ignore
/// let args = bind_values(&[Value::Int(23), Value::from("publish")])?;
/// sqlx::query_with::<sqlx::Any, _>("SELECT * FROM t WHERE a = ? AND b = ?", args)
///     .fetch_all(&pool)
///     .await?;
/// ```
pub fn bind_values<'q>(values: &[Value]) -> Result<AnyArguments<'q>, Error> {
    let mut args = AnyArguments::default();
    args.bind_all(values)?;
    Ok(args)
}

// ============================================================================
// Row Decoding
// ============================================================================

/// Decodes every column of `row`, keeping the column order of the result set.
pub fn decode_row(row: &AnyRow) -> Result<Row, Error> {
    let mut decoded = Row::new();
    for (index, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, index).map_err(|e| e.in_column(column.name()))?;
        decoded.set(column.name(), value);
    }
    Ok(decoded)
}

fn decode_column(row: &AnyRow, index: usize) -> Result<Value, Error> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    if let Ok(i) = row.try_get::<i64, _>(index) {
        return Ok(Value::Int(i));
    }
    if let Ok(f) = row.try_get::<f64, _>(index) {
        return Ok(Value::Float(f));
    }
    if let Ok(s) = row.try_get::<String, _>(index) {
        return Ok(Value::Text(s));
    }
    if let Ok(b) = row.try_get::<bool, _>(index) {
        return Ok(Value::Int(b as i64));
    }
    if let Ok(bytes) = row.try_get::<Vec<u8>, _>(index) {
        return Ok(Value::Text(String::from_utf8_lossy(&bytes).into_owned()));
    }

    Err(Error::conversion("unsupported column type"))
}

// ============================================================================
// Tests
// ============================================================================
