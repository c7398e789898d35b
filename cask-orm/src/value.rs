//! # Value Module
//!
//! Driver-neutral representation of the data flowing through the Builder.
//!
//! - [`Value`]: a single scalar cell (`NULL`, integer, float or text).
//! - [`Format`]: the placeholder format of a column (`%d`, `%f`, `%s`), able
//!   to coerce loosely typed input into the column's canonical representation.
//! - [`Row`]: an ordered `column -> Value` map, used for raw result rows,
//!   insert/update input and cache payloads.
//! - [`FieldValue`]: maps Rust field types onto a format, a DDL type and
//!   `Value` conversions. `#[derive(Model)]` relies on it for every field.
//!
//! ```rust,ignore
//! use cask_orm::{Row, Value};
//!
//! let row = Row::new()
//!     .with("post_id", 23)
//!     .with("start_date", "2024-03-01 10:00:00")
//!     .with("has_recurrence", false);
//!
//! assert_eq!(row.get("post_id"), Some(&Value::Int(23)));
//! ```

// ============================================================================
// External Crate Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};

// ============================================================================
// Internal Crate Imports
// ============================================================================

use crate::Error;

// ============================================================================
// Value
// ============================================================================

/// A single database cell.
///
/// Booleans are stored as `Int(0)` / `Int(1)`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL `NULL`.
    #[default]
    Null,
    /// Any integer that fits in an `i64`.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text, including formatted dates and UUIDs.
    Text(String),
}

impl Value {
    /// Returns `true` for `Value::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view of the value, parsing text when needed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
            Value::Float(f) if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Float view of the value, parsing text when needed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null => None,
        }
    }

    /// Borrowed text, only for `Value::Text`.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Name of the variant, used in conversion messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! value_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(v as i64)
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Int(v as i64)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

// ============================================================================
// Format
// ============================================================================

/// Placeholder format of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// `%d`
    Int,
    /// `%f`
    Float,
    /// `%s`
    Str,
}

impl Format {
    /// The printf-style placeholder this format stands for.
    pub fn placeholder(&self) -> &'static str {
        match self {
            Format::Int => "%d",
            Format::Float => "%f",
            Format::Str => "%s",
        }
    }

    /// Coerces `value` into the canonical representation of this format.
    ///
    /// `NULL` passes through untouched; nullability is checked by the
    /// validation layer, which knows the column.
    ///
    /// ```rust,ignore
    /// assert_eq!(Format::Int.coerce(&Value::from("42")), Ok(Value::Int(42)));
    /// assert!(Format::Int.coerce(&Value::from("forty-two")).is_err());
    /// assert_eq!(Format::Str.coerce(&Value::Int(7)), Ok(Value::from("7")));
    /// ```
    pub fn coerce(&self, value: &Value) -> Result<Value, String> {
        if value.is_null() {
            return Ok(Value::Null);
        }

        match self {
            Format::Int => value
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| format!("expected an integer, got {} `{}`", value.kind(), value)),
            Format::Float => value
                .as_f64()
                .map(Value::Float)
                .ok_or_else(|| format!("expected a number, got {} `{}`", value.kind(), value)),
            Format::Str => Ok(Value::Text(value.to_string())),
        }
    }
}

// ============================================================================
// Row
// ============================================================================

/// Ordered `column -> Value` map.
///
/// Insertion order is preserved, which keeps generated column lists stable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row(Vec<(String, Value)>);

impl Row {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Builder-style `set`.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Sets `column`, replacing any previous value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.0.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.0.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.0.iter().find(|(name, _)| name == column).map(|(_, value)| value)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.iter().any(|(name, _)| name == column)
    }

    /// Removes `column` and returns its value.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        let index = self.0.iter().position(|(name, _)| name == column)?;
        Some(self.0.remove(index).1)
    }

    /// Overlays every column of `other` onto this row.
    pub fn merge(&mut self, other: &Row) {
        for (column, value) in other.iter() {
            self.set(column.clone(), value.clone());
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }

    pub fn columns(&self) -> Vec<&str> {
        self.0.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn values(&self) -> Vec<&Value> {
        self.0.iter().map(|(_, value)| value).collect()
    }

    /// Values only, in column order.
    pub fn into_values(self) -> Vec<Value> {
        self.0.into_iter().map(|(_, value)| value).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Row {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut row = Row::new();
        for (column, value) in iter {
            row.set(column, value);
        }
        row
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::vec::IntoIter<(String, Value)>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

// ============================================================================
// FieldValue Trait
// ============================================================================

/// Conversion contract between a Rust field type and a [`Value`].
///
/// The associated constants feed the `ColumnInfo` generated by
/// `#[derive(Model)]`:
///
/// - `FORMAT`: placeholder format used for validation and binding.
/// - `SQL_TYPE`: portable DDL type, mapped per driver by the migrator.
/// - `NULLABLE`: `true` only for `Option<T>`.
pub trait FieldValue: Sized {
    const FORMAT: Format;
    const SQL_TYPE: &'static str;
    const NULLABLE: bool = false;

    fn to_value(&self) -> Value;

    fn from_value(value: Value) -> Result<Self, Error>;
}

fn unexpected(value: &Value, target: &str) -> Error {
    Error::Conversion(format!("cannot convert {} `{}` into {}", value.kind(), value, target))
}

macro_rules! field_value_int {
    ($($t:ty => $sql:expr),*) => {
        $(
            impl FieldValue for $t {
                const FORMAT: Format = Format::Int;
                const SQL_TYPE: &'static str = $sql;

                fn to_value(&self) -> Value {
                    Value::Int(*self as i64)
                }

                fn from_value(value: Value) -> Result<Self, Error> {
                    let int = value.as_i64().ok_or_else(|| unexpected(&value, stringify!($t)))?;
                    <$t>::try_from(int).map_err(|_| unexpected(&value, stringify!($t)))
                }
            }
        )*
    };
}

field_value_int!(
    i8 => "SMALLINT",
    i16 => "SMALLINT",
    i32 => "INTEGER",
    i64 => "BIGINT",
    u8 => "SMALLINT",
    u16 => "INTEGER",
    u32 => "BIGINT"
);

impl FieldValue for u64 {
    const FORMAT: Format = Format::Int;
    const SQL_TYPE: &'static str = "BIGINT";

    fn to_value(&self) -> Value {
        i64::try_from(*self).map(Value::Int).unwrap_or_else(|_| Value::Text(self.to_string()))
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match &value {
            Value::Text(s) => s.trim().parse().map_err(|_| unexpected(&value, "u64")),
            _ => {
                let int = value.as_i64().ok_or_else(|| unexpected(&value, "u64"))?;
                u64::try_from(int).map_err(|_| unexpected(&value, "u64"))
            }
        }
    }
}

impl FieldValue for f64 {
    const FORMAT: Format = Format::Float;
    const SQL_TYPE: &'static str = "DOUBLE PRECISION";

    fn to_value(&self) -> Value {
        Value::Float(*self)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        value.as_f64().ok_or_else(|| unexpected(&value, "f64"))
    }
}

impl FieldValue for f32 {
    const FORMAT: Format = Format::Float;
    const SQL_TYPE: &'static str = "REAL";

    fn to_value(&self) -> Value {
        Value::Float(*self as f64)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        value.as_f64().map(|f| f as f32).ok_or_else(|| unexpected(&value, "f32"))
    }
}

impl FieldValue for bool {
    const FORMAT: Format = Format::Int;
    const SQL_TYPE: &'static str = "BOOLEAN";

    fn to_value(&self) -> Value {
        Value::Int(*self as i64)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match &value {
            Value::Int(i) => Ok(*i != 0),
            Value::Float(f) => Ok(*f != 0.0),
            Value::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "t" | "yes" => Ok(true),
                "0" | "false" | "f" | "no" | "" => Ok(false),
                _ => Err(unexpected(&value, "bool")),
            },
            Value::Null => Err(unexpected(&value, "bool")),
        }
    }
}

impl FieldValue for String {
    const FORMAT: Format = Format::Str;
    const SQL_TYPE: &'static str = "TEXT";

    fn to_value(&self) -> Value {
        Value::Text(self.clone())
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Null => Err(unexpected(&Value::Null, "String")),
            Value::Text(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }
}

impl<T: FieldValue> FieldValue for Option<T> {
    const FORMAT: Format = T::FORMAT;
    const SQL_TYPE: &'static str = T::SQL_TYPE;
    const NULLABLE: bool = true;

    fn to_value(&self) -> Value {
        self.as_ref().map(FieldValue::to_value).unwrap_or(Value::Null)
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl FieldValue for uuid::Uuid {
    const FORMAT: Format = Format::Str;
    const SQL_TYPE: &'static str = "UUID";

    fn to_value(&self) -> Value {
        Value::Text(self.hyphenated().to_string())
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        match &value {
            Value::Text(s) => s.parse().map_err(|e| Error::Conversion(format!("Failed to parse UUID: {}", e))),
            _ => Err(unexpected(&value, "Uuid")),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_format_coerces_numeric_text() {
        assert_eq!(Format::Int.coerce(&Value::from("42")), Ok(Value::Int(42)));
        assert_eq!(Format::Int.coerce(&Value::Float(3.0)), Ok(Value::Int(3)));
        assert!(Format::Int.coerce(&Value::Float(3.5)).is_err());
        assert!(Format::Int.coerce(&Value::Float(1e30)).is_err());
        assert!(Format::Int.coerce(&Value::Float(-1e30)).is_err());
        assert_eq!(Format::Int.coerce(&Value::Float(-2.0)), Ok(Value::Int(-2)));
        assert!(Format::Int.coerce(&Value::from("forty-two")).is_err());
    }

    #[test]
    fn test_str_format_stringifies_numbers() {
        assert_eq!(Format::Str.coerce(&Value::Int(7)), Ok(Value::from("7")));
        assert_eq!(Format::Float.coerce(&Value::Int(7)), Ok(Value::Float(7.0)));
        assert_eq!(Format::Str.coerce(&Value::Null), Ok(Value::Null));
    }

    #[test]
    fn test_row_set_replaces_in_place() {
        let mut row = Row::new().with("a", 1).with("b", "x");
        row.set("a", 2);

        assert_eq!(row.columns(), vec!["a", "b"]);
        assert_eq!(row.get("a"), Some(&Value::Int(2)));
        assert_eq!(row.remove("b"), Some(Value::from("x")));
        assert!(!row.contains("b"));
    }

    #[test]
    fn test_option_field_value() {
        assert_eq!(<Option<i32>>::from_value(Value::Null).unwrap(), None);
        assert_eq!(<Option<i32>>::from_value(Value::from("12")).unwrap(), Some(12));
        assert!(<Option<i32> as FieldValue>::NULLABLE);
        assert!(i32::from_value(Value::Null).is_err());
        assert!(bool::from_value(Value::Int(1)).unwrap());
    }
}
