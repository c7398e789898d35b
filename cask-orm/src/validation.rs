//! # Validation Module
//!
//! Pure schema checks. Nothing here builds a model instance: every function
//! takes the column list, a field name and a value.
//!
//! A value passes when, in order:
//!
//! 1. the field is a column of the schema,
//! 2. it is not `NULL`, or the column is nullable,
//! 3. the column's [`Format`](crate::Format) can coerce it,
//! 4. its text form fits the column `size`,
//! 5. the column's custom validator accepts it.
//!
//! The coerced value is what gets bound, so `"42"` filtered on an integer
//! column is sent as `42`.

use crate::errors::{ValidationError, ValidationErrors};
use crate::model::ColumnInfo;
use crate::value::{Row, Value};

/// A validated row: coerced values in schema order, ready for binding.
pub type FormattedRow = Row;

/// Validates one value against the column `field` of `columns`.
///
/// ```rust,ignore
/// let columns = Occurrence::columns();
/// assert_eq!(validate_field(&columns, "post_id", &"23".into()), Ok(Value::Int(23)));
/// assert!(validate_field(&columns, "post_id", &"twenty".into()).is_err());
/// ```
pub fn validate_field(columns: &[ColumnInfo], field: &str, value: &Value) -> Result<Value, ValidationError> {
    let column = columns
        .iter()
        .find(|c| c.name == field)
        .ok_or_else(|| ValidationError::new(field, "is not a column of this model"))?;

    check(column, value)
}

fn check(column: &ColumnInfo, value: &Value) -> Result<Value, ValidationError> {
    if value.is_null() {
        return if column.is_nullable {
            Ok(Value::Null)
        } else {
            Err(ValidationError::new(column.name, "cannot be NULL"))
        };
    }

    let coerced = column.format.coerce(value).map_err(|reason| ValidationError::new(column.name, reason))?;

    if let Some(size) = column.size {
        let length = coerced.to_string().chars().count();
        if length > size {
            return Err(ValidationError::new(
                column.name,
                format!("is {} characters long, the maximum is {}", length, size),
            ));
        }
    }

    if let Some(validator) = column.validator {
        validator(&coerced).map_err(|reason| ValidationError::new(column.name, reason))?;
    }

    Ok(coerced)
}

/// Validates a full row, or only `fields` of it.
///
/// Whole-row mode (`fields == None`):
/// - unknown keys are errors,
/// - primary key and `create_time` columns may be absent (or NULL, or a zero
///   auto-increment key) and are left to the database,
/// - absent nullable columns become `NULL`,
/// - absent required columns are errors.
///
/// Field mode checks each listed field, which must be present in `row`.
///
/// All failures are collected; the output is in schema order.
pub fn validate_row(
    columns: &[ColumnInfo],
    row: &Row,
    fields: Option<&[&str]>,
) -> Result<FormattedRow, ValidationErrors> {
    let mut errors = ValidationErrors::default();
    let mut formatted = Row::new();

    match fields {
        Some(fields) => {
            for field in fields {
                if !columns.iter().any(|c| c.name == *field) {
                    errors.push(ValidationError::new(*field, "is not a column of this model"));
                }
            }

            for column in columns.iter().filter(|c| fields.contains(&c.name)) {
                match row.get(column.name) {
                    Some(value) => match check(column, value) {
                        Ok(value) => formatted.set(column.name, value),
                        Err(e) => errors.push(e),
                    },
                    None => errors.push(ValidationError::new(column.name, "is missing")),
                }
            }
        }
        None => {
            for (name, _) in row.iter() {
                if !columns.iter().any(|c| c.name == name) {
                    errors.push(ValidationError::new(name.as_str(), "is not a column of this model"));
                }
            }

            for column in columns {
                match row.get(column.name) {
                    Some(value) if column.database_assigned() && is_unassigned(column, value) => {}
                    Some(value) => match check(column, value) {
                        Ok(value) => formatted.set(column.name, value),
                        Err(e) => errors.push(e),
                    },
                    None if column.database_assigned() => {}
                    None if column.is_nullable => formatted.set(column.name, Value::Null),
                    None => errors.push(ValidationError::new(column.name, "is required")),
                }
            }
        }
    }

    if errors.is_empty() { Ok(formatted) } else { Err(errors) }
}

fn is_unassigned(column: &ColumnInfo, value: &Value) -> bool {
    value.is_null() || (column.auto_increment && *value == Value::Int(0))
}

// ============================================================================
// Tests
// ============================================================================
