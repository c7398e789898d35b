//! # Temporal Type Conversion Module
//!
//! This module provides the handling of temporal types (`DateTime<Utc>`,
//! `NaiveDateTime`, `NaiveDate`) for Cask ORM.
//!
//! ## Storage Convention
//!
//! The `sqlx` Any driver only decodes integers, floats, booleans, text and
//! blobs, so temporal values cross the driver boundary as formatted text:
//!
//! - `NaiveDateTime` / `DateTime<Utc>`: `"YYYY-MM-DD HH:MM:SS[.ffffff]"` (UTC)
//! - `NaiveDate`: `"YYYY-MM-DD"`
//!
//! This matches what `CURRENT_TIMESTAMP` produces on SQLite and MySQL, so
//! `create_time` columns filled by the database compare and sort consistently
//! with values written by the application.
//!
//! ## Parsing
//!
//! Reading is lenient: RFC 3339, ISO 8601 with a `T` separator and Postgres'
//! `+00` offset suffix are accepted in addition to the canonical format.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::Error;
use crate::database::Drivers;
use crate::value::{FieldValue, Format, Value};

// ============================================================================
// Formats
// ============================================================================

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DATE_FORMAT: &str = "%Y-%m-%d";

const NAIVE_DATETIME_FALLBACKS: [&str; 3] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M"];

// ============================================================================
// Formatting
// ============================================================================

/// Formats a `NaiveDateTime` in the canonical storage format.
pub fn format_naive_datetime(value: &NaiveDateTime) -> String {
    value.format(DATETIME_FORMAT).to_string()
}

/// Formats a `DateTime<Utc>` in the canonical storage format (UTC, no offset).
pub fn format_datetime_utc(value: &DateTime<Utc>) -> String {
    format_naive_datetime(&value.naive_utc())
}

/// Formats a `NaiveDate` as `YYYY-MM-DD`.
pub fn format_naive_date(value: &NaiveDate) -> String {
    value.format(DATE_FORMAT).to_string()
}

// ============================================================================
// Parsing
// ============================================================================

/// Parses a string into a `NaiveDateTime`.
///
/// A bare date is read as midnight.
pub fn parse_naive_datetime(value: &str) -> Result<NaiveDateTime, Error> {
    let value = value.trim();

    for format in NAIVE_DATETIME_FALLBACKS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(parsed);
        }
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Ok(parsed.naive_utc());
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, DATE_FORMAT) {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight);
        }
    }

    Err(Error::Conversion(format!("Failed to parse NaiveDateTime: {}", value)))
}

/// Parses a string into a `DateTime<Utc>`.
///
/// Offsets are honored when present, values without one are taken as UTC.
pub fn parse_datetime_utc(value: &str) -> Result<DateTime<Utc>, Error> {
    let trimmed = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    // Postgres renders `timestamptz::text` as `2024-03-01 10:00:00+00`.
    if let Ok(parsed) = DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Ok(parsed.with_timezone(&Utc));
    }

    parse_naive_datetime(trimmed)
        .map(|naive| naive.and_utc())
        .map_err(|_| Error::Conversion(format!("Failed to parse DateTime<Utc>: {}", value)))
}

/// Parses a string into a `NaiveDate`, ignoring any time part.
pub fn parse_naive_date(value: &str) -> Result<NaiveDate, Error> {
    let trimmed = value.trim();
    let date_part = trimmed.get(..10).unwrap_or(trimmed);
    NaiveDate::parse_from_str(date_part, DATE_FORMAT)
        .map_err(|e| Error::Conversion(format!("Failed to parse NaiveDate: {}", e)))
}

// ============================================================================
// Type Utilities
// ============================================================================

/// Checks if a portable SQL type is a temporal type.
pub fn is_temporal_type(sql_type: &str) -> bool {
    matches!(sql_type, "TIMESTAMPTZ" | "TIMESTAMP" | "DATE")
}

/// Returns the column type used for a temporal column on `driver`.
///
/// Every driver gets a text column: the Any driver cannot decode native
/// temporal types (SQLite reports `DATE`/`TIMESTAMP` columns as `Datetime`).
pub fn temporal_column_type(sql_type: &str, driver: &Drivers) -> &'static str {
    match (driver, sql_type) {
        (Drivers::SQLite, _) => "TEXT",
        (Drivers::MySQL, "DATE") => "VARCHAR(10)",
        (Drivers::MySQL, _) => "VARCHAR(32)",
        (Drivers::Postgres, _) => "TEXT",
    }
}

/// Default clause for `create_time` columns on `driver`.
pub fn current_timestamp_default(driver: &Drivers) -> &'static str {
    match driver {
        Drivers::SQLite => "DEFAULT CURRENT_TIMESTAMP",
        // Expression defaults are required for non-temporal column types.
        Drivers::MySQL => "DEFAULT (CURRENT_TIMESTAMP)",
        Drivers::Postgres => "DEFAULT (to_char(CURRENT_TIMESTAMP AT TIME ZONE 'UTC', 'YYYY-MM-DD HH24:MI:SS'))",
    }
}

// ============================================================================
// FieldValue Implementations
// ============================================================================

fn expect_text(value: Value, target: &str) -> Result<String, Error> {
    match value {
        Value::Text(s) => Ok(s),
        other => Err(Error::Conversion(format!("cannot convert {} `{}` into {}", other.kind(), other, target))),
    }
}

impl FieldValue for NaiveDateTime {
    const FORMAT: Format = Format::Str;
    const SQL_TYPE: &'static str = "TIMESTAMP";

    fn to_value(&self) -> Value {
        Value::Text(format_naive_datetime(self))
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        parse_naive_datetime(&expect_text(value, "NaiveDateTime")?)
    }
}

impl FieldValue for DateTime<Utc> {
    const FORMAT: Format = Format::Str;
    const SQL_TYPE: &'static str = "TIMESTAMPTZ";

    fn to_value(&self) -> Value {
        Value::Text(format_datetime_utc(self))
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        parse_datetime_utc(&expect_text(value, "DateTime<Utc>")?)
    }
}

impl FieldValue for NaiveDate {
    const FORMAT: Format = Format::Str;
    const SQL_TYPE: &'static str = "DATE";

    fn to_value(&self) -> Value {
        Value::Text(format_naive_date(self))
    }

    fn from_value(value: Value) -> Result<Self, Error> {
        parse_naive_date(&expect_text(value, "NaiveDate")?)
    }
}

// ============================================================================
// Tests
// ============================================================================
