//! # Query Builder Module
//!
//! The [`Builder`] is the per-chain query state over one [`Model`] type and,
//! optionally, one bound model instance.
//!
//! Clause methods (`filter`, `filter_in`, `join`, `order_by`, `limit`, ...)
//! consume and return the Builder. Terminal methods (`get`, `find`, `count`,
//! `insert`, `update`, `upsert`, `delete`, ...) take `&mut self`, assemble one
//! statement, consult or populate the cache and execute through the
//! [`Connection`] trait.
//!
//! ## Failure Model
//!
//! A bad operator, a value failing validation or an unresolvable primary-key
//! fallback marks the Builder invalid. The state is sticky until [`reset`]:
//! every terminal then returns its empty/zero/`None` sentinel, and
//! [`invalid_reason`] tells why. Driver failures are logged and stored in
//! [`last_error`], the terminal returning the same sentinel as an empty result.
//!
//! [`reset`]: Builder::reset
//! [`invalid_reason`]: Builder::invalid_reason
//! [`last_error`]: Builder::last_error
//!
//! ## Example
//!
//! ```rust,ignore
//! let occurrences = db
//!     .model::<Occurrence>()
//!     .equals("post_id", 23)
//!     .filter("start_date", ">=", "2024-03-01 00:00:00")
//!     .order_by("start_date", "ASC")
//!     .limit(10)
//!     .models()
//!     .await;
//! ```

mod read;
mod sql;
mod write;

// ============================================================================
// External Crate Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

// ============================================================================
// Internal Crate Imports
// ============================================================================

use crate::{
    Error,
    cache::{Cache, CacheKey, Trigger},
    config::BuilderConfig,
    database::Connection,
    errors::ValidationError,
    model::Model,
    validation,
    value::{Format, Row, Value},
};

pub use sql::Statement;

// ============================================================================
// Clause Types
// ============================================================================

/// Statement kind of the last terminal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Operation {
    #[default]
    Select,
    /// `COUNT(*)`, or `COUNT(column)`.
    Count(Option<String>),
    Update,
    Delete,
}

/// Comparison operator of a `filter` predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    /// `!=`
    Ne,
    /// `<>`
    LtGt,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Le => "<=",
            Operator::Ge => ">=",
            Operator::Ne => "!=",
            Operator::LtGt => "<>",
        }
    }

    /// `=`, the only operator whose value addresses cacheable lookups.
    pub fn is_equality(&self) -> bool {
        matches!(self, Operator::Eq)
    }
}

impl FromStr for Operator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "=" => Ok(Operator::Eq),
            "<" => Ok(Operator::Lt),
            ">" => Ok(Operator::Gt),
            "<=" => Ok(Operator::Le),
            ">=" => Ok(Operator::Ge),
            "!=" => Ok(Operator::Ne),
            "<>" => Ok(Operator::LtGt),
            other => Err(Error::InvalidOperator(other.to_string())),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One WHERE predicate, also used as the structured record for cache
/// invalidation.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column <op> value`, value already coerced to `format`.
    Compare { field: String, operator: Operator, value: Value, format: Format },
    /// `column [NOT] IN (values)`.
    In { field: String, negated: bool, values: Vec<Value>, format: Format },
    /// Caller supplied fragment with `?` placeholders.
    Raw { sql: String, args: Vec<Value> },
}

impl Predicate {
    /// Column the predicate applies to, `None` for raw fragments.
    pub fn field(&self) -> Option<&str> {
        match self {
            Predicate::Compare { field, .. } | Predicate::In { field, .. } => Some(field),
            Predicate::Raw { .. } => None,
        }
    }

    /// Operator tag: the comparison operator, `IN`, `NOT IN` or `raw`.
    pub fn operator(&self) -> &'static str {
        match self {
            Predicate::Compare { operator, .. } => operator.as_str(),
            Predicate::In { negated: false, .. } => "IN",
            Predicate::In { negated: true, .. } => "NOT IN",
            Predicate::Raw { .. } => "raw",
        }
    }

    /// Placeholder format, `None` for raw fragments.
    pub fn format(&self) -> Option<Format> {
        match self {
            Predicate::Compare { format, .. } | Predicate::In { format, .. } => Some(*format),
            Predicate::Raw { .. } => None,
        }
    }

    /// `(field, value)` pairs that address single rows: equality comparisons
    /// and `IN` lists.
    pub(crate) fn lookup_pairs(&self) -> Vec<(&str, &Value)> {
        match self {
            Predicate::Compare { field, operator, value, .. } if operator.is_equality() && !value.is_null() => {
                vec![(field.as_str(), value)]
            }
            Predicate::In { field, negated: false, values, .. } => {
                values.iter().map(|value| (field.as_str(), value)).collect()
            }
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Join {
    table: String,
    left_column: String,
    model_column: String,
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    /// Case-insensitive `ASC` / `DESC`.
    pub fn parse(direction: &str) -> Option<Self> {
        match direction.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(Direction::Asc),
            "DESC" => Some(Direction::Desc),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Shape of the rows returned by `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Model instances.
    #[default]
    Model,
    /// Column-keyed rows.
    Assoc,
    /// Value lists in column order.
    Numeric,
}

/// One row returned by `get`, shaped by the output format.
#[derive(Debug, Clone, PartialEq)]
pub enum Record<M> {
    Model(M),
    Assoc(Row),
    Numeric(Vec<Value>),
}

impl<M: Model> Record<M> {
    /// The model, converting column-keyed rows when needed.
    pub fn into_model(self) -> Option<M> {
        match self {
            Record::Model(model) => Some(model),
            Record::Assoc(row) => M::from_row(&row).ok(),
            Record::Numeric(_) => None,
        }
    }

    /// The row, `None` for value lists.
    pub fn into_row(self) -> Option<Row> {
        match self {
            Record::Model(model) => Some(model.to_row()),
            Record::Assoc(row) => Some(row),
            Record::Numeric(_) => None,
        }
    }

    /// Value of one column, `None` for value lists.
    pub fn field(&self, column: &str) -> Option<Value> {
        match self {
            Record::Model(model) => model.to_row().get(column).cloned(),
            Record::Assoc(row) => row.get(column).cloned(),
            Record::Numeric(_) => None,
        }
    }
}

/// Outcome of an `upsert`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertResult {
    Inserted,
    Updated,
    /// The stored row already matched, or the Builder ran dry.
    Unchanged,
}

// ============================================================================
// Builder
// ============================================================================

/// Fluent, cache-aware query builder over model `M`.
///
/// Created by `Database::model` or `Database::bind`.
pub struct Builder<'a, M: Model> {
    pub(crate) conn: &'a dyn Connection,
    pub(crate) cache: &'a dyn Cache,
    pub(crate) config: BuilderConfig,
    pub(crate) model: Option<M>,
    pub(crate) operation: Operation,
    pub(crate) wheres: Vec<Predicate>,
    pub(crate) joins: Vec<Join>,
    pub(crate) order: Vec<(String, Direction)>,
    pub(crate) limit: Option<u64>,
    pub(crate) offset: Option<u64>,
    pub(crate) output_format: OutputFormat,
    pub(crate) invalid: Option<Error>,
    pub(crate) rejected: Vec<ValidationError>,
    pub(crate) queries: Vec<String>,
    pub(crate) batch_size: usize,
    pub(crate) execute_queries: bool,
    pub(crate) last_error: Option<Error>,
}

impl<'a, M: Model> Builder<'a, M> {
    /// Creates a Builder over any [`Connection`].
    ///
    /// Usually called via `db.model::<M>()`; calling it directly allows
    /// wrapping the connection (e.g. to observe round trips).
    pub fn new(conn: &'a dyn Connection, cache: &'a dyn Cache, config: BuilderConfig) -> Self {
        let batch_size = config.batch_size.max(1);
        Self {
            conn,
            cache,
            config,
            model: None,
            operation: Operation::default(),
            wheres: Vec::new(),
            joins: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            output_format: OutputFormat::default(),
            invalid: None,
            rejected: Vec::new(),
            queries: Vec::new(),
            batch_size,
            execute_queries: true,
            last_error: None,
        }
    }

    // ========================================================================
    // Bound Model
    // ========================================================================

    /// Binds a model instance.
    pub fn set_model(mut self, model: M) -> Self {
        self.model = Some(model);
        self
    }

    pub fn model(&self) -> Option<&M> {
        self.model.as_ref()
    }

    pub fn into_model(self) -> Option<M> {
        self.model
    }

    // ========================================================================
    // WHERE Clauses
    // ========================================================================

    /// Adds `column <operator> value`.
    ///
    /// Supported operators: `= < > <= >= != <>`. Anything else, or a value
    /// failing the column's validation, marks the Builder invalid.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// db.model::<Occurrence>().filter("duration", ">", 3600).get().await;
    /// ```
    pub fn filter(mut self, column: &str, operator: &str, value: impl Into<Value>) -> Self {
        self.push_filter(column, operator, value.into());
        self
    }

    /// Shorthand for `filter(column, "=", value)`.
    pub fn equals(self, column: &str, value: impl Into<Value>) -> Self {
        self.filter(column, "=", value)
    }

    /// Adds `column IN (values)`.
    ///
    /// Values failing validation are dropped and listed in `rejected()`. When
    /// none is left no predicate is added.
    pub fn filter_in<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.push_in(column, false, values.into_iter().map(Into::into).collect());
        self
    }

    /// Adds `column NOT IN (values)`, with the same rules as `filter_in`.
    pub fn filter_not_in<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        self.push_in(column, true, values.into_iter().map(Into::into).collect());
        self
    }

    /// Adds a raw fragment. Each `?` is bound to the next value of `args`.
    ///
    /// ```rust,ignore
    /// db.model::<Occurrence>()
    ///     .filter_raw("start_date < end_date AND duration BETWEEN ? AND ?", vec![60.into(), 3600.into()])
    ///     .count(None)
    ///     .await;
    /// ```
    pub fn filter_raw(mut self, sql: &str, args: Vec<Value>) -> Self {
        if self.invalid.is_none() {
            self.wheres.push(Predicate::Raw { sql: sql.to_string(), args });
        }
        self
    }

    pub(crate) fn push_filter(&mut self, column: &str, operator: &str, value: Value) {
        if self.invalid.is_some() {
            return;
        }

        let operator = match operator.parse::<Operator>() {
            Ok(operator) => operator,
            Err(e) => {
                self.invalid = Some(e);
                return;
            }
        };

        let columns = M::columns();
        match validation::validate_field(&columns, column, &value) {
            Ok(value) => {
                let format = columns.iter().find(|c| c.name == column).map(|c| c.format).unwrap_or(Format::Str);
                self.wheres.push(Predicate::Compare { field: column.to_string(), operator, value, format });
            }
            Err(e) => self.invalid = Some(Error::Validation(e.into())),
        }
    }

    fn push_in(&mut self, column: &str, negated: bool, values: Vec<Value>) {
        if self.invalid.is_some() {
            return;
        }

        let columns = M::columns();
        let mut valid = Vec::with_capacity(values.len());
        for value in values {
            // NULL never matches IN.
            let checked = match value {
                Value::Null => Err(ValidationError::new(column, "cannot be NULL in a list")),
                value => validation::validate_field(&columns, column, &value),
            };
            match checked {
                Ok(value) => valid.push(value),
                Err(e) => {
                    log::debug!(column = column, error = e.message.as_str(); "Value rejected from IN list.");
                    self.rejected.push(e);
                }
            }
        }

        if valid.is_empty() {
            return;
        }

        let format = columns.iter().find(|c| c.name == column).map(|c| c.format).unwrap_or(Format::Str);
        self.wheres.push(Predicate::In { field: column.to_string(), negated, values: valid, format });
    }

    // ========================================================================
    // JOIN, ORDER, LIMIT, OFFSET
    // ========================================================================

    /// Adds `JOIN table ON <model table>.model_column = table.left_column`.
    ///
    /// `table` is used verbatim; see `join_model` for prefixed model tables.
    pub fn join(mut self, table: &str, left_column: &str, model_column: &str) -> Self {
        if self.invalid.is_none() {
            self.joins.push(Join {
                table: table.to_string(),
                left_column: left_column.to_string(),
                model_column: model_column.to_string(),
            });
        }
        self
    }

    /// Joins the (prefixed) table of model `O`.
    pub fn join_model<O: Model>(self, left_column: &str, model_column: &str) -> Self {
        let table = format!("{}{}", self.conn.prefix(), O::table_name());
        self.join(&table, left_column, model_column)
    }

    /// Adds an ORDER BY entry. Directions other than `ASC`/`DESC` are ignored.
    pub fn order_by(mut self, column: &str, direction: &str) -> Self {
        if let Some(direction) = Direction::parse(direction) {
            self.order.push((column.to_string(), direction));
        }
        self
    }

    /// Orders by the primary key.
    pub fn order_by_key(self, direction: &str) -> Self {
        self.order_by(M::primary_key_name(), direction)
    }

    /// Sets LIMIT. Negative values are ignored.
    pub fn limit(mut self, limit: i64) -> Self {
        if let Ok(limit) = u64::try_from(limit) {
            self.limit = Some(limit);
        }
        self
    }

    /// Sets OFFSET, clamped to zero.
    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset.max(0) as u64);
        self
    }

    // ========================================================================
    // Behaviour
    // ========================================================================

    /// Shape of the rows returned by `get`.
    pub fn output(mut self, format: OutputFormat) -> Self {
        self.output_format = format;
        self
    }

    /// Rows per batch for `insert`, `find_all`, `all` and `upsert_set`.
    pub fn set_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// Per-instance execution switch, AND-ed with the configuration.
    ///
    /// When off, statements are still assembled and recorded in `queries()`.
    pub fn enable_query_execution(mut self, enabled: bool) -> Self {
        self.execute_queries = enabled;
        self
    }

    /// Clears the query state: wheres, joins, order, limit, offset, operation,
    /// the invalid flag and rejected values. The bound model, the output
    /// format, the batch size and the query log are kept.
    pub fn reset(&mut self) -> &mut Self {
        self.operation = Operation::default();
        self.wheres.clear();
        self.joins.clear();
        self.order.clear();
        self.limit = None;
        self.offset = None;
        self.invalid = None;
        self.rejected.clear();
        self
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Every SQL statement assembled so far, executed or not.
    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn has_invalid_queries(&self) -> bool {
        self.invalid.is_some()
    }

    /// Why the Builder is invalid.
    pub fn invalid_reason(&self) -> Option<&Error> {
        self.invalid.as_ref()
    }

    /// Values dropped from `filter_in` / `filter_not_in` lists.
    pub fn rejected(&self) -> &[ValidationError] {
        &self.rejected
    }

    /// Driver failure of the last terminal, if any.
    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    /// The WHERE predicates, in call order.
    pub fn where_args(&self) -> &[Predicate] {
        &self.wheres
    }

    pub fn operation(&self) -> &Operation {
        &self.operation
    }

    // ========================================================================
    // Execution
    // ========================================================================

    pub(crate) fn can_execute(&self) -> bool {
        self.execute_queries && self.config.execute_queries
    }

    /// Clears the previous terminal's driver failure.
    pub(crate) fn begin(&mut self) {
        self.last_error = None;
    }

    fn record_failure(&mut self, source: &'static str, sql: &str, error: Error) {
        let message = error.to_string();
        log::debug!(
            source = source,
            table = M::table_name(),
            sql = sql,
            error = message.as_str();
            "Builder: query failure."
        );
        self.last_error = Some(error);
    }

    /// Runs a query. `None` on failure or when execution is off.
    pub(crate) async fn run_fetch(&mut self, source: &'static str, statement: &Statement) -> Option<Vec<Row>> {
        self.queries.push(statement.sql.clone());
        if !self.can_execute() {
            return None;
        }

        match self.conn.fetch_all(&statement.sql, &statement.args).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                self.record_failure(source, &statement.sql, e);
                None
            }
        }
    }

    /// Runs a statement. `None` on failure or when execution is off.
    pub(crate) async fn run_execute(&mut self, source: &'static str, statement: &Statement) -> Option<u64> {
        self.queries.push(statement.sql.clone());
        if !self.can_execute() {
            return None;
        }

        match self.conn.execute(&statement.sql, &statement.args).await {
            Ok(affected) => Some(affected),
            Err(e) => {
                self.record_failure(source, &statement.sql, e);
                None
            }
        }
    }

    /// Runs a scalar query. `None` on failure or when execution is off.
    pub(crate) async fn run_scalar(&mut self, source: &'static str, statement: &Statement) -> Option<Value> {
        self.queries.push(statement.sql.clone());
        if !self.can_execute() {
            return None;
        }

        match self.conn.fetch_scalar(&statement.sql, &statement.args).await {
            Ok(value) => Some(value),
            Err(e) => {
                self.record_failure(source, &statement.sql, e);
                None
            }
        }
    }

    // ========================================================================
    // Cache Helpers
    // ========================================================================

    /// Deletes the point-lookup entry of `M` for `field = value`.
    pub(crate) fn forget_lookup(&self, field: &str, value: &Value) {
        self.cache.delete(&CacheKey::lookup::<M>(field, value));
    }

    /// Deletes the point-lookup entries addressing `model`: primary key and
    /// unique columns.
    pub(crate) fn forget_model(&self, model: &M) {
        self.forget_row(&model.to_row());
    }

    pub(crate) fn forget_row(&self, row: &Row) {
        let columns = M::columns();
        for name in M::unique_columns() {
            let Some(value) = row.get(name) else { continue };
            if value.is_null() {
                continue;
            }
            // Keys are built from coerced values, as `find` does.
            if let Ok(coerced) = validation::validate_field(&columns, name, value) {
                self.forget_lookup(name, &coerced);
            }
        }
    }

    /// Marks every entry stored under the write trigger as stale.
    pub(crate) fn bump_write_trigger(&self) {
        self.cache.set_last_occurrence(Trigger::WRITE);
    }

    /// Deletes the point-lookup entries of the bound model.
    ///
    /// ```rust,ignore
    /// let mut builder = db.bind(occurrence);
    /// builder.flush_model_cache();
    /// ```
    pub fn flush_model_cache(&self) {
        if let Some(model) = &self.model {
            self.forget_model(model);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests;
