//! SQL assembly.
//!
//! Statements are built from newline separated pieces, in the order
//! operation, `FROM`, joins, `WHERE`, `ORDER BY`, `LIMIT`, `OFFSET`.
//! Identifiers are quoted per driver and every value is bound through a
//! positional placeholder, except `NULL` which is rendered literally.

use crate::{
    Error,
    database::Drivers,
    model::Model,
    validation,
    value::{Row, Value},
};

use super::{Builder, Operation, Operator, Predicate};

/// An assembled statement and its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

/// Accumulates arguments while rendering placeholders.
pub(crate) struct SqlWriter {
    driver: Drivers,
    args: Vec<Value>,
}

impl SqlWriter {
    pub(crate) fn new(driver: Drivers) -> Self {
        Self { driver, args: Vec::new() }
    }

    /// Placeholder for `value`, or the `NULL` literal.
    pub(crate) fn bind(&mut self, value: &Value) -> String {
        if value.is_null() {
            return "NULL".to_string();
        }
        self.args.push(value.clone());
        self.driver.placeholder(self.args.len())
    }

    pub(crate) fn quote(&self, ident: &str) -> String {
        self.driver.quote(ident)
    }

    /// Replaces each `?` outside of quoted literals with the next argument.
    pub(crate) fn raw(&mut self, fragment: &str, args: &[Value]) -> String {
        let mut out = String::with_capacity(fragment.len());
        let mut args = args.iter();
        let mut quote: Option<char> = None;

        for c in fragment.chars() {
            match (c, quote) {
                ('\'' | '"' | '`', None) => {
                    quote = Some(c);
                    out.push(c);
                }
                (c, Some(open)) if c == open => {
                    quote = None;
                    out.push(c);
                }
                ('?', None) => {
                    let value = args.next().cloned().unwrap_or(Value::Null);
                    out.push_str(&self.bind(&value));
                }
                _ => out.push(c),
            }
        }

        out
    }

    pub(crate) fn finish(self, pieces: Vec<String>) -> Statement {
        Statement { sql: pieces.join("\n"), args: self.args }
    }
}

impl<'a, M: Model> Builder<'a, M> {
    pub(crate) fn writer(&self) -> SqlWriter {
        SqlWriter::new(self.conn.driver())
    }

    /// Prefixed table name of `M`.
    pub(crate) fn table(&self) -> String {
        format!("{}{}", self.conn.prefix(), M::table_name())
    }

    /// Quotes `column`, qualifying bare names with the model table.
    fn qualified(&self, w: &SqlWriter, column: &str) -> String {
        if column.contains('.') {
            w.quote(column)
        } else {
            w.quote(&format!("{}.{}", self.table(), column))
        }
    }

    fn render_predicate(&self, w: &mut SqlWriter, predicate: &Predicate) -> String {
        match predicate {
            Predicate::Compare { field, operator, value, .. } => {
                let column = self.qualified(w, field);
                match (operator, value) {
                    (Operator::Eq, Value::Null) => format!("{} IS NULL", column),
                    (Operator::Ne | Operator::LtGt, Value::Null) => format!("{} IS NOT NULL", column),
                    _ => format!("{} {} {}", column, operator, w.bind(value)),
                }
            }
            Predicate::In { field, negated, values, .. } => {
                let column = self.qualified(w, field);
                let placeholders: Vec<String> = values.iter().map(|v| w.bind(v)).collect();
                let keyword = if *negated { "NOT IN" } else { "IN" };
                format!("{} {} ({})", column, keyword, placeholders.join(", "))
            }
            Predicate::Raw { sql, args } => format!("({})", w.raw(sql, args)),
        }
    }

    /// The WHERE clause, falling back to the bound model's primary key when
    /// no predicate was added. `Ok(None)` when there is nothing to filter on.
    pub(crate) fn where_clause(&self, w: &mut SqlWriter) -> Result<Option<String>, Error> {
        if !self.wheres.is_empty() {
            let parts: Vec<String> = self.wheres.iter().map(|p| self.render_predicate(w, p)).collect();
            return Ok(Some(format!("WHERE {}", parts.join(" AND "))));
        }

        let Some(value) = self.model.as_ref().and_then(Model::primary_key_value) else {
            return Ok(None);
        };

        let pk = M::primary_key_name();
        let value = validation::validate_field(&M::columns(), pk, &value)
            .map_err(|e| Error::InvalidData(format!("primary key fallback failed: {}", e)))?;
        let column = self.qualified(w, pk);
        Ok(Some(format!("WHERE {} = {}", column, w.bind(&value))))
    }

    fn order_clause(&self, w: &SqlWriter) -> Option<String> {
        if self.order.is_empty() {
            return None;
        }
        let parts: Vec<String> =
            self.order.iter().map(|(column, direction)| format!("{} {}", w.quote(column), direction.as_str())).collect();
        Some(format!("ORDER BY {}", parts.join(", ")))
    }

    fn limit_offset(&self, limit: Option<u64>, offset: Option<u64>) -> Vec<String> {
        let mut pieces = Vec::new();
        match (limit, offset) {
            (Some(limit), _) => pieces.push(format!("LIMIT {}", limit)),
            (None, Some(_)) => {
                if let Some(unbounded) = self.conn.driver().unbounded_limit() {
                    pieces.push(format!("LIMIT {}", unbounded));
                }
            }
            (None, None) => {}
        }
        if let Some(offset) = offset {
            pieces.push(format!("OFFSET {}", offset));
        }
        pieces
    }

    fn join_lines(&self, w: &SqlWriter) -> Vec<String> {
        self.joins
            .iter()
            .map(|join| {
                format!(
                    "JOIN {} ON {} = {}",
                    w.quote(&join.table),
                    self.qualified(w, &join.model_column),
                    w.quote(&format!("{}.{}", join.table, join.left_column)),
                )
            })
            .collect()
    }

    /// Assembles a read statement headed by `head`. ORDER/LIMIT/OFFSET are
    /// rendered only when `with_tail`.
    ///
    /// A failing primary-key fallback marks the Builder invalid.
    fn read_statement(&mut self, head: String, with_tail: bool) -> Option<Statement> {
        if self.invalid.is_some() {
            return None;
        }

        let mut w = self.writer();
        let mut pieces = vec![head, format!("FROM {}", w.quote(&self.table()))];
        pieces.extend(self.join_lines(&w));

        match self.where_clause(&mut w) {
            Ok(Some(clause)) => pieces.push(clause),
            Ok(None) => {}
            Err(e) => {
                self.invalid = Some(e);
                return None;
            }
        }

        if with_tail {
            pieces.extend(self.order_clause(&w));
            pieces.extend(self.limit_offset(self.limit, self.offset));
        }

        Some(w.finish(pieces))
    }

    /// `SELECT *` with every clause.
    pub(crate) fn select_statement(&mut self) -> Option<Statement> {
        self.operation = Operation::Select;
        self.read_statement("SELECT *".to_string(), true)
    }

    /// `SELECT COUNT(..)`, without ORDER/LIMIT/OFFSET.
    pub(crate) fn count_statement(&mut self, column: Option<&str>) -> Option<Statement> {
        self.operation = Operation::Count(column.map(str::to_string));
        let head = match column {
            Some(column) => format!("SELECT COUNT({})", self.conn.driver().quote(column)),
            None => "SELECT COUNT(*)".to_string(),
        };
        self.read_statement(head, false)
    }

    /// `SELECT EXISTS (<select>)`.
    pub(crate) fn exists_statement(&mut self) -> Option<Statement> {
        let inner = self.select_statement()?;
        Some(Statement { sql: format!("SELECT EXISTS (\n{}\n)", inner.sql), args: inner.args })
    }

    /// Multi-row INSERT. Every row must carry `columns`, in order.
    pub(crate) fn insert_statement(&self, columns: &[&str], rows: &[Row]) -> Statement {
        let mut w = self.writer();
        let column_list: Vec<String> = columns.iter().map(|c| w.quote(c)).collect();

        let tuples: Vec<String> = rows
            .iter()
            .map(|row| {
                let values: Vec<String> =
                    columns.iter().map(|c| w.bind(row.get(c).unwrap_or(&Value::Null))).collect();
                format!("({})", values.join(", "))
            })
            .collect();

        let pieces = vec![
            format!("INSERT INTO {} ({})", w.quote(&self.table()), column_list.join(", ")),
            format!("VALUES {}", tuples.join(",\n")),
        ];
        w.finish(pieces)
    }

    /// `UPDATE .. SET ..` plus the WHERE clause. Without one the Builder is
    /// marked invalid.
    pub(crate) fn update_statement(&mut self, set: &Row) -> Option<Statement> {
        self.operation = Operation::Update;
        if self.invalid.is_some() {
            return None;
        }

        let mut w = self.writer();
        let assignments: Vec<String> =
            set.iter().map(|(column, value)| format!("{} = {}", w.quote(column), w.bind(value))).collect();
        let mut pieces = vec![format!("UPDATE {}", w.quote(&self.table())), format!("SET {}", assignments.join(", "))];

        match self.where_clause(&mut w) {
            Ok(Some(clause)) => pieces.push(clause),
            Ok(None) => {
                self.invalid = Some(Error::invalid_data("UPDATE without WHERE clause or persisted model"));
                return None;
            }
            Err(e) => {
                self.invalid = Some(e);
                return None;
            }
        }

        Some(w.finish(pieces))
    }

    /// `DELETE FROM ..`. `None` without a WHERE clause: a DELETE never
    /// targets the whole table.
    pub(crate) fn delete_statement(&mut self) -> Option<Statement> {
        self.operation = Operation::Delete;
        if self.invalid.is_some() {
            return None;
        }

        let mut w = self.writer();
        let clause = match self.where_clause(&mut w) {
            Ok(clause) => clause?,
            Err(e) => {
                self.invalid = Some(e);
                return None;
            }
        };

        let head = format!("DELETE FROM {}", w.quote(&self.table()));
        Some(w.finish(vec![head, clause]))
    }

    /// `DELETE FROM .. WHERE pk IN (..)`.
    pub(crate) fn delete_keys_statement(&self, keys: &[Value]) -> Statement {
        let mut w = self.writer();
        let placeholders: Vec<String> = keys.iter().map(|k| w.bind(k)).collect();
        let pieces = vec![
            format!("DELETE FROM {}", w.quote(&self.table())),
            format!("WHERE {} IN ({})", w.quote(M::primary_key_name()), placeholders.join(", ")),
        ];
        w.finish(pieces)
    }

    /// INSERT that updates the non-unique columns of a conflicting row.
    pub(crate) fn upsert_statement(&self, row: &Row, unique_by: &[&str]) -> Statement {
        let columns = row.columns();
        let mut statement = self.insert_statement(&columns, std::slice::from_ref(row));
        let driver = self.conn.driver();
        let updates: Vec<&(String, Value)> = row.iter().filter(|(c, _)| !unique_by.contains(&c.as_str())).collect();

        let clause = match driver {
            Drivers::MySQL => {
                let mut w = SqlWriter { driver, args: std::mem::take(&mut statement.args) };
                let assignments: Vec<String> = if updates.is_empty() {
                    let first = w.quote(unique_by[0]);
                    vec![format!("{} = {}", first, first)]
                } else {
                    updates.iter().map(|(c, v)| format!("{} = {}", w.quote(c), w.bind(v))).collect()
                };
                statement.args = w.args;
                format!("ON DUPLICATE KEY UPDATE {}", assignments.join(", "))
            }
            Drivers::SQLite | Drivers::Postgres => {
                let target: Vec<String> = unique_by.iter().map(|c| driver.quote(c)).collect();
                if updates.is_empty() {
                    format!("ON CONFLICT ({}) DO NOTHING", target.join(", "))
                } else {
                    let assignments: Vec<String> = updates
                        .iter()
                        .map(|(c, _)| format!("{} = excluded.{}", driver.quote(c), driver.quote(c)))
                        .collect();
                    format!("ON CONFLICT ({}) DO UPDATE SET {}", target.join(", "), assignments.join(", "))
                }
            }
        };

        statement.sql.push('\n');
        statement.sql.push_str(&clause);
        statement
    }

    /// `SELECT * .. LIMIT 1` on the unique columns of `row`.
    pub(crate) fn precheck_statement(&self, row: &Row, unique_by: &[&str]) -> Statement {
        let mut w = self.writer();
        let conditions: Vec<String> = unique_by
            .iter()
            .map(|c| match row.get(c).unwrap_or(&Value::Null) {
                Value::Null => format!("{} IS NULL", w.quote(c)),
                value => format!("{} = {}", w.quote(c), w.bind(value)),
            })
            .collect();

        let pieces = vec![
            "SELECT *".to_string(),
            format!("FROM {}", w.quote(&self.table())),
            format!("WHERE {}", conditions.join(" AND ")),
            "LIMIT 1".to_string(),
        ];
        w.finish(pieces)
    }

    /// One `find_all` batch: `=` for a single value, `IN` otherwise.
    pub(crate) fn find_all_statement(&self, column: &str, values: &[Value], batch: u64, offset: u64) -> Statement {
        let mut w = self.writer();
        let quoted = w.quote(column);
        let condition = match values {
            [single] => format!("WHERE {} = {}", quoted, w.bind(single)),
            many => {
                let placeholders: Vec<String> = many.iter().map(|v| w.bind(v)).collect();
                format!("WHERE {} IN ({})", quoted, placeholders.join(", "))
            }
        };

        let mut pieces = vec!["SELECT *".to_string(), format!("FROM {}", w.quote(&self.table())), condition];
        pieces.extend(self.order_clause(&w));
        pieces.extend(self.limit_offset(Some(batch), Some(offset)));
        w.finish(pieces)
    }
}
