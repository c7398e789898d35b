//! Write terminals: `insert`, `update`, `upsert`, `delete` and `upsert_set`.
//!
//! Every row is validated before any SQL is assembled. Successful writes bump
//! the write trigger and delete the point-lookup entries they can name.

use crate::{
    Error,
    model::Model,
    validation,
    value::{Row, Value},
};

use super::{Builder, UpsertResult};

impl<'a, M: Model> Builder<'a, M> {
    /// Inserts `rows` in chunks of `batch_size`, one multi-row INSERT each.
    ///
    /// Invalid rows are skipped and logged, as are rows whose column set
    /// differs from the first valid row of their chunk. Returns the number of
    /// inserted rows.
    ///
    /// ```rust,ignore
    /// let inserted = db
    ///     .model::<Occurrence>()
    ///     .insert(vec![
    ///         Row::new().with("post_id", 23).with("start_date", "2024-03-01 10:00:00"),
    ///         Row::new().with("post_id", 23).with("start_date", "2024-03-08 10:00:00"),
    ///     ])
    ///     .await;
    /// ```
    pub async fn insert(&mut self, rows: Vec<Row>) -> u64 {
        self.begin();
        if self.invalid.is_some() {
            return 0;
        }

        let columns = M::columns();
        let mut inserted = 0;

        for chunk in rows.chunks(self.batch_size) {
            let mut valid: Vec<Row> = Vec::with_capacity(chunk.len());

            for row in chunk {
                let formatted = match validation::validate_row(&columns, row, None) {
                    Ok(formatted) => formatted,
                    Err(errors) => {
                        let message = errors.to_string();
                        log::debug!(table = M::table_name(), error = message.as_str(); "Skipping invalid row.");
                        continue;
                    }
                };

                if let Some(first) = valid.first() {
                    if first.columns() != formatted.columns() {
                        log::warn!(table = M::table_name(); "Skipping row with a different column set.");
                        continue;
                    }
                }

                valid.push(formatted);
            }

            let Some(first) = valid.first() else {
                continue;
            };

            let statement = self.insert_statement(&first.columns(), &valid);
            inserted += self.run_execute("Builder::insert", &statement).await.unwrap_or(0);
        }

        if inserted > 0 {
            self.bump_write_trigger();
        }
        inserted
    }

    pub async fn insert_one(&mut self, row: Row) -> u64 {
        self.insert(vec![row]).await
    }

    pub async fn insert_models(&mut self, models: &[M]) -> u64 {
        self.insert(models.iter().map(Model::to_row).collect()).await
    }

    /// Updates the matching rows.
    ///
    /// With `data`, only its columns are validated and set. Without, the
    /// bound model's full row (minus its primary key) is. The WHERE clause
    /// falls back to the bound model's primary key; with neither predicates
    /// nor a persisted bound model nothing is updated and the Builder is
    /// marked invalid.
    ///
    /// Returns the affected count, `None` when invalid, failed or not executed.
    ///
    /// ```rust,ignore
    /// db.model::<Occurrence>()
    ///     .equals("post_id", 23)
    ///     .update(Some(Row::new().with("duration", 7200)))
    ///     .await;
    /// ```
    pub async fn update(&mut self, data: Option<Row>) -> Option<u64> {
        self.begin();
        if self.invalid.is_some() {
            return None;
        }

        let columns = M::columns();
        let checked = match (&data, &self.model) {
            (Some(row), _) => validation::validate_row(&columns, row, Some(row.columns().as_slice())),
            (None, Some(model)) => {
                let mut row = model.to_row();
                row.remove(M::primary_key_name());
                validation::validate_row(&columns, &row, None)
            }
            (None, None) => {
                self.invalid = Some(Error::invalid_data("Nothing to update: no data and no bound model"));
                return None;
            }
        };

        let set = match checked {
            Ok(set) if set.is_empty() => {
                self.invalid = Some(Error::invalid_data("Nothing to update: no column to set"));
                return None;
            }
            Ok(set) => set,
            Err(errors) => {
                self.invalid = Some(Error::Validation(errors));
                return None;
            }
        };

        let statement = self.update_statement(&set)?;
        let affected = self.run_execute("Builder::update", &statement).await?;

        self.bump_write_trigger();

        if let Some(model) = self.model.take() {
            self.forget_model(&model);

            let mut merged = model.to_row();
            merged.merge(&set);
            match M::from_row(&merged) {
                Ok(updated) => {
                    self.forget_model(&updated);
                    self.model = Some(updated);
                }
                Err(e) => {
                    let message = e.to_string();
                    log::warn!(table = M::table_name(), error = message.as_str(); "Updated model could not be rebuilt.");
                    self.model = Some(model);
                }
            }
        }

        self.forget_predicate_lookups();
        Some(affected)
    }

    /// Inserts `data` (or the bound model), updating the row that conflicts on
    /// `unique_by` instead.
    ///
    /// Fails with `InvalidArgument` when `unique_by` is empty or the data
    /// lacks one of its columns. Validation and driver failures give
    /// `Ok(None)`. A dry run gives `Unchanged`.
    ///
    /// ```rust,ignore
    /// let outcome = db
    ///     .model::<Occurrence>()
    ///     .upsert(&["hash"], Some(row))
    ///     .await?;
    /// ```
    pub async fn upsert(&mut self, unique_by: &[&str], data: Option<Row>) -> Result<Option<UpsertResult>, Error> {
        self.begin();
        if unique_by.is_empty() {
            return Err(Error::invalid_argument("A series of unique columns needs to be specified."));
        }
        if self.invalid.is_some() {
            return Ok(None);
        }

        let from_model = data.is_none();
        let row = match (data, &self.model) {
            (Some(row), _) => row,
            (None, Some(model)) => model.to_row(),
            (None, None) => return Err(Error::invalid_argument("Nothing to upsert: no data and no bound model.")),
        };
        Self::require_unique_columns(&row, unique_by)?;

        let formatted = match validation::validate_row(&M::columns(), &row, None) {
            Ok(formatted) => formatted,
            Err(errors) => {
                let message = errors.to_string();
                log::error!(table = M::table_name(), error = message.as_str(); "Model validation failed on upsert.");
                self.invalid = Some(Error::Validation(errors));
                return Ok(None);
            }
        };
        // Unassigned keys are dropped by formatting.
        Self::require_unique_columns(&formatted, unique_by)?;

        let statement = self.upsert_statement(&formatted, unique_by);
        if !self.can_execute() {
            self.queries.push(statement.sql);
            return Ok(Some(UpsertResult::Unchanged));
        }

        let mut outcome = None;
        if self.config.upsert_precheck {
            let check = self.precheck_statement(&formatted, unique_by);
            let Some(existing) = self.run_fetch("Builder::upsert", &check).await else {
                return Ok(None);
            };
            outcome = match existing.first() {
                None => Some(UpsertResult::Inserted),
                Some(stored) if Self::matches_stored(stored, &formatted) => return Ok(Some(UpsertResult::Unchanged)),
                Some(_) => Some(UpsertResult::Updated),
            };
        }

        let Some(affected) = self.run_execute("Builder::upsert", &statement).await else {
            return Ok(None);
        };

        if from_model {
            self.flush_model_cache();
        } else {
            for column in unique_by {
                if let Some(value) = formatted.get(column) {
                    self.forget_lookup(column, value);
                }
            }
            self.forget_row(&formatted);
        }
        self.bump_write_trigger();

        Ok(Some(outcome.unwrap_or(match affected {
            0 => UpsertResult::Unchanged,
            1 => UpsertResult::Inserted,
            _ => UpsertResult::Updated,
        })))
    }

    fn require_unique_columns(row: &Row, unique_by: &[&str]) -> Result<(), Error> {
        match unique_by.iter().find(|column| !row.contains(column)) {
            Some(missing) => Err(Error::InvalidArgument(format!("Unique column `{}` is missing from the data.", missing))),
            None => Ok(()),
        }
    }

    /// Whether the stored row already holds every formatted value.
    fn matches_stored(stored: &Row, formatted: &Row) -> bool {
        let columns = M::columns();
        formatted.iter().all(|(column, value)| {
            stored.get(column).is_some_and(|current| {
                current == value || validation::validate_field(&columns, column, current).is_ok_and(|c| c == *value)
            })
        })
    }

    /// Deletes the matching rows and resets the bound model.
    ///
    /// A DELETE without WHERE clause (no predicate and no persisted bound
    /// model) is never issued. Returns the deleted count, 0 on failure.
    pub async fn delete(&mut self) -> u64 {
        self.begin();
        let Some(statement) = self.delete_statement() else {
            return 0;
        };

        let deleted = self.run_execute("Builder::delete", &statement).await.unwrap_or(0);
        if deleted == 0 {
            return 0;
        }

        self.bump_write_trigger();
        self.forget_predicate_lookups();
        if let Some(model) = self.model.take() {
            self.forget_model(&model);
        }
        deleted
    }

    /// Replaces rows: deletes every row by primary key, then inserts them all.
    ///
    /// Count mismatches are logged as warnings. Returns the inserted count.
    pub async fn upsert_set(&mut self, rows: Vec<Row>) -> u64 {
        self.begin();
        if self.invalid.is_some() || rows.is_empty() {
            return 0;
        }

        let pk = M::primary_key_name();
        let columns = M::columns();
        let keys: Vec<Value> = rows
            .iter()
            .filter_map(|row| row.get(pk))
            .filter_map(|value| validation::validate_field(&columns, pk, value).ok())
            .filter(|value| !value.is_null())
            .collect();

        let mut deleted = 0;
        for chunk in keys.chunks(self.batch_size) {
            let statement = self.delete_keys_statement(chunk);
            deleted += self.run_execute("Builder::upsert_set", &statement).await.unwrap_or(0);
        }
        let delete_error = self.last_error.take();

        for row in &rows {
            self.forget_row(row);
        }
        if deleted > 0 {
            self.bump_write_trigger();
        }

        let expected = rows.len() as u64;
        let executing = self.can_execute();
        if executing && deleted != expected {
            log::warn!(
                table = M::table_name(),
                primary_key = pk,
                expected = expected,
                deleted = deleted;
                "Mismatching number of deletions."
            );
        }

        let inserted = self.insert(rows).await;
        if executing && inserted != expected {
            log::warn!(
                table = M::table_name(),
                expected = expected,
                inserted = inserted;
                "Mismatching number of insertions."
            );
        }

        if self.last_error.is_none() {
            self.last_error = delete_error;
        }
        inserted
    }

    pub async fn upsert_set_models(&mut self, models: &[M]) -> u64 {
        self.upsert_set(models.iter().map(Model::to_row).collect()).await
    }

    /// Deletes the lookups addressed by equality and `IN` predicates.
    fn forget_predicate_lookups(&self) {
        for predicate in &self.wheres {
            for (field, value) in predicate.lookup_pairs() {
                self.forget_lookup(field, value);
            }
        }
    }
}
