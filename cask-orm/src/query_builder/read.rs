//! Read terminals: `get`, `first`, `find`, `count`, `exists`, `pluck`, and
//! the lazy `find_all` / `all` streams.

use std::collections::VecDeque;

use futures::stream::{self, Stream};

use crate::{
    Error,
    cache::{CacheKey, CachedValue, Trigger},
    config::MAX_FIND_ALL_BATCH,
    model::Model,
    validation,
    value::{Row, Value},
};

use super::{Builder, OutputFormat, Record};

struct FindAllState<'b, 'a, M: Model> {
    builder: &'b mut Builder<'a, M>,
    column: String,
    values: Option<Vec<Value>>,
    batch: u64,
    offset: u64,
    buffer: VecDeque<M>,
    exhausted: bool,
}

struct AllState<'b, 'a, M: Model> {
    builder: &'b mut Builder<'a, M>,
    /// `(first offset, rows to yield)`, computed on the first poll.
    window: Option<(u64, u64)>,
    fetched: u64,
    index: usize,
    buffer: VecDeque<Record<M>>,
    done: bool,
}

impl<'a, M: Model> Builder<'a, M> {
    /// Runs the SELECT and shapes the rows according to the output format.
    ///
    /// Empty when the Builder is invalid, the query failed or execution is off.
    pub async fn get(&mut self) -> Vec<Record<M>> {
        self.begin();
        let rows = self.select_rows("Builder::get").await;
        self.shape(rows)
    }

    fn shape(&self, rows: Vec<Row>) -> Vec<Record<M>> {
        match self.output_format {
            OutputFormat::Model => Self::rows_to_models(rows).into_iter().map(Record::Model).collect(),
            OutputFormat::Assoc => rows.into_iter().map(Record::Assoc).collect(),
            OutputFormat::Numeric => rows.into_iter().map(|row| Record::Numeric(row.into_values())).collect(),
        }
    }

    /// Like `get`, always returning models.
    pub async fn models(&mut self) -> Vec<M> {
        self.begin();
        let rows = self.select_rows("Builder::models").await;
        Self::rows_to_models(rows)
    }

    /// `limit(1)` then `get`.
    pub async fn first(&mut self) -> Option<Record<M>> {
        self.limit = Some(1);
        self.get().await.into_iter().next()
    }

    /// Cached point lookup of one model by `column` (primary key by default).
    ///
    /// A cache hit rebuilds the model without a round trip; a miss runs
    /// `equals(column, value)` with `LIMIT 1` and memoizes the result.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let occurrence = db.model::<Occurrence>().find(42, None).await;
    /// let by_hash = db.model::<Occurrence>().find("2f1c..", Some("hash")).await;
    /// ```
    pub async fn find(&mut self, value: impl Into<Value>, column: Option<&str>) -> Option<M> {
        let column = column.unwrap_or(M::primary_key_name()).to_string();
        if !self.config.memoize_lookups {
            return self.find_uncached(value, Some(&column)).await;
        }

        self.begin();
        if self.invalid.is_some() {
            return None;
        }

        let coerced = match validation::validate_field(&M::columns(), &column, &value.into()) {
            Ok(coerced) => coerced,
            Err(e) => {
                self.invalid = Some(Error::Validation(e.into()));
                return None;
            }
        };

        let key = CacheKey::lookup::<M>(&column, &coerced);
        if let Some(CachedValue::Row(row)) = self.cache.get(&key, Some(Trigger::WRITE)) {
            match M::from_row(&row) {
                Ok(model) => return Some(model),
                Err(e) => {
                    let message = e.to_string();
                    log::debug!(table = M::table_name(), error = message.as_str(); "Discarding unreadable cached model.");
                    self.cache.delete(&key);
                }
            }
        }

        let model = self.find_uncached(coerced, Some(&column)).await?;
        self.cache.set(key, CachedValue::Row(model.to_row()), None, Some(Trigger::WRITE));
        Some(model)
    }

    /// `find` without the lookup cache.
    pub async fn find_uncached(&mut self, value: impl Into<Value>, column: Option<&str>) -> Option<M> {
        let column = column.unwrap_or(M::primary_key_name());
        self.push_filter(column, "=", value.into());
        self.limit = Some(1);
        self.models().await.into_iter().next()
    }

    /// Streams every model whose `column` matches one of `values`.
    ///
    /// Runs one bounded query per batch (`batch_size`, at most 5000) with an
    /// explicit OFFSET, honoring `order_by` and ignoring other predicates.
    /// Every value must validate, otherwise the stream is empty. Dropping the
    /// stream stops further queries.
    ///
    /// ```rust,ignore
    /// let mut builder = db.model::<Occurrence>().order_by("start_date", "ASC");
    /// let occurrences: Vec<Occurrence> = builder.find_all([23, 24, 25], Some("post_id")).collect().await;
    /// ```
    pub fn find_all<V: Into<Value>>(
        &mut self,
        values: impl IntoIterator<Item = V>,
        column: Option<&str>,
    ) -> impl Stream<Item = M> + '_ {
        self.begin();
        let column = column.unwrap_or(M::primary_key_name()).to_string();
        let values = self.check_find_values(&column, values.into_iter().map(Into::into).collect());
        let batch = self.batch_size.clamp(1, MAX_FIND_ALL_BATCH) as u64;

        let state = FindAllState {
            builder: self,
            column,
            values,
            batch,
            offset: 0,
            buffer: VecDeque::new(),
            exhausted: false,
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(model) = state.buffer.pop_front() {
                    return Some((model, state));
                }
                if state.exhausted {
                    return None;
                }

                let values = state.values.as_deref()?;
                let statement = state.builder.find_all_statement(&state.column, values, state.batch, state.offset);
                let rows = state.builder.run_fetch("Builder::find_all", &statement).await.unwrap_or_default();

                state.offset += state.batch;
                state.exhausted = (rows.len() as u64) < state.batch;
                state.buffer.extend(Self::rows_to_models(rows));
            }
        })
    }

    fn check_find_values(&mut self, column: &str, values: Vec<Value>) -> Option<Vec<Value>> {
        if self.invalid.is_some() || values.is_empty() {
            return None;
        }

        let columns = M::columns();
        let mut checked = Vec::with_capacity(values.len());
        for value in &values {
            match validation::validate_field(&columns, column, value) {
                Ok(Value::Null) => {
                    self.invalid = Some(Error::InvalidData(format!("`{}` cannot be looked up by NULL", column)));
                    return None;
                }
                Ok(value) => checked.push(value),
                Err(e) => {
                    self.invalid = Some(Error::Validation(e.into()));
                    return None;
                }
            }
        }
        Some(checked)
    }

    /// Streams every matching record with its position.
    ///
    /// Counts the matches once, then pages through them `batch_size` rows at
    /// a time, honoring an outer `limit` (0 meaning none) and `offset`. Pages
    /// are never stored in the query cache. The Builder's limit and offset
    /// are left on the last page.
    ///
    /// ```rust,ignore
    /// let mut builder = db.model::<Occurrence>().equals("post_id", 23).limit(120);
    /// let stream = builder.all();
    /// futures::pin_mut!(stream);
    /// while let Some((index, record)) = stream.next().await {
    ///     // ...
    /// }
    /// ```
    pub fn all(&mut self) -> impl Stream<Item = (usize, Record<M>)> + '_ {
        self.begin();
        let state =
            AllState { builder: self, window: None, fetched: 0, index: 0, buffer: VecDeque::new(), done: false };

        stream::unfold(state, |mut state| async move {
            loop {
                if let Some(record) = state.buffer.pop_front() {
                    let index = state.index;
                    state.index += 1;
                    return Some(((index, record), state));
                }
                if state.done {
                    return None;
                }

                let (start, total) = match state.window {
                    Some(window) => window,
                    None => {
                        let window = state.builder.all_window().await;
                        state.window = Some(window);
                        window
                    }
                };

                if state.fetched >= total {
                    return None;
                }

                let page = (state.builder.batch_size as u64).min(total - state.fetched);
                state.builder.limit = Some(page);
                state.builder.offset = Some(start + state.fetched);

                let records = state.builder.page().await;
                if records.is_empty() {
                    return None;
                }

                state.fetched += records.len() as u64;
                state.done = (records.len() as u64) < page;
                state.buffer.extend(records);
            }
        })
    }

    /// One page of `all`, read past the query cache.
    async fn page(&mut self) -> Vec<Record<M>> {
        let Some(statement) = self.select_statement() else {
            return Vec::new();
        };
        let rows = self.run_fetch("Builder::all", &statement).await.unwrap_or_default();
        self.shape(rows)
    }

    /// First offset and number of rows `all` should yield.
    async fn all_window(&mut self) -> (u64, u64) {
        let limit = self.limit.filter(|limit| *limit > 0);
        let start = self.offset.unwrap_or(0);
        let available = self.count(None).await.saturating_sub(start);
        (start, limit.map_or(available, |limit| limit.min(available)))
    }

    /// `SELECT COUNT(*)` (or `COUNT(column)`) over the current predicates.
    pub async fn count(&mut self, column: Option<&str>) -> u64 {
        self.begin();
        let Some(statement) = self.count_statement(column) else {
            return 0;
        };

        self.run_scalar("Builder::count", &statement)
            .await
            .and_then(|value| value.as_i64())
            .map_or(0, |count| count.max(0) as u64)
    }

    /// Whether any row matches.
    pub async fn exists(&mut self) -> bool {
        self.begin();
        let Some(statement) = self.exists_statement() else {
            return false;
        };

        self.run_scalar("Builder::exists", &statement).await.and_then(|value| value.as_i64()).is_some_and(|v| v != 0)
    }

    /// Values of one column over the matching rows.
    pub async fn pluck(&mut self, field: &str) -> Vec<Value> {
        self.begin();
        let rows = self.select_rows("Builder::pluck").await;
        rows.iter().filter_map(|row| row.get(field).cloned()).collect()
    }

    /// Applies `f` to every matching model.
    pub async fn map<T>(&mut self, f: impl FnMut(M) -> T) -> Vec<T> {
        self.models().await.into_iter().map(f).collect()
    }

    /// Re-reads the bound model by primary key, bypassing stale lookups.
    ///
    /// The bound model is replaced, or reset to `None` when its row is gone.
    /// It is kept as is when the read failed or execution is off.
    pub async fn refresh(&mut self) -> Option<&M> {
        let pk_value = self.model.as_ref()?.primary_key_value();
        let Some(pk_value) = pk_value else {
            return self.model.as_ref();
        };

        self.flush_model_cache();

        let mut fresh = Builder::<M>::new(self.conn, self.cache, self.config.clone());
        fresh.execute_queries = self.execute_queries;
        let found = fresh.find(pk_value, None).await;

        self.queries.append(&mut fresh.queries);
        self.last_error = fresh.last_error.take();
        if self.last_error.is_none() && self.can_execute() {
            self.model = found;
        }
        self.model.as_ref()
    }

    /// Runs the SELECT, going through the query cache when enabled.
    async fn select_rows(&mut self, source: &'static str) -> Vec<Row> {
        let Some(statement) = self.select_statement() else {
            return Vec::new();
        };

        let key = (self.config.use_query_cache && self.can_execute())
            .then(|| CacheKey::query(&statement.sql, &statement.args));

        if let Some(key) = &key {
            if let Some(CachedValue::Rows(rows)) = self.cache.get(key, Some(Trigger::WRITE)) {
                self.queries.push(statement.sql);
                return rows;
            }
        }

        let Some(rows) = self.run_fetch(source, &statement).await else {
            return Vec::new();
        };

        if let Some(key) = key {
            self.cache.set(key, CachedValue::Rows(rows.clone()), self.config.query_cache_ttl, Some(Trigger::WRITE));
        }
        rows
    }

    pub(crate) fn rows_to_models(rows: Vec<Row>) -> Vec<M> {
        rows.into_iter()
            .filter_map(|row| match M::from_row(&row) {
                Ok(model) => Some(model),
                Err(e) => {
                    let message = e.to_string();
                    log::warn!(table = M::table_name(), error = message.as_str(); "Row could not be read into a model.");
                    None
                }
            })
            .collect()
    }
}
