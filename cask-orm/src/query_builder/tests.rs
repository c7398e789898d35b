use std::sync::Mutex;

use async_trait::async_trait;
use futures::StreamExt;

use super::*;
use crate::{
    cache::MemoryCache,
    database::Drivers,
    model::ColumnInfo,
    value::FieldValue,
};

// ============================================================================
// Fixtures
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
struct Occurrence {
    occurrence_id: i64,
    post_id: i64,
    hash: String,
    duration: Option<i64>,
}

fn column(row: &Row, name: &str) -> Value {
    row.get(name).cloned().unwrap_or(Value::Null)
}

impl Model for Occurrence {
    fn table_name() -> &'static str {
        "tec_occurrences"
    }

    fn columns() -> Vec<ColumnInfo> {
        vec![
            ColumnInfo { is_primary_key: true, auto_increment: true, ..ColumnInfo::new("occurrence_id", "BIGINT", Format::Int) },
            ColumnInfo { index: true, ..ColumnInfo::new("post_id", "BIGINT", Format::Int) },
            ColumnInfo { unique: true, size: Some(40), ..ColumnInfo::new("hash", "TEXT", Format::Str) },
            ColumnInfo { is_nullable: true, ..ColumnInfo::new("duration", "INTEGER", Format::Int) },
        ]
    }

    fn to_row(&self) -> Row {
        Row::new()
            .with("occurrence_id", self.occurrence_id)
            .with("post_id", self.post_id)
            .with("hash", self.hash.as_str())
            .with("duration", self.duration)
    }

    fn from_row(row: &Row) -> Result<Self, Error> {
        Ok(Self {
            occurrence_id: i64::from_value(column(row, "occurrence_id"))?,
            post_id: i64::from_value(column(row, "post_id"))?,
            hash: String::from_value(column(row, "hash"))?,
            duration: Option::<i64>::from_value(column(row, "duration"))?,
        })
    }
}

#[derive(Debug, Clone)]
struct Event;

impl Model for Event {
    fn table_name() -> &'static str {
        "tec_events"
    }

    fn columns() -> Vec<ColumnInfo> {
        vec![ColumnInfo { is_primary_key: true, auto_increment: true, ..ColumnInfo::new("event_id", "BIGINT", Format::Int) }]
    }

    fn to_row(&self) -> Row {
        Row::new()
    }

    fn from_row(_row: &Row) -> Result<Self, Error> {
        Ok(Event)
    }
}

fn stored(id: i64) -> Row {
    Row::new().with("occurrence_id", id).with("post_id", 23).with("hash", format!("h{}", id)).with("duration", 60)
}

/// Connection that records every statement and answers with canned results.
struct Recorder {
    driver: Drivers,
    rows: Vec<Row>,
    affected: u64,
    statements: Mutex<Vec<Statement>>,
}

impl Recorder {
    fn new(driver: Drivers) -> Self {
        Self { driver, rows: Vec::new(), affected: 1, statements: Mutex::new(Vec::new()) }
    }

    fn returning(mut self, rows: Vec<Row>) -> Self {
        self.rows = rows;
        self
    }

    fn statements(&self) -> Vec<Statement> {
        self.statements.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, args: &[Value]) {
        self.statements.lock().unwrap().push(Statement { sql: sql.to_string(), args: args.to_vec() });
    }
}

#[async_trait]
impl Connection for Recorder {
    fn driver(&self) -> Drivers {
        self.driver
    }

    fn prefix(&self) -> &str {
        "wp_"
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, Error> {
        self.record(sql, args);
        Ok(self.affected)
    }

    async fn fetch_all(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, Error> {
        self.record(sql, args);
        Ok(self.rows.clone())
    }
}

/// Cache that remembers every deleted key.
#[derive(Default)]
struct Forgetful {
    inner: MemoryCache,
    deleted: Mutex<Vec<CacheKey>>,
}

impl Cache for Forgetful {
    fn get(&self, key: &CacheKey, trigger: Option<Trigger>) -> Option<crate::cache::CachedValue> {
        self.inner.get(key, trigger)
    }

    fn set(
        &self,
        key: CacheKey,
        value: crate::cache::CachedValue,
        ttl: Option<std::time::Duration>,
        trigger: Option<Trigger>,
    ) {
        self.inner.set(key, value, ttl, trigger)
    }

    fn delete(&self, key: &CacheKey) {
        self.deleted.lock().unwrap().push(key.clone());
        self.inner.delete(key)
    }

    fn set_last_occurrence(&self, trigger: Trigger) {
        self.inner.set_last_occurrence(trigger)
    }

    fn last_occurrence(&self, trigger: Trigger) -> u64 {
        self.inner.last_occurrence(trigger)
    }

    fn flush(&self) {
        self.inner.flush()
    }
}

fn builder<'a>(conn: &'a Recorder, cache: &'a MemoryCache) -> Builder<'a, Occurrence> {
    Builder::new(conn, cache, BuilderConfig::default())
}

// ============================================================================
// SQL assembly
// ============================================================================

#[tokio::test]
async fn test_select_sql_sqlite() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache)
        .equals("post_id", "23")
        .filter("duration", ">", 60)
        .order_by("duration", "desc")
        .limit(10)
        .offset(20);
    query.get().await;

    assert_eq!(
        query.queries()[0],
        "SELECT *\nFROM \"wp_tec_occurrences\"\n\
         WHERE \"wp_tec_occurrences\".\"post_id\" = ? AND \"wp_tec_occurrences\".\"duration\" > ?\n\
         ORDER BY \"duration\" DESC\nLIMIT 10\nOFFSET 20"
    );
    assert_eq!(conn.statements()[0].args, vec![Value::Int(23), Value::Int(60)]);
}

#[tokio::test]
async fn test_select_sql_mysql_offset_without_limit() {
    let conn = Recorder::new(Drivers::MySQL);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache).filter_in("post_id", [1, 2]).order_by("sideways", "up").offset(-5);
    query.get().await;

    assert_eq!(
        query.queries()[0],
        "SELECT *\nFROM `wp_tec_occurrences`\nWHERE `wp_tec_occurrences`.`post_id` IN (?, ?)\n\
         LIMIT 18446744073709551615\nOFFSET 0"
    );
}

#[tokio::test]
async fn test_null_renders_literally() {
    let conn = Recorder::new(Drivers::Postgres);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache).equals("duration", Value::Null).filter("post_id", "<>", 4);
    query.get().await;

    assert_eq!(
        query.queries()[0],
        "SELECT *\nFROM \"wp_tec_occurrences\"\n\
         WHERE \"wp_tec_occurrences\".\"duration\" IS NULL AND \"wp_tec_occurrences\".\"post_id\" <> $1"
    );
}

#[tokio::test]
async fn test_raw_fragment_binding() {
    let conn = Recorder::new(Drivers::Postgres);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache)
        .equals("post_id", 23)
        .filter_raw("duration BETWEEN ? AND ? AND hash <> '?'", vec![60.into(), 3600.into()]);
    query.get().await;

    assert!(query.queries()[0].ends_with("AND (duration BETWEEN $2 AND $3 AND hash <> '?')"));
    assert_eq!(conn.statements()[0].args, vec![Value::Int(23), Value::Int(60), Value::Int(3600)]);
    assert_eq!(query.where_args()[1].operator(), "raw");
    assert_eq!(query.where_args()[1].field(), None);
}

#[tokio::test]
async fn test_join_and_count_skip_tail() {
    let conn = Recorder::new(Drivers::SQLite).returning(vec![Row::new().with("COUNT(*)", 3)]);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache)
        .join("wp_posts", "ID", "post_id")
        .equals("post_id", 23)
        .order_by_key("ASC")
        .limit(2);

    assert_eq!(query.count(None).await, 3);
    assert_eq!(
        query.queries()[0],
        "SELECT COUNT(*)\nFROM \"wp_tec_occurrences\"\n\
         JOIN \"wp_posts\" ON \"wp_tec_occurrences\".\"post_id\" = \"wp_posts\".\"ID\"\n\
         WHERE \"wp_tec_occurrences\".\"post_id\" = ?"
    );
    assert_eq!(query.operation(), &Operation::Count(None));
}

#[tokio::test]
async fn test_join_model_prefixes_joined_table() {
    let conn = Recorder::new(Drivers::MySQL);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache).join_model::<Event>("event_id", "post_id").equals("hash", "abc");
    query.models().await;

    assert_eq!(
        query.queries()[0],
        "SELECT *\nFROM `wp_tec_occurrences`\n\
         JOIN `wp_tec_events` ON `wp_tec_occurrences`.`post_id` = `wp_tec_events`.`event_id`\n\
         WHERE `wp_tec_occurrences`.`hash` = ?"
    );
}

#[tokio::test]
async fn test_exists_wraps_select() {
    let conn = Recorder::new(Drivers::SQLite).returning(vec![Row::new().with("e", 1)]);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache).equals("hash", "abc");

    assert!(query.exists().await);
    assert!(query.queries()[0].starts_with("SELECT EXISTS (\nSELECT *\n"));
}

// ============================================================================
// Invalid state
// ============================================================================

#[tokio::test]
async fn test_bad_operator_is_sticky() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache).filter("duration", "LIKE", 5).equals("post_id", 1);

    assert!(query.has_invalid_queries());
    assert!(matches!(query.invalid_reason(), Some(Error::InvalidOperator(op)) if op == "LIKE"));
    assert!(query.where_args().is_empty());
    assert!(query.get().await.is_empty());
    assert_eq!(query.count(None).await, 0);
    assert!(query.queries().is_empty());

    query.reset();
    assert!(!query.has_invalid_queries());
}

#[tokio::test]
async fn test_failed_validation_marks_invalid() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();

    let query = builder(&conn, &cache).equals("post_id", "twenty-three");
    assert!(matches!(query.invalid_reason(), Some(Error::Validation(_))));

    let query = builder(&conn, &cache).equals("not_a_column", 1);
    assert!(query.has_invalid_queries());
}

#[tokio::test]
async fn test_filter_in_drops_rejected_values() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();

    let query = builder(&conn, &cache).filter_in("post_id", vec![Value::from("abc"), Value::Null]);
    assert!(!query.has_invalid_queries());
    assert!(query.where_args().is_empty());
    assert_eq!(query.rejected().len(), 2);

    let query = builder(&conn, &cache).filter_not_in("post_id", ["1", "x", "3"]);
    assert_eq!(
        query.where_args(),
        [Predicate::In {
            field: "post_id".to_string(),
            negated: true,
            values: vec![Value::Int(1), Value::Int(3)],
            format: Format::Int,
        }]
    );
    assert_eq!(query.rejected().len(), 1);
}

// ============================================================================
// Primary key fallback
// ============================================================================

#[tokio::test]
async fn test_delete_falls_back_to_bound_key() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();
    let model = Occurrence { occurrence_id: 7, post_id: 23, hash: "h7".to_string(), duration: None };

    let mut query = builder(&conn, &cache).set_model(model);

    assert_eq!(query.delete().await, 1);
    assert_eq!(
        conn.statements()[0].sql,
        "DELETE FROM \"wp_tec_occurrences\"\nWHERE \"wp_tec_occurrences\".\"occurrence_id\" = ?"
    );
    assert_eq!(conn.statements()[0].args, vec![Value::Int(7)]);
    assert!(query.model().is_none());
}

#[tokio::test]
async fn test_delete_without_where_issues_nothing() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();
    let unsaved = Occurrence { occurrence_id: 0, post_id: 23, hash: "new".to_string(), duration: None };

    assert_eq!(builder(&conn, &cache).delete().await, 0);
    assert_eq!(builder(&conn, &cache).set_model(unsaved).delete().await, 0);
    assert!(conn.statements().is_empty());
}

// ============================================================================
// Dry run
// ============================================================================

#[tokio::test]
async fn test_dry_run_records_without_executing() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache).enable_query_execution(false);
    let inserted = query.insert(vec![stored(1).with("occurrence_id", 0), stored(2)]).await;

    assert_eq!(inserted, 0);
    assert_eq!(
        query.queries()[0],
        "INSERT INTO \"wp_tec_occurrences\" (\"post_id\", \"hash\", \"duration\")\nVALUES (?, ?, ?)"
    );
    assert!(conn.statements().is_empty());

    let config = BuilderConfig { execute_queries: false, ..BuilderConfig::default() };
    let mut query = Builder::<Occurrence>::new(&conn, &cache, config);
    let outcome = query.upsert(&["hash"], Some(stored(3))).await.unwrap();
    assert_eq!(outcome, Some(UpsertResult::Unchanged));
    assert_eq!(query.queries().len(), 1);
    assert!(conn.statements().is_empty());
}

// ============================================================================
// Writes
// ============================================================================

#[tokio::test]
async fn test_insert_chunks_and_skips_invalid_rows() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();

    let rows = vec![
        Row::new().with("post_id", 1).with("hash", "a"),
        Row::new().with("post_id", "one").with("hash", "b"),
        Row::new().with("post_id", 2).with("hash", "c"),
        Row::new().with("post_id", 3).with("hash", "d"),
    ];
    let mut query = builder(&conn, &cache).set_batch_size(2);
    assert_eq!(query.insert(rows).await, 2);

    let statements = conn.statements();
    assert_eq!(statements.len(), 2);
    // NULL is rendered, not bound.
    assert_eq!(statements[0].args, vec![Value::Int(1), Value::from("a")]);
    assert_eq!(
        statements[1].sql,
        "INSERT INTO \"wp_tec_occurrences\" (\"post_id\", \"hash\", \"duration\")\nVALUES (?, ?, NULL),\n(?, ?, NULL)"
    );
}

#[tokio::test]
async fn test_update_with_data_sets_only_given_columns() {
    let conn = Recorder::new(Drivers::MySQL);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache).equals("post_id", 23);
    let affected = query.update(Some(Row::new().with("duration", "90"))).await;

    assert_eq!(affected, Some(1));
    assert_eq!(
        conn.statements()[0].sql,
        "UPDATE `wp_tec_occurrences`\nSET `duration` = ?\nWHERE `wp_tec_occurrences`.`post_id` = ?"
    );
    assert_eq!(conn.statements()[0].args, vec![Value::Int(90), Value::Int(23)]);
    assert_eq!(query.operation(), &Operation::Update);
}

#[tokio::test]
async fn test_update_bound_model_merges_data() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();
    let model = Occurrence { occurrence_id: 4, post_id: 23, hash: "h4".to_string(), duration: None };

    let mut query = builder(&conn, &cache).set_model(model);
    query.update(Some(Row::new().with("duration", 120))).await;

    assert_eq!(query.model().and_then(|m| m.duration), Some(120));
    assert!(conn.statements()[0].sql.ends_with("WHERE \"wp_tec_occurrences\".\"occurrence_id\" = ?"));
}

#[tokio::test]
async fn test_update_without_where_is_invalid() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();
    let unsaved = Occurrence { occurrence_id: 0, post_id: 23, hash: "new".to_string(), duration: None };

    let mut query = builder(&conn, &cache).set_model(unsaved);
    assert_eq!(query.update(Some(Row::new().with("duration", 99))).await, None);
    assert!(matches!(query.invalid_reason(), Some(Error::InvalidData(_))));

    let mut query = builder(&conn, &cache);
    assert_eq!(query.update(Some(Row::new().with("duration", 99))).await, None);
    assert!(query.has_invalid_queries());
    assert!(query.queries().is_empty());
    assert!(conn.statements().is_empty());
}

#[tokio::test]
async fn test_update_rejects_invalid_data() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache).equals("post_id", 23);
    assert_eq!(query.update(Some(Row::new().with("hash", "x".repeat(41)))).await, None);
    assert!(query.has_invalid_queries());

    let mut query = builder(&conn, &cache);
    assert_eq!(query.update(None).await, None);
    assert!(matches!(query.invalid_reason(), Some(Error::InvalidData(_))));
    assert!(conn.statements().is_empty());
}

#[tokio::test]
async fn test_upsert_sql_per_driver() {
    let data = Row::new().with("post_id", 23).with("hash", "abc").with("duration", 60);

    let conn = Recorder::new(Drivers::MySQL);
    let cache = MemoryCache::new();
    let outcome = builder(&conn, &cache).upsert(&["hash"], Some(data.clone())).await.unwrap();
    assert_eq!(outcome, Some(UpsertResult::Inserted));

    let statements = conn.statements();
    assert_eq!(statements[0].sql, "SELECT *\nFROM `wp_tec_occurrences`\nWHERE `hash` = ?\nLIMIT 1");
    assert_eq!(
        statements[1].sql,
        "INSERT INTO `wp_tec_occurrences` (`post_id`, `hash`, `duration`)\nVALUES (?, ?, ?)\n\
         ON DUPLICATE KEY UPDATE `post_id` = ?, `duration` = ?"
    );
    assert_eq!(statements[1].args.len(), 5);

    let conn = Recorder::new(Drivers::SQLite);
    builder(&conn, &cache).upsert(&["hash"], Some(data)).await.unwrap();
    assert_eq!(
        conn.statements()[1].sql,
        "INSERT INTO \"wp_tec_occurrences\" (\"post_id\", \"hash\", \"duration\")\nVALUES (?, ?, ?)\n\
         ON CONFLICT (\"hash\") DO UPDATE SET \"post_id\" = excluded.\"post_id\", \"duration\" = excluded.\"duration\""
    );
}

#[tokio::test]
async fn test_upsert_precheck_detects_unchanged_rows() {
    let conn = Recorder::new(Drivers::SQLite).returning(vec![stored(1)]);
    let cache = MemoryCache::new();

    let data = Row::new().with("post_id", "23").with("hash", "h1").with("duration", 60);
    let outcome = builder(&conn, &cache).upsert(&["hash"], Some(data)).await.unwrap();
    assert_eq!(outcome, Some(UpsertResult::Unchanged));
    assert_eq!(conn.statements().len(), 1);

    let data = Row::new().with("post_id", 23).with("hash", "h1").with("duration", 90);
    let outcome = builder(&conn, &cache).upsert(&["hash"], Some(data)).await.unwrap();
    assert_eq!(outcome, Some(UpsertResult::Updated));
}

#[tokio::test]
async fn test_upsert_forgets_lookups_of_its_unique_columns() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = Forgetful::default();

    let mut query = Builder::<Occurrence>::new(&conn, &cache, BuilderConfig::default());
    let outcome = query.upsert(&["post_id"], Some(stored(9).with("post_id", "23"))).await.unwrap();
    assert_eq!(outcome, Some(UpsertResult::Inserted));

    let deleted = cache.deleted.lock().unwrap().clone();
    assert!(deleted.contains(&CacheKey::lookup::<Occurrence>("post_id", &Value::Int(23))));
    assert!(deleted.contains(&CacheKey::lookup::<Occurrence>("hash", &Value::from("h9"))));
}

#[tokio::test]
async fn test_upsert_argument_errors() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();
    let data = Row::new().with("post_id", 23).with("hash", "abc");

    let empty = builder(&conn, &cache).upsert(&[], Some(data.clone())).await;
    assert!(matches!(empty, Err(Error::InvalidArgument(_))));

    let missing = builder(&conn, &cache).upsert(&["occurrence_id"], Some(data)).await;
    assert!(matches!(missing, Err(Error::InvalidArgument(_))));

    let invalid = builder(&conn, &cache).upsert(&["hash"], Some(Row::new().with("hash", "abc"))).await;
    assert!(matches!(invalid, Ok(None)));
    assert!(conn.statements().is_empty());
}

#[tokio::test]
async fn test_upsert_set_deletes_then_inserts() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache);
    let inserted = query.upsert_set(vec![stored(1), stored(2)]).await;

    // The recorder reports one affected row per statement.
    assert_eq!(inserted, 1);
    let statements = conn.statements();
    assert_eq!(statements[0].sql, "DELETE FROM \"wp_tec_occurrences\"\nWHERE \"occurrence_id\" IN (?, ?)");
    assert!(statements[1].sql.starts_with("INSERT INTO \"wp_tec_occurrences\" (\"occurrence_id\", \"post_id\""));
}

// ============================================================================
// Reads and caching
// ============================================================================

#[tokio::test]
async fn test_find_is_memoized_until_a_write() {
    let conn = Recorder::new(Drivers::SQLite).returning(vec![stored(1)]);
    let cache = MemoryCache::new();

    let first = builder(&conn, &cache).find(1, None).await;
    let second = builder(&conn, &cache).find("1", None).await;
    assert_eq!(first, second);
    assert_eq!(first.map(|m| m.hash), Some("h1".to_string()));
    assert_eq!(conn.statements().len(), 1);

    builder(&conn, &cache).equals("occurrence_id", 1).update(Some(Row::new().with("duration", 90))).await;
    builder(&conn, &cache).find(1, None).await;
    assert_eq!(conn.statements().len(), 3);
}

#[tokio::test]
async fn test_find_invalid_value_marks_builder() {
    let conn = Recorder::new(Drivers::SQLite);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache);
    assert!(query.find("seven", None).await.is_none());
    assert!(query.has_invalid_queries());
    assert!(conn.statements().is_empty());
}

#[tokio::test]
async fn test_query_cache_serves_repeated_selects() {
    let conn = Recorder::new(Drivers::SQLite).returning(vec![stored(1), stored(2)]);
    let cache = MemoryCache::new();

    let first = builder(&conn, &cache).equals("post_id", 23).models().await;
    let second = builder(&conn, &cache).equals("post_id", 23).models().await;
    assert_eq!(first, second);
    assert_eq!(conn.statements().len(), 1);

    let config = BuilderConfig { use_query_cache: false, ..BuilderConfig::default() };
    Builder::<Occurrence>::new(&conn, &cache, config).equals("post_id", 23).models().await;
    assert_eq!(conn.statements().len(), 2);
}

#[tokio::test]
async fn test_all_pages_skip_the_query_cache() {
    // The canned row doubles as the COUNT result: its first value is 1.
    let conn = Recorder::new(Drivers::SQLite).returning(vec![stored(1)]);
    let cache = MemoryCache::new();

    let mut query = builder(&conn, &cache).equals("post_id", 23);
    let pages: Vec<(usize, Record<Occurrence>)> = query.all().collect().await;

    assert_eq!(pages.len(), 1);
    assert_eq!(pages[0].0, 0);
    assert_eq!(conn.statements().len(), 2);
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_output_formats() {
    let conn = Recorder::new(Drivers::SQLite).returning(vec![stored(5)]);
    let cache = MemoryCache::new();

    let assoc = builder(&conn, &cache).output(OutputFormat::Assoc).get().await;
    assert_eq!(assoc, vec![Record::Assoc(stored(5))]);

    let numeric = builder(&conn, &cache).output(OutputFormat::Numeric).first().await;
    assert_eq!(
        numeric,
        Some(Record::Numeric(vec![Value::Int(5), Value::Int(23), Value::from("h5"), Value::Int(60)]))
    );

    let hashes = builder(&conn, &cache).pluck("hash").await;
    assert_eq!(hashes, vec![Value::from("h5")]);

    let ids = builder(&conn, &cache).map(|m| m.occurrence_id).await;
    assert_eq!(ids, vec![5]);
}
