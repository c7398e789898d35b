use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use cask_orm::{Builder, BuilderConfig, Connection, Database, Drivers, Error, MemoryCache, Model, Row, Value};
use futures::StreamExt;

#[derive(Debug, Clone, Model, PartialEq)]
struct Venue {
    #[orm(primary_key, auto_increment)]
    venue_id: i64,
    #[orm(unique, size = 60)]
    slug: String,
    city: String,
    capacity: Option<i32>,
}

/// Counts the round trips going through a `Database`.
struct Counting<'a> {
    inner: &'a Database,
    fetches: AtomicUsize,
}

impl<'a> Counting<'a> {
    fn new(inner: &'a Database) -> Self {
        Self { inner, fetches: AtomicUsize::new(0) }
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for Counting<'_> {
    fn driver(&self) -> Drivers {
        Connection::driver(self.inner)
    }

    fn prefix(&self) -> &str {
        self.inner.prefix()
    }

    async fn execute(&self, sql: &str, args: &[Value]) -> Result<u64, Error> {
        self.inner.execute(sql, args).await
    }

    async fn fetch_all(&self, sql: &str, args: &[Value]) -> Result<Vec<Row>, Error> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch_all(sql, args).await
    }
}

fn counted<'a>(conn: &'a Counting<'_>, db: &'a Database) -> Builder<'a, Venue> {
    Builder::new(conn, db.cache().as_ref(), db.config().clone())
}

async fn setup() -> Result<Database, Error> {
    let _ = env_logger::builder().is_test(true).try_init();

    let db = Database::builder().max_connections(1).connect("sqlite::memory:").await?;
    db.migrator().register::<Venue>().run().await
}

fn venue(slug: &str, city: &str) -> Row {
    Row::new().with("slug", slug).with("city", city).with("capacity", 300)
}

#[tokio::test]
async fn test_find_hits_the_database_once() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    db.model::<Venue>().insert(vec![venue("blue-note", "New York"), venue("paradiso", "Amsterdam")]).await;

    let conn = Counting::new(&db);

    let first = counted(&conn, &db).find(1, None).await.expect("venue 1");
    let second = counted(&conn, &db).find(1, None).await.expect("venue 1");
    assert_eq!(first, second);
    assert_eq!(conn.fetches(), 1);

    let by_slug = counted(&conn, &db).find("paradiso", Some("slug")).await.expect("venue 2");
    assert_eq!(by_slug.city, "Amsterdam");
    assert_eq!(conn.fetches(), 2);

    let updated = db.model::<Venue>().equals("venue_id", 1).update(Some(Row::new().with("capacity", 120))).await;
    assert_eq!(updated, Some(1));

    let fresh = counted(&conn, &db).find(1, None).await.expect("venue 1");
    assert_eq!(fresh.capacity, Some(120));
    assert_eq!(conn.fetches(), 3);
    Ok(())
}

#[tokio::test]
async fn test_find_uncached_always_reads() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    db.model::<Venue>().insert_one(venue("blue-note", "New York")).await;

    let conn = Counting::new(&db);
    let config = BuilderConfig { use_query_cache: false, ..BuilderConfig::default() };

    for _ in 0..2 {
        let found = Builder::<Venue>::new(&conn, db.cache().as_ref(), config.clone()).find_uncached(1, None).await;
        assert!(found.is_some());
    }
    assert_eq!(conn.fetches(), 2);

    let missing = counted(&conn, &db).find(42, None).await;
    assert!(missing.is_none());
    Ok(())
}

#[tokio::test]
async fn test_refresh_reloads_or_forgets_the_model() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    db.model::<Venue>().insert_one(venue("blue-note", "New York")).await;

    let model = db.model::<Venue>().find(1, None).await.expect("venue 1");
    let mut bound = db.bind(model);

    db.model::<Venue>().equals("slug", "blue-note").update(Some(Row::new().with("city", "Brooklyn"))).await;
    assert_eq!(bound.refresh().await.map(|v| v.city.as_str()), Some("Brooklyn"));

    db.model::<Venue>().equals("slug", "blue-note").delete().await;
    assert!(bound.refresh().await.is_none());
    Ok(())
}

#[tokio::test]
async fn test_upsert_set_replaces_rows() -> Result<(), Box<dyn std::error::Error>> {
    let db = setup().await?;
    db.model::<Venue>()
        .insert(vec![venue("blue-note", "New York"), venue("paradiso", "Amsterdam"), venue("fillmore", "Denver")])
        .await;

    let mut venues = db.model::<Venue>().order_by_key("ASC").models().await;
    assert_eq!(venues.len(), 3);
    for venue in &mut venues {
        venue.capacity = Some(1000);
    }

    let inserted = db.model::<Venue>().set_batch_size(2).upsert_set_models(&venues).await;
    assert_eq!(inserted, 3);

    let capacities = db.model::<Venue>().order_by_key("ASC").map(|v| v.capacity).await;
    assert_eq!(capacities, vec![Some(1000); 3]);
    assert_eq!(db.model::<Venue>().count(None).await, 3);
    Ok(())
}

#[tokio::test]
async fn test_dry_run_configuration() -> Result<(), Box<dyn std::error::Error>> {
    let config = BuilderConfig { execute_queries: false, ..BuilderConfig::default() };
    let db = Database::builder().max_connections(1).config(config).connect("sqlite::memory:").await?;
    db.create_table::<Venue>().await?;

    let mut query = db.model::<Venue>();
    assert_eq!(query.insert_one(venue("blue-note", "New York")).await, 0);
    assert_eq!(query.queries().len(), 1);

    // The per-instance switch cannot override the configuration.
    let mut query = db.model::<Venue>().enable_query_execution(true);
    assert!(query.get().await.is_empty());
    assert!(query.last_error().is_none());

    let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM venue").fetch_one(db.pool()).await?;
    assert_eq!(rows, 0);
    Ok(())
}

#[tokio::test]
async fn test_driver_failure_is_reported() -> Result<(), Box<dyn std::error::Error>> {
    let db = Database::builder().max_connections(1).connect("sqlite::memory:").await?;

    // No migration: the table does not exist.
    let mut query = db.model::<Venue>();
    assert!(query.get().await.is_empty());
    assert!(matches!(query.last_error(), Some(Error::DatabaseError(_))));

    assert_eq!(query.insert_one(venue("blue-note", "New York")).await, 0);
    assert!(query.last_error().is_some());
    Ok(())
}

#[tokio::test]
async fn test_all_leaves_the_query_cache_alone() -> Result<(), Box<dyn std::error::Error>> {
    let cache = Arc::new(MemoryCache::new());
    let db = Database::builder().max_connections(1).cache(cache.clone()).connect("sqlite::memory:").await?;
    db.migrator().register::<Venue>().run().await?;

    let rows = (0..20).map(|i| venue(&format!("venue-{}", i), "Lisbon")).collect();
    assert_eq!(db.model::<Venue>().insert(rows).await, 20);

    let mut query = db.model::<Venue>().set_batch_size(1).order_by_key("ASC");
    assert_eq!(query.all().count().await, 20);
    assert!(cache.is_empty());

    db.model::<Venue>().equals("city", "Lisbon").models().await;
    assert_eq!(cache.len(), 1);

    db.model::<Venue>().insert_one(venue("venue-20", "Porto")).await;
    assert!(cache.is_empty());
    Ok(())
}
