use std::env;

use cask_orm::{BuilderConfig, Database, Row};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use dotenvy::dotenv;
use futures::StreamExt;

mod database;

use database::{Event, Occurrence, event_fields, occurrence_fields};

const WEEKS: i64 = 12;

/// Weekly occurrences of `event`, one row each.
fn weekly_occurrences(event: &Event, weeks: i64) -> Vec<Row> {
    let duration = (event.end_date - event.start_date).num_seconds();

    (0..weeks)
        .map(|week| {
            let start = event.start_date + Duration::weeks(week);
            Row::new()
                .with(occurrence_fields::EVENT_ID, event.event_id)
                .with(occurrence_fields::POST_ID, event.post_id)
                .with(occurrence_fields::START_DATE, start.to_string())
                .with(occurrence_fields::END_DATE, (start + Duration::seconds(duration)).to_string())
                .with(occurrence_fields::DURATION, duration)
                .with(occurrence_fields::HASH, format!("{}-{}", event.post_id, start.and_utc().timestamp()))
        })
        .collect()
}

fn at(year: i32, month: u32, day: u32, hour: u32) -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, 0, 0)
}

#[tokio::main]
async fn main() -> Result<(), cask_orm::Error> {
    dotenv().ok();
    env_logger::init();

    let url = env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite::memory:".to_string());
    let prefix = env::var("CASK_TABLE_PREFIX").unwrap_or_else(|_| "wp_".to_string());

    let db = Database::builder()
        .max_connections(1)
        .table_prefix(&prefix)
        .config(BuilderConfig::from_env())
        .connect(&url)
        .await?;
    db.migrator().register::<Event>().register::<Occurrence>().run().await?;

    let (Some(start), Some(end)) = (at(2024, 3, 1, 18), at(2024, 3, 1, 20)) else {
        return Err(cask_orm::Error::invalid_data("demo dates are out of range"));
    };
    let event = Row::new()
        .with(event_fields::POST_ID, 23)
        .with(event_fields::START_DATE, start.to_string())
        .with(event_fields::END_DATE, end.to_string())
        .with(event_fields::TIMEZONE, "Europe/Lisbon");

    let outcome = db.model::<Event>().upsert(&[event_fields::POST_ID], Some(event)).await?;
    log::info!("Event upsert: {:?}", outcome);

    let Some(event) = db.model::<Event>().find(23, Some(event_fields::POST_ID)).await else {
        return Err(cask_orm::Error::invalid_data("the demo event was not stored"));
    };

    let inserted = db.model::<Occurrence>().set_batch_size(5).upsert_set(weekly_occurrences(&event, WEEKS)).await;
    log::info!("Stored {} occurrences of post {}", inserted, event.post_id);

    let mut upcoming = db
        .model::<Occurrence>()
        .equals(occurrence_fields::POST_ID, event.post_id)
        .filter(occurrence_fields::START_DATE, ">=", "2024-04-01 00:00:00")
        .order_by(occurrence_fields::START_DATE, "ASC")
        .set_batch_size(4)
        .limit(6);
    {
        let pages = upcoming.all();
        futures::pin_mut!(pages);
        while let Some((index, record)) = pages.next().await {
            if let Some(occurrence) = record.into_model() {
                println!("#{} {} -> {}", index, occurrence.start_date, occurrence.end_date);
            }
        }
    }
    println!("{}", upcoming.queries().join("\n--\n"));

    let hashes: Vec<String> = db
        .model::<Occurrence>()
        .order_by_key("ASC")
        .limit(3)
        .map(|occurrence| occurrence.hash)
        .await;

    let mut batch = db.model::<Occurrence>().set_batch_size(2);
    let found: Vec<Occurrence> = batch.find_all(hashes.clone(), Some(occurrence_fields::HASH)).collect().await;
    println!("find_all by hash: {} of {}", found.len(), hashes.len());

    let mut first = db.bind(found.into_iter().next().ok_or_else(|| cask_orm::Error::invalid_data("no occurrence"))?);
    let moved = first.update(Some(Row::new().with(occurrence_fields::DURATION, 5400))).await;
    println!("Updated rows: {:?}, duration now {:?}", moved, first.model().map(|o| o.duration));

    let removed = db.model::<Occurrence>().filter(occurrence_fields::START_DATE, "<", "2024-03-15 00:00:00").delete().await;
    let remaining = db.model::<Occurrence>().equals(occurrence_fields::POST_ID, event.post_id).count(None).await;
    println!("Removed {}, {} occurrences left", removed, remaining);

    Ok(())
}
