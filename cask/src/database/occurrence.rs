use cask_orm::{Model, Value};
use chrono::NaiveDateTime;

/// Rejects durations that are zero or negative.
fn positive_duration(value: &Value) -> Result<(), String> {
    match value.as_i64() {
        Some(seconds) if seconds > 0 => Ok(()),
        _ => Err("must be a positive number of seconds".to_string()),
    }
}

/// One row per event, keyed by the post it belongs to.
#[derive(Debug, Clone, Model)]
#[orm(table = "tec_events")]
pub struct Event {
    #[orm(primary_key, auto_increment)]
    pub event_id: i64,
    #[orm(unique)]
    pub post_id: i64,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    #[orm(size = 64)]
    pub timezone: String,
    pub rset: Option<String>,
}

/// One row per occurrence of a (possibly recurring) event.
#[derive(Debug, Clone, Model)]
#[orm(table = "tec_occurrences")]
pub struct Occurrence {
    #[orm(primary_key, auto_increment)]
    pub occurrence_id: i64,
    #[orm(index)]
    pub event_id: i64,
    #[orm(index)]
    pub post_id: i64,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    #[orm(validate = "positive_duration")]
    pub duration: i64,
    #[orm(unique, size = 40)]
    pub hash: String,
    #[orm(create_time)]
    pub updated_at: Option<NaiveDateTime>,
}
