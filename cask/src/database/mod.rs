mod occurrence;

pub use occurrence::{Event, Occurrence, event_fields, occurrence_fields};
