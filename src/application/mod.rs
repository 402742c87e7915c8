//! Application services layer.

pub mod error;
pub mod notify;
pub mod records;
pub mod repos;
pub mod store;

pub use records::{DeleteOutcome, RecordError, RecordService, UpdateOutcome};
