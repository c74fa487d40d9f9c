//! Statistics recording.
//!
//! A [`Record`] collects per-stage and per-snapshot data during one run and
//! derives summary statistics once the run ends. [`AverageRecord`] pools
//! finalised records across runs.

mod average;
mod finalise;
mod record;
mod types;
mod window;

pub use average::AverageRecord;
pub use record::Record;
pub use types::{ByClass, ByTrait, RecordPhase, RecordValue, Tagged};
