//! Sequence counter model for ticketing-service.

use serde::{Deserialize, Serialize};

/// Per-year ticket sequence counter.
///
/// One document per calendar year, keyed by the year itself. `seq` holds the
/// last sequence value handed out; it is only ever advanced with an atomic
/// `$inc`, never read-modify-written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequenceCounter {
    #[serde(rename = "_id")]
    pub year: i32,
    pub seq: i64,
}
