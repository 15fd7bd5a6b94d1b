//! Ticket number rendering.
//!
//! Sequence values are handed out atomically by the per-year counter
//! documents (see [`crate::services::MongoDb::next_ticket_sequence`]); this
//! module only turns a (year, sequence) pair into the display identifier.

/// Render a ticket number of the form `TKT-{year}-{seq}`.
///
/// The sequence is left-padded with zeros to a minimum width of six digits
/// and simply widens beyond 999999; it is never truncated.
pub fn format_ticket_number(year: i32, seq: i64) -> String {
    format!("TKT-{}-{:06}", year, seq)
}
