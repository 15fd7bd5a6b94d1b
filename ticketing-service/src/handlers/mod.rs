mod health;
mod tickets;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use tickets::{create_ticket, get_ticket, list_tickets, update_ticket_status};
