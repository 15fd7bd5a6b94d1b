//! Domain models for ticketing-service.

mod counter;
mod ticket;

pub use counter::SequenceCounter;
pub use ticket::{CreateTicket, ListTicketsFilter, Ticket, TicketPriority, TicketStatus};
