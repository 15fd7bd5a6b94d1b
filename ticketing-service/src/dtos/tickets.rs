use crate::models::{CreateTicket, Ticket, TicketPriority, TicketStatus};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateTicketRequest {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_priority")]
    pub priority: TicketPriority,
    pub client_id: Option<String>,
}

fn default_priority() -> TicketPriority {
    TicketPriority::Medium
}

impl From<CreateTicketRequest> for CreateTicket {
    fn from(req: CreateTicketRequest) -> Self {
        Self {
            subject: req.subject,
            description: req.description,
            priority: req.priority,
            client_id: req.client_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateTicketStatusRequest {
    pub status: TicketStatus,
}

#[derive(Debug, Deserialize)]
pub struct TicketListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TicketResponse {
    pub id: String,
    pub ticket_number: String,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub client_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Ticket> for TicketResponse {
    fn from(ticket: Ticket) -> Self {
        Self {
            id: ticket.id,
            ticket_number: ticket.ticket_number,
            subject: ticket.subject,
            description: ticket.description,
            status: ticket.status,
            priority: ticket.priority,
            client_id: ticket.client_id,
            created_at: ticket.created_at.to_rfc3339(),
            updated_at: ticket.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TicketListResponse {
    pub tickets: Vec<TicketResponse>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}
