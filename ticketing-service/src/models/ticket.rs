//! Ticket model for ticketing-service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ticket workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::InProgress => "in_progress",
            TicketStatus::Resolved => "resolved",
            TicketStatus::Closed => "closed",
        }
    }
}

/// Ticket priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Medium => "medium",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

/// Support ticket document.
///
/// `ticket_number` is assigned exactly once, at creation, and never mutated
/// afterwards. A unique index on the field backs that guarantee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    #[serde(rename = "_id")]
    pub id: String,
    pub ticket_number: String,
    pub subject: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub client_id: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Ticket {
    pub fn new(ticket_number: String, input: &CreateTicket) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            ticket_number,
            subject: input.subject.clone(),
            description: input.description.clone(),
            status: TicketStatus::Open,
            priority: input.priority,
            client_id: input.client_id.clone(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating a ticket.
#[derive(Debug, Clone)]
pub struct CreateTicket {
    pub subject: String,
    pub description: String,
    pub priority: TicketPriority,
    pub client_id: Option<String>,
}

/// Filter parameters for listing tickets.
#[derive(Debug, Clone, Default)]
pub struct ListTicketsFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub client_id: Option<String>,
    pub page: u64,
    pub page_size: u64,
}
