mod tickets;

pub use tickets::{
    CreateTicketRequest, TicketListParams, TicketListResponse, TicketResponse,
    UpdateTicketStatusRequest,
};
