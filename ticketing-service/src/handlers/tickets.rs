use crate::dtos::{
    CreateTicketRequest, TicketListParams, TicketListResponse, TicketResponse,
    UpdateTicketStatusRequest,
};
use crate::models::{CreateTicket, ListTicketsFilter};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn create_ticket(
    State(state): State<AppState>,
    Json(payload): Json<CreateTicketRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let input = CreateTicket::from(payload);
    let ticket = state.db.create_ticket(&input).await?;

    Ok((StatusCode::CREATED, Json(TicketResponse::from(ticket))))
}

pub async fn get_ticket(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = state
        .db
        .get_ticket(&ticket_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Ticket not found")))?;

    Ok(Json(TicketResponse::from(ticket)))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Query(params): Query<TicketListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);

    let filter = ListTicketsFilter {
        status: params.status,
        priority: params.priority,
        client_id: params.client_id,
        page,
        page_size,
    };

    let (tickets, total) = state.db.list_tickets(&filter).await?;
    let total_pages = total.div_ceil(page_size);

    Ok(Json(TicketListResponse {
        tickets: tickets.into_iter().map(TicketResponse::from).collect(),
        total,
        page,
        page_size,
        total_pages,
    }))
}

pub async fn update_ticket_status(
    State(state): State<AppState>,
    Path(ticket_id): Path<String>,
    Json(payload): Json<UpdateTicketStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let ticket = state
        .db
        .update_ticket_status(&ticket_id, payload.status)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Ticket not found")))?;

    Ok(Json(TicketResponse::from(ticket)))
}
