use crate::dtos::{
    CreateInvoiceRequest, InvoiceListParams, InvoiceListResponse, InvoiceResponse,
    RecordPaymentRequest, UpdateInvoiceRequest, UpdateInvoiceStatusRequest,
};
use crate::models::{CreateInvoice, ListInvoicesFilter, RecordPayment, UpdateInvoice};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

pub async fn create_invoice(
    State(state): State<AppState>,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let input = CreateInvoice::from(payload);
    let invoice = state
        .db
        .create_invoice(input, &state.config.currency)
        .await?;

    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(invoice))))
}

pub async fn get_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .db
        .get_invoice(&invoice_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(InvoiceResponse::from(invoice)))
}

pub async fn list_invoices(
    State(state): State<AppState>,
    Query(params): Query<InvoiceListParams>,
) -> Result<impl IntoResponse, AppError> {
    let page = params.page.unwrap_or(1).max(1);
    let page_size = params.page_size.unwrap_or(20).clamp(1, 100);

    let filter = ListInvoicesFilter {
        status: params.status,
        client_id: params.client_id,
        page,
        page_size,
    };

    let (invoices, total) = state.db.list_invoices(&filter).await?;
    let total_pages = total.div_ceil(page_size);

    Ok(Json(InvoiceListResponse {
        invoices: invoices.into_iter().map(InvoiceResponse::from).collect(),
        total,
        page,
        page_size,
        total_pages,
    }))
}

pub async fn update_invoice(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let input = UpdateInvoice::from(payload);
    let invoice = state
        .db
        .update_invoice(&invoice_id, &input, &state.config.currency)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(InvoiceResponse::from(invoice)))
}

pub async fn record_payment(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(payload): Json<RecordPaymentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let input = RecordPayment::from(payload);
    let invoice = state
        .db
        .record_payment(&invoice_id, &input)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok((StatusCode::CREATED, Json(InvoiceResponse::from(invoice))))
}

pub async fn update_invoice_status(
    State(state): State<AppState>,
    Path(invoice_id): Path<String>,
    Json(payload): Json<UpdateInvoiceStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    let invoice = state
        .db
        .set_status(&invoice_id, payload.status)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice not found")))?;

    Ok(Json(InvoiceResponse::from(invoice)))
}
