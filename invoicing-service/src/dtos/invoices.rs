use crate::ledger;
use crate::models::{
    CreateInvoice, Invoice, InvoiceStatus, LineItem, Payment, PaymentMethod, RecordPayment,
    UpdateInvoice,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemInput {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

impl From<LineItemInput> for LineItem {
    fn from(input: LineItemInput) -> Self {
        Self {
            description: input.description,
            quantity: input.quantity,
            unit_price: input.unit_price,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub client_id: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub client_name: String,
    pub currency: Option<String>,
    pub items: Vec<LineItemInput>,
    #[serde(default)]
    pub tax_rate: Decimal,
    #[serde(default)]
    pub discount_rate: Decimal,
}

impl From<CreateInvoiceRequest> for CreateInvoice {
    fn from(req: CreateInvoiceRequest) -> Self {
        Self {
            client_id: req.client_id,
            client_name: req.client_name,
            currency: req.currency,
            items: req.items.into_iter().map(LineItem::from).collect(),
            tax_rate: req.tax_rate,
            discount_rate: req.discount_rate,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    #[validate(length(min = 1, max = 200))]
    pub client_name: Option<String>,
    pub items: Option<Vec<LineItemInput>>,
    pub tax_rate: Option<Decimal>,
    pub discount_rate: Option<Decimal>,
}

impl From<UpdateInvoiceRequest> for UpdateInvoice {
    fn from(req: UpdateInvoiceRequest) -> Self {
        Self {
            client_name: req.client_name,
            items: req
                .items
                .map(|items| items.into_iter().map(LineItem::from).collect()),
            tax_rate: req.tax_rate,
            discount_rate: req.discount_rate,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub date: NaiveDate,
    pub reference: Option<String>,
}

impl From<RecordPaymentRequest> for RecordPayment {
    fn from(req: RecordPaymentRequest) -> Self {
        Self {
            amount: req.amount,
            method: req.method,
            date: req.date,
            reference: req.reference,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceStatusRequest {
    pub status: InvoiceStatus,
}

#[derive(Debug, Deserialize)]
pub struct InvoiceListParams {
    pub page: Option<u64>,
    pub page_size: Option<u64>,
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub date: NaiveDate,
    pub reference: Option<String>,
    pub recorded_at: String,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            amount: payment.amount,
            method: payment.method,
            date: payment.date,
            reference: payment.reference,
            recorded_at: payment.recorded_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceResponse {
    pub id: String,
    pub client_id: Option<String>,
    pub client_name: String,
    pub currency: String,
    pub items: Vec<LineItem>,
    pub tax_rate: Decimal,
    pub discount_rate: Decimal,
    pub sub_total: Decimal,
    pub discount_amount: Decimal,
    pub tax_amount: Decimal,
    pub total_amount: Decimal,
    pub total_paid: Decimal,
    pub balance: Decimal,
    pub is_fully_paid: bool,
    pub status: InvoiceStatus,
    pub payment_history: Vec<PaymentResponse>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Invoice> for InvoiceResponse {
    fn from(invoice: Invoice) -> Self {
        let is_fully_paid = ledger::is_fully_paid(invoice.total_amount, invoice.total_paid);
        Self {
            id: invoice.id,
            client_id: invoice.client_id,
            client_name: invoice.client_name,
            currency: invoice.currency,
            items: invoice.items,
            tax_rate: invoice.tax_rate,
            discount_rate: invoice.discount_rate,
            sub_total: invoice.sub_total,
            discount_amount: invoice.discount_amount,
            tax_amount: invoice.tax_amount,
            total_amount: invoice.total_amount,
            total_paid: invoice.total_paid,
            balance: invoice.balance,
            is_fully_paid,
            status: invoice.status,
            payment_history: invoice
                .payment_history
                .into_iter()
                .map(PaymentResponse::from)
                .collect(),
            version: invoice.version,
            created_at: invoice.created_at.to_rfc3339(),
            updated_at: invoice.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InvoiceListResponse {
    pub invoices: Vec<InvoiceResponse>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub total_pages: u64,
}
