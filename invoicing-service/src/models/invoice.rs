//! Invoice model for invoicing-service.

use crate::ledger::Totals;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Invoice status.
///
/// Assigned explicitly; any status may move to any other. Never derived
/// from the payment state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Cancelled,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Cancelled => "cancelled",
        }
    }
}

/// Payment method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Bank,
    Check,
    Mobile,
    Simulated,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Bank => "bank",
            PaymentMethod::Check => "check",
            PaymentMethod::Mobile => "mobile",
            PaymentMethod::Simulated => "simulated",
        }
    }
}

/// Invoice line item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
}

/// Recorded payment. Entries are append-only: never edited, never removed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub date: NaiveDate,
    pub reference: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub recorded_at: DateTime<Utc>,
}

/// Invoice document.
///
/// The stored totals are derivations of `items`/`tax_rate`/`discount_rate`
/// and are recomputed through the ledger on every change to those inputs;
/// `total_paid` and `balance` are likewise kept consistent with
/// `payment_history`. `version` stamps every mutation for optimistic
/// concurrency control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    #[serde(rename = "_id")]
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
    pub status: InvoiceStatus,
    pub payment_history: Vec<Payment>,
    pub version: i64,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    pub fn new(input: CreateInvoice, totals: &Totals, currency: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            client_id: input.client_id,
            client_name: input.client_name,
            currency,
            items: input.items,
            tax_rate: input.tax_rate,
            discount_rate: input.discount_rate,
            sub_total: totals.sub_total,
            discount_amount: totals.discount_amount,
            tax_amount: totals.tax_amount,
            total_amount: totals.total_amount,
            total_paid: Decimal::ZERO,
            balance: totals.total_amount,
            status: InvoiceStatus::Pending,
            payment_history: Vec::new(),
            version: 1,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub client_id: Option<String>,
    pub client_name: String,
    pub currency: Option<String>,
    pub items: Vec<LineItem>,
    pub tax_rate: Decimal,
    pub discount_rate: Decimal,
}

/// Input for updating an invoice.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub client_name: Option<String>,
    pub items: Option<Vec<LineItem>>,
    pub tax_rate: Option<Decimal>,
    pub discount_rate: Option<Decimal>,
}

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct RecordPayment {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub date: NaiveDate,
    pub reference: Option<String>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub client_id: Option<String>,
    pub page: u64,
    pub page_size: u64,
}
