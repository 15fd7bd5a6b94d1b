mod health;
mod invoices;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use invoices::{
    create_invoice, get_invoice, list_invoices, record_payment, update_invoice,
    update_invoice_status,
};
