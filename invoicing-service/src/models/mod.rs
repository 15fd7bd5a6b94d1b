//! Domain models for invoicing-service.

mod invoice;

pub use invoice::{
    CreateInvoice, Invoice, InvoiceStatus, LineItem, ListInvoicesFilter, Payment, PaymentMethod,
    RecordPayment, UpdateInvoice,
};
