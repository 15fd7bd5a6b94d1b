mod invoices;

pub use invoices::{
    CreateInvoiceRequest, InvoiceListParams, InvoiceListResponse, InvoiceResponse, LineItemInput,
    PaymentResponse, RecordPaymentRequest, UpdateInvoiceRequest, UpdateInvoiceStatusRequest,
};
