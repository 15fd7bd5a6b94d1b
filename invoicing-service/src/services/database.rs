//! Database service for invoicing-service.
//!
//! All invoice mutations are version-guarded compare-and-set writes: the
//! document is read, the new state is derived through the ledger, and the
//! write only lands if the stored `version` still matches the one read.
//! A stale stamp means another writer got there first; the operation re-reads
//! and revalidates, so two concurrent payments can never jointly overpay.

use crate::config::CurrencyConfig;
use crate::ledger;
use crate::models::{
    CreateInvoice, Invoice, InvoiceStatus, ListInvoicesFilter, Payment, RecordPayment,
    UpdateInvoice,
};
use crate::services::metrics::{
    DB_QUERY_DURATION, INVOICES_TOTAL, INVOICE_AMOUNT_TOTAL, PAYMENTS_TOTAL, PAYMENT_AMOUNT_TOTAL,
};
use chrono::Utc;
use futures::stream::TryStreamExt;
use mongodb::{
    bson::{doc, Bson},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};
use rust_decimal::prelude::ToPrimitive;
use service_core::error::AppError;
use tracing::{info, instrument};

/// How many times a version-guarded write is retried on a stale read.
const CAS_ATTEMPTS: usize = 3;

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!(uri = %uri, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB at {}: {}", uri, e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for invoicing-service");

        let invoices = self.invoices();

        // Compound index for the status-filtered, newest-first listing.
        let status_index = IndexModel::builder()
            .keys(doc! { "status": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("status_created_lookup".to_string())
                    .build(),
            )
            .build();

        invoices
            .create_index(status_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create status index on invoices collection: {}",
                    e
                );
                AppError::from(e)
            })?;
        tracing::info!("Created index on invoices.(status, created_at)");

        let client_index = IndexModel::builder()
            .keys(doc! { "client_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("client_lookup".to_string())
                    .build(),
            )
            .build();

        invoices
            .create_index(client_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create client_id index on invoices collection: {}",
                    e
                );
                AppError::from(e)
            })?;
        tracing::info!("Created index on invoices.client_id");

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn invoices(&self) -> Collection<Invoice> {
        self.db.collection("invoices")
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    /// Create an invoice with ledger-derived totals.
    #[instrument(skip(self, input, currency), fields(client_name = %input.client_name))]
    pub async fn create_invoice(
        &self,
        input: CreateInvoice,
        currency: &CurrencyConfig,
    ) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let totals = ledger::compute_totals(&input.items, input.tax_rate, input.discount_rate)
            .map_err(AppError::from)?
            .rounded(currency.scale);
        let code = input
            .currency
            .clone()
            .unwrap_or_else(|| currency.code.clone());
        let invoice = Invoice::new(input, &totals, code);

        self.invoices()
            .insert_one(&invoice, None)
            .await
            .map_err(AppError::from)?;

        timer.observe_duration();

        INVOICES_TOTAL
            .with_label_values(&[invoice.status.as_str()])
            .inc();
        INVOICE_AMOUNT_TOTAL
            .with_label_values(&[&invoice.currency])
            .inc_by(invoice.total_amount.to_f64().unwrap_or(0.0));

        info!(
            invoice_id = %invoice.id,
            total_amount = %invoice.total_amount,
            "Invoice created"
        );

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn get_invoice(&self, invoice_id: &str) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = self
            .invoices()
            .find_one(doc! { "_id": invoice_id }, None)
            .await
            .map_err(AppError::from)?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// List invoices, newest first.
    #[instrument(skip(self, filter))]
    pub async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
    ) -> Result<(Vec<Invoice>, u64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let mut query = doc! {};
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }
        if let Some(ref client_id) = filter.client_id {
            query.insert("client_id", client_id.as_str());
        }

        let total = self
            .invoices()
            .count_documents(query.clone(), None)
            .await
            .map_err(AppError::from)?;

        let page_size = filter.page_size.clamp(1, 100);
        let skip = (filter.page.max(1) - 1) * page_size;
        let find_options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(skip)
            .limit(page_size as i64)
            .build();

        let mut cursor = self
            .invoices()
            .find(query, find_options)
            .await
            .map_err(AppError::from)?;

        let mut invoices = Vec::new();
        while let Some(invoice) = cursor.try_next().await.map_err(AppError::from)? {
            invoices.push(invoice);
        }

        timer.observe_duration();

        Ok((invoices, total))
    }

    /// Update an invoice, recomputing totals when items or rates change.
    ///
    /// Items and rates are frozen once payments exist: a shrunken total
    /// under an existing payment history would force the balance negative.
    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        invoice_id: &str,
        input: &UpdateInvoice,
        currency: &CurrencyConfig,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        for _attempt in 0..CAS_ATTEMPTS {
            let existing = match self.get_invoice(invoice_id).await? {
                Some(invoice) => invoice,
                None => return Ok(None),
            };

            let financials_changed =
                input.items.is_some() || input.tax_rate.is_some() || input.discount_rate.is_some();
            if financials_changed && !existing.payment_history.is_empty() {
                return Err(AppError::Conflict(anyhow::anyhow!(
                    "Cannot change items or rates once payments have been recorded"
                )));
            }

            let items = input.items.clone().unwrap_or_else(|| existing.items.clone());
            let tax_rate = input.tax_rate.unwrap_or(existing.tax_rate);
            let discount_rate = input.discount_rate.unwrap_or(existing.discount_rate);
            let totals = ledger::compute_totals(&items, tax_rate, discount_rate)
                .map_err(AppError::from)?
                .rounded(currency.scale);
            let client_name = input
                .client_name
                .clone()
                .unwrap_or_else(|| existing.client_name.clone());
            let balance = ledger::balance(totals.total_amount, existing.total_paid);

            let update = doc! {
                "$set": {
                    "client_name": client_name.as_str(),
                    "items": to_bson(&items)?,
                    "tax_rate": to_bson(&tax_rate)?,
                    "discount_rate": to_bson(&discount_rate)?,
                    "sub_total": to_bson(&totals.sub_total)?,
                    "discount_amount": to_bson(&totals.discount_amount)?,
                    "tax_amount": to_bson(&totals.tax_amount)?,
                    "total_amount": to_bson(&totals.total_amount)?,
                    "balance": to_bson(&balance)?,
                    "updated_at": mongodb::bson::DateTime::now(),
                },
                "$inc": { "version": 1i64 },
            };

            let options = FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build();

            let updated = self
                .invoices()
                .find_one_and_update(
                    doc! { "_id": invoice_id, "version": existing.version },
                    update,
                    options,
                )
                .await
                .map_err(AppError::from)?;

            if let Some(invoice) = updated {
                timer.observe_duration();
                info!(invoice_id = %invoice.id, "Invoice updated");
                return Ok(Some(invoice));
            }
            // Stale version: another writer landed first, re-read and retry.
        }

        Err(AppError::Conflict(anyhow::anyhow!(
            "Invoice was modified concurrently, please retry"
        )))
    }

    /// Record a payment against an invoice.
    ///
    /// The ledger validates the amount against the balance read alongside
    /// the version stamp; the version guard on the write makes the
    /// check-then-append atomic.
    #[instrument(skip(self, input), fields(invoice_id = %invoice_id))]
    pub async fn record_payment(
        &self,
        invoice_id: &str,
        input: &RecordPayment,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["record_payment"])
            .start_timer();

        for _attempt in 0..CAS_ATTEMPTS {
            let existing = match self.get_invoice(invoice_id).await? {
                Some(invoice) => invoice,
                None => return Ok(None),
            };

            ledger::validate_payment(existing.total_amount, existing.total_paid, input.amount)
                .map_err(AppError::from)?;

            let payment = Payment {
                amount: input.amount,
                method: input.method,
                date: input.date,
                reference: input.reference.clone(),
                recorded_at: Utc::now(),
            };
            let total_paid = existing.total_paid + input.amount;
            let balance = ledger::balance(existing.total_amount, total_paid);

            let update = doc! {
                "$push": { "payment_history": to_bson(&payment)? },
                "$set": {
                    "total_paid": to_bson(&total_paid)?,
                    "balance": to_bson(&balance)?,
                    "updated_at": mongodb::bson::DateTime::now(),
                },
                "$inc": { "version": 1i64 },
            };

            let options = FindOneAndUpdateOptions::builder()
                .return_document(ReturnDocument::After)
                .build();

            let updated = self
                .invoices()
                .find_one_and_update(
                    doc! { "_id": invoice_id, "version": existing.version },
                    update,
                    options,
                )
                .await
                .map_err(AppError::from)?;

            if let Some(invoice) = updated {
                timer.observe_duration();
                PAYMENTS_TOTAL
                    .with_label_values(&[input.method.as_str()])
                    .inc();
                PAYMENT_AMOUNT_TOTAL
                    .with_label_values(&[&invoice.currency])
                    .inc_by(input.amount.to_f64().unwrap_or(0.0));
                info!(
                    invoice_id = %invoice.id,
                    amount = %input.amount,
                    method = input.method.as_str(),
                    balance = %invoice.balance,
                    "Payment recorded"
                );
                return Ok(Some(invoice));
            }
            // Stale version: revalidate against the fresh balance.
        }

        Err(AppError::Conflict(anyhow::anyhow!(
            "Invoice was modified concurrently, please retry"
        )))
    }

    /// Assign an invoice status. Any status may move to any other; the
    /// balance is not consulted.
    #[instrument(skip(self), fields(invoice_id = %invoice_id))]
    pub async fn set_status(
        &self,
        invoice_id: &str,
        status: InvoiceStatus,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["set_status"])
            .start_timer();

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let invoice = self
            .invoices()
            .find_one_and_update(
                doc! { "_id": invoice_id },
                doc! {
                    "$set": {
                        "status": status.as_str(),
                        "updated_at": mongodb::bson::DateTime::now(),
                    },
                    "$inc": { "version": 1i64 },
                },
                options,
            )
            .await
            .map_err(AppError::from)?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            INVOICES_TOTAL.with_label_values(&[status.as_str()]).inc();
            info!(invoice_id = %inv.id, status = status.as_str(), "Invoice status updated");
        }

        Ok(invoice)
    }
}

fn to_bson<T: serde::Serialize>(value: &T) -> Result<Bson, AppError> {
    mongodb::bson::to_bson(value)
        .map_err(|e| AppError::InternalError(anyhow::anyhow!("Failed to serialize field: {}", e)))
}
