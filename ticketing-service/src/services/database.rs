//! Database service for ticketing-service.

use crate::models::{CreateTicket, ListTicketsFilter, SequenceCounter, Ticket, TicketStatus};
use crate::sequence::format_ticket_number;
use crate::services::metrics::{DB_QUERY_DURATION, SEQUENCE_CONFLICTS_TOTAL, TICKETS_TOTAL};
use chrono::{Datelike, Utc};
use futures::stream::TryStreamExt;
use mongodb::{
    bson::doc,
    error::{ErrorKind, WriteFailure},
    options::{FindOneAndUpdateOptions, FindOptions, IndexOptions, ReturnDocument},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;
use tracing::{info, instrument, warn};

/// How many fresh sequence values to try before giving up on an insert.
/// The counter is atomic, so a collision only happens if a number was
/// assigned outside the counter (e.g. restored data).
const SEQUENCE_INSERT_ATTEMPTS: usize = 3;

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
        tracing::info!("Creating MongoDB indexes for ticketing-service");

        let tickets = self.tickets();

        // Unique index backing the assigned-exactly-once guarantee on
        // ticket numbers.
        let ticket_number_index = IndexModel::builder()
            .keys(doc! { "ticket_number": 1 })
            .options(
                IndexOptions::builder()
                    .name("ticket_number_unique".to_string())
                    .unique(true)
                    .build(),
            )
            .build();

        tickets
            .create_index(ticket_number_index, None)
            .await
            .map_err(|e| {
                tracing::error!(
                    "Failed to create ticket_number index on tickets collection: {}",
                    e
                );
                AppError::from(e)
            })?;
        tracing::info!("Created unique index on tickets.ticket_number");

        // Compound index for the status-filtered, newest-first listing.
        let status_index = IndexModel::builder()
            .keys(doc! { "status": 1, "created_at": -1 })
            .options(
                IndexOptions::builder()
                    .name("status_created_lookup".to_string())
                    .build(),
            )
            .build();

        tickets.create_index(status_index, None).await.map_err(|e| {
            tracing::error!("Failed to create status index on tickets collection: {}", e);
            AppError::from(e)
        })?;
        tracing::info!("Created index on tickets.(status, created_at)");

        let client_index = IndexModel::builder()
            .keys(doc! { "client_id": 1 })
            .options(
                IndexOptions::builder()
                    .name("client_lookup".to_string())
                    .build(),
            )
            .build();

        tickets.create_index(client_index, None).await.map_err(|e| {
            tracing::error!(
                "Failed to create client_id index on tickets collection: {}",
                e
            );
            AppError::from(e)
        })?;
        tracing::info!("Created index on tickets.client_id");

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

    pub fn tickets(&self) -> Collection<Ticket> {
        self.db.collection("tickets")
    }

    pub fn counters(&self) -> Collection<SequenceCounter> {
        self.db.collection("counters")
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    /// Hand out the next ticket sequence value for a year.
    ///
    /// A single atomic `$inc` (upserting the counter document on first use)
    /// guarantees that concurrent callers each receive a distinct value; the
    /// counter is never derived by counting rows.
    #[instrument(skip(self))]
    pub async fn next_ticket_sequence(&self, year: i32) -> Result<i64, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["next_ticket_sequence"])
            .start_timer();

        let options = FindOneAndUpdateOptions::builder()
            .upsert(true)
            .return_document(ReturnDocument::After)
            .build();

        let counter = self
            .counters()
            .find_one_and_update(doc! { "_id": year }, doc! { "$inc": { "seq": 1i64 } }, options)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| {
                AppError::DatabaseError(anyhow::anyhow!(
                    "Counter upsert for year {} returned no document",
                    year
                ))
            })?;

        timer.observe_duration();

        Ok(counter.seq)
    }

    /// Create a ticket, assigning its number from the per-year counter.
    ///
    /// If the unique index still reports a duplicate number, creation
    /// retries with a fresh sequence value a bounded number of times.
    #[instrument(skip(self, input))]
    pub async fn create_ticket(&self, input: &CreateTicket) -> Result<Ticket, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_ticket"])
            .start_timer();

        let year = Utc::now().year();

        for attempt in 1..=SEQUENCE_INSERT_ATTEMPTS {
            let seq = self.next_ticket_sequence(year).await?;
            let ticket = Ticket::new(format_ticket_number(year, seq), input);

            match self.tickets().insert_one(&ticket, None).await {
                Ok(_) => {
                    timer.observe_duration();
                    TICKETS_TOTAL
                        .with_label_values(&[ticket.status.as_str()])
                        .inc();
                    info!(
                        ticket_id = %ticket.id,
                        ticket_number = %ticket.ticket_number,
                        "Ticket created"
                    );
                    return Ok(ticket);
                }
                Err(e) if is_duplicate_key_error(&e) => {
                    SEQUENCE_CONFLICTS_TOTAL
                        .with_label_values(&["retried"])
                        .inc();
                    warn!(
                        attempt,
                        ticket_number = %ticket.ticket_number,
                        "Duplicate ticket number, retrying with a fresh sequence"
                    );
                }
                Err(e) => return Err(AppError::from(e)),
            }
        }

        SEQUENCE_CONFLICTS_TOTAL
            .with_label_values(&["exhausted"])
            .inc();
        Err(AppError::Conflict(anyhow::anyhow!(
            "Could not assign a unique ticket number after {} attempts",
            SEQUENCE_INSERT_ATTEMPTS
        )))
    }

    /// Get a ticket by ID.
    #[instrument(skip(self), fields(ticket_id = %ticket_id))]
    pub async fn get_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_ticket"])
            .start_timer();

        let ticket = self
            .tickets()
            .find_one(doc! { "_id": ticket_id }, None)
            .await
            .map_err(AppError::from)?;

        timer.observe_duration();

        Ok(ticket)
    }

    /// List tickets, newest first.
    #[instrument(skip(self, filter))]
    pub async fn list_tickets(
        &self,
        filter: &ListTicketsFilter,
    ) -> Result<(Vec<Ticket>, u64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_tickets"])
            .start_timer();

        let mut query = doc! {};
        if let Some(status) = filter.status {
            query.insert("status", status.as_str());
        }
        if let Some(priority) = filter.priority {
            query.insert("priority", priority.as_str());
        }
        if let Some(ref client_id) = filter.client_id {
            query.insert("client_id", client_id.as_str());
        }

        let total = self
            .tickets()
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
            .tickets()
            .find(query, find_options)
            .await
            .map_err(AppError::from)?;

        let mut tickets = Vec::new();
        while let Some(ticket) = cursor.try_next().await.map_err(AppError::from)? {
            tickets.push(ticket);
        }

        timer.observe_duration();

        Ok((tickets, total))
    }

    /// Assign a ticket status. Any status may move to any other.
    #[instrument(skip(self), fields(ticket_id = %ticket_id))]
    pub async fn update_ticket_status(
        &self,
        ticket_id: &str,
        status: TicketStatus,
    ) -> Result<Option<Ticket>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_ticket_status"])
            .start_timer();

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let ticket = self
            .tickets()
            .find_one_and_update(
                doc! { "_id": ticket_id },
                doc! {
                    "$set": {
                        "status": status.as_str(),
                        "updated_at": mongodb::bson::DateTime::now(),
                    }
                },
                options,
            )
            .await
            .map_err(AppError::from)?;

        timer.observe_duration();

        if let Some(ref t) = ticket {
            TICKETS_TOTAL.with_label_values(&[status.as_str()]).inc();
            info!(ticket_id = %t.id, status = status.as_str(), "Ticket status updated");
        }

        Ok(ticket)
    }
}

fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(write_error)) => write_error.code == 11000,
        _ => false,
    }
}
