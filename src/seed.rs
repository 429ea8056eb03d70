//! Loads transactions from the JSON seed feed and replaces the stored transactions with them.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::{
    AppState, Error,
    transaction::{
        Transaction, TransactionId, count_transactions, delete_all_transactions,
        insert_transactions,
    },
};

/// One item of the seed feed as it appears on the wire.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedRecord {
    id: TransactionId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    /// Kept as a raw value so that non-numeric prices skip the record instead
    /// of failing the whole feed.
    #[serde(default)]
    price: serde_json::Value,
    #[serde(default)]
    category: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    sold: bool,
    #[serde(default)]
    date_of_sale: String,
}

impl SeedRecord {
    fn into_transaction(self) -> Option<Transaction> {
        let price = self
            .price
            .as_f64()
            .filter(|price| *price >= 0.0 && Decimal::try_from(*price).is_ok())?;
        let date_of_sale = OffsetDateTime::parse(&self.date_of_sale, &Rfc3339).ok()?;

        Some(
            Transaction::build(self.id, price, date_of_sale)
                .title(&self.title)
                .description(&self.description)
                .category(&self.category)
                .image(&self.image)
                .sold(self.sold)
                .finalize(),
        )
    }
}

/// The valid transactions in a seed feed and how many items were left out.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedRecords {
    /// The transactions that passed validation, in feed order.
    pub transactions: Vec<Transaction>,
    /// The number of feed items that were skipped because they were malformed.
    pub skipped: usize,
}

/// Parse the seed feed, a JSON array of product records.
///
/// Items without a numeric, non-negative price that fits in a [Decimal] or without an RFC 3339 date of
/// sale are skipped and counted rather than treated as errors.
///
/// # Errors
/// Returns [Error::SeedParse] if `bytes` is not a JSON array.
pub fn parse_seed_records(bytes: &[u8]) -> Result<SeedRecords, Error> {
    let items: Vec<serde_json::Value> =
        serde_json::from_slice(bytes).map_err(|error| Error::SeedParse(error.to_string()))?;

    let mut transactions = Vec::with_capacity(items.len());
    let mut skipped = 0;

    for item in items {
        match serde_json::from_value::<SeedRecord>(item)
            .ok()
            .and_then(SeedRecord::into_transaction)
        {
            Some(transaction) => transactions.push(transaction),
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::warn!("skipped {skipped} malformed seed records");
    }

    Ok(SeedRecords {
        transactions,
        skipped,
    })
}

/// Download and parse the seed feed at `url`.
///
/// # Errors
/// Returns:
/// - [Error::SeedFetch] if the request fails or the server responds with an error status,
/// - [Error::SeedParse] if the response body is not a JSON array.
pub async fn fetch_seed_records(client: &reqwest::Client, url: &str) -> Result<SeedRecords, Error> {
    tracing::info!("fetching seed data from {url}");

    let bytes = client
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|error| Error::SeedFetch(error.to_string()))?
        .bytes()
        .await
        .map_err(|error| Error::SeedFetch(error.to_string()))?;

    parse_seed_records(&bytes)
}

/// Replace every stored transaction with `transactions`.
///
/// The delete and the inserts run in one SQL transaction, so on error the
/// previously stored transactions are left untouched.
///
/// # Errors
/// Returns:
/// - [Error::DuplicateTransactionId] if two transactions share an ID,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn replace_all_transactions(
    transactions: &[Transaction],
    connection: &Connection,
) -> Result<usize, Error> {
    let tx = connection.unchecked_transaction()?;

    let deleted = delete_all_transactions(&tx)?;
    let inserted = insert_transactions(transactions, &tx)?;

    tx.commit()?;

    tracing::debug!("replaced {deleted} transactions with {inserted} new ones");

    Ok(inserted)
}

/// The outcome of reseeding the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedReport {
    /// A human readable summary.
    pub message: String,
    /// The number of transactions now stored.
    pub inserted: usize,
    /// The number of feed items that were skipped.
    pub skipped: usize,
}

/// Whether the store has no transactions yet.
///
/// # Errors
/// Returns [Error::DatabaseLockError] if the lock is poisoned, or
/// [Error::SqlError] if the transactions cannot be counted.
pub fn is_store_empty(db_connection: &Mutex<Connection>) -> Result<bool, Error> {
    let connection = db_connection
        .lock()
        .map_err(|_| Error::DatabaseLockError)?;

    count_transactions(&connection).map(|count| count == 0)
}

/// Fetch the seed feed at `url` and replace the stored transactions with it.
///
/// The database lock is only taken once the feed has been downloaded and parsed.
///
/// # Errors
/// Returns any of the errors from [fetch_seed_records] and
/// [replace_all_transactions], or [Error::DatabaseLockError] if the lock is poisoned.
pub async fn seed_from_url(
    client: &reqwest::Client,
    url: &str,
    db_connection: &Mutex<Connection>,
) -> Result<SeedReport, Error> {
    let records = fetch_seed_records(client, url).await?;

    let connection = db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;
    let inserted = replace_all_transactions(&records.transactions, &connection)?;

    tracing::info!(
        "seeded database with {inserted} transactions, skipped {}",
        records.skipped
    );

    Ok(SeedReport {
        message: "Database initialized successfully".to_owned(),
        inserted,
        skipped: records.skipped,
    })
}

/// The state needed to reseed the database.
#[derive(Debug, Clone)]
pub struct SeedState {
    /// The database connection for storing transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The URL of the JSON seed feed.
    pub seed_url: String,
    /// The HTTP client used to download the seed feed.
    pub http_client: reqwest::Client,
}

impl FromRef<AppState> for SeedState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            seed_url: state.seed_url.clone(),
            http_client: state.http_client.clone(),
        }
    }
}

/// Handler for `POST /api/initialize`.
///
/// Reseeding is idempotent: running it twice stores the same transactions.
pub async fn initialize_endpoint(State(state): State<SeedState>) -> Result<Json<SeedReport>, Error> {
    seed_from_url(&state.http_client, &state.seed_url, &state.db_connection)
        .await
        .inspect_err(|error| tracing::error!("could not seed database: {error}"))
        .map(Json)
}
