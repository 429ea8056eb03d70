//! Implements a struct that holds the state of the REST server.

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::{Error, db::initialize, pagination::PaginationConfig, transaction::MonthMatch};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The database connection
    pub db_connection: Arc<Mutex<Connection>>,

    /// The config that controls how to page through transactions.
    pub pagination_config: PaginationConfig,

    /// How a month filter is matched against the date of sale.
    pub month_match: MonthMatch,

    /// The URL of the JSON feed used to (re)seed the database.
    pub seed_url: String,

    /// The HTTP client used to download the seed feed.
    pub http_client: reqwest::Client,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized.
    pub fn new(
        db_connection: Connection,
        seed_url: &str,
        month_match: MonthMatch,
        pagination_config: PaginationConfig,
    ) -> Result<Self, Error> {
        initialize(&db_connection)?;

        Ok(Self {
            db_connection: Arc::new(Mutex::new(db_connection)),
            pagination_config,
            month_match,
            seed_url: seed_url.to_owned(),
            http_client: reqwest::Client::new(),
        })
    }
}
