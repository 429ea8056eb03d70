//! A small analytics dashboard over a collection of sale transactions.
//!
//! The transactions are seeded from a third-party JSON feed into SQLite. This
//! library provides a REST API for listing them with month/search filters and
//! for computing sales statistics and chart-ready breakdowns, plus a
//! server-rendered dashboard page that presents the same data.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod analytics;
mod app_state;
mod dashboard;
mod db;
mod endpoints;
mod html;
mod logging;
mod pagination;
mod routing;
mod seed;
mod transaction;

pub use app_state::AppState;
pub use db::initialize as initialize_db;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use pagination::PaginationConfig;
pub use routing::build_router;
pub use seed::{
    SeedRecords, SeedReport, fetch_seed_records, is_store_empty, parse_seed_records,
    replace_all_transactions, seed_from_url,
};
pub use transaction::{MonthMatch, count_transactions};

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The seed feed could not be downloaded, or the server responded with an
    /// error status.
    ///
    /// The store is left untouched when this happens.
    #[error("could not fetch the seed data: {0}")]
    SeedFetch(String),

    /// The seed feed was downloaded but is not a JSON array of transactions.
    #[error("could not parse the seed data: {0}")]
    SeedParse(String),

    /// Two records in the seed data share the same ID.
    ///
    /// The seeding SQL transaction is rolled back, so the previous contents of
    /// the store are kept.
    #[error("the transaction ID {0} appears more than once in the seed data")]
    DuplicateTransactionId(i64),

    /// A stored price could not be converted to a fixed-point decimal.
    #[error("the price {0} cannot be represented as a decimal")]
    InvalidPrice(f64),

    /// The sum of the sold prices is too large to represent as a decimal.
    #[error("the total sale amount is too large to represent")]
    SaleTotalOverflow,

    /// One of the concurrent summary tasks panicked or was cancelled.
    #[error("a background task failed: {0}")]
    JoinError(String),

    /// The requested resource was not found.
    #[error("the requested resource could not be found")]
    NotFound,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(value: tokio::task::JoinError) -> Self {
        Error::JoinError(value.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match &self {
            Error::NotFound => StatusCode::NOT_FOUND,
            error => {
                tracing::error!("An unexpected error occurred: {}", error);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
