//! The JSON endpoint that lists one page of the filtered transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{AppState, Error, pagination::PaginationConfig};

use super::{
    core::Transaction,
    query::{
        FilterParams, MonthMatch, TransactionFilter, count_matching_transactions,
        query_transactions,
    },
};

/// The state needed to list transactions.
#[derive(Debug, Clone)]
pub struct TransactionsState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The config that controls how to page through transactions.
    pub pagination_config: PaginationConfig,
    /// How the month filter is matched against the date of sale.
    pub month_match: MonthMatch,
}

impl FromRef<AppState> for TransactionsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
            month_match: state.month_match,
        }
    }
}

/// The query parameters accepted by [list_transactions_endpoint].
#[derive(Debug, Default, Deserialize)]
pub struct ListingParams {
    /// Month number, 0 for all months.
    pub month: Option<String>,
    /// Text to look for in the title, description or price.
    pub search: Option<String>,
    /// The page number, starting from 1.
    pub page: Option<String>,
    /// The number of transactions per page.
    pub limit: Option<String>,
}

/// One page of the filtered transactions along with the parameters that produced it.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    /// The number of transactions matching the filter across all pages.
    pub total_count: u64,
    /// The page that was returned.
    pub page: u64,
    /// The page size that was used.
    pub limit: u64,
    /// The month filter that was applied, 0 for all months.
    pub month: u8,
    /// The search text that was applied.
    pub search: String,
    /// The transactions on this page, ordered by ID.
    pub transactions: Vec<Transaction>,
}

/// Handler for `GET /api/transactions`.
///
/// Malformed parameters fall back to their defaults. A filter that matches
/// nothing returns an empty page rather than an error.
pub async fn list_transactions_endpoint(
    State(state): State<TransactionsState>,
    Query(params): Query<ListingParams>,
) -> Result<Json<TransactionPage>, Error> {
    let filter = FilterParams {
        month: params.month,
        search: params.search,
    }
    .to_filter();
    let window = state
        .pagination_config
        .window(params.page.as_deref(), params.limit.as_deref());

    let connection = state
        .db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    let total_count = count_matching_transactions(&filter, state.month_match, &connection)
        .inspect_err(|error| tracing::error!("could not count transactions: {error}"))?;
    let transactions = query_transactions(&filter, state.month_match, window, &connection)
        .inspect_err(|error| tracing::error!("could not query transactions: {error}"))?;

    let TransactionFilter { month, search } = filter;

    Ok(Json(TransactionPage {
        total_count,
        page: window.page,
        limit: window.limit,
        month: month.as_number(),
        search,
        transactions,
    }))
}
