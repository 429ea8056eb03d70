//! Sale transactions.
//!
//! This module contains everything related to the transaction records:
//! - The `Transaction` model and `TransactionBuilder` for creating transactions
//! - Database functions for storing, counting and replacing transactions
//! - The month/search filter and the paged listing query
//! - The JSON listing endpoint

mod core;
mod list_endpoint;
mod query;

pub use core::{
    Transaction, TransactionId, count_transactions, create_transaction_table,
    delete_all_transactions, insert_transactions,
};
pub use list_endpoint::list_transactions_endpoint;
pub use query::{
    FilterParams, MonthFilter, MonthMatch, TransactionFilter, count_matching_transactions,
    query_transactions,
};

pub(crate) use query::build_where_clause;
