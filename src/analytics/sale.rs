//! Database query for the slimmed-down sale rows that the summaries aggregate.

use rusqlite::{Connection, params_from_iter};

use crate::{
    Error,
    transaction::{MonthMatch, TransactionFilter, build_where_clause},
};

/// A simplified transaction view for aggregation.
///
/// The summaries only need the price, the sold flag and the category, so the
/// text columns are never loaded.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Sale {
    pub price: f64,
    pub sold: bool,
    pub category: String,
}

/// Gets the price, sold flag and category of every transaction matching `filter`.
///
/// # Errors
/// Returns [Error::SqlError] if:
/// - SQL query preparation or execution fails
/// - Row mapping fails
pub(crate) fn get_sales(
    filter: &TransactionFilter,
    month_match: MonthMatch,
    connection: &Connection,
) -> Result<Vec<Sale>, Error> {
    let where_clause = build_where_clause(filter, month_match);
    let query = format!(
        "SELECT price, sold, category FROM \"transaction\" {} ORDER BY id ASC",
        where_clause.sql
    );

    let mut stmt = connection.prepare(&query)?;
    stmt.query_map(params_from_iter(where_clause.params), |row| {
        Ok(Sale {
            price: row.get(0)?,
            sold: row.get(1)?,
            category: row.get(2)?,
        })
    })?
    .collect::<Result<Vec<Sale>, rusqlite::Error>>()
    .map_err(|error| error.into())
}
