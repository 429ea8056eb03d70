//! Translates month and search filters into SQL and runs the filtered queries.

use rusqlite::{Connection, params_from_iter, types::Value};
use serde::Deserialize;
use time::Month;

use crate::{Error, pagination::PageWindow};

use super::core::{TRANSACTION_COLUMNS, Transaction, map_transaction_row};

/// Restricts transactions to a calendar month, or lets every month through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonthFilter {
    /// Do not filter by date.
    #[default]
    All,
    /// Only transactions sold in this month.
    Month(Month),
}

impl MonthFilter {
    /// Parse a month number where 0 means all months and 1-12 are January to December.
    ///
    /// Anything else, including non-numeric text, falls back to [MonthFilter::All].
    pub fn parse_lenient(value: Option<&str>) -> Self {
        value
            .and_then(|value| value.trim().parse::<u8>().ok())
            .and_then(|number| Month::try_from(number).ok())
            .map(MonthFilter::Month)
            .unwrap_or_default()
    }

    /// The month as a number, 0 for [MonthFilter::All].
    pub fn as_number(&self) -> u8 {
        match self {
            MonthFilter::All => 0,
            MonthFilter::Month(month) => *month as u8,
        }
    }
}

/// How a [MonthFilter] is compared against the date of sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MonthMatch {
    /// Match the month component of the (UTC) date of sale, whatever the year.
    #[default]
    IgnoreYear,
    /// Match dates from the first to the last second of the month in a fixed year.
    ///
    /// Records sold in any other year are excluded, so prefer
    /// [MonthMatch::IgnoreYear] unless the data set is known to span a single year.
    ReferenceYear(i32),
}

/// The month and text criteria that define the filtered set of transactions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionFilter {
    /// The month to restrict to.
    pub month: MonthFilter,
    /// Case-insensitive text to look for in the title, description or price.
    pub search: String,
}

/// The raw month and search query parameters shared by the listing and summary endpoints.
///
/// Values are kept as strings so that malformed input falls back to defaults
/// instead of being rejected by the extractor.
#[derive(Debug, Default, Deserialize)]
pub struct FilterParams {
    /// Month number, 0-12.
    pub month: Option<String>,
    /// Text to search for.
    pub search: Option<String>,
}

impl FilterParams {
    /// Convert the raw parameters into a [TransactionFilter].
    pub fn to_filter(&self) -> TransactionFilter {
        TransactionFilter {
            month: MonthFilter::parse_lenient(self.month.as_deref()),
            search: self.search.as_deref().unwrap_or_default().trim().to_owned(),
        }
    }
}

/// A SQL `WHERE` clause (possibly empty) and its positional parameters.
pub(crate) struct WhereClause {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Build the `WHERE` clause that selects the filtered set for `filter`.
///
/// The search text is matched with SQLite `LIKE`, which only folds ASCII
/// letters: "bag" matches "BAG", but "é" does not match "É".
pub(crate) fn build_where_clause(filter: &TransactionFilter, month_match: MonthMatch) -> WhereClause {
    let mut conditions = Vec::new();
    let mut params = Vec::new();

    if let MonthFilter::Month(month) = filter.month {
        match month_match {
            MonthMatch::IgnoreYear => {
                params.push(Value::Integer(month as i64));
                conditions.push(format!(
                    "CAST(strftime('%m', date_of_sale) AS INTEGER) = ?{}",
                    params.len()
                ));
            }
            MonthMatch::ReferenceYear(year) => {
                let (start, end) = month_range_in_year(year, month);
                params.push(Value::Text(start));
                params.push(Value::Text(end));
                conditions.push(format!(
                    "datetime(date_of_sale) BETWEEN ?{} AND ?{}",
                    params.len() - 1,
                    params.len()
                ));
            }
        }
    }

    if !filter.search.is_empty() {
        params.push(Value::Text(format!("%{}%", escape_like(&filter.search))));
        let n = params.len();
        conditions.push(format!(
            "(title LIKE ?{n} ESCAPE '\\' \
            OR description LIKE ?{n} ESCAPE '\\' \
            OR CAST(price AS TEXT) LIKE ?{n} ESCAPE '\\')"
        ));
    }

    let sql = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    WhereClause { sql, params }
}

/// The first and last second of `month` in `year`, formatted the way SQLite's
/// `datetime()` renders UTC timestamps.
fn month_range_in_year(year: i32, month: Month) -> (String, String) {
    let month_number = month as u8;
    let last_day = time::util::days_in_month(month, year);

    (
        format!("{year:04}-{month_number:02}-01 00:00:00"),
        format!("{year:04}-{month_number:02}-{last_day:02} 23:59:59"),
    )
}

/// Escape the `LIKE` wildcards so that the search text is matched literally.
fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

/// Get one page of the transactions matching `filter`, in ascending ID order.
///
/// # Errors
/// Returns [Error::SqlError] if:
/// - SQL query preparation or execution fails
/// - Transaction row mapping fails
pub fn query_transactions(
    filter: &TransactionFilter,
    month_match: MonthMatch,
    window: PageWindow,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let WhereClause { sql, mut params } = build_where_clause(filter, month_match);

    params.push(Value::Integer(clamp_to_i64(window.limit)));
    params.push(Value::Integer(clamp_to_i64(window.offset())));
    let query = format!(
        "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" {sql} ORDER BY id ASC LIMIT ?{} OFFSET ?{}",
        params.len() - 1,
        params.len()
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(params), map_transaction_row)?
        .map(|transaction_result| transaction_result.map_err(Error::SqlError))
        .collect()
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

/// Count the transactions matching `filter`, ignoring pagination.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_matching_transactions(
    filter: &TransactionFilter,
    month_match: MonthMatch,
    connection: &Connection,
) -> Result<u64, Error> {
    let where_clause = build_where_clause(filter, month_match);
    let query = format!("SELECT COUNT(id) FROM \"transaction\" {}", where_clause.sql);

    connection
        .query_row(&query, params_from_iter(where_clause.params), |row| {
            row.get::<_, i64>(0)
        })
        .map(|count| count as u64)
        .map_err(|error| error.into())
}
