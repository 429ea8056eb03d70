//! Defines the core data model and database queries for sale transactions.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::Error;

// ============================================================================
// MODELS
// ============================================================================

/// Alias for the externally assigned transaction ID.
pub type TransactionId = i64;

/// A product listing and whether (and when) it was sold.
///
/// To create a new `Transaction`, use [Transaction::build].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// The ID assigned by the seed feed.
    pub id: TransactionId,
    /// The product name.
    pub title: String,
    /// A longer text description of the product.
    pub description: String,
    /// The sale price, never negative.
    pub price: f64,
    /// A short label such as "electronics" or "jewelery".
    pub category: String,
    /// A URL to a picture of the product, may be empty.
    pub image: String,
    /// Whether the product has been sold.
    pub sold: bool,
    /// When the product was sold (or listed, for unsold products), in UTC.
    #[serde(with = "time::serde::rfc3339")]
    pub date_of_sale: OffsetDateTime,
}

impl Transaction {
    /// Create a new transaction.
    ///
    /// Shortcut for [TransactionBuilder] for discoverability.
    pub fn build(id: TransactionId, price: f64, date_of_sale: OffsetDateTime) -> TransactionBuilder {
        TransactionBuilder {
            id,
            title: String::new(),
            description: String::new(),
            price,
            category: String::new(),
            image: String::new(),
            sold: false,
            date_of_sale,
        }
    }
}

/// A builder for creating [Transaction] instances.
///
/// The ID, price and date of sale are required, everything else defaults to
/// an empty string or `false`. Call [TransactionBuilder::finalize] to get the
/// [Transaction].
///
/// # Examples
///
/// ```ignore
/// use time::macros::datetime;
///
/// let transaction = Transaction::build(1, 329.85, datetime!(2021-11-27 14:59:54 UTC))
///     .title("Fjallraven Backpack")
///     .category("men's clothing")
///     .sold(true)
///     .finalize();
/// ```
#[derive(Debug, PartialEq, Clone)]
pub struct TransactionBuilder {
    id: TransactionId,
    title: String,
    description: String,
    price: f64,
    category: String,
    image: String,
    sold: bool,
    date_of_sale: OffsetDateTime,
}

impl TransactionBuilder {
    /// Set the product name.
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_owned();
        self
    }

    /// Set the product description.
    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_owned();
        self
    }

    /// Set the product category.
    pub fn category(mut self, category: &str) -> Self {
        self.category = category.to_owned();
        self
    }

    /// Set the product image URL.
    pub fn image(mut self, image: &str) -> Self {
        self.image = image.to_owned();
        self
    }

    /// Set whether the product was sold.
    pub fn sold(mut self, sold: bool) -> Self {
        self.sold = sold;
        self
    }

    /// Create the [Transaction], normalising the date of sale to UTC.
    pub fn finalize(self) -> Transaction {
        Transaction {
            id: self.id,
            title: self.title,
            description: self.description,
            price: self.price,
            category: self.category,
            image: self.image,
            sold: self.sold,
            date_of_sale: self.date_of_sale.to_offset(time::UtcOffset::UTC),
        }
    }
}

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// The columns of the transaction table in the order [map_transaction_row] expects.
pub(crate) const TRANSACTION_COLUMNS: &str =
    "id, title, description, price, category, image, sold, date_of_sale";

/// Insert many transactions, reusing a single prepared statement.
///
/// Callers that need all-or-nothing semantics should pass a connection that is
/// inside an SQL transaction.
///
/// # Errors
/// This function will return a:
/// - [Error::DuplicateTransactionId] if a transaction with the same ID already exists,
/// - or [Error::SqlError] if there is some other SQL error.
pub fn insert_transactions(
    transactions: &[Transaction],
    connection: &Connection,
) -> Result<usize, Error> {
    let mut stmt = connection.prepare(
        "INSERT INTO \"transaction\" (id, title, description, price, category, image, sold, date_of_sale)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    )?;

    for transaction in transactions {
        stmt.execute((
            transaction.id,
            &transaction.title,
            &transaction.description,
            transaction.price,
            &transaction.category,
            &transaction.image,
            transaction.sold,
            transaction.date_of_sale,
        ))
        .map_err(|error| match error {
            rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error {
                    code: _,
                    extended_code:
                        rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE,
                },
                _,
            ) => Error::DuplicateTransactionId(transaction.id),
            error => error.into(),
        })?;
    }

    Ok(transactions.len())
}

/// Delete every transaction in the database, returning how many were removed.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn delete_all_transactions(connection: &Connection) -> Result<usize, Error> {
    connection
        .execute("DELETE FROM \"transaction\"", ())
        .map_err(|error| error.into())
}

/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u64, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get::<_, i64>(0)
        })
        .map(|count| count as u64)
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY,
                title TEXT NOT NULL,
                description TEXT NOT NULL,
                price REAL NOT NULL CHECK (price >= 0),
                category TEXT NOT NULL,
                image TEXT NOT NULL DEFAULT '',
                sold INTEGER NOT NULL,
                date_of_sale TEXT NOT NULL
                )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_date_of_sale ON \"transaction\"(date_of_sale);",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        price: row.get(3)?,
        category: row.get(4)?,
        image: row.get(5)?,
        sold: row.get(6)?,
        date_of_sale: row.get(7)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod database_tests {
    use rusqlite::Connection;
    use time::macros::datetime;

    use crate::{
        Error,
        db::initialize,
        transaction::{
            Transaction, count_transactions, delete_all_transactions, insert_transactions,
        },
    };

    use super::{TRANSACTION_COLUMNS, map_transaction_row};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn insert_and_read_back() {
        let conn = get_test_connection();
        let want = Transaction::build(7, 329.85, datetime!(2021-11-27 20:29:54 +05:30))
            .title("Fjallraven Backpack")
            .description("Your perfect pack for everyday use")
            .category("men's clothing")
            .image("https://example.com/backpack.jpg")
            .sold(true)
            .finalize();

        insert_transactions(std::slice::from_ref(&want), &conn).unwrap();

        let got = conn
            .query_row(
                &format!("SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = 7"),
                [],
                map_transaction_row,
            )
            .unwrap();
        assert_eq!(want, got);
        assert_eq!(got.date_of_sale, datetime!(2021-11-27 14:59:54 UTC));
    }

    #[test]
    fn insert_fails_on_duplicate_id() {
        let conn = get_test_connection();
        let date = datetime!(2021-03-01 10:00 UTC);
        let transactions = [
            Transaction::build(1, 10.0, date).finalize(),
            Transaction::build(1, 20.0, date).finalize(),
        ];

        let result = insert_transactions(&transactions, &conn);

        assert_eq!(result, Err(Error::DuplicateTransactionId(1)));
    }

    #[test]
    fn negative_price_is_rejected_by_the_table() {
        let conn = get_test_connection();
        let transaction = Transaction::build(1, -1.0, datetime!(2021-03-01 10:00 UTC)).finalize();

        let result = insert_transactions(&[transaction], &conn);

        assert!(
            matches!(result, Err(Error::SqlError(_))),
            "want SQL error, got {result:?}"
        );
    }

    #[test]
    fn delete_all_then_count() {
        let conn = get_test_connection();
        let date = datetime!(2021-03-01 10:00 UTC);
        let transactions: Vec<_> = (1..=5)
            .map(|id| Transaction::build(id, id as f64, date).finalize())
            .collect();
        insert_transactions(&transactions, &conn).unwrap();
        assert_eq!(count_transactions(&conn), Ok(5));

        let deleted = delete_all_transactions(&conn).unwrap();

        assert_eq!(deleted, 5);
        assert_eq!(count_transactions(&conn), Ok(0));
    }
}
