//! Sets up the application's SQLite database.

use rusqlite::Connection;

use crate::{Error, transaction::create_transaction_table};

/// Create the tables for the domain models if they do not exist yet.
///
/// Safe to call on a database that has already been initialized.
///
/// # Errors
/// Returns an [Error::SqlError] if a table could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    let transaction = connection.unchecked_transaction()?;

    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;

    use super::initialize;
    use crate::transaction::count_transactions;

    #[test]
    fn initialize_creates_empty_transaction_table() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();

        assert_eq!(count_transactions(&conn), Ok(0));
    }

    #[test]
    fn initialize_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        initialize(&conn).unwrap();
        let result = initialize(&conn);

        assert!(result.is_ok(), "second initialize failed: {result:?}");
    }
}
