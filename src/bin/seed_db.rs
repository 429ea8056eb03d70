use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;

use sales_dashboard::{
    SeedRecords, fetch_seed_records, initialize_db, parse_seed_records, replace_all_transactions,
};

/// A utility for seeding a sales dashboard database from the JSON product feed.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path of the SQLite database to seed. Created if it does not exist.
    #[arg(long, short)]
    output_path: String,

    /// URL of the JSON feed to download.
    #[arg(
        long,
        env = "DATA_URL",
        default_value = "https://s3.amazonaws.com/roxiler.com/product_transaction.json",
        conflicts_with = "file"
    )]
    url: String,

    /// Read the feed from a local JSON file instead of downloading it.
    #[arg(long, short)]
    file: Option<String>,
}

/// Replace the transactions in a database with the ones from the feed.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'sales.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'sales.db').");
            exit(1);
        }
        _ => {}
    }

    let SeedRecords {
        transactions,
        skipped,
    } = match &args.file {
        Some(file) => {
            println!("Reading seed data from {file}...");
            parse_seed_records(&std::fs::read(file)?)?
        }
        None => {
            println!("Downloading seed data from {}...", args.url);
            fetch_seed_records(&reqwest::Client::new(), &args.url).await?
        }
    };

    println!("Opening database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    let inserted = replace_all_transactions(&transactions, &conn)?;

    println!("Success! Inserted {inserted} transactions, skipped {skipped} malformed records.");

    Ok(())
}
