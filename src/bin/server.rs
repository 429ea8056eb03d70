use std::{fs::OpenOptions, net::SocketAddr, path::PathBuf, process::exit, sync::Arc};

use axum::{
    Router,
    extract::{MatchedPath, Request},
    http::{HeaderValue, Method},
    middleware,
};
use axum_server::{Handle, tls_rustls::RustlsConfig};
use clap::Parser;
use rusqlite::Connection;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use sales_dashboard::{
    AppState, MonthMatch, PaginationConfig, build_router, graceful_shutdown, is_store_empty,
    logging_middleware, seed_from_url,
};

/// The REST API server for the sales dashboard.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long, env = "DB_PATH", default_value = "sales.db")]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    port: u16,

    /// The URL of the JSON feed used to seed the database.
    #[arg(
        long,
        env = "DATA_URL",
        default_value = "https://s3.amazonaws.com/roxiler.com/product_transaction.json"
    )]
    seed_url: String,

    /// Seed the database from the feed before serving if it has no transactions.
    #[arg(long, env = "SEED_ON_STARTUP")]
    seed_on_startup: bool,

    /// Match month filters against this year only instead of every year.
    #[arg(long, env = "REFERENCE_YEAR")]
    reference_year: Option<i32>,

    /// The origin allowed to make cross-origin requests to the API.
    #[arg(long, env = "ALLOWED_ORIGIN", default_value = "http://localhost:3000")]
    allowed_origin: String,

    /// File path to a directory with an SSL certificate `cert.pem` and key
    /// `key.pem`. Serves plain HTTP if not set.
    #[arg(long, env = "CERT_PATH")]
    cert_path: Option<String>,
}

#[tokio::main]
async fn main() {
    setup_logging();

    let args = Args::parse();

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let connection = match Connection::open(&args.db_path) {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("Could not open database file at {}: {error}", args.db_path);
            exit(1);
        }
    };

    let month_match = match args.reference_year {
        Some(year) => MonthMatch::ReferenceYear(year),
        None => MonthMatch::IgnoreYear,
    };

    let state = match AppState::new(
        connection,
        &args.seed_url,
        month_match,
        PaginationConfig::default(),
    ) {
        Ok(state) => state,
        Err(error) => {
            tracing::error!("Could not initialize the database: {error}");
            exit(1);
        }
    };

    if args.seed_on_startup {
        seed_if_empty(&state).await;
    }

    let cors_layer = match build_cors_layer(&args.allowed_origin) {
        Some(layer) => layer,
        None => {
            tracing::error!("Invalid allowed origin {:?}", args.allowed_origin);
            exit(1);
        }
    };

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(
        build_router(state)
            .layer(middleware::from_fn(logging_middleware))
            .layer(cors_layer),
    );

    let result = match args.cert_path {
        Some(cert_path) => {
            let tls_config = match RustlsConfig::from_pem_file(
                PathBuf::from(&cert_path).join("cert.pem"),
                PathBuf::from(&cert_path).join("key.pem"),
            )
            .await
            {
                Ok(tls_config) => tls_config,
                Err(error) => {
                    tracing::error!("Could not open TLS certificates in {cert_path}: {error}");
                    exit(1);
                }
            };

            tracing::info!("HTTPS server listening on {}", addr);
            axum_server::bind_rustls(addr, tls_config)
                .handle(handle)
                .serve(router.into_make_service())
                .await
        }
        None => {
            tracing::info!("HTTP server listening on {}", addr);
            axum_server::bind(addr)
                .handle(handle)
                .serve(router.into_make_service())
                .await
        }
    };

    if let Err(error) = result {
        tracing::error!("Server error: {error}");
        exit(1);
    }
}

/// Seed the database unless it already has transactions.
///
/// Failures are logged and the server starts anyway so that the data can be
/// loaded later through the initialize endpoint.
async fn seed_if_empty(state: &AppState) {
    match is_store_empty(&state.db_connection) {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!("Database already has transactions, skipping seeding");
            return;
        }
        Err(error) => {
            tracing::error!("Could not check whether the database is empty: {error}");
            return;
        }
    }

    match seed_from_url(&state.http_client, &state.seed_url, &state.db_connection).await {
        Ok(report) => tracing::info!(
            "Seeded {} transactions ({} skipped)",
            report.inserted,
            report.skipped
        ),
        Err(error) => tracing::error!("Could not seed the database on startup: {error}"),
    }
}

fn build_cors_layer(allowed_origin: &str) -> Option<CorsLayer> {
    let origin = allowed_origin.parse::<HeaderValue>().ok()?;

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST]),
    )
}

fn setup_logging() {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")));

    let debug_log = match OpenOptions::new()
        .create(true)
        .append(true)
        .open("debug.log")
    {
        Ok(log_file) => Some(
            tracing_subscriber::fmt::layer()
                .pretty()
                .with_writer(Arc::new(log_file))
                .with_filter(filter::LevelFilter::DEBUG),
        ),
        Err(error) => {
            eprintln!("Could not create log file, logging to stdout only: {error}");
            None
        }
    };

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
