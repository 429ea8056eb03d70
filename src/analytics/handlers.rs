//! Route handlers for the statistics, chart and combined-data endpoints.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Query, State},
};
use rusqlite::Connection;
use serde::Serialize;

use crate::{
    AppState, Error,
    analytics::{
        aggregation::{
            CategoryBreakdown, PriceHistogram, SalesSummary, category_breakdown, price_histogram,
            summarize_sales,
        },
        sale::{Sale, get_sales},
    },
    transaction::{FilterParams, MonthMatch, TransactionFilter},
};

/// The state needed to compute the sales summaries.
#[derive(Debug, Clone)]
pub struct AnalyticsState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// How the month filter is matched against the date of sale.
    pub month_match: MonthMatch,
}

impl FromRef<AppState> for AnalyticsState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            month_match: state.month_match,
        }
    }
}

/// The three summaries for one filter, as returned by [get_combined_data].
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedData {
    /// Same as the body of [get_statistics].
    pub statistics: SalesSummary,
    /// Same as the body of [get_bar_chart].
    pub bar_chart: PriceHistogram,
    /// Same as the body of [get_pie_chart].
    pub pie_chart: CategoryBreakdown,
}

/// Lock the database and load the sales matching `filter`.
///
/// The lock is released before returning.
fn load_sales(
    db_connection: &Mutex<Connection>,
    filter: &TransactionFilter,
    month_match: MonthMatch,
) -> Result<Vec<Sale>, Error> {
    let connection = db_connection
        .lock()
        .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
        .map_err(|_| Error::DatabaseLockError)?;

    get_sales(filter, month_match, &connection)
        .inspect_err(|error| tracing::error!("could not get sales: {error}"))
}

/// Handler for `GET /api/statistics`.
pub async fn get_statistics(
    State(state): State<AnalyticsState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<SalesSummary>, Error> {
    let sales = load_sales(&state.db_connection, &params.to_filter(), state.month_match)?;

    summarize_sales(&sales).map(Json)
}

/// Handler for `GET /api/bar-chart`.
pub async fn get_bar_chart(
    State(state): State<AnalyticsState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<PriceHistogram>, Error> {
    let sales = load_sales(&state.db_connection, &params.to_filter(), state.month_match)?;

    Ok(Json(price_histogram(&sales)))
}

/// Handler for `GET /api/pie-chart`.
pub async fn get_pie_chart(
    State(state): State<AnalyticsState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<CategoryBreakdown>, Error> {
    let sales = load_sales(&state.db_connection, &params.to_filter(), state.month_match)?;

    Ok(Json(category_breakdown(&sales)))
}

/// Handler for `GET /api/combined-data`.
///
/// Loads the filtered sales once, so all three summaries describe the same
/// records, then computes the summaries on the blocking thread pool
/// concurrently. If any of them fails the whole request fails.
pub async fn get_combined_data(
    State(state): State<AnalyticsState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<CombinedData>, Error> {
    let sales: Arc<[Sale]> =
        load_sales(&state.db_connection, &params.to_filter(), state.month_match)?.into();

    let statistics = spawn_summary(&sales, |sales| summarize_sales(sales));
    let bar_chart = spawn_summary(&sales, |sales| Ok(price_histogram(sales)));
    let pie_chart = spawn_summary(&sales, |sales| Ok(category_breakdown(sales)));

    let (statistics, bar_chart, pie_chart) = tokio::try_join!(statistics, bar_chart, pie_chart)
        .inspect_err(|error| tracing::error!("combined data task failed: {error}"))?;

    Ok(Json(CombinedData {
        statistics: statistics?,
        bar_chart: bar_chart?,
        pie_chart: pie_chart?,
    }))
}

fn spawn_summary<T, F>(sales: &Arc<[Sale]>, summarize: F) -> tokio::task::JoinHandle<Result<T, Error>>
where
    T: Send + 'static,
    F: FnOnce(&[Sale]) -> Result<T, Error> + Send + 'static,
{
    let sales = Arc::clone(sales);

    tokio::task::spawn_blocking(move || summarize(&sales))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Router, http::StatusCode, routing::get};
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::{Value, json};
    use time::macros::datetime;

    use crate::{
        db::initialize,
        endpoints,
        transaction::{MonthMatch, Transaction, insert_transactions},
    };

    use super::{AnalyticsState, get_bar_chart, get_combined_data, get_pie_chart, get_statistics};

    fn test_transactions() -> Vec<Transaction> {
        vec![
            Transaction::build(1, 329.85, datetime!(2021-03-27 14:59:54 UTC))
                .title("Backpack")
                .category("men's clothing")
                .sold(true)
                .finalize(),
            Transaction::build(2, 22.3, datetime!(2021-03-10 09:00 UTC))
                .title("Slim Fit T-Shirt")
                .category("men's clothing")
                .finalize(),
            Transaction::build(3, 695.0, datetime!(2022-03-01 12:00 UTC))
                .title("Gold Bracelet")
                .category("jewelery")
                .sold(true)
                .finalize(),
            Transaction::build(4, 999.99, datetime!(2021-11-20 12:00 UTC))
                .title("Monitor")
                .category("electronics")
                .sold(true)
                .finalize(),
        ]
    }

    fn get_test_server() -> TestServer {
        get_test_server_with(&test_transactions())
    }

    fn get_test_server_with(transactions: &[Transaction]) -> TestServer {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        initialize(&connection).expect("Could not initialize database");
        insert_transactions(transactions, &connection).expect("Could not insert transactions");

        let state = AnalyticsState {
            db_connection: Arc::new(Mutex::new(connection)),
            month_match: MonthMatch::IgnoreYear,
        };
        let app = Router::new()
            .route(endpoints::STATISTICS, get(get_statistics))
            .route(endpoints::BAR_CHART, get(get_bar_chart))
            .route(endpoints::PIE_CHART, get(get_pie_chart))
            .route(endpoints::COMBINED_DATA, get(get_combined_data))
            .with_state(state);

        TestServer::try_new(app).expect("Could not create test server.")
    }

    async fn get_json(server: &TestServer, path: &str, month: &str) -> Value {
        let response = server.get(path).add_query_param("month", month).await;
        response.assert_status_ok();
        response.json()
    }

    #[tokio::test]
    async fn statistics_for_march() {
        let server = get_test_server();

        let got = get_json(&server, endpoints::STATISTICS, "3").await;

        assert_eq!(
            got,
            json!({
                "totalSaleAmount": "1024.85",
                "totalSoldItems": 2,
                "totalUnsoldItems": 1,
                "totalCount": 3,
            })
        );
    }

    #[tokio::test]
    async fn bar_chart_for_march() {
        let server = get_test_server();

        let got = get_json(&server, endpoints::BAR_CHART, "3").await;

        assert_eq!(
            got,
            json!({
                "0-100": 1,
                "101-200": 0,
                "201-300": 0,
                "301-400": 1,
                "401-500": 0,
                "501-600": 0,
                "601-700": 1,
                "701-800": 0,
                "801-900": 0,
                "901-above": 0,
            })
        );
    }

    #[tokio::test]
    async fn pie_chart_for_all_months() {
        let server = get_test_server();

        let got = get_json(&server, endpoints::PIE_CHART, "0").await;

        assert_eq!(
            got,
            json!({"electronics": 1, "jewelery": 1, "men's clothing": 2})
        );
    }

    #[tokio::test]
    async fn empty_month_has_zero_statistics() {
        let server = get_test_server();

        let got = get_json(&server, endpoints::STATISTICS, "6").await;

        assert_eq!(
            got,
            json!({
                "totalSaleAmount": "0.00",
                "totalSoldItems": 0,
                "totalUnsoldItems": 0,
                "totalCount": 0,
            })
        );
    }

    #[tokio::test]
    async fn search_narrows_summaries() {
        let server = get_test_server();

        let got: Value = server
            .get(endpoints::PIE_CHART)
            .add_query_param("search", "BRACELET")
            .await
            .json();

        assert_eq!(got, json!({"jewelery": 1}));
    }

    #[tokio::test]
    async fn combined_data_matches_standalone_endpoints() {
        let server = get_test_server();

        let combined = get_json(&server, endpoints::COMBINED_DATA, "3").await;
        let statistics = get_json(&server, endpoints::STATISTICS, "3").await;
        let bar_chart = get_json(&server, endpoints::BAR_CHART, "3").await;
        let pie_chart = get_json(&server, endpoints::PIE_CHART, "3").await;

        assert_eq!(
            combined,
            json!({
                "statistics": statistics,
                "barChart": bar_chart,
                "pieChart": pie_chart,
            })
        );
    }

    #[tokio::test]
    async fn totals_agree_for_every_month() {
        let server = get_test_server();

        for month in 1..=12 {
            let combined = get_json(&server, endpoints::COMBINED_DATA, &month.to_string()).await;

            let total = combined["statistics"]["totalCount"].as_u64().unwrap();
            let sold = combined["statistics"]["totalSoldItems"].as_u64().unwrap();
            let unsold = combined["statistics"]["totalUnsoldItems"].as_u64().unwrap();
            let sum_values = |value: &Value| -> u64 {
                value
                    .as_object()
                    .unwrap()
                    .values()
                    .map(|count| count.as_u64().unwrap())
                    .sum()
            };

            assert_eq!(sold + unsold, total, "month {month}");
            assert_eq!(sum_values(&combined["barChart"]), total, "month {month}");
            assert_eq!(sum_values(&combined["pieChart"]), total, "month {month}");
        }
    }

    #[tokio::test]
    async fn combined_data_fails_whole_when_statistics_fail() {
        let server = get_test_server_with(&[
            Transaction::build(1, 5e28, datetime!(2021-03-01 12:00 UTC))
                .category("electronics")
                .sold(true)
                .finalize(),
            Transaction::build(2, 5e28, datetime!(2021-03-02 12:00 UTC))
                .category("electronics")
                .sold(true)
                .finalize(),
        ]);

        let response = server
            .get(endpoints::COMBINED_DATA)
            .add_query_param("month", "3")
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert_eq!(
            body,
            json!({"error": "the total sale amount is too large to represent"})
        );
        assert!(body.get("barChart").is_none());
        assert!(body.get("pieChart").is_none());
    }
}
