//! Application router configuration.

use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};

use crate::{
    AppState, Error,
    analytics::{get_bar_chart, get_combined_data, get_pie_chart, get_statistics},
    dashboard::get_dashboard_page,
    endpoints,
    seed::initialize_endpoint,
    transaction::list_transactions_endpoint,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(endpoints::COFFEE, get(get_coffee))
        .route(endpoints::TRANSACTIONS, get(list_transactions_endpoint))
        .route(endpoints::STATISTICS, get(get_statistics))
        .route(endpoints::BAR_CHART, get(get_bar_chart))
        .route(endpoints::PIE_CHART, get(get_pie_chart))
        .route(endpoints::COMBINED_DATA, get(get_combined_data))
        .route(endpoints::INITIALIZE, post(initialize_endpoint));

    Router::new()
        .route(endpoints::ROOT, get(get_dashboard_page))
        .merge(api_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

/// Attempt to get a cup of coffee from the server.
async fn get_coffee() -> Response {
    (StatusCode::IM_A_TEAPOT, Html("I'm a teapot")).into_response()
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::Value;
    use time::macros::datetime;

    use crate::{
        AppState, MonthMatch, PaginationConfig, endpoints,
        routing::build_router,
        transaction::{Transaction, insert_transactions},
    };

    fn get_test_server() -> TestServer {
        let connection =
            Connection::open_in_memory().expect("Could not open in-memory SQLite database");
        let state = AppState::new(
            connection,
            "http://localhost:9/unused.json",
            MonthMatch::IgnoreYear,
            PaginationConfig::default(),
        )
        .expect("Could not create app state");
        insert_transactions(
            &[
                Transaction::build(1, 109.95, datetime!(2021-03-27 14:59:54 UTC))
                    .title("Fjallraven Backpack")
                    .category("men's clothing")
                    .sold(true)
                    .finalize(),
                Transaction::build(2, 55.99, datetime!(2021-04-27 14:59:54 UTC))
                    .title("Mens Cotton Jacket")
                    .category("men's clothing")
                    .finalize(),
            ],
            &state.db_connection.lock().unwrap(),
        )
        .expect("Could not insert transactions");

        TestServer::try_new(build_router(state)).expect("Could not create test server.")
    }

    #[tokio::test]
    async fn coffee_is_a_teapot() {
        let server = get_test_server();

        server
            .get(endpoints::COFFEE)
            .await
            .assert_status(StatusCode::IM_A_TEAPOT);
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let server = get_test_server();

        let response = server.get("/api/does-not-exist").await;

        response.assert_status_not_found();
        let body: Value = response.json();
        assert!(body["error"].is_string(), "{body}");
    }

    #[tokio::test]
    async fn api_routes_are_wired_up() {
        let server = get_test_server();

        for path in [
            endpoints::TRANSACTIONS,
            endpoints::STATISTICS,
            endpoints::BAR_CHART,
            endpoints::PIE_CHART,
            endpoints::COMBINED_DATA,
        ] {
            let response = server.get(path).add_query_param("month", "3").await;

            response.assert_status_ok();
        }
    }

    #[tokio::test]
    async fn listing_through_router_uses_app_state() {
        let server = get_test_server();

        let body: Value = server
            .get(endpoints::TRANSACTIONS)
            .add_query_param("search", "jacket")
            .await
            .json();

        assert_eq!(body["totalCount"], 1);
        assert_eq!(body["transactions"][0]["id"], 2);
        assert_eq!(body["transactions"][0]["dateOfSale"], "2021-04-27T14:59:54Z");
    }

    #[tokio::test]
    async fn root_serves_dashboard_html() {
        let server = get_test_server();

        let response = server.get(endpoints::ROOT).await;

        response.assert_status_ok();
        assert!(response.text().contains("<html"));
    }
}
