//! Dashboard HTTP handler and view rendering.
//!
//! This module contains:
//! - The route handler for displaying the dashboard
//! - HTML view functions for the filter form, pagination and page layout
//! - The state and query types used by the handler

use std::sync::{Arc, Mutex};

use axum::{
    extract::{FromRef, Query, State},
    response::{IntoResponse, Response},
};
use maud::{Markup, html};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use time::Month;

use crate::{
    AppState, Error,
    analytics::{
        CategoryBreakdown, PriceHistogram, SalesSummary, category_breakdown, get_sales,
        price_histogram, summarize_sales,
    },
    dashboard::{
        charts::{DashboardChart, category_chart, charts_script, charts_view, price_range_chart},
        tables::{statistics_cards, transactions_table},
    },
    endpoints,
    html::{
        BUTTON_PRIMARY_STYLE, FORM_LABEL_STYLE, FORM_TEXT_INPUT_STYLE, HeadElement,
        PAGE_CONTAINER_STYLE, base,
    },
    pagination::{PageWindow, PaginationConfig, PaginationIndicator, create_pagination_indicators},
    transaction::{
        FilterParams, MonthFilter, MonthMatch, Transaction, TransactionFilter,
        count_matching_transactions, query_transactions,
    },
};

const ECHARTS_SCRIPT: &str = "https://cdn.jsdelivr.net/npm/echarts@5.6.0/dist/echarts.min.js";

/// The state needed for displaying the dashboard page.
#[derive(Debug, Clone)]
pub struct DashboardState {
    /// The database connection for reading transactions.
    pub db_connection: Arc<Mutex<Connection>>,
    /// The config that controls how to page through transactions.
    pub pagination_config: PaginationConfig,
    /// How the month filter is matched against the date of sale.
    pub month_match: MonthMatch,
}

impl FromRef<AppState> for DashboardState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
            month_match: state.month_match,
        }
    }
}

/// The month shown when the dashboard is opened without a `month` parameter.
///
/// Pass `month=0` to see every month.
const DEFAULT_MONTH: u8 = 3;

/// The query parameters accepted by [get_dashboard_page].
#[derive(Debug, Default, Deserialize)]
pub struct DashboardParams {
    /// Month number, 0 for all months. Defaults to March when missing.
    pub month: Option<String>,
    /// Text to search for.
    pub search: Option<String>,
    /// The page of the transactions table, starting from 1.
    pub page: Option<String>,
}

/// The query string for a link to another page of the dashboard.
#[derive(Serialize)]
struct PageQuery<'a> {
    month: u8,
    search: &'a str,
    page: u64,
}

/// Holds all the data needed to render the dashboard.
struct DashboardData {
    transactions: Vec<Transaction>,
    total_count: u64,
    summary: SalesSummary,
    histogram: PriceHistogram,
    categories: CategoryBreakdown,
}

/// Display a page with the filtered transactions, their statistics and charts.
pub async fn get_dashboard_page(
    State(state): State<DashboardState>,
    Query(params): Query<DashboardParams>,
) -> Result<Response, Error> {
    let filter = FilterParams {
        month: params
            .month
            .or_else(|| Some(DEFAULT_MONTH.to_string())),
        search: params.search,
    }
    .to_filter();
    let window = state
        .pagination_config
        .window(params.page.as_deref(), None);

    let data = {
        let connection = state
            .db_connection
            .lock()
            .inspect_err(|error| tracing::error!("could not acquire database lock: {error}"))
            .map_err(|_| Error::DatabaseLockError)?;

        build_dashboard_data(&filter, state.month_match, window, &connection)?
    };

    Ok(dashboard_view(&filter, window, &data, state.pagination_config.max_pages).into_response())
}

/// Fetches and builds all data needed for the dashboard display.
///
/// # Errors
/// Returns error if database queries fail or a price cannot be summed.
fn build_dashboard_data(
    filter: &TransactionFilter,
    month_match: MonthMatch,
    window: PageWindow,
    connection: &Connection,
) -> Result<DashboardData, Error> {
    let transactions = query_transactions(filter, month_match, window, connection)
        .inspect_err(|error| tracing::error!("could not query transactions: {error}"))?;
    let total_count = count_matching_transactions(filter, month_match, connection)
        .inspect_err(|error| tracing::error!("could not count transactions: {error}"))?;
    let sales = get_sales(filter, month_match, connection)
        .inspect_err(|error| tracing::error!("could not get sales: {error}"))?;

    Ok(DashboardData {
        transactions,
        total_count,
        summary: summarize_sales(&sales)?,
        histogram: price_histogram(&sales),
        categories: category_breakdown(&sales),
    })
}

fn period_label(month: MonthFilter) -> String {
    match month {
        MonthFilter::All => "All months".to_owned(),
        MonthFilter::Month(month) => month.to_string(),
    }
}

fn page_url(filter: &TransactionFilter, page: u64) -> String {
    let query = serde_urlencoded::to_string(PageQuery {
        month: filter.month.as_number(),
        search: &filter.search,
        page,
    })
    .unwrap_or_else(|_| format!("page={page}"));

    format!("{}?{query}", endpoints::ROOT)
}

fn dashboard_view(
    filter: &TransactionFilter,
    window: PageWindow,
    data: &DashboardData,
    max_pages: u64,
) -> Markup {
    let period = period_label(filter.month);
    let charts = [
        DashboardChart {
            id: "price-range-chart",
            options: price_range_chart(&data.histogram, &period).to_string(),
        },
        DashboardChart {
            id: "category-chart",
            options: category_chart(&data.categories, &period).to_string(),
        },
    ];
    let indicators =
        create_pagination_indicators(window.page, window.page_count(data.total_count), max_pages);

    let content = html!(
        div class=(PAGE_CONTAINER_STYLE)
        {
            div class="w-full max-w-screen-xl"
            {
                h1 class="text-3xl font-bold mb-6" { "Transaction Dashboard" }

                (filter_form(filter))
                (statistics_cards(&data.summary, &period))

                section id="transactions" class="w-full mb-4"
                {
                    h3 class="text-xl font-semibold mb-4"
                    {
                        "Transactions (" (data.total_count) ")"
                    }

                    (transactions_table(&data.transactions))
                    (pagination_view(filter, &indicators))
                }

                (charts_view(&charts))
            }
        }
    );

    let scripts = [
        HeadElement::ScriptLink(ECHARTS_SCRIPT.to_owned()),
        charts_script(&charts),
    ];

    base("Dashboard", &scripts, &content)
}

fn filter_form(filter: &TransactionFilter) -> Markup {
    let selected_month = filter.month.as_number();
    let months = (1..=12u8).filter_map(|number| Month::try_from(number).ok());

    html!(
        form
            method="get"
            action=(endpoints::ROOT)
            class="flex flex-col sm:flex-row sm:items-end gap-4 mb-6"
        {
            div
            {
                label for="month" class=(FORM_LABEL_STYLE) { "Month" }

                select id="month" name="month" class=(FORM_TEXT_INPUT_STYLE)
                {
                    option value="0" selected[selected_month == 0] { "All months" }

                    @for month in months {
                        option
                            value=(month as u8)
                            selected[selected_month == month as u8]
                        {
                            (month.to_string())
                        }
                    }
                }
            }

            div class="grow"
            {
                label for="search" class=(FORM_LABEL_STYLE) { "Search" }

                input
                    type="search"
                    id="search"
                    name="search"
                    placeholder="Title, description or price"
                    value=(filter.search)
                    class=(FORM_TEXT_INPUT_STYLE);
            }

            button type="submit" class=(BUTTON_PRIMARY_STYLE) { "Apply" }
        }
    )
}

fn pagination_view(filter: &TransactionFilter, indicators: &[PaginationIndicator]) -> Markup {
    const ITEM_STYLE: &str = "block px-3 py-2 rounded hover:bg-gray-200 dark:hover:bg-gray-700";
    const CURRENT_ITEM_STYLE: &str = "block px-3 py-2 rounded bg-blue-500 text-white";

    html!(
        nav aria-label="Transaction pages" class="pagination-indicator flex justify-center my-4"
        {
            ul class="flex items-center gap-1"
            {
                @for indicator in indicators {
                    li
                    {
                        @match indicator {
                            PaginationIndicator::Page(page) => {
                                a href=(page_url(filter, *page)) class=(ITEM_STYLE) { (page) }
                            }
                            PaginationIndicator::CurrPage(page) => {
                                span aria-current="page" class=(CURRENT_ITEM_STYLE) { (page) }
                            }
                            PaginationIndicator::Ellipsis => {
                                span class="px-3 py-2" { "..." }
                            }
                            PaginationIndicator::BackButton(page) => {
                                a href=(page_url(filter, *page)) role="button" class=(ITEM_STYLE) { "Back" }
                            }
                            PaginationIndicator::NextButton(page) => {
                                a href=(page_url(filter, *page)) role="button" class=(ITEM_STYLE) { "Next" }
                            }
                        }
                    }
                }
            }
        }
    )
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        extract::{Query, State},
        http::{Response, StatusCode},
    };
    use scraper::{Html, Selector};
    use time::{Month, macros::datetime};

    use crate::{
        db::initialize,
        pagination::PaginationConfig,
        transaction::{MonthFilter, MonthMatch, Transaction, TransactionFilter, insert_transactions},
    };

    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    use super::{DashboardParams, DashboardState, get_dashboard_page, page_url};

    fn get_test_state(transactions: &[Transaction]) -> DashboardState {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        insert_transactions(transactions, &conn).unwrap();

        DashboardState {
            db_connection: Arc::new(Mutex::new(conn)),
            pagination_config: PaginationConfig::default(),
            month_match: MonthMatch::IgnoreYear,
        }
    }

    fn march_transactions(count: i64) -> Vec<Transaction> {
        (1..=count)
            .map(|id| {
                Transaction::build(id, 50.0, datetime!(2021-03-15 12:00 UTC))
                    .title(&format!("Item {id}"))
                    .category("electronics")
                    .sold(id % 2 == 0)
                    .finalize()
            })
            .collect()
    }

    fn params(month: &str, page: &str) -> DashboardParams {
        DashboardParams {
            month: Some(month.to_owned()),
            search: None,
            page: Some(page.to_owned()),
        }
    }

    #[tokio::test]
    async fn dashboard_page_loads_successfully() {
        let state = get_test_state(&march_transactions(3));

        let response = get_dashboard_page(State(state), Query(params("3", "1")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        let html = parse_html(response).await;
        assert_valid_html(&html);
        assert_chart_exists(&html, "price-range-chart");
        assert_chart_exists(&html, "category-chart");
        assert_eq!(count_table_rows(&html), 3);
        assert_eq!(select_text(&html, "[data-testid='total-sale-amount']"), "$50.00");
        assert_eq!(select_text(&html, "[data-testid='total-sold-items']"), "1");
        assert_eq!(select_text(&html, "[data-testid='total-unsold-items']"), "2");
    }

    #[tokio::test]
    async fn selected_month_is_preselected() {
        let state = get_test_state(&march_transactions(1));

        let response = get_dashboard_page(State(state), Query(params("3", "1")))
            .await
            .unwrap();

        let html = parse_html(response).await;
        let selector = Selector::parse("select[name='month'] option[selected]").unwrap();
        let selected: Vec<_> = html
            .select(&selector)
            .map(|option| option.value().attr("value").unwrap_or_default().to_owned())
            .collect();
        assert_eq!(selected, ["3"]);
    }

    #[tokio::test]
    async fn opens_on_march_without_month_parameter() {
        let mut transactions = march_transactions(2);
        transactions.push(
            Transaction::build(3, 50.0, datetime!(2021-08-15 12:00 UTC))
                .title("Item 3")
                .finalize(),
        );
        let state = get_test_state(&transactions);

        let response = get_dashboard_page(State(state), Query(DashboardParams::default()))
            .await
            .unwrap();

        let html = parse_html(response).await;
        assert_eq!(count_table_rows(&html), 2);
        let selector = Selector::parse("select[name='month'] option[selected]").unwrap();
        let selected: Vec<_> = html
            .select(&selector)
            .map(|option| option.value().attr("value").unwrap_or_default().to_owned())
            .collect();
        assert_eq!(selected, ["3"]);
    }

    #[tokio::test]
    async fn month_zero_shows_every_month() {
        let mut transactions = march_transactions(2);
        transactions.push(
            Transaction::build(3, 50.0, datetime!(2021-08-15 12:00 UTC))
                .title("Item 3")
                .finalize(),
        );
        let state = get_test_state(&transactions);

        let response = get_dashboard_page(State(state), Query(params("0", "1")))
            .await
            .unwrap();

        let html = parse_html(response).await;
        assert_eq!(count_table_rows(&html), 3);
    }

    #[tokio::test]
    async fn shows_pagination_links_for_many_transactions() {
        let state = get_test_state(&march_transactions(25));

        let response = get_dashboard_page(State(state), Query(params("3", "2")))
            .await
            .unwrap();

        let html = parse_html(response).await;
        assert_eq!(count_table_rows(&html), 10);
        let selector = Selector::parse("nav.pagination-indicator a[role='button']").unwrap();
        let buttons: Vec<_> = html
            .select(&selector)
            .map(|link| link.text().collect::<String>().trim().to_owned())
            .collect();
        assert_eq!(buttons, ["Back", "Next"]);
    }

    #[tokio::test]
    async fn empty_result_shows_message() {
        let state = get_test_state(&march_transactions(2));

        let response = get_dashboard_page(State(state), Query(params("7", "1")))
            .await
            .unwrap();

        let html = parse_html(response).await;
        assert_valid_html(&html);
        assert!(
            html.html().contains("No transactions match the current filters."),
            "{}",
            html.html()
        );
    }

    #[test]
    fn page_url_keeps_filters() {
        let filter = TransactionFilter {
            month: MonthFilter::Month(Month::March),
            search: "men's bag".to_owned(),
        };

        assert_eq!(page_url(&filter, 2), "/?month=3&search=men%27s+bag&page=2");
    }

    async fn parse_html(response: Response<Body>) -> Html {
        let body = response.into_body();
        let body = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        let text = String::from_utf8_lossy(&body).to_string();

        Html::parse_document(&text)
    }

    fn count_table_rows(html: &Html) -> usize {
        let selector = Selector::parse("#transactions tbody tr").unwrap();
        html.select(&selector).count()
    }

    #[track_caller]
    fn select_text(html: &Html, selector: &str) -> String {
        let selector = Selector::parse(selector).unwrap();
        html.select(&selector)
            .next()
            .unwrap_or_else(|| panic!("could not find element in {}", html.html()))
            .text()
            .collect::<String>()
            .trim()
            .to_owned()
    }

    #[track_caller]
    fn assert_valid_html(html: &Html) {
        assert!(
            html.errors.is_empty(),
            "Got HTML parsing errors: {:?}",
            html.errors
        );
    }

    #[track_caller]
    fn assert_chart_exists(html: &Html, chart_id: &str) {
        let selector = Selector::parse(&format!("#{}", chart_id)).unwrap();
        assert!(
            html.select(&selector).next().is_some(),
            "Chart with id '{}' not found",
            chart_id
        );
    }
}
