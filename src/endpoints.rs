//! The API endpoints URIs.

/// The root route which shows the dashboard page.
pub const ROOT: &str = "/";

/// The route to request a cup of coffee (experimental).
pub const COFFEE: &str = "/api/coffee";
/// The route to list a page of transactions.
pub const TRANSACTIONS: &str = "/api/transactions";
/// The route for the sale totals.
pub const STATISTICS: &str = "/api/statistics";
/// The route for the price range histogram.
pub const BAR_CHART: &str = "/api/bar-chart";
/// The route for the category breakdown.
pub const PIE_CHART: &str = "/api/pie-chart";
/// The route for the statistics, bar chart and pie chart in one response.
pub const COMBINED_DATA: &str = "/api/combined-data";
/// The route to replace all transactions with the seed feed.
pub const INITIALIZE: &str = "/api/initialize";
