//! Sales summaries over a filtered set of transactions.
//!
//! This module contains:
//! - The sales summary, price histogram and category breakdown computations
//! - The JSON endpoints that expose each summary, and all three combined

mod aggregation;
mod handlers;
mod sale;

pub use aggregation::{CategoryBreakdown, PriceHistogram, SalesSummary};
pub use handlers::{get_bar_chart, get_combined_data, get_pie_chart, get_statistics};

pub(crate) use aggregation::{category_breakdown, price_histogram, summarize_sales};
pub(crate) use sale::get_sales;
