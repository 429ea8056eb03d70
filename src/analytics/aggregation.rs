//! Summaries computed over a filtered set of sales.
//!
//! All three summaries are pure functions of the same `&[Sale]`, which is what
//! keeps their totals consistent with each other.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Serialize, ser::SerializeMap};

use crate::{Error, analytics::sale::Sale};

/// Sale totals for a filtered set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesSummary {
    /// The sum of the prices of the sold transactions, with two decimal places.
    #[serde(with = "rust_decimal::serde::str")]
    pub total_sale_amount: Decimal,
    /// The number of sold transactions.
    pub total_sold_items: u64,
    /// The number of unsold transactions.
    pub total_unsold_items: u64,
    /// The number of transactions in the set.
    pub total_count: u64,
}

/// Sum the sold prices and count the sold and unsold transactions.
///
/// Prices are summed as [Decimal] so that the two decimal place total does not
/// pick up floating point error.
///
/// # Errors
/// Returns:
/// - [Error::InvalidPrice] if a price cannot be represented as a [Decimal],
/// - [Error::SaleTotalOverflow] if the sum does not fit in a [Decimal].
pub(crate) fn summarize_sales(sales: &[Sale]) -> Result<SalesSummary, Error> {
    let mut total = Decimal::ZERO;
    let mut sold = 0;

    for sale in sales.iter().filter(|sale| sale.sold) {
        let price = Decimal::try_from(sale.price).map_err(|_| Error::InvalidPrice(sale.price))?;
        total = total
            .checked_add(price)
            .ok_or(Error::SaleTotalOverflow)?;
        sold += 1;
    }

    total.rescale(2);
    let total_count = sales.len() as u64;

    Ok(SalesSummary {
        total_sale_amount: total,
        total_sold_items: sold,
        total_unsold_items: total_count - sold,
        total_count,
    })
}

const BUCKET_COUNT: usize = 10;
const BUCKET_WIDTH: f64 = 100.0;

/// The labels of the price ranges, in ascending order.
pub const PRICE_RANGE_LABELS: [&str; BUCKET_COUNT] = [
    "0-100",
    "101-200",
    "201-300",
    "301-400",
    "401-500",
    "501-600",
    "601-700",
    "701-800",
    "801-900",
    "901-above",
];

/// The number of transactions in each price range.
///
/// Every range is present, even when its count is zero, and serializes as a
/// JSON object keyed by [PRICE_RANGE_LABELS] in ascending order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PriceHistogram {
    counts: [u64; BUCKET_COUNT],
}

impl PriceHistogram {
    /// Pairs of range label and count, in ascending price order.
    pub fn buckets(&self) -> impl Iterator<Item = (&'static str, u64)> + '_ {
        PRICE_RANGE_LABELS.into_iter().zip(self.counts.iter().copied())
    }

    /// The sum of all bucket counts.
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }
}

impl Serialize for PriceHistogram {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(BUCKET_COUNT))?;
        for (label, count) in self.buckets() {
            map.serialize_entry(label, &count)?;
        }
        map.end()
    }
}

/// Index of the price range that `price` falls in.
///
/// Prices up to and including 100 go in the first range, after that each
/// range covers `(100 * (n - 1), 100 * n]` with everything above 900 in the last.
fn bucket_index(price: f64) -> usize {
    if price <= BUCKET_WIDTH {
        return 0;
    }

    let upper = (price / BUCKET_WIDTH).ceil() as usize;
    upper.saturating_sub(1).min(BUCKET_COUNT - 1)
}

/// Count the sales in each price range.
pub(crate) fn price_histogram(sales: &[Sale]) -> PriceHistogram {
    let mut histogram = PriceHistogram::default();

    for sale in sales {
        histogram.counts[bucket_index(sale.price)] += 1;
    }

    histogram
}

/// The number of transactions per category, only for categories that occur.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CategoryBreakdown(pub BTreeMap<String, u64>);

impl CategoryBreakdown {
    /// The sum of all category counts.
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }
}

/// Count the sales in each category.
pub(crate) fn category_breakdown(sales: &[Sale]) -> CategoryBreakdown {
    let mut counts = BTreeMap::new();

    for sale in sales {
        *counts.entry(sale.category.clone()).or_insert(0) += 1;
    }

    CategoryBreakdown(counts)
}
