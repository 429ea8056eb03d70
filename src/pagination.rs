//! This modules defines the common functionality for paging data.

use serde::Serialize;

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: u64,
    /// The number of transactions per page when not specified in a request.
    pub default_page_size: u64,
    /// The largest page size a client may request.
    pub max_page_size: u64,
    /// The maximum number of pages to show in the pagination indicator.
    pub max_pages: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 10,
            max_page_size: 100,
            max_pages: 5,
        }
    }
}

impl PaginationConfig {
    /// Resolve raw `page` and `limit` query values into a [PageWindow].
    ///
    /// Missing, non-numeric and non-positive values fall back to the defaults
    /// instead of being rejected. `limit` is clamped to `max_page_size`, and
    /// `page` is clamped so that the offset fits in an SQLite integer.
    pub fn window(&self, page: Option<&str>, limit: Option<&str>) -> PageWindow {
        let limit = parse_positive(limit)
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size)
            .max(1);
        let page = parse_positive(page)
            .unwrap_or(self.default_page)
            .min(MAX_OFFSET / limit);

        PageWindow { page, limit }
    }
}

/// The largest offset SQLite accepts.
const MAX_OFFSET: u64 = i64::MAX as u64;

fn parse_positive(value: Option<&str>) -> Option<u64> {
    value
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|&value| value > 0)
}

/// A single page of results: which page (starting from 1) and how many items per page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    /// The page number, starting from 1.
    pub page: u64,
    /// The maximum number of items on a page.
    pub limit: u64,
}

impl PageWindow {
    /// The number of items to skip to get to this page.
    pub fn offset(&self) -> u64 {
        self.page
            .saturating_sub(1)
            .saturating_mul(self.limit)
            .min(MAX_OFFSET)
    }

    /// The number of pages needed to show `item_count` items.
    pub fn page_count(&self, item_count: u64) -> u64 {
        item_count.div_ceil(self.limit)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum PaginationIndicator {
    Page(u64),
    CurrPage(u64),
    Ellipsis,
    NextButton(u64),
    BackButton(u64),
}

pub fn create_pagination_indicators(
    curr_page: u64,
    page_count: u64,
    max_pages: u64,
) -> Vec<PaginationIndicator> {
    let map_page = |page| {
        if page == curr_page {
            PaginationIndicator::CurrPage(page)
        } else {
            PaginationIndicator::Page(page)
        }
    };

    let mut indicators: Vec<PaginationIndicator> = if page_count <= max_pages {
        (1..=page_count).map(map_page).collect()
    } else if curr_page <= (max_pages / 2) {
        (1..=max_pages).map(map_page).collect()
    } else if curr_page > (page_count - max_pages / 2) {
        ((page_count - max_pages + 1)..=page_count)
            .map(map_page)
            .collect()
    } else {
        ((curr_page - max_pages / 2)..=(curr_page + max_pages / 2))
            .map(map_page)
            .collect()
    };

    if page_count > max_pages {
        if curr_page > (max_pages / 2) + 1 {
            indicators.insert(0, PaginationIndicator::Page(1));
            indicators.insert(1, PaginationIndicator::Ellipsis);
        }

        if curr_page < (page_count - max_pages / 2) {
            indicators.push(PaginationIndicator::Ellipsis);
            indicators.push(PaginationIndicator::Page(page_count));
        }
    }

    if curr_page > 1 {
        indicators.insert(0, PaginationIndicator::BackButton(curr_page - 1));
    }

    if curr_page < page_count {
        indicators.push(PaginationIndicator::NextButton(curr_page + 1));
    }

    indicators
}
