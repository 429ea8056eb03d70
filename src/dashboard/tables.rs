//! Table and card views for the dashboard.

use maud::{Markup, html};
use rust_decimal::prelude::ToPrimitive;

use crate::{
    analytics::SalesSummary,
    html::{
        BADGE_STYLE, CARD_STYLE, LINK_STYLE, TABLE_CELL_STYLE, TABLE_HEADER_STYLE,
        TABLE_ROW_STYLE, format_currency,
    },
    transaction::Transaction,
};

const CARD_LABEL_STYLE: &str = "text-sm text-gray-500 dark:text-gray-400";
const CARD_VALUE_STYLE: &str = "text-2xl font-semibold";

/// Renders the sale totals as a row of cards.
pub(super) fn statistics_cards(summary: &SalesSummary, period: &str) -> Markup {
    let total_sale_amount = summary.total_sale_amount.to_f64().unwrap_or_default();

    html! {
        section id="statistics" class="w-full mb-4"
        {
            h3 class="text-xl font-semibold mb-4" { "Statistics - " (period) }

            div class="grid grid-cols-1 sm:grid-cols-3 gap-4"
            {
                div class=(CARD_STYLE)
                {
                    span class=(CARD_LABEL_STYLE) { "Total sale" }
                    span
                        class=(CARD_VALUE_STYLE)
                        data-testid="total-sale-amount"
                        title=(summary.total_sale_amount.to_string())
                    {
                        (format_currency(total_sale_amount))
                    }
                }

                div class=(CARD_STYLE)
                {
                    span class=(CARD_LABEL_STYLE) { "Total sold items" }
                    span class=(CARD_VALUE_STYLE) data-testid="total-sold-items"
                    {
                        (summary.total_sold_items)
                    }
                }

                div class=(CARD_STYLE)
                {
                    span class=(CARD_LABEL_STYLE) { "Total not sold items" }
                    span class=(CARD_VALUE_STYLE) data-testid="total-unsold-items"
                    {
                        (summary.total_unsold_items)
                    }
                }
            }
        }
    }
}

/// Renders one page of transactions as a table.
pub(super) fn transactions_table(transactions: &[Transaction]) -> Markup {
    html! {
        div class="w-full overflow-x-auto rounded shadow-md"
        {
            table class="w-full text-sm text-left text-gray-500 dark:text-gray-400"
            {
                thead class=(TABLE_HEADER_STYLE)
                {
                    tr
                    {
                        th scope="col" class=(TABLE_CELL_STYLE) { "ID" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Title" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Description" }
                        th scope="col" class="px-6 py-4 text-right" { "Price" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Category" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Sold" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Image" }
                        th scope="col" class=(TABLE_CELL_STYLE) { "Date of sale" }
                    }
                }

                tbody
                {
                    @for transaction in transactions {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            td class=(TABLE_CELL_STYLE) { (transaction.id) }
                            td class=(TABLE_CELL_STYLE) { (transaction.title) }
                            td class="px-6 py-4 max-w-md truncate" title=(transaction.description)
                            {
                                (transaction.description)
                            }
                            td class="px-6 py-4 text-right" { (format_currency(transaction.price)) }
                            td class=(TABLE_CELL_STYLE)
                            {
                                span class=(BADGE_STYLE) { (transaction.category) }
                            }
                            td class=(TABLE_CELL_STYLE)
                            {
                                @if transaction.sold { "Yes" } @else { "No" }
                            }
                            td class=(TABLE_CELL_STYLE)
                            {
                                @if !transaction.image.is_empty() {
                                    a href=(transaction.image) class=(LINK_STYLE) { "View" }
                                }
                            }
                            td class="px-6 py-4 whitespace-nowrap" { (transaction.date_of_sale.date().to_string()) }
                        }
                    }

                    @if transactions.is_empty() {
                        tr class=(TABLE_ROW_STYLE)
                        {
                            td colspan="8" class="px-6 py-4 text-center"
                            {
                                "No transactions match the current filters."
                            }
                        }
                    }
                }
            }
        }
    }
}
