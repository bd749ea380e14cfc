//! Sales report aggregation.

use std::collections::BTreeMap;

use serde::Serialize;
use time::OffsetDateTime;

use super::entities::OrderRecord;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookSales {
    pub book_id: i64,
    pub title: String,
    pub quantity_sold: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesReport {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub total_revenue: f64,
    pub total_orders: usize,
    pub top_selling_books: Vec<BookSales>,
}

impl SalesReport {
    /// Summarize `orders` as of `timestamp`.
    ///
    /// Books are listed by quantity sold, highest first, ties broken by id.
    pub fn from_orders(timestamp: OffsetDateTime, orders: &[OrderRecord]) -> Self {
        let mut per_book: BTreeMap<i64, BookSales> = BTreeMap::new();
        let mut total_revenue = 0.0;

        for order in orders {
            total_revenue += order.total_price;
            for item in &order.items {
                per_book
                    .entry(item.book_id)
                    .or_insert_with(|| BookSales {
                        book_id: item.book_id,
                        title: item.title.clone(),
                        quantity_sold: 0,
                    })
                    .quantity_sold += i64::from(item.quantity);
            }
        }

        let mut top_selling_books: Vec<_> = per_book.into_values().collect();
        top_selling_books.sort_by(|a, b| {
            b.quantity_sold
                .cmp(&a.quantity_sold)
                .then(a.book_id.cmp(&b.book_id))
        });

        Self {
            timestamp,
            total_revenue,
            total_orders: orders.len(),
            top_selling_books,
        }
    }
}
