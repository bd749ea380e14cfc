use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::{
    application::repos::{OrdersRepo, RepoError},
    domain::entities::{CustomerRecord, OrderItemRecord, OrderRecord},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: i64,
    total_price: f64,
    created_at: OffsetDateTime,
    status: String,
    customer_id: i64,
    customer_name: String,
    customer_email: String,
    customer_created_at: OffsetDateTime,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: i64,
    book_id: i64,
    title: String,
    quantity: i32,
}

#[async_trait]
impl OrdersRepo for PostgresRepositories {
    async fn orders_between(
        &self,
        start: OffsetDateTime,
        end: OffsetDateTime,
    ) -> Result<Vec<OrderRecord>, RepoError> {
        let orders = sqlx::query_as::<_, OrderRow>(
            r#"
            SELECT o.id, o.total_price, o.created_at, o.status,
                   c.id AS customer_id, c.name AS customer_name,
                   c.email AS customer_email, c.created_at AS customer_created_at
            FROM orders o
            JOIN customers c ON o.customer_id = c.id
            WHERE o.created_at BETWEEN $1 AND $2
            ORDER BY o.created_at, o.id
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        if orders.is_empty() {
            return Ok(Vec::new());
        }

        let order_ids: Vec<i64> = orders.iter().map(|order| order.id).collect();
        let items = sqlx::query_as::<_, OrderItemRow>(
            r#"
            SELECT oi.order_id, oi.book_id, b.title, oi.quantity
            FROM order_items oi
            JOIN books b ON oi.book_id = b.id
            WHERE oi.order_id = ANY($1)
            ORDER BY oi.id
            "#,
        )
        .bind(&order_ids)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let mut items_by_order: HashMap<i64, Vec<OrderItemRecord>> = HashMap::new();
        for item in items {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(OrderItemRecord {
                    book_id: item.book_id,
                    title: item.title,
                    quantity: item.quantity,
                });
        }

        Ok(orders
            .into_iter()
            .map(|row| OrderRecord {
                id: row.id,
                customer: CustomerRecord {
                    id: row.customer_id,
                    name: row.customer_name,
                    email: row.customer_email,
                    created_at: row.customer_created_at,
                },
                items: items_by_order.remove(&row.id).unwrap_or_default(),
                total_price: row.total_price,
                created_at: row.created_at,
                status: row.status,
            })
            .collect())
    }
}
