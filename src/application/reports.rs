//! Periodic sales reporting over recent orders.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;

use crate::application::repos::{OrdersRepo, RepoError};
use crate::domain::reports::SalesReport;

#[derive(Clone)]
pub struct ReportService {
    orders: Arc<dyn OrdersRepo>,
    lookback: Duration,
}

impl ReportService {
    pub fn new(orders: Arc<dyn OrdersRepo>, lookback: Duration) -> Self {
        Self { orders, lookback }
    }

    /// Build the report covering the `lookback` period ending at `now`.
    pub async fn generate(&self, now: OffsetDateTime) -> Result<SalesReport, RepoError> {
        let start = now - self.lookback;
        let orders = self.orders.orders_between(start, now).await?;
        Ok(SalesReport::from_orders(now, &orders))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use time::macros::datetime;

    use super::*;
    use crate::domain::entities::OrderRecord;

    #[derive(Default)]
    struct RecordingOrders {
        ranges: Mutex<Vec<(OffsetDateTime, OffsetDateTime)>>,
    }

    #[async_trait]
    impl OrdersRepo for RecordingOrders {
        async fn orders_between(
            &self,
            start: OffsetDateTime,
            end: OffsetDateTime,
        ) -> Result<Vec<OrderRecord>, RepoError> {
            self.ranges.lock().unwrap().push((start, end));
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn report_covers_lookback_window() {
        let orders = Arc::new(RecordingOrders::default());
        let service = ReportService::new(orders.clone(), Duration::from_secs(24 * 3600));
        let now = datetime!(2024-05-02 12:00 UTC);

        let report = service.generate(now).await.expect("report");

        assert_eq!(report.timestamp, now);
        assert_eq!(
            orders.ranges.lock().unwrap().as_slice(),
            &[(datetime!(2024-05-01 12:00 UTC), now)]
        );
    }
}
