//! Message processor: ties classification, sales lookup, and response
//! generation together for one inbound message.

use std::sync::Arc;

use crate::{
    domain::MerchantId,
    intent::{Intent, IntentClassifier},
    respond::Responder,
    sales::SalesService,
    Error,
};

pub struct MessageProcessor {
    classifier: IntentClassifier,
    sales: Arc<SalesService>,
    responder: Arc<dyn Responder>,
    merchant: MerchantId,
}

impl MessageProcessor {
    pub fn new(
        sales: Arc<SalesService>,
        responder: Arc<dyn Responder>,
        merchant: MerchantId,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(),
            sales,
            responder,
            merchant,
        }
    }

    /// Classify, fetch data if the intent needs it, and phrase the reply.
    /// Always returns a sendable string; sales failures become an apology,
    /// never an error.
    pub async fn handle(&self, body: &str) -> String {
        let intent = self.classifier.classify(body);

        if matches!(intent, Intent::Greeting | Intent::Help | Intent::General) {
            return self.responder.respond(&intent, None).await;
        }

        match self.sales.get_aggregate(&self.merchant).await {
            Ok(lookup) => self.responder.respond(&intent, Some(&lookup)).await,
            Err(Error::DataUnavailable(_)) => self.responder.respond(&intent, None).await,
            Err(err) => {
                tracing::error!(error = %err, "sales lookup failed");
                self.responder.respond(&intent, None).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LineItem, Order, SalesAggregate};
    use crate::ports::PosPort;
    use crate::respond::TemplateResponder;
    use crate::store::CacheStore;
    use crate::Result;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::{collections::HashMap, time::Duration};
    use tokio::sync::Mutex;

    struct FakePos {
        orders: Result<Vec<Order>>,
    }

    #[async_trait]
    impl PosPort for FakePos {
        async fn fetch_orders(
            &self,
            _merchant: &MerchantId,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<Order>> {
            match &self.orders {
                Ok(orders) => Ok(orders.clone()),
                Err(_) => Err(Error::Upstream("pos offline".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct MemoryCache {
        rows: Mutex<HashMap<String, SalesAggregate>>,
    }

    #[async_trait]
    impl CacheStore for MemoryCache {
        async fn get_aggregate(&self, merchant: &MerchantId) -> Result<Option<SalesAggregate>> {
            Ok(self.rows.lock().await.get(merchant.as_str()).cloned())
        }

        async fn put_aggregate(&self, aggregate: &SalesAggregate) -> Result<()> {
            self.rows
                .lock()
                .await
                .insert(aggregate.merchant_id.0.clone(), aggregate.clone());
            Ok(())
        }

        async fn clear_aggregate(&self, merchant: &MerchantId) -> Result<()> {
            self.rows.lock().await.remove(merchant.as_str());
            Ok(())
        }
    }

    fn processor(orders: Result<Vec<Order>>) -> MessageProcessor {
        let sales = Arc::new(SalesService::new(
            Arc::new(FakePos { orders }),
            Arc::new(MemoryCache::default()),
            Duration::from_secs(3600),
            7,
        ));
        MessageProcessor::new(
            sales,
            Arc::new(TemplateResponder),
            MerchantId("M1".to_string()),
        )
    }

    fn latte_order() -> Order {
        Order {
            id: "O1".to_string(),
            created_at: Utc::now(),
            line_items: vec![LineItem {
                name: "Latte".to_string(),
                category: "Coffee".to_string(),
                quantity: 3,
                unit_price: 4.5,
            }],
            total: 13.5,
        }
    }

    #[tokio::test]
    async fn greeting_answers_without_touching_sales() {
        // A failing POS must not matter for a greeting.
        let p = processor(Err(Error::Upstream("down".to_string())));
        let reply = p.handle("hello").await;
        assert!(reply.contains("sales assistant"));
    }

    #[tokio::test]
    async fn best_sellers_end_to_end() {
        let p = processor(Ok(vec![latte_order()]));
        let reply = p.handle("What's my best-selling drink?").await;
        assert!(reply.contains("Latte"));
        assert!(reply.contains("$13.50"));
    }

    #[tokio::test]
    async fn no_data_and_no_connectivity_yields_apology() {
        let p = processor(Err(Error::Upstream("down".to_string())));
        let reply = p.handle("what's my revenue?").await;
        assert!(!reply.trim().is_empty());
        assert!(reply.contains("try again"));
    }
}
