//! Sales processor: the freshness-checked, cached view over POS order data.
//!
//! Answers "what did this merchant sell" with bounded latency while keeping
//! POS API calls to a minimum. A cached aggregate younger than the staleness
//! window is served as-is; anything older is recomputed from a fresh order
//! fetch and overwritten in place. A failed fetch degrades to the last good
//! snapshot (flagged stale) rather than erroring out.

use std::{collections::BTreeMap, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};

use crate::{
    domain::{AggregateLookup, ItemSummary, MerchantId, Order, SalesAggregate},
    ports::PosPort,
    store::CacheStore,
    Error, Result,
};

/// Freshness metadata for the cache-status endpoint.
#[derive(Clone, Debug)]
pub struct CacheStatus {
    pub computed_at: Option<DateTime<Utc>>,
    pub fresh: bool,
    pub item_count: usize,
}

pub struct SalesService {
    pos: Arc<dyn PosPort>,
    cache: Arc<dyn CacheStore>,
    stale_after: chrono::Duration,
    lookback: chrono::Duration,
}

impl SalesService {
    pub fn new(
        pos: Arc<dyn PosPort>,
        cache: Arc<dyn CacheStore>,
        stale_after: Duration,
        lookback_days: u32,
    ) -> Self {
        Self {
            pos,
            cache,
            stale_after: chrono::Duration::from_std(stale_after)
                .unwrap_or_else(|_| chrono::Duration::hours(24)),
            lookback: chrono::Duration::days(lookback_days as i64),
        }
    }

    /// Cached aggregate if fresh; otherwise fetch-and-recompute. Degrades to
    /// the last snapshot (marked stale) when the POS is unreachable, and
    /// signals `DataUnavailable` only when there is nothing to fall back to.
    pub async fn get_aggregate(&self, merchant: &MerchantId) -> Result<AggregateLookup> {
        let now = Utc::now();
        let prior = self.cache.get_aggregate(merchant).await?;

        if let Some(agg) = &prior {
            if agg.age(now) <= self.stale_after {
                return Ok(AggregateLookup {
                    aggregate: agg.clone(),
                    stale: false,
                });
            }
        }

        match self.refresh(merchant).await {
            Ok(aggregate) => Ok(AggregateLookup {
                aggregate,
                stale: false,
            }),
            Err(err) => match prior {
                Some(aggregate) => {
                    tracing::warn!(
                        merchant = %merchant,
                        error = %err,
                        "POS refresh failed, serving stale aggregate"
                    );
                    Ok(AggregateLookup {
                        aggregate,
                        stale: true,
                    })
                }
                None => Err(Error::DataUnavailable(merchant.0.clone())),
            },
        }
    }

    /// Force a fetch-and-recompute regardless of freshness. Concurrent
    /// callers for the same merchant may race; last write wins and both
    /// writes carry the same idempotent computation.
    pub async fn refresh(&self, merchant: &MerchantId) -> Result<SalesAggregate> {
        let end = Utc::now();
        let start = end - self.lookback;

        tracing::info!(merchant = %merchant, %start, %end, "recomputing sales aggregate");

        let orders = self.pos.fetch_orders(merchant, start, end).await?;
        let aggregate = compute_aggregate(merchant.clone(), &orders, end);
        self.cache.put_aggregate(&aggregate).await?;

        tracing::info!(
            merchant = %merchant,
            orders = aggregate.orders_considered,
            items = aggregate.items.len(),
            "sales aggregate updated"
        );

        Ok(aggregate)
    }

    pub async fn cache_status(&self, merchant: &MerchantId) -> Result<CacheStatus> {
        let now = Utc::now();
        Ok(match self.cache.get_aggregate(merchant).await? {
            Some(agg) => CacheStatus {
                fresh: agg.age(now) <= self.stale_after,
                item_count: agg.items.len(),
                computed_at: Some(agg.computed_at),
            },
            None => CacheStatus {
                computed_at: None,
                fresh: false,
                item_count: 0,
            },
        })
    }

    /// Administrative reset: drop the cached aggregate so the next lookup
    /// recomputes from the POS.
    pub async fn clear_cache(&self, merchant: &MerchantId) -> Result<()> {
        tracing::info!(merchant = %merchant, "clearing cached sales aggregate");
        self.cache.clear_aggregate(merchant).await
    }
}

/// Pure aggregation over an order set: group line items by item name, summing
/// quantity and `quantity * unit_price`. Ranking is quantity desc, revenue
/// desc, then name asc, so identical inputs always produce identical output.
pub fn compute_aggregate(
    merchant_id: MerchantId,
    orders: &[Order],
    computed_at: DateTime<Utc>,
) -> SalesAggregate {
    // BTreeMap keeps the grouping itself deterministic too.
    let mut by_name: BTreeMap<&str, ItemSummary> = BTreeMap::new();

    for order in orders {
        for line in &order.line_items {
            let entry = by_name.entry(&line.name).or_insert_with(|| ItemSummary {
                name: line.name.clone(),
                category: line.category.clone(),
                quantity_sold: 0,
                revenue: 0.0,
            });
            entry.quantity_sold += line.quantity;
            entry.revenue += line.unit_price * line.quantity as f64;
        }
    }

    let mut items: Vec<ItemSummary> = by_name.into_values().collect();
    items.sort_by(|a, b| {
        b.quantity_sold
            .cmp(&a.quantity_sold)
            .then(b.revenue.total_cmp(&a.revenue))
            .then_with(|| a.name.cmp(&b.name))
    });

    let total_items_sold = items.iter().map(|i| i.quantity_sold).sum();
    let total_revenue = items.iter().map(|i| i.revenue).sum();

    SalesAggregate {
        merchant_id,
        items,
        total_revenue,
        total_items_sold,
        orders_considered: orders.len() as u32,
        computed_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::LineItem;
    use async_trait::async_trait;
    use std::{
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
    };
    use tokio::sync::Mutex;

    struct FakePos {
        orders: Vec<Order>,
        fail: bool,
        fetches: AtomicUsize,
    }

    impl FakePos {
        fn with_orders(orders: Vec<Order>) -> Self {
            Self {
                orders,
                fail: false,
                fetches: AtomicUsize::new(0),
            }
        }

        fn failing() -> Self {
            Self {
                orders: Vec::new(),
                fail: true,
                fetches: AtomicUsize::new(0),
            }
        }

        fn fetch_count(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PosPort for FakePos {
        async fn fetch_orders(
            &self,
            _merchant: &MerchantId,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<Order>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::Upstream("pos offline".to_string()));
            }
            Ok(self.orders.clone())
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

    fn order(id: &str, lines: &[(&str, &str, u32, f64)]) -> Order {
        let line_items: Vec<LineItem> = lines
            .iter()
            .map(|(name, category, qty, price)| LineItem {
                name: name.to_string(),
                category: category.to_string(),
                quantity: *qty,
                unit_price: *price,
            })
            .collect();
        let total = line_items
            .iter()
            .map(|l| l.unit_price * l.quantity as f64)
            .sum();
        Order {
            id: id.to_string(),
            created_at: Utc::now(),
            line_items,
            total,
        }
    }

    fn merchant() -> MerchantId {
        MerchantId("M1".to_string())
    }

    fn service(pos: Arc<FakePos>, cache: Arc<MemoryCache>) -> SalesService {
        SalesService::new(pos, cache, Duration::from_secs(3600), 7)
    }

    #[tokio::test]
    async fn missing_cache_triggers_exactly_one_fetch() {
        let pos = Arc::new(FakePos::with_orders(vec![order(
            "O1",
            &[("Latte", "Coffee", 2, 4.5)],
        )]));
        let svc = service(pos.clone(), Arc::new(MemoryCache::default()));

        let lookup = svc.get_aggregate(&merchant()).await.unwrap();
        assert!(!lookup.stale);
        assert_eq!(pos.fetch_count(), 1);
    }

    #[tokio::test]
    async fn fresh_cache_makes_zero_fetches() {
        let pos = Arc::new(FakePos::with_orders(vec![order(
            "O1",
            &[("Latte", "Coffee", 2, 4.5)],
        )]));
        let cache = Arc::new(MemoryCache::default());
        let svc = service(pos.clone(), cache.clone());

        svc.get_aggregate(&merchant()).await.unwrap();
        assert_eq!(pos.fetch_count(), 1);

        // Second lookup is served from the cache.
        let lookup = svc.get_aggregate(&merchant()).await.unwrap();
        assert!(!lookup.stale);
        assert_eq!(pos.fetch_count(), 1);
    }

    #[tokio::test]
    async fn stale_cache_is_recomputed() {
        let pos = Arc::new(FakePos::with_orders(vec![order(
            "O1",
            &[("Latte", "Coffee", 2, 4.5)],
        )]));
        let cache = Arc::new(MemoryCache::default());

        let mut old = compute_aggregate(merchant(), &[], Utc::now());
        old.computed_at = Utc::now() - chrono::Duration::hours(2);
        cache.put_aggregate(&old).await.unwrap();

        let svc = service(pos.clone(), cache);
        let lookup = svc.get_aggregate(&merchant()).await.unwrap();

        assert!(!lookup.stale);
        assert_eq!(pos.fetch_count(), 1);
        assert_eq!(lookup.aggregate.total_items_sold, 2);
    }

    #[tokio::test]
    async fn pos_failure_with_stale_cache_returns_flagged_prior_value() {
        let cache = Arc::new(MemoryCache::default());

        let orders = vec![order("O1", &[("Latte", "Coffee", 3, 4.5)])];
        let mut old = compute_aggregate(merchant(), &orders, Utc::now());
        old.computed_at = Utc::now() - chrono::Duration::hours(2);
        cache.put_aggregate(&old).await.unwrap();

        let svc = service(Arc::new(FakePos::failing()), cache);
        let lookup = svc.get_aggregate(&merchant()).await.unwrap();

        assert!(lookup.stale);
        assert_eq!(lookup.aggregate.items, old.items);
    }

    #[tokio::test]
    async fn pos_failure_without_cache_signals_data_unavailable() {
        let svc = service(Arc::new(FakePos::failing()), Arc::new(MemoryCache::default()));

        let err = svc.get_aggregate(&merchant()).await.unwrap_err();
        assert!(matches!(err, Error::DataUnavailable(_)));
    }

    #[test]
    fn aggregation_sums_quantities_and_revenue() {
        let orders = vec![
            order("O1", &[("Latte", "Coffee", 2, 4.5)]),
            order("O2", &[("Latte", "Coffee", 1, 4.5)]),
        ];
        let agg = compute_aggregate(merchant(), &orders, Utc::now());

        assert_eq!(agg.items.len(), 1);
        assert_eq!(agg.items[0].quantity_sold, 3);
        assert!((agg.items[0].revenue - 13.5).abs() < 1e-9);
        assert_eq!(agg.total_items_sold, 3);
        assert_eq!(agg.orders_considered, 2);
    }

    #[test]
    fn ranking_is_quantity_then_revenue_then_name() {
        let orders = vec![order(
            "O1",
            &[
                ("A", "Coffee", 5, 2.0),  // qty 5, $10
                ("B", "Coffee", 5, 3.0),  // qty 5, $15
                ("C", "Coffee", 3, 20.0), // qty 3, $60; quantity loses first
            ],
        )];
        let agg = compute_aggregate(merchant(), &orders, Utc::now());

        let names: Vec<&str> = agg.items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn aggregation_is_idempotent() {
        let orders = vec![
            order("O1", &[("Latte", "Coffee", 2, 4.5), ("Muffin", "Pastry", 1, 3.5)]),
            order("O2", &[("Espresso", "Coffee", 4, 4.0)]),
        ];
        let at = Utc::now();

        let a = compute_aggregate(merchant(), &orders, at);
        let b = compute_aggregate(merchant(), &orders, at);
        assert_eq!(a, b);
    }

    #[test]
    fn category_filter_is_a_view_over_the_aggregate() {
        let orders = vec![order(
            "O1",
            &[("Latte", "Coffee", 2, 4.5), ("Croissant", "Pastry", 5, 3.0)],
        )];
        let agg = compute_aggregate(merchant(), &orders, Utc::now());

        let coffee = agg.filtered("coffee");
        assert_eq!(coffee.len(), 1);
        assert_eq!(coffee[0].name, "Latte");
    }

    #[tokio::test]
    async fn clearing_the_cache_forces_a_refetch() {
        let pos = Arc::new(FakePos::with_orders(vec![order(
            "O1",
            &[("Latte", "Coffee", 2, 4.5)],
        )]));
        let svc = service(pos.clone(), Arc::new(MemoryCache::default()));

        svc.get_aggregate(&merchant()).await.unwrap();
        svc.clear_cache(&merchant()).await.unwrap();

        let status = svc.cache_status(&merchant()).await.unwrap();
        assert!(status.computed_at.is_none());

        svc.get_aggregate(&merchant()).await.unwrap();
        assert_eq!(pos.fetch_count(), 2);
    }
}
