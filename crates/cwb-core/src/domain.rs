use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// POS merchant identifier (string, provider-assigned).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MerchantId(pub String);

impl MerchantId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MerchantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One line of a POS order. Prices are dollars; the POS adapter owns any
/// provider-unit conversion (Clover reports cents).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub unit_price: f64,
}

/// A POS order as fetched from the provider. Immutable once fetched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub line_items: Vec<LineItem>,
    pub total: f64,
}

/// Per-item slice of an aggregate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub name: String,
    pub category: String,
    pub quantity_sold: u32,
    pub revenue: f64,
}

/// Cached per-merchant sales summary. One row per merchant, overwritten on
/// recompute, never versioned. `items` is kept in rank order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SalesAggregate {
    pub merchant_id: MerchantId,
    pub items: Vec<ItemSummary>,
    pub total_revenue: f64,
    pub total_items_sold: u32,
    pub orders_considered: u32,
    pub computed_at: DateTime<Utc>,
}

impl SalesAggregate {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now - self.computed_at
    }

    /// Post-hoc category filter over the same aggregate; there is no separate
    /// per-category computation path.
    pub fn filtered(&self, category: &str) -> Vec<ItemSummary> {
        self.items
            .iter()
            .filter(|i| i.category.eq_ignore_ascii_case(category))
            .cloned()
            .collect()
    }

    pub fn top(&self, limit: usize) -> &[ItemSummary] {
        &self.items[..self.items.len().min(limit)]
    }
}

/// Aggregate lookup result: the data plus whether it predates the staleness
/// window (set when a POS failure forced a fall-back to the last snapshot).
#[derive(Clone, Debug, PartialEq)]
pub struct AggregateLookup {
    pub aggregate: SalesAggregate,
    pub stale: bool,
}

/// Append-only audit record of one inbound message and our reply.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: i64,
    pub message_sid: String,
    pub from_number: String,
    pub to_number: String,
    pub body: String,
    pub response_body: Option<String>,
    pub processed: bool,
    pub response_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}
