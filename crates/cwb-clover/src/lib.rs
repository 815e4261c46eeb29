//! Clover POS adapter.
//!
//! Read-only order/inventory retrieval over the Clover v3 REST API. Clover
//! reports prices in cents and timestamps in epoch milliseconds; this adapter
//! owns both conversions so the core only ever sees dollars and `DateTime`.
//!
//! Without an access token the client runs in mock mode and serves a fixed,
//! deterministic order history, so the rest of the system works end to end in
//! development and tests.

use std::{collections::HashMap, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

use cwb_core::{
    domain::{LineItem, MerchantId, Order},
    errors::Error,
    ports::PosPort,
    Result,
};

#[derive(Clone)]
pub struct CloverClient {
    base_url: String,
    access_token: Option<String>,
    http: reqwest::Client,
}

impl CloverClient {
    pub fn new(base_url: impl Into<String>, access_token: Option<String>, timeout: Duration) -> Self {
        if access_token.is_none() {
            tracing::warn!("Clover credentials not configured, POS adapter running in mock mode");
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");

        Self {
            base_url: base_url.into(),
            access_token,
            http,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.access_token.is_none()
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| Error::Config("clover access token missing".to_string()))?;

        let resp = self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("clover request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "clover returned {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        resp.json::<T>()
            .await
            .map_err(|e| Error::Upstream(format!("clover json error: {e}")))
    }

    /// Inventory item id → first category name, for enriching line items.
    async fn fetch_categories(&self, merchant: &MerchantId) -> Result<HashMap<String, String>> {
        let url = format!(
            "{}/v3/merchants/{}/items?expand=categories",
            self.base_url, merchant
        );
        let items: Elements<WireInventoryItem> = self.get_json(&url).await?;

        Ok(items
            .elements
            .into_iter()
            .map(|item| {
                let category = item
                    .categories
                    .and_then(|c| c.elements.into_iter().next())
                    .map(|c| c.name)
                    .unwrap_or_else(|| "Uncategorized".to_string());
                (item.id, category)
            })
            .collect())
    }
}

#[async_trait]
impl PosPort for CloverClient {
    async fn fetch_orders(
        &self,
        merchant: &MerchantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>> {
        if self.is_mock() {
            return Ok(mock_orders(start, end));
        }

        let categories = self.fetch_categories(merchant).await?;

        let url = format!(
            "{}/v3/merchants/{}/orders?limit=1000&expand=lineItems&filter=createdTime>={}&filter=createdTime<={}",
            self.base_url,
            merchant,
            start.timestamp_millis(),
            end.timestamp_millis()
        );
        let orders: Elements<WireOrder> = self.get_json(&url).await?;

        Ok(orders
            .elements
            .into_iter()
            .map(|o| convert_order(o, &categories))
            .collect())
    }
}

// Clover wire shapes: collections arrive wrapped in `{"elements": [...]}`.

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Elements<T> {
    #[serde(default)]
    elements: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct WireOrder {
    id: String,
    #[serde(rename = "createdTime", default)]
    created_time: i64,
    #[serde(default)]
    total: i64,
    #[serde(rename = "lineItems")]
    line_items: Option<Elements<WireLineItem>>,
}

#[derive(Debug, Deserialize)]
struct WireLineItem {
    item: Option<WireItemRef>,
    #[serde(rename = "unitQty")]
    unit_qty: Option<u32>,
    #[serde(default)]
    price: i64,
}

#[derive(Debug, Deserialize)]
struct WireItemRef {
    id: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireInventoryItem {
    id: String,
    categories: Option<Elements<WireCategory>>,
}

#[derive(Debug, Deserialize)]
struct WireCategory {
    name: String,
}

fn convert_order(wire: WireOrder, categories: &HashMap<String, String>) -> Order {
    let mut line_items = Vec::new();

    for line in wire.line_items.map(|l| l.elements).unwrap_or_default() {
        // Line items without an item reference carry no sellable product
        // (discounts, custom amounts); skip them like the dashboard does.
        let Some(item) = line.item else {
            continue;
        };
        let Some(id) = item.id else {
            continue;
        };

        let name = item
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Unknown Item {id}"));
        let category = categories
            .get(&id)
            .cloned()
            .unwrap_or_else(|| "Uncategorized".to_string());

        line_items.push(LineItem {
            name,
            category,
            quantity: line.unit_qty.unwrap_or(1),
            unit_price: line.price as f64 / 100.0,
        });
    }

    Order {
        id: wire.id,
        created_at: Utc
            .timestamp_millis_opt(wire.created_time)
            .single()
            .unwrap_or_else(Utc::now),
        line_items,
        total: wire.total as f64 / 100.0,
    }
}

/// Fixed development menu: (name, category, price in dollars).
const MOCK_MENU: [(&str, &str, f64); 5] = [
    ("Cappuccino", "Coffee", 5.00),
    ("Latte", "Coffee", 5.50),
    ("Espresso", "Coffee", 4.00),
    ("Croissant", "Pastry", 3.00),
    ("Muffin", "Pastry", 3.50),
];

const MOCK_ORDERS_PER_DAY: usize = 12;

/// Deterministic mock order history: the same window always produces the same
/// orders, so mock mode doubles as a stable fixture.
fn mock_orders(start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<Order> {
    let mut orders = Vec::new();
    let mut order_no = 1000u32;

    let days = (end - start).num_days().max(0);
    for day in 0..=days {
        for slot in 0..MOCK_ORDERS_PER_DAY {
            let created_at =
                start + chrono::Duration::days(day) + chrono::Duration::minutes(8 * 60 + slot as i64 * 37);
            if created_at > end {
                break;
            }

            let (name, category, price) = MOCK_MENU[(day as usize + slot) % MOCK_MENU.len()];
            let quantity = 1 + (slot % 2) as u32;

            orders.push(Order {
                id: format!("MOCK_ORDER_{order_no}"),
                created_at,
                line_items: vec![LineItem {
                    name: name.to_string(),
                    category: category.to_string(),
                    quantity,
                    unit_price: price,
                }],
                total: price * quantity as f64,
            });
            order_no += 1;
        }
    }

    orders
}
