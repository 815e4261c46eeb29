//! Persistence: the per-merchant aggregate cache and the append-only message
//! history. Both live in SQLite behind small traits so the sales core can be
//! tested against in-memory fakes.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    Row,
};

use crate::{
    domain::{ItemSummary, MerchantId, MessageRecord, SalesAggregate},
    Result,
};

/// Cache rows are last-write-wins per merchant; concurrent recomputes of the
/// same stale merchant are allowed to overwrite each other (the recompute is
/// idempotent, so either write is correct).
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_aggregate(&self, merchant: &MerchantId) -> Result<Option<SalesAggregate>>;
    async fn put_aggregate(&self, aggregate: &SalesAggregate) -> Result<()>;
    async fn clear_aggregate(&self, merchant: &MerchantId) -> Result<()>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn find_by_sid(&self, message_sid: &str) -> Result<Option<MessageRecord>>;
    async fn record_inbound(&self, message_sid: &str, from: &str, to: &str, body: &str)
        -> Result<i64>;
    async fn record_response(&self, id: i64, response: &str, response_time_ms: i64) -> Result<()>;
    async fn recent(&self, limit: u32) -> Result<Vec<MessageRecord>>;
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (creating the file if needed) and bootstrap the schema.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let opts = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);

        // A single connection keeps `sqlite::memory:` coherent across
        // acquires; file databases stay far below any contention that would
        // make this matter.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.bootstrap().await?;
        Ok(store)
    }

    async fn bootstrap(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sales_cache (
                merchant_id      TEXT PRIMARY KEY,
                items            TEXT NOT NULL,
                total_revenue    REAL NOT NULL,
                total_items_sold INTEGER NOT NULL,
                orders_considered INTEGER NOT NULL,
                computed_at      TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id               INTEGER PRIMARY KEY AUTOINCREMENT,
                message_sid      TEXT NOT NULL UNIQUE,
                from_number      TEXT NOT NULL,
                to_number        TEXT NOT NULL,
                body             TEXT NOT NULL,
                response_body    TEXT,
                processed        INTEGER NOT NULL DEFAULT 0,
                response_time_ms INTEGER,
                created_at       TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_from ON messages(from_number)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<MessageRecord> {
        Ok(MessageRecord {
            id: row.try_get("id")?,
            message_sid: row.try_get("message_sid")?,
            from_number: row.try_get("from_number")?,
            to_number: row.try_get("to_number")?,
            body: row.try_get("body")?,
            response_body: row.try_get("response_body")?,
            processed: row.try_get::<i64, _>("processed")? != 0,
            response_time_ms: row.try_get("response_time_ms")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn get_aggregate(&self, merchant: &MerchantId) -> Result<Option<SalesAggregate>> {
        let row = sqlx::query(
            "SELECT items, total_revenue, total_items_sold, orders_considered, computed_at \
             FROM sales_cache WHERE merchant_id = ?",
        )
        .bind(merchant.as_str())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items_json: String = row.try_get("items")?;
        let items: Vec<ItemSummary> = serde_json::from_str(&items_json)?;
        let computed_at: DateTime<Utc> = row.try_get("computed_at")?;

        Ok(Some(SalesAggregate {
            merchant_id: merchant.clone(),
            items,
            total_revenue: row.try_get("total_revenue")?,
            total_items_sold: row.try_get::<i64, _>("total_items_sold")? as u32,
            orders_considered: row.try_get::<i64, _>("orders_considered")? as u32,
            computed_at,
        }))
    }

    async fn put_aggregate(&self, aggregate: &SalesAggregate) -> Result<()> {
        let items_json = serde_json::to_string(&aggregate.items)?;

        sqlx::query(
            r#"
            INSERT INTO sales_cache
                (merchant_id, items, total_revenue, total_items_sold, orders_considered, computed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(merchant_id) DO UPDATE SET
                items = excluded.items,
                total_revenue = excluded.total_revenue,
                total_items_sold = excluded.total_items_sold,
                orders_considered = excluded.orders_considered,
                computed_at = excluded.computed_at
            "#,
        )
        .bind(aggregate.merchant_id.as_str())
        .bind(items_json)
        .bind(aggregate.total_revenue)
        .bind(aggregate.total_items_sold as i64)
        .bind(aggregate.orders_considered as i64)
        .bind(aggregate.computed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear_aggregate(&self, merchant: &MerchantId) -> Result<()> {
        sqlx::query("DELETE FROM sales_cache WHERE merchant_id = ?")
            .bind(merchant.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MessageStore for SqliteStore {
    async fn find_by_sid(&self, message_sid: &str) -> Result<Option<MessageRecord>> {
        let row = sqlx::query("SELECT * FROM messages WHERE message_sid = ?")
            .bind(message_sid)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::row_to_message).transpose()
    }

    async fn record_inbound(
        &self,
        message_sid: &str,
        from: &str,
        to: &str,
        body: &str,
    ) -> Result<i64> {
        let res = sqlx::query(
            "INSERT INTO messages (message_sid, from_number, to_number, body, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(message_sid)
        .bind(from)
        .bind(to)
        .bind(body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(res.last_insert_rowid())
    }

    async fn record_response(&self, id: i64, response: &str, response_time_ms: i64) -> Result<()> {
        sqlx::query(
            "UPDATE messages SET response_body = ?, processed = 1, response_time_ms = ? \
             WHERE id = ?",
        )
        .bind(response)
        .bind(response_time_ms)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent(&self, limit: u32) -> Result<Vec<MessageRecord>> {
        let rows = sqlx::query("SELECT * FROM messages ORDER BY created_at DESC, id DESC LIMIT ?")
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::row_to_message).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ItemSummary;

    async fn memory_store() -> SqliteStore {
        SqliteStore::connect("sqlite::memory:")
            .await
            .expect("open in-memory store")
    }

    fn aggregate(merchant: &str, qty: u32) -> SalesAggregate {
        SalesAggregate {
            merchant_id: MerchantId(merchant.to_string()),
            items: vec![ItemSummary {
                name: "Latte".to_string(),
                category: "Coffee".to_string(),
                quantity_sold: qty,
                revenue: qty as f64 * 4.5,
            }],
            total_revenue: qty as f64 * 4.5,
            total_items_sold: qty,
            orders_considered: 1,
            computed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn aggregate_roundtrip() {
        let store = memory_store().await;
        let merchant = MerchantId("M1".to_string());

        assert!(store.get_aggregate(&merchant).await.unwrap().is_none());

        let agg = aggregate("M1", 3);
        store.put_aggregate(&agg).await.unwrap();

        let got = store.get_aggregate(&merchant).await.unwrap().unwrap();
        assert_eq!(got.items, agg.items);
        assert_eq!(got.total_items_sold, 3);
    }

    #[tokio::test]
    async fn aggregate_overwrite_is_last_write_wins() {
        let store = memory_store().await;
        let merchant = MerchantId("M1".to_string());

        store.put_aggregate(&aggregate("M1", 3)).await.unwrap();
        store.put_aggregate(&aggregate("M1", 9)).await.unwrap();

        let got = store.get_aggregate(&merchant).await.unwrap().unwrap();
        assert_eq!(got.total_items_sold, 9);
    }

    #[tokio::test]
    async fn clear_removes_row() {
        let store = memory_store().await;
        let merchant = MerchantId("M1".to_string());

        store.put_aggregate(&aggregate("M1", 3)).await.unwrap();
        store.clear_aggregate(&merchant).await.unwrap();
        assert!(store.get_aggregate(&merchant).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn message_lifecycle() {
        let store = memory_store().await;

        assert!(store.find_by_sid("SM1").await.unwrap().is_none());

        let id = store
            .record_inbound("SM1", "whatsapp:+1555", "whatsapp:+1444", "hi")
            .await
            .unwrap();
        store.record_response(id, "hello!", 42).await.unwrap();

        let msg = store.find_by_sid("SM1").await.unwrap().unwrap();
        assert!(msg.processed);
        assert_eq!(msg.response_body.as_deref(), Some("hello!"));
        assert_eq!(msg.response_time_ms, Some(42));

        let recent = store.recent(10).await.unwrap();
        assert_eq!(recent.len(), 1);
    }
}
