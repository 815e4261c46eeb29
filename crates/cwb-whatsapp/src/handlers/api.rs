//! JSON REST endpoints for dashboards and manual operations.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use cwb_core::{store::MessageStore, Error as CoreError};

use crate::{router::AppState, validate_phone_number};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::Upstream(msg) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.clone()),
            ApiError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        };

        let body = ErrorResponse {
            error: message,
            code,
        };
        (status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(msg) => ApiError::BadRequest(msg),
            CoreError::DataUnavailable(merchant) => {
                ApiError::NotFound(format!("no sales data for merchant {merchant}"))
            }
            CoreError::Upstream(msg) => ApiError::Upstream(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    // Cheap store probe; the rest of the payload is static wiring info.
    let store_ok = state.store.recent(1).await.is_ok();

    Json(serde_json::json!({
        "status": if store_ok { "ok" } else { "degraded" },
        "store": if store_ok { "ok" } else { "error" },
        "merchant_id": state.cfg.merchant_id,
        "pos_mock": state.pos_mock,
        "messaging_mock": state.messaging_mock,
        "responder": match state.cfg.responder {
            cwb_core::config::ResponderKind::Llm => "llm",
            cwb_core::config::ResponderKind::Template => "template",
        },
    }))
}

#[derive(Debug, Deserialize)]
pub struct BestSellingQuery {
    pub limit: Option<usize>,
    pub category: Option<String>,
}

pub async fn best_selling(
    State(state): State<AppState>,
    Query(query): Query<BestSellingQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let lookup = state.sales.get_aggregate(&state.cfg.merchant_id).await?;

    let limit = query.limit.unwrap_or(10);
    let items = match &query.category {
        Some(cat) => lookup.aggregate.filtered(cat),
        None => lookup.aggregate.items.clone(),
    };
    let items: Vec<_> = items.into_iter().take(limit).collect();

    Ok(Json(serde_json::json!({
        "merchant_id": lookup.aggregate.merchant_id,
        "items": items,
        "category_filter": query.category,
        "stale": lookup.stale,
        "computed_at": lookup.aggregate.computed_at,
    })))
}

pub async fn refresh(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let aggregate = state.sales.refresh(&state.cfg.merchant_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "orders_processed": aggregate.orders_considered,
        "items_updated": aggregate.items.len(),
        "computed_at": aggregate.computed_at,
    })))
}

/// Administrative cache reset; the next sales query recomputes from the POS.
pub async fn cache_clear(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    state.sales.clear_cache(&state.cfg.merchant_id).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "merchant_id": state.cfg.merchant_id,
    })))
}

pub async fn cache_status(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let status = state.sales.cache_status(&state.cfg.merchant_id).await?;

    Ok(Json(serde_json::json!({
        "merchant_id": state.cfg.merchant_id,
        "cached": status.computed_at.is_some(),
        "fresh": status.fresh,
        "computed_at": status.computed_at,
        "item_count": status.item_count,
    })))
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<u32>,
}

pub async fn messages(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let limit = query.limit.unwrap_or(50).min(500);
    let messages = state.store.recent(limit).await?;

    Ok(Json(serde_json::json!({
        "count": messages.len(),
        "messages": messages,
    })))
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub to: String,
    pub message: String,
}

/// Programmatic outbound send (reports, alerts).
pub async fn send(
    State(state): State<AppState>,
    Json(req): Json<SendRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    if req.message.trim().is_empty() {
        return Err(CoreError::Validation("message must not be empty".to_string()).into());
    }
    if !validate_phone_number(&req.to) {
        return Err(CoreError::Validation(format!("invalid phone number: {}", req.to)).into());
    }

    let receipt = state.messenger.send_text(&req.to, &req.message).await?;

    Ok(Json(serde_json::json!({
        "success": true,
        "message_sid": receipt.message_sid,
        "mock": receipt.mock,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TwilioSender;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use cwb_core::{
        config::Config,
        domain::{LineItem, MerchantId, Order},
        ports::PosPort,
        processor::MessageProcessor,
        respond::TemplateResponder,
        sales::SalesService,
        store::SqliteStore,
        Result,
    };
    use std::{sync::Arc, time::Duration};

    struct FakePos;

    #[async_trait]
    impl PosPort for FakePos {
        async fn fetch_orders(
            &self,
            _merchant: &MerchantId,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
        ) -> Result<Vec<Order>> {
            Ok(vec![Order {
                id: "O1".to_string(),
                created_at: Utc::now(),
                line_items: vec![LineItem {
                    name: "Latte".to_string(),
                    category: "Coffee".to_string(),
                    quantity: 3,
                    unit_price: 4.5,
                }],
                total: 13.5,
            }])
        }
    }

    async fn state() -> AppState {
        std::env::set_var("DATABASE_URL", "sqlite::memory:");
        let cfg = Arc::new(Config::load().unwrap());
        let store = Arc::new(SqliteStore::connect("sqlite::memory:").await.unwrap());
        let sales = Arc::new(SalesService::new(
            Arc::new(FakePos),
            store.clone(),
            Duration::from_secs(3600),
            7,
        ));
        let processor = Arc::new(MessageProcessor::new(
            sales.clone(),
            Arc::new(TemplateResponder),
            cfg.merchant_id.clone(),
        ));
        AppState {
            cfg,
            processor,
            sales,
            store,
            messenger: Arc::new(TwilioSender::new(
                None,
                None,
                "whatsapp:+14155238886",
                Duration::from_secs(5),
            )),
            pos_mock: true,
            messaging_mock: true,
        }
    }

    #[test]
    fn core_errors_map_to_statuses() {
        let bad: ApiError = CoreError::Validation("nope".to_string()).into();
        assert!(matches!(bad, ApiError::BadRequest(_)));

        let missing: ApiError = CoreError::DataUnavailable("M1".to_string()).into();
        assert!(matches!(missing, ApiError::NotFound(_)));

        let upstream: ApiError = CoreError::Upstream("pos".to_string()).into();
        assert!(matches!(upstream, ApiError::Upstream(_)));
    }

    #[tokio::test]
    async fn health_reports_store_status() {
        let body = health(State(state().await)).await.0;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["store"], "ok");
    }

    #[tokio::test]
    async fn cache_clear_empties_the_cache() {
        let st = state().await;
        st.sales.refresh(&st.cfg.merchant_id).await.unwrap();
        assert!(st
            .sales
            .cache_status(&st.cfg.merchant_id)
            .await
            .unwrap()
            .computed_at
            .is_some());

        let body = cache_clear(State(st.clone())).await.unwrap().0;
        assert_eq!(body["success"], true);

        let status = st.sales.cache_status(&st.cfg.merchant_id).await.unwrap();
        assert!(status.computed_at.is_none());
        assert_eq!(status.item_count, 0);
    }
}
