//! HTTP surface: webhook + REST routes, middleware, and server startup.

use std::{net::SocketAddr, sync::Arc};

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use cwb_core::{
    config::Config, ports::MessagingPort, processor::MessageProcessor, sales::SalesService,
    store::SqliteStore,
};

use crate::handlers::{api, webhook};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub processor: Arc<MessageProcessor>,
    pub sales: Arc<SalesService>,
    pub store: Arc<SqliteStore>,
    pub messenger: Arc<dyn MessagingPort>,
    pub pos_mock: bool,
    pub messaging_mock: bool,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/whatsapp", post(webhook::inbound))
        .route("/webhook/whatsapp/status", post(webhook::status))
        .route("/api/health", get(api::health))
        .route("/api/sales/best-selling", get(api::best_selling))
        .route("/api/sales/refresh", post(api::refresh))
        .route("/api/sales/cache-clear", post(api::cache_clear))
        .route("/api/sales/cache-status", get(api::cache_status))
        .route("/api/messages", get(api::messages))
        .route("/api/send", post(api::send))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
}

pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", state.cfg.http_host, state.cfg.http_port).parse()?;
    let router = create_router(state);

    tracing::info!("listening on {addr}");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
