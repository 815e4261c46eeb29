use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use cwb_clover::CloverClient;
use cwb_core::{
    config::{Config, ResponderKind},
    processor::MessageProcessor,
    refresh::RefreshTask,
    respond::{LlmResponder, Responder, TemplateResponder},
    sales::SalesService,
    store::SqliteStore,
};
use cwb_openai::OpenAiClient;
use cwb_whatsapp::{router, TwilioSender};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cwb_core::logging::init("cwb")?;

    let cfg = Arc::new(Config::load()?);
    tracing::info!(merchant = %cfg.merchant_id, "starting coffee-shop WhatsApp assistant");

    let store = Arc::new(SqliteStore::connect(&cfg.database_url).await?);

    let pos = Arc::new(CloverClient::new(
        cfg.clover_base_url.clone(),
        cfg.clover_access_token.clone(),
        cfg.http_timeout,
    ));
    let pos_mock = pos.is_mock();

    let sales = Arc::new(SalesService::new(
        pos,
        store.clone(),
        cfg.stale_after,
        cfg.lookback_days,
    ));

    let responder: Arc<dyn Responder> = match (&cfg.responder, &cfg.openai_api_key) {
        (ResponderKind::Llm, Some(api_key)) => Arc::new(LlmResponder::new(Arc::new(
            OpenAiClient::new(api_key.clone(), cfg.openai_model.clone(), cfg.http_timeout),
        ))),
        (ResponderKind::Llm, None) => {
            tracing::warn!("RESPONDER=llm but OPENAI_API_KEY is unset, using templates");
            Arc::new(TemplateResponder)
        }
        (ResponderKind::Template, _) => Arc::new(TemplateResponder),
    };

    let processor = Arc::new(MessageProcessor::new(
        sales.clone(),
        responder,
        cfg.merchant_id.clone(),
    ));

    let messenger = Arc::new(TwilioSender::new(
        cfg.twilio_account_sid.clone(),
        cfg.twilio_auth_token.clone(),
        cfg.twilio_whatsapp_number.clone(),
        cfg.http_timeout,
    ));
    let messaging_mock = messenger.is_mock();

    let cancel = CancellationToken::new();
    let refresh = RefreshTask::new(sales.clone(), cfg.merchant_id.clone(), cfg.refresh_interval)
        .spawn(cancel.clone());

    let state = router::AppState {
        cfg,
        processor,
        sales,
        store,
        messenger,
        pos_mock,
        messaging_mock,
    };

    let result = router::run_server(state).await;

    cancel.cancel();
    let _ = refresh.await;

    result
}
