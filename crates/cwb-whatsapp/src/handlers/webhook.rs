//! Inbound WhatsApp webhook (Twilio form-encoded POST).

use std::time::Instant;

use axum::{
    extract::{Form, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use cwb_core::store::MessageStore;

use crate::{router::AppState, twiml};

const FALLBACK_REPLY: &str =
    "Sorry, I'm having trouble processing your request right now. Please try again later.";
const DUPLICATE_REPLY: &str = "I've already processed this message.";

#[derive(Debug, Deserialize)]
pub struct InboundForm {
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "To")]
    pub to: Option<String>,
    #[serde(rename = "Body")]
    pub body: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusForm {
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
    #[serde(rename = "MessageStatus")]
    pub message_status: Option<String>,
    #[serde(rename = "ErrorCode")]
    pub error_code: Option<String>,
}

fn twiml_reply(body: &str) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/xml")],
        twiml::message_response(body),
    )
        .into_response()
}

/// Handle one inbound message: record it, classify + answer, reply as TwiML.
///
/// A structurally invalid payload is the only 400 path; everything after that
/// degrades to an apology so Twilio never retries a transient failure at the
/// user.
pub async fn inbound(State(state): State<AppState>, Form(form): Form<InboundForm>) -> Response {
    let started = Instant::now();

    let (Some(from), Some(to)) = (blank_to_none(form.from), blank_to_none(form.to)) else {
        return (StatusCode::BAD_REQUEST, "missing From/To").into_response();
    };

    // Local test posts arrive without a sid; give them one.
    let message_sid = blank_to_none(form.message_sid)
        .unwrap_or_else(|| format!("LOCAL_{}", uuid::Uuid::new_v4().simple()));
    let body = form.body.unwrap_or_default().trim().to_string();

    tracing::info!(sid = %message_sid, %from, "inbound WhatsApp message");

    // Twilio retries webhooks; replay the stored answer for a sid we have
    // already handled.
    let existing = match state.store.find_by_sid(&message_sid).await {
        Ok(existing) => existing,
        Err(err) => {
            tracing::error!(error = %err, "message lookup failed");
            return twiml_reply(FALLBACK_REPLY);
        }
    };
    if let Some(msg) = &existing {
        if msg.processed {
            let reply = msg.response_body.as_deref().unwrap_or(DUPLICATE_REPLY);
            return twiml_reply(reply);
        }
    }

    let record_id = match existing {
        Some(msg) => Some(msg.id),
        None => match state
            .store
            .record_inbound(&message_sid, &from, &to, &body)
            .await
        {
            Ok(id) => Some(id),
            Err(err) => {
                // Still answer the user; the audit row is best-effort.
                tracing::error!(error = %err, "failed to record inbound message");
                None
            }
        },
    };

    let reply = state.processor.handle(&body).await;

    if let Some(id) = record_id {
        let elapsed_ms = started.elapsed().as_millis() as i64;
        if let Err(err) = state.store.record_response(id, &reply, elapsed_ms).await {
            tracing::error!(error = %err, "failed to record response");
        }
    }

    tracing::info!(sid = %message_sid, elapsed_ms = started.elapsed().as_millis() as u64, "replied");
    twiml_reply(&reply)
}

/// Delivery status callback; logged only.
pub async fn status(Form(form): Form<StatusForm>) -> Response {
    tracing::info!(
        sid = form.message_sid.as_deref().unwrap_or(""),
        status = form.message_status.as_deref().unwrap_or(""),
        error_code = form.error_code.as_deref().unwrap_or(""),
        "WhatsApp delivery status"
    );
    Json(serde_json::json!({ "status": "received" })).into_response()
}

fn blank_to_none(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}
