//! Twilio WhatsApp adapter: outbound message client plus the inbound webhook
//! and REST surface (axum).

pub mod handlers;
pub mod router;
pub mod twiml;

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;

use cwb_core::{
    errors::Error,
    ports::{MessagingPort, SendReceipt},
    Result,
};

/// Twilio REST client for WhatsApp sends. Without credentials it runs in
/// mock mode: sends are logged and acknowledged with a synthetic sid.
#[derive(Clone)]
pub struct TwilioSender {
    credentials: Option<(String, String)>,
    from_number: String,
    http: reqwest::Client,
}

impl TwilioSender {
    pub fn new(
        account_sid: Option<String>,
        auth_token: Option<String>,
        from_number: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let credentials = match (account_sid, auth_token) {
            (Some(sid), Some(token)) => Some((sid, token)),
            _ => {
                tracing::warn!("Twilio credentials not configured, WhatsApp sends will be mocked");
                None
            }
        };

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client build");

        Self {
            credentials,
            from_number: from_number.into(),
            http,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.credentials.is_none()
    }
}

/// Twilio WhatsApp addresses are `whatsapp:` + E.164.
pub fn normalize_whatsapp_number(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{number}")
    }
}

/// Structural check only (E.164 shape with optional `whatsapp:` prefix);
/// deliverability is Twilio's problem.
pub fn validate_phone_number(number: &str) -> bool {
    let bare = number.strip_prefix("whatsapp:").unwrap_or(number);
    Regex::new(r"^\+[1-9]\d{6,14}$")
        .expect("valid phone pattern")
        .is_match(bare)
}

#[derive(Debug, Deserialize)]
struct TwilioSendResponse {
    sid: String,
}

#[async_trait]
impl MessagingPort for TwilioSender {
    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt> {
        let to = normalize_whatsapp_number(to);

        let Some((account_sid, auth_token)) = &self.credentials else {
            tracing::info!(%to, body, "MOCK: WhatsApp send");
            return Ok(SendReceipt {
                message_sid: format!("MOCK_{}", uuid::Uuid::new_v4().simple()),
                mock: true,
            });
        };

        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{account_sid}/Messages.json"
        );
        let params = [
            ("From", self.from_number.as_str()),
            ("To", to.as_str()),
            ("Body", body),
        ];

        let resp = self
            .http
            .post(&url)
            .basic_auth(account_sid, Some(auth_token))
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("twilio request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "twilio send failed: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let parsed: TwilioSendResponse = resp
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("twilio json error: {e}")))?;

        tracing::info!(sid = %parsed.sid, %to, "WhatsApp message sent");
        Ok(SendReceipt {
            message_sid: parsed.sid,
            mock: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_whatsapp_prefix() {
        assert_eq!(normalize_whatsapp_number("+15551234567"), "whatsapp:+15551234567");
        assert_eq!(
            normalize_whatsapp_number("whatsapp:+15551234567"),
            "whatsapp:+15551234567"
        );
    }

    #[test]
    fn validates_phone_numbers() {
        assert!(validate_phone_number("+15551234567"));
        assert!(validate_phone_number("whatsapp:+447700900123"));
        assert!(!validate_phone_number("15551234567"));
        assert!(!validate_phone_number("+0123"));
        assert!(!validate_phone_number("coffee"));
    }

    #[tokio::test]
    async fn mock_send_returns_synthetic_sid() {
        let sender = TwilioSender::new(None, None, "whatsapp:+14155238886", Duration::from_secs(5));
        assert!(sender.is_mock());

        let receipt = sender.send_text("+15551234567", "hi").await.unwrap();
        assert!(receipt.mock);
        assert!(receipt.message_sid.starts_with("MOCK_"));
    }
}
