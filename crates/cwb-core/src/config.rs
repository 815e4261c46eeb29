use std::{env, fs, path::Path, time::Duration};

use crate::domain::MerchantId;
use crate::Result;

/// Which response-generation strategy to construct at startup.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResponderKind {
    /// Ask the configured LLM to phrase the answer (falls back to templates).
    Llm,
    /// Deterministic fixed-template strings only.
    Template,
}

/// Typed configuration for the assistant.
///
/// Missing provider credentials never fail startup: the affected adapter runs
/// in mock/disabled mode instead, so the process always comes up.
#[derive(Clone, Debug)]
pub struct Config {
    // Storage
    pub database_url: String,

    // Twilio WhatsApp
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_whatsapp_number: String,

    // Clover POS
    pub clover_base_url: String,
    pub clover_access_token: Option<String>,
    pub merchant_id: MerchantId,

    // LLM
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub responder: ResponderKind,

    // Cache / refresh
    pub stale_after: Duration,
    pub lookback_days: u32,
    pub refresh_interval: Duration,

    // HTTP server
    pub http_host: String,
    pub http_port: u16,
    pub http_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let database_url =
            env_str("DATABASE_URL").unwrap_or_else(|| "sqlite::memory:".to_string());

        let twilio_account_sid = env_str("TWILIO_ACCOUNT_SID").and_then(non_empty);
        let twilio_auth_token = env_str("TWILIO_AUTH_TOKEN").and_then(non_empty);
        let twilio_whatsapp_number = env_str("TWILIO_WHATSAPP_NUMBER")
            .and_then(non_empty)
            .unwrap_or_else(|| "whatsapp:+14155238886".to_string());

        let clover_base_url = env_str("CLOVER_API_BASE_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| "https://sandbox.dev.clover.com".to_string());
        let clover_access_token = env_str("CLOVER_ACCESS_TOKEN").and_then(non_empty);
        let merchant_id = MerchantId(
            env_str("CLOVER_MERCHANT_ID")
                .and_then(non_empty)
                .unwrap_or_else(|| "TEST_MERCHANT_001".to_string()),
        );

        let openai_api_key = env_str("OPENAI_API_KEY").and_then(non_empty);
        let openai_model = env_str("OPENAI_MODEL")
            .and_then(non_empty)
            .unwrap_or_else(|| "gpt-4.1-mini".to_string());

        // Default strategy follows key availability; `RESPONDER` overrides.
        let responder = match env_str("RESPONDER").as_deref().map(str::trim) {
            Some("llm") => ResponderKind::Llm,
            Some("template") => ResponderKind::Template,
            _ if openai_api_key.is_some() => ResponderKind::Llm,
            _ => ResponderKind::Template,
        };

        let stale_after =
            Duration::from_secs(env_u64("CACHE_STALE_MINUTES").unwrap_or(24 * 60) * 60);
        let lookback_days = env_u32("SALES_LOOKBACK_DAYS").unwrap_or(7).max(1);
        let refresh_interval =
            Duration::from_secs(env_u64("REFRESH_INTERVAL_MINUTES").unwrap_or(24 * 60) * 60);

        let http_host = env_str("HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let http_port = env_u16("HTTP_PORT").unwrap_or(8080);
        let http_timeout = Duration::from_secs(env_u64("HTTP_TIMEOUT_SECS").unwrap_or(10));

        Ok(Self {
            database_url,
            twilio_account_sid,
            twilio_auth_token,
            twilio_whatsapp_number,
            clover_base_url,
            clover_access_token,
            merchant_id,
            openai_api_key,
            openai_model,
            responder,
            stale_after,
            lookback_days,
            refresh_interval,
            http_host,
            http_port,
            http_timeout,
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_u32(key: &str) -> Option<u32> {
    env_str(key).and_then(|s| s.trim().parse::<u32>().ok())
}

fn env_u16(key: &str) -> Option<u16> {
    env_str(key).and_then(|s| s.trim().parse::<u16>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}
