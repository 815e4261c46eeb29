use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    domain::{MerchantId, Order},
    Result,
};

/// Hexagonal port for the POS provider.
///
/// Clover is the first implementation; the shape is deliberately small so a
/// Square/Toast adapter could sit behind it unchanged.
#[async_trait]
pub trait PosPort: Send + Sync {
    /// Fetch orders for the merchant in the `[start, end]` window.
    async fn fetch_orders(
        &self,
        merchant: &MerchantId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Order>>;
}

/// Hexagonal port for a text-completion backend.
#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Result of an outbound send, mock or real.
#[derive(Clone, Debug)]
pub struct SendReceipt {
    pub message_sid: String,
    pub mock: bool,
}

/// Hexagonal port for the outbound messaging provider (Twilio WhatsApp).
#[async_trait]
pub trait MessagingPort: Send + Sync {
    async fn send_text(&self, to: &str, body: &str) -> Result<SendReceipt>;
}
