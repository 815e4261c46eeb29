//! Background cache refresh: a startup staleness check shortly after boot,
//! then a periodic recompute so WhatsApp queries mostly hit a warm cache.

use std::{sync::Arc, time::Duration};

use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{domain::MerchantId, sales::SalesService};

const STARTUP_DELAY: Duration = Duration::from_secs(30);

pub struct RefreshTask {
    sales: Arc<SalesService>,
    merchant: MerchantId,
    interval: Duration,
    startup_delay: Duration,
}

impl RefreshTask {
    pub fn new(sales: Arc<SalesService>, merchant: MerchantId, interval: Duration) -> Self {
        Self {
            sales,
            merchant,
            interval,
            startup_delay: STARTUP_DELAY,
        }
    }

    #[cfg(test)]
    fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Spawn the refresh loop. Failures are logged and retried on the next
    /// tick; nothing here is fatal to the process.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = sleep(self.startup_delay) => {}
            }
            self.startup_check().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(self.interval) => {}
                }
                if let Err(err) = self.sales.refresh(&self.merchant).await {
                    tracing::error!(merchant = %self.merchant, error = %err, "scheduled refresh failed");
                }
            }

            tracing::info!("refresh task stopped");
        })
    }

    async fn startup_check(&self) {
        match self.sales.cache_status(&self.merchant).await {
            Ok(status) if status.fresh => {
                tracing::info!(merchant = %self.merchant, "startup check: cache is fresh");
            }
            Ok(_) => {
                tracing::info!(merchant = %self.merchant, "startup check: cache stale, refreshing");
                if let Err(err) = self.sales.refresh(&self.merchant).await {
                    tracing::error!(merchant = %self.merchant, error = %err, "startup refresh failed");
                }
            }
            Err(err) => {
                tracing::error!(merchant = %self.merchant, error = %err, "startup cache check failed");
            }
        }
    }
}
