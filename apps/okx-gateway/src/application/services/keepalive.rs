//! Keepalive Policies
//!
//! The private endpoint drops sessions that stay idle for about 30 seconds.
//! A [`KeepalivePolicy`] produces periodic traffic; [`KeepaliveDriver`]
//! runs one on a fixed interval until cancelled.
//!
//! - [`TextPing`]: the protocol's text `ping` frame
//! - [`OrderPingPong`]: two far-from-market limit buys on the keepalive
//!   instrument, held for a while and then cancelled
//!
//! A failed beat is logged and retried on the next tick.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::orders::{OrderPipeline, SubmitError};
use crate::application::ports::{CommandSink, SendError};
use crate::domain::orders::{
    CancelOrder, ClientOrderId, DEFAULT_CL_ORD_ID_LENGTH, PlaceOrder, Side, TradeMode,
};

/// Text frame the server answers with `pong`.
pub const PING_FRAME: &str = "ping";

/// Errors from one keepalive beat.
#[derive(Debug, thiserror::Error)]
pub enum KeepaliveError {
    /// Ping frame could not be written.
    #[error("keepalive ping failed: {0}")]
    Send(#[from] SendError),

    /// Keepalive orders could not be submitted.
    #[error("keepalive orders failed: {0}")]
    Submit(#[from] SubmitError),
}

/// Source of periodic keepalive traffic.
#[async_trait]
pub trait KeepalivePolicy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Produce one round of traffic.
    async fn beat(&self) -> Result<(), KeepaliveError>;
}

// =============================================================================
// Text Ping
// =============================================================================

/// Sends the text `ping` frame.
pub struct TextPing {
    sink: Arc<dyn CommandSink>,
}

impl TextPing {
    /// Ping through `sink`.
    #[must_use]
    pub fn new(sink: Arc<dyn CommandSink>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl KeepalivePolicy for TextPing {
    fn name(&self) -> &'static str {
        "text_ping"
    }

    async fn beat(&self) -> Result<(), KeepaliveError> {
        self.sink.send_text(PING_FRAME.to_string()).await?;
        Ok(())
    }
}

// =============================================================================
// Order Ping-Pong
// =============================================================================

/// Size of each keepalive order.
pub const KEEPALIVE_ORDER_SIZE: &str = "0.01";

/// Limit price of each keepalive order, far below the market.
pub const KEEPALIVE_ORDER_PRICE: &str = "200";

/// Places and cancels a pair of harmless orders on the keepalive instrument.
pub struct OrderPingPong {
    pipeline: OrderPipeline,
    inst_id: String,
    prefix: String,
    hold: Duration,
}

impl OrderPingPong {
    /// Orders on `inst_id`, cancelled `hold` after placing.
    ///
    /// Client IDs are a random prefix followed by `PING` and `PONG`.
    #[must_use]
    pub fn new(pipeline: OrderPipeline, inst_id: impl Into<String>, hold: Duration) -> Self {
        Self {
            pipeline,
            inst_id: inst_id.into(),
            prefix: ClientOrderId::generate(DEFAULT_CL_ORD_ID_LENGTH),
            hold,
        }
    }

    /// Use a fixed client ID prefix.
    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Client IDs of the two orders.
    #[must_use]
    pub fn client_ids(&self) -> [String; 2] {
        [format!("{}PING", self.prefix), format!("{}PONG", self.prefix)]
    }

    fn orders(&self) -> Vec<PlaceOrder> {
        self.client_ids()
            .into_iter()
            .map(|id| {
                PlaceOrder::limit(
                    self.inst_id.clone(),
                    TradeMode::Cash,
                    id,
                    Side::Buy,
                    KEEPALIVE_ORDER_SIZE,
                    KEEPALIVE_ORDER_PRICE,
                )
            })
            .collect()
    }
}

#[async_trait]
impl KeepalivePolicy for OrderPingPong {
    fn name(&self) -> &'static str {
        "order_ping_pong"
    }

    async fn beat(&self) -> Result<(), KeepaliveError> {
        let orders = self.orders();
        self.pipeline.place_batch(&orders).await?;

        tokio::time::sleep(self.hold).await;

        let cancels: Vec<CancelOrder> = orders.iter().map(PlaceOrder::cancel).collect();
        self.pipeline.cancel_batch(&cancels).await?;
        Ok(())
    }
}

// =============================================================================
// Driver
// =============================================================================

/// Runs a policy on a fixed interval.
pub struct KeepaliveDriver {
    policy: Arc<dyn KeepalivePolicy>,
    interval: Duration,
    cancel: CancellationToken,
}

impl KeepaliveDriver {
    /// Create a driver; the first beat happens immediately.
    #[must_use]
    pub fn new(
        policy: Arc<dyn KeepalivePolicy>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            policy,
            interval,
            cancel,
        }
    }

    /// Beat until cancelled. A beat in progress runs to completion.
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        tracing::info!(
            policy = self.policy.name(),
            interval_secs = self.interval.as_secs(),
            "Keepalive started"
        );

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    tracing::debug!(policy = self.policy.name(), "Keepalive cancelled");
                    break;
                }
                _ = interval.tick() => {
                    match self.policy.beat().await {
                        Ok(()) => tracing::trace!(policy = self.policy.name(), "Keepalive beat"),
                        Err(e) => tracing::warn!(
                            policy = self.policy.name(),
                            error = %e,
                            "Keepalive beat failed"
                        ),
                    }
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
