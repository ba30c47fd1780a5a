//! Order Action Pipeline
//!
//! Turns a driver's place/cancel intent into batched commands while keeping
//! the order table consistent with confirmations still in flight.
//!
//! # Ordering
//!
//! Repository bookkeeping always finishes before the command is written:
//!
//! - place: insert `Local` placeholders, then send
//! - cancel: drop placeholders that are still `Local`, then send
//!
//! A cancel issued before the exchange has confirmed the place therefore
//! resolves locally, and a later `live` push for the same ID re-creates the
//! entry until the exchange's `canceled` push removes it.
//!
//! The repository lock and the connection's write lock are never held at
//! the same time.

use std::sync::Arc;

use uuid::Uuid;

use crate::application::ports::{CommandSink, SendError, encode_frame};
use crate::domain::orders::{CANCEL_BATCH_OP, CancelOrder, OrderBatch, PLACE_BATCH_OP, PlaceOrder};
use crate::domain::repository::StateRepository;
use crate::infrastructure::metrics;

/// Errors submitting a batch. Recoverable: the connection stays usable.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// Place batch could not be written.
    #[error("place batch {request_id} failed: {source}")]
    Place {
        /// Request ID of the batch.
        request_id: String,
        /// Underlying write error.
        #[source]
        source: SendError,
    },

    /// Cancel batch could not be written.
    #[error("cancel batch {request_id} failed: {source}")]
    Cancel {
        /// Request ID of the batch.
        request_id: String,
        /// Underlying write error.
        #[source]
        source: SendError,
    },
}

impl SubmitError {
    /// Request ID of the failed batch.
    #[must_use]
    pub fn request_id(&self) -> &str {
        match self {
            Self::Place { request_id, .. } | Self::Cancel { request_id, .. } => request_id,
        }
    }
}

/// Place and cancel order batches against one command sink.
#[derive(Clone)]
pub struct OrderPipeline {
    repository: Arc<StateRepository>,
    sink: Arc<dyn CommandSink>,
}

impl OrderPipeline {
    /// Create a pipeline writing through `sink`.
    #[must_use]
    pub fn new(repository: Arc<StateRepository>, sink: Arc<dyn CommandSink>) -> Self {
        Self { repository, sink }
    }

    /// Track and send a place batch. Returns the request ID.
    ///
    /// Orders on the keepalive instrument are sent but not tracked. If the
    /// write fails, placeholders from this batch that are still `Local` are
    /// removed before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Place`] if the batch cannot be encoded or written.
    pub async fn place_batch(&self, orders: &[PlaceOrder]) -> Result<String, SubmitError> {
        let request_id = new_request_id();

        // 1. Placeholders first
        let tracked: Vec<&str> = orders
            .iter()
            .filter(|o| !self.repository.is_keepalive_instrument(&o.inst_id))
            .map(|o| o.cl_ord_id.as_str())
            .collect();
        self.repository.track_local(tracked.iter().copied());

        // 2. Then the command
        let batch = OrderBatch {
            id: &request_id,
            op: PLACE_BATCH_OP,
            args: orders,
        };
        if let Err(source) = self.send(&batch).await {
            let rolled_back = self.repository.resolve_local(tracked.iter().copied());
            metrics::record_submit_failure(PLACE_BATCH_OP);
            tracing::error!(
                request_id = %request_id,
                orders = orders.len(),
                rolled_back = rolled_back.len(),
                error = %source,
                "Place batch failed"
            );
            return Err(SubmitError::Place { request_id, source });
        }

        metrics::record_command(PLACE_BATCH_OP, orders.len());
        metrics::set_order_table_size(self.repository.order_count());
        tracing::debug!(request_id = %request_id, orders = orders.len(), "Place batch sent");
        Ok(request_id)
    }

    /// Resolve local placeholders and send a cancel batch. Returns the request ID.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError::Cancel`] if the batch cannot be encoded or written.
    pub async fn cancel_batch(&self, cancels: &[CancelOrder]) -> Result<String, SubmitError> {
        let request_id = new_request_id();

        // 1. Unconfirmed placements cancel locally
        let resolved = self
            .repository
            .resolve_local(cancels.iter().map(|c| c.cl_ord_id.as_str()));
        for cl_ord_id in &resolved {
            tracing::debug!(request_id = %request_id, cl_ord_id = %cl_ord_id, "Resolved local placeholder");
        }

        // 2. Then the command
        let batch = OrderBatch {
            id: &request_id,
            op: CANCEL_BATCH_OP,
            args: cancels,
        };
        if let Err(source) = self.send(&batch).await {
            metrics::record_submit_failure(CANCEL_BATCH_OP);
            tracing::error!(
                request_id = %request_id,
                cancels = cancels.len(),
                error = %source,
                "Cancel batch failed"
            );
            return Err(SubmitError::Cancel { request_id, source });
        }

        metrics::record_command(CANCEL_BATCH_OP, cancels.len());
        metrics::set_order_table_size(self.repository.order_count());
        tracing::debug!(request_id = %request_id, cancels = cancels.len(), "Cancel batch sent");
        Ok(request_id)
    }

    async fn send<A: serde::Serialize>(&self, batch: &OrderBatch<'_, A>) -> Result<(), SendError> {
        let frame = encode_frame(batch)?;
        self.sink.send_text(frame).await
    }
}

impl std::fmt::Debug for OrderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderPipeline")
            .field("orders", &self.repository.order_count())
            .finish_non_exhaustive()
    }
}

fn new_request_id() -> String {
    Uuid::new_v4().simple().to_string()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ports::MockCommandSink;
    use crate::domain::orders::{OrderRecord, OrderState, Side, TradeMode};
    use crate::domain::repository::RepositoryConfig;
    use tokio_test::{assert_err, assert_ok};

    fn repository() -> Arc<StateRepository> {
        Arc::new(StateRepository::new(RepositoryConfig::default()))
    }

    fn order(inst_id: &str, cl_ord_id: &str) -> PlaceOrder {
        PlaceOrder::limit(inst_id, TradeMode::Cash, cl_ord_id, Side::Buy, "10", "0.07")
    }

    fn record(cl_ord_id: &str, state: OrderState) -> OrderRecord {
        OrderRecord {
            inst_id: "DOGE-USDT".to_string(),
            cl_ord_id: cl_ord_id.to_string(),
            state,
            ..OrderRecord::default()
        }
    }

    fn accepting_sink() -> Arc<dyn CommandSink> {
        let mut sink = MockCommandSink::new();
        sink.expect_send_text().returning(|_| Ok(()));
        Arc::new(sink)
    }

    fn failing_sink() -> Arc<dyn CommandSink> {
        let mut sink = MockCommandSink::new();
        sink.expect_send_text()
            .returning(|_| Err(SendError::Transport("broken pipe".to_string())));
        Arc::new(sink)
    }

    #[tokio::test]
    async fn place_tracks_before_sending() {
        let repo = repository();
        let observed = Arc::clone(&repo);
        let mut sink = MockCommandSink::new();
        sink.expect_send_text().times(1).returning(move |frame| {
            assert!(observed.order("A").is_some_and(|o| o.is_local()));
            assert!(frame.contains(r#""op":"batch-orders""#));
            assert!(frame.contains(r#""clOrdId":"A""#));
            Ok(())
        });

        let pipeline = OrderPipeline::new(Arc::clone(&repo), Arc::new(sink));
        let request_id = pipeline.place_batch(&[order("DOGE-USDT", "A")]).await.unwrap();

        assert_eq!(request_id.len(), 32);
        assert_eq!(repo.order("A").unwrap().state, OrderState::Local);
    }

    #[tokio::test]
    async fn place_skips_keepalive_instrument() {
        let repo = repository();
        let pipeline = OrderPipeline::new(Arc::clone(&repo), accepting_sink());

        pipeline
            .place_batch(&[order("ETH-USDT", "PING"), order("DOGE-USDT", "B")])
            .await
            .unwrap();

        assert!(repo.order("PING").is_none());
        assert!(repo.order("B").is_some());
    }

    #[tokio::test]
    async fn place_then_cancel_leaves_no_entry() {
        let repo = repository();
        let pipeline = OrderPipeline::new(Arc::clone(&repo), accepting_sink());
        let placed = order("DOGE-USDT", "C");

        assert_ok!(pipeline.place_batch(std::slice::from_ref(&placed)).await);
        assert_ok!(pipeline.cancel_batch(&[placed.cancel()]).await);

        assert!(repo.order("C").is_none());
    }

    #[tokio::test]
    async fn cancel_keeps_confirmed_orders() {
        let repo = repository();
        repo.on_orders(vec![record("D", OrderState::Live)]);
        let pipeline = OrderPipeline::new(Arc::clone(&repo), accepting_sink());

        pipeline
            .cancel_batch(&[CancelOrder::by_client_id("DOGE-USDT", "D")])
            .await
            .unwrap();
        assert_eq!(repo.order("D").unwrap().state, OrderState::Live);

        repo.on_orders(vec![record("D", OrderState::Canceled)]);
        assert!(repo.order("D").is_none());
    }

    #[tokio::test]
    async fn cancel_of_absent_order_is_sent() {
        let mut sink = MockCommandSink::new();
        sink.expect_send_text()
            .withf(|frame| frame.contains(r#""op":"batch-cancel-orders""#))
            .times(1)
            .returning(|_| Ok(()));
        let pipeline = OrderPipeline::new(repository(), Arc::new(sink));

        assert_ok!(
            pipeline
                .cancel_batch(&[CancelOrder::by_client_id("DOGE-USDT", "gone")])
                .await
        );
    }

    #[tokio::test]
    async fn failed_place_rolls_back_placeholders() {
        let repo = repository();
        let pipeline = OrderPipeline::new(Arc::clone(&repo), failing_sink());

        let err = pipeline
            .place_batch(&[order("DOGE-USDT", "E")])
            .await
            .unwrap_err();

        assert!(matches!(err, SubmitError::Place { .. }));
        assert_eq!(err.request_id().len(), 32);
        assert!(repo.order("E").is_none());
        assert_eq!(repo.order_count(), 0);
    }

    #[tokio::test]
    async fn failed_cancel_is_recoverable() {
        let repo = repository();
        let pipeline = OrderPipeline::new(Arc::clone(&repo), failing_sink());

        let err = assert_err!(
            pipeline
                .cancel_batch(&[CancelOrder::by_client_id("DOGE-USDT", "F")])
                .await
        );
        assert!(matches!(err, SubmitError::Cancel { source: SendError::Transport(_), .. }));
    }
}
