//! Delayed Cancel Scheduler
//!
//! Post-then-cancel: a cancel batch that fires after a fixed delay unless
//! aborted first. Each scheduled cancel is a tokio task racing a
//! `tokio::time::sleep` against a child [`CancellationToken`], so tests can
//! drive it with paused time and `tokio::time::advance`.
//!
//! The cancel fires regardless of what the order table says at that point;
//! the pipeline resolves placeholders that are still `Local` and the
//! exchange ignores targets that are already gone.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::orders::{OrderPipeline, SubmitError};
use crate::domain::orders::{CancelOrder, PlaceOrder};

/// How a scheduled cancel ended.
#[derive(Debug)]
pub enum CancelOutcome {
    /// Cancel batch written; carries the request ID.
    Sent(String),
    /// Cancel batch could not be written.
    Failed(SubmitError),
    /// Aborted before the delay elapsed.
    Aborted,
}

/// Handle to one pending cancel.
#[derive(Debug)]
pub struct ScheduledCancel {
    token: CancellationToken,
    handle: JoinHandle<CancelOutcome>,
}

impl ScheduledCancel {
    /// Stop the cancel from firing. No effect once it has fired.
    pub fn abort(&self) {
        self.token.cancel();
    }

    /// Whether the task has completed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the cancel to fire or be aborted.
    pub async fn wait(self) -> CancelOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "Scheduled cancel task did not complete");
                CancelOutcome::Aborted
            }
        }
    }
}

/// Schedules delayed cancel batches on one pipeline.
#[derive(Debug)]
pub struct CancelScheduler {
    pipeline: OrderPipeline,
    shutdown: CancellationToken,
}

impl CancelScheduler {
    /// Create a scheduler whose pending cancels stop when `parent` is cancelled.
    #[must_use]
    pub fn new(pipeline: OrderPipeline, parent: &CancellationToken) -> Self {
        Self {
            pipeline,
            shutdown: parent.child_token(),
        }
    }

    /// Send `cancels` after `delay`.
    #[must_use]
    pub fn schedule(&self, cancels: Vec<CancelOrder>, delay: Duration) -> ScheduledCancel {
        let token = self.shutdown.child_token();
        let task_token = token.clone();
        let pipeline = self.pipeline.clone();

        let handle = tokio::spawn(async move {
            tokio::select! {
                () = task_token.cancelled() => {
                    tracing::debug!(cancels = cancels.len(), "Scheduled cancel aborted");
                    CancelOutcome::Aborted
                }
                () = tokio::time::sleep(delay) => {
                    match pipeline.cancel_batch(&cancels).await {
                        Ok(request_id) => CancelOutcome::Sent(request_id),
                        Err(e) => CancelOutcome::Failed(e),
                    }
                }
            }
        });

        ScheduledCancel { token, handle }
    }

    /// Place `orders` and schedule a cancel for every one of them.
    ///
    /// # Errors
    ///
    /// Returns [`SubmitError`] if the place batch fails; nothing is scheduled.
    pub async fn place_with_timeout(
        &self,
        orders: &[PlaceOrder],
        delay: Duration,
    ) -> Result<ScheduledCancel, SubmitError> {
        self.pipeline.place_batch(orders).await?;
        let cancels = orders.iter().map(PlaceOrder::cancel).collect();
        Ok(self.schedule(cancels, delay))
    }

    /// Abort every cancel still pending on this scheduler.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::application::ports::{CommandSink, SendError};
    use crate::domain::orders::{Side, TradeMode};
    use crate::domain::repository::StateRepository;

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CommandSink for RecordingSink {
        async fn send_text(&self, frame: String) -> Result<(), SendError> {
            self.frames.lock().push(frame);
            Ok(())
        }
    }

    fn setup() -> (Arc<StateRepository>, Arc<RecordingSink>, CancelScheduler) {
        let repo = Arc::new(StateRepository::default());
        let sink = Arc::new(RecordingSink::default());
        let pipeline = OrderPipeline::new(Arc::clone(&repo), Arc::clone(&sink) as Arc<dyn CommandSink>);
        let scheduler = CancelScheduler::new(pipeline, &CancellationToken::new());
        (repo, sink, scheduler)
    }

    fn cancel(id: &str) -> CancelOrder {
        CancelOrder::by_client_id("DOGE-USDT", id)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let (_repo, sink, scheduler) = setup();
        let scheduled = scheduler.schedule(vec![cancel("A")], Duration::from_secs(2));

        tokio::time::advance(Duration::from_millis(1_999)).await;
        tokio::task::yield_now().await;
        assert!(sink.frames.lock().is_empty());

        let outcome = scheduled.wait().await;
        assert!(matches!(outcome, CancelOutcome::Sent(_)));
        let frames = sink.frames.lock();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("batch-cancel-orders"));
    }

    #[tokio::test(start_paused = true)]
    async fn abort_prevents_cancel() {
        let (_repo, sink, scheduler) = setup();
        let scheduled = scheduler.schedule(vec![cancel("A")], Duration::from_secs(2));

        tokio::time::advance(Duration::from_secs(1)).await;
        scheduled.abort();

        assert!(matches!(scheduled.wait().await, CancelOutcome::Aborted));
        tokio::time::advance(Duration::from_secs(5)).await;
        assert!(sink.frames.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_aborts_pending() {
        let (_repo, sink, scheduler) = setup();
        let first = scheduler.schedule(vec![cancel("A")], Duration::from_secs(2));
        let second = scheduler.schedule(vec![cancel("B")], Duration::from_secs(3));

        scheduler.shutdown();

        assert!(matches!(first.wait().await, CancelOutcome::Aborted));
        assert!(matches!(second.wait().await, CancelOutcome::Aborted));
        assert!(sink.frames.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn place_with_timeout_resolves_unconfirmed_orders() {
        let (repo, sink, scheduler) = setup();
        let orders = [PlaceOrder::limit(
            "DOGE-USDT",
            TradeMode::Cash,
            "P1",
            Side::Sell,
            "10",
            "0.08",
        )];

        let scheduled = scheduler
            .place_with_timeout(&orders, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(repo.order("P1").is_some_and(|o| o.is_local()));

        assert!(matches!(scheduled.wait().await, CancelOutcome::Sent(_)));
        assert!(repo.order("P1").is_none());

        let frames = sink.frames.lock();
        assert_eq!(frames.len(), 2);
        assert!(frames[0].contains("batch-orders"));
        assert!(frames[1].contains(r#""clOrdId":"P1""#));
    }
}
