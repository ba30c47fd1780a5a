//! Prometheus Metrics Module
//!
//! Exposes gateway metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Frames**: pushes received per channel, decode errors, unrouted pushes
//! - **Connections**: open sessions, read/write errors, subscriptions
//! - **Orders**: commands sent, submit failures, order table size
//!
//! Recording functions are no-ops until [`init_metrics`] installs a recorder,
//! so library code and tests can call them freely.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::domain::subscription::Channel;

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Errors installing the metrics recorder.
#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    /// Recorder or exporter could not be built.
    #[error("failed to build Prometheus recorder: {0}")]
    Build(#[from] BuildError),

    /// A global recorder is already installed.
    #[error("failed to install Prometheus recorder: {0}")]
    Install(String),
}

/// Install the Prometheus recorder.
///
/// With a non-zero `port`, an HTTP listener serves `/metrics` on
/// `0.0.0.0:port`; it must be called inside a tokio runtime.
///
/// # Errors
///
/// Returns [`MetricsError`] if the recorder or listener cannot be installed.
pub fn init_metrics(port: u16) -> Result<PrometheusHandle, MetricsError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let builder = PrometheusBuilder::new();
    let handle = if port == 0 {
        builder.install_recorder()?
    } else {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        let (recorder, exporter) = builder.with_http_listener(addr).build()?;
        let handle = recorder.handle();
        metrics::set_global_recorder(recorder).map_err(|e| MetricsError::Install(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = exporter.await {
                tracing::error!(error = ?e, "Metrics exporter stopped");
            }
        });
        handle
    };

    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "okx_gateway_pushes_received_total",
        "Push messages dispatched to handlers, by channel"
    );
    describe_counter!(
        "okx_gateway_decode_errors_total",
        "Frames dropped because they could not be decoded"
    );
    describe_counter!(
        "okx_gateway_unrouted_pushes_total",
        "Pushes dropped for an unknown channel or missing handler"
    );

    describe_gauge!(
        "okx_gateway_websocket_connections",
        "Open WebSocket sessions by connection"
    );
    describe_gauge!(
        "okx_gateway_subscriptions",
        "Subscriptions sent per connection"
    );
    describe_counter!(
        "okx_gateway_read_errors_total",
        "WebSocket read errors by connection"
    );
    describe_counter!(
        "okx_gateway_write_errors_total",
        "WebSocket write errors by connection"
    );

    describe_counter!(
        "okx_gateway_commands_sent_total",
        "Order batch commands written, by operation"
    );
    describe_counter!(
        "okx_gateway_command_orders_total",
        "Orders carried by written batch commands, by operation"
    );
    describe_counter!(
        "okx_gateway_submit_failures_total",
        "Order batch commands that failed to send, by operation"
    );
    describe_gauge!(
        "okx_gateway_order_table_size",
        "Entries in the order table"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record a push dispatched on `channel`.
pub fn record_push(channel: Channel) {
    counter!("okx_gateway_pushes_received_total", "channel" => channel.as_str()).increment(1);
}

/// Record a frame that failed to decode.
pub fn record_decode_error(connection: &str) {
    counter!("okx_gateway_decode_errors_total", "connection" => connection.to_string())
        .increment(1);
}

/// Record a push that could not be routed.
pub fn record_unrouted(reason: &'static str) {
    counter!("okx_gateway_unrouted_pushes_total", "reason" => reason).increment(1);
}

/// Mark a connection as open.
pub fn connection_opened(connection: &str) {
    gauge!("okx_gateway_websocket_connections", "connection" => connection.to_string()).set(1.0);
}

/// Mark a connection as closed.
pub fn connection_closed(connection: &str) {
    gauge!("okx_gateway_websocket_connections", "connection" => connection.to_string()).set(0.0);
}

/// Record the number of subscriptions sent on a connection.
#[allow(clippy::cast_precision_loss)]
pub fn set_subscriptions(connection: &str, count: usize) {
    gauge!("okx_gateway_subscriptions", "connection" => connection.to_string())
        .set(count as f64);
}

/// Record a read error.
pub fn record_read_error(connection: &str) {
    counter!("okx_gateway_read_errors_total", "connection" => connection.to_string())
        .increment(1);
}

/// Record a write error.
pub fn record_write_error(connection: &str) {
    counter!("okx_gateway_write_errors_total", "connection" => connection.to_string())
        .increment(1);
}

/// Record a batch command carrying `orders` entries.
pub fn record_command(op: &'static str, orders: usize) {
    counter!("okx_gateway_commands_sent_total", "op" => op).increment(1);
    counter!("okx_gateway_command_orders_total", "op" => op).increment(orders as u64);
}

/// Record a batch command that failed to send.
pub fn record_submit_failure(op: &'static str) {
    counter!("okx_gateway_submit_failures_total", "op" => op).increment(1);
}

/// Update the order table size.
#[allow(clippy::cast_precision_loss)]
pub fn set_order_table_size(size: usize) {
    gauge!("okx_gateway_order_table_size").set(size as f64);
}

// =============================================================================
// Tests
// =============================================================================
