//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the OKX WebSocket adapters, including the
//! [`CommandSink`](crate::application::ports::CommandSink) implementation,
//! plus configuration, telemetry and metrics.

/// OKX v5 WebSocket adapters (codec, auth, routing, connection).
pub mod okx;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber and OpenTelemetry integration.
pub mod telemetry;
