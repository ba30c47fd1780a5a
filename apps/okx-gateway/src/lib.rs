#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! OKX Gateway - Venue Connectivity Layer
//!
//! Maintains OKX v5 WebSocket sessions, folds pushed market, account,
//! position and order data into one lock-guarded repository, and submits
//! batched order commands with race-free local bookkeeping.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Venue state and rules
//!   - `market`: trades, top-5 depth, synthetic quotes, weighted mid
//!   - `account`: balances and long/short position projections
//!   - `orders`: order lifecycle, order table, order commands
//!   - `subscription`: channels and routing keys
//!   - `repository`: the single-lock state aggregate
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: `CommandSink` outbound frame writer
//!   - `services`: order pipeline, delayed cancels, keepalive
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `okx`: codec, login signing, subscription registry, connection
//!   - `config`: environment configuration
//!   - `telemetry`, `metrics`: observability
//!
//! # Data Flow
//!
//! ```text
//! public WS  ──► Connection ──► Router ──► handler ──┐
//!                                                    ├──► StateRepository ◄── drivers
//! private WS ──► Connection ──► Router ──► handler ──┘           │
//!      ▲                                                         │
//!      └──────────── CommandSink ◄── OrderPipeline ◄─────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Venue state types with no network dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::market::{BoundedHistory, DepthSnapshot, Quotes, Trade};
pub use domain::orders::{
    CancelOrder, ClientOrderId, OrderRecord, OrderState, PlaceOrder, Side, TrackedOrder, TradeMode,
};
pub use domain::repository::{RepositoryConfig, RepositorySnapshot, StateRepository};
pub use domain::subscription::{Channel, RoutingKey, SubscriptionArg};

// Application services
pub use application::ports::{CommandSink, SendError};
pub use application::services::{
    CancelOutcome, CancelScheduler, KeepaliveDriver, KeepalivePolicy, OrderPingPong,
    OrderPipeline, ScheduledCancel, SubmitError, TextPing,
};

// OKX adapters
pub use infrastructure::okx::{
    AuthError, CodecError, Connection, ConnectionError, Credentials, RoutingError,
    SubscriptionRegistry, repository_handler,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, GatewayConfig, KeepaliveMode};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
