//! Configuration Module
//!
//! Environment-driven configuration for the gateway.

mod settings;

pub use settings::{
    ConfigError, DEFAULT_PRIVATE_URL, DEFAULT_PUBLIC_URL, EndpointSettings, GatewayConfig,
    HistorySettings, InstrumentSettings, KeepaliveMode, KeepaliveSettings, TimingSettings,
};
