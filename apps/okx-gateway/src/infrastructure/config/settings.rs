//! Gateway Configuration Settings
//!
//! Configuration types for the gateway, loaded from environment variables.
//! Every lookup goes through a `Fn(&str) -> Option<String>` so tests can
//! inject values without touching the process environment.

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::orders::DEFAULT_CL_ORD_ID_LENGTH;
use crate::domain::repository::RepositoryConfig;
use crate::infrastructure::okx::auth::Credentials;

/// Default public endpoint.
pub const DEFAULT_PUBLIC_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";

/// Default private endpoint.
pub const DEFAULT_PRIVATE_URL: &str = "wss://ws.okx.com:8443/ws/v5/private";

/// Keepalive traffic source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeepaliveMode {
    /// Text `ping` frames.
    #[default]
    Ping,
    /// Place and cancel orders on the keepalive instrument.
    Orders,
    /// No keepalive.
    Off,
}

impl KeepaliveMode {
    /// Parse mode from string; unknown values select `Ping`.
    #[must_use]
    pub fn from_str_case_insensitive(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "orders" => Self::Orders,
            "off" | "none" => Self::Off,
            _ => Self::Ping,
        }
    }

    /// Get the mode name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Orders => "orders",
            Self::Off => "off",
        }
    }
}

/// WebSocket endpoints.
#[derive(Debug, Clone)]
pub struct EndpointSettings {
    /// Public market data endpoint.
    pub public_url: String,
    /// Private account/order endpoint.
    pub private_url: String,
}

impl Default for EndpointSettings {
    fn default() -> Self {
        Self {
            public_url: DEFAULT_PUBLIC_URL.to_string(),
            private_url: DEFAULT_PRIVATE_URL.to_string(),
        }
    }
}

/// Traded instrument and tracked currencies.
#[derive(Debug, Clone)]
pub struct InstrumentSettings {
    /// Instrument ID.
    pub inst_id: String,
    /// Instrument type for private subscriptions.
    pub inst_type: String,
    /// Base currency.
    pub base_ccy: String,
    /// Quote currency.
    pub quote_ccy: String,
}

impl Default for InstrumentSettings {
    fn default() -> Self {
        Self {
            inst_id: "DOGE-USDT".to_string(),
            inst_type: "SPOT".to_string(),
            base_ccy: "DOGE".to_string(),
            quote_ccy: "USDT".to_string(),
        }
    }
}

/// History bounds and quote offset.
#[derive(Debug, Clone)]
pub struct HistorySettings {
    /// Trade history bound.
    pub trade_capacity: usize,
    /// Depth history bound.
    pub depth_capacity: usize,
    /// Mid-price history bound.
    pub mid_price_capacity: usize,
    /// Offset applied to synthetic quotes.
    pub quote_offset: f64,
}

impl Default for HistorySettings {
    fn default() -> Self {
        let repo = RepositoryConfig::default();
        Self {
            trade_capacity: repo.trade_capacity,
            depth_capacity: repo.depth_capacity,
            mid_price_capacity: repo.mid_price_capacity,
            quote_offset: repo.quote_offset,
        }
    }
}

/// Keepalive settings.
#[derive(Debug, Clone)]
pub struct KeepaliveSettings {
    /// Traffic source.
    pub mode: KeepaliveMode,
    /// Beat interval; also the hold time of keepalive orders.
    pub interval: Duration,
    /// Instrument reserved for keepalive orders.
    pub inst_id: String,
}

impl Default for KeepaliveSettings {
    fn default() -> Self {
        Self {
            mode: KeepaliveMode::Ping,
            interval: Duration::from_secs(8),
            inst_id: "ETH-USDT".to_string(),
        }
    }
}

/// Delays used by the binary.
#[derive(Debug, Clone)]
pub struct TimingSettings {
    /// Wait between login and the private subscribe.
    pub login_settle: Duration,
    /// Interval of the repository summary log.
    pub snapshot_interval: Duration,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            login_settle: Duration::from_millis(5_000),
            snapshot_interval: Duration::from_secs(30),
        }
    }
}

/// Complete gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Login credentials.
    pub credentials: Credentials,
    /// WebSocket endpoints.
    pub endpoints: EndpointSettings,
    /// Instrument settings.
    pub instrument: InstrumentSettings,
    /// History settings.
    pub history: HistorySettings,
    /// Keepalive settings.
    pub keepalive: KeepaliveSettings,
    /// Timing settings.
    pub timing: TimingSettings,
    /// Prometheus listener port (0 = disabled).
    pub metrics_port: u16,
    /// Length of generated client order IDs.
    pub cl_ord_id_length: usize,
}

impl GatewayConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from a dotenv file, with the process
    /// environment taking precedence over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or credentials are
    /// missing or empty.
    pub fn from_dotenv_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = dotenvy::from_path_iter(path)?.collect::<Result<HashMap<_, _>, _>>()?;
        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| file.get(key).cloned()))
    }

    /// Create configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing or empty.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_key = required(&lookup, "OKX_API_KEY")?;
        let secret_key = required(&lookup, "OKX_SECRET_KEY")?;
        let passphrase = required(&lookup, "OKX_PASSPHRASE")?;
        let credentials = Credentials::new(api_key, secret_key, passphrase)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let endpoints = EndpointSettings {
            public_url: lookup("OKX_PUBLIC_URL")
                .unwrap_or_else(|| EndpointSettings::default().public_url),
            private_url: lookup("OKX_PRIVATE_URL")
                .unwrap_or_else(|| EndpointSettings::default().private_url),
        };

        let instrument_defaults = InstrumentSettings::default();
        let instrument = InstrumentSettings {
            inst_id: lookup("OKX_INST_ID").unwrap_or(instrument_defaults.inst_id),
            inst_type: lookup("OKX_INST_TYPE").unwrap_or(instrument_defaults.inst_type),
            base_ccy: lookup("OKX_BASE_CCY").unwrap_or(instrument_defaults.base_ccy),
            quote_ccy: lookup("OKX_QUOTE_CCY").unwrap_or(instrument_defaults.quote_ccy),
        };

        let history = HistorySettings {
            trade_capacity: parse_or(
                &lookup,
                "GATEWAY_TRADE_HISTORY",
                HistorySettings::default().trade_capacity,
            ),
            depth_capacity: parse_or(
                &lookup,
                "GATEWAY_DEPTH_HISTORY",
                HistorySettings::default().depth_capacity,
            ),
            mid_price_capacity: parse_or(
                &lookup,
                "GATEWAY_MID_PRICE_HISTORY",
                HistorySettings::default().mid_price_capacity,
            ),
            quote_offset: parse_or(
                &lookup,
                "GATEWAY_QUOTE_OFFSET",
                HistorySettings::default().quote_offset,
            ),
        };

        let keepalive = KeepaliveSettings {
            mode: lookup("GATEWAY_KEEPALIVE_MODE")
                .map(|s| KeepaliveMode::from_str_case_insensitive(&s))
                .unwrap_or_default(),
            interval: parse_duration_secs(
                &lookup,
                "GATEWAY_KEEPALIVE_INTERVAL_SECS",
                KeepaliveSettings::default().interval,
            ),
            inst_id: lookup("OKX_KEEPALIVE_INST_ID")
                .unwrap_or_else(|| KeepaliveSettings::default().inst_id),
        };

        let timing = TimingSettings {
            login_settle: parse_duration_millis(
                &lookup,
                "GATEWAY_LOGIN_SETTLE_MS",
                TimingSettings::default().login_settle,
            ),
            snapshot_interval: parse_duration_secs(
                &lookup,
                "GATEWAY_SNAPSHOT_INTERVAL_SECS",
                TimingSettings::default().snapshot_interval,
            ),
        };

        require_nonzero("GATEWAY_KEEPALIVE_INTERVAL_SECS", keepalive.interval)?;
        require_nonzero("GATEWAY_SNAPSHOT_INTERVAL_SECS", timing.snapshot_interval)?;

        Ok(Self {
            credentials,
            endpoints,
            instrument,
            history,
            keepalive,
            timing,
            metrics_port: parse_or(&lookup, "GATEWAY_METRICS_PORT", 9090),
            cl_ord_id_length: parse_or(&lookup, "GATEWAY_CLORDID_LENGTH", DEFAULT_CL_ORD_ID_LENGTH),
        })
    }

    /// Repository bounds and tracked symbols.
    #[must_use]
    pub fn repository_config(&self) -> RepositoryConfig {
        RepositoryConfig {
            trade_capacity: self.history.trade_capacity,
            depth_capacity: self.history.depth_capacity,
            mid_price_capacity: self.history.mid_price_capacity,
            quote_offset: self.history.quote_offset,
            base_ccy: self.instrument.base_ccy.clone(),
            quote_ccy: self.instrument.quote_ccy.clone(),
            keepalive_inst_id: self.keepalive.inst_id.clone(),
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
    /// Values are present but rejected.
    #[error("invalid configuration: {0}")]
    Invalid(String),
    /// Dotenv file could not be read.
    #[error("failed to read dotenv file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, ConfigError> {
    let value = lookup(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))?;
    if value.is_empty() {
        return Err(ConfigError::EmptyValue(key.to_string()));
    }
    Ok(value)
}

fn parse_or<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn parse_duration_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

/// Periods feed `tokio::time::interval`, which rejects zero.
fn require_nonzero(key: &str, period: Duration) -> Result<(), ConfigError> {
    if period.is_zero() {
        return Err(ConfigError::Invalid(format!("{key} must be greater than zero")));
    }
    Ok(())
}

fn parse_duration_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Duration {
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const CREDS: [(&str, &str); 3] = [
        ("OKX_API_KEY", "key-1234"),
        ("OKX_SECRET_KEY", "secret"),
        ("OKX_PASSPHRASE", "pass"),
    ];

    #[test]
    fn keepalive_mode_parsing() {
        assert_eq!(KeepaliveMode::from_str_case_insensitive("ORDERS"), KeepaliveMode::Orders);
        assert_eq!(KeepaliveMode::from_str_case_insensitive("off"), KeepaliveMode::Off);
        assert_eq!(KeepaliveMode::from_str_case_insensitive("ping"), KeepaliveMode::Ping);
        assert_eq!(KeepaliveMode::from_str_case_insensitive("bogus"), KeepaliveMode::Ping);
    }

    #[test]
    fn missing_credentials() {
        let err = GatewayConfig::from_lookup(lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(k) if k == "OKX_API_KEY"));

        let err = GatewayConfig::from_lookup(lookup_from(&[
            ("OKX_API_KEY", "k"),
            ("OKX_SECRET_KEY", ""),
            ("OKX_PASSPHRASE", "p"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyValue(k) if k == "OKX_SECRET_KEY"));
    }

    #[test]
    fn defaults_apply() {
        let config = GatewayConfig::from_lookup(lookup_from(&CREDS)).unwrap();
        assert_eq!(config.endpoints.public_url, DEFAULT_PUBLIC_URL);
        assert_eq!(config.endpoints.private_url, DEFAULT_PRIVATE_URL);
        assert_eq!(config.instrument.inst_id, "DOGE-USDT");
        assert_eq!(config.history.trade_capacity, 100);
        assert_eq!(config.history.depth_capacity, 10);
        assert_eq!(config.history.mid_price_capacity, 20);
        assert!((config.history.quote_offset - 0.0005).abs() < f64::EPSILON);
        assert_eq!(config.keepalive.mode, KeepaliveMode::Ping);
        assert_eq!(config.keepalive.interval, Duration::from_secs(8));
        assert_eq!(config.timing.login_settle, Duration::from_secs(5));
        assert_eq!(config.timing.snapshot_interval, Duration::from_secs(30));
        assert_eq!(config.metrics_port, 9090);
        assert_eq!(config.cl_ord_id_length, 10);
        assert_eq!(config.repository_config(), RepositoryConfig::default());
    }

    #[test]
    fn zero_intervals_are_rejected() {
        for key in ["GATEWAY_KEEPALIVE_INTERVAL_SECS", "GATEWAY_SNAPSHOT_INTERVAL_SECS"] {
            let mut pairs = CREDS.to_vec();
            pairs.push((key, "0"));
            let err = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap_err();
            assert!(matches!(&err, ConfigError::Invalid(msg) if msg.contains(key)), "{err}");
        }

        let mut pairs = CREDS.to_vec();
        pairs.push(("GATEWAY_LOGIN_SETTLE_MS", "0"));
        let config = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap();
        assert!(config.timing.login_settle.is_zero());
    }

    #[test]
    fn overrides_and_malformed_values() {
        let mut pairs = CREDS.to_vec();
        pairs.extend([
            ("OKX_INST_ID", "BTC-USDT"),
            ("OKX_BASE_CCY", "BTC"),
            ("GATEWAY_TRADE_HISTORY", "50"),
            ("GATEWAY_DEPTH_HISTORY", "many"),
            ("GATEWAY_QUOTE_OFFSET", "0.01"),
            ("GATEWAY_KEEPALIVE_MODE", "orders"),
            ("GATEWAY_LOGIN_SETTLE_MS", "250"),
        ]);
        let config = GatewayConfig::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.instrument.inst_id, "BTC-USDT");
        assert_eq!(config.history.trade_capacity, 50);
        assert_eq!(config.history.depth_capacity, 10);
        assert_eq!(config.keepalive.mode, KeepaliveMode::Orders);
        assert_eq!(config.timing.login_settle, Duration::from_millis(250));

        let repo = config.repository_config();
        assert_eq!(repo.base_ccy, "BTC");
        assert!((repo.quote_offset - 0.01).abs() < f64::EPSILON);
    }

    #[test]
    fn credentials_redacted_in_debug() {
        let config = GatewayConfig::from_lookup(lookup_from(&CREDS)).unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("secret\""));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn loads_dotenv_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "OKX_API_KEY=file-key-0001").unwrap();
        writeln!(file, "OKX_SECRET_KEY=file-secret").unwrap();
        writeln!(file, "OKX_PASSPHRASE=file-pass").unwrap();
        writeln!(file, "GATEWAY_SNAPSHOT_INTERVAL_SECS=5").unwrap();
        writeln!(file, "OKX_KEEPALIVE_INST_ID=BTC-USDT-KA").unwrap();
        file.flush().unwrap();

        let config = GatewayConfig::from_dotenv_file(file.path()).unwrap();
        assert_eq!(config.timing.snapshot_interval, Duration::from_secs(5));
        assert_eq!(config.keepalive.inst_id, "BTC-USDT-KA");
    }

    #[test]
    fn missing_dotenv_file() {
        let err = GatewayConfig::from_dotenv_file("/nonexistent/okx-gateway.env").unwrap_err();
        assert!(matches!(err, ConfigError::DotEnv(_)));
    }
}
