//! OKX Gateway Binary
//!
//! Opens the public and private OKX sessions, feeds the state repository
//! and keeps the private session alive.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin okx-gateway
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `OKX_API_KEY`, `OKX_SECRET_KEY`, `OKX_PASSPHRASE`: API credentials
//!
//! ## Optional
//! - `OKX_PUBLIC_URL`, `OKX_PRIVATE_URL`: WebSocket endpoints
//! - `OKX_INST_ID`: Traded instrument (default: DOGE-USDT)
//! - `OKX_INST_TYPE`: Instrument type (default: SPOT)
//! - `OKX_BASE_CCY`, `OKX_QUOTE_CCY`: Tracked currencies (default: DOGE, USDT)
//! - `GATEWAY_KEEPALIVE_MODE`: ping | orders | off (default: ping)
//! - `GATEWAY_KEEPALIVE_INTERVAL_SECS`: Keepalive cadence (default: 8)
//! - `GATEWAY_LOGIN_SETTLE_MS`: Wait before private subscribe (default: 5000)
//! - `GATEWAY_METRICS_PORT`: Prometheus port, 0 disables the listener (default: 9090)
//! - `OTEL_ENABLED`: Enable OpenTelemetry export (default: false)
//! - `RUST_LOG`: Log filter (default: okx_gateway=info)

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use okx_gateway::application::ports::CommandSink;
use okx_gateway::infrastructure::telemetry;
use okx_gateway::{
    Channel, ClientOrderId, Connection, GatewayConfig, KeepaliveDriver, KeepaliveMode,
    KeepalivePolicy, OrderPingPong, OrderPipeline, StateRepository, TextPing, init_metrics,
    repository_handler,
};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let telemetry_guard = telemetry::init().context("failed to initialize telemetry")?;

    tracing::info!(
        otel = telemetry_guard.is_exporting(),
        "Starting OKX gateway"
    );

    let config = GatewayConfig::from_env().context("failed to load configuration")?;
    log_config(&config);

    let _metrics_handle =
        init_metrics(config.metrics_port).context("failed to initialize metrics")?;

    let shutdown_token = CancellationToken::new();
    let repository = Arc::new(StateRepository::new(config.repository_config()));
    let instrument = &config.instrument;

    // Public session: market data
    let mut public = Connection::open("public", &config.endpoints.public_url)
        .await?
        .with_shutdown(shutdown_token.child_token());
    for channel in [Channel::Trades, Channel::Books5] {
        public.subscribe(
            channel,
            "",
            "",
            &instrument.inst_id,
            repository_handler(Arc::clone(&repository)),
        );
    }
    let public = Arc::new(public);
    let public_task = public.spawn_receive_loop();
    public.run().await?;

    // Private session: login, then account, positions and orders
    let mut private = Connection::open("private", &config.endpoints.private_url)
        .await?
        .with_shutdown(shutdown_token.child_token());
    private.authenticate(&config.credentials).await?;
    private.subscribe(
        Channel::Account,
        "",
        "",
        "",
        repository_handler(Arc::clone(&repository)),
    );
    for channel in [Channel::Positions, Channel::Orders] {
        private.subscribe(
            channel,
            &instrument.inst_type,
            "",
            &instrument.inst_id,
            repository_handler(Arc::clone(&repository)),
        );
    }
    let private = Arc::new(private);
    let private_task = private.spawn_receive_loop();

    tokio::time::sleep(config.timing.login_settle).await;
    private.run().await?;

    let keepalive_task = spawn_keepalive(
        &config,
        &repository,
        &private,
        shutdown_token.child_token(),
    );
    let snapshot_task = tokio::spawn(log_snapshots(
        Arc::clone(&repository),
        config.timing.snapshot_interval,
        shutdown_token.child_token(),
    ));

    tokio::select! {
        () = await_shutdown() => {}
        result = watch_receive_loop("public", public_task) => result,
        result = watch_receive_loop("private", private_task) => result,
    }

    shutdown_token.cancel();
    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );

    let drain = async {
        if let Some(task) = keepalive_task {
            let _ = task.await;
        }
        let _ = snapshot_task.await;
        public.close().await;
        private.close().await;
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, drain).await.is_err() {
        tracing::warn!("Shutdown timed out");
    }

    tracing::info!("OKX gateway stopped");
    drop(telemetry_guard);
    Ok(())
}

/// Start the configured keepalive policy on the private session.
fn spawn_keepalive(
    config: &GatewayConfig,
    repository: &Arc<StateRepository>,
    private: &Arc<Connection>,
    cancel: CancellationToken,
) -> Option<JoinHandle<()>> {
    let sink: Arc<dyn CommandSink> = Arc::clone(private) as Arc<dyn CommandSink>;
    let policy: Arc<dyn KeepalivePolicy> = match config.keepalive.mode {
        KeepaliveMode::Off => {
            tracing::info!("Keepalive disabled");
            return None;
        }
        KeepaliveMode::Ping => Arc::new(TextPing::new(sink)),
        KeepaliveMode::Orders => {
            let pipeline = OrderPipeline::new(Arc::clone(repository), sink);
            Arc::new(
                OrderPingPong::new(
                    pipeline,
                    config.keepalive.inst_id.clone(),
                    config.keepalive.interval,
                )
                .with_prefix(ClientOrderId::generate(config.cl_ord_id_length)),
            )
        }
    };

    let driver = KeepaliveDriver::new(policy, config.keepalive.interval, cancel);
    Some(tokio::spawn(driver.run()))
}

/// Log a repository summary on a fixed interval.
async fn log_snapshots(
    repository: Arc<StateRepository>,
    every: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let snapshot = repository.snapshot();
                tracing::info!(
                    bid = ?snapshot.quotes.map(|q| q.bid),
                    ask = ?snapshot.quotes.map(|q| q.ask),
                    mid = ?snapshot.latest_mid,
                    base = %snapshot.balances.base,
                    quote = %snapshot.balances.quote,
                    long = ?snapshot.long.as_ref().map(|p| p.pos.as_str()),
                    short = ?snapshot.short.as_ref().map(|p| p.pos.as_str()),
                    orders = snapshot.open_orders,
                    trades = snapshot.trade_count,
                    depth = snapshot.depth_count,
                    warm = snapshot.warm,
                    "Repository snapshot"
                );
            }
        }
    }
}

/// Wait for a receive loop to end and report why.
async fn watch_receive_loop(
    label: &str,
    task: JoinHandle<Result<(), okx_gateway::ConnectionError>>,
) {
    match task.await {
        Ok(Ok(())) => tracing::info!(connection = label, "Receive loop stopped"),
        Ok(Err(e)) => tracing::error!(connection = label, error = %e, "Receive loop ended"),
        Err(e) => tracing::error!(connection = label, error = %e, "Receive loop task failed"),
    }
}

/// Log the parsed configuration.
fn log_config(config: &GatewayConfig) {
    tracing::info!(
        inst_id = %config.instrument.inst_id,
        inst_type = %config.instrument.inst_type,
        keepalive = config.keepalive.mode.as_str(),
        keepalive_interval_secs = config.keepalive.interval.as_secs(),
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        public_url = %config.endpoints.public_url,
        private_url = %config.endpoints.private_url,
        credentials = ?config.credentials,
        "WebSocket endpoints"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for a shutdown signal (SIGTERM or SIGINT).
async fn await_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
