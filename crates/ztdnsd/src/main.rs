// # ztdnsd - Zero Trust DNS Daemon
//
// The ztdnsd daemon is a thin integration layer. It is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the Cloudflare client (directory, address lookup, record store)
// 4. Running the reconciliation engine once or on a fixed interval
//
// All reconciliation logic lives in ztdns-core.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Credentials (required)
// - `ZTDNS_ACCOUNT_ID`: Account owning the device inventory
// - `ZTDNS_ZONE_ID`: Zone the device hostnames are published in
// - `ZTDNS_API_TOKEN`: API token
//
// ### Engine
// - `ZTDNS_INTERVAL_SECS`: Seconds between cycles (default 300)
// - `ZTDNS_RESOLVE_CONCURRENCY`: Address lookups in flight (default 8)
// - `ZTDNS_MUTATION_CONCURRENCY`: Record writes in flight (default 1)
// - `ZTDNS_CYCLE_TIMEOUT_SECS`: Upper bound on one cycle (default 120)
// - `ZTDNS_RECORD_TTL`: TTL of written records (default 300)
//
// ### Runtime
// - `ZTDNS_LOG_LEVEL`: trace, debug, info, warn, error (default info)
// - `ZTDNS_RUN_ONCE`: Run a single cycle and exit (1/true/yes)
// - `ZTDNS_MODE`: `live` (default) or `dry-run` (reads only, writes are logged)
//
// ## Example
//
// ```bash
// export ZTDNS_ACCOUNT_ID=023e105f4ecef8ad9ca31a8372d0c353
// export ZTDNS_ZONE_ID=9a7806061c88ada191ed06f989cc3dac
// export ZTDNS_API_TOKEN=your_token
// export ZTDNS_MODE=dry-run
//
// ztdnsd
// ```

use anyhow::Result;
use std::env;
use std::process::ExitCode;
use std::str::FromStr;
use tokio::sync::{mpsc, oneshot};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;
use ztdns_core::{EngineConfig, EngineEvent, Error as CoreError, ReconciliationEngine, SyncConfig};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ZtdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (fatal cycle error, failed writes in run-once mode)
    RuntimeError = 2,
}

impl From<ZtdnsExitCode> for ExitCode {
    fn from(code: ZtdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Whether writes are sent or only logged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Live,
    DryRun,
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "live" => Ok(Mode::Live),
            "dry-run" | "dryrun" | "dry_run" => Ok(Mode::DryRun),
            other => anyhow::bail!(
                "ZTDNS_MODE '{}' is not valid. Valid modes: live, dry-run",
                other
            ),
        }
    }
}

/// Application configuration
#[derive(Debug)]
struct Config {
    sync: SyncConfig,
    log_level: String,
    run_once: bool,
    mode: Mode,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = EngineConfig::default();

        let engine = EngineConfig {
            record_ttl: parse_var(&lookup, "ZTDNS_RECORD_TTL", defaults.record_ttl)?,
            resolve_concurrency: parse_var(
                &lookup,
                "ZTDNS_RESOLVE_CONCURRENCY",
                defaults.resolve_concurrency,
            )?,
            mutation_concurrency: parse_var(
                &lookup,
                "ZTDNS_MUTATION_CONCURRENCY",
                defaults.mutation_concurrency,
            )?,
            cycle_interval_secs: parse_var(
                &lookup,
                "ZTDNS_INTERVAL_SECS",
                defaults.cycle_interval_secs,
            )?,
            cycle_timeout_secs: parse_var(
                &lookup,
                "ZTDNS_CYCLE_TIMEOUT_SECS",
                defaults.cycle_timeout_secs,
            )?,
            ..defaults
        };

        let mut sync = SyncConfig::new(
            lookup("ZTDNS_ACCOUNT_ID").unwrap_or_default(),
            lookup("ZTDNS_ZONE_ID").unwrap_or_default(),
            lookup("ZTDNS_API_TOKEN").unwrap_or_default(),
        );
        sync.engine = engine;

        Ok(Self {
            sync,
            log_level: lookup("ZTDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            run_once: lookup("ZTDNS_RUN_ONCE").is_some_and(|v| is_truthy(&v)),
            mode: lookup("ZTDNS_MODE")
                .map(|v| v.parse())
                .transpose()?
                .unwrap_or(Mode::Live),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if let Err(e) = self.sync.validate() {
            anyhow::bail!(
                "{}. Required: ZTDNS_ACCOUNT_ID, ZTDNS_ZONE_ID, ZTDNS_API_TOKEN",
                e
            );
        }

        // Check for obvious placeholder tokens (common mistake)
        let token_lower = self.sync.api_token.to_lowercase();
        if token_lower.contains("your_token") || token_lower.contains("replace_me") {
            anyhow::bail!(
                "ZTDNS_API_TOKEN appears to be a placeholder. \
                Use an actual API token with device and DNS permissions."
            );
        }

        self.level()?;
        Ok(())
    }

    /// Parse the configured log level
    fn level(&self) -> Result<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(Level::TRACE),
            "debug" => Ok(Level::DEBUG),
            "info" => Ok(Level::INFO),
            "warn" => Ok(Level::WARN),
            "error" => Ok(Level::ERROR),
            _ => anyhow::bail!(
                "ZTDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }
    }
}

/// Parse an optional variable, falling back to a default when unset
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) if raw.trim().is_empty() => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, raw, e)),
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ZtdnsExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return ZtdnsExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = config.level().unwrap_or(Level::INFO);
    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return ZtdnsExitCode::ConfigError.into();
    }

    info!("Starting ztdnsd daemon");
    debug!("Configuration: {:?}", config);

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return ZtdnsExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        match run_daemon(config).await {
            Ok(()) => ZtdnsExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {}", e);
                exit_code_for(&e)
            }
        }
    });

    result.into()
}

/// Pick the exit code for a failed run
///
/// Settings rejected by the engine or the provider after startup exit as
/// configuration errors. Aborted cycles (fatal core errors, timeouts) and
/// failed writes are runtime errors.
fn exit_code_for(err: &anyhow::Error) -> ZtdnsExitCode {
    match err.downcast_ref::<CoreError>() {
        Some(CoreError::Config(_)) => ZtdnsExitCode::ConfigError,
        Some(e) if e.is_fatal() => {
            warn!("Reconciliation cycle aborted; nothing after the failing step ran");
            ZtdnsExitCode::RuntimeError
        }
        _ => ZtdnsExitCode::RuntimeError,
    }
}

/// Build the engine over the Cloudflare client
#[cfg(feature = "cloudflare")]
fn build_engine(config: &Config) -> Result<(ReconciliationEngine, mpsc::Receiver<EngineEvent>)> {
    use ztdns_provider_cloudflare::CloudflareClient;

    let client = CloudflareClient::new(config.sync.api_token.clone(), config.mode == Mode::DryRun)?;
    if client.is_dry_run() {
        warn!("Running in dry-run mode: DNS records will not be modified");
    }

    let (engine, events) = ReconciliationEngine::new(
        Box::new(client.clone()),
        Box::new(client.clone()),
        Box::new(client),
        config.sync.engine.clone(),
    )?;
    Ok((engine, events))
}

#[cfg(not(feature = "cloudflare"))]
fn build_engine(_config: &Config) -> Result<(ReconciliationEngine, mpsc::Receiver<EngineEvent>)> {
    anyhow::bail!("ztdnsd was built without a DNS provider; enable the `cloudflare` feature")
}

/// Run the daemon
async fn run_daemon(config: Config) -> Result<()> {
    let (engine, mut events) = build_engine(&config)?;

    // Drain engine events so the channel never fills up
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            debug!("Engine event: {:?}", event);
        }
    });

    let account_id = config.sync.account_id.as_str();
    let zone_id = config.sync.zone_id.as_str();

    if config.run_once {
        info!("Running a single reconciliation cycle");
        let report = engine.run_cycle_with_timeout(account_id, zone_id).await?;
        let failed = report.summary().failed;
        if failed > 0 {
            anyhow::bail!("{} record write(s) failed", failed);
        }
        return Ok(());
    }

    info!(
        "Reconciling every {}s (timeout {}s)",
        config.sync.engine.cycle_interval_secs, config.sync.engine.cycle_timeout_secs
    );

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    tokio::spawn(async move {
        match wait_for_shutdown().await {
            Ok(signal) => info!("Received shutdown signal: {}", signal),
            Err(e) => error!("Shutdown error: {}", e),
        }
        let _ = shutdown_tx.send(());
    });

    engine
        .run_with_shutdown(account_id, zone_id, Some(shutdown_rx))
        .await?;

    info!("Shutting down daemon");
    Ok(())
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    let received = tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    };
    Ok(received)
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}
