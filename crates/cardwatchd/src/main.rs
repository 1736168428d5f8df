// # cardwatchd - Board Change Notifier Daemon
//
// This is a THIN integration layer. Change detection, pacing, and
// persistence all live in cardwatch-core.
//
// The cardwatchd daemon is responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Building the Trello board source, the messaging notifier and the
//    snapshot store
// 4. Running the poll engine next to the liveness endpoint
// 5. Shutting both down on SIGTERM/SIGINT
//
// ## Configuration
//
// ### Board (required)
// - `TRELLO_API_KEY`: Trello API key
// - `TRELLO_API_TOKEN`: Trello API token
// - `BOARD_ID`: Board to watch
//
// ### Messaging
// - `API_KEY`: Bearer key for the messaging API (required)
// - `PHONE_NUMBER`: Destination number (required)
// - `API_URL`: Messaging API base URL
//
// ### Process
// - `PORT`: Liveness endpoint port (default 3000)
// - `APP_ENV`: Environment name, logged at startup
//
// ### Engine & State
// - `CARDWATCH_POLL_INTERVAL_SECS`, `CARDWATCH_RETRY_DELAY_SECS`,
//   `CARDWATCH_NOTIFY_DELAY_SECS`
// - `CARDWATCH_STATE_STORE_TYPE` (file, memory), `CARDWATCH_STATE_PATH`,
//   `CARDWATCH_MARKER_PATH`, `CARDWATCH_ON_CORRUPT_SNAPSHOT`
// - `CARDWATCH_DRY_RUN`, `CARDWATCH_SERVICE_NAME`, `CARDWATCH_LOG_LEVEL`
//
// ## Example
//
// ```bash
// export TRELLO_API_KEY=...
// export TRELLO_API_TOKEN=...
// export BOARD_ID=5f1c...
// export API_KEY=...
// export PHONE_NUMBER=5511999990000
// export CARDWATCH_STATE_PATH=/var/lib/cardwatch/trello-state.json
//
// cardwatchd
// ```

mod liveness;

use anyhow::{Context, Result};
use cardwatch_board_trello::TrelloBoardSource;
use cardwatch_core::config::{BoardConfig, NotifierConfig};
use cardwatch_core::{
    CorruptSnapshotPolicy, EngineConfig, EngineEvent, FileSnapshotStore, MemorySnapshotStore,
    PollEngine, SnapshotStore, StateStoreConfig, WatchConfig,
};
use cardwatch_notify_http::HttpNotifier;
use std::env;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// How long the engine gets to finish its current step after a signal
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

/// Variables that must be present and non-empty
const REQUIRED_VARS: &[&str] = &[
    "TRELLO_API_KEY",
    "TRELLO_API_TOKEN",
    "BOARD_ID",
    "API_KEY",
    "PHONE_NUMBER",
];

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DaemonExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DaemonExitCode> for ExitCode {
    fn from(code: DaemonExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration, read once from the environment
struct Config {
    trello_api_key: String,
    trello_api_token: String,
    board_id: String,
    api_url: Option<String>,
    api_key: String,
    phone_number: String,
    port: u16,
    app_env: String,
    poll_interval_secs: u64,
    retry_delay_secs: Option<u64>,
    notify_delay_secs: u64,
    state_store_type: String,
    state_path: String,
    marker_path: Option<String>,
    on_corrupt_snapshot: String,
    dry_run: bool,
    service_name: String,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    ///
    /// Empty values count as absent. All missing required variables are
    /// reported together.
    fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let missing: Vec<&str> = REQUIRED_VARS
            .iter()
            .copied()
            .filter(|name| var(*name).is_none())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing required environment variables: {}. \
                Set them in the environment or your service manager.",
                missing.join(", ")
            );
        }

        let required = |name: &str| var(name).unwrap_or_default();

        Ok(Self {
            trello_api_key: required("TRELLO_API_KEY"),
            trello_api_token: required("TRELLO_API_TOKEN"),
            board_id: required("BOARD_ID"),
            api_url: var("API_URL"),
            api_key: required("API_KEY"),
            phone_number: required("PHONE_NUMBER"),
            port: parse_var(&var, "PORT")?.unwrap_or(3000),
            app_env: var("APP_ENV").unwrap_or_else(|| "development".to_string()),
            poll_interval_secs: parse_var(&var, "CARDWATCH_POLL_INTERVAL_SECS")?.unwrap_or(30),
            retry_delay_secs: parse_var(&var, "CARDWATCH_RETRY_DELAY_SECS")?,
            notify_delay_secs: parse_var(&var, "CARDWATCH_NOTIFY_DELAY_SECS")?.unwrap_or(2),
            state_store_type: var("CARDWATCH_STATE_STORE_TYPE")
                .unwrap_or_else(|| "file".to_string()),
            state_path: var("CARDWATCH_STATE_PATH")
                .unwrap_or_else(|| "trello-state.json".to_string()),
            marker_path: var("CARDWATCH_MARKER_PATH"),
            on_corrupt_snapshot: var("CARDWATCH_ON_CORRUPT_SNAPSHOT")
                .unwrap_or_else(|| "treat_as_empty".to_string()),
            dry_run: match var("CARDWATCH_DRY_RUN") {
                Some(value) => parse_bool("CARDWATCH_DRY_RUN", &value)?,
                None => false,
            },
            service_name: var("CARDWATCH_SERVICE_NAME")
                .unwrap_or_else(|| "trello-monitor".to_string()),
            log_level: var("CARDWATCH_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the configuration
    ///
    /// Everything the daemon would otherwise discover at runtime is checked
    /// here, before any network activity.
    fn validate(&self) -> Result<()> {
        match self.state_store_type.as_str() {
            "file" | "memory" => {}
            _ => anyhow::bail!(
                "CARDWATCH_STATE_STORE_TYPE '{}' is not supported. \
                Supported types: file, memory",
                self.state_store_type
            ),
        }

        if !(1..=86_400).contains(&self.poll_interval_secs) {
            anyhow::bail!(
                "CARDWATCH_POLL_INTERVAL_SECS must be between 1 and 86400 seconds. Got: {}",
                self.poll_interval_secs
            );
        }

        if let Some(retry_delay) = self.retry_delay_secs
            && !(1..=86_400).contains(&retry_delay)
        {
            anyhow::bail!(
                "CARDWATCH_RETRY_DELAY_SECS must be between 1 and 86400 seconds. Got: {}",
                retry_delay
            );
        }

        if self.notify_delay_secs > 300 {
            anyhow::bail!(
                "CARDWATCH_NOTIFY_DELAY_SECS must be at most 300 seconds. Got: {}",
                self.notify_delay_secs
            );
        }

        if self.port == 0 {
            anyhow::bail!("PORT must be between 1 and 65535");
        }

        if let Some(ref url) = self.api_url
            && url.starts_with("http://")
        {
            eprintln!(
                "WARNING: API_URL uses HTTP (not HTTPS). \
                The messaging API key will be sent in clear text."
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "CARDWATCH_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        self.watch_config()?
            .validate()
            .context("Invalid configuration")?;

        Ok(())
    }

    /// Convert to the library configuration
    fn watch_config(&self) -> Result<WatchConfig> {
        let on_corrupt_snapshot: CorruptSnapshotPolicy = self
            .on_corrupt_snapshot
            .parse()
            .context("CARDWATCH_ON_CORRUPT_SNAPSHOT")?;

        let mut notifier = NotifierConfig::new(&self.api_key, &self.phone_number);
        if let Some(ref url) = self.api_url {
            notifier.api_url = url.clone();
        }
        notifier.dry_run = self.dry_run;

        let state_store = match self.state_store_type.as_str() {
            "memory" => StateStoreConfig::Memory,
            _ => StateStoreConfig::File {
                path: self.state_path.clone(),
                marker_path: self.marker_path.clone(),
            },
        };

        Ok(WatchConfig {
            board: BoardConfig::new(&self.trello_api_key, &self.trello_api_token, &self.board_id),
            notifier,
            state_store,
            engine: EngineConfig {
                poll_interval_secs: self.poll_interval_secs,
                retry_delay_secs: self.retry_delay_secs,
                notify_delay_secs: self.notify_delay_secs,
                on_corrupt_snapshot,
                ..EngineConfig::default()
            },
        })
    }

    fn log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }
}

fn parse_var<T, F>(var: &F, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    var(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", name, value, e))
        })
        .transpose()
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("{} must be true or false. Got: {}", name, other),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DaemonExitCode::ConfigError.into();
        }
    };

    // Validate configuration
    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {:#}", e);
        return DaemonExitCode::ConfigError.into();
    }

    // Initialize tracing
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level())
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DaemonExitCode::ConfigError.into();
    }

    info!("Starting cardwatchd daemon ({} environment)", config.app_env);
    info!(
        "Watching board {} every {}s",
        config.board_id, config.poll_interval_secs
    );

    // Enter tokio runtime
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DaemonExitCode::RuntimeError.into();
        }
    };

    let result = rt.block_on(async {
        if let Err(e) = run_daemon(config).await {
            error!("Daemon error: {:#}", e);
            DaemonExitCode::RuntimeError
        } else {
            DaemonExitCode::CleanShutdown
        }
    });

    result.into()
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(config: Config) -> Result<()> {
    let watch_config = config.watch_config()?;

    let board = TrelloBoardSource::new(&watch_config.board)?;
    let notifier = HttpNotifier::new(&watch_config.notifier)?;
    let store = build_store(&watch_config.state_store).await?;

    info!("State store type: {}", watch_config.state_store.type_name());

    let (engine, events) =
        PollEngine::new(Box::new(board), Box::new(notifier), store, &watch_config.engine)?;

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], config.port)))
        .await
        .with_context(|| format!("Failed to bind liveness endpoint on port {}", config.port))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = tokio::spawn(liveness::serve(
        listener,
        config.service_name.clone(),
        liveness::shutdown_requested(shutdown_rx.clone()),
    ));
    let event_log = tokio::spawn(log_events(events));
    let mut engine_task = tokio::spawn(async move { engine.run(shutdown_rx).await });

    info!("Daemon initialized successfully");

    tokio::select! {
        signal = wait_for_shutdown_signal() => {
            let signal = signal?;
            info!("Received shutdown signal: {}", signal);
        }
        result = &mut engine_task => {
            // The engine only returns on its own if something went badly wrong
            let _ = shutdown_tx.send(true);
            let _ = server.await;
            return match result {
                Ok(Ok(())) => Err(anyhow::anyhow!("Poll engine stopped unexpectedly")),
                Ok(Err(e)) => Err(e.into()),
                Err(e) => Err(anyhow::anyhow!("Poll engine task failed: {}", e)),
            };
        }
    }

    info!("Shutting down daemon");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, server).await {
        Ok(Ok(Ok(()))) => info!("Liveness endpoint closed"),
        Ok(Ok(Err(e))) => warn!("Liveness endpoint error during shutdown: {}", e),
        Ok(Err(e)) => warn!("Liveness endpoint task failed: {}", e),
        Err(_) => warn!("Liveness endpoint did not close within {:?}", SHUTDOWN_TIMEOUT),
    }

    match tokio::time::timeout(SHUTDOWN_TIMEOUT, engine_task).await {
        Ok(Ok(Ok(()))) => info!("Poll engine stopped"),
        Ok(Ok(Err(e))) => return Err(e.into()),
        Ok(Err(e)) => anyhow::bail!("Poll engine task failed: {}", e),
        Err(_) => anyhow::bail!("Shutdown timeout after {:?}", SHUTDOWN_TIMEOUT),
    }

    // The engine dropped its sender, so the log task drains and ends
    let _ = event_log.await;
    Ok(())
}

/// Build the configured snapshot store
async fn build_store(config: &StateStoreConfig) -> Result<Box<dyn SnapshotStore>> {
    match config {
        StateStoreConfig::File { path, .. } => {
            let marker = config
                .resolved_marker_path()
                .context("File store without marker path")?;
            let store = FileSnapshotStore::new(path, &marker).await?;
            info!(
                "Snapshot file: {} (marker: {})",
                store.path().display(),
                store.marker_path().display()
            );
            Ok(Box::new(store))
        }
        StateStoreConfig::Memory => {
            warn!("Using in-memory state store: every restart is a first run");
            Ok(Box::new(MemorySnapshotStore::new()))
        }
    }
}

/// Forward engine events to the log
async fn log_events(mut events: mpsc::Receiver<EngineEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            EngineEvent::Started {
                board_source,
                notifier,
            } => debug!("Engine started (board: {}, notifier: {})", board_source, notifier),
            EngineEvent::CycleCompleted(outcome) => debug!("Cycle completed: {:?}", outcome),
            EngineEvent::NotificationFailed { card_id, error } => {
                debug!("Notification for card {} failed: {}", card_id, error)
            }
            EngineEvent::Stopped { reason } => debug!("Engine stopped: {}", reason),
        }
    }
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
///
/// # Returns
///
/// Returns the name of the signal received.
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for shutdown signals (SIGINT only)
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to wait for CTRL-C: {}", e))?;
    Ok("SIGINT")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_vars() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("TRELLO_API_KEY", "trello-key"),
            ("TRELLO_API_TOKEN", "trello-token"),
            ("BOARD_ID", "board-1"),
            ("API_KEY", "messaging-key"),
            ("PHONE_NUMBER", "5511999990000"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config> {
        Config::from_lookup(|name| vars.get(name).map(|value| value.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&base_vars()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.app_env, "development");
        assert_eq!(config.service_name, "trello-monitor");
        assert!(!config.dry_run);

        let watch = config.watch_config().unwrap();
        assert_eq!(watch.engine.poll_interval_secs, 30);
        assert_eq!(watch.engine.notify_delay_secs, 2);
        assert_eq!(watch.engine.retry_delay(), Duration::from_secs(30));
        assert_eq!(watch.notifier.api_url, "https://api-krolik.telezapy.tech");
        assert_eq!(
            watch.state_store.resolved_marker_path(),
            Some(std::path::PathBuf::from(".initialized"))
        );
        match watch.state_store {
            StateStoreConfig::File { path, marker_path } => {
                assert_eq!(path, "trello-state.json");
                assert_eq!(marker_path, None);
            }
            other => panic!("expected file store, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_variables_are_listed_together() {
        let mut vars = base_vars();
        vars.remove("BOARD_ID");
        vars.insert("PHONE_NUMBER", "   ");

        let err = load(&vars).err().unwrap().to_string();
        assert!(err.contains("BOARD_ID"));
        assert!(err.contains("PHONE_NUMBER"));
        assert!(!err.contains("TRELLO_API_KEY"));
    }

    #[test]
    fn test_overrides() {
        let mut vars = base_vars();
        vars.extend([
            ("PORT", "8080"),
            ("API_URL", "https://messaging.example.test"),
            ("CARDWATCH_POLL_INTERVAL_SECS", "60"),
            ("CARDWATCH_RETRY_DELAY_SECS", "10"),
            ("CARDWATCH_NOTIFY_DELAY_SECS", "0"),
            ("CARDWATCH_STATE_STORE_TYPE", "memory"),
            ("CARDWATCH_ON_CORRUPT_SNAPSHOT", "rebaseline"),
            ("CARDWATCH_DRY_RUN", "true"),
        ]);

        let config = load(&vars).unwrap();
        config.validate().unwrap();
        let watch = config.watch_config().unwrap();

        assert_eq!(config.port, 8080);
        assert!(watch.notifier.dry_run);
        assert_eq!(watch.notifier.api_url, "https://messaging.example.test");
        assert_eq!(watch.engine.retry_delay(), Duration::from_secs(10));
        assert_eq!(watch.engine.notify_delay(), Duration::ZERO);
        assert_eq!(
            watch.engine.on_corrupt_snapshot,
            CorruptSnapshotPolicy::Rebaseline
        );
        assert!(matches!(watch.state_store, StateStoreConfig::Memory));
    }

    #[test]
    fn test_unparseable_number_rejected() {
        let mut vars = base_vars();
        vars.insert("CARDWATCH_POLL_INTERVAL_SECS", "thirty");

        let err = load(&vars).err().unwrap().to_string();
        assert!(err.contains("CARDWATCH_POLL_INTERVAL_SECS"));
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let cases = [
            ("CARDWATCH_STATE_STORE_TYPE", "redis"),
            ("CARDWATCH_POLL_INTERVAL_SECS", "0"),
            ("CARDWATCH_LOG_LEVEL", "verbose"),
            ("CARDWATCH_ON_CORRUPT_SNAPSHOT", "panic"),
            ("API_URL", "ftp://messaging.example.test"),
            ("PORT", "0"),
        ];

        for (name, value) in cases {
            let mut vars = base_vars();
            vars.insert(name, value);
            let config = load(&vars).unwrap();
            assert!(config.validate().is_err(), "{}={} should be rejected", name, value);
        }
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("X", "TRUE").unwrap());
        assert!(parse_bool("X", "1").unwrap());
        assert!(!parse_bool("X", "off").unwrap());
        assert!(parse_bool("X", "maybe").is_err());
    }

    #[test]
    fn test_log_level_mapping() {
        let mut vars = base_vars();
        vars.insert("CARDWATCH_LOG_LEVEL", "DEBUG");
        let config = load(&vars).unwrap();
        config.validate().unwrap();
        assert_eq!(config.log_level(), Level::DEBUG);
    }

    #[tokio::test]
    async fn test_build_memory_store() {
        let store = build_store(&StateStoreConfig::Memory).await.unwrap();
        assert!(store.is_first_run().await);
    }

    #[tokio::test]
    async fn test_build_file_store_uses_default_marker() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let config = StateStoreConfig::File {
            path: path.to_string_lossy().into_owned(),
            marker_path: None,
        };

        let store = build_store(&config).await.unwrap();
        store.mark_initialized().await.unwrap();
        assert!(dir.path().join("nested").join(".initialized").exists());
    }
}
