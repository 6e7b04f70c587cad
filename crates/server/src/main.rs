mod api;
mod metrics;
mod state;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use castkeeper_core::{
    create_post_processor, load_config, normalize_config, validate_config, CaptureContext,
    CaptureJobFactory, CaptureTool, Config, CsvWhitelistStore, Dispatcher, FileHistoryLog,
    HelixClient, LivenessProber, PostProcessMode, PostProcessor, Reconciler, ReconcilerConfig,
    StreamlinkCapture,
};

use api::create_router;
use state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Record whitelisted broadcasters as soon as they go live.
#[derive(Debug, Parser)]
#[command(name = "castkeeper", version, about)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "CASTKEEPER_CONFIG", default_value = "config.toml")]
    config: PathBuf,

    /// Category to watch (overrides recorder.category)
    #[arg(short = 'g', long)]
    game: Option<String>,

    /// Stream language code (overrides recorder.language)
    #[arg(long)]
    language: Option<String>,

    /// Streamlink quality list (overrides capture.quality)
    #[arg(short, long)]
    quality: Option<String>,

    /// Log level, used when RUST_LOG is unset
    #[arg(short, long, value_enum, ignore_case = true, default_value_t = LogLevel::Info)]
    log: LogLevel,

    /// Also write logs to this file, rotated daily
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Move finished captures instead of repairing them with ffmpeg
    #[arg(long)]
    disable_ffmpeg: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(game) = &self.game {
            config.recorder.category = game.clone();
        }
        if let Some(language) = &self.language {
            config.recorder.language = language.clone();
        }
        if let Some(quality) = &self.quality {
            config.capture.quality = quality.clone();
        }
        if self.disable_ffmpeg {
            config.postprocess.mode = PostProcessMode::Move;
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = match init_logging(cli.log, cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(level: LogLevel, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("{},tower_http=info", level.as_directive())))
        .context("Invalid log filter")?;

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .with_context(|| format!("Log file path {:?} has no file name", path))?;
            let appender = tracing_appender::rolling::daily(dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

async fn run(cli: Cli) -> Result<()> {
    // Load configuration
    info!("Loading configuration from {:?}", cli.config);
    let mut config = load_config(&cli.config)
        .with_context(|| format!("Failed to load config from {:?}", cli.config))?;
    cli.apply(&mut config);

    // Normalize and validate configuration
    normalize_config(&mut config).context("Configuration validation failed")?;
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).context("Failed to serialize config")?;
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    let config_hash_short = config_hash[..16].to_string();

    info!(
        version = VERSION,
        config_hash = %config_hash_short,
        category = %config.recorder.category,
        language = %config.recorder.language,
        root = ?config.recorder.root_path,
        post_processing = ?config.postprocess.mode,
        "Configuration loaded"
    );

    // Platform client: a token and the category id are required to start
    let helix = HelixClient::new(config.twitch.clone()).context("Failed to create API client")?;
    helix
        .refresh_credentials()
        .await
        .context("Failed to obtain an access token")?;
    let category_id = helix
        .resolve_category_id(&config.recorder.category)
        .await
        .with_context(|| format!("Failed to resolve category {:?}", config.recorder.category))?;
    info!(category = %config.recorder.category, category_id = %category_id, "Category resolved");
    let prober: Arc<dyn LivenessProber> = Arc::new(helix);

    // External tools are only checked, a missing one fails each job instead
    let capture_tool: Arc<dyn CaptureTool> = Arc::new(StreamlinkCapture::new(config.capture.clone()));
    if let Err(e) = capture_tool.validate().await {
        warn!("Capture tool unavailable: {}", e);
    }
    let post_processor = create_post_processor(&config.postprocess);
    if let Err(e) = post_processor.validate().await {
        warn!(processor = post_processor.name(), "Post-processor unavailable: {}", e);
    }

    let factory = CaptureJobFactory::new(CaptureContext::from_config(
        &config,
        Arc::clone(&prober),
        capture_tool,
        post_processor,
    ));

    let reconciler = Reconciler::new(
        ReconcilerConfig::from_config(&config, category_id),
        prober,
        Arc::new(CsvWhitelistStore::new(&config.recorder.whitelist_path)),
        Arc::new(FileHistoryLog::new(&config.recorder.history_path)),
        Dispatcher::new(config.recorder.max_workers),
        Arc::new(factory),
    );
    let status = reconciler.subscribe();

    let (shutdown_tx, _) = broadcast::channel(1);
    let reconciler_handle = tokio::spawn(reconciler.run(shutdown_tx.subscribe()));

    if config.server.enabled {
        let addr = SocketAddr::new(config.server.host, config.server.port);
        let state = Arc::new(AppState::new(config.clone(), config_hash_short, status));
        let app = create_router(state);

        info!("Starting status server on {}", addr);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind to {}", addr))?;

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;
    } else {
        shutdown_signal().await;
    }

    info!("Shutting down, capture jobs in progress are abandoned");
    let _ = shutdown_tx.send(());
    reconciler_handle
        .await
        .context("Reconciler task failed")?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
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
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
