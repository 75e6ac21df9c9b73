use anyhow::{Context as _, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use walkbridge::{
    config::{BridgeConfig, Overrides},
    rest, AppContext,
};

#[derive(Parser)]
#[command(
    name = "walkbridge",
    about = "Local HTTP bridge: QA requests in, agent sessions + GIF recordings out",
    version
)]
struct Args {
    /// HTTP server port
    #[arg(long, env = "BRIDGE_PORT")]
    port: Option<u16>,

    /// Shared secret required in the x-api-key header. Mandatory.
    #[arg(long, env = "BRIDGE_API_KEY")]
    api_key: Option<String>,

    /// Work directory: agent cwd, public/ artifact dirs, bridge.toml,
    /// and the default log file all live here (default: the directory
    /// containing this executable)
    #[arg(long, env = "BRIDGE_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// External agent executable path or name (default: gemini)
    #[arg(long, env = "BRIDGE_AGENT_PATH")]
    agent_path: Option<String>,

    /// Public-facing base URL embedded in prompts and report links
    #[arg(long, env = "BRIDGE_PUBLIC_BASE_URL")]
    base_url: Option<String>,

    /// Kill an agent run after this many seconds (default: no limit)
    #[arg(long, env = "BRIDGE_AGENT_TIMEOUT_SECS")]
    agent_timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "BRIDGE_LOG")]
    log: Option<String>,

    /// Write logs to this file, append mode (default: {work_dir}/bridge.log)
    #[arg(long, env = "BRIDGE_LOG_FILE")]
    log_file: Option<PathBuf>,

    /// Log output format: "pretty" (human-readable) | "json"
    #[arg(long, env = "BRIDGE_LOG_FORMAT")]
    log_format: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match BridgeConfig::new(Overrides {
        port: args.port,
        api_key: args.api_key,
        work_dir: args.work_dir,
        agent_path: args.agent_path,
        base_url: args.base_url,
        agent_timeout_secs: args.agent_timeout_secs,
        log: args.log,
        log_file: args.log_file,
        log_format: args.log_format,
    }) {
        Ok(config) => config,
        Err(e) => {
            // Logging is not up yet; stderr is all we have.
            eprintln!("FATAL: {e}");
            std::process::exit(1);
        }
    };

    // Hold the guard so buffered log lines are flushed at shutdown.
    let _log_guard = setup_logging(&config);

    config
        .ensure_artifact_dirs()
        .context("failed to create artifact directories under the work dir")?;

    info!(
        work_dir = %config.work_dir.display(),
        agent = %config.agent_path,
        base_url = %config.base_url,
        "starting walkbridge"
    );

    let ctx = Arc::new(AppContext::new(config));
    rest::start(ctx).await
}

/// Initialise tracing with a single append-mode log file.
///
/// Informational lines go to the file only; ERROR lines are mirrored
/// to stderr. That asymmetry is deliberate and matches the sink rule
/// this bridge has always had, so operators tailing stderr see
/// failures without the per-request noise.
///
/// If the log directory cannot be created, falls back to stderr-only
/// logging with a warning. Never panics.
fn setup_logging(
    config: &BridgeConfig,
) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    use tracing_subscriber::{
        filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer,
    };

    let use_json = config.log_format == "json";
    let path = &config.log_file;
    let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
    let filename = path
        .file_name()
        .map(|f| f.to_os_string())
        .unwrap_or_else(|| "bridge.log".into());

    if let Err(e) = std::fs::create_dir_all(dir) {
        eprintln!(
            "warn: could not create log directory '{}': {e} — falling back to stderr",
            dir.display()
        );
        if use_json {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(EnvFilter::new(&config.log))
                .with_writer(std::io::stderr)
                .init();
        } else {
            tracing_subscriber::fmt()
                .with_env_filter(EnvFilter::new(&config.log))
                .with_writer(std::io::stderr)
                .compact()
                .init();
        }
        return None;
    }

    // `never` = one stable file name, appended across restarts.
    let appender = tracing_appender::rolling::never(dir, filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    if use_json {
        let stderr_errors = fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(LevelFilter::ERROR);
        tracing_subscriber::registry()
            .with(EnvFilter::new(&config.log))
            .with(fmt::layer().json().with_writer(non_blocking))
            .with(stderr_errors)
            .init();
    } else {
        let stderr_errors = fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(LevelFilter::ERROR);
        tracing_subscriber::registry()
            .with(EnvFilter::new(&config.log))
            .with(fmt::layer().with_writer(non_blocking))
            .with(stderr_errors)
            .init();
    }

    Some(guard)
}
