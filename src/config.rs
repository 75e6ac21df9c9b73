use anyhow::{bail, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::error;

const DEFAULT_PORT: u16 = 3333;
const DEFAULT_AGENT_PATH: &str = "gemini";
const DEFAULT_BASE_URL: &str = "http://localhost:8443";
const DEFAULT_LOG: &str = "info";
const DEFAULT_LOG_FORMAT: &str = "pretty";

/// Recordings live under `{work_dir}/public/recordings` — the agent
/// writes numbered frame PNGs there and the converter writes the GIF
/// next to them.
const RECORDINGS_SUBDIR: &str = "public/recordings";
/// Reports live under `{work_dir}/public/walk-reports`, served later
/// as `{base_url}/walk-reports/`.
const REPORTS_SUBDIR: &str = "public/walk-reports";

// ─── TOML config file ─────────────────────────────────────────────────────────

/// `{work_dir}/bridge.toml` — all fields are optional overrides.
/// Priority: CLI / env var  >  TOML  >  built-in default.
#[derive(Deserialize, Default)]
struct TomlConfig {
    /// HTTP server port (default: 3333).
    port: Option<u16>,
    /// Shared secret required in the `x-api-key` header.
    /// Usually set via `BRIDGE_API_KEY` instead of here.
    api_key: Option<String>,
    /// External agent executable (default: "gemini").
    agent_path: Option<String>,
    /// Public-facing base URL embedded in prompts and report links.
    base_url: Option<String>,
    /// Kill the agent process after this many seconds. Omit for no limit.
    agent_timeout_secs: Option<u64>,
    /// Log level filter string, e.g. "debug", "info,walkbridge=trace".
    log: Option<String>,
    /// Log output format: "pretty" (default) | "json".
    log_format: Option<String>,
}

fn load_toml(work_dir: &Path) -> Option<TomlConfig> {
    let path = work_dir.join("bridge.toml");
    let contents = std::fs::read_to_string(&path).ok()?;
    match toml::from_str::<TomlConfig>(&contents) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            error!(path = %path.display(), err = %e, "failed to parse bridge.toml — using defaults");
            None
        }
    }
}

// ─── CLI / env overrides ──────────────────────────────────────────────────────

/// Values resolved from clap (CLI flags and `BRIDGE_*` env vars) in
/// `main.rs`. `None` means "not given — fall through to TOML, then
/// the built-in default".
#[derive(Debug, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub api_key: Option<String>,
    pub work_dir: Option<PathBuf>,
    pub agent_path: Option<String>,
    pub base_url: Option<String>,
    pub agent_timeout_secs: Option<u64>,
    pub log: Option<String>,
    pub log_file: Option<PathBuf>,
    pub log_format: Option<String>,
}

// ─── BridgeConfig ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub port: u16,
    /// Shared secret every request must carry in `x-api-key`.
    /// Mandatory — startup fails without it.
    pub api_key: String,
    /// Working directory for the agent process; `public/` artifact
    /// directories and `bridge.toml` / `bridge.log` live here too.
    pub work_dir: PathBuf,
    /// External agent executable path or bare name resolved via PATH.
    pub agent_path: String,
    /// Public-facing base URL (no trailing slash expected).
    pub base_url: String,
    /// Optional hard limit on a single agent run. None = the agent may
    /// run indefinitely, matching the accepted-risk default.
    pub agent_timeout_secs: Option<u64>,
    /// Log level filter string.
    pub log: String,
    /// Append-mode log file (default: `{work_dir}/bridge.log`).
    pub log_file: PathBuf,
    /// Log output format: "pretty" | "json".
    pub log_format: String,
}

impl BridgeConfig {
    /// Build config from CLI/env overrides + optional TOML file.
    ///
    /// Fails when no API key is configured anywhere — the bridge must
    /// refuse to start rather than run an unauthenticated endpoint.
    pub fn new(cli: Overrides) -> Result<Self> {
        let work_dir = cli.work_dir.unwrap_or_else(default_work_dir);

        // TOML is the lowest-priority override layer.
        let toml = load_toml(&work_dir).unwrap_or_default();

        let api_key = cli
            .api_key
            .filter(|k| !k.is_empty())
            .or(toml.api_key)
            .unwrap_or_default();
        if api_key.is_empty() {
            bail!("BRIDGE_API_KEY is not set — refusing to start without a shared secret");
        }

        let port = cli.port.or(toml.port).unwrap_or(DEFAULT_PORT);
        let agent_path = cli
            .agent_path
            .or(toml.agent_path)
            .unwrap_or_else(|| DEFAULT_AGENT_PATH.to_string());
        let base_url = cli
            .base_url
            .or(toml.base_url)
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let agent_timeout_secs = cli.agent_timeout_secs.or(toml.agent_timeout_secs);
        let log = cli
            .log
            .or(toml.log)
            .unwrap_or_else(|| DEFAULT_LOG.to_string());
        let log_file = cli
            .log_file
            .unwrap_or_else(|| work_dir.join("bridge.log"));
        let log_format = cli
            .log_format
            .or(toml.log_format)
            .unwrap_or_else(|| DEFAULT_LOG_FORMAT.to_string());

        Ok(Self {
            port,
            api_key,
            work_dir,
            agent_path,
            base_url,
            agent_timeout_secs,
            log,
            log_file,
            log_format,
        })
    }

    pub fn recordings_dir(&self) -> PathBuf {
        self.work_dir.join(RECORDINGS_SUBDIR)
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.work_dir.join(REPORTS_SUBDIR)
    }

    /// Create the artifact directories the agent and converter write
    /// into. Called once at startup; a failure here is fatal.
    pub fn ensure_artifact_dirs(&self) -> Result<()> {
        std::fs::create_dir_all(self.recordings_dir())?;
        std::fs::create_dir_all(self.reports_dir())?;
        Ok(())
    }
}

/// Default work dir: the directory containing the bridge executable,
/// falling back to the current directory.
fn default_work_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_key(work_dir: &Path) -> Overrides {
        Overrides {
            api_key: Some("secret".to_string()),
            work_dir: Some(work_dir.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults_applied() {
        let tmp = tempfile::tempdir().expect("tmp dir");
        let cfg = BridgeConfig::new(with_key(tmp.path())).expect("config");
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.agent_path, "gemini");
        assert_eq!(cfg.base_url, "http://localhost:8443");
        assert!(cfg.agent_timeout_secs.is_none());
        assert_eq!(cfg.log_file, tmp.path().join("bridge.log"));
    }

    #[test]
    fn test_missing_api_key_is_fatal() {
        let tmp = tempfile::tempdir().expect("tmp dir");
        let cli = Overrides {
            work_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        assert!(BridgeConfig::new(cli).is_err());
    }

    #[test]
    fn test_empty_api_key_is_fatal() {
        let tmp = tempfile::tempdir().expect("tmp dir");
        let cli = Overrides {
            api_key: Some(String::new()),
            work_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        assert!(BridgeConfig::new(cli).is_err());
    }

    #[test]
    fn test_toml_layer_below_cli() {
        let tmp = tempfile::tempdir().expect("tmp dir");
        std::fs::write(
            tmp.path().join("bridge.toml"),
            "port = 4444\nagent_path = \"claude\"\n",
        )
        .expect("write toml");

        // TOML fills gaps the CLI left open.
        let cfg = BridgeConfig::new(with_key(tmp.path())).expect("config");
        assert_eq!(cfg.port, 4444);
        assert_eq!(cfg.agent_path, "claude");

        // CLI wins over TOML.
        let mut cli = with_key(tmp.path());
        cli.port = Some(5555);
        let cfg = BridgeConfig::new(cli).expect("config");
        assert_eq!(cfg.port, 5555);
    }

    #[test]
    fn test_api_key_from_toml() {
        let tmp = tempfile::tempdir().expect("tmp dir");
        std::fs::write(tmp.path().join("bridge.toml"), "api_key = \"from-toml\"\n")
            .expect("write toml");
        let cli = Overrides {
            work_dir: Some(tmp.path().to_path_buf()),
            ..Default::default()
        };
        let cfg = BridgeConfig::new(cli).expect("config");
        assert_eq!(cfg.api_key, "from-toml");
    }

    #[test]
    fn test_malformed_toml_falls_back_to_defaults() {
        let tmp = tempfile::tempdir().expect("tmp dir");
        std::fs::write(tmp.path().join("bridge.toml"), "port = not a number")
            .expect("write toml");
        let cfg = BridgeConfig::new(with_key(tmp.path())).expect("config");
        assert_eq!(cfg.port, DEFAULT_PORT);
    }

    #[test]
    fn test_artifact_dirs_created() {
        let tmp = tempfile::tempdir().expect("tmp dir");
        let cfg = BridgeConfig::new(with_key(tmp.path())).expect("config");
        cfg.ensure_artifact_dirs().expect("dirs");
        assert!(cfg.recordings_dir().is_dir());
        assert!(cfg.reports_dir().is_dir());
    }
}
