//! Agent invoker — runs the external autonomous agent to completion.
//!
//! The prompt travels as one discrete argument vector entry, so no
//! shell quoting of the (attacker-influenced) prompt text is needed.
//! The call is synchronous from the orchestrator's point of view: the
//! HTTP response is held until the agent process exits. There is no
//! timeout unless `agent_timeout_secs` is configured — the agent may
//! run indefinitely, which is an accepted risk of this design.

use crate::config::BridgeConfig;
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Flag that puts the agent into unattended operation.
const AGENT_AUTO_FLAG: &str = "--yolo";

/// Sentinel returned in place of a report URL when the agent's output
/// contains none. A missing URL is a normal outcome, not an error.
pub const URL_NOT_FOUND: &str = "No report URL found.";

// ─── Errors ───────────────────────────────────────────────────────────────────

/// Failures of the agent invocation itself. These never fail the HTTP
/// request — they are flattened into the in-band `error` field of an
/// otherwise-200 response.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to start agent process: {0}")]
    Spawn(std::io::Error),
    #[error("failed to capture agent output: {0}")]
    Wait(std::io::Error),
    #[error("agent exited with {status}")]
    Exited { status: std::process::ExitStatus },
    #[error("agent timed out after {0}s")]
    Timeout(u64),
}

/// What one agent run produced. `stdout` is captured even when the
/// process exited abnormally — a partial transcript is still useful to
/// the caller.
#[derive(Debug)]
pub struct AgentOutcome {
    pub stdout: String,
    pub error: Option<String>,
}

impl AgentOutcome {
    fn failed(err: AgentError) -> Self {
        Self {
            stdout: String::new(),
            error: Some(err.to_string()),
        }
    }
}

// ─── Invocation ───────────────────────────────────────────────────────────────

/// Run the configured agent with the rendered prompt, from the work
/// directory, capturing stdout and stderr. Stdout is the only stream
/// inspected downstream; stderr is logged.
pub async fn invoke(config: &BridgeConfig, prompt: &str) -> AgentOutcome {
    let mut cmd = Command::new(&config.agent_path);
    cmd.arg(AGENT_AUTO_FLAG)
        .arg(prompt)
        .current_dir(&config.work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if config.agent_timeout_secs.is_some() {
        // Dropping the wait future on timeout must reap the child.
        cmd.kill_on_drop(true);
    }

    debug!(agent = %config.agent_path, "spawning agent process");

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            warn!(agent = %config.agent_path, err = %e, "agent spawn failed");
            return AgentOutcome::failed(AgentError::Spawn(e));
        }
    };

    let waited = match config.agent_timeout_secs {
        Some(secs) => match timeout(Duration::from_secs(secs), child.wait_with_output()).await {
            Ok(result) => result,
            Err(_elapsed) => {
                warn!(secs, "agent run timed out — child killed");
                return AgentOutcome::failed(AgentError::Timeout(secs));
            }
        },
        None => child.wait_with_output().await,
    };

    match waited {
        Err(e) => AgentOutcome::failed(AgentError::Wait(e)),
        Ok(output) => {
            let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
            let stderr = String::from_utf8_lossy(&output.stderr);
            if !stderr.trim().is_empty() {
                debug!(stderr = %stderr.trim(), "agent stderr");
            }
            let error = if output.status.success() {
                None
            } else {
                Some(
                    AgentError::Exited {
                        status: output.status,
                    }
                    .to_string(),
                )
            };
            AgentOutcome { stdout, error }
        }
    }
}

// ─── Report-URL extraction ────────────────────────────────────────────────────

/// Compile the pattern matching a report URL under the configured base
/// URL. The base URL is regex-escaped so literal dots and the like
/// cannot widen the match.
pub fn report_url_pattern(base_url: &str) -> Regex {
    let escaped = regex::escape(base_url);
    Regex::new(&format!(r"{escaped}/walk-reports/[a-zA-Z0-9._-]+\.html"))
        .expect("escaped base URL always forms a valid pattern")
}

/// First report URL in the agent's stdout, if any.
pub fn extract_report_url(pattern: &Regex, stdout: &str) -> Option<String> {
    pattern.find(stdout).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeConfig, Overrides};

    fn test_config(work_dir: &std::path::Path, agent_path: &str) -> BridgeConfig {
        let mut cfg = BridgeConfig::new(Overrides {
            api_key: Some("secret".to_string()),
            work_dir: Some(work_dir.to_path_buf()),
            ..Default::default()
        })
        .expect("config");
        cfg.agent_path = agent_path.to_string();
        cfg
    }

    #[test]
    fn test_extract_report_url_match() {
        let re = report_url_pattern("http://localhost:8443");
        let stdout = "all done\nhttp://localhost:8443/walk-reports/report_run_17.html\nbye";
        assert_eq!(
            extract_report_url(&re, stdout).as_deref(),
            Some("http://localhost:8443/walk-reports/report_run_17.html")
        );
    }

    #[test]
    fn test_extract_report_url_no_match_is_none() {
        let re = report_url_pattern("http://localhost:8443");
        assert!(extract_report_url(&re, "").is_none());
        assert!(extract_report_url(&re, "nothing here").is_none());
        assert!(extract_report_url(&re, "http://localhost:8443/walk-reports/").is_none());
    }

    #[test]
    fn test_extract_report_url_rejects_other_hosts() {
        let re = report_url_pattern("http://localhost:8443");
        // An unescaped '.' would let "localhostX8443" through.
        assert!(extract_report_url(&re, "http://localhostX8443/walk-reports/r.html").is_none());
        assert!(extract_report_url(&re, "http://evil.example/walk-reports/r.html").is_none());
    }

    #[test]
    fn test_extract_report_url_rejects_bad_filename_chars() {
        let re = report_url_pattern("http://localhost:8443");
        let ok = "http://localhost:8443/walk-reports/report_run-1.v2_x.html";
        assert_eq!(extract_report_url(&re, ok).as_deref(), Some(ok));
        assert!(extract_report_url(&re, "http://localhost:8443/walk-reports/a b.html").is_none());
    }

    #[tokio::test]
    async fn test_invoke_missing_binary_surfaces_error() {
        let tmp = tempfile::tempdir().expect("tmp dir");
        let cfg = test_config(tmp.path(), "/nonexistent/agent-binary");
        let outcome = invoke(&cfg, "prompt").await;
        assert!(outcome.stdout.is_empty());
        let err = outcome.error.expect("spawn failure should be surfaced");
        assert!(err.contains("failed to start agent process"), "got: {err}");
    }

    #[tokio::test]
    async fn test_invoke_captures_stdout() {
        let tmp = tempfile::tempdir().expect("tmp dir");
        // `echo --yolo <prompt>` — the prompt round-trips through stdout.
        let cfg = test_config(tmp.path(), "echo");
        let outcome = invoke(&cfg, "hello from the bridge").await;
        assert!(outcome.error.is_none());
        assert!(outcome.stdout.contains("hello from the bridge"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_invoke_timeout_kills_child() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().expect("tmp dir");
        let stub = tmp.path().join("slow-agent.sh");
        std::fs::write(&stub, "#!/bin/sh\nsleep 30\n").expect("write stub");
        std::fs::set_permissions(&stub, std::fs::Permissions::from_mode(0o755))
            .expect("chmod stub");

        let mut cfg = test_config(tmp.path(), stub.to_str().expect("utf8 path"));
        cfg.agent_timeout_secs = Some(1);

        let start = std::time::Instant::now();
        let outcome = invoke(&cfg, "prompt").await;
        assert!(start.elapsed() < Duration::from_secs(10));
        let err = outcome.error.expect("timeout should be surfaced");
        assert!(err.contains("timed out"), "got: {err}");
    }
}
