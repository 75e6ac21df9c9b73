//! Frame-sequence converter — per-step screenshots into one animated GIF.
//!
//! Always launched fire-and-forget (`tokio::spawn`) after the agent
//! finishes; the HTTP response never waits on it and no error here ever
//! reaches the request path. Outcomes are visible only in the log.

use crate::config::BridgeConfig;
use std::path::Path;
use tokio::process::Command;
use tracing::{error, info};

/// 1 fps input rate, i.e. each frame is shown for one second.
const FRAMERATE: &str = "1";

/// Scale to 1280px wide (aspect preserved, lanczos resampling), derive
/// a shared palette from the frame stream, then apply it back for
/// better colour fidelity than the default dithering.
const FILTER_GRAPH: &str =
    "scale=1280:-1:flags=lanczos,split[s0][s1];[s0]palettegen[p];[s1][p]paletteuse";

/// Convert the session's frames, if any exist. Missing frames are the
/// expected common case (task had no visual steps, or the agent failed
/// before the first capture) and are skipped silently apart from a log
/// line. Never returns an error to the caller.
pub async fn generate(config: &BridgeConfig, session_id: &str) {
    let recordings_dir = config.recordings_dir();

    let frames = frame_count(&recordings_dir, session_id);
    if frames == 0 {
        info!(session_id, "skipping GIF: no screenshots found");
        return;
    }

    info!(session_id, frames, "starting GIF generation");

    let glob = recordings_dir.join(format!("{session_id}_step_*.png"));
    let output = recordings_dir.join(format!("{session_id}.gif"));

    // ffmpeg expands the glob itself (-pattern_type glob); -y overwrites
    // any previous recording for this session id.
    let result = Command::new("ffmpeg")
        .arg("-y")
        .args(["-framerate", FRAMERATE])
        .args(["-pattern_type", "glob"])
        .arg("-i")
        .arg(&glob)
        .args(["-vf", FILTER_GRAPH])
        .args(["-loop", "0"])
        .arg(&output)
        .output()
        .await;

    match result {
        Err(e) => error!(session_id, err = %e, "failed to start ffmpeg"),
        Ok(out) if !out.status.success() => {
            let stderr = String::from_utf8_lossy(&out.stderr);
            error!(
                session_id,
                status = %out.status,
                stderr = %stderr.trim(),
                "GIF generation failed"
            );
        }
        Ok(_) => info!(session_id, output = %output.display(), "GIF created"),
    }
}

/// Count files matching `{session_id}_step_*.png` in the recordings
/// directory. A missing directory counts as zero frames.
fn frame_count(dir: &Path, session_id: &str) -> usize {
    let prefix = format!("{session_id}_step_");
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.starts_with(&prefix) && name.ends_with(".png")
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BridgeConfig, Overrides};

    fn test_config(work_dir: &std::path::Path) -> BridgeConfig {
        let cfg = BridgeConfig::new(Overrides {
            api_key: Some("secret".to_string()),
            work_dir: Some(work_dir.to_path_buf()),
            ..Default::default()
        })
        .expect("config");
        cfg.ensure_artifact_dirs().expect("dirs");
        cfg
    }

    #[test]
    fn test_frame_count_filters_by_session() {
        let tmp = tempfile::tempdir().expect("tmp dir");
        let cfg = test_config(tmp.path());
        let dir = cfg.recordings_dir();

        std::fs::write(dir.join("run_1_step_01.png"), b"png").expect("write");
        std::fs::write(dir.join("run_1_step_02.png"), b"png").expect("write");
        std::fs::write(dir.join("run_2_step_01.png"), b"png").expect("write");
        std::fs::write(dir.join("run_1.gif"), b"gif").expect("write");
        std::fs::write(dir.join("run_1_step_03.jpg"), b"jpg").expect("write");

        assert_eq!(frame_count(&dir, "run_1"), 2);
        assert_eq!(frame_count(&dir, "run_2"), 1);
        assert_eq!(frame_count(&dir, "run_3"), 0);
    }

    #[test]
    fn test_frame_count_missing_dir_is_zero() {
        assert_eq!(frame_count(Path::new("/nonexistent/recordings"), "run_1"), 0);
    }

    #[tokio::test]
    async fn test_generate_without_frames_is_silent_noop_twice() {
        let tmp = tempfile::tempdir().expect("tmp dir");
        let cfg = test_config(tmp.path());

        // Idempotent: neither call creates a file or panics.
        generate(&cfg, "run_99").await;
        generate(&cfg, "run_99").await;

        assert!(!cfg.recordings_dir().join("run_99.gif").exists());
    }
}
