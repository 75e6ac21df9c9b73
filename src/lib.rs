pub mod agent;
pub mod config;
pub mod prompt;
pub mod recording;
pub mod rest;
pub mod session;

use std::sync::Arc;

use config::BridgeConfig;
use regex::Regex;

/// Shared application state passed to every request handler and
/// background task.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<BridgeConfig>,
    /// Matches `{base_url}/walk-reports/<name>.html` in agent stdout.
    /// Compiled once at startup — the base URL is fixed for the
    /// process lifetime.
    pub report_url_re: Regex,
}

impl AppContext {
    pub fn new(config: BridgeConfig) -> Self {
        let report_url_re = agent::report_url_pattern(&config.base_url);
        Self {
            config: Arc::new(config),
            report_url_re,
        }
    }
}
