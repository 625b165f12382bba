pub mod config;
pub mod session;
pub mod stats;

use deepwork_core::{Config, SessionEngine};
use serde::Serialize;
use tracing::debug;

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// How results are printed.
#[derive(Debug, Clone, Copy)]
pub struct Output {
    pub json: bool,
}

impl Output {
    /// Print `value` as pretty JSON, or `text` otherwise.
    pub fn emit<T: Serialize>(&self, value: &T, text: impl FnOnce() -> String) -> CommandResult {
        if self.json {
            println!("{}", serde_json::to_string_pretty(value)?);
        } else {
            println!("{}", text());
        }
        Ok(())
    }
}

/// Load the config (writing defaults on first run) and apply `--api-url`.
pub fn load_config(api_url: Option<&str>) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load()?;
    if let Some(url) = api_url {
        config.set_value("api.base_url", url)?;
    }
    debug!(base_url = %config.api.base_url, "configuration loaded");
    Ok(config)
}

pub fn engine(config: &Config) -> Result<SessionEngine, Box<dyn std::error::Error>> {
    Ok(SessionEngine::from_config(config)?)
}
