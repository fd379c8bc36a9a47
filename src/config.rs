use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::agent::{DEFAULT_MAX_TURNS, DEFAULT_MODEL};
use crate::gemini::GEMINI_API_URL;
use crate::poller::PollPolicy;
use crate::search::DUCKDUCKGO_API_URL;
use crate::utilities::preview_secret;

pub const API_KEY_VAR: &str = "GOOGLE_API_KEY";
const DEFAULT_SECRETS_PATH: &str = "secrets.toml";

/// Application configuration loaded from a secrets file and the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// `None` when neither the secrets file nor the environment provides a key.
    pub api_key: Option<String>,
    pub secrets_path: PathBuf,
    pub bind_addr: String,
    pub port: u16,
    pub model: String,
    pub gemini_base_url: String,
    pub search_base_url: String,
    pub poll: PollPolicy,
    pub agent_max_turns: usize,
    pub staging_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_key: None,
            secrets_path: PathBuf::from(DEFAULT_SECRETS_PATH),
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            model: DEFAULT_MODEL.to_string(),
            gemini_base_url: GEMINI_API_URL.to_string(),
            search_base_url: DUCKDUCKGO_API_URL.to_string(),
            poll: PollPolicy::default(),
            agent_max_turns: DEFAULT_MAX_TURNS,
            staging_dir: std::env::temp_dir(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Config::default();

        let secrets_path = var("SECRETS_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.secrets_path);
        let secrets_key = secret_from_file(&secrets_path, API_KEY_VAR);

        let poll = PollPolicy {
            interval: secs_or(&var, "POLL_INTERVAL_SECS", defaults.poll.interval)?,
            backoff: parse_or(&var, "POLL_BACKOFF", defaults.poll.backoff)?,
            max_interval: secs_or(&var, "POLL_MAX_INTERVAL_SECS", defaults.poll.max_interval)?,
            max_attempts: parse_or(&var, "POLL_MAX_ATTEMPTS", defaults.poll.max_attempts)?,
            timeout: secs_or(&var, "POLL_TIMEOUT_SECS", defaults.poll.timeout)?,
        };
        anyhow::ensure!(
            poll.backoff.is_finite() && poll.backoff >= 1.0,
            "invalid value for POLL_BACKOFF: {} (must be a finite number >= 1.0)",
            poll.backoff
        );

        let config = Config {
            api_key: resolve_api_key(secrets_key, var(API_KEY_VAR)),
            secrets_path,
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or(&var, "PORT", defaults.port)?,
            model: var("GEMINI_MODEL").unwrap_or(defaults.model),
            gemini_base_url: var("GEMINI_BASE_URL").unwrap_or(defaults.gemini_base_url),
            search_base_url: var("SEARCH_BASE_URL").unwrap_or(defaults.search_base_url),
            poll,
            agent_max_turns: parse_or(&var, "AGENT_MAX_TURNS", defaults.agent_max_turns)?,
            staging_dir: var("STAGING_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.staging_dir),
        };

        config.log_keys();
        Ok(config)
    }

    fn log_keys(&self) {
        info!("Config loaded:");
        match &self.api_key {
            Some(key) => info!("  {}: {}", API_KEY_VAR, preview_secret(key)),
            None => warn!("  {}: <not set>", API_KEY_VAR),
        }
        info!("  SECRETS_PATH: {}", self.secrets_path.display());
        info!("  GEMINI_MODEL: {}", self.model);
        info!("  STAGING_DIR: {}", self.staging_dir.display());
        info!("  POLL: {:?}", self.poll);
    }
}

/// The secrets file wins over the environment; blank values count as missing.
pub fn resolve_api_key(from_secrets: Option<String>, from_env: Option<String>) -> Option<String> {
    from_secrets
        .filter(|k| !k.trim().is_empty())
        .or_else(|| from_env.filter(|k| !k.trim().is_empty()))
}

/// Reads a top-level string from a TOML secrets file.
///
/// A missing file is silent; an unreadable or malformed one is logged and ignored.
pub fn secret_from_file(path: &Path, key: &str) -> Option<String> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("Could not read secrets file {}: {}", path.display(), e);
            return None;
        }
    };

    match text.parse::<toml::Table>() {
        Ok(table) => table.get(key).and_then(|v| v.as_str()).map(str::to_string),
        Err(e) => {
            warn!("Ignoring malformed secrets file {}: {}", path.display(), e);
            None
        }
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}

/// Reads a duration given in (fractional) seconds.
fn secs_or(
    var: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    let secs = parse_or(var, key, default.as_secs_f64())?;
    Duration::try_from_secs_f64(secs).with_context(|| format!("invalid duration for {}: {}", key, secs))
}
