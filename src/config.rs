use crate::constants::{get_supported_providers, DEFAULT_USER_AGENT, FDA_ENFORCEMENT_URL, FSIS_RECALL_URL};
use crate::error::{RecallError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProviderSettings,
    pub aggregation: AggregationSettings,
    pub storage: StorageSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub fda_url: String,
    pub fsis_url: String,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    /// Provider names to query, in merge order
    pub enabled: Vec<String>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            fda_url: FDA_ENFORCEMENT_URL.to_string(),
            fsis_url: FSIS_RECALL_URL.to_string(),
            request_timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            enabled: get_supported_providers().into_iter().map(String::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregationSettings {
    /// How long a list request waits on the live fetch before using the store
    pub live_timeout_ms: u64,
    pub page_size: usize,
    pub live_limit: usize,
    pub months_back: u32,
    pub persist_queue_capacity: usize,
}

impl Default for AggregationSettings {
    fn default() -> Self {
        Self {
            live_timeout_ms: 5000,
            page_size: 12,
            live_limit: 100,
            months_back: 6,
            persist_queue_capacity: 32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    #[default]
    Sqlite,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    pub sqlite_path: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            sqlite_path: PathBuf::from("data/recalls.db"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { port: 3000 }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| RecallError::Config(format!("{name} has an invalid value '{value}'")))
}

impl Config {
    /// Load from `FOOD_RECALLS_CONFIG` (default `config.toml`), then apply environment overrides
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("FOOD_RECALLS_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
        let mut config = Self::load_file(&config_path)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// A missing file yields defaults; an unreadable or malformed one is an error
    pub fn load_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "Config file not found; using defaults");
            return Ok(Config::default());
        }
        let config_content = fs::read_to_string(path).map_err(|e| {
            RecallError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&config_content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Apply `FOOD_RECALLS_*` overrides through `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("FOOD_RECALLS_DB_PATH") {
            self.storage.sqlite_path = PathBuf::from(path);
            self.storage.backend = StorageBackend::Sqlite;
        }
        if let Some(port) = lookup("FOOD_RECALLS_PORT") {
            self.server.port = parse_env("FOOD_RECALLS_PORT", &port)?;
        }
        if let Some(ms) = lookup("FOOD_RECALLS_LIVE_TIMEOUT_MS") {
            self.aggregation.live_timeout_ms = parse_env("FOOD_RECALLS_LIVE_TIMEOUT_MS", &ms)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.aggregation.page_size == 0 {
            return Err(RecallError::Config("aggregation.page_size must be at least 1".into()));
        }
        if self.aggregation.live_timeout_ms == 0 {
            return Err(RecallError::Config("aggregation.live_timeout_ms must be positive".into()));
        }
        if self.aggregation.persist_queue_capacity == 0 {
            return Err(RecallError::Config("aggregation.persist_queue_capacity must be at least 1".into()));
        }
        let supported = get_supported_providers();
        if let Some(unknown) = self
            .providers
            .enabled
            .iter()
            .find(|p| !supported.contains(&p.as_str()))
        {
            return Err(RecallError::Config(format!("Unknown provider '{unknown}' in providers.enabled")));
        }
        Ok(())
    }
}
