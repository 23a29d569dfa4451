//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::calculate::{AnalysisParams, WinRateBuckets};
use crate::storage::{BackendKind, SqliteBackend, StorageConfig, TableStore};

/// Default location of the optional config file.
pub const DEFAULT_CONFIG_PATH: &str = "arena.toml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Table store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// "sqlite" or "parquet"
    #[serde(default)]
    pub backend: BackendKind,

    /// Overrides `<data_dir>/arena.db`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<PathBuf>,
}

/// Remote API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_login_path")]
    pub login_path: String,

    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Listing and detail path for entities
    #[serde(default = "default_entities_path")]
    pub entities_path: String,

    #[serde(default = "default_outcomes_path")]
    pub outcomes_path: String,

    /// JSON key holding the entity list on a listing page
    #[serde(default = "default_entities_key")]
    pub entities_key: String,

    #[serde(default = "default_outcomes_key")]
    pub outcomes_key: String,

    #[serde(default = "default_entities_page_size")]
    pub entities_page_size: u32,

    #[serde(default = "default_outcomes_page_size")]
    pub outcomes_page_size: u32,

    /// Highest listing page requested
    #[serde(default = "default_max_entity_pages")]
    pub max_entity_pages: u32,

    #[serde(default = "default_max_outcome_pages")]
    pub max_outcome_pages: u32,

    /// Pause after each entity listing page
    #[serde(default = "default_request_delay")]
    pub request_delay_ms: u64,

    /// Pause after each entity detail request
    #[serde(default = "default_detail_delay")]
    pub detail_delay_ms: u64,

    /// Pause after each outcome page
    #[serde(default)]
    pub outcome_delay_ms: u64,

    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_health_path() -> String {
    "/health".to_string()
}

fn default_entities_path() -> String {
    "/pokemon".to_string()
}

fn default_outcomes_path() -> String {
    "/combats".to_string()
}

fn default_entities_key() -> String {
    "pokemons".to_string()
}

fn default_outcomes_key() -> String {
    "combats".to_string()
}

fn default_entities_page_size() -> u32 {
    50
}

fn default_outcomes_page_size() -> u32 {
    100
}

fn default_max_entity_pages() -> u32 {
    50
}

fn default_max_outcome_pages() -> u32 {
    500
}

fn default_request_delay() -> u64 {
    1000
}

fn default_detail_delay() -> u64 {
    500
}

fn default_timeout() -> u64 {
    30
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: String::new(),
            password: String::new(),
            login_path: default_login_path(),
            health_path: default_health_path(),
            entities_path: default_entities_path(),
            outcomes_path: default_outcomes_path(),
            entities_key: default_entities_key(),
            outcomes_key: default_outcomes_key(),
            entities_page_size: default_entities_page_size(),
            outcomes_page_size: default_outcomes_page_size(),
            max_entity_pages: default_max_entity_pages(),
            max_outcome_pages: default_max_outcome_pages(),
            request_delay_ms: default_request_delay(),
            detail_delay_ms: default_detail_delay(),
            outcome_delay_ms: 0,
            timeout_seconds: default_timeout(),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Report configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    #[serde(default = "default_report_title")]
    pub title: String,

    /// Overrides `<data_dir>/report`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,
}

fn default_report_title() -> String {
    "Arena Analytics Report".to_string()
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: default_report_title(),
            output_dir: None,
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub analysis: AnalysisParams,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            store: StoreConfig::default(),
            api: ApiConfig::default(),
            analysis: AnalysisParams::default(),
            server: ServerConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load the given file, or `arena.toml` if it exists, or defaults.
    ///
    /// Environment overrides are applied last and the result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `ARENA_API_*` overrides from `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(base_url) = lookup("ARENA_API_BASE_URL") {
            self.api.base_url = base_url;
        }
        if let Some(username) = lookup("ARENA_API_USERNAME") {
            self.api.username = username;
        }
        if let Some(password) = lookup("ARENA_API_PASSWORD") {
            self.api.password = password;
        }
    }

    /// Storage paths rooted at `data_dir`.
    pub fn storage(&self) -> StorageConfig {
        StorageConfig::new(self.data_dir.clone())
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.store
            .sqlite_path
            .clone()
            .unwrap_or_else(|| self.storage().sqlite_path())
    }

    /// Open the configured table store.
    pub fn open_store(&self) -> TableStore {
        match self.store.backend {
            BackendKind::Sqlite => {
                let store = TableStore::new(Box::new(SqliteBackend::new(self.sqlite_path())));
                tracing::info!("Table store: {}", store.describe());
                store
            }
            kind => TableStore::open(kind, &self.storage()),
        }
    }

    pub fn report_dir(&self) -> PathBuf {
        self.report
            .output_dir
            .clone()
            .unwrap_or_else(|| self.storage().report_dir())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if url::Url::parse(&self.api.base_url).is_err() {
            return Err(ConfigError::ValidationError(format!(
                "API base URL is not a valid URL: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "API timeout must be greater than 0".to_string(),
            ));
        }

        if self.api.entities_page_size == 0 || self.api.outcomes_page_size == 0 {
            return Err(ConfigError::ValidationError(
                "API page sizes must be greater than 0".to_string(),
            ));
        }

        if self.analysis.top_n == 0 {
            return Err(ConfigError::ValidationError(
                "analysis.top_n must be greater than 0".to_string(),
            ));
        }

        if let Err(e) = WinRateBuckets::new(self.analysis.win_rate_edges.clone()) {
            return Err(ConfigError::ValidationError(e.to_string()));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_open_store_honours_sqlite_path() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = AppConfig {
            data_dir: temp.path().join("data"),
            ..AppConfig::default()
        };
        config.store.sqlite_path = Some(temp.path().join("custom.db"));

        let store = config.open_store();
        assert!(store.describe().contains("custom.db"));
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.store.backend, BackendKind::Sqlite);
        assert_eq!(config.analysis.top_n, 10);
        assert_eq!(config.analysis.min_participations, 5);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_api_config_default() {
        let api = ApiConfig::default();

        assert_eq!(api.entities_key, "pokemons");
        assert_eq!(api.outcomes_key, "combats");
        assert_eq!(api.entities_page_size, 50);
        assert_eq!(api.outcomes_page_size, 100);
        assert_eq!(api.max_entity_pages, 50);
        assert_eq!(api.max_outcome_pages, 500);
    }

    #[test]
    fn test_config_validation_ok() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_url() {
        let mut config = AppConfig::default();
        config.api.base_url = "not a url".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_edges() {
        let mut config = AppConfig::default();
        config.analysis.win_rate_edges = vec![0.0, 50.0, 25.0];

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;

        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
data_dir = "/srv/arena"

[store]
backend = "parquet"

[analysis]
min_participations = 2
"#
        )
        .unwrap();

        let config = AppConfig::from_file(file.path()).unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/arena"));
        assert_eq!(config.store.backend, BackendKind::Parquet);
        assert_eq!(config.analysis.min_participations, 2);
        assert_eq!(config.analysis.top_n, 10);
        assert_eq!(config.api.outcomes_page_size, 100);
        assert_eq!(config.report_dir(), PathBuf::from("/srv/arena/report"));
        assert_eq!(config.sqlite_path(), PathBuf::from("/srv/arena/arena.db"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("ARENA_API_USERNAME", "trainer"),
            ("ARENA_API_PASSWORD", "secret"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::default();

        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.api.username, "trainer");
        assert_eq!(config.api.password, "secret");
        assert_eq!(config.api.base_url, "http://localhost:8000");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.data_dir, parsed.data_dir);
        assert_eq!(config.analysis, parsed.analysis);
    }
}
