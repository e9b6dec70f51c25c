//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::backend::{NoAuth, StaticToken, StoreConfig, TokenProvider};
use crate::query::{
    BatchLimits, EngineSettings, PathTranslator, QueryError, ResolutionTable, SubmetricAliases,
    DEFAULT_FIELD_PREFERENCE, DEFAULT_MAX_POINTS,
};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "FLOODLIGHT_CONFIG";

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub submetrics: SubmetricsConfig,

    #[serde(default)]
    pub batching: BatchingConfig,

    #[serde(default)]
    pub resolution: ResolutionConfig,

    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metrics store connection
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    /// Store base URLs; the first one is used
    #[serde(default = "default_backend_urls")]
    pub urls: Vec<String>,

    #[serde(default = "default_tenant")]
    pub tenant: String,

    #[serde(default = "default_backend_timeout")]
    pub request_timeout_ms: u64,

    /// Pre-issued token; requests are unauthenticated without one
    pub auth_token: Option<String>,

    #[serde(default = "default_auth_header")]
    pub auth_header: String,
}

fn default_backend_urls() -> Vec<String> {
    vec!["http://127.0.0.1:20000".to_string()]
}

fn default_tenant() -> String {
    "tenant".to_string()
}

fn default_backend_timeout() -> u64 {
    30_000
}

fn default_auth_header() -> String {
    "X-Auth-Token".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            urls: default_backend_urls(),
            tenant: default_tenant(),
            request_timeout_ms: default_backend_timeout(),
            auth_token: None,
            auth_header: default_auth_header(),
        }
    }
}

impl BackendConfig {
    /// Connection settings for the HTTP store client
    pub fn store_config(&self) -> Result<StoreConfig, ConfigError> {
        let base_url = self
            .urls
            .first()
            .cloned()
            .ok_or_else(|| ConfigError::Invalid("backend.urls is empty".to_string()))?;

        Ok(StoreConfig {
            base_url,
            tenant: self.tenant.clone(),
            request_timeout_ms: self.request_timeout_ms,
        })
    }

    /// Token source for store requests
    pub fn token_provider(&self) -> Arc<dyn TokenProvider> {
        match &self.auth_token {
            Some(token) => Arc::new(StaticToken::new(token.clone()).with_header(self.auth_header.clone())),
            None => Arc::new(NoAuth),
        }
    }
}

/// Submetric alias and enum handling
#[derive(Debug, Clone, Deserialize)]
pub struct SubmetricsConfig {
    /// Expose numeric leaves once per alias
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_aliases")]
    pub aliases: BTreeMap<String, String>,

    #[serde(default = "default_enum_token")]
    pub enum_token: Option<String>,

    #[serde(default = "default_keys")]
    pub default_keys: Vec<String>,

    /// Send `select=` on multi-fetch requests
    #[serde(default)]
    pub select_fields: bool,
}

fn default_aliases() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("_avg".to_string(), "average".to_string()),
        ("_max".to_string(), "max".to_string()),
        ("_min".to_string(), "min".to_string()),
    ])
}

fn default_enum_token() -> Option<String> {
    Some("_enum".to_string())
}

fn default_keys() -> Vec<String> {
    DEFAULT_FIELD_PREFERENCE.iter().map(|s| s.to_string()).collect()
}

impl Default for SubmetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            aliases: default_aliases(),
            enum_token: default_enum_token(),
            default_keys: default_keys(),
            select_fields: false,
        }
    }
}

/// Multi-fetch request limits
#[derive(Debug, Clone, Deserialize)]
pub struct BatchingConfig {
    #[serde(default = "default_max_count")]
    pub max_count: usize,

    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    #[serde(default = "default_per_item_overhead")]
    pub per_item_overhead: usize,
}

fn default_max_count() -> usize {
    100
}

fn default_max_bytes() -> usize {
    20_000
}

fn default_per_item_overhead() -> usize {
    3
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_count: default_max_count(),
            max_bytes: default_max_bytes(),
            per_item_overhead: default_per_item_overhead(),
        }
    }
}

/// Resolution selection
#[derive(Debug, Clone, Deserialize)]
pub struct ResolutionConfig {
    /// Step of FULL resolution data, in seconds
    #[serde(default = "default_full_step")]
    pub full_step_secs: i64,

    /// Point limit for FULL before escalating to MIN5
    #[serde(default = "default_first_tier_threshold")]
    pub first_tier_threshold: i64,

    /// Point limit for every coarser tier
    #[serde(default = "default_threshold")]
    pub threshold: i64,

    /// Most points a fetch may return per series; larger windows are rejected
    #[serde(default = "default_max_points")]
    pub max_points: usize,
}

fn default_full_step() -> i64 {
    60
}

fn default_first_tier_threshold() -> i64 {
    400
}

fn default_threshold() -> i64 {
    800
}

fn default_max_points() -> usize {
    DEFAULT_MAX_POINTS
}

impl Default for ResolutionConfig {
    fn default() -> Self {
        Self {
            full_step_secs: default_full_step(),
            first_tier_threshold: default_first_tier_threshold(),
            threshold: default_threshold(),
            max_points: default_max_points(),
        }
    }
}

/// API server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8888
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ApiConfig {
    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `FLOODLIGHT_CONFIG`, default locations, or environment
    pub fn load_default() -> Self {
        let config_paths = [
            std::env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from),
            dirs::config_dir().map(|p| p.join("floodlight").join("config.toml")),
            Some(PathBuf::from("/etc/floodlight/config.toml")),
            Some(PathBuf::from("./floodlight.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Backend overrides
        if let Some(url) = lookup("FLOODLIGHT_BACKEND_URL") {
            self.backend.urls = url
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(tenant) = lookup("FLOODLIGHT_TENANT") {
            self.backend.tenant = tenant;
        }
        if let Some(token) = lookup("FLOODLIGHT_AUTH_TOKEN") {
            self.backend.auth_token = Some(token);
        }

        // API overrides
        if let Some(host) = lookup("FLOODLIGHT_API_HOST") {
            self.api.host = host;
        }
        if let Some(port) = lookup("FLOODLIGHT_API_PORT") {
            if let Ok(p) = port.parse() {
                self.api.port = p;
            }
        }

        // Logging overrides
        if let Some(level) = lookup("FLOODLIGHT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("FLOODLIGHT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }

    /// Validated engine settings
    pub fn engine_settings(&self) -> Result<EngineSettings, ConfigError> {
        let translator = if self.submetrics.enabled {
            PathTranslator::Aliased(SubmetricAliases::new(
                self.submetrics.aliases.clone(),
                self.submetrics.enum_token.clone(),
            )?)
        } else {
            PathTranslator::Plain
        };

        if self.submetrics.default_keys.is_empty() {
            return Err(ConfigError::Invalid(
                "submetrics.default_keys must not be empty".to_string(),
            ));
        }
        if self.resolution.max_points == 0 {
            return Err(ConfigError::Invalid(
                "resolution.max_points must be positive".to_string(),
            ));
        }

        Ok(EngineSettings {
            translator,
            resolution: ResolutionTable::new(
                self.resolution.full_step_secs,
                self.resolution.first_tier_threshold,
                self.resolution.threshold,
            )?,
            batching: BatchLimits::new(
                self.batching.max_count,
                self.batching.max_bytes,
                self.batching.per_item_overhead,
            )?,
            default_keys: self.submetrics.default_keys.clone(),
            select_fields: self.submetrics.select_fields,
            max_points: self.resolution.max_points,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<QueryError> for ConfigError {
    fn from(err: QueryError) -> Self {
        ConfigError::Invalid(err.to_string())
    }
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Floodlight Configuration
#
# Environment variables override these settings:
# - FLOODLIGHT_BACKEND_URL (comma separated)
# - FLOODLIGHT_TENANT
# - FLOODLIGHT_AUTH_TOKEN
# - FLOODLIGHT_API_HOST
# - FLOODLIGHT_API_PORT
# - FLOODLIGHT_LOG_LEVEL
# - FLOODLIGHT_LOG_FORMAT

[backend]
# Metrics store base URLs (the first one is used)
urls = ["http://127.0.0.1:20000"]

# Tenant all requests are scoped to
tenant = "tenant"

# Request timeout (ms)
request_timeout_ms = 30000

# Pre-issued auth token; omit for unauthenticated access
# auth_token = ""

# Header the token is sent in
auth_header = "X-Auth-Token"

[submetrics]
# Expose every numeric metric once per alias (a.b.c._avg, a.b.c._max, ...)
enabled = false

# Alias token -> sample field
aliases = { "_avg" = "average", "_max" = "max", "_min" = "min" }

# Trailing token for enum value leaves (a.b.c.<value>._enum)
enum_token = "_enum"

# Field preference for leaves without an alias
default_keys = ["average", "latest", "numPoints"]

# Ask the store to return only the fields above
select_fields = false

[batching]
# Maximum metrics per multi-fetch request
max_count = 100

# Maximum estimated request body size (bytes)
max_bytes = 20000

# Bytes added per metric on top of its name
per_item_overhead = 3

[resolution]
# Step of FULL resolution data (seconds)
full_step_secs = 60

# Point limit before leaving FULL
first_tier_threshold = 400

# Point limit for coarser tiers
threshold = 800

# Longest series a fetch may return; larger windows are rejected
max_points = 100000

[api]
# API server host
host = "0.0.0.0"

# API server port
port = 8888

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_generated_config_matches_defaults() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        let defaults = Config::default();

        assert_eq!(config.backend.urls, defaults.backend.urls);
        assert_eq!(config.backend.auth_token, None);
        assert_eq!(config.submetrics.aliases, defaults.submetrics.aliases);
        assert_eq!(config.submetrics.enum_token.as_deref(), Some("_enum"));
        assert_eq!(config.batching.max_bytes, 20_000);
        assert_eq!(config.resolution.full_step_secs, 60);
        assert_eq!(config.resolution.max_points, DEFAULT_MAX_POINTS);
        assert_eq!(config.api.port, 8888);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[backend]\ntenant = \"836986\"\n\n[submetrics]\nenabled = true\naliases = {{ \"_avg\" = \"average\" }}\n\n[batching]\nmax_count = 5"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.backend.tenant, "836986");
        assert_eq!(config.backend.request_timeout_ms, 30_000);
        assert_eq!(config.batching.max_count, 5);
        assert_eq!(config.batching.per_item_overhead, 3);

        let settings = config.engine_settings().unwrap();
        let aliases = settings.translator.aliases().unwrap();
        assert_eq!(aliases.field("_avg"), Some("average"));
        assert_eq!(aliases.enum_token(), Some("_enum"));
        assert_eq!(settings.batching.max_count, 5);
        assert_eq!(settings.max_points, DEFAULT_MAX_POINTS);
    }

    #[test]
    fn test_load_errors() {
        let missing = Path::new("/nonexistent/floodlight.toml");
        assert!(matches!(Config::load(missing), Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[api]\nport = \"many\"").unwrap();
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("FLOODLIGHT_BACKEND_URL", "http://a:1, http://b:2"),
            ("FLOODLIGHT_TENANT", "t1"),
            ("FLOODLIGHT_API_PORT", "not-a-port"),
            ("FLOODLIGHT_LOG_FORMAT", "json"),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.backend.urls, vec!["http://a:1", "http://b:2"]);
        assert_eq!(config.backend.tenant, "t1");
        assert_eq!(config.api.port, 8888);
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.backend.store_config().unwrap().base_url, "http://a:1");
    }

    #[test]
    fn test_invalid_engine_settings() {
        let mut config = Config::default();
        config.batching.max_count = 0;
        assert!(matches!(config.engine_settings(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.resolution.full_step_secs = 300;
        assert!(config.engine_settings().is_err());

        let mut config = Config::default();
        config.resolution.max_points = 0;
        assert!(matches!(config.engine_settings(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.submetrics.enabled = true;
        config.submetrics.aliases.insert("_p99".to_string(), String::new());
        assert!(config.engine_settings().is_err());

        let mut config = Config::default();
        config.backend.urls.clear();
        assert!(config.backend.store_config().is_err());
    }

    #[tokio::test]
    async fn test_token_provider_selection() {
        let mut config = Config::default();
        assert_eq!(config.backend.token_provider().token(false).await.unwrap(), None);

        config.backend.auth_token = Some("abc".to_string());
        config.backend.auth_header = "X-Custom".to_string();
        let provider = config.backend.token_provider();
        assert_eq!(provider.token(true).await.unwrap(), Some("abc".to_string()));
        assert_eq!(provider.header_name(), "X-Custom");
    }
}
