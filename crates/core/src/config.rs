use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alternatives::{NutritionWeights, DEFAULT_CANDIDATE_POOL, DEFAULT_WEIGHTS};

pub const ENV_PREFIX: &str = "VOCALKART_";
const DEFAULT_CONFIG_FILE: &str = "vocalkart.toml";
const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub lookup: LookupConfig,
    pub ranking: RankingConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl LlmConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }
}

/// External product lookup service (OpenFoodFacts).
#[derive(Clone, Debug)]
pub struct LookupConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
}

#[derive(Clone, Debug)]
pub struct RankingConfig {
    pub candidate_pool_limit: u32,
    pub energy_weight: f64,
    pub sugar_weight: f64,
    pub fat_weight: f64,
}

impl RankingConfig {
    pub fn weights(&self) -> NutritionWeights {
        NutritionWeights {
            energy: self.energy_weight,
            sugar: self.sugar_weight,
            fat: self.fat_weight,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Any OpenAI-compatible chat-completions gateway with bearer auth.
    OpenAi,
    Ollama,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub lookup_base_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://vocalkart.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::OpenAi,
                api_key: None,
                base_url: "https://ai.gateway.lovable.dev/v1".to_string(),
                model: "google/gemini-2.5-flash".to_string(),
                timeout_secs: 8,
                max_retries: 1,
            },
            lookup: LookupConfig {
                base_url: "https://world.openfoodfacts.org".to_string(),
                timeout_secs: 7,
                user_agent: concat!("vocalkart/", env!("CARGO_PKG_VERSION")).to_string(),
            },
            ranking: RankingConfig {
                candidate_pool_limit: DEFAULT_CANDIDATE_POOL,
                energy_weight: DEFAULT_WEIGHTS.energy,
                sugar_weight: DEFAULT_WEIGHTS.sugar,
                fat_weight: DEFAULT_WEIGHTS.fat,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(lookup) = patch.lookup {
            if let Some(base_url) = lookup.base_url {
                self.lookup.base_url = base_url;
            }
            if let Some(timeout_secs) = lookup.timeout_secs {
                self.lookup.timeout_secs = timeout_secs;
            }
            if let Some(user_agent) = lookup.user_agent {
                self.lookup.user_agent = user_agent;
            }
        }

        if let Some(ranking) = patch.ranking {
            if let Some(limit) = ranking.candidate_pool_limit {
                self.ranking.candidate_pool_limit = limit;
            }
            if let Some(weight) = ranking.energy_weight {
                self.ranking.energy_weight = weight;
            }
            if let Some(weight) = ranking.sugar_weight {
                self.ranking.sugar_weight = weight;
            }
            if let Some(weight) = ranking.fat_weight {
                self.ranking.fat_weight = weight;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("VOCALKART_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("VOCALKART_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_env("VOCALKART_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("VOCALKART_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_env("VOCALKART_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("VOCALKART_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("VOCALKART_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("VOCALKART_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("VOCALKART_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("VOCALKART_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_env("VOCALKART_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("VOCALKART_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_env("VOCALKART_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("VOCALKART_LOOKUP_BASE_URL") {
            self.lookup.base_url = value;
        }
        if let Some(value) = read_env("VOCALKART_LOOKUP_TIMEOUT_SECS") {
            self.lookup.timeout_secs = parse_env("VOCALKART_LOOKUP_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("VOCALKART_LOOKUP_USER_AGENT") {
            self.lookup.user_agent = value;
        }

        if let Some(value) = read_env("VOCALKART_RANKING_CANDIDATE_POOL_LIMIT") {
            self.ranking.candidate_pool_limit =
                parse_env("VOCALKART_RANKING_CANDIDATE_POOL_LIMIT", &value)?;
        }
        if let Some(value) = read_env("VOCALKART_RANKING_ENERGY_WEIGHT") {
            self.ranking.energy_weight = parse_env("VOCALKART_RANKING_ENERGY_WEIGHT", &value)?;
        }
        if let Some(value) = read_env("VOCALKART_RANKING_SUGAR_WEIGHT") {
            self.ranking.sugar_weight = parse_env("VOCALKART_RANKING_SUGAR_WEIGHT", &value)?;
        }
        if let Some(value) = read_env("VOCALKART_RANKING_FAT_WEIGHT") {
            self.ranking.fat_weight = parse_env("VOCALKART_RANKING_FAT_WEIGHT", &value)?;
        }

        if let Some(value) = read_env("VOCALKART_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("VOCALKART_SERVER_PORT") {
            self.server.port = parse_env("VOCALKART_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("VOCALKART_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_env("VOCALKART_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("VOCALKART_LOGGING_LEVEL").or_else(|| read_env("VOCALKART_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("VOCALKART_LOGGING_FORMAT").or_else(|| read_env("VOCALKART_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(llm_base_url) = overrides.llm_base_url {
            self.llm.base_url = llm_base_url;
        }
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(lookup_base_url) = overrides.lookup_base_url {
            self.lookup.base_url = lookup_base_url;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_lookup(&self.lookup)?;
        validate_ranking(&self.ranking)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(DEFAULT_CONFIG_FILE), Path::new("config").join(DEFAULT_CONFIG_FILE)]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    Ok(())
}

fn validate_lookup(lookup: &LookupConfig) -> Result<(), ConfigError> {
    if !is_http_url(&lookup.base_url) {
        return Err(ConfigError::Validation(
            "lookup.base_url must start with http:// or https://".to_string(),
        ));
    }

    if lookup.timeout_secs == 0 || lookup.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "lookup.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_ranking(ranking: &RankingConfig) -> Result<(), ConfigError> {
    if ranking.candidate_pool_limit == 0 {
        return Err(ConfigError::Validation(
            "ranking.candidate_pool_limit must be greater than zero".to_string(),
        ));
    }

    let weights = ranking.weights();
    let all_valid = [weights.energy, weights.sugar, weights.fat]
        .iter()
        .all(|weight| weight.is_finite() && *weight >= 0.0);
    if !all_valid {
        return Err(ConfigError::Validation(
            "ranking weights must be finite and non-negative".to_string(),
        ));
    }

    if (weights.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
        return Err(ConfigError::Validation(format!(
            "ranking weights must sum to 1.0 (got {:.6})",
            weights.sum()
        )));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn is_http_url(value: &str) -> bool {
    let value = value.trim();
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    lookup: Option<LookupPatch>,
    ranking: Option<RankingPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LookupPatch {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RankingPatch {
    candidate_pool_limit: Option<u32>,
    energy_weight: Option<f64>,
    sugar_weight: Option<f64>,
    fat_weight: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
