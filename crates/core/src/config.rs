use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::booking::DEFAULT_COMMIT_MAX_ATTEMPTS;

pub const CONFIG_FILE_NAME: &str = "concierge.toml";
pub const NESTED_CONFIG_FILE: &str = "config/concierge.toml";

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub agent: AgentConfig,
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
    pub base_url: Option<String>,
    pub api_version: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub api_version: Option<String>,
    pub model: String,
    pub dimensions: Option<u32>,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct AgentConfig {
    pub name: String,
    pub max_tool_rounds: u32,
    pub search_top_k: u32,
    pub commit_max_attempts: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    AzureOpenAi,
    Ollama,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingProvider {
    OpenAi,
    AzureOpenAi,
    Ollama,
    Hashing,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub embedding_provider: Option<EmbeddingProvider>,
    pub embedding_dimensions: Option<u32>,
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
                url: "sqlite://concierge.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434/v1".to_string()),
                api_version: None,
                model: "llama3.1".to_string(),
                timeout_secs: 60,
                max_retries: 2,
            },
            embedding: EmbeddingConfig {
                provider: EmbeddingProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434/v1".to_string()),
                api_version: None,
                model: "nomic-embed-text".to_string(),
                dimensions: None,
                timeout_secs: 30,
                max_retries: 2,
            },
            agent: AgentConfig {
                name: "ConciergeAgent".to_string(),
                max_tool_rounds: 8,
                search_top_k: 3,
                commit_max_attempts: DEFAULT_COMMIT_MAX_ATTEMPTS,
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
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "azure_openai" | "azure" => Ok(Self::AzureOpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|azure_openai|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for EmbeddingProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "azure_openai" | "azure" => Ok(Self::AzureOpenAi),
            "ollama" => Ok(Self::Ollama),
            "hashing" => Ok(Self::Hashing),
            other => Err(ConfigError::Validation(format!(
                "unsupported embedding provider `{other}` (expected openai|azure_openai|ollama|hashing)"
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
                options.config_path.unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// Embedding credentials fall back to the chat model key when both talk to
    /// the same account.
    pub fn embedding_api_key(&self) -> Option<&SecretString> {
        self.embedding.api_key.as_ref().or(self.llm.api_key.as_ref())
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
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(api_version) = llm.api_version {
                self.llm.api_version = Some(api_version);
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

        if let Some(embedding) = patch.embedding {
            if let Some(provider) = embedding.provider {
                self.embedding.provider = provider;
            }
            if let Some(embedding_api_key_value) = embedding.api_key {
                self.embedding.api_key = Some(secret_value(embedding_api_key_value));
            }
            if let Some(base_url) = embedding.base_url {
                self.embedding.base_url = Some(base_url);
            }
            if let Some(api_version) = embedding.api_version {
                self.embedding.api_version = Some(api_version);
            }
            if let Some(model) = embedding.model {
                self.embedding.model = model;
            }
            if let Some(dimensions) = embedding.dimensions {
                self.embedding.dimensions = Some(dimensions);
            }
            if let Some(timeout_secs) = embedding.timeout_secs {
                self.embedding.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = embedding.max_retries {
                self.embedding.max_retries = max_retries;
            }
        }

        if let Some(agent) = patch.agent {
            if let Some(name) = agent.name {
                self.agent.name = name;
            }
            if let Some(max_tool_rounds) = agent.max_tool_rounds {
                self.agent.max_tool_rounds = max_tool_rounds;
            }
            if let Some(search_top_k) = agent.search_top_k {
                self.agent.search_top_k = search_top_k;
            }
            if let Some(commit_max_attempts) = agent.commit_max_attempts {
                self.agent.commit_max_attempts = commit_max_attempts;
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
        if let Some(value) = read_env("CONCIERGE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("CONCIERGE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("CONCIERGE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("CONCIERGE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CONCIERGE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("CONCIERGE_LLM_API_VERSION") {
            self.llm.api_version = Some(value);
        }
        if let Some(value) = read_env("CONCIERGE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("CONCIERGE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("CONCIERGE_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_EMBEDDING_PROVIDER") {
            self.embedding.provider = value.parse()?;
        }
        if let Some(value) = read_env("CONCIERGE_EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("CONCIERGE_EMBEDDING_BASE_URL") {
            self.embedding.base_url = Some(value);
        }
        if let Some(value) = read_env("CONCIERGE_EMBEDDING_API_VERSION") {
            self.embedding.api_version = Some(value);
        }
        if let Some(value) = read_env("CONCIERGE_EMBEDDING_MODEL") {
            self.embedding.model = value;
        }
        if let Some(value) = read_env("CONCIERGE_EMBEDDING_DIMENSIONS") {
            self.embedding.dimensions = Some(parse_u32("CONCIERGE_EMBEDDING_DIMENSIONS", &value)?);
        }
        if let Some(value) = read_env("CONCIERGE_EMBEDDING_TIMEOUT_SECS") {
            self.embedding.timeout_secs = parse_u64("CONCIERGE_EMBEDDING_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_EMBEDDING_MAX_RETRIES") {
            self.embedding.max_retries = parse_u32("CONCIERGE_EMBEDDING_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("CONCIERGE_AGENT_NAME") {
            self.agent.name = value;
        }
        if let Some(value) = read_env("CONCIERGE_AGENT_MAX_TOOL_ROUNDS") {
            self.agent.max_tool_rounds = parse_u32("CONCIERGE_AGENT_MAX_TOOL_ROUNDS", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_AGENT_SEARCH_TOP_K") {
            self.agent.search_top_k = parse_u32("CONCIERGE_AGENT_SEARCH_TOP_K", &value)?;
        }
        if let Some(value) = read_env("CONCIERGE_AGENT_COMMIT_MAX_ATTEMPTS") {
            self.agent.commit_max_attempts =
                parse_u32("CONCIERGE_AGENT_COMMIT_MAX_ATTEMPTS", &value)?;
        }

        let log_level =
            read_env("CONCIERGE_LOGGING_LEVEL").or_else(|| read_env("CONCIERGE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("CONCIERGE_LOGGING_FORMAT").or_else(|| read_env("CONCIERGE_LOG_FORMAT"));
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
        if let Some(llm_api_key) = overrides.llm_api_key {
            self.llm.api_key = Some(secret_value(llm_api_key));
        }
        if let Some(embedding_provider) = overrides.embedding_provider {
            self.embedding.provider = embedding_provider;
        }
        if let Some(embedding_dimensions) = overrides.embedding_dimensions {
            self.embedding.dimensions = Some(embedding_dimensions);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_embedding(&self.embedding, self.embedding_api_key())?;
        validate_agent(&self.agent)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from(CONFIG_FILE_NAME), PathBuf::from(NESTED_CONFIG_FILE)]
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

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
    }

    let key_missing = secret_missing(llm.api_key.as_ref());
    let base_url_missing = value_missing(llm.base_url.as_deref());
    match llm.provider {
        LlmProvider::OpenAi if key_missing => Err(ConfigError::Validation(
            "llm.api_key is required for the openai provider".to_string(),
        )),
        LlmProvider::AzureOpenAi if key_missing => Err(ConfigError::Validation(
            "llm.api_key is required for the azure_openai provider".to_string(),
        )),
        LlmProvider::AzureOpenAi if base_url_missing => Err(ConfigError::Validation(
            "llm.base_url (resource endpoint) is required for the azure_openai provider"
                .to_string(),
        )),
        LlmProvider::AzureOpenAi if value_missing(llm.api_version.as_deref()) => {
            Err(ConfigError::Validation(
                "llm.api_version is required for the azure_openai provider".to_string(),
            ))
        }
        LlmProvider::Ollama if base_url_missing => Err(ConfigError::Validation(
            "llm.base_url is required for the ollama provider".to_string(),
        )),
        _ => Ok(()),
    }
}

fn validate_embedding(
    embedding: &EmbeddingConfig,
    api_key: Option<&SecretString>,
) -> Result<(), ConfigError> {
    if embedding.timeout_secs == 0 || embedding.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "embedding.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if embedding.dimensions == Some(0) {
        return Err(ConfigError::Validation(
            "embedding.dimensions must be greater than zero when set".to_string(),
        ));
    }

    let key_missing = secret_missing(api_key);
    let base_url_missing = value_missing(embedding.base_url.as_deref());
    match embedding.provider {
        EmbeddingProvider::OpenAi | EmbeddingProvider::AzureOpenAi if key_missing => {
            Err(ConfigError::Validation(
                "embedding.api_key (or llm.api_key) is required for openai/azure_openai embeddings"
                    .to_string(),
            ))
        }
        EmbeddingProvider::AzureOpenAi if base_url_missing => Err(ConfigError::Validation(
            "embedding.base_url (resource endpoint) is required for azure_openai embeddings"
                .to_string(),
        )),
        EmbeddingProvider::AzureOpenAi if value_missing(embedding.api_version.as_deref()) => {
            Err(ConfigError::Validation(
                "embedding.api_version is required for azure_openai embeddings".to_string(),
            ))
        }
        EmbeddingProvider::Ollama if base_url_missing => Err(ConfigError::Validation(
            "embedding.base_url is required for ollama embeddings".to_string(),
        )),
        EmbeddingProvider::OpenAi
        | EmbeddingProvider::AzureOpenAi
        | EmbeddingProvider::Ollama
            if embedding.model.trim().is_empty() =>
        {
            Err(ConfigError::Validation("embedding.model must not be empty".to_string()))
        }
        _ => Ok(()),
    }
}

fn validate_agent(agent: &AgentConfig) -> Result<(), ConfigError> {
    if agent.name.trim().is_empty() {
        return Err(ConfigError::Validation("agent.name must not be empty".to_string()));
    }
    if agent.max_tool_rounds == 0 {
        return Err(ConfigError::Validation(
            "agent.max_tool_rounds must be greater than zero".to_string(),
        ));
    }
    if agent.search_top_k == 0 {
        return Err(ConfigError::Validation(
            "agent.search_top_k must be greater than zero".to_string(),
        ));
    }
    if agent.commit_max_attempts == 0 {
        return Err(ConfigError::Validation(
            "agent.commit_max_attempts must be greater than zero".to_string(),
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

fn secret_missing(secret: Option<&SecretString>) -> bool {
    secret.map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true)
}

fn value_missing(value: Option<&str>) -> bool {
    value.map(|value| value.trim().is_empty()).unwrap_or(true)
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    embedding: Option<EmbeddingPatch>,
    agent: Option<AgentPatch>,
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
    api_version: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingPatch {
    provider: Option<EmbeddingProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    api_version: Option<String>,
    model: Option<String>,
    dimensions: Option<u32>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct AgentPatch {
    name: Option<String>,
    max_tool_rounds: Option<u32>,
    search_top_k: Option<u32>,
    commit_max_attempts: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
