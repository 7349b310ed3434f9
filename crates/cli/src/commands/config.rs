use std::env;
use std::fs;
use std::path::Path;

use concierge_agent::embedding::provider_label as embedding_provider_label;
use concierge_agent::llm::provider_label as llm_provider_label;
use concierge_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let line = |key_path: &str, value: String, env_keys: &[&str]| {
        let source = field_source(
            key_path,
            env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        render_line(key_path, &value, source)
    };

    let database = &config.database;
    let llm = &config.llm;
    let embedding = &config.embedding;
    let agent = &config.agent;
    let logging = &config.logging;
    let dimensions = embedding
        .dimensions
        .map(|dimensions| dimensions.to_string())
        .unwrap_or_else(|| "<model default>".to_string());

    let lines = vec![
        "effective config (source precedence: env > file > default):".to_string(),
        line("database.url", database.url.clone(), &["CONCIERGE_DATABASE_URL"]),
        line(
            "database.max_connections",
            database.max_connections.to_string(),
            &["CONCIERGE_DATABASE_MAX_CONNECTIONS"],
        ),
        line(
            "database.timeout_secs",
            database.timeout_secs.to_string(),
            &["CONCIERGE_DATABASE_TIMEOUT_SECS"],
        ),
        line(
            "llm.provider",
            llm_provider_label(llm.provider).to_string(),
            &["CONCIERGE_LLM_PROVIDER"],
        ),
        line("llm.model", llm.model.clone(), &["CONCIERGE_LLM_MODEL"]),
        line("llm.base_url", optional(llm.base_url.as_deref()), &["CONCIERGE_LLM_BASE_URL"]),
        line(
            "llm.api_version",
            optional(llm.api_version.as_deref()),
            &["CONCIERGE_LLM_API_VERSION"],
        ),
        line("llm.api_key", redact_secret(llm.api_key.as_ref()), &["CONCIERGE_LLM_API_KEY"]),
        line("llm.timeout_secs", llm.timeout_secs.to_string(), &["CONCIERGE_LLM_TIMEOUT_SECS"]),
        line("llm.max_retries", llm.max_retries.to_string(), &["CONCIERGE_LLM_MAX_RETRIES"]),
        line(
            "embedding.provider",
            embedding_provider_label(embedding.provider).to_string(),
            &["CONCIERGE_EMBEDDING_PROVIDER"],
        ),
        line("embedding.model", embedding.model.clone(), &["CONCIERGE_EMBEDDING_MODEL"]),
        line(
            "embedding.base_url",
            optional(embedding.base_url.as_deref()),
            &["CONCIERGE_EMBEDDING_BASE_URL"],
        ),
        line(
            "embedding.api_key",
            redact_secret(embedding.api_key.as_ref()),
            &["CONCIERGE_EMBEDDING_API_KEY"],
        ),
        line("embedding.dimensions", dimensions, &["CONCIERGE_EMBEDDING_DIMENSIONS"]),
        line("agent.name", agent.name.clone(), &["CONCIERGE_AGENT_NAME"]),
        line(
            "agent.max_tool_rounds",
            agent.max_tool_rounds.to_string(),
            &["CONCIERGE_AGENT_MAX_TOOL_ROUNDS"],
        ),
        line(
            "agent.search_top_k",
            agent.search_top_k.to_string(),
            &["CONCIERGE_AGENT_SEARCH_TOP_K"],
        ),
        line(
            "agent.commit_max_attempts",
            agent.commit_max_attempts.to_string(),
            &["CONCIERGE_AGENT_COMMIT_MAX_ATTEMPTS"],
        ),
        line(
            "logging.level",
            logging.level.clone(),
            &["CONCIERGE_LOGGING_LEVEL", "CONCIERGE_LOG_LEVEL"],
        ),
        line(
            "logging.format",
            format!("{:?}", logging.format).to_lowercase(),
            &["CONCIERGE_LOGGING_FORMAT", "CONCIERGE_LOG_FORMAT"],
        ),
    ];

    lines.join("\n")
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn optional(value: Option<&str>) -> String {
    value.unwrap_or("<unset>").to_string()
}

fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}
