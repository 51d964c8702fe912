use std::env;
use std::fs;
use std::path::Path;

use signoff_core::config::{resolve_config_path, AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    for (key_path, env_keys) in FIELDS {
        let source =
            field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key_path, &effective_value(&config, key_path), source));
    }

    lines.join("\n")
}

const FIELDS: &[(&str, &[&str])] = &[
    ("database.url", &["SIGNOFF_DATABASE_URL"]),
    ("database.max_connections", &["SIGNOFF_DATABASE_MAX_CONNECTIONS"]),
    ("database.timeout_secs", &["SIGNOFF_DATABASE_TIMEOUT_SECS"]),
    ("approval.acceptance_required_for_approval", &["SIGNOFF_APPROVAL_ACCEPTANCE_REQUIRED"]),
    ("approval.cache_max_entries", &["SIGNOFF_APPROVAL_CACHE_MAX_ENTRIES"]),
    ("approval.cache_idle_secs", &["SIGNOFF_APPROVAL_CACHE_IDLE_SECS"]),
    ("logging.level", &["SIGNOFF_LOGGING_LEVEL", "SIGNOFF_LOG_LEVEL"]),
    ("logging.format", &["SIGNOFF_LOGGING_FORMAT", "SIGNOFF_LOG_FORMAT"]),
];

fn effective_value(config: &AppConfig, key_path: &str) -> String {
    match key_path {
        "database.url" => config.database.url.clone(),
        "database.max_connections" => config.database.max_connections.to_string(),
        "database.timeout_secs" => config.database.timeout_secs.to_string(),
        "approval.acceptance_required_for_approval" => {
            config.approval.acceptance_required_for_approval.to_string()
        }
        "approval.cache_max_entries" => config.approval.cache_max_entries.to_string(),
        "approval.cache_idle_secs" => config.approval.cache_idle_secs.to_string(),
        "logging.level" => config.logging.level.clone(),
        "logging.format" => format!("{:?}", config.logging.format),
        _ => "<unknown>".to_string(),
    }
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
