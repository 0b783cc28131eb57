use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use aquabot_core::config::{AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use toml::Value;

use super::{serialize_payload, CommandResult};

#[derive(Debug, Serialize)]
struct ConfigEntry {
    key: &'static str,
    value: String,
    source: String,
}

#[derive(Debug, Serialize)]
struct ConfigReport {
    config_file: Option<String>,
    entries: Vec<ConfigEntry>,
}

pub fn run(json_output: bool) -> CommandResult {
    run_with(None, json_output)
}

/// Effective configuration with per-field source attribution; secrets are never printed.
pub fn run_with(config_path: Option<PathBuf>, json_output: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions {
        config_path: config_path.clone(),
        require_file: config_path.is_some(),
        ..LoadOptions::default()
    }) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("config", "config_validation", error.to_string(), 2)
        }
    };

    let file_path = config_path.filter(|path| path.exists()).or_else(detect_config_path);
    let file_doc = load_config_file_doc(file_path.as_deref());
    let entries = fields(&config)
        .into_iter()
        .map(|(key, value, env_key)| ConfigEntry {
            key,
            value,
            source: field_source(key, env_key, file_doc.as_ref(), file_path.as_deref()),
        })
        .collect();
    let report = ConfigReport {
        config_file: file_path.map(|path| path.display().to_string()),
        entries,
    };

    if json_output {
        return CommandResult::success(serialize_payload(&report));
    }
    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(
        report
            .entries
            .iter()
            .map(|entry| format!("- {} = {} (source: {})", entry.key, entry.value, entry.source)),
    );
    CommandResult::success(lines.join("\n"))
}

fn fields(config: &AppConfig) -> Vec<(&'static str, String, &'static str)> {
    vec![
        ("server.bind_address", config.server.bind_address.clone(), "AQUABOT_SERVER_BIND_ADDRESS"),
        ("server.port", config.server.port.to_string(), "AQUABOT_SERVER_PORT"),
        ("logging.level", config.logging.level.clone(), "AQUABOT_LOGGING_LEVEL"),
        ("logging.format", format!("{:?}", config.logging.format), "AQUABOT_LOGGING_FORMAT"),
        (
            "session.ttl_minutes",
            config.session.ttl_minutes.to_string(),
            "AQUABOT_SESSION_TTL_MINUTES",
        ),
        (
            "session.utc_offset_hours",
            config.session.utc_offset_hours.to_string(),
            "AQUABOT_SESSION_UTC_OFFSET_HOURS",
        ),
        (
            "catalog.base_url",
            optional(config.catalog.base_url.as_deref()),
            "AQUABOT_CATALOG_BASE_URL",
        ),
        (
            "catalog.consumer_key",
            redact(config.catalog.consumer_key.as_ref()),
            "AQUABOT_CATALOG_CONSUMER_KEY",
        ),
        (
            "catalog.consumer_secret",
            redact(config.catalog.consumer_secret.as_ref()),
            "AQUABOT_CATALOG_CONSUMER_SECRET",
        ),
        (
            "catalog.cache_ttl_secs",
            config.catalog.cache_ttl_secs.to_string(),
            "AQUABOT_CATALOG_CACHE_TTL_SECS",
        ),
        ("crm.enabled", config.crm.enabled.to_string(), "AQUABOT_CRM_ENABLED"),
        ("crm.api_key", redact(config.crm.api_key.as_ref()), "AQUABOT_CRM_API_KEY"),
        (
            "whatsapp.phone_number_id",
            optional(config.whatsapp.phone_number_id.as_deref()),
            "AQUABOT_WHATSAPP_PHONE_NUMBER_ID",
        ),
        ("whatsapp.token", redact(config.whatsapp.token.as_ref()), "AQUABOT_WHATSAPP_TOKEN"),
        (
            "whatsapp.verify_token",
            redact(config.whatsapp.verify_token.as_ref()),
            "AQUABOT_WHATSAPP_VERIFY_TOKEN",
        ),
        (
            "twilio.account_sid",
            optional(config.twilio.account_sid.as_deref()),
            "AQUABOT_TWILIO_ACCOUNT_SID",
        ),
        (
            "twilio.auth_token",
            redact(config.twilio.auth_token.as_ref()),
            "AQUABOT_TWILIO_AUTH_TOKEN",
        ),
        (
            "twilio.whatsapp_from",
            optional(config.twilio.whatsapp_from.as_deref()),
            "AQUABOT_TWILIO_WHATSAPP_FROM",
        ),
        ("llm.model", config.llm.model.clone(), "AQUABOT_LLM_MODEL"),
        ("llm.api_key", redact(config.llm.api_key.as_ref()), "AQUABOT_LLM_API_KEY"),
        ("idle.enabled", config.idle.enabled.to_string(), "AQUABOT_IDLE_ENABLED"),
        (
            "idle.followup_after_minutes",
            config.idle.followup_after_minutes.to_string(),
            "AQUABOT_IDLE_FOLLOWUP_AFTER_MINUTES",
        ),
        (
            "idle.final_after_minutes",
            config.idle.final_after_minutes.to_string(),
            "AQUABOT_IDLE_FINAL_AFTER_MINUTES",
        ),
        (
            "knowledge.path",
            optional(config.knowledge.path.as_deref().and_then(Path::to_str)),
            "AQUABOT_KNOWLEDGE_PATH",
        ),
        ("test_mode.enabled", config.test_mode.enabled.to_string(), "AQUABOT_TEST_MODE_ENABLED"),
        (
            "test_mode.allowed_numbers",
            format!("{} numbers", config.test_mode.allowed_numbers.len()),
            "AQUABOT_TEST_MODE_ALLOWED_NUMBERS",
        ),
    ]
}

fn optional(value: Option<&str>) -> String {
    value.map(str::to_string).unwrap_or_else(|| "<unset>".to_string())
}

fn redact(secret: Option<&SecretString>) -> String {
    match secret {
        Some(secret) if !secret.expose_secret().trim().is_empty() => "<redacted>".to_string(),
        Some(_) => "<empty>".to_string(),
        None => "<unset>".to_string(),
    }
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("aquabot.toml"), PathBuf::from("config/aquabot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
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
