use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::session::IdlePolicy;
use crate::text::normalize_phone;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
    pub catalog: CatalogConfig,
    pub crm: CrmConfig,
    pub whatsapp: WhatsAppConfig,
    pub twilio: TwilioConfig,
    pub llm: LlmConfig,
    pub idle: IdleConfig,
    pub knowledge: KnowledgeConfig,
    pub test_mode: TestModeConfig,
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

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub ttl_minutes: u64,
    pub greeting_window_hours: u64,
    /// Offset from UTC used to pick the time-of-day greeting.
    pub utc_offset_hours: i32,
}

#[derive(Clone, Debug)]
pub struct CatalogConfig {
    pub base_url: Option<String>,
    pub consumer_key: Option<SecretString>,
    pub consumer_secret: Option<SecretString>,
    pub cache_ttl_secs: u64,
    pub page_size: u32,
    pub max_pages: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub enabled: bool,
    pub base_url: String,
    pub api_key: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct WhatsAppConfig {
    pub base_url: String,
    pub phone_number_id: Option<String>,
    pub token: Option<SecretString>,
    pub verify_token: Option<SecretString>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct TwilioConfig {
    pub base_url: String,
    pub account_sid: Option<String>,
    pub auth_token: Option<SecretString>,
    pub whatsapp_from: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub intent: bool,
    pub planner: bool,
    pub rerank: bool,
    pub consultant: bool,
    pub intent_min_confidence: f64,
}

#[derive(Clone, Debug)]
pub struct IdleConfig {
    pub enabled: bool,
    pub followup_after_minutes: u64,
    pub final_after_minutes: u64,
    pub check_interval_secs: u64,
    pub max_followups: u32,
    pub followup_message: String,
    pub final_message: String,
}

#[derive(Clone, Debug)]
pub struct KnowledgeConfig {
    pub path: Option<PathBuf>,
    pub min_score: u32,
    pub require_verified: bool,
}

#[derive(Clone, Debug)]
pub struct TestModeConfig {
    pub enabled: bool,
    pub allowed_numbers: Vec<String>,
    pub tag: String,
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
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub bind_address: Option<String>,
    pub port: Option<u16>,
    pub catalog_base_url: Option<String>,
    pub llm_model: Option<String>,
    pub idle_enabled: Option<bool>,
    pub test_mode_enabled: Option<bool>,
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

pub const DEFAULT_FOLLOWUP_MESSAGE: &str = "¿Sigues por ahí? Si quieres, te ayudo a encontrar el producto que necesitas con precio y stock.";
pub const DEFAULT_FINAL_MESSAGE: &str = "Cerramos esta conversación por inactividad. Cuando quieras, escríbenos de nuevo y con gusto te ayudamos.";

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8000,
                graceful_shutdown_secs: 15,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
            session: SessionConfig {
                ttl_minutes: 120,
                greeting_window_hours: 6,
                utc_offset_hours: -5,
            },
            catalog: CatalogConfig {
                base_url: None,
                consumer_key: None,
                consumer_secret: None,
                cache_ttl_secs: 600,
                page_size: 100,
                max_pages: 30,
                timeout_secs: 15,
            },
            crm: CrmConfig {
                enabled: false,
                base_url: "https://api.clientify.net/v1".to_string(),
                api_key: None,
                timeout_secs: 15,
            },
            whatsapp: WhatsAppConfig {
                base_url: "https://graph.facebook.com/v19.0".to_string(),
                phone_number_id: None,
                token: None,
                verify_token: None,
                timeout_secs: 15,
            },
            twilio: TwilioConfig {
                base_url: "https://api.twilio.com".to_string(),
                account_sid: None,
                auth_token: None,
                whatsapp_from: None,
                timeout_secs: 15,
            },
            llm: LlmConfig {
                api_key: None,
                base_url: "https://api.openai.com/v1".to_string(),
                model: "gpt-4o-mini".to_string(),
                timeout_secs: 20,
                intent: true,
                planner: true,
                rerank: true,
                consultant: true,
                intent_min_confidence: 0.7,
            },
            idle: IdleConfig {
                enabled: false,
                followup_after_minutes: 15,
                final_after_minutes: 60,
                check_interval_secs: 60,
                max_followups: 1,
                followup_message: DEFAULT_FOLLOWUP_MESSAGE.to_string(),
                final_message: DEFAULT_FINAL_MESSAGE.to_string(),
            },
            knowledge: KnowledgeConfig { path: None, min_score: 2, require_verified: true },
            test_mode: TestModeConfig {
                enabled: false,
                allowed_numbers: Vec::new(),
                tag: "[TEST]".to_string(),
            },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
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

impl LlmConfig {
    pub fn has_api_key(&self) -> bool {
        self.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }

    /// A helper runs only when its toggle is on and a key is configured.
    pub fn helper_enabled(&self, toggle: bool) -> bool {
        toggle && self.has_api_key()
    }
}

impl CatalogConfig {
    pub fn is_configured(&self) -> bool {
        self.base_url.as_deref().is_some_and(|url| !url.trim().is_empty())
    }
}

const MAX_MINUTES: u64 = 525_600 * 100;

fn bounded_minutes(value: u64) -> Duration {
    Duration::minutes(i64::try_from(value.min(MAX_MINUTES)).unwrap_or(0))
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        bounded_minutes(self.ttl_minutes)
    }

    pub fn greeting_window(&self) -> Duration {
        bounded_minutes(self.greeting_window_hours.saturating_mul(60))
    }
}

impl IdleConfig {
    pub fn policy(&self) -> IdlePolicy {
        IdlePolicy::new(
            bounded_minutes(self.followup_after_minutes),
            bounded_minutes(self.final_after_minutes),
            self.max_followups,
        )
    }

    pub fn check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.check_interval_secs.max(10))
    }
}

impl TestModeConfig {
    /// Callers outside a non-empty allow-list are ignored while test mode is on.
    pub fn allows(&self, phone: &str) -> bool {
        if !self.enabled || self.allowed_numbers.is_empty() {
            return true;
        }
        let phone = normalize_phone(phone);
        self.allowed_numbers.iter().any(|allowed| *allowed == phone)
    }

    pub fn tagged(&self, text: &str) -> String {
        let tag = self.tag.trim();
        if !self.enabled || tag.is_empty() {
            return text.to_string();
        }
        format!("{tag} {text}")
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("aquabot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
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

        if let Some(session) = patch.session {
            if let Some(ttl_minutes) = session.ttl_minutes {
                self.session.ttl_minutes = ttl_minutes;
            }
            if let Some(greeting_window_hours) = session.greeting_window_hours {
                self.session.greeting_window_hours = greeting_window_hours;
            }
            if let Some(utc_offset_hours) = session.utc_offset_hours {
                self.session.utc_offset_hours = utc_offset_hours;
            }
        }

        if let Some(catalog) = patch.catalog {
            if let Some(base_url) = catalog.base_url {
                self.catalog.base_url = Some(base_url);
            }
            if let Some(consumer_key_value) = catalog.consumer_key {
                self.catalog.consumer_key = Some(secret_value(consumer_key_value));
            }
            if let Some(consumer_secret_value) = catalog.consumer_secret {
                self.catalog.consumer_secret = Some(secret_value(consumer_secret_value));
            }
            if let Some(cache_ttl_secs) = catalog.cache_ttl_secs {
                self.catalog.cache_ttl_secs = cache_ttl_secs;
            }
            if let Some(page_size) = catalog.page_size {
                self.catalog.page_size = page_size;
            }
            if let Some(max_pages) = catalog.max_pages {
                self.catalog.max_pages = max_pages;
            }
            if let Some(timeout_secs) = catalog.timeout_secs {
                self.catalog.timeout_secs = timeout_secs;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(enabled) = crm.enabled {
                self.crm.enabled = enabled;
            }
            if let Some(base_url) = crm.base_url {
                self.crm.base_url = base_url;
            }
            if let Some(crm_api_key_value) = crm.api_key {
                self.crm.api_key = Some(secret_value(crm_api_key_value));
            }
            if let Some(timeout_secs) = crm.timeout_secs {
                self.crm.timeout_secs = timeout_secs;
            }
        }

        if let Some(whatsapp) = patch.whatsapp {
            if let Some(base_url) = whatsapp.base_url {
                self.whatsapp.base_url = base_url;
            }
            if let Some(phone_number_id) = whatsapp.phone_number_id {
                self.whatsapp.phone_number_id = Some(phone_number_id);
            }
            if let Some(whatsapp_token_value) = whatsapp.token {
                self.whatsapp.token = Some(secret_value(whatsapp_token_value));
            }
            if let Some(verify_token_value) = whatsapp.verify_token {
                self.whatsapp.verify_token = Some(secret_value(verify_token_value));
            }
            if let Some(timeout_secs) = whatsapp.timeout_secs {
                self.whatsapp.timeout_secs = timeout_secs;
            }
        }

        if let Some(twilio) = patch.twilio {
            if let Some(base_url) = twilio.base_url {
                self.twilio.base_url = base_url;
            }
            if let Some(account_sid) = twilio.account_sid {
                self.twilio.account_sid = Some(account_sid);
            }
            if let Some(auth_token_value) = twilio.auth_token {
                self.twilio.auth_token = Some(secret_value(auth_token_value));
            }
            if let Some(whatsapp_from) = twilio.whatsapp_from {
                self.twilio.whatsapp_from = Some(whatsapp_from);
            }
            if let Some(timeout_secs) = twilio.timeout_secs {
                self.twilio.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
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
            if let Some(intent) = llm.intent {
                self.llm.intent = intent;
            }
            if let Some(planner) = llm.planner {
                self.llm.planner = planner;
            }
            if let Some(rerank) = llm.rerank {
                self.llm.rerank = rerank;
            }
            if let Some(consultant) = llm.consultant {
                self.llm.consultant = consultant;
            }
            if let Some(intent_min_confidence) = llm.intent_min_confidence {
                self.llm.intent_min_confidence = intent_min_confidence;
            }
        }

        if let Some(idle) = patch.idle {
            if let Some(enabled) = idle.enabled {
                self.idle.enabled = enabled;
            }
            if let Some(followup_after_minutes) = idle.followup_after_minutes {
                self.idle.followup_after_minutes = followup_after_minutes;
            }
            if let Some(final_after_minutes) = idle.final_after_minutes {
                self.idle.final_after_minutes = final_after_minutes;
            }
            if let Some(check_interval_secs) = idle.check_interval_secs {
                self.idle.check_interval_secs = check_interval_secs;
            }
            if let Some(max_followups) = idle.max_followups {
                self.idle.max_followups = max_followups;
            }
            if let Some(followup_message) = idle.followup_message {
                self.idle.followup_message = followup_message;
            }
            if let Some(final_message) = idle.final_message {
                self.idle.final_message = final_message;
            }
        }

        if let Some(knowledge) = patch.knowledge {
            if let Some(path) = knowledge.path {
                self.knowledge.path = Some(path);
            }
            if let Some(min_score) = knowledge.min_score {
                self.knowledge.min_score = min_score;
            }
            if let Some(require_verified) = knowledge.require_verified {
                self.knowledge.require_verified = require_verified;
            }
        }

        if let Some(test_mode) = patch.test_mode {
            if let Some(enabled) = test_mode.enabled {
                self.test_mode.enabled = enabled;
            }
            if let Some(allowed_numbers) = test_mode.allowed_numbers {
                self.test_mode.allowed_numbers = normalize_numbers(allowed_numbers);
            }
            if let Some(tag) = test_mode.tag {
                self.test_mode.tag = tag;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("AQUABOT_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        let port = read_env("AQUABOT_SERVER_PORT")
            .map(|value| ("AQUABOT_SERVER_PORT", value))
            .or_else(|| read_env("AQUABOT_PORT").map(|value| ("AQUABOT_PORT", value)));
        if let Some((key, value)) = port {
            self.server.port = parse_u16(key, &value)?;
        }
        if let Some(value) = read_env("AQUABOT_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("AQUABOT_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("AQUABOT_LOGGING_LEVEL").or_else(|| read_env("AQUABOT_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("AQUABOT_LOGGING_FORMAT").or_else(|| read_env("AQUABOT_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        if let Some(value) = read_env("AQUABOT_SESSION_TTL_MINUTES") {
            self.session.ttl_minutes = parse_u64("AQUABOT_SESSION_TTL_MINUTES", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_SESSION_GREETING_WINDOW_HOURS") {
            self.session.greeting_window_hours =
                parse_u64("AQUABOT_SESSION_GREETING_WINDOW_HOURS", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_SESSION_UTC_OFFSET_HOURS") {
            self.session.utc_offset_hours = parse_i32("AQUABOT_SESSION_UTC_OFFSET_HOURS", &value)?;
        }

        if let Some(value) = read_env("AQUABOT_CATALOG_BASE_URL") {
            self.catalog.base_url = Some(value);
        }
        if let Some(value) = read_env("AQUABOT_CATALOG_CONSUMER_KEY") {
            self.catalog.consumer_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("AQUABOT_CATALOG_CONSUMER_SECRET") {
            self.catalog.consumer_secret = Some(secret_value(value));
        }
        if let Some(value) = read_env("AQUABOT_CATALOG_CACHE_TTL_SECS") {
            self.catalog.cache_ttl_secs = parse_u64("AQUABOT_CATALOG_CACHE_TTL_SECS", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_CATALOG_PAGE_SIZE") {
            self.catalog.page_size = parse_u32("AQUABOT_CATALOG_PAGE_SIZE", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_CATALOG_MAX_PAGES") {
            self.catalog.max_pages = parse_u32("AQUABOT_CATALOG_MAX_PAGES", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = parse_u64("AQUABOT_CATALOG_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("AQUABOT_CRM_ENABLED") {
            self.crm.enabled = parse_bool("AQUABOT_CRM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_CRM_BASE_URL") {
            self.crm.base_url = value;
        }
        if let Some(value) = read_env("AQUABOT_CRM_API_KEY") {
            self.crm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("AQUABOT_CRM_TIMEOUT_SECS") {
            self.crm.timeout_secs = parse_u64("AQUABOT_CRM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("AQUABOT_WHATSAPP_BASE_URL") {
            self.whatsapp.base_url = value;
        }
        if let Some(value) = read_env("AQUABOT_WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = Some(value);
        }
        if let Some(value) = read_env("AQUABOT_WHATSAPP_TOKEN") {
            self.whatsapp.token = Some(secret_value(value));
        }
        if let Some(value) = read_env("AQUABOT_WHATSAPP_VERIFY_TOKEN") {
            self.whatsapp.verify_token = Some(secret_value(value));
        }

        if let Some(value) = read_env("AQUABOT_TWILIO_ACCOUNT_SID") {
            self.twilio.account_sid = Some(value);
        }
        if let Some(value) = read_env("AQUABOT_TWILIO_AUTH_TOKEN") {
            self.twilio.auth_token = Some(secret_value(value));
        }
        if let Some(value) = read_env("AQUABOT_TWILIO_WHATSAPP_FROM") {
            self.twilio.whatsapp_from = Some(value);
        }

        if let Some(value) = read_env("AQUABOT_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("AQUABOT_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("AQUABOT_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("AQUABOT_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("AQUABOT_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_LLM_INTENT") {
            self.llm.intent = parse_bool("AQUABOT_LLM_INTENT", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_LLM_PLANNER") {
            self.llm.planner = parse_bool("AQUABOT_LLM_PLANNER", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_LLM_RERANK") {
            self.llm.rerank = parse_bool("AQUABOT_LLM_RERANK", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_LLM_CONSULTANT") {
            self.llm.consultant = parse_bool("AQUABOT_LLM_CONSULTANT", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_LLM_INTENT_MIN_CONFIDENCE") {
            self.llm.intent_min_confidence =
                parse_f64("AQUABOT_LLM_INTENT_MIN_CONFIDENCE", &value)?;
        }

        if let Some(value) = read_env("AQUABOT_IDLE_ENABLED") {
            self.idle.enabled = parse_bool("AQUABOT_IDLE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_IDLE_FOLLOWUP_AFTER_MINUTES") {
            self.idle.followup_after_minutes =
                parse_u64("AQUABOT_IDLE_FOLLOWUP_AFTER_MINUTES", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_IDLE_FINAL_AFTER_MINUTES") {
            self.idle.final_after_minutes = parse_u64("AQUABOT_IDLE_FINAL_AFTER_MINUTES", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_IDLE_CHECK_INTERVAL_SECS") {
            self.idle.check_interval_secs = parse_u64("AQUABOT_IDLE_CHECK_INTERVAL_SECS", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_IDLE_MAX_FOLLOWUPS") {
            self.idle.max_followups = parse_u32("AQUABOT_IDLE_MAX_FOLLOWUPS", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_IDLE_FOLLOWUP_MESSAGE") {
            self.idle.followup_message = value;
        }
        if let Some(value) = read_env("AQUABOT_IDLE_FINAL_MESSAGE") {
            self.idle.final_message = value;
        }

        if let Some(value) = read_env("AQUABOT_KNOWLEDGE_PATH") {
            self.knowledge.path = Some(PathBuf::from(value));
        }
        if let Some(value) = read_env("AQUABOT_KNOWLEDGE_MIN_SCORE") {
            self.knowledge.min_score = parse_u32("AQUABOT_KNOWLEDGE_MIN_SCORE", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_KNOWLEDGE_REQUIRE_VERIFIED") {
            self.knowledge.require_verified =
                parse_bool("AQUABOT_KNOWLEDGE_REQUIRE_VERIFIED", &value)?;
        }

        if let Some(value) = read_env("AQUABOT_TEST_MODE_ENABLED") {
            self.test_mode.enabled = parse_bool("AQUABOT_TEST_MODE_ENABLED", &value)?;
        }
        if let Some(value) = read_env("AQUABOT_TEST_MODE_ALLOWED_NUMBERS") {
            self.test_mode.allowed_numbers =
                normalize_numbers(value.split(',').map(str::to_string).collect());
        }
        if let Some(value) = read_env("AQUABOT_TEST_MODE_TAG") {
            self.test_mode.tag = value;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(bind_address) = overrides.bind_address {
            self.server.bind_address = bind_address;
        }
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(catalog_base_url) = overrides.catalog_base_url {
            self.catalog.base_url = Some(catalog_base_url);
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(idle_enabled) = overrides.idle_enabled {
            self.idle.enabled = idle_enabled;
        }
        if let Some(test_mode_enabled) = overrides.test_mode_enabled {
            self.test_mode.enabled = test_mode_enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        validate_session(&self.session, &self.idle)?;
        validate_catalog(&self.catalog)?;
        validate_crm(&self.crm)?;
        validate_channels(&self.whatsapp, &self.twilio)?;
        validate_llm(&self.llm)?;
        validate_knowledge(&self.knowledge)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("aquabot.toml"), PathBuf::from("config/aquabot.toml")]
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

fn normalize_numbers(raw: Vec<String>) -> Vec<String> {
    raw.iter().map(|number| normalize_phone(number)).filter(|number| !number.is_empty()).collect()
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn secret_missing(secret: Option<&SecretString>) -> bool {
    secret.map(|value| value.expose_secret().trim().is_empty()).unwrap_or(true)
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

fn validate_session(session: &SessionConfig, idle: &IdleConfig) -> Result<(), ConfigError> {
    if session.ttl_minutes == 0 {
        return Err(ConfigError::Validation(
            "session.ttl_minutes must be greater than zero".to_string(),
        ));
    }

    if session.greeting_window_hours == 0 {
        return Err(ConfigError::Validation(
            "session.greeting_window_hours must be greater than zero".to_string(),
        ));
    }

    if !(-12..=14).contains(&session.utc_offset_hours) {
        return Err(ConfigError::Validation(
            "session.utc_offset_hours must be in range -12..=14".to_string(),
        ));
    }

    if idle.enabled && session.ttl_minutes <= idle.final_after_minutes {
        return Err(ConfigError::Validation(format!(
            "session.ttl_minutes ({}) must exceed idle.final_after_minutes ({}) so idle sessions \
             are still present when the final message is due",
            session.ttl_minutes, idle.final_after_minutes
        )));
    }

    Ok(())
}

fn validate_catalog(catalog: &CatalogConfig) -> Result<(), ConfigError> {
    if let Some(base_url) = &catalog.base_url {
        if !is_http_url(base_url) {
            return Err(ConfigError::Validation(
                "catalog.base_url must start with http:// or https://".to_string(),
            ));
        }
        if secret_missing(catalog.consumer_key.as_ref())
            || secret_missing(catalog.consumer_secret.as_ref())
        {
            return Err(ConfigError::Validation(
                "catalog.consumer_key and catalog.consumer_secret are required when catalog.base_url is set. Create them in WooCommerce > Settings > Advanced > REST API".to_string(),
            ));
        }
    }

    if catalog.cache_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "catalog.cache_ttl_secs must be greater than zero".to_string(),
        ));
    }

    if catalog.page_size == 0 || catalog.page_size > 100 {
        return Err(ConfigError::Validation(
            "catalog.page_size must be in range 1..=100".to_string(),
        ));
    }

    if catalog.max_pages == 0 {
        return Err(ConfigError::Validation(
            "catalog.max_pages must be greater than zero".to_string(),
        ));
    }

    if catalog.timeout_secs == 0 || catalog.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "catalog.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    if crm.enabled && secret_missing(crm.api_key.as_ref()) {
        return Err(ConfigError::Validation(
            "crm.enabled is true but crm.api_key is missing. Get it from Clientify > Settings > API"
                .to_string(),
        ));
    }

    if !is_http_url(&crm.base_url) {
        return Err(ConfigError::Validation(
            "crm.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_channels(whatsapp: &WhatsAppConfig, twilio: &TwilioConfig) -> Result<(), ConfigError> {
    if !is_http_url(&whatsapp.base_url) {
        return Err(ConfigError::Validation(
            "whatsapp.base_url must start with http:// or https://".to_string(),
        ));
    }

    if whatsapp.phone_number_id.is_some() && secret_missing(whatsapp.token.as_ref()) {
        return Err(ConfigError::Validation(
            "whatsapp.token is required when whatsapp.phone_number_id is set".to_string(),
        ));
    }

    if !is_http_url(&twilio.base_url) {
        return Err(ConfigError::Validation(
            "twilio.base_url must start with http:// or https://".to_string(),
        ));
    }

    if twilio.account_sid.is_some() && secret_missing(twilio.auth_token.as_ref()) {
        return Err(ConfigError::Validation(
            "twilio.auth_token is required when twilio.account_sid is set".to_string(),
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

    if !(0.0..=1.0).contains(&llm.intent_min_confidence) {
        return Err(ConfigError::Validation(
            "llm.intent_min_confidence must be in range 0.0..=1.0".to_string(),
        ));
    }

    if !is_http_url(&llm.base_url) {
        return Err(ConfigError::Validation(
            "llm.base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_knowledge(knowledge: &KnowledgeConfig) -> Result<(), ConfigError> {
    if knowledge.min_score == 0 {
        return Err(ConfigError::Validation(
            "knowledge.min_score must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
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

fn parse_i32(key: &str, value: &str) -> Result<i32, ConfigError> {
    value.trim().parse::<i32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
    session: Option<SessionPatch>,
    catalog: Option<CatalogPatch>,
    crm: Option<CrmPatch>,
    whatsapp: Option<WhatsAppPatch>,
    twilio: Option<TwilioPatch>,
    llm: Option<LlmPatch>,
    idle: Option<IdlePatch>,
    knowledge: Option<KnowledgePatch>,
    test_mode: Option<TestModePatch>,
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

#[derive(Debug, Default, Deserialize)]
struct SessionPatch {
    ttl_minutes: Option<u64>,
    greeting_window_hours: Option<u64>,
    utc_offset_hours: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct CatalogPatch {
    base_url: Option<String>,
    consumer_key: Option<String>,
    consumer_secret: Option<String>,
    cache_ttl_secs: Option<u64>,
    page_size: Option<u32>,
    max_pages: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    enabled: Option<bool>,
    base_url: Option<String>,
    api_key: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct WhatsAppPatch {
    base_url: Option<String>,
    phone_number_id: Option<String>,
    token: Option<String>,
    verify_token: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TwilioPatch {
    base_url: Option<String>,
    account_sid: Option<String>,
    auth_token: Option<String>,
    whatsapp_from: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    intent: Option<bool>,
    planner: Option<bool>,
    rerank: Option<bool>,
    consultant: Option<bool>,
    intent_min_confidence: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct IdlePatch {
    enabled: Option<bool>,
    followup_after_minutes: Option<u64>,
    final_after_minutes: Option<u64>,
    check_interval_secs: Option<u64>,
    max_followups: Option<u32>,
    followup_message: Option<String>,
    final_message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct KnowledgePatch {
    path: Option<PathBuf>,
    min_score: Option<u32>,
    require_verified: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct TestModePatch {
    enabled: Option<bool>,
    allowed_numbers: Option<Vec<String>>,
    tag: Option<String>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn isolated_options() -> Result<(TempDir, LoadOptions), String> {
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let options = LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            ..LoadOptions::default()
        };
        Ok((dir, options))
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_WOO_KEY", "ck_from_env");
        env::set_var("TEST_WOO_SECRET", "cs_from_env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("aquabot.toml");
            fs::write(
                &path,
                r#"
[catalog]
base_url = "https://shop.example.co"
consumer_key = "${TEST_WOO_KEY}"
consumer_secret = "${TEST_WOO_SECRET}"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config
                    .catalog
                    .consumer_key
                    .as_ref()
                    .is_some_and(|key| key.expose_secret() == "ck_from_env"),
                "consumer key should be loaded from environment",
            )?;
            ensure(config.catalog.is_configured(), "catalog should be configured")?;
            Ok(())
        })();

        clear_vars(&["TEST_WOO_KEY", "TEST_WOO_SECRET"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("aquabot.toml");
        fs::write(&path, "[crm]\napi_key = \"${TEST_AQUABOT_UNSET_VAR}\"\n")
            .map_err(|err| err.to_string())?;

        match AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() }) {
            Err(ConfigError::MissingEnvInterpolation { var }) => {
                ensure(var == "TEST_AQUABOT_UNSET_VAR", "error should name the variable")
            }
            Err(other) => Err(format!("unexpected error: {other}")),
            Ok(_) => Err("expected interpolation failure".to_string()),
        }
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AQUABOT_LOG_LEVEL", "warn");
        env::set_var("AQUABOT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let (_dir, options) = isolated_options()?;
            let config =
                AppConfig::load(options).map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["AQUABOT_LOG_LEVEL", "AQUABOT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AQUABOT_SERVER_PORT", "9100");
        env::set_var("AQUABOT_LLM_MODEL", "model-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("aquabot.toml");
            fs::write(
                &path,
                r#"
[server]
port = 9000

[llm]
model = "model-from-file"

[session]
ttl_minutes = 240

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    llm_model: Some("model-from-override".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.server.port == 9100, "env port should win over file")?;
            ensure(config.session.ttl_minutes == 240, "file value should win over default")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(
                config.llm.model == "model-from-override",
                "override model should win over env and file",
            )?;
            Ok(())
        })();

        clear_vars(&["AQUABOT_SERVER_PORT", "AQUABOT_LLM_MODEL"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AQUABOT_CRM_ENABLED", "true");

        let result = (|| -> Result<(), String> {
            let (_dir, options) = isolated_options()?;
            let error = match AppConfig::load(options) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("crm.api_key")
            );
            ensure(has_message, "validation failure should mention crm.api_key")
        })();

        clear_vars(&["AQUABOT_CRM_ENABLED"]);
        result
    }

    #[test]
    fn invalid_numeric_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AQUABOT_IDLE_MAX_FOLLOWUPS", "many");

        let result = (|| -> Result<(), String> {
            let (_dir, options) = isolated_options()?;
            match AppConfig::load(options) {
                Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                    ensure(key == "AQUABOT_IDLE_MAX_FOLLOWUPS", "error should name the key")
                }
                Err(other) => Err(format!("unexpected error: {other}")),
                Ok(_) => Err("expected override failure".to_string()),
            }
        })();

        clear_vars(&["AQUABOT_IDLE_MAX_FOLLOWUPS"]);
        result
    }

    #[test]
    fn session_ttl_must_outlive_idle_final() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AQUABOT_IDLE_ENABLED", "true");
        env::set_var("AQUABOT_SESSION_TTL_MINUTES", "30");

        let result = (|| -> Result<(), String> {
            let (_dir, options) = isolated_options()?;
            match AppConfig::load(options) {
                Err(ConfigError::Validation(message)) => ensure(
                    message.contains("session.ttl_minutes"),
                    "validation should mention session.ttl_minutes",
                ),
                Err(other) => Err(format!("unexpected error: {other}")),
                Ok(_) => Err("expected validation failure".to_string()),
            }
        })();

        clear_vars(&["AQUABOT_IDLE_ENABLED", "AQUABOT_SESSION_TTL_MINUTES"]);
        result
    }

    #[test]
    fn test_mode_allow_list_is_normalized() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AQUABOT_TEST_MODE_ENABLED", "true");
        env::set_var("AQUABOT_TEST_MODE_ALLOWED_NUMBERS", "+57 300 111 2233, ,whatsapp:+573009998877");

        let result = (|| -> Result<(), String> {
            let (_dir, options) = isolated_options()?;
            let config =
                AppConfig::load(options).map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.test_mode.allowed_numbers == vec!["573001112233", "573009998877"],
                "allow-list should keep digits only and drop blanks",
            )?;
            ensure(config.test_mode.allows("573001112233"), "listed number should be allowed")?;
            ensure(!config.test_mode.allows("573000000000"), "other numbers should be dropped")?;
            ensure(
                config.test_mode.tagged("Mensaje") == "[TEST] Mensaje",
                "test tag should prefix CRM text",
            )?;
            Ok(())
        })();

        clear_vars(&["AQUABOT_TEST_MODE_ENABLED", "AQUABOT_TEST_MODE_ALLOWED_NUMBERS"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("AQUABOT_WHATSAPP_TOKEN", "meta-secret-value");
        env::set_var("AQUABOT_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let (_dir, options) = isolated_options()?;
            let config =
                AppConfig::load(options).map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(
                !debug.contains("meta-secret-value"),
                "debug output should not contain whatsapp token",
            )?;
            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")?;
            ensure(config.llm.helper_enabled(config.llm.rerank), "rerank should be active")?;
            ensure(
                matches!(config.logging.format, LogFormat::Compact),
                "default logging format should be compact",
            )?;
            Ok(())
        })();

        clear_vars(&["AQUABOT_WHATSAPP_TOKEN", "AQUABOT_LLM_API_KEY"]);
        result
    }
}
