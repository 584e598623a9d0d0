use config::{Config, ConfigError, File};
use serde::Deserialize;

/// Default Gemini chat model
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Default Gemini REST endpoint
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Deserialize, Clone)]
pub struct EnviroConfig {
    pub service: ServiceConfig,
    pub database: DatabaseConfig,
    pub assistant: AssistantConfig,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AssistantConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout_seconds: u64,
    /// Exchanges kept after the seed exchange. `None` keeps everything.
    #[serde(default)]
    pub history_limit: Option<usize>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Comma-separated origin list, or `*` for any origin.
    pub cors_allowed_origins: String,
}

impl HttpConfig {
    /// Parsed origin list. Empty means "allow any origin".
    pub fn allowed_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty() && *s != "*")
            .map(str::to_string)
            .collect()
    }
}

/// Environment variables mapped onto config keys. Env wins over the file.
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("DATABASE_URL", "database.url"),
    ("DATABASE_MAX_CONNECTIONS", "database.max_connections"),
    ("GEMINI_API_KEY", "assistant.api_key"),
    ("GEMINI_MODEL", "assistant.model"),
    ("GEMINI_BASE_URL", "assistant.base_url"),
    ("ASSISTANT_HISTORY_LIMIT", "assistant.history_limit"),
    ("HTTP_HOST", "http.host"),
    ("PORT", "http.port"),
    ("CORS_ALLOWED_ORIGINS", "http.cors_allowed_origins"),
];

impl EnviroConfig {
    /// Load defaults, then the optional TOML file at `path`, then process env.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::load_with_env(path, |key| std::env::var(key).ok())
    }

    /// Same as [`EnviroConfig::load`] with a pluggable env lookup.
    pub fn load_with_env<F>(path: &str, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder()
            .set_default("service.log_level", "info")?
            .set_default("database.url", "")?
            .set_default("database.max_connections", 5_i64)?
            .set_default("assistant.api_key", "")?
            .set_default("assistant.model", DEFAULT_GEMINI_MODEL)?
            .set_default("assistant.base_url", DEFAULT_GEMINI_BASE_URL)?
            .set_default("assistant.timeout_seconds", 60_i64)?
            .set_default("http.host", "0.0.0.0")?
            .set_default("http.port", 8000_i64)?
            .set_default("http.cors_allowed_origins", "*")?
            .add_source(File::with_name(path).required(false));

        for (var, key) in ENV_OVERRIDES {
            let value = env(*var).filter(|v| !v.trim().is_empty());
            builder = builder.set_override_option(*key, value)?;
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the process cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Message(
                "database.url is not set (DATABASE_URL)".to_string(),
            ));
        }
        if self.assistant.api_key.trim().is_empty() {
            return Err(ConfigError::Message(
                "assistant.api_key is not set (GEMINI_API_KEY)".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database.max_connections must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
