use std::path::Path;

use config::{
    builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File, FileFormat,
};
use serde::Deserialize;

pub const ENV_PREFIX: &str = "TIDEPOOL";
/// Plain environment variables honoured on top of the prefixed ones
pub const DSN_ENV_VAR: &str = "POSTGRESDB_URL";
pub const API_KEY_ENV_VAR: &str = "OPENAI_API_KEY";

#[derive(Deserialize, Debug, PartialEq, Clone)]
pub struct TidepoolConfig {
    pub database: Database,
    #[serde(default)]
    pub frontend: Frontend,
    #[serde(default)]
    pub completion: Completion,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
pub struct Database {
    pub dsn: String,
    #[serde(default = "default_schema")]
    pub schema: String,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

fn default_schema() -> String {
    "public".to_string()
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    16
}

fn default_idle_timeout_ms() -> u64 {
    30000
}

#[derive(Deserialize, Debug, PartialEq, Eq, Default, Clone)]
pub struct Frontend {
    #[serde(default)]
    pub http: HttpFrontend,
}

#[derive(Deserialize, Debug, PartialEq, Eq, Clone)]
#[serde(default)]
pub struct HttpFrontend {
    pub bind_host: String,
    pub bind_port: u16,
    pub body_max_length: u64,
    pub cors_allow_any_origin: bool,
}

impl Default for HttpFrontend {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            bind_port: 8080,
            body_max_length: 1024 * 1024,
            cors_allow_any_origin: true,
        }
    }
}

#[derive(Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct Completion {
    pub api_key: Option<String>,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for Completion {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.3,
            max_tokens: 500,
        }
    }
}

pub fn validate_config(config: TidepoolConfig) -> Result<TidepoolConfig, ConfigError> {
    if config.database.dsn.trim().is_empty() {
        return Err(ConfigError::Message(format!(
            "No database connection string: set database.dsn or {DSN_ENV_VAR}"
        )));
    }

    if !(0.0..=2.0).contains(&config.completion.temperature) {
        return Err(ConfigError::Message(format!(
            "completion.temperature must be between 0 and 2, got {}",
            config.completion.temperature
        )));
    }

    if config.database.min_connections > config.database.max_connections {
        return Err(ConfigError::Message(
            "database.min_connections can't exceed database.max_connections".to_string(),
        ));
    }

    Ok(config)
}

// Environment sources go last so that they win over the file
fn with_environment(
    builder: ConfigBuilder<DefaultState>,
    env: &[(String, String)],
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let lookup = |name: &str| {
        env.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
            .filter(|v| !v.is_empty())
    };

    let prefixed = env
        .iter()
        .filter(|(k, _)| k.starts_with(&format!("{ENV_PREFIX}__")))
        .cloned()
        .collect();

    builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(Some(prefixed)),
        )
        .set_override_option("database.dsn", lookup(DSN_ENV_VAR))?
        .set_override_option("completion.api_key", lookup(API_KEY_ENV_VAR))
}

fn process_env() -> Vec<(String, String)> {
    std::env::vars().collect()
}

/// Load the config from an (optional) TOML file, overlaid with the process environment
pub fn load_config(path: &Path) -> Result<TidepoolConfig, ConfigError> {
    let path = path
        .to_str()
        .ok_or_else(|| ConfigError::Message(format!("Invalid config path {path:?}")))?;

    let builder = Config::builder()
        .add_source(File::new(path, FileFormat::Toml).required(false));

    with_environment(builder, &process_env())?
        .build()?
        .try_deserialize()
        .and_then(validate_config)
}

// Load a config from a string (to test our structs are defined correctly)
pub fn load_config_from_string(
    config_str: &str,
    skip_validation: bool,
    env: &[(String, String)],
) -> Result<TidepoolConfig, ConfigError> {
    let builder = Config::builder().add_source(File::from_str(config_str, FileFormat::Toml));
    let config = with_environment(builder, env)?.build()?.try_deserialize();

    if skip_validation {
        config
    } else {
        config.and_then(validate_config)
    }
}
