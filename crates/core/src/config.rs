use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub auth: AuthConfig,
    pub consent: ConsentConfig,
    pub email: EmailConfig,
    pub sms: SmsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub token_secret: SecretString,
    pub token_ttl_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ConsentConfig {
    /// Minutes the winning carrier has to confirm an approved booking.
    pub sla_minutes: i64,
    pub sweep_enabled: bool,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct EmailConfig {
    pub enabled: bool,
    pub api_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub from_address: String,
}

#[derive(Clone, Debug)]
pub struct SmsConfig {
    pub enabled: bool,
    pub api_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub sender_id: String,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
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
    pub token_secret: Option<String>,
    pub consent_sla_minutes: Option<i64>,
    pub sweep_enabled: Option<bool>,
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
                url: "sqlite://lanehaul.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            auth: AuthConfig { token_secret: String::new().into(), token_ttl_secs: 86_400 },
            consent: ConsentConfig {
                sla_minutes: 120,
                sweep_enabled: true,
                sweep_interval_secs: 300,
            },
            email: EmailConfig {
                enabled: false,
                api_url: None,
                api_key: None,
                from_address: "operations@lanehaul.example".to_string(),
            },
            sms: SmsConfig { enabled: false, api_url: None, api_key: None, sender_id: "LANEHL".to_string() },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("lanehaul.toml"));
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

        if let Some(auth) = patch.auth {
            if let Some(token_secret_value) = auth.token_secret {
                self.auth.token_secret = secret_value(token_secret_value);
            }
            if let Some(token_ttl_secs) = auth.token_ttl_secs {
                self.auth.token_ttl_secs = token_ttl_secs;
            }
        }

        if let Some(consent) = patch.consent {
            if let Some(sla_minutes) = consent.sla_minutes {
                self.consent.sla_minutes = sla_minutes;
            }
            if let Some(sweep_enabled) = consent.sweep_enabled {
                self.consent.sweep_enabled = sweep_enabled;
            }
            if let Some(sweep_interval_secs) = consent.sweep_interval_secs {
                self.consent.sweep_interval_secs = sweep_interval_secs;
            }
        }

        if let Some(email) = patch.email {
            if let Some(enabled) = email.enabled {
                self.email.enabled = enabled;
            }
            if let Some(api_url) = email.api_url {
                self.email.api_url = Some(api_url);
            }
            if let Some(email_api_key_value) = email.api_key {
                self.email.api_key = Some(secret_value(email_api_key_value));
            }
            if let Some(from_address) = email.from_address {
                self.email.from_address = from_address;
            }
        }

        if let Some(sms) = patch.sms {
            if let Some(enabled) = sms.enabled {
                self.sms.enabled = enabled;
            }
            if let Some(api_url) = sms.api_url {
                self.sms.api_url = Some(api_url);
            }
            if let Some(sms_api_key_value) = sms.api_key {
                self.sms.api_key = Some(secret_value(sms_api_key_value));
            }
            if let Some(sender_id) = sms.sender_id {
                self.sms.sender_id = sender_id;
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
        if let Some(value) = read_env("LANEHAUL_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LANEHAUL_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("LANEHAUL_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LANEHAUL_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LANEHAUL_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LANEHAUL_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LANEHAUL_SERVER_PORT") {
            self.server.port = parse_u16("LANEHAUL_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LANEHAUL_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("LANEHAUL_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("LANEHAUL_AUTH_TOKEN_SECRET") {
            self.auth.token_secret = secret_value(value);
        }
        if let Some(value) = read_env("LANEHAUL_AUTH_TOKEN_TTL_SECS") {
            self.auth.token_ttl_secs = parse_u64("LANEHAUL_AUTH_TOKEN_TTL_SECS", &value)?;
        }

        if let Some(value) = read_env("LANEHAUL_CONSENT_SLA_MINUTES") {
            self.consent.sla_minutes = parse_i64("LANEHAUL_CONSENT_SLA_MINUTES", &value)?;
        }
        if let Some(value) = read_env("LANEHAUL_CONSENT_SWEEP_ENABLED") {
            self.consent.sweep_enabled = parse_bool("LANEHAUL_CONSENT_SWEEP_ENABLED", &value)?;
        }
        if let Some(value) = read_env("LANEHAUL_CONSENT_SWEEP_INTERVAL_SECS") {
            self.consent.sweep_interval_secs =
                parse_u64("LANEHAUL_CONSENT_SWEEP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("LANEHAUL_EMAIL_ENABLED") {
            self.email.enabled = parse_bool("LANEHAUL_EMAIL_ENABLED", &value)?;
        }
        if let Some(value) = read_env("LANEHAUL_EMAIL_API_URL") {
            self.email.api_url = Some(value);
        }
        if let Some(value) = read_env("LANEHAUL_EMAIL_API_KEY") {
            self.email.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("LANEHAUL_EMAIL_FROM_ADDRESS") {
            self.email.from_address = value;
        }

        if let Some(value) = read_env("LANEHAUL_SMS_ENABLED") {
            self.sms.enabled = parse_bool("LANEHAUL_SMS_ENABLED", &value)?;
        }
        if let Some(value) = read_env("LANEHAUL_SMS_API_URL") {
            self.sms.api_url = Some(value);
        }
        if let Some(value) = read_env("LANEHAUL_SMS_API_KEY") {
            self.sms.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("LANEHAUL_SMS_SENDER_ID") {
            self.sms.sender_id = value;
        }

        let log_level =
            read_env("LANEHAUL_LOGGING_LEVEL").or_else(|| read_env("LANEHAUL_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LANEHAUL_LOGGING_FORMAT").or_else(|| read_env("LANEHAUL_LOG_FORMAT"));
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
        if let Some(token_secret) = overrides.token_secret {
            self.auth.token_secret = secret_value(token_secret);
        }
        if let Some(sla_minutes) = overrides.consent_sla_minutes {
            self.consent.sla_minutes = sla_minutes;
        }
        if let Some(sweep_enabled) = overrides.sweep_enabled {
            self.consent.sweep_enabled = sweep_enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_auth(&self.auth)?;
        validate_consent(&self.consent)?;
        validate_email(&self.email)?;
        validate_sms(&self.sms)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("lanehaul.toml"), PathBuf::from("config/lanehaul.toml")]
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

fn validate_auth(auth: &AuthConfig) -> Result<(), ConfigError> {
    let secret = auth.token_secret.expose_secret();
    if secret.trim().is_empty() {
        return Err(ConfigError::Validation(
            "auth.token_secret is required. Set LANEHAUL_AUTH_TOKEN_SECRET or the [auth] section"
                .to_string(),
        ));
    }
    if secret.len() < 16 {
        return Err(ConfigError::Validation(
            "auth.token_secret must be at least 16 characters".to_string(),
        ));
    }
    if auth.token_ttl_secs == 0 {
        return Err(ConfigError::Validation(
            "auth.token_ttl_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_consent(consent: &ConsentConfig) -> Result<(), ConfigError> {
    if consent.sla_minutes <= 0 || consent.sla_minutes > 10_080 {
        return Err(ConfigError::Validation(
            "consent.sla_minutes must be in range 1..=10080".to_string(),
        ));
    }
    if consent.sweep_enabled && consent.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "consent.sweep_interval_secs must be greater than zero when the sweep is enabled"
                .to_string(),
        ));
    }

    Ok(())
}

fn validate_email(email: &EmailConfig) -> Result<(), ConfigError> {
    if email.enabled {
        let missing_url = email.api_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if missing_url {
            return Err(ConfigError::Validation(
                "email.api_url is required when email.enabled is true".to_string(),
            ));
        }
        let missing_key = email
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing_key {
            return Err(ConfigError::Validation(
                "email.api_key is required when email.enabled is true".to_string(),
            ));
        }
    }
    if email.from_address.trim().is_empty() || !email.from_address.contains('@') {
        return Err(ConfigError::Validation(
            "email.from_address must be a plausible email address".to_string(),
        ));
    }

    Ok(())
}

fn validate_sms(sms: &SmsConfig) -> Result<(), ConfigError> {
    if sms.enabled {
        let missing_url = sms.api_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
        if missing_url {
            return Err(ConfigError::Validation(
                "sms.api_url is required when sms.enabled is true".to_string(),
            ));
        }
        let missing_key = sms
            .api_key
            .as_ref()
            .map(|value| value.expose_secret().trim().is_empty())
            .unwrap_or(true);
        if missing_key {
            return Err(ConfigError::Validation(
                "sms.api_key is required when sms.enabled is true".to_string(),
            ));
        }
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

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| ConfigError::InvalidEnvOverride {
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
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    auth: Option<AuthPatch>,
    consent: Option<ConsentPatch>,
    email: Option<EmailPatch>,
    sms: Option<SmsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthPatch {
    token_secret: Option<String>,
    token_ttl_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ConsentPatch {
    sla_minutes: Option<i64>,
    sweep_enabled: Option<bool>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EmailPatch {
    enabled: Option<bool>,
    api_url: Option<String>,
    api_key: Option<String>,
    from_address: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SmsPatch {
    enabled: Option<bool>,
    api_url: Option<String>,
    api_key: Option<String>,
    sender_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
