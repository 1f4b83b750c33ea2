use std::path::Path;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

pub const CONFIG_PATH_ENV: &str = "CHECKLISTS_CONFIG";
const API_TOKEN_ENV: &str = "CHECKLISTS_API_TOKEN";
const API_USER_ID_ENV: &str = "CHECKLISTS_API_USER_ID";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, Default)]
#[ts(use_ts_enum)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessControlMode {
    #[default]
    Disabled,
    Token,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
pub struct ApiToken {
    pub token: String,
    pub user_id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct AccessControlConfig {
    pub mode: AccessControlMode,
    pub tokens: Vec<ApiToken>,
    /// Acting principal when access control is disabled.
    pub anonymous_user_id: i64,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            mode: AccessControlMode::Disabled,
            tokens: Vec::new(),
            anonymous_user_id: 0,
        }
    }
}

impl AccessControlConfig {
    /// Resolves a presented token to its user. Empty tokens never match.
    pub fn user_for_token(&self, presented: &str) -> Option<i64> {
        self.tokens
            .iter()
            .find(|entry| !entry.token.is_empty() && entry.token == presented)
            .map(|entry| entry.user_id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_limit: u64,
    pub max_limit: u64,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            max_limit: 100,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Prefix for `self` and pagination links, without a trailing slash.
    pub public_base_url: String,
    pub pagination: PaginationConfig,
    pub access_control: AccessControlConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            database_url: "sqlite://checklists.sqlite?mode=rwc".to_string(),
            public_base_url: "http://127.0.0.1:8000".to_string(),
            pagination: PaginationConfig::default(),
            access_control: AccessControlConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Reads `CHECKLISTS_CONFIG` (if set) and then applies environment overrides.
    pub fn load() -> Self {
        let config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim())),
            _ => Self::default(),
        };
        config.with_env_overrides()
    }

    pub fn from_file(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(raw_config) => Self::from_raw(&raw_config),
            Err(err) => {
                if err.kind() == std::io::ErrorKind::NotFound {
                    tracing::info!(path = %path.display(), "No config file found, using defaults");
                } else {
                    tracing::warn!(path = %path.display(), "Failed to read config file: {}", err);
                }
                Self::default()
            }
        }
    }

    pub fn from_raw(raw_config: &str) -> Self {
        match serde_json::from_str::<ServerConfig>(raw_config) {
            Ok(config) => config.normalized(),
            Err(e) => {
                tracing::warn!(
                    "Failed to parse config (line {}, column {}): {}, using default",
                    e.line(),
                    e.column(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.public_base_url = self.public_base_url.trim_end_matches('/').to_string();

        if self.pagination.max_limit == 0 {
            tracing::warn!("pagination.max_limit must be positive, resetting to default");
            self.pagination.max_limit = PaginationConfig::default().max_limit;
        }
        if self.pagination.default_limit == 0
            || self.pagination.default_limit > self.pagination.max_limit
        {
            tracing::warn!(
                default_limit = self.pagination.default_limit,
                max_limit = self.pagination.max_limit,
                "pagination.default_limit out of range, clamping"
            );
            self.pagination.default_limit = self
                .pagination
                .default_limit
                .clamp(1, self.pagination.max_limit);
        }

        if self.access_control.mode == AccessControlMode::Token
            && self.access_control.tokens.iter().all(|t| t.token.is_empty())
        {
            tracing::warn!(
                "access_control.mode=TOKEN but no tokens are configured; every API request will be rejected"
            );
        }
        self
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(host) = read_env_string("HOST") {
            self.host = host;
        }
        if let Some(port) = read_env_parsed::<u16>("BACKEND_PORT").or_else(|| read_env_parsed("PORT"))
        {
            self.port = port;
        }
        if let Some(url) = read_env_string("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(url) = read_env_string("PUBLIC_BASE_URL") {
            self.public_base_url = url;
        }
        if let Some(token) = read_env_string(API_TOKEN_ENV) {
            let user_id = read_env_parsed::<i64>(API_USER_ID_ENV)
                .unwrap_or(self.access_control.anonymous_user_id);
            self.access_control.mode = AccessControlMode::Token;
            self.access_control.tokens.push(ApiToken { token, user_id });
        }
        self.normalized()
    }
}

fn read_env_string(name: &str) -> Option<String> {
    match std::env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                tracing::warn!("{name} is set but empty; ignoring");
                None
            } else {
                Some(trimmed.to_string())
            }
        }
        Err(std::env::VarError::NotPresent) => None,
        Err(err) => {
            tracing::warn!(error = %err, "Failed to read {name}; ignoring");
            None
        }
    }
}

fn read_env_parsed<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = read_env_string(name)?;
    match raw.parse::<T>() {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(value = %raw, error = %err, "Invalid {name}; ignoring");
            None
        }
    }
}
