use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_CONFIG_PATH: &str = "config/draftbridge.toml";
pub const CONFIG_PATH: &str = DEFAULT_CONFIG_PATH;

const DEFAULT_AGENT_ENVIRONMENT: &str = "sandbox";
const DEFAULT_SYNC_TARGET: &str = "production";

/// Which language-model backend drives the agent. Fixed per process; a
/// request cannot switch providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-sonnet-4-20250514",
            ProviderKind::OpenAi => "gpt-4o",
        }
    }

    pub fn default_api_key_env(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
        }
    }

    pub fn default_endpoint(self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "https://api.anthropic.com",
            ProviderKind::OpenAi => "https://api.openai.com",
        }
    }
}

/// One logical target backend. All fields are optional at parse time; the
/// connection manager validates them when a connection is actually opened.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnvironmentConfig {
    pub endpoint: Option<String>,
    pub username: Option<String>,
    /// Name of the environment variable holding the application password.
    pub password_env: Option<String>,
    /// Inline password, mainly for tests. `password_env` wins when both are
    /// set and the variable is present.
    pub password: Option<String>,
}

/// The three fields a live connection needs, all present.
#[derive(Debug, Clone)]
pub struct ResolvedCredentials {
    pub endpoint: String,
    pub username: String,
    pub password: String,
}

impl EnvironmentConfig {
    pub fn resolve(&self, environment: &str) -> Result<ResolvedCredentials, ConfigError> {
        let endpoint = self
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::missing_credential(environment, "endpoint"))?;
        let username = self
            .username
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ConfigError::missing_credential(environment, "username"))?;
        let password = self.resolve_password(environment)?;
        Ok(ResolvedCredentials {
            endpoint: endpoint.to_string(),
            username: username.to_string(),
            password,
        })
    }

    fn resolve_password(&self, environment: &str) -> Result<String, ConfigError> {
        if let Some(var) = self.password_env.as_deref().map(str::trim) {
            if !var.is_empty() {
                if let Ok(value) = env::var(var) {
                    if !value.trim().is_empty() {
                        return Ok(value);
                    }
                }
                return Err(ConfigError::MissingCredential {
                    environment: environment.to_string(),
                    field: format!("password (environment variable '{var}')"),
                });
            }
        }
        self.password
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ConfigError::missing_credential(environment, "password"))
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub api_key_env: Option<String>,
    pub provider_endpoint: Option<String>,
    pub system_prompt: Option<String>,
    pub agent_environment: String,
    pub sync_target: String,
    pub environments: HashMap<String, EnvironmentConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config from {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("environment '{environment}' is missing required field '{field}'")]
    MissingCredential { environment: String, field: String },
    #[error("environment '{environment}' is not configured")]
    UnknownEnvironment { environment: String },
    #[error("provider '{provider}' requires an API key in environment variable '{env_var}'")]
    MissingApiKey { provider: String, env_var: String },
}

impl ConfigError {
    pub fn missing_credential(environment: &str, field: &str) -> Self {
        Self::MissingCredential {
            environment: environment.to_string(),
            field: field.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    provider: Option<ProviderKind>,
    model: Option<String>,
    api_key_env: Option<String>,
    provider_endpoint: Option<String>,
    system_prompt: Option<String>,
    agent_environment: Option<String>,
    sync_target: Option<String>,
    #[serde(default)]
    environments: HashMap<String, EnvironmentConfig>,
}

impl AppConfig {
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return read_config(path);
        }
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        match read_config(default_path) {
            Ok(config) => Ok(config),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                info!("Configuration file not found; using defaults");
                Ok(Self::default())
            }
            Err(other) => Err(other),
        }
    }

    pub fn default() -> Self {
        Self::from_raw(RawConfig::default())
    }

    pub fn environment(&self, name: &str) -> Result<&EnvironmentConfig, ConfigError> {
        self.environments
            .get(name)
            .ok_or_else(|| ConfigError::UnknownEnvironment {
                environment: name.to_string(),
            })
    }

    fn from_raw(raw: RawConfig) -> Self {
        let provider = raw.provider.unwrap_or(ProviderKind::Anthropic);
        Self {
            provider,
            model: raw
                .model
                .unwrap_or_else(|| provider.default_model().to_string()),
            api_key_env: raw.api_key_env,
            provider_endpoint: raw.provider_endpoint,
            system_prompt: raw.system_prompt,
            agent_environment: raw
                .agent_environment
                .unwrap_or_else(|| DEFAULT_AGENT_ENVIRONMENT.to_string()),
            sync_target: raw
                .sync_target
                .unwrap_or_else(|| DEFAULT_SYNC_TARGET.to_string()),
            environments: raw.environments,
        }
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    debug!(path = %path.display(), "Reading configuration file");
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed: RawConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(AppConfig::from_raw(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_file_missing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("nope.toml");
        let err = AppConfig::load(Some(&missing)).expect_err("explicit path must exist");
        assert!(matches!(err, ConfigError::Io { .. }));

        let config = AppConfig::default();
        assert_eq!(config.provider, ProviderKind::Anthropic);
        assert_eq!(config.agent_environment, "sandbox");
        assert_eq!(config.sync_target, "production");
        assert!(config.environments.is_empty());
    }

    #[test]
    fn reads_provider_and_environments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("draftbridge.toml");
        fs::write(
            &path,
            r#"
provider = "openai"
model = "gpt-4o-mini"

[environments.sandbox]
endpoint = "http://localhost:8881/wp-json/mcp"
username = "agent"
password = "secret"

[environments.production]
endpoint = "https://blog.example.com/wp-json/mcp"
username = "agent"
password_env = "PROD_APP_PASSWORD"
"#,
        )
        .expect("write config");

        let config = AppConfig::load(Some(&path)).expect("load");
        assert_eq!(config.provider, ProviderKind::OpenAi);
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.environments.len(), 2);

        let sandbox = config.environment("sandbox").expect("sandbox");
        let resolved = sandbox.resolve("sandbox").expect("resolve");
        assert_eq!(resolved.username, "agent");
        assert_eq!(resolved.password, "secret");
    }

    #[test]
    fn missing_password_names_environment_and_field() {
        let env_config = EnvironmentConfig {
            endpoint: Some("https://blog.example.com/wp-json/mcp".into()),
            username: Some("agent".into()),
            password_env: None,
            password: None,
        };
        let err = env_config.resolve("production").expect_err("no password");
        match err {
            ConfigError::MissingCredential { environment, field } => {
                assert_eq!(environment, "production");
                assert_eq!(field, "password");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn unknown_environment_is_an_error() {
        let config = AppConfig::default();
        let err = config.environment("staging").expect_err("not configured");
        assert!(matches!(err, ConfigError::UnknownEnvironment { .. }));
    }
}
