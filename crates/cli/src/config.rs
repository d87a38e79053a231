//! Configuration loading from courier.toml.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use mcp::ServerConfig;
use runtime::{AgentConfig, GenerateOptions};
use serde::Deserialize;

pub const CONFIG_FILE: &str = "courier.toml";
pub const API_KEY_VAR: &str = "ANTHROPIC_API_KEY";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Model service configuration.
    #[serde(default)]
    pub backend: BackendConfig,

    /// Loop limits.
    #[serde(default)]
    pub agent: AgentSection,

    /// The MCP tool provider to launch.
    pub provider: Option<ProviderConfig>,
}

/// Model service configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    pub model: String,

    /// Anthropic API key. Falls back to `ANTHROPIC_API_KEY`.
    pub api_key: Option<String>,

    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub system: Option<String>,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: "claude-3-5-sonnet-20241022".to_string(),
            api_key: None,
            max_tokens: 1000,
            temperature: None,
            system: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AgentSection {
    pub max_rounds: usize,
    pub model_timeout_secs: u64,
    pub tool_timeout_secs: u64,
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            max_rounds: 16,
            model_timeout_secs: 60,
            tool_timeout_secs: 30,
        }
    }
}

/// How to launch the tool provider.
#[derive(Debug, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    pub handshake_timeout_secs: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

fn default_provider_name() -> String {
    "provider".to_string()
}

impl ProviderConfig {
    pub fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new(&self.name, &self.command).args(&self.args);
        for (key, value) in &self.env {
            config = config.env(key, value);
        }
        if let Some(secs) = self.handshake_timeout_secs {
            config = config.handshake_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.request_timeout_secs {
            config = config.request_timeout(Duration::from_secs(secs));
        }
        config
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Load `path` if given, else `courier.toml` when it exists, else defaults.
    pub fn discover(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(CONFIG_FILE).exists() => Self::load(CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// The API key from the file, else from `env_key`.
    pub fn api_key(&self, env_key: Option<String>) -> Result<String, ConfigError> {
        self.backend
            .api_key
            .clone()
            .or(env_key)
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::MissingApiKey)
    }

    pub fn generate_options(&self) -> GenerateOptions {
        GenerateOptions {
            max_tokens: self.backend.max_tokens,
            temperature: self.backend.temperature,
            system: self.backend.system.clone(),
        }
    }

    /// Loop settings, validated.
    pub fn agent_config(&self) -> Result<AgentConfig, ConfigError> {
        let config = AgentConfig {
            max_rounds: self.agent.max_rounds,
            model_timeout: Duration::from_secs(self.agent.model_timeout_secs),
            tool_timeout: Duration::from_secs(self.agent.tool_timeout_secs),
            options: self.generate_options(),
        };
        config
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(config)
    }

    /// The provider to launch: `script` if given, else `[provider]`.
    pub fn server_config(&self, script: Option<&Path>) -> Result<ServerConfig, ConfigError> {
        match (script, &self.provider) {
            (Some(script), _) => ServerConfig::for_script(script)
                .map_err(|e| ConfigError::Invalid(e.to_string())),
            (None, Some(provider)) => Ok(provider.server_config()),
            (None, None) => Err(ConfigError::MissingProvider),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("API key not configured: set backend.api_key or ANTHROPIC_API_KEY")]
    MissingApiKey,

    #[error("no tool provider: pass --server <script> or add a [provider] section")]
    MissingProvider,

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.backend.model, "claude-3-5-sonnet-20241022");
        assert_eq!(config.backend.max_tokens, 1000);
        assert!(config.provider.is_none());

        let agent = config.agent_config().unwrap();
        assert_eq!(agent.max_rounds, 16);
        assert_eq!(agent.model_timeout, Duration::from_secs(60));
        assert_eq!(agent.tool_timeout, Duration::from_secs(30));
    }

    #[test]
    fn full_file() {
        let config = Config::parse(
            r#"
            [backend]
            model = "claude-3-5-haiku-20241022"
            api_key = "sk-ant-file"
            max_tokens = 512
            temperature = 0.1
            system = "Answer in one sentence."

            [agent]
            max_rounds = 4
            tool_timeout_secs = 5

            [provider]
            name = "weather"
            command = "python"
            args = ["weather.py", "--units", "metric"]
            env = { NWS_USER_AGENT = "courier" }
            request_timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.api_key(None).unwrap(), "sk-ant-file");
        let options = config.generate_options();
        assert_eq!(options.max_tokens, 512);
        assert_eq!(options.temperature, Some(0.1));
        assert_eq!(options.system.as_deref(), Some("Answer in one sentence."));

        let agent = config.agent_config().unwrap();
        assert_eq!(agent.max_rounds, 4);
        assert_eq!(agent.model_timeout, Duration::from_secs(60));
        assert_eq!(agent.tool_timeout, Duration::from_secs(5));

        let provider = config.provider.as_ref().unwrap();
        assert_eq!(provider.name, "weather");
        assert_eq!(provider.args, ["weather.py", "--units", "metric"]);
        assert_eq!(provider.env["NWS_USER_AGENT"], "courier");
    }

    #[test]
    fn api_key_falls_back_to_env() {
        let config = Config::default();
        assert_eq!(
            config.api_key(Some("sk-ant-env".into())).unwrap(),
            "sk-ant-env"
        );
        assert!(matches!(
            config.api_key(None),
            Err(ConfigError::MissingApiKey)
        ));
        assert!(config.api_key(Some("  ".into())).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let config = Config::parse("[agent]\nmax_rounds = 0\n").unwrap();
        assert!(matches!(config.agent_config(), Err(ConfigError::Invalid(_))));

        let config = Config::parse("[backend]\ntemperature = 2.0\n").unwrap();
        assert!(config.agent_config().is_err());

        assert!(matches!(
            Config::parse("[backend]\nmax_tokens = \"lots\"\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn script_overrides_provider_section() {
        let config = Config::parse("[provider]\ncommand = \"uvx\"\nargs = [\"mcp-server-time\"]\n")
            .unwrap();
        assert!(config.server_config(None).is_ok());
        assert!(config.server_config(Some(Path::new("server.js"))).is_ok());
        assert!(matches!(
            config.server_config(Some(Path::new("server.rb"))),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            Config::default().server_config(None),
            Err(ConfigError::MissingProvider)
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = Config::load("/nonexistent/courier.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/nonexistent/courier.toml"));
    }
}
