use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub memory: MemoryConfig,
    pub sandbox: SandboxConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct MemoryConfig {
    pub path: PathBuf,
    /// Most-recent records kept on every persist.
    pub retention: usize,
    /// Matches pulled into the context block per turn.
    pub lookup_limit: usize,
}

#[derive(Clone, Debug)]
pub struct SandboxConfig {
    pub interpreter: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    #[serde(rename = "openai")]
    OpenAi,
    Anthropic,
    Ollama,
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
    pub memory_path: Option<PathBuf>,
    pub memory_retention: Option<usize>,
    pub sandbox_interpreter: Option<String>,
    pub sandbox_timeout_secs: Option<u64>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub llm_base_url: Option<String>,
    pub log_level: Option<String>,
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
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig {
                path: PathBuf::from("sage_memory.json"),
                retention: 100,
                lookup_limit: 3,
            },
            sandbox: SandboxConfig { interpreter: "python3".to_string(), timeout_secs: 10 },
            llm: LlmConfig {
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                max_tokens: 4096,
                temperature: 0.8,
                timeout_secs: 30,
            },
            server: ServerConfig { bind_address: "127.0.0.1".to_string(), port: 8080 },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|anthropic|ollama)"
            ))),
        }
    }
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
    /// Defaults, then the optional `sage.toml` patch, then `SAGE_*` env
    /// overrides, then programmatic overrides, then validation.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("sage.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(memory) = patch.memory {
            if let Some(path) = memory.path {
                self.memory.path = path;
            }
            if let Some(retention) = memory.retention {
                self.memory.retention = retention;
            }
            if let Some(lookup_limit) = memory.lookup_limit {
                self.memory.lookup_limit = lookup_limit;
            }
        }

        if let Some(sandbox) = patch.sandbox {
            if let Some(interpreter) = sandbox.interpreter {
                self.sandbox.interpreter = interpreter;
            }
            if let Some(timeout_secs) = sandbox.timeout_secs {
                self.sandbox.timeout_secs = timeout_secs;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(api_key.into());
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(max_tokens) = llm.max_tokens {
                self.llm.max_tokens = max_tokens;
            }
            if let Some(temperature) = llm.temperature {
                self.llm.temperature = temperature;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
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
        if let Some(value) = read_env("SAGE_MEMORY_PATH") {
            self.memory.path = PathBuf::from(value);
        }
        if let Some(value) = read_env("SAGE_MEMORY_RETENTION") {
            self.memory.retention = parse_env("SAGE_MEMORY_RETENTION", &value)?;
        }
        if let Some(value) = read_env("SAGE_MEMORY_LOOKUP_LIMIT") {
            self.memory.lookup_limit = parse_env("SAGE_MEMORY_LOOKUP_LIMIT", &value)?;
        }

        if let Some(value) = read_env("SAGE_SANDBOX_INTERPRETER") {
            self.sandbox.interpreter = value;
        }
        if let Some(value) = read_env("SAGE_SANDBOX_TIMEOUT_SECS") {
            self.sandbox.timeout_secs = parse_env("SAGE_SANDBOX_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("SAGE_LLM_PROVIDER") {
            self.llm.provider = parse_env("SAGE_LLM_PROVIDER", &value)?;
        }
        if let Some(value) = read_env("SAGE_LLM_API_KEY") {
            self.llm.api_key = Some(value.into());
        }
        if let Some(value) = read_env("SAGE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SAGE_LLM_MODEL") {
            self.llm.model = value;
        }

        if let Some(value) = read_env("SAGE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("SAGE_SERVER_PORT") {
            self.server.port = parse_env("SAGE_SERVER_PORT", &value)?;
        }

        if let Some(value) = read_env("SAGE_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Some(value) = read_env("SAGE_LOG_FORMAT") {
            self.logging.format = parse_env("SAGE_LOG_FORMAT", &value)?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(path) = overrides.memory_path {
            self.memory.path = path;
        }
        if let Some(retention) = overrides.memory_retention {
            self.memory.retention = retention;
        }
        if let Some(interpreter) = overrides.sandbox_interpreter {
            self.sandbox.interpreter = interpreter;
        }
        if let Some(timeout_secs) = overrides.sandbox_timeout_secs {
            self.sandbox.timeout_secs = timeout_secs;
        }
        if let Some(provider) = overrides.llm_provider {
            self.llm.provider = provider;
        }
        if let Some(model) = overrides.llm_model {
            self.llm.model = model;
        }
        if let Some(base_url) = overrides.llm_base_url {
            self.llm.base_url = Some(base_url);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.retention == 0 {
            return Err(ConfigError::Validation(
                "memory.retention must be at least 1".to_string(),
            ));
        }
        if self.memory.lookup_limit == 0 {
            return Err(ConfigError::Validation(
                "memory.lookup_limit must be at least 1".to_string(),
            ));
        }
        if self.sandbox.interpreter.trim().is_empty() {
            return Err(ConfigError::Validation(
                "sandbox.interpreter must not be empty".to_string(),
            ));
        }
        if self.sandbox.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "sandbox.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Validation("llm.model must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    memory: Option<MemoryPatch>,
    sandbox: Option<SandboxPatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Deserialize)]
struct MemoryPatch {
    path: Option<PathBuf>,
    retention: Option<usize>,
    lookup_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SandboxPatch {
    interpreter: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct LlmPatch {
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }
    let default = PathBuf::from("sage.toml");
    default.exists().then_some(default)
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    toml::from_str(&raw)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Every malformed env override reports the variable at fault, whether the
/// target is numeric or an enum with its own `FromStr`.
fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    fn load_with_path(path: std::path::PathBuf) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::load(LoadOptions::default()).expect("default config loads");
        assert_eq!(config.memory.retention, 100);
        assert_eq!(config.memory.lookup_limit, 3);
        assert_eq!(config.sandbox.timeout_secs, 10);
        assert_eq!(config.sandbox.interpreter, "python3");
        assert_eq!(config.logging.format, LogFormat::Compact);
    }

    #[test]
    fn toml_patch_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().expect("temp config");
        writeln!(
            file,
            "[memory]\nretention = 50\n\n[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o-mini\"\n\n[logging]\nformat = \"json\""
        )
        .expect("write config");

        let config = load_with_path(file.path().to_path_buf()).expect("patched config loads");
        assert_eq!(config.memory.retention, 50);
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.logging.format, LogFormat::Json);
        // untouched sections keep defaults
        assert_eq!(config.sandbox.interpreter, "python3");
    }

    #[test]
    fn programmatic_overrides_win_over_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp config");
        writeln!(file, "[sandbox]\ntimeout_secs = 20").expect("write config");

        let config = AppConfig::load(LoadOptions {
            config_path: Some(file.path().to_path_buf()),
            overrides: ConfigOverrides {
                sandbox_timeout_secs: Some(3),
                llm_model: Some("phi3".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .expect("config loads");

        assert_eq!(config.sandbox.timeout_secs, 3);
        assert_eq!(config.llm.model, "phi3");
    }

    #[test]
    fn missing_required_file_is_an_error() {
        let result = AppConfig::load(LoadOptions {
            config_path: Some("/definitely/missing/sage.toml".into()),
            require_file: true,
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }

    #[test]
    fn zero_retention_fails_validation() {
        let result = AppConfig::load(LoadOptions {
            overrides: ConfigOverrides {
                memory_retention: Some(0),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        });
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn provider_parses_from_str() {
        assert_eq!("ollama".parse::<LlmProvider>().unwrap(), LlmProvider::Ollama);
        assert!("claude".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn malformed_env_values_name_the_offending_variable() {
        let result: Result<LlmProvider, ConfigError> =
            super::parse_env("SAGE_LLM_PROVIDER", "bogus");
        assert!(matches!(
            result,
            Err(ConfigError::InvalidEnvOverride { key, value })
                if key == "SAGE_LLM_PROVIDER" && value == "bogus"
        ));

        let result: Result<LogFormat, ConfigError> = super::parse_env("SAGE_LOG_FORMAT", "fancy");
        assert!(matches!(result, Err(ConfigError::InvalidEnvOverride { .. })));
    }
}
