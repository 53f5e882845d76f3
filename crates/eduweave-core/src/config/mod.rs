//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Eduweave configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub orchestrator: OrchestratorConfig,
    pub notifier: NotifierConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub default_model: String,
    pub embedding_model: String,
    pub extraction_temperature: f32,
    pub synthesis_temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

/// Knobs consumed by the query pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Shared deadline for the resolver/retriever/discovery fan-out
    pub fetch_deadline_secs: u64,
    /// Age past which a cached answer reads as a miss
    pub cache_ttl_days: i64,
    /// Maximum prerequisite-edge depth walked per query
    pub max_traversal_depth: u32,
    /// Maximum nodes a learning path may contain
    pub max_path_nodes: u32,
    /// Snippets requested from the semantic retriever
    pub context_limit: u32,
    /// Resources returned per query
    pub resource_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Webhook receiving new-concept notifications; None disables sending
    pub webhook_url: Option<String>,
    pub deadline_secs: u64,
    pub max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            notifier: NotifierConfig::default(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            default_model: "anthropic/claude-sonnet-4-20250514".to_string(),
            embedding_model: "openai/text-embedding-3-small".to_string(),
            extraction_temperature: 0.1,
            synthesis_temperature: 0.3,
            max_tokens: 2000,
            timeout_secs: 120,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            fetch_deadline_secs: 10,
            cache_ttl_days: 30,
            max_traversal_depth: 5,
            max_path_nodes: 100,
            context_limit: 5,
            resource_limit: 10,
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            deadline_secs: 30,
            max_attempts: 3,
        }
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("EDUWEAVE_API_KEY")
            .or_else(|_| env::var("OPENROUTER_API_KEY"))
            .ok())
    }

    pub fn redacted_api_key(&self) -> anyhow::Result<Option<String>> {
        self.resolved_api_key().map(|opt| {
            opt.map(|key| {
                if key.len() <= 4 {
                    "***".to_string()
                } else {
                    let suffix = &key[key.len() - 4..];
                    format!("***{}", suffix)
                }
            })
        })
    }

    pub fn enforce_env_only(&self) -> anyhow::Result<()> {
        if self.api_key.is_some() {
            return Err(anyhow!(
                "LLM API keys must be provided via environment variables, not stored in configuration"
            ));
        }
        Ok(())
    }
}

impl OrchestratorConfig {
    pub fn fetch_deadline(&self) -> Duration {
        Duration::from_secs(self.fetch_deadline_secs)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache_ttl_days)
    }
}

impl NotifierConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("EDUWEAVE_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("eduweave")
        };
        Ok(dir)
    }

    /// Get the config file path
    pub fn config_path() -> anyhow::Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from file, or create default if it doesn't exist
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::config_path()?;

        if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
            config.validate()?;
            Ok(config)
        } else {
            // Return default config without creating file
            Ok(Config::default())
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> anyhow::Result<()> {
        self.validate()?;

        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;

        let path = Self::config_path()?;
        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(&path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        self.llm.enforce_env_only()?;

        if self.orchestrator.fetch_deadline_secs == 0 {
            return Err(anyhow!("orchestrator.fetch_deadline_secs must be positive"));
        }
        if self.orchestrator.max_traversal_depth == 0 {
            return Err(anyhow!("orchestrator.max_traversal_depth must be positive"));
        }
        if self.orchestrator.max_path_nodes == 0 {
            return Err(anyhow!("orchestrator.max_path_nodes must be positive"));
        }
        if self.notifier.max_attempts == 0 {
            return Err(anyhow!("notifier.max_attempts must be positive"));
        }
        Ok(())
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            // LLM settings
            "llm.default_model" => Ok(self.llm.default_model.clone()),
            "llm.embedding_model" => Ok(self.llm.embedding_model.clone()),
            "llm.extraction_temperature" => Ok(self.llm.extraction_temperature.to_string()),
            "llm.synthesis_temperature" => Ok(self.llm.synthesis_temperature.to_string()),
            "llm.max_tokens" => Ok(self.llm.max_tokens.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),

            // Orchestrator settings
            "orchestrator.fetch_deadline_secs" => {
                Ok(self.orchestrator.fetch_deadline_secs.to_string())
            }
            "orchestrator.cache_ttl_days" => Ok(self.orchestrator.cache_ttl_days.to_string()),
            "orchestrator.max_traversal_depth" => {
                Ok(self.orchestrator.max_traversal_depth.to_string())
            }
            "orchestrator.max_path_nodes" => Ok(self.orchestrator.max_path_nodes.to_string()),
            "orchestrator.context_limit" => Ok(self.orchestrator.context_limit.to_string()),
            "orchestrator.resource_limit" => Ok(self.orchestrator.resource_limit.to_string()),

            // Notifier settings
            "notifier.webhook_url" => Ok(self
                .notifier
                .webhook_url
                .clone()
                .unwrap_or_else(|| "(not set)".to_string())),
            "notifier.deadline_secs" => Ok(self.notifier.deadline_secs.to_string()),
            "notifier.max_attempts" => Ok(self.notifier.max_attempts.to_string()),

            // API key (special handling - show redacted)
            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => {
                    Ok("(not set - use EDUWEAVE_API_KEY or OPENROUTER_API_KEY env var)".to_string())
                }
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `eduweave config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            // LLM settings
            "llm.default_model" => {
                self.llm.default_model = value.to_string();
            }
            "llm.embedding_model" => {
                self.llm.embedding_model = value.to_string();
            }
            "llm.extraction_temperature" => {
                self.llm.extraction_temperature = parse_temperature(key, value)?;
            }
            "llm.synthesis_temperature" => {
                self.llm.synthesis_temperature = parse_temperature(key, value)?;
            }
            "llm.max_tokens" => {
                self.llm.max_tokens = value
                    .parse()
                    .with_context(|| format!("Invalid max_tokens value: {}", value))?;
            }
            "llm.timeout_secs" => {
                self.llm.timeout_secs = value
                    .parse()
                    .with_context(|| format!("Invalid timeout_secs value: {}", value))?;
            }

            // Orchestrator settings
            "orchestrator.fetch_deadline_secs" => {
                let secs: u64 = value
                    .parse()
                    .with_context(|| format!("Invalid fetch_deadline_secs value: {}", value))?;
                if secs == 0 {
                    return Err(anyhow!("Fetch deadline must be positive"));
                }
                self.orchestrator.fetch_deadline_secs = secs;
            }
            "orchestrator.cache_ttl_days" => {
                let days: i64 = value
                    .parse()
                    .with_context(|| format!("Invalid cache_ttl_days value: {}", value))?;
                if days < 0 {
                    return Err(anyhow!("Cache TTL must be non-negative"));
                }
                self.orchestrator.cache_ttl_days = days;
            }
            "orchestrator.max_traversal_depth" => {
                let depth: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid max_traversal_depth value: {}", value))?;
                if depth == 0 {
                    return Err(anyhow!("Traversal depth must be positive"));
                }
                self.orchestrator.max_traversal_depth = depth;
            }
            "orchestrator.max_path_nodes" => {
                let nodes: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid max_path_nodes value: {}", value))?;
                if nodes == 0 {
                    return Err(anyhow!("Path node cap must be positive"));
                }
                self.orchestrator.max_path_nodes = nodes;
            }
            "orchestrator.context_limit" => {
                self.orchestrator.context_limit = value
                    .parse()
                    .with_context(|| format!("Invalid context_limit value: {}", value))?;
            }
            "orchestrator.resource_limit" => {
                self.orchestrator.resource_limit = value
                    .parse()
                    .with_context(|| format!("Invalid resource_limit value: {}", value))?;
            }

            // Notifier settings
            "notifier.webhook_url" => {
                self.notifier.webhook_url = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "notifier.deadline_secs" => {
                self.notifier.deadline_secs = value
                    .parse()
                    .with_context(|| format!("Invalid deadline_secs value: {}", value))?;
            }
            "notifier.max_attempts" => {
                let attempts: u32 = value
                    .parse()
                    .with_context(|| format!("Invalid max_attempts value: {}", value))?;
                if attempts == 0 {
                    return Err(anyhow!("Notifier attempts must be positive"));
                }
                self.notifier.max_attempts = attempts;
            }

            // API key cannot be set via config
            "llm.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration for security. \
                     Set the EDUWEAVE_API_KEY or OPENROUTER_API_KEY environment variable instead."
                ));
            }

            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `eduweave config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and their values
    pub fn list(&self) -> anyhow::Result<Vec<(String, String)>> {
        let keys = vec![
            "llm.default_model",
            "llm.embedding_model",
            "llm.extraction_temperature",
            "llm.synthesis_temperature",
            "llm.max_tokens",
            "llm.timeout_secs",
            "llm.api_key",
            "orchestrator.fetch_deadline_secs",
            "orchestrator.cache_ttl_days",
            "orchestrator.max_traversal_depth",
            "orchestrator.max_path_nodes",
            "orchestrator.context_limit",
            "orchestrator.resource_limit",
            "notifier.webhook_url",
            "notifier.deadline_secs",
            "notifier.max_attempts",
        ];

        keys.into_iter()
            .map(|key| {
                let value = self.get(key)?;
                Ok((key.to_string(), value))
            })
            .collect()
    }

    /// Reset configuration to defaults
    pub fn reset() -> anyhow::Result<()> {
        let path = Self::config_path()?;
        if path.exists() {
            fs::remove_file(&path)
                .with_context(|| format!("Failed to remove config file: {}", path.display()))?;
        }
        Ok(())
    }
}

fn parse_temperature(key: &str, value: &str) -> anyhow::Result<f32> {
    let temp: f32 = value
        .parse()
        .with_context(|| format!("Invalid {} value: {}", key, value))?;
    if !(0.0..=2.0).contains(&temp) {
        return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
    }
    Ok(temp)
}
