//! Configuration management with file persistence

use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::PathBuf;

/// Curio configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    /// Optional override for the OpenAI-compatible API base URL
    pub base_url: Option<String>,
    pub default_model: String,
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: LlmConfig {
                api_key: None,
                base_url: None,
                default_model: "gpt-4.1-mini".to_string(),
                temperature: 0.3,
                max_tokens: 1000,
                timeout_secs: 30,
            },
        }
    }
}

impl LlmConfig {
    pub fn resolved_api_key(&self) -> anyhow::Result<Option<String>> {
        self.enforce_env_only()?;

        Ok(env::var("CURIO_API_KEY")
            .or_else(|_| env::var("OPENAI_API_KEY"))
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

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> anyhow::Result<PathBuf> {
        let dir = if let Ok(custom_dir) = env::var("CURIO_CONFIG_DIR") {
            PathBuf::from(custom_dir)
        } else {
            dirs::config_dir()
                .ok_or_else(|| anyhow!("Could not determine config directory"))?
                .join("curio")
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
        self.llm.enforce_env_only()
    }

    /// Get a configuration value by key
    pub fn get(&self, key: &str) -> anyhow::Result<String> {
        match key {
            "llm.base_url" => Ok(self
                .llm
                .base_url
                .clone()
                .unwrap_or_else(|| "(default)".to_string())),
            "llm.default_model" => Ok(self.llm.default_model.clone()),
            "llm.temperature" => Ok(self.llm.temperature.to_string()),
            "llm.max_tokens" => Ok(self.llm.max_tokens.to_string()),
            "llm.timeout_secs" => Ok(self.llm.timeout_secs.to_string()),

            // API key (special handling - show redacted)
            "llm.api_key" | "api_key" => match self.llm.redacted_api_key()? {
                Some(redacted) => Ok(redacted),
                None => {
                    Ok("(not set - use CURIO_API_KEY or OPENAI_API_KEY env var)".to_string())
                }
            },

            _ => Err(anyhow!(
                "Unknown configuration key: {}. Use `curio config list` to see available keys.",
                key
            )),
        }
    }

    /// Set a configuration value by key
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "llm.base_url" => {
                self.llm.base_url = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                };
            }
            "llm.default_model" => {
                self.llm.default_model = value.to_string();
            }
            "llm.temperature" => {
                let temp: f32 = value
                    .parse()
                    .with_context(|| format!("Invalid temperature value: {}", value))?;
                if !(0.0..=2.0).contains(&temp) {
                    return Err(anyhow!("Temperature must be between 0.0 and 2.0"));
                }
                self.llm.temperature = temp;
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
            "llm.api_key" | "api_key" => {
                return Err(anyhow!(
                    "API keys cannot be stored in configuration. Set the CURIO_API_KEY environment variable instead."
                ));
            }
            _ => {
                return Err(anyhow!(
                    "Unknown configuration key: {}. Use `curio config list` to see available keys.",
                    key
                ));
            }
        }
        Ok(())
    }

    /// List all configuration keys and values
    pub fn list(&self) -> Vec<(String, String)> {
        let keys = [
            "llm.base_url",
            "llm.default_model",
            "llm.temperature",
            "llm.max_tokens",
            "llm.timeout_secs",
            "llm.api_key",
        ];

        keys.iter()
            .filter_map(|key| self.get(key).ok().map(|value| (key.to_string(), value)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.default_model, "gpt-4.1-mini");
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.llm.max_tokens, 1000);
        assert!(config.llm.base_url.is_none());
    }

    #[test]
    fn test_get_set_round_trip() {
        let mut config = Config::default();

        config.set("llm.default_model", "gpt-4o").unwrap();
        assert_eq!(config.get("llm.default_model").unwrap(), "gpt-4o");

        config.set("llm.temperature", "0.7").unwrap();
        assert_eq!(config.get("llm.temperature").unwrap(), "0.7");

        config.set("llm.max_tokens", "2048").unwrap();
        assert_eq!(config.get("llm.max_tokens").unwrap(), "2048");
    }

    #[test]
    fn test_set_rejects_invalid_temperature() {
        let mut config = Config::default();
        assert!(config.set("llm.temperature", "3.5").is_err());
        assert!(config.set("llm.temperature", "not-a-number").is_err());
    }

    #[test]
    fn test_set_rejects_api_key() {
        let mut config = Config::default();
        assert!(config.set("llm.api_key", "sk-secret").is_err());
    }

    #[test]
    fn test_unknown_key() {
        let config = Config::default();
        assert!(config.get("nonexistent.key").is_err());
    }

    #[test]
    fn test_enforce_env_only() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.llm.api_key = Some("sk-inline".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let serialized = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(parsed.llm.default_model, config.llm.default_model);
        assert_eq!(parsed.llm.max_tokens, config.llm.max_tokens);
    }
}
