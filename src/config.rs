use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use ethers::types::Address;

pub const CONFIG_PATH: &str = "guestbook-config.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Created default config at {0}. Please edit and restart.")]
    CreatedDefault(String),

    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to write default config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Base,
    Sepolia,
}

impl Chain {
    pub fn id(self) -> u64 {
        match self {
            Chain::Base => 8453,
            Chain::Sepolia => 84532,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Chain::Base => "Base",
            Chain::Sepolia => "Base Sepolia",
        }
    }

    pub fn explorer_url(self) -> &'static str {
        match self {
            Chain::Base => "https://basescan.org",
            Chain::Sepolia => "https://sepolia.basescan.org",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub rpc_url: String,
    pub chain: Chain,
    pub contract_address: String,
    pub static_dir: String,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub window_ms: u64,
    pub max_requests: u32,
    /// Table size above which fully expired identifiers are swept.
    pub sweep_threshold: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    pub base_url: String,
    pub model: String,
    /// Falls back to `OPENAI_API_KEY` when empty.
    pub api_key: String,
    pub timeout_seconds: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            rpc_url: "https://mainnet.base.org".to_string(),
            chain: Chain::Base,
            contract_address: "0xB71C596aC966125d03960A43c762E86e51040F9B".to_string(),
            static_dir: "static".to_string(),
            rate_limit: RateLimitConfig::default(),
            feed: FeedConfig::default(),
            assistant: AssistantConfig::default(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            max_requests: 10,
            sweep_threshold: 10_000,
        }
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: String::new(),
            timeout_seconds: 30,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_PATH)
    }

    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            let default = Config::default();
            let toml = toml::to_string_pretty(&default)?;
            fs::write(config_path, toml)?;
            return Err(ConfigError::CreatedDefault(
                config_path.display().to_string(),
            ));
        }

        let contents = fs::read_to_string(config_path)?;
        let mut config = Self::parse(&contents)?;
        if config.assistant.api_key.is_empty() {
            if let Ok(key) = std::env::var("OPENAI_API_KEY") {
                config.assistant.api_key = key;
            }
        }
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit.window_ms == 0 {
            return Err(ConfigError::Invalid("rate_limit.window_ms must be > 0".into()));
        }
        if self.rate_limit.max_requests == 0 {
            return Err(ConfigError::Invalid("rate_limit.max_requests must be > 0".into()));
        }
        if self.feed.page_size == 0 {
            return Err(ConfigError::Invalid("feed.page_size must be > 0".into()));
        }
        self.contract()?;
        Ok(())
    }

    pub fn contract(&self) -> Result<Address, ConfigError> {
        self.contract_address
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("contract_address: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_toml() {
        let text = toml::to_string_pretty(&Config::default()).unwrap();
        let config = Config::parse(&text).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.chain, Chain::Base);
        assert_eq!(config.rate_limit.max_requests, 10);
        assert_eq!(config.rate_limit.window_ms, 60_000);
        assert_eq!(config.feed.page_size, 10);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config = Config::parse(
            r#"
            port = 8080
            rpc_url = "https://sepolia.base.org"
            chain = "sepolia"
            contract_address = "0xB71C596aC966125d03960A43c762E86e51040F9B"
            static_dir = "out"
            "#,
        )
        .unwrap();
        assert_eq!(config.chain.id(), 84532);
        assert_eq!(config.chain.explorer_url(), "https://sepolia.basescan.org");
        assert_eq!(config.rate_limit.sweep_threshold, 10_000);
        assert_eq!(config.assistant.model, "gpt-4o-mini");
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let mut config = Config::default();
        config.rate_limit.max_requests = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_bad_contract_address() {
        let config = Config {
            contract_address: "0x1234".to_string(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_writes_default_when_missing() {
        let path = std::env::temp_dir().join(format!(
            "guestbook-config-test-{}.toml",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::CreatedDefault(_)));
        assert!(path.exists());

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.port, 3000);
        let _ = fs::remove_file(&path);
    }
}
