use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::sync::OnceLock;

static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Broker keypair configuration.
///
/// The private key is the only long-lived secret the broker holds. When no
/// PEM file is configured a fresh keypair is generated at startup; the
/// paired password servers must then be re-seeded with the new public key.
#[derive(Debug, Deserialize, Clone)]
pub struct KeyConfig {
    /// Path to a PKCS#8 PEM private key
    #[serde(default)]
    pub pem_file: Option<String>,
    /// Key size used when generating a fresh keypair
    #[serde(default = "default_key_bits")]
    pub bits: usize,
}

fn default_key_bits() -> usize {
    2048
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            pem_file: None,
            bits: default_key_bits(),
        }
    }
}

/// Remote password-server transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    10
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Insert-token settings
#[derive(Debug, Deserialize, Clone)]
pub struct TokenConfig {
    /// Lifetime of an unconsumed insert token
    #[serde(default = "default_token_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_token_ttl_secs() -> u64 {
    900
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_token_ttl_secs(),
        }
    }
}

/// Root application configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub key: KeyConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub tokens: TokenConfig,
}

impl AppConfig {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default config file
            .add_source(File::with_name("config/default").required(false))
            // Override with local config if present
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (prefix: PASSBRIDGE_)
            // e.g., PASSBRIDGE_KEY__PEM_FILE, PASSBRIDGE_TOKENS__TTL_SECS
            .add_source(
                Environment::with_prefix("PASSBRIDGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Initialize the global config singleton
    pub fn init() -> Result<&'static Self, ConfigError> {
        let config = Self::load()?;
        Ok(CONFIG.get_or_init(|| config))
    }

    /// Get reference to the global config
    pub fn get() -> &'static Self {
        CONFIG.get().expect("Config not initialized. Call AppConfig::init() first.")
    }
}
