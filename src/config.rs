//! Configuration management for deploy-tools
//!
//! Loads configuration from TOML files with environment variable substitution.
//! Every field has a default so the tools work against a local dev node with
//! no configuration file at all.

use anyhow::{Context, Result};
use ethers::types::Address;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "DEPLOY_TOOLS_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "deploy-tools.toml";

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub node: NodeConfig,
    pub wallet: WalletConfig,
    pub transactions: TransactionConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub jsonrpc: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            jsonrpc: "http://127.0.0.1:8545".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalletConfig {
    /// Name of the environment variable holding a hex private key
    pub private_key_env: String,
    /// Sender used when neither a private key nor an explicit `from` is given
    pub default_from: Option<String>,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            private_key_env: "DEPLOY_PRIVATE_KEY".to_string(),
            default_from: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    pub poll_interval_ms: u64,
    pub receipt_timeout_secs: u64,
    pub batch_timeout_secs: u64,
    /// Extra gas on top of the node's estimate, in percent
    pub gas_limit_buffer_percent: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            receipt_timeout_secs: 180,
            batch_timeout_secs: 300,
            gas_limit_buffer_percent: 0,
        }
    }
}

impl TransactionConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn receipt_timeout(&self) -> Duration {
        Duration::from_secs(self.receipt_timeout_secs)
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_secs(self.batch_timeout_secs)
    }
}

impl Settings {
    /// Load settings from an explicit path, `DEPLOY_TOOLS_CONFIG`, or
    /// `deploy-tools.toml` in the working directory.
    ///
    /// An explicitly requested file must exist. The implicit default path
    /// falls back to built-in defaults when missing.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let settings = match explicit {
            Some(path) => Self::from_file(&path)?,
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        settings.validate()?;
        Ok(settings)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&config_str)
    }

    /// Parse settings from TOML text
    pub fn parse(config_str: &str) -> Result<Self> {
        // Substitute environment variables
        let config_str = substitute_env_vars(config_str);

        toml::from_str(&config_str).with_context(|| "Failed to parse configuration")
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.node.jsonrpc.trim().is_empty() {
            anyhow::bail!("node.jsonrpc must not be empty");
        }

        let tx = &self.transactions;
        if tx.poll_interval_ms == 0 {
            anyhow::bail!("transactions.poll_interval_ms must be greater than zero");
        }
        if tx.receipt_timeout_secs == 0 || tx.batch_timeout_secs == 0 {
            anyhow::bail!("transaction timeouts must be greater than zero");
        }

        self.default_from()?;
        Ok(())
    }

    /// Parsed `wallet.default_from`
    pub fn default_from(&self) -> Result<Option<Address>> {
        self.wallet
            .default_from
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<Address>()
                    .with_context(|| format!("Invalid wallet.default_from address: {}", s))
            })
            .transpose()
    }

    /// Private key read from the configured environment variable, if set
    pub fn private_key(&self) -> Option<String> {
        env::var(&self.wallet.private_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Substitute environment variables in the format ${VAR_NAME}
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}").expect("static regex");

    re.replace_all(input, |cap: &regex::Captures| {
        env::var(&cap[1]).unwrap_or_default()
    })
    .into_owned()
}
