//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/chainlist/config.toml)
//! 3. Environment variables (CHAINLIST_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable prefix
const ENV_PREFIX: &str = "CHAINLIST";

/// Default JSON-RPC endpoint (a local Hardhat node)
pub const DEFAULT_RPC_URL: &str = "http://127.0.0.1:8545";

/// Which store backend to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process ledger persisted under the data directory
    #[default]
    Local,
    /// Deployed contract reached over Ethereum JSON-RPC
    Rpc,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Local => write!(f, "local"),
            Backend::Rpc => write!(f, "rpc"),
        }
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "rpc" => Ok(Backend::Rpc),
            other => bail!("Unknown backend '{}'. Use 'local' or 'rpc'.", other),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for local data (ledger file, debug log)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Store backend
    #[serde(default)]
    pub backend: Backend,

    /// JSON-RPC endpoint for the rpc backend
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Address of the deployed TodoList contract
    #[serde(default)]
    pub contract_address: Option<String>,

    /// Account to act as (defaults to the first account the node exposes)
    #[serde(default)]
    pub account: Option<String>,

    /// How often to poll for transaction receipts
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Simulated finality delay for the local ledger
    #[serde(default = "default_local_finality_ms")]
    pub local_finality_ms: u64,

    /// Log file for TUI mode (defaults to {data_dir}/debug.log)
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            backend: Backend::default(),
            rpc_url: default_rpc_url(),
            contract_address: None,
            account: None,
            poll_interval_ms: default_poll_interval_ms(),
            local_finality_ms: default_local_finality_ms(),
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (CHAINLIST_DATA_DIR, CHAINLIST_BACKEND, ...)
    /// 2. Config file (~/.config/chainlist/config.toml or CHAINLIST_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration, preferring a path given on the command line
    pub fn load_with_cli_override(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from_path(path),
            None => Self::load(),
        }
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Unknown backend names are ignored rather than failing the load
        if let Ok(val) = std::env::var(format!("{}_BACKEND", ENV_PREFIX)) {
            if let Ok(backend) = val.parse() {
                self.backend = backend;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_RPC_URL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.rpc_url = val;
            }
        }

        // Empty string clears it
        if let Ok(val) = std::env::var(format!("{}_CONTRACT", ENV_PREFIX)) {
            self.contract_address = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_ACCOUNT", ENV_PREFIX)) {
            self.account = if val.is_empty() { None } else { Some(val) };
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Check that the selected backend has what it needs
    pub fn validate(&self) -> Result<()> {
        if self.backend == Backend::Rpc {
            let Some(ref address) = self.contract_address else {
                bail!(
                    "No contract address configured for the rpc backend. Set it with:\n  \
                     chainlist config set contract_address 0x..."
                );
            };
            if !is_address(address) {
                bail!("Invalid contract address '{}': expected 0x followed by 40 hex digits", address);
            }
            if let Some(ref account) = self.account {
                if !is_address(account) {
                    bail!("Invalid account '{}': expected 0x followed by 40 hex digits", account);
                }
            }
        }
        Ok(())
    }

    /// Save configuration to the default file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    /// Save configuration to a specific file
    pub fn save_to_path(&self, config_path: &PathBuf) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with CHAINLIST_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("chainlist")
            .join("config.toml")
    }

    /// Get the path to the local ledger file
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join("ledger.json")
    }

    /// Get the path to the TUI debug log
    pub fn log_path(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join("debug.log"))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn local_finality(&self) -> Duration {
        Duration::from_millis(self.local_finality_ms)
    }
}

/// `0x` followed by 40 hex digits
pub fn is_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .map(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("chainlist")
}

fn default_rpc_url() -> String {
    DEFAULT_RPC_URL.to_string()
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_local_finality_ms() -> u64 {
    250
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "CHAINLIST_DATA_DIR",
        "CHAINLIST_BACKEND",
        "CHAINLIST_RPC_URL",
        "CHAINLIST_CONTRACT",
        "CHAINLIST_ACCOUNT",
    ];

    const CONTRACT: &str = "0x5FbDB2315678afecb367f032d93F642f64180aa3";

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.rpc_url, DEFAULT_RPC_URL);
        assert!(config.contract_address.is_none());
        assert!(config.data_dir.ends_with("chainlist"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();
        assert!(config.ledger_path().ends_with("ledger.json"));
        assert!(config.log_path().ends_with("debug.log"));
    }

    #[test]
    fn test_backend_parse() {
        assert_eq!("local".parse::<Backend>().unwrap(), Backend::Local);
        assert_eq!("RPC".parse::<Backend>().unwrap(), Backend::Rpc);
        assert!("ipfs".parse::<Backend>().is_err());
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("CHAINLIST_DATA_DIR", "/tmp/chainlist-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/chainlist-test"));
    }

    #[test]
    fn test_env_override_backend() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("CHAINLIST_BACKEND", "rpc");
        config.apply_env_overrides();
        assert_eq!(config.backend, Backend::Rpc);

        // Garbage leaves the current value alone
        env::set_var("CHAINLIST_BACKEND", "carrier-pigeon");
        config.apply_env_overrides();
        assert_eq!(config.backend, Backend::Rpc);
    }

    #[test]
    fn test_env_override_contract() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("CHAINLIST_CONTRACT", CONTRACT);
        config.apply_env_overrides();
        assert_eq!(config.contract_address.as_deref(), Some(CONTRACT));

        env::set_var("CHAINLIST_CONTRACT", "");
        config.apply_env_overrides();
        assert!(config.contract_address.is_none());
    }

    #[test]
    fn test_validate_rpc_requires_contract() {
        let mut config = Config {
            backend: Backend::Rpc,
            ..Config::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("contract_address"));

        config.contract_address = Some("0x1234".to_string());
        assert!(config.validate().is_err());

        config.contract_address = Some(CONTRACT.to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_local_needs_nothing() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_is_address() {
        assert!(is_address(CONTRACT));
        assert!(!is_address("5FbDB2315678afecb367f032d93F642f64180aa3"));
        assert!(!is_address("0xZZbDB2315678afecb367f032d93F642f64180aa3"));
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let config = Config {
            data_dir: PathBuf::from("/data/chainlist"),
            backend: Backend::Rpc,
            contract_address: Some(CONTRACT.to_string()),
            ..Config::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("backend = \"rpc\""));
        assert!(toml_str.contains("contract_address"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.backend, config.backend);
        assert_eq!(parsed.contract_address, config.contract_address);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            backend = "rpc"
            rpc_url = "http://node.example.com:8545"
            poll_interval_ms = 250
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.backend, Backend::Rpc);
        assert_eq!(config.rpc_url, "http://node.example.com:8545");
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        assert_eq!(config.local_finality_ms, 250);
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("CHAINLIST_DATA_DIR", temp_dir.path());

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.data_dir, temp_dir.path());
    }

    #[test]
    fn test_save_to_path_round_trips() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let config = Config {
            data_dir: temp_dir.path().to_path_buf(),
            account: Some(CONTRACT.to_string()),
            ..Config::default()
        };
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.account, config.account);
    }
}
