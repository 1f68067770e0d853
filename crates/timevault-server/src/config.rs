//! Server configuration, parsed from TOML file + environment variable overrides.
//!
//! Priority: environment variables > config file > defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use timevault_core::{Address, Amount};

/// Top-level server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// General server settings
    #[serde(default)]
    pub server: ServerSection,

    /// Vault to deploy and watch
    pub vault: VaultSection,

    /// Initial external account balances for a fresh ledger
    #[serde(default)]
    pub genesis: Vec<GenesisAccount>,
}

/// General server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSection {
    /// Data directory (deployment state)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Watch interval in seconds (default: 10 minutes)
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,

    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Warn when the vault unlocks within this many seconds (default: 1 day)
    #[serde(default = "default_warning_window")]
    pub warning_window_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            check_interval_secs: default_check_interval(),
            log_level: default_log_level(),
            warning_window_secs: default_warning_window(),
        }
    }
}

/// Vault deployment parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultSection {
    /// Owner address (hex, `0x` optional). Deploys and acts as this identity.
    pub owner: String,

    /// Lock duration from deployment, in seconds
    #[serde(default = "default_lock_secs")]
    pub lock_secs: u64,

    /// Funding attached at deployment, e.g. "1 ether", "1000000000 wei"
    #[serde(default = "default_funding")]
    pub funding: String,

    /// Human-readable label for logs
    #[serde(default = "default_vault_label")]
    pub label: String,
}

/// A pre-funded external account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: String,
    pub balance: String,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_data_dir() -> PathBuf {
    PathBuf::from("/data")
}

fn default_check_interval() -> u64 {
    600 // 10 minutes
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_warning_window() -> u64 {
    86_400
}

fn default_lock_secs() -> u64 {
    3600
}

fn default_funding() -> String {
    "1 ether".to_string()
}

fn default_vault_label() -> String {
    "timevault".to_string()
}

// ============================================================================
// Loading & environment override
// ============================================================================

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: ServerConfig =
            toml::from_str(&contents).with_context(|| "Failed to parse TOML config")?;
        Ok(config)
    }

    /// Apply environment variable overrides.
    ///
    /// Supported env vars:
    /// - `TIMEVAULT_DATA_DIR`
    /// - `TIMEVAULT_CHECK_INTERVAL`
    /// - `TIMEVAULT_LOG_LEVEL`
    /// - `TIMEVAULT_WARNING_WINDOW`
    /// - `TIMEVAULT_OWNER`
    /// - `TIMEVAULT_LOCK_SECS`
    /// - `TIMEVAULT_FUNDING`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("TIMEVAULT_DATA_DIR") {
            self.server.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("TIMEVAULT_CHECK_INTERVAL") {
            if let Ok(secs) = v.parse::<u64>() {
                self.server.check_interval_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("TIMEVAULT_LOG_LEVEL") {
            self.server.log_level = v;
        }
        if let Ok(v) = std::env::var("TIMEVAULT_WARNING_WINDOW") {
            if let Ok(secs) = v.parse::<u64>() {
                self.server.warning_window_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("TIMEVAULT_OWNER") {
            self.vault.owner = v;
        }
        if let Ok(v) = std::env::var("TIMEVAULT_LOCK_SECS") {
            if let Ok(secs) = v.parse::<u64>() {
                self.vault.lock_secs = secs;
            }
        }
        if let Ok(v) = std::env::var("TIMEVAULT_FUNDING") {
            self.vault.funding = v;
        }
    }

    /// Parsed owner address
    pub fn owner(&self) -> Result<Address> {
        self.vault
            .owner
            .parse()
            .with_context(|| format!("Invalid vault.owner: {}", self.vault.owner))
    }

    /// Parsed deployment funding
    pub fn funding(&self) -> Result<Amount> {
        self.vault
            .funding
            .parse()
            .with_context(|| format!("Invalid vault.funding: {}", self.vault.funding))
    }

    /// Parsed genesis allocations
    pub fn genesis_accounts(&self) -> Result<Vec<(Address, Amount)>> {
        self.genesis
            .iter()
            .map(|account| -> Result<(Address, Amount)> {
                let address = account
                    .address
                    .parse::<Address>()
                    .with_context(|| format!("Invalid genesis address: {}", account.address))?;
                let balance = account
                    .balance
                    .parse::<Amount>()
                    .with_context(|| format!("Invalid genesis balance: {}", account.balance))?;
                Ok((address, balance))
            })
            .collect()
    }

    /// Path of the persisted deployment
    pub fn deployment_path(&self) -> PathBuf {
        self.server.data_dir.join("deployment.json")
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        self.owner()?;
        self.funding()?;
        self.genesis_accounts()?;

        anyhow::ensure!(self.vault.lock_secs > 0, "vault.lock_secs must be > 0");

        anyhow::ensure!(
            self.server.check_interval_secs >= 10,
            "server.check_interval_secs must be >= 10"
        );

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn minimal_toml() -> &'static str {
        r#"
[vault]
owner = "0x1111111111111111111111111111111111111111"
"#
    }

    fn full_toml() -> &'static str {
        r#"
[server]
data_dir = "/custom/data"
check_interval_secs = 60
log_level = "debug"
warning_window_secs = 3600

[vault]
owner = "0x1111111111111111111111111111111111111111"
lock_secs = 7200
funding = "1 gwei"
label = "savings"

[[genesis]]
address = "0x1111111111111111111111111111111111111111"
balance = "10 ether"

[[genesis]]
address = "2222222222222222222222222222222222222222"
balance = "500000 wei"
"#
    }

    fn load(toml: &str) -> ServerConfig {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", toml).unwrap();
        ServerConfig::from_file(file.path()).unwrap()
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = load(minimal_toml());
        assert_eq!(config.server.check_interval_secs, 600); // default
        assert_eq!(config.server.data_dir, PathBuf::from("/data"));
        assert_eq!(config.vault.lock_secs, 3600);
        assert_eq!(config.funding().unwrap(), Amount::from_ether(1));
        assert_eq!(config.vault.label, "timevault");
        assert!(config.genesis.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let config = load(full_toml());

        assert_eq!(config.server.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.server.check_interval_secs, 60);
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.server.warning_window_secs, 3600);
        assert_eq!(config.vault.lock_secs, 7200);
        assert_eq!(config.funding().unwrap(), Amount::from_gwei(1));
        assert_eq!(config.vault.label, "savings");

        let genesis = config.genesis_accounts().unwrap();
        assert_eq!(genesis.len(), 2);
        assert_eq!(genesis[0].1, Amount::from_ether(10));
        assert_eq!(genesis[1].1, Amount::from_wei(500_000));
        assert_eq!(
            config.deployment_path(),
            PathBuf::from("/custom/data/deployment.json")
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut config = load(minimal_toml());

        std::env::set_var("TIMEVAULT_DATA_DIR", "/env/data");
        std::env::set_var("TIMEVAULT_LOCK_SECS", "1800");
        std::env::set_var("TIMEVAULT_FUNDING", "5 gwei");

        config.apply_env_overrides();

        assert_eq!(config.server.data_dir, PathBuf::from("/env/data"));
        assert_eq!(config.vault.lock_secs, 1800);
        assert_eq!(config.funding().unwrap(), Amount::from_gwei(5));

        std::env::remove_var("TIMEVAULT_DATA_DIR");
        std::env::remove_var("TIMEVAULT_LOCK_SECS");
        std::env::remove_var("TIMEVAULT_FUNDING");
    }

    #[test]
    fn test_validation_ok() {
        assert!(load(minimal_toml()).validate().is_ok());
        assert!(load(full_toml()).validate().is_ok());
    }

    #[test]
    fn test_validation_bad_owner() {
        let config = load(
            r#"
[vault]
owner = "0x1234"
"#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_lock() {
        let config = load(
            r#"
[vault]
owner = "0x1111111111111111111111111111111111111111"
lock_secs = 0
"#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bad_funding() {
        let config = load(
            r#"
[vault]
owner = "0x1111111111111111111111111111111111111111"
funding = "3 doubloons"
"#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_check_interval_too_low() {
        let config = load(
            r#"
[server]
check_interval_secs = 5

[vault]
owner = "0x1111111111111111111111111111111111111111"
"#,
        );
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_serde_roundtrip() {
        let config = load(full_toml());
        let serialized = toml::to_string_pretty(&config).unwrap();

        let reparsed: ServerConfig = toml::from_str(&serialized).unwrap();
        assert_eq!(reparsed.vault.lock_secs, config.vault.lock_secs);
        assert_eq!(reparsed.genesis.len(), 2);
    }
}
