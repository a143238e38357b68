//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use chainlist_core::config::is_address;
use chainlist_core::Config;

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, backend, rpc_url, contract_address, account, \
                          poll_interval_ms, local_finality_ms, log_file";

/// Show current configuration
pub fn show(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "backend": config.backend,
                    "rpc_url": config.rpc_url,
                    "contract_address": config.contract_address,
                    "account": config.account,
                    "poll_interval_ms": config.poll_interval_ms,
                    "local_finality_ms": config.local_finality_ms,
                    "log_file": config.log_file
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.backend);
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:          {}", config.data_dir.display());
            println!("  backend:           {}", config.backend);
            println!("  rpc_url:           {}", config.rpc_url);
            println!(
                "  contract_address:  {}",
                config.contract_address.as_deref().unwrap_or("(not set)")
            );
            println!(
                "  account:           {}",
                config.account.as_deref().unwrap_or("(first node account)")
            );
            println!("  poll_interval_ms:  {}", config.poll_interval_ms);
            println!("  local_finality_ms: {}", config.local_finality_ms);
            println!(
                "  log_file:          {}",
                config
                    .log_file
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(not set)".to_string())
            );
            println!();
            println!("Config file: {}", effective_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(
    key: String,
    value: String,
    config_path: Option<&PathBuf>,
    output: &Output,
) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;

    apply(&mut config, &key, &value)?;

    // Save to the CLI-specified path or default
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));

    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => {
            config.data_dir = value.into();
        }
        "backend" => {
            config.backend = value.parse()?;
        }
        "rpc_url" => {
            if value.is_empty() {
                bail!("rpc_url must not be empty");
            }
            config.rpc_url = value.to_string();
        }
        "contract_address" => {
            config.contract_address = optional_address(value, "contract_address")?;
        }
        "account" => {
            config.account = optional_address(value, "account")?;
        }
        "poll_interval_ms" => {
            config.poll_interval_ms = value
                .parse()
                .context("Invalid value for poll_interval_ms. Use a number of milliseconds.")?;
        }
        "local_finality_ms" => {
            config.local_finality_ms = value
                .parse()
                .context("Invalid value for local_finality_ms. Use a number of milliseconds.")?;
        }
        "log_file" => {
            config.log_file = if value.is_empty() || value == "none" {
                None
            } else {
                Some(value.into())
            };
        }
        _ => {
            bail!(
                "Unknown configuration key: '{}'\nValid keys: {}",
                key,
                VALID_KEYS
            );
        }
    }
    Ok(())
}

fn optional_address(value: &str, key: &str) -> Result<Option<String>> {
    if value.is_empty() || value == "none" {
        return Ok(None);
    }
    if !is_address(value) {
        bail!(
            "Invalid value for {}: expected 0x followed by 40 hex digits",
            key
        );
    }
    Ok(Some(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainlist_core::Backend;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "backend", "rpc").unwrap();
        apply(
            &mut config,
            "contract_address",
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
        )
        .unwrap();
        apply(&mut config, "poll_interval_ms", "250").unwrap();

        assert_eq!(config.backend, Backend::Rpc);
        assert!(config.contract_address.is_some());
        assert_eq!(config.poll_interval_ms, 250);

        apply(&mut config, "contract_address", "none").unwrap();
        assert!(config.contract_address.is_none());
    }

    #[test]
    fn test_apply_rejects_bad_values() {
        let mut config = Config::default();

        assert!(apply(&mut config, "backend", "ipfs").is_err());
        assert!(apply(&mut config, "account", "0x1234").is_err());
        assert!(apply(&mut config, "poll_interval_ms", "soon").is_err());
        assert!(apply(&mut config, "sync_url", "ws://x").is_err());
    }

    #[test]
    fn test_set_writes_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            format!("data_dir = '{}'\n", temp_dir.path().display()),
        )
        .unwrap();
        let output = Output::new(OutputFormat::Quiet);

        set(
            "local_finality_ms".to_string(),
            "0".to_string(),
            Some(&path),
            &output,
        )
        .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("local_finality_ms = 0"));
    }
}
