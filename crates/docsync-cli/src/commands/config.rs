//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use docsync_core::{Config, ConflictPolicy};

use crate::output::{Output, OutputFormat};

const VALID_KEYS: &str = "data_dir, sync_enabled, remote_dir, log_file, debounce_ms, \
                          conflict_threshold_ms, max_attempts, retry_base_delay_ms, \
                          retry_max_delay_ms, synced_grace_ms, conflict_policy";

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
                    "sync_enabled": config.sync_enabled,
                    "remote_dir": config.remote_dir,
                    "log_file": config.log_file,
                    "sync": config.sync,
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let effective_path = config_path
                .cloned()
                .unwrap_or_else(Config::config_file_path);
            println!("Configuration:");
            println!("  data_dir:              {}", config.data_dir.display());
            println!("  sync_enabled:          {}", config.sync_enabled);
            println!("  remote_dir:            {}", display_or_unset(&config.remote_dir));
            println!("  log_file:              {}", display_or_unset(&config.log_file));
            println!();
            println!("Sync:");
            println!("  debounce_ms:           {}", config.sync.debounce_ms);
            println!("  conflict_threshold_ms: {}", config.sync.conflict_threshold_ms);
            println!("  max_attempts:          {}", config.sync.max_attempts);
            println!("  retry_base_delay_ms:   {}", config.sync.retry_base_delay_ms);
            println!("  retry_max_delay_ms:    {}", config.sync.retry_max_delay_ms);
            println!("  synced_grace_ms:       {}", config.sync.synced_grace_ms);
            println!(
                "  conflict_policy:       {}",
                policy_name(config.sync.conflict_policy)
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
        "sync_enabled" => {
            config.sync_enabled = value
                .parse()
                .context("Invalid value for sync_enabled. Use 'true' or 'false'.")?;
        }
        "remote_dir" => {
            config.remote_dir = optional_path(value);
        }
        "log_file" => {
            config.log_file = optional_path(value);
        }
        "debounce_ms" => {
            config.sync.debounce_ms = value
                .parse()
                .context("Invalid value for debounce_ms. Use milliseconds.")?;
        }
        "conflict_threshold_ms" => {
            config.sync.conflict_threshold_ms = value
                .parse()
                .context("Invalid value for conflict_threshold_ms. Use milliseconds.")?;
        }
        "max_attempts" => {
            config.sync.max_attempts = value
                .parse()
                .context("Invalid value for max_attempts. Use a positive number.")?;
        }
        "retry_base_delay_ms" => {
            config.sync.retry_base_delay_ms = value
                .parse()
                .context("Invalid value for retry_base_delay_ms. Use milliseconds.")?;
        }
        "retry_max_delay_ms" => {
            config.sync.retry_max_delay_ms = value
                .parse()
                .context("Invalid value for retry_max_delay_ms. Use milliseconds.")?;
        }
        "synced_grace_ms" => {
            config.sync.synced_grace_ms = value
                .parse()
                .context("Invalid value for synced_grace_ms. Use milliseconds.")?;
        }
        "conflict_policy" => {
            config.sync.conflict_policy = value.parse()?;
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

fn optional_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.into())
    }
}

fn display_or_unset(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string())
}

fn policy_name(policy: ConflictPolicy) -> &'static str {
    match policy {
        ConflictPolicy::Ask => "ask",
        ConflictPolicy::Local => "local",
        ConflictPolicy::Remote => "remote",
        ConflictPolicy::Both => "both",
    }
}
