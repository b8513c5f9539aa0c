//! Target command handlers
//!
//! The target container is a directory; selecting or clearing it updates
//! the config file and moves the connection between `Ready` and
//! `AuthenticatedNoTarget`.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use docsync_core::Config;

use super::Engine;
use crate::output::Output;

/// Select the target directory
pub fn set(dir: PathBuf, config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create target directory: {:?}", dir))?;
    let dir = dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve target directory: {:?}", dir))?;

    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    config.remote_dir = Some(dir.clone());
    save(&config, config_path)?;

    let engine = Engine::open(&config)?;
    output.success(&format!(
        "Target set to {} (connection is {})",
        dir.display(),
        engine.connection.state()
    ));
    Ok(())
}

/// Forget the target directory
pub fn clear(config_path: Option<&PathBuf>, output: &Output) -> Result<()> {
    let mut config =
        Config::load_with_cli_override(config_path).context("Failed to load configuration")?;
    config.remote_dir = None;
    save(&config, config_path)?;

    let engine = Engine::open(&config)?;
    output.success(&format!(
        "Target cleared (connection is {})",
        engine.connection.state()
    ));
    Ok(())
}

fn save(config: &Config, config_path: Option<&PathBuf>) -> Result<()> {
    let save_path = config_path
        .cloned()
        .unwrap_or_else(Config::config_file_path);
    config
        .save_to_path(&save_path)
        .context("Failed to save configuration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use docsync_core::{ConnectionEvent, ConnectionState};
    use tempfile::TempDir;

    #[test]
    fn test_set_and_clear_target() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let initial = Config {
            data_dir: temp_dir.path().join("data"),
            ..Config::default()
        };
        initial.save_to_path(&config_path).unwrap();
        let output = Output::new(OutputFormat::Quiet);

        {
            let engine = Engine::open(&initial).unwrap();
            engine.connection.dispatch(ConnectionEvent::StartAuth).unwrap();
            engine
                .connection
                .dispatch(ConnectionEvent::AuthSucceeded { has_target: false })
                .unwrap();
        }

        let target = temp_dir.path().join("drive");
        set(target.clone(), Some(&config_path), &output).unwrap();

        let config = Config::load_from_path(&config_path).unwrap();
        assert_eq!(config.remote_dir, Some(target.canonicalize().unwrap()));
        assert_eq!(
            Engine::open(&config).unwrap().connection.state(),
            ConnectionState::Ready
        );

        clear(Some(&config_path), &output).unwrap();
        let config = Config::load_from_path(&config_path).unwrap();
        assert!(config.remote_dir.is_none());
        assert_eq!(
            Engine::open(&config).unwrap().connection.state(),
            ConnectionState::AuthenticatedNoTarget
        );
    }
}
