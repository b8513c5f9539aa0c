//! Auth command handlers
//!
//! A directory target needs no credential exchange, so signing in walks the
//! connection through its handshake states directly.

use anyhow::Result;

use docsync_core::{Config, ConnectionEvent, ConnectionState};

use super::Engine;
use crate::output::Output;

/// Sign in
pub fn login(config: &Config, output: &Output) -> Result<()> {
    let engine = Engine::open(config)?;
    let connection = &engine.connection;

    if connection.state().is_signed_in() {
        output.message(&format!("Already signed in (connection is {}).", connection.state()));
        return Ok(());
    }

    connection.dispatch(ConnectionEvent::StartAuth)?;
    let has_target = config.remote_dir.is_some();
    let state = connection.dispatch(ConnectionEvent::AuthSucceeded { has_target })?;

    output.success(&format!("Signed in (connection is {})", state));
    if state == ConnectionState::AuthenticatedNoTarget {
        output.message("No target selected yet. Choose one with:\n  docsync target set <dir>");
    }
    Ok(())
}

/// Sign out
pub fn logout(config: &Config, output: &Output) -> Result<()> {
    let engine = Engine::open(config)?;
    engine.connection.dispatch(ConnectionEvent::SignOut)?;
    output.success("Signed out");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use tempfile::TempDir;

    #[test]
    fn test_login_logout_persists() {
        let temp_dir = TempDir::new().unwrap();
        let config = Config {
            data_dir: temp_dir.path().join("data"),
            remote_dir: Some(temp_dir.path().join("remote")),
            ..Config::default()
        };
        let output = Output::new(OutputFormat::Quiet);

        login(&config, &output).unwrap();
        assert_eq!(
            Engine::open(&config).unwrap().connection.state(),
            ConnectionState::Ready
        );

        // Second login is a no-op
        login(&config, &output).unwrap();

        logout(&config, &output).unwrap();
        assert_eq!(
            Engine::open(&config).unwrap().connection.state(),
            ConnectionState::SignedOut
        );
    }
}
