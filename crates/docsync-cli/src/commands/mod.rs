//! Command handlers

pub mod auth;
pub mod config;
pub mod status;
pub mod sync;
pub mod target;

use std::sync::Arc;

use anyhow::{bail, Context, Result};

use docsync_core::{
    Config, ConnectionEvent, ConnectionState, ConnectionStateMachine, DirectoryRemote,
    SessionAuthGate, SqliteStateStore, SyncCoordinator, SyncSettings,
};

use crate::documents::DocumentIndex;

/// Everything a command needs to talk to the sync engine
pub struct Engine {
    pub config: Config,
    pub state: Arc<SqliteStateStore>,
    pub connection: Arc<ConnectionStateMachine>,
    pub index: DocumentIndex,
}

impl Engine {
    /// Open the state database and restore the connection
    ///
    /// The connection is reconciled with the configured target, so editing
    /// the config file by hand cannot leave it `Ready` without a target.
    pub fn open(config: &Config) -> Result<Self> {
        let db_path = config.state_db_path();
        let state = Arc::new(
            SqliteStateStore::open(&db_path)
                .with_context(|| format!("Failed to open state database: {:?}", db_path))?,
        );
        let connection = Arc::new(ConnectionStateMachine::with_store(state.clone()));
        reconcile_target(&connection, config.remote_dir.is_some())?;

        Ok(Self {
            config: config.clone(),
            index: DocumentIndex::new(state.clone()),
            state,
            connection,
        })
    }

    /// Build a coordinator against the configured target directory
    pub fn coordinator(&self, settings: SyncSettings) -> SyncCoordinator {
        let target = self.config.remote_dir.clone().unwrap_or_default();
        SyncCoordinator::new(
            settings,
            Arc::new(DirectoryRemote::new(target)),
            Arc::new(SessionAuthGate::new(self.connection.clone())),
            self.state.clone(),
            self.connection.clone(),
        )
    }

    /// Fail with setup instructions unless sync can run
    pub fn require_ready(&self) -> Result<()> {
        if !self.config.sync_enabled {
            bail!(
                "Sync is not enabled. Enable it with:\n  \
                 docsync config set sync_enabled true"
            );
        }
        match self.connection.state() {
            ConnectionState::Ready => Ok(()),
            ConnectionState::AuthenticatedNoTarget => bail!(
                "No target selected. Choose one with:\n  \
                 docsync target set <dir>"
            ),
            state => bail!(
                "Not signed in (connection is {}). Sign in with:\n  \
                 docsync auth login",
                state
            ),
        }
    }
}

fn reconcile_target(connection: &ConnectionStateMachine, has_target: bool) -> Result<()> {
    match (connection.state(), has_target) {
        (ConnectionState::AuthenticatedNoTarget, true) => {
            connection.dispatch(ConnectionEvent::TargetSelected)?;
        }
        (ConnectionState::Ready, false) => {
            connection.dispatch(ConnectionEvent::TargetRemoved)?;
        }
        _ => {}
    }
    Ok(())
}
