//! Auth gate backed by the connection state machine
//!
//! For targets that need no token exchange (such as a local directory), the
//! session is valid exactly when the state machine says the user is signed
//! in.

use std::sync::Arc;

use async_trait::async_trait;

use super::AuthGate;
use crate::connection::ConnectionStateMachine;
use crate::error::{SyncError, SyncResult};

#[derive(Debug, Clone)]
pub struct SessionAuthGate {
    connection: Arc<ConnectionStateMachine>,
}

impl SessionAuthGate {
    pub fn new(connection: Arc<ConnectionStateMachine>) -> Self {
        Self { connection }
    }
}

#[async_trait]
impl AuthGate for SessionAuthGate {
    fn is_signed_in(&self) -> bool {
        self.connection.state().is_signed_in()
    }

    async fn ensure_valid_token(&self) -> SyncResult<()> {
        if self.is_signed_in() {
            Ok(())
        } else {
            Err(SyncError::NotAuthenticated)
        }
    }
}
