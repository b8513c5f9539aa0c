//! Connection state machine
//!
//! Single source of truth for "is syncing possible right now". Tracks
//! whether the user is authenticated and whether a remote target container
//! has been selected.
//!
//! ```text
//! SignedOut --StartAuth--> AuthPending --AuthSucceeded{target}--> Ready
//!                              |      \--AuthSucceeded{none}--> AuthenticatedNoTarget
//!                              \--AuthFailed--> SignedOut
//! AuthenticatedNoTarget <--TargetRemoved-- Ready
//! AuthenticatedNoTarget --TargetSelected--> Ready
//! any --SignOut/TokenRevoked--> SignedOut
//! ```

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{SyncError, SyncResult};
use crate::storage::StateStore;

/// Authentication and target readiness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No credentials
    SignedOut,
    /// Auth handshake in progress
    AuthPending,
    /// Signed in, but no target container chosen
    AuthenticatedNoTarget,
    /// Signed in with a target; syncing may run
    Ready,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::SignedOut => "signed_out",
            ConnectionState::AuthPending => "auth_pending",
            ConnectionState::AuthenticatedNoTarget => "authenticated_no_target",
            ConnectionState::Ready => "ready",
        }
    }

    /// Whether the user holds credentials in this state
    pub fn is_signed_in(&self) -> bool {
        matches!(
            self,
            ConnectionState::AuthenticatedNoTarget | ConnectionState::Ready
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConnectionState {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "signed_out" => Ok(ConnectionState::SignedOut),
            "auth_pending" => Ok(ConnectionState::AuthPending),
            "authenticated_no_target" => Ok(ConnectionState::AuthenticatedNoTarget),
            "ready" => Ok(ConnectionState::Ready),
            other => Err(SyncError::Codec(format!(
                "unknown connection state '{}'",
                other
            ))),
        }
    }
}

/// Events that drive the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    StartAuth,
    AuthSucceeded { has_target: bool },
    AuthFailed,
    TargetSelected,
    TargetRemoved,
    SignOut,
    TokenRevoked,
}

impl ConnectionEvent {
    /// Next state for this event, or `None` if the transition is not allowed
    fn apply(self, from: ConnectionState) -> Option<ConnectionState> {
        use ConnectionEvent as E;
        use ConnectionState as S;

        match (from, self) {
            (_, E::SignOut | E::TokenRevoked) => Some(S::SignedOut),
            (S::SignedOut, E::StartAuth) => Some(S::AuthPending),
            (S::AuthPending, E::AuthSucceeded { has_target: false }) => {
                Some(S::AuthenticatedNoTarget)
            }
            (S::AuthPending, E::AuthSucceeded { has_target: true }) => Some(S::Ready),
            (S::AuthPending, E::AuthFailed) => Some(S::SignedOut),
            (S::AuthenticatedNoTarget, E::TargetSelected) => Some(S::Ready),
            (S::Ready, E::TargetRemoved) => Some(S::AuthenticatedNoTarget),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionEvent::StartAuth => f.write_str("start_auth"),
            ConnectionEvent::AuthSucceeded { has_target } => {
                write!(f, "auth_succeeded(has_target={})", has_target)
            }
            ConnectionEvent::AuthFailed => f.write_str("auth_failed"),
            ConnectionEvent::TargetSelected => f.write_str("target_selected"),
            ConnectionEvent::TargetRemoved => f.write_str("target_removed"),
            ConnectionEvent::SignOut => f.write_str("sign_out"),
            ConnectionEvent::TokenRevoked => f.write_str("token_revoked"),
        }
    }
}

/// Handle returned by [`ConnectionStateMachine::on_change`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverId(u64);

type Observer = Arc<dyn Fn(ConnectionState, ConnectionState) + Send + Sync>;

/// Connection state machine with synchronous observers
pub struct ConnectionStateMachine {
    state: Mutex<ConnectionState>,
    // Held across change, persist and notify so transitions stay ordered
    transition: Mutex<()>,
    observers: Mutex<Vec<(ObserverId, Observer)>>,
    next_observer: Mutex<u64>,
    store: Option<Arc<dyn StateStore>>,
}

impl ConnectionStateMachine {
    /// Create an in-memory machine starting signed out
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ConnectionState::SignedOut),
            transition: Mutex::new(()),
            observers: Mutex::new(Vec::new()),
            next_observer: Mutex::new(0),
            store: None,
        }
    }

    /// Create a machine that restores from and writes through to a store
    pub fn with_store(store: Arc<dyn StateStore>) -> Self {
        let restored = match store.connection_state() {
            Ok(Some(state)) => state,
            Ok(None) => ConnectionState::SignedOut,
            Err(e) => {
                warn!("Could not restore connection state, starting signed out: {}", e);
                ConnectionState::SignedOut
            }
        };
        debug!("Restored connection state: {}", restored);

        Self {
            state: Mutex::new(restored),
            transition: Mutex::new(()),
            observers: Mutex::new(Vec::new()),
            next_observer: Mutex::new(0),
            store: Some(store),
        }
    }

    /// Current state
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Ready
    }

    /// Set the state from externally known ground truth
    ///
    /// Skips the transition table; meant for process start.
    pub fn initialize(&self, is_signed_in: bool, has_target: bool) {
        let new = match (is_signed_in, has_target) {
            (false, _) => ConnectionState::SignedOut,
            (true, false) => ConnectionState::AuthenticatedNoTarget,
            (true, true) => ConnectionState::Ready,
        };

        let _transition = self.lock_transition();
        let old = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::replace(&mut *state, new)
        };

        debug!("Connection state initialized: {} -> {}", old, new);
        self.persist(new);
        if old != new {
            self.notify(new, old);
        }
    }

    /// Apply an event
    ///
    /// Rejected events leave the state unchanged and notify nobody.
    /// Concurrent dispatches are persisted and observed in the order they
    /// were applied. Observers may read `state()` but must not dispatch.
    pub fn dispatch(&self, event: ConnectionEvent) -> SyncResult<ConnectionState> {
        let _transition = self.lock_transition();
        let (old, new) = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            let old = *state;
            let Some(new) = event.apply(old) else {
                warn!("Rejected connection event {} in state {}", event, old);
                return Err(SyncError::InvalidStateTransition {
                    from: old,
                    event: event.to_string(),
                });
            };
            *state = new;
            (old, new)
        };

        debug!("Connection state: {} --{}--> {}", old, event, new);
        self.persist(new);
        self.notify(new, old);
        Ok(new)
    }

    /// Register an observer called with `(new, old)` on every accepted transition
    pub fn on_change<F>(&self, observer: F) -> ObserverId
    where
        F: Fn(ConnectionState, ConnectionState) + Send + Sync + 'static,
    {
        let id = {
            let mut next = self.next_observer.lock().unwrap_or_else(|e| e.into_inner());
            *next += 1;
            ObserverId(*next)
        };
        self.observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, Arc::new(observer)));
        id
    }

    /// Remove an observer; returns false if it was not registered
    pub fn remove_observer(&self, id: ObserverId) -> bool {
        let mut observers = self.observers.lock().unwrap_or_else(|e| e.into_inner());
        let before = observers.len();
        observers.retain(|(oid, _)| *oid != id);
        observers.len() != before
    }

    fn lock_transition(&self) -> std::sync::MutexGuard<'_, ()> {
        self.transition.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, state: ConnectionState) {
        if let Some(ref store) = self.store {
            if let Err(e) = store.set_connection_state(state) {
                warn!("Failed to persist connection state {}: {}", state, e);
            }
        }
    }

    fn notify(&self, new: ConnectionState, old: ConnectionState) {
        // Snapshot so observers may call back into the machine
        let observers: Vec<Observer> = self
            .observers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();

        for observer in observers {
            if catch_unwind(AssertUnwindSafe(|| observer(new, old))).is_err() {
                error!("Connection observer panicked on {} -> {}", old, new);
            }
        }
    }
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ConnectionStateMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionStateMachine")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
