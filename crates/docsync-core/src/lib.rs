//! docsync core library
//!
//! This crate provides the synchronization engine for docsync, which
//! mirrors locally edited documents to a remote document store.
//!
//! # Architecture
//!
//! - **Connection state machine**: gates syncing on sign-in and a selected
//!   target container
//! - **Sync coordinator**: debounced queue, single write gate, conflict
//!   detection, bounded retries
//! - **State store**: durable key-value state that survives restarts
//!
//! The editing layer owns documents; the engine only ever sees cloned
//! snapshots and reports back through status and events.
//!
//! # Quick Start
//!
//! ```text
//! let state = Arc::new(SqliteStateStore::open(&config.state_db_path())?);
//! let connection = Arc::new(ConnectionStateMachine::with_store(state.clone()));
//! let coordinator = SyncCoordinator::new(
//!     config.sync_settings(),
//!     Arc::new(DirectoryRemote::new(target)),
//!     Arc::new(SessionAuthGate::new(connection.clone())),
//!     state,
//!     connection,
//! );
//!
//! coordinator.queue_sync(&doc);
//! ```
//!
//! # Modules
//!
//! - `sync`: The coordinator, queue and conflict handling (main entry point)
//! - `connection`: Connection state machine
//! - `document`: Document snapshots and identities
//! - `remote`: Remote store and auth capabilities
//! - `storage`: Persisted engine state
//! - `config`: Application configuration

pub mod config;
pub mod connection;
pub mod document;
pub mod error;
pub mod remote;
pub mod storage;
pub mod sync;

pub use config::{Config, ConflictPolicy, RetryPolicy, SyncSettings};
pub use connection::{ConnectionEvent, ConnectionState, ConnectionStateMachine, ObserverId};
pub use document::{Document, DocumentIdentity, RemoteFile, RemoteId};
pub use error::{SyncError, SyncResult};
pub use remote::{AuthGate, DirectoryRemote, RemoteStore, SessionAuthGate};
pub use storage::{MemoryStateStore, SqliteStateStore, StateStore};
pub use sync::{ConflictChoice, ConflictInfo, SyncCoordinator, SyncEvent, SyncStatus};
