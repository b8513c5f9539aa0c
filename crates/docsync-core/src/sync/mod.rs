//! Synchronization engine
//!
//! Mirrors locally edited documents to a remote store.
//!
//! ## Pipeline
//!
//! 1. `queue_sync` clones the document into the pending queue
//! 2. The settle timer fires after a quiet period
//! 3. Queued documents drain one at a time through the write gate
//! 4. Each document is checked for divergence, then written remotely
//! 5. Failures are retried with backoff, parked in the durable slot, or
//!    handed to the conflict resolver
//!
//! ## Usage
//!
//! ```ignore
//! let coordinator = SyncCoordinator::new(settings, remote, auth, state, connection);
//! let mut events = coordinator.take_events().unwrap();
//! coordinator.queue_sync(&doc);
//! ```

mod conflict;
mod coordinator;
mod queue;
mod status;

pub use conflict::{is_conflict, ConflictChoice, ConflictInfo, ConflictResolver, Resolution};
pub use coordinator::SyncCoordinator;
pub use queue::{DebounceTimer, PendingQueue};
pub use status::{SyncEvent, SyncStatus};
