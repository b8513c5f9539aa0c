//! Remote collaborators
//!
//! The engine talks to the outside world through two capabilities:
//!
//! - [`RemoteStore`]: get/create/update/find documents in the target container
//! - [`AuthGate`]: whether the user is signed in and holds a valid token
//!
//! Wire formats and auth flows live behind these traits.

pub mod directory;
pub mod session;

use async_trait::async_trait;

use crate::document::{RemoteFile, RemoteId};
use crate::error::SyncResult;

pub use directory::DirectoryRemote;
pub use session::SessionAuthGate;

/// Remote document store
///
/// Implementations classify failures: `RemoteNotFound` for missing objects,
/// `NetworkUnavailable` when the service cannot be reached at all,
/// `Transient` for anything worth retrying, `NotAuthenticated` for
/// rejected credentials.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch content and metadata
    async fn get(&self, id: &RemoteId) -> SyncResult<RemoteFile>;

    /// Create a new object and return its id
    async fn create(&self, name: &str, content: &[u8]) -> SyncResult<RemoteId>;

    /// Overwrite an existing object
    async fn update(&self, id: &RemoteId, content: &[u8]) -> SyncResult<()>;

    /// Look up an object by name
    async fn find_by_name(&self, name: &str) -> SyncResult<Option<RemoteId>>;
}

/// Authentication capability
#[async_trait]
pub trait AuthGate: Send + Sync {
    fn is_signed_in(&self) -> bool;

    /// Refresh or validate the access token
    ///
    /// Fails with `NotAuthenticated` when no valid token can be obtained.
    async fn ensure_valid_token(&self) -> SyncResult<()>;
}
