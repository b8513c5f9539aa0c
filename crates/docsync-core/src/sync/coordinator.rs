//! Sync coordinator
//!
//! Owns the pending queue and the single write gate. Documents drain one at
//! a time: connectivity check, auth check, conflict check, remote write,
//! bounded retries. Every failure ends in a status transition; nothing is
//! returned to the caller.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::conflict::{is_conflict, ConflictChoice, ConflictInfo, ConflictResolver, Resolution};
use super::queue::PendingQueue;
use super::status::{SyncEvent, SyncStatus};
use crate::config::SyncSettings;
use crate::connection::{ConnectionEvent, ConnectionState, ConnectionStateMachine, ObserverId};
use crate::document::{Document, DocumentIdentity, RemoteId};
use crate::error::{SyncError, SyncResult};
use crate::remote::{AuthGate, RemoteStore};
use crate::storage::StateStore;

/// Result of one write attempt that did not fail
enum Outcome {
    Synced(RemoteId),
    Conflict(ConflictInfo),
}

/// Why nothing can be written right now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Blocked {
    /// Connectivity is lost
    Offline,
    /// Signed out or no target selected
    NotReady(ConnectionState),
}

impl Blocked {
    fn status(self) -> SyncStatus {
        match self {
            Blocked::Offline => SyncStatus::Offline,
            Blocked::NotReady(_) => SyncStatus::Error,
        }
    }
}

impl fmt::Display for Blocked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blocked::Offline => f.write_str("no connectivity"),
            Blocked::NotReady(state) => write!(f, "connection is {}", state),
        }
    }
}

struct Inner {
    settings: SyncSettings,
    enabled: AtomicBool,
    online: AtomicBool,
    remote: Arc<dyn RemoteStore>,
    auth: Arc<dyn AuthGate>,
    state: Arc<dyn StateStore>,
    connection: Arc<ConnectionStateMachine>,
    observer: ObserverId,
    queue: Mutex<PendingQueue>,
    /// Held for the whole of every network-mutating operation
    gate: tokio::sync::Mutex<()>,
    resolver: ConflictResolver,
    status: watch::Sender<SyncStatus>,
    status_rx: watch::Receiver<SyncStatus>,
    document_status: Mutex<HashMap<DocumentIdentity, SyncStatus>>,
    /// Bumped on every status change; a stale grace timer sees a newer epoch
    status_epoch: AtomicU64,
    event_tx: mpsc::UnboundedSender<SyncEvent>,
    event_rx: Mutex<Option<mpsc::UnboundedReceiver<SyncEvent>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.connection.remove_observer(self.observer);
    }
}

/// Handle to the sync engine
///
/// Cheap to clone; all clones drive the same engine. Construct one per
/// process and pass it to whoever edits documents.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    /// Create a coordinator
    ///
    /// Registers a connection observer that resumes pending work whenever
    /// the connection becomes `Ready`.
    pub fn new(
        settings: SyncSettings,
        remote: Arc<dyn RemoteStore>,
        auth: Arc<dyn AuthGate>,
        state: Arc<dyn StateStore>,
        connection: Arc<ConnectionStateMachine>,
    ) -> Self {
        let (status_tx, status_rx) = watch::channel(SyncStatus::Idle);
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let weak = weak.clone();
            let observer = connection.on_change(move |new, old| {
                if new != ConnectionState::Ready || old == ConnectionState::Ready {
                    return;
                }
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let Ok(handle) = Handle::try_current() else {
                    debug!("Connection ready outside a runtime, not resuming");
                    return;
                };
                let coordinator = SyncCoordinator { inner };
                handle.spawn(async move {
                    coordinator.resume_pending().await;
                });
            });

            Inner {
                enabled: AtomicBool::new(settings.enabled),
                online: AtomicBool::new(true),
                queue: Mutex::new(PendingQueue::new(settings.debounce)),
                settings,
                remote,
                auth,
                state,
                connection,
                observer,
                gate: tokio::sync::Mutex::new(()),
                resolver: ConflictResolver::new(),
                status: status_tx,
                status_rx,
                document_status: Mutex::new(HashMap::new()),
                status_epoch: AtomicU64::new(0),
                event_tx,
                event_rx: Mutex::new(Some(event_rx)),
            }
        });

        Self { inner }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.inner.settings
    }

    pub fn connection(&self) -> &Arc<ConnectionStateMachine> {
        &self.inner.connection
    }

    /// Get the current status
    pub fn status(&self) -> SyncStatus {
        *self.inner.status_rx.borrow()
    }

    /// Status of one document (`Idle` if never seen)
    pub fn document_status(&self, identity: &DocumentIdentity) -> SyncStatus {
        self.lock_document_status()
            .get(identity)
            .copied()
            .unwrap_or(SyncStatus::Idle)
    }

    /// Subscribe to status changes
    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.inner.status_rx.clone()
    }

    /// Take the event receiver (can only be called once)
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<SyncEvent>> {
        self.inner
            .event_rx
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::SeqCst)
    }

    /// Turn syncing on or off; turning it off stops the settle timer
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.inner.enabled.swap(enabled, Ordering::SeqCst);
        if was != enabled {
            info!("Sync {}", if enabled { "enabled" } else { "disabled" });
        }
        if !enabled {
            self.lock_queue().cancel_timer();
        }
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Deliver a connectivity signal
    ///
    /// Coming back online re-triggers the durable pending slot and anything
    /// left in the queue.
    pub async fn set_online(&self, online: bool) {
        let was = self.inner.online.swap(online, Ordering::SeqCst);
        match (was, online) {
            (false, true) => {
                info!("Connectivity restored");
                self.resume_pending().await;
            }
            (true, false) => {
                info!("Connectivity lost");
                self.set_status(None, SyncStatus::Offline);
            }
            _ => {}
        }
    }

    /// Follow a connectivity signal until its sender is dropped
    pub fn spawn_connectivity_listener(&self, mut online: watch::Receiver<bool>) -> JoinHandle<()> {
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            loop {
                let value = *online.borrow_and_update();
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                SyncCoordinator { inner }.set_online(value).await;

                if online.changed().await.is_err() {
                    break;
                }
            }
            debug!("Connectivity listener stopped");
        })
    }

    /// Queue a snapshot of `document` for syncing
    ///
    /// No-op unless the connection is `Ready` and sync is enabled. A second
    /// call for the same identity replaces the queued snapshot and restarts
    /// the settle timer. Must be called from within a Tokio runtime.
    pub fn queue_sync(&self, document: &Document) -> bool {
        if !self.is_enabled() {
            debug!("Sync disabled, not queuing {}", document.identity);
            return false;
        }
        if !self.inner.connection.is_ready() {
            debug!(
                "Connection is {}, not queuing {}",
                self.inner.connection.state(),
                document.identity
            );
            return false;
        }
        if Handle::try_current().is_err() {
            warn!("queue_sync called outside a Tokio runtime");
            return false;
        }

        let weak = Arc::downgrade(&self.inner);
        let mut queue = self.lock_queue();
        queue.upsert(document.clone());
        queue.restart_timer(async move {
            if let Some(inner) = weak.upgrade() {
                SyncCoordinator { inner }.drain().await;
            }
        });
        debug!("Queued {} ({} pending)", document.identity, queue.len());
        true
    }

    /// Sync everything queued now, skipping the settle timer
    pub async fn flush(&self) {
        self.lock_queue().cancel_timer();
        self.drain().await;
    }

    /// Sync one document now
    ///
    /// If another write is in flight the document goes to the back of the
    /// queue and is picked up when that write finishes.
    pub async fn perform_sync(&self, document: Document) {
        let Ok(guard) = self.inner.gate.try_lock() else {
            debug!("Sync in flight, requeuing {}", document.identity);
            self.lock_queue().requeue(document);
            return;
        };
        self.run_sync(document).await;
        drop(guard);

        if self.blocked().is_none() {
            self.drain().await;
        }
    }

    /// Re-queue the durable pending slot and drain
    ///
    /// Runs on reconnect and when the connection becomes `Ready`; call it at
    /// startup to recover a snapshot left over from a previous run.
    pub async fn resume_pending(&self) {
        match self.inner.state.pending_snapshot() {
            Ok(Some(doc)) => {
                if self.is_enabled() && self.inner.connection.is_ready() {
                    info!("Resuming pending snapshot of {}", doc.identity);
                    self.lock_queue().merge_if_newer(doc);
                } else {
                    debug!("Not ready to resume pending snapshot of {}", doc.identity);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Could not read pending snapshot: {}", e),
        }
        self.drain().await;
    }

    /// Deliver a conflict decision for `identity`
    pub fn resolve_conflict(
        &self,
        identity: &DocumentIdentity,
        choice: ConflictChoice,
    ) -> SyncResult<()> {
        info!("Resolving conflict on {} with {}", identity, choice);
        self.inner.resolver.resolve(identity, choice)
    }

    /// Conflicts waiting for a decision
    pub fn pending_conflicts(&self) -> Vec<ConflictInfo> {
        self.inner.resolver.pending()
    }

    pub fn queued_len(&self) -> usize {
        self.lock_queue().len()
    }

    pub fn queued(&self) -> Vec<DocumentIdentity> {
        self.lock_queue().identities()
    }

    /// Check if a remote write is in flight
    pub fn is_syncing(&self) -> bool {
        self.inner.gate.try_lock().is_err()
    }

    /// Sync queued documents one at a time until the queue is empty
    async fn drain(&self) {
        loop {
            // Whoever holds the gate drains after it
            let Ok(guard) = self.inner.gate.try_lock() else {
                return;
            };
            // Leave the queue in order until writes can resume
            if let Some(blocked) = self.blocked() {
                let head = self.lock_queue().front().cloned();
                if let Some(doc) = head {
                    debug!("Not draining ({}), {} waits at the head", blocked, doc.identity);
                    self.mark_blocked(&doc, blocked);
                }
                return;
            }
            let next = self.lock_queue().pop_front();
            match next {
                Some(doc) => {
                    self.run_sync(doc).await;
                    drop(guard);
                    // A blocked document went back to the head of the queue
                    if self.blocked().is_some() {
                        return;
                    }
                }
                None => {
                    drop(guard);
                    // A drain that lost the race for the gate may have left work
                    if self.lock_queue().is_empty() {
                        return;
                    }
                }
            }
        }
    }

    /// Boxed drain for tasks spawned from inside the sync pipeline
    ///
    /// The explicit type keeps the pipeline's future from containing itself.
    fn drain_task(self) -> Pin<Box<dyn Future<Output = ()> + Send>> {
        Box::pin(async move { self.drain().await })
    }

    /// Sync one document; caller holds the gate
    async fn run_sync(&self, doc: Document) {
        let identity = doc.identity.clone();

        if self.inner.resolver.update_local(&doc) {
            debug!("Conflict pending for {}, folded newer edit into it", identity);
            return;
        }

        if let Some(blocked) = self.blocked() {
            self.park(doc, blocked);
            return;
        }

        self.set_status(Some(&identity), SyncStatus::Syncing);

        if let Err(e) = self.inner.auth.ensure_valid_token().await {
            self.fail_auth(&doc, e);
            return;
        }

        let retry = &self.inner.settings.retry;
        let mut attempts = 0u32;
        loop {
            // Connectivity may drop during a backoff sleep
            if let Some(blocked) = self.blocked() {
                self.park(doc, blocked);
                return;
            }

            attempts += 1;
            match self.attempt(&doc).await {
                Ok(Outcome::Synced(remote_id)) => {
                    self.finish_synced(&doc, remote_id);
                    return;
                }
                Ok(Outcome::Conflict(info)) => {
                    self.enter_conflict(doc, info).await;
                    return;
                }
                Err(e) if e.is_offline() => {
                    warn!("Remote unreachable while syncing {}: {}", identity, e);
                    self.inner.online.store(false, Ordering::SeqCst);
                    self.park(doc, Blocked::Offline);
                    return;
                }
                Err(SyncError::NotAuthenticated) => {
                    self.fail_auth(&doc, SyncError::NotAuthenticated);
                    return;
                }
                Err(e) if e.is_retryable() && retry.should_retry(attempts) => {
                    let delay = retry.delay_for_retry(attempts - 1);
                    warn!(
                        "Sync of {} failed (attempt {}/{}), retrying in {:?}: {}",
                        identity, attempts, retry.max_attempts, delay, e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retryable() => {
                    let exhausted = SyncError::Exhausted {
                        identity: identity.clone(),
                        attempts,
                        last_error: e.to_string(),
                    };
                    self.fail(&doc, exhausted);
                    return;
                }
                Err(e) => {
                    self.fail(&doc, e);
                    return;
                }
            }
        }
    }

    fn blocked(&self) -> Option<Blocked> {
        if !self.is_online() {
            return Some(Blocked::Offline);
        }
        let state = self.inner.connection.state();
        if state != ConnectionState::Ready {
            return Some(Blocked::NotReady(state));
        }
        None
    }

    /// One pass of the write pipeline
    async fn attempt(&self, doc: &Document) -> SyncResult<Outcome> {
        let remote = &self.inner.remote;

        let Some(ref remote_id) = doc.remote_id else {
            return match remote.find_by_name(&doc.identity_name).await? {
                Some(existing) => {
                    debug!("Bound {} to existing remote {}", doc.identity, existing);
                    remote.update(&existing, &doc.content).await?;
                    Ok(Outcome::Synced(existing))
                }
                None => {
                    let created = remote.create(&doc.identity_name, &doc.content).await?;
                    Ok(Outcome::Synced(created))
                }
            };
        };

        let file = match remote.get(remote_id).await {
            Ok(file) => file,
            Err(SyncError::RemoteNotFound { .. }) => {
                return self.recreate(doc).await.map(Outcome::Synced)
            }
            Err(e) => return Err(e),
        };

        let last_sync = self.inner.state.last_sync(&doc.identity)?;
        let anchor = last_sync.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        if is_conflict(
            file.modified_time,
            doc.local_saved_at,
            anchor,
            self.inner.settings.conflict_threshold,
        ) {
            return Ok(Outcome::Conflict(ConflictInfo {
                identity: doc.identity.clone(),
                identity_name: doc.identity_name.clone(),
                remote_id: remote_id.clone(),
                local_saved_at: doc.local_saved_at,
                remote_modified_time: file.modified_time,
                last_sync,
            }));
        }

        match remote.update(remote_id, &doc.content).await {
            Ok(()) => Ok(Outcome::Synced(remote_id.clone())),
            Err(SyncError::RemoteNotFound { .. }) => self.recreate(doc).await.map(Outcome::Synced),
            Err(e) => Err(e),
        }
    }

    /// The bound remote object is gone; create it anew
    async fn recreate(&self, doc: &Document) -> SyncResult<RemoteId> {
        info!("Remote copy of {} is gone, recreating", doc.identity);
        self.inner
            .remote
            .create(&doc.identity_name, &doc.content)
            .await
    }

    async fn enter_conflict(&self, doc: Document, info: ConflictInfo) {
        warn!(
            "Conflict on {}: local saved {}, remote modified {}",
            info.identity, info.local_saved_at, info.remote_modified_time
        );
        self.set_status(Some(&info.identity), SyncStatus::Conflict);
        self.emit(SyncEvent::ConflictDetected(info.clone()));

        if let Some(choice) = self.inner.settings.conflict_policy.auto_choice() {
            info!("Resolving conflict on {} with policy {}", info.identity, choice);
            let resolution = Resolution {
                choice,
                local: doc,
                remote_id: info.remote_id,
            };
            self.apply_resolution(resolution).await;
            return;
        }

        let decision = self.inner.resolver.register(info, doc);
        let weak = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            // Dropped sender: superseded or engine gone
            let Ok(resolution) = decision.await else {
                return;
            };
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let coordinator = SyncCoordinator { inner };
            {
                let _guard = coordinator.inner.gate.lock().await;
                coordinator.apply_resolution(resolution).await;
            }
            coordinator.drain_task().await;
        });
    }

    /// Carry out a conflict decision; caller holds the gate
    async fn apply_resolution(&self, resolution: Resolution) {
        let Resolution {
            choice,
            local,
            remote_id,
        } = resolution;

        self.set_status(Some(&local.identity), SyncStatus::Syncing);
        let result = match choice {
            ConflictChoice::Local => self.push_local(&local, &remote_id).await,
            ConflictChoice::Remote => self.pull_remote(&local, &remote_id).await,
            ConflictChoice::Both => self.fork_and_pull(&local, &remote_id).await,
        };

        if let Err(e) = result {
            warn!("Resolving conflict on {} failed: {}", local.identity, e);
            self.fail(&local, e);
        }
    }

    async fn push_local(&self, local: &Document, remote_id: &RemoteId) -> SyncResult<()> {
        let bound = match self.inner.remote.update(remote_id, &local.content).await {
            Ok(()) => remote_id.clone(),
            Err(SyncError::RemoteNotFound { .. }) => self.recreate(local).await?,
            Err(e) => return Err(e),
        };
        self.finish_synced(local, bound);
        Ok(())
    }

    async fn pull_remote(&self, local: &Document, remote_id: &RemoteId) -> SyncResult<()> {
        let file = self.inner.remote.get(remote_id).await?;

        if let Err(e) = self.inner.state.set_last_sync(&local.identity, Utc::now()) {
            warn!("Failed to record last sync for {}: {}", local.identity, e);
        }
        // The local snapshot is discarded along with any durable copy of it
        self.clear_slot_if_matches(local);

        self.emit(SyncEvent::RemotePulled {
            identity: local.identity.clone(),
            remote_id: file.id,
            content: file.content,
            modified_time: file.modified_time,
        });
        self.set_status(Some(&local.identity), SyncStatus::Synced);
        self.schedule_settle(local.identity.clone());
        Ok(())
    }

    async fn fork_and_pull(&self, local: &Document, remote_id: &RemoteId) -> SyncResult<()> {
        let fork = local.fork();
        info!(
            "Forked {} into {} ('{}')",
            local.identity, fork.identity, fork.identity_name
        );

        // Queue the fork first so the local edits survive a failed pull
        self.lock_queue().upsert(fork.clone());
        self.emit(SyncEvent::Forked {
            original: local.identity.clone(),
            fork,
        });

        self.pull_remote(local, remote_id).await
    }

    fn finish_synced(&self, doc: &Document, remote_id: RemoteId) {
        info!("Synced {} to {}", doc.identity, remote_id);

        if let Err(e) = self.inner.state.set_last_sync(&doc.identity, Utc::now()) {
            warn!("Failed to record last sync for {}: {}", doc.identity, e);
        }
        self.clear_slot_if_matches(doc);

        self.emit(SyncEvent::Synced {
            identity: doc.identity.clone(),
            remote_id,
        });
        self.set_status(Some(&doc.identity), SyncStatus::Synced);
        self.schedule_settle(doc.identity.clone());
    }

    /// Revert `Synced` to a resting status after the grace window
    fn schedule_settle(&self, identity: DocumentIdentity) {
        let epoch = self.inner.status_epoch.load(Ordering::SeqCst);
        let grace = self.inner.settings.synced_grace;
        let weak = Arc::downgrade(&self.inner);

        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            if let Some(inner) = weak.upgrade() {
                SyncCoordinator { inner }.settle(&identity, epoch);
            }
        });
    }

    fn settle(&self, identity: &DocumentIdentity, epoch: u64) {
        let document_settled = {
            let mut statuses = self.lock_document_status();
            match statuses.get(identity) {
                Some(SyncStatus::Synced) => {
                    statuses.insert(identity.clone(), SyncStatus::Idle);
                    true
                }
                _ => false,
            }
        };
        if document_settled {
            self.emit(SyncEvent::StatusChanged {
                identity: Some(identity.clone()),
                status: SyncStatus::Idle,
            });
        }

        if self.inner.status_epoch.load(Ordering::SeqCst) == epoch {
            let resting = if self.inner.resolver.has_pending() {
                SyncStatus::Conflict
            } else {
                SyncStatus::Idle
            };
            self.set_status(None, resting);
        }
    }

    /// Park a snapshot that cannot be synced right now
    ///
    /// It goes back to the head of the queue so reconnecting (or the
    /// connection becoming `Ready`) drains it first.
    fn park(&self, doc: Document, blocked: Blocked) {
        info!("Cannot sync {} ({}), keeping it pending", doc.identity, blocked);
        self.mark_blocked(&doc, blocked);
        self.lock_queue().restore_front(doc);
    }

    /// Durable slot first, then the status: `Offline` only for lost
    /// connectivity, `Error` when the connection is not `Ready`
    fn mark_blocked(&self, doc: &Document, blocked: Blocked) {
        self.persist_slot(doc);
        self.set_status(Some(&doc.identity), blocked.status());
        if let Blocked::NotReady(_) = blocked {
            self.emit(SyncEvent::Error {
                identity: Some(doc.identity.clone()),
                message: format!("Cannot sync: {}", blocked),
            });
        }
    }

    fn fail_auth(&self, doc: &Document, error: SyncError) {
        self.fail(doc, error);
        if let Err(e) = self
            .inner
            .connection
            .dispatch(ConnectionEvent::TokenRevoked)
        {
            debug!("Connection did not accept token revocation: {}", e);
        }
    }

    fn fail(&self, doc: &Document, error: SyncError) {
        warn!("Sync of {} failed: {}", doc.identity, error);
        self.persist_slot(doc);
        self.set_status(Some(&doc.identity), SyncStatus::Error);
        self.emit(SyncEvent::Error {
            identity: Some(doc.identity.clone()),
            message: error.to_string(),
        });
    }

    /// Write the durable slot unless it already holds a newer snapshot of the same document
    fn persist_slot(&self, doc: &Document) {
        let keep_existing = match self.inner.state.pending_snapshot() {
            Ok(Some(slot)) => {
                slot.identity == doc.identity && slot.local_saved_at > doc.local_saved_at
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Could not read pending snapshot, overwriting: {}", e);
                false
            }
        };
        if keep_existing {
            return;
        }
        if let Err(e) = self.inner.state.set_pending_snapshot(doc) {
            warn!("Failed to persist pending snapshot of {}: {}", doc.identity, e);
        }
    }

    fn clear_slot_if_matches(&self, doc: &Document) {
        match self.inner.state.pending_snapshot() {
            Ok(Some(slot))
                if slot.identity == doc.identity && slot.local_saved_at <= doc.local_saved_at =>
            {
                if let Err(e) = self.inner.state.clear_pending_snapshot() {
                    warn!("Failed to clear pending snapshot: {}", e);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Could not read pending snapshot: {}", e),
        }
    }

    fn set_status(&self, identity: Option<&DocumentIdentity>, status: SyncStatus) {
        if let Some(identity) = identity {
            self.lock_document_status().insert(identity.clone(), status);
        }
        self.inner.status_epoch.fetch_add(1, Ordering::SeqCst);
        self.inner.status.send_replace(status);
        self.emit(SyncEvent::StatusChanged {
            identity: identity.cloned(),
            status,
        });
    }

    fn emit(&self, event: SyncEvent) {
        let _ = self.inner.event_tx.send(event);
    }

    fn lock_queue(&self) -> MutexGuard<'_, PendingQueue> {
        self.inner.queue.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_document_status(&self) -> MutexGuard<'_, HashMap<DocumentIdentity, SyncStatus>> {
        self.inner
            .document_status
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("status", &self.status())
            .field("queued", &self.queued_len())
            .field("online", &self.is_online())
            .finish_non_exhaustive()
    }
}
