//! Pending queue and debounce timer
//!
//! The queue holds at most one snapshot per document identity. Queuing a
//! document that is already present replaces its snapshot in place, so a
//! burst of edits collapses into a single remote write of the latest
//! content.

use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::document::{Document, DocumentIdentity};

/// Ordered map from identity to the latest unsynced snapshot
#[derive(Debug)]
pub struct PendingQueue {
    order: VecDeque<DocumentIdentity>,
    entries: HashMap<DocumentIdentity, Document>,
    timer: DebounceTimer,
}

impl PendingQueue {
    pub fn new(debounce: Duration) -> Self {
        Self {
            order: VecDeque::new(),
            entries: HashMap::new(),
            timer: DebounceTimer::new(debounce),
        }
    }

    /// Insert or replace a snapshot, keeping its drain position
    ///
    /// Returns true if the identity was not queued before.
    pub fn upsert(&mut self, doc: Document) -> bool {
        let identity = doc.identity.clone();
        let is_new = self.entries.insert(identity.clone(), doc).is_none();
        if is_new {
            self.order.push_back(identity);
        }
        is_new
    }

    /// Merge a snapshot and move its identity to the back of the drain order
    ///
    /// A newer snapshot already queued for the same identity is kept.
    pub fn requeue(&mut self, doc: Document) {
        self.order.retain(|id| *id != doc.identity);
        self.order.push_back(doc.identity.clone());
        match self.entries.get(&doc.identity) {
            Some(existing) if existing.local_saved_at > doc.local_saved_at => {}
            _ => {
                self.entries.insert(doc.identity.clone(), doc);
            }
        }
    }

    /// Put a snapshot that could not be synced back at the head
    ///
    /// A newer snapshot queued meanwhile for the same identity is kept.
    pub fn restore_front(&mut self, doc: Document) {
        self.order.retain(|id| *id != doc.identity);
        self.order.push_front(doc.identity.clone());
        match self.entries.get(&doc.identity) {
            Some(existing) if existing.local_saved_at >= doc.local_saved_at => {}
            _ => {
                self.entries.insert(doc.identity.clone(), doc);
            }
        }
    }

    /// Next document to sync, without taking it
    pub fn front(&self) -> Option<&Document> {
        self.order.iter().find_map(|id| self.entries.get(id))
    }

    /// Queue a snapshot unless a newer one for the same identity is present
    pub fn merge_if_newer(&mut self, doc: Document) -> bool {
        match self.entries.get(&doc.identity) {
            Some(existing) if existing.local_saved_at >= doc.local_saved_at => false,
            _ => {
                self.upsert(doc);
                true
            }
        }
    }

    /// Take the next document to sync
    pub fn pop_front(&mut self) -> Option<Document> {
        while let Some(identity) = self.order.pop_front() {
            if let Some(doc) = self.entries.remove(&identity) {
                return Some(doc);
            }
        }
        None
    }

    /// Drop a queued document; it will not be synced
    pub fn remove(&mut self, identity: &DocumentIdentity) -> Option<Document> {
        self.order.retain(|id| id != identity);
        self.entries.remove(identity)
    }

    pub fn get(&self, identity: &DocumentIdentity) -> Option<&Document> {
        self.entries.get(identity)
    }

    pub fn contains(&self, identity: &DocumentIdentity) -> bool {
        self.entries.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Identities in drain order
    pub fn identities(&self) -> Vec<DocumentIdentity> {
        self.order.iter().cloned().collect()
    }

    /// Restart the settle timer; `fire` runs after a full quiet period
    pub fn restart_timer<F>(&mut self, fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.timer.reset(fire);
    }

    /// Stop the settle timer without firing
    pub fn cancel_timer(&mut self) -> bool {
        self.timer.cancel()
    }

    pub fn timer_pending(&self) -> bool {
        self.timer.is_pending()
    }
}

/// Trailing-edge timer that can be reset or stopped
///
/// Each reset aborts the previously scheduled fire. Only the sleep is
/// cancellable: once the delay elapses, `fire` runs on its own task and is
/// no longer affected by later resets.
#[derive(Debug)]
pub struct DebounceTimer {
    delay: Duration,
    handle: Option<JoinHandle<()>>,
}

impl DebounceTimer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            handle: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule `fire` after the delay, cancelling any earlier schedule
    ///
    /// Must be called from within a Tokio runtime.
    pub fn reset<F>(&mut self, fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(fire);
        }));
    }

    /// Cancel a pending fire; returns true if one was pending
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) if !handle.is_finished() => {
                handle.abort();
                true
            }
            _ => false,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for DebounceTimer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn doc(identity: &str, content: &str) -> Document {
        Document::with_identity(identity, format!("{}.md", identity), content)
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut queue = PendingQueue::new(Duration::from_secs(3));

        assert!(queue.upsert(doc("a", "a1")));
        assert!(queue.upsert(doc("b", "b1")));
        assert!(!queue.upsert(doc("a", "a2")));

        assert_eq!(queue.len(), 2);
        let first = queue.pop_front().unwrap();
        assert_eq!(first.identity.as_str(), "a");
        assert_eq!(first.content, b"a2");
        assert_eq!(queue.pop_front().unwrap().identity.as_str(), "b");
        assert!(queue.pop_front().is_none());
    }

    #[test]
    fn test_requeue_moves_to_back() {
        let mut queue = PendingQueue::new(Duration::from_secs(3));
        queue.upsert(doc("a", "a1"));
        queue.upsert(doc("b", "b1"));

        queue.requeue(doc("a", "a2"));

        assert_eq!(
            queue.identities(),
            vec![DocumentIdentity::from("b"), DocumentIdentity::from("a")]
        );
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_requeue_keeps_newer_snapshot() {
        let mut queue = PendingQueue::new(Duration::from_secs(3));
        let mut stale = doc("a", "old");
        stale.local_saved_at = stale.local_saved_at - chrono::Duration::seconds(10);

        queue.upsert(doc("a", "new"));
        queue.requeue(stale);

        assert_eq!(queue.get(&DocumentIdentity::from("a")).unwrap().content, b"new");
    }

    #[test]
    fn test_restore_front_keeps_drain_order() {
        let mut queue = PendingQueue::new(Duration::from_secs(3));
        queue.upsert(doc("a", "a1"));
        queue.upsert(doc("b", "b1"));

        let head = queue.pop_front().unwrap();
        queue.upsert(doc("c", "c1"));
        queue.restore_front(head);

        assert_eq!(queue.front().unwrap().identity.as_str(), "a");
        assert_eq!(
            queue.identities(),
            vec![
                DocumentIdentity::from("a"),
                DocumentIdentity::from("b"),
                DocumentIdentity::from("c"),
            ]
        );
    }

    #[test]
    fn test_restore_front_keeps_newer_snapshot() {
        let mut queue = PendingQueue::new(Duration::from_secs(3));
        let mut stale = doc("a", "old");
        stale.local_saved_at = stale.local_saved_at - chrono::Duration::seconds(10);

        queue.upsert(doc("b", "b1"));
        queue.upsert(doc("a", "new"));
        queue.restore_front(stale);

        assert_eq!(queue.front().unwrap().content, b"new");
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_merge_if_newer_keeps_latest() {
        let mut queue = PendingQueue::new(Duration::from_secs(3));
        let older = doc("a", "old");
        let newer = {
            let mut d = older.clone();
            d.set_content("new");
            d
        };

        queue.upsert(newer);
        assert!(!queue.merge_if_newer(older));
        assert_eq!(queue.get(&DocumentIdentity::from("a")).unwrap().content, b"new");
    }

    #[test]
    fn test_removed_document_is_never_popped() {
        let mut queue = PendingQueue::new(Duration::from_secs(3));
        queue.upsert(doc("a", "a1"));
        queue.upsert(doc("b", "b1"));

        assert!(queue.remove(&DocumentIdentity::from("a")).is_some());
        assert!(!queue.contains(&DocumentIdentity::from("a")));
        assert_eq!(queue.pop_front().unwrap().identity.as_str(), "b");
        assert!(queue.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_fires_once_after_quiet_period() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new(Duration::from_millis(3000));

        for _ in 0..3 {
            let counter = Arc::clone(&fired);
            timer.reset(async move {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            tokio::time::sleep(Duration::from_millis(1000)).await;
        }
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(2100)).await;
        tokio::task::yield_now().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!timer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_timer_never_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut timer = DebounceTimer::new(Duration::from_millis(100));

        let counter = Arc::clone(&fired);
        timer.reset(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(timer.is_pending());
        assert!(timer.cancel());

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
