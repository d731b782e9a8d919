//! Store change notifications
//!
//! Every committed mutation of the local store is published as a
//! [`StoreEvent`]. Readers subscribe per collection and re-query when
//! notified instead of polling.

use std::fmt;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Default number of buffered events per subscriber
const DEFAULT_CAPACITY: usize = 256;

/// The four persisted collections
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Chapter records
    Chapters,
    /// Verse records
    Verses,
    /// Commentary entries
    Commentary,
    /// User bookmarks
    Bookmarks,
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Chapters => write!(f, "chapters"),
            Collection::Verses => write!(f, "verses"),
            Collection::Commentary => write!(f, "commentary"),
            Collection::Bookmarks => write!(f, "bookmarks"),
        }
    }
}

/// What happened to a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    /// Rows were inserted
    Inserted {
        /// Number of rows inserted
        count: usize,
    },
    /// A row was inserted or replaced by key
    Upserted,
    /// Rows were deleted
    Deleted {
        /// Number of rows deleted
        count: u64,
    },
    /// The subscriber fell behind and missed events; re-read everything
    Lagged,
}

/// A committed mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEvent {
    /// Collection that changed
    pub collection: Collection,
    /// Kind of change
    pub change: ChangeKind,
    /// Chapter the change was scoped to, when there is one
    pub chapter: Option<u32>,
}

impl StoreEvent {
    /// Create a new event
    pub fn new(collection: Collection, change: ChangeKind, chapter: Option<u32>) -> Self {
        Self { collection, change, chapter }
    }
}

/// Broadcast hub for store events
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<StoreEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl ChangeFeed {
    /// Create a feed buffering up to `capacity` events per subscriber
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event to every subscriber
    pub fn publish(&self, event: StoreEvent) {
        tracing::trace!(collection = %event.collection, change = ?event.change, "store changed");
        // No subscribers is not an error
        let _ = self.tx.send(event);
    }

    /// Subscribe to events for one collection
    pub fn subscribe(&self, collection: Collection) -> CollectionSubscription {
        CollectionSubscription { collection, rx: self.tx.subscribe() }
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiver filtered to a single collection
pub struct CollectionSubscription {
    collection: Collection,
    rx: broadcast::Receiver<StoreEvent>,
}

impl CollectionSubscription {
    /// The collection this subscription observes
    pub fn collection(&self) -> Collection {
        self.collection
    }

    /// Wait for the next event on this collection
    ///
    /// Returns `None` once the store has been dropped.
    pub async fn recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if event.collection == self.collection => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!("{} subscriber lagged by {} events", self.collection, skipped);
                    return Some(self.lagged());
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next pending event on this collection without waiting
    pub fn try_recv(&mut self) -> Option<StoreEvent> {
        loop {
            match self.rx.try_recv() {
                Ok(event) if event.collection == self.collection => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(_)) => return Some(self.lagged()),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    fn lagged(&self) -> StoreEvent {
        StoreEvent::new(self.collection, ChangeKind::Lagged, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscription_filters_collection() {
        let feed = ChangeFeed::default();
        let mut verses = feed.subscribe(Collection::Verses);

        feed.publish(StoreEvent::new(Collection::Chapters, ChangeKind::Upserted, Some(1)));
        feed.publish(StoreEvent::new(
            Collection::Verses,
            ChangeKind::Inserted { count: 7 },
            Some(1),
        ));

        let event = verses.recv().await.unwrap();
        assert_eq!(event.collection, Collection::Verses);
        assert_eq!(event.change, ChangeKind::Inserted { count: 7 });
        assert!(verses.try_recv().is_none());
    }

    #[test]
    fn test_publish_without_subscribers() {
        let feed = ChangeFeed::default();
        assert_eq!(feed.subscriber_count(), 0);
        feed.publish(StoreEvent::new(Collection::Bookmarks, ChangeKind::Deleted { count: 1 }, None));
    }

    #[test]
    fn test_lagged_subscriber_gets_resync() {
        let feed = ChangeFeed::new(2);
        let mut chapters = feed.subscribe(Collection::Chapters);

        for _ in 0..5 {
            feed.publish(StoreEvent::new(Collection::Chapters, ChangeKind::Upserted, None));
        }

        assert_eq!(chapters.try_recv().unwrap().change, ChangeKind::Lagged);
    }

    #[tokio::test]
    async fn test_closed_feed_ends_subscription() {
        let feed = ChangeFeed::default();
        let mut bookmarks = feed.subscribe(Collection::Bookmarks);
        drop(feed);
        assert!(bookmarks.recv().await.is_none());
    }
}
