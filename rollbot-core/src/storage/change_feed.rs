use crate::error::{Result, RollError};
use crate::storage::{RollStore, Storage};
use crate::types::{ChangeEvent, ChangeOperation};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const FETCH_BATCH: u32 = 64;

/// Subscription source for document changes of the roll collection.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    /// Open a stream starting at the current end of the feed, delivering
    /// only the given operations.
    async fn watch(&self, operations: &[ChangeOperation]) -> Result<Box<dyn ChangeStream>>;
}

#[async_trait]
pub trait ChangeStream: Send {
    /// Next change, or `None` once `max_await` elapsed without one.
    async fn next(&mut self, max_await: Duration) -> Result<Option<ChangeEvent>>;

    async fn close(&mut self);
}

/// Change feed over the trigger-fed `roll_changes` table.
pub struct SqliteChangeFeed {
    storage: Arc<Storage>,
    poll_interval: Duration,
}

impl SqliteChangeFeed {
    pub fn new(storage: Arc<Storage>, poll_interval: Duration) -> Self {
        Self {
            storage,
            poll_interval,
        }
    }
}

#[async_trait]
impl ChangeFeed for SqliteChangeFeed {
    async fn watch(&self, operations: &[ChangeOperation]) -> Result<Box<dyn ChangeStream>> {
        let cursor = RollStore::new(&self.storage).latest_change().await?;
        tracing::debug!("Watching roll changes after seq {}", cursor);

        Ok(Box::new(SqliteChangeStream {
            storage: Some(self.storage.clone()),
            operations: operations.to_vec(),
            cursor,
            buffered: VecDeque::new(),
            poll_interval: self.poll_interval,
        }))
    }
}

pub struct SqliteChangeStream {
    storage: Option<Arc<Storage>>,
    operations: Vec<ChangeOperation>,
    cursor: i64,
    buffered: VecDeque<ChangeEvent>,
    poll_interval: Duration,
}

#[async_trait]
impl ChangeStream for SqliteChangeStream {
    async fn next(&mut self, max_await: Duration) -> Result<Option<ChangeEvent>> {
        if let Some(change) = self.buffered.pop_front() {
            return Ok(Some(change));
        }

        let storage = self
            .storage
            .clone()
            .ok_or_else(|| RollError::change_feed("Change stream is closed"))?;
        let deadline = Instant::now() + max_await;

        loop {
            let changes = RollStore::new(&storage)
                .changes_after(self.cursor, &self.operations, FETCH_BATCH)
                .await?;

            if let Some(last) = changes.last() {
                self.cursor = last.sequence;
                self.buffered.extend(changes);
                return Ok(self.buffered.pop_front());
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn close(&mut self) {
        self.storage = None;
        self.buffered.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Participant, RollEvent, Source};
    use chrono::Utc;
    use tempfile::tempdir;

    async fn setup() -> (tempfile::TempDir, Arc<Storage>) {
        let dir = tempdir().unwrap();
        let storage = Arc::new(Storage::new(&dir.path().join("rollbot.db")).await.unwrap());
        (dir, storage)
    }

    fn web_event() -> RollEvent {
        let organizer = Participant::new(1, "web user");
        RollEvent::new(10, &organizer, "gloves", Utc::now(), Source::Web)
    }

    #[tokio::test]
    async fn test_stream_starts_at_current_end() {
        let (_dir, storage) = setup().await;
        let before = web_event();
        RollStore::new(&storage).insert_event(&before).await.unwrap();

        let feed = SqliteChangeFeed::new(storage.clone(), Duration::from_millis(10));
        let mut stream = feed.watch(&[ChangeOperation::Insert]).await.unwrap();

        let after = web_event();
        RollStore::new(&storage).insert_event(&after).await.unwrap();

        let change = stream.next(Duration::from_secs(1)).await.unwrap().unwrap();
        assert_eq!(change.event_id, after.id);
        assert_eq!(change.operation, ChangeOperation::Insert);
    }

    #[tokio::test]
    async fn test_filter_skips_updates_and_times_out() {
        let (_dir, storage) = setup().await;
        let feed = SqliteChangeFeed::new(storage.clone(), Duration::from_millis(10));
        let mut stream = feed.watch(&[ChangeOperation::Insert]).await.unwrap();

        let event = web_event();
        let store = RollStore::new(&storage);
        store.insert_event(&event).await.unwrap();
        store.set_announcement(&event.id, 12).await.unwrap();

        assert!(stream.next(Duration::from_secs(1)).await.unwrap().is_some());
        assert!(stream
            .next(Duration::from_millis(50))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_closed_stream_errors() {
        let (_dir, storage) = setup().await;
        let feed = SqliteChangeFeed::new(storage, Duration::from_millis(10));
        let mut stream = feed.watch(&[ChangeOperation::Insert]).await.unwrap();
        stream.close().await;
        assert!(stream.next(Duration::from_millis(10)).await.is_err());
    }
}
