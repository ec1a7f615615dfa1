use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::{
    DomainEvent, EventId, EventQuery, NewEvent, Result, SequenceId, Snapshot, SnapshotStatus,
    store::EventLog,
};

#[derive(Default)]
struct LogState {
    next_sequence_id: i64,
    events: Vec<DomainEvent>,
    snapshots: Vec<Snapshot>,
}

/// In-memory event log implementation for testing and embedding.
///
/// Assigns sequence ids from a single monotonic counter, which satisfies
/// the strictly-increasing-per-partition requirement.
#[derive(Clone, Default)]
pub struct InMemoryEventLog {
    state: Arc<RwLock<LogState>>,
}

impl InMemoryEventLog {
    /// Creates a new empty in-memory event log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of events stored.
    pub async fn event_count(&self) -> usize {
        self.state.read().await.events.len()
    }

    /// Clears all events and snapshots.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.events.clear();
        state.snapshots.clear();
        state.next_sequence_id = 0;
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, event: NewEvent) -> Result<DomainEvent> {
        let mut state = self.state.write().await;
        state.next_sequence_id += 1;

        let stored = DomainEvent {
            event_id: EventId::new(),
            sequence_id: SequenceId::new(state.next_sequence_id),
            partition_key: event.partition_key,
            event_type: event.event_type,
            payload: event.payload,
            created_by: event.created_by,
            created_time: Utc::now(),
            tags: event.tags,
        };

        state.events.push(stored.clone());
        Ok(stored)
    }

    async fn query(&self, query: EventQuery) -> Result<Vec<DomainEvent>> {
        let state = self.state.read().await;
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| {
                if let Some(ref key) = query.partition_key
                    && &e.partition_key != key
                {
                    return false;
                }
                if let Some(ref types) = query.event_types
                    && !types.contains(&e.event_type)
                {
                    return false;
                }
                if let Some(cursor) = query.after_sequence_id
                    && e.sequence_id <= cursor
                {
                    return false;
                }
                true
            })
            .cloned()
            .collect();

        events.sort_by_key(|e| e.sequence_id);

        if let Some(limit) = query.limit {
            events.truncate(limit);
        }

        Ok(events)
    }

    async fn latest_sequence_id(&self, partition_key: &str) -> Result<Option<SequenceId>> {
        let state = self.state.read().await;
        Ok(state
            .events
            .iter()
            .filter(|e| e.partition_key == partition_key)
            .map(|e| e.sequence_id)
            .max())
    }

    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let mut state = self.state.write().await;
        for existing in state
            .snapshots
            .iter_mut()
            .filter(|s| s.resource_id == snapshot.resource_id)
        {
            existing.status = SnapshotStatus::Superseded;
        }
        state.snapshots.push(snapshot);
        Ok(())
    }

    async fn get_snapshot(&self, resource_id: &str) -> Result<Option<Snapshot>> {
        let state = self.state.read().await;
        Ok(state
            .snapshots
            .iter()
            .filter(|s| s.resource_id == resource_id && s.status == SnapshotStatus::Active)
            .max_by_key(|s| s.last_applied_event_id)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::EventLogExt;

    fn create_test_event(partition_key: &str, event_type: &str) -> NewEvent {
        NewEvent::builder()
            .partition_key(partition_key)
            .event_type(event_type)
            .payload_raw(serde_json::json!({"test": true}))
            .build()
    }

    #[tokio::test]
    async fn append_assigns_increasing_sequence_ids() {
        let log = InMemoryEventLog::new();

        let e1 = log.append(create_test_event("offer-1", "Event1")).await.unwrap();
        let e2 = log.append(create_test_event("offer-1", "Event2")).await.unwrap();
        let e3 = log.append(create_test_event("offer-2", "Event3")).await.unwrap();

        assert!(e1.sequence_id < e2.sequence_id);
        assert!(e2.sequence_id < e3.sequence_id);
        assert_eq!(log.event_count().await, 3);
    }

    #[tokio::test]
    async fn query_filters_by_partition() {
        let log = InMemoryEventLog::new();
        log.append(create_test_event("offer-1", "Event1")).await.unwrap();
        log.append(create_test_event("offer-2", "Event2")).await.unwrap();
        log.append(create_test_event("offer-1", "Event3")).await.unwrap();

        let events = log.events_for_partition("offer-1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].sequence_id < events[1].sequence_id);
    }

    #[tokio::test]
    async fn query_filters_by_event_type() {
        let log = InMemoryEventLog::new();
        log.append(create_test_event("offer-1", "OfferCreated")).await.unwrap();
        log.append(create_test_event("offer-1", "OfferPublished")).await.unwrap();
        log.append(create_test_event("offer-2", "OfferPublished")).await.unwrap();

        let published = log
            .query(EventQuery::for_event_type("OfferPublished"))
            .await
            .unwrap();
        assert_eq!(published.len(), 2);
    }

    #[tokio::test]
    async fn query_after_cursor_is_strict() {
        let log = InMemoryEventLog::new();
        let e1 = log.append(create_test_event("offer-1", "Event1")).await.unwrap();
        let e2 = log.append(create_test_event("offer-1", "Event2")).await.unwrap();

        let events = log
            .query(EventQuery::for_partition("offer-1").after_sequence_id(e1.sequence_id))
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sequence_id, e2.sequence_id);
    }

    #[tokio::test]
    async fn query_respects_limit() {
        let log = InMemoryEventLog::new();
        for i in 0..5 {
            log.append(create_test_event("offer-1", &format!("Event{}", i)))
                .await
                .unwrap();
        }

        let events = log
            .query(EventQuery::for_partition("offer-1").limit(2))
            .await
            .unwrap();
        assert_eq!(events.len(), 2);
    }

    #[tokio::test]
    async fn latest_sequence_id_per_partition() {
        let log = InMemoryEventLog::new();
        assert!(log.latest_sequence_id("offer-1").await.unwrap().is_none());

        log.append(create_test_event("offer-1", "Event1")).await.unwrap();
        let e2 = log.append(create_test_event("offer-1", "Event2")).await.unwrap();
        log.append(create_test_event("offer-2", "Event3")).await.unwrap();

        assert_eq!(
            log.latest_sequence_id("offer-1").await.unwrap(),
            Some(e2.sequence_id)
        );
    }

    #[tokio::test]
    async fn snapshot_save_and_retrieve() {
        let log = InMemoryEventLog::new();
        let snapshot = Snapshot::new(
            "offer-1",
            SequenceId::new(5),
            serde_json::json!({"state": "saved"}),
        );

        log.save_snapshot(snapshot).await.unwrap();

        let retrieved = log.get_snapshot("offer-1").await.unwrap().unwrap();
        assert_eq!(retrieved.resource_id, "offer-1");
        assert_eq!(retrieved.last_applied_event_id, SequenceId::new(5));
    }

    #[tokio::test]
    async fn newer_snapshot_supersedes_older() {
        let log = InMemoryEventLog::new();
        log.save_snapshot(Snapshot::new(
            "offer-1",
            SequenceId::new(5),
            serde_json::json!({"n": 1}),
        ))
        .await
        .unwrap();
        log.save_snapshot(Snapshot::new(
            "offer-1",
            SequenceId::new(9),
            serde_json::json!({"n": 2}),
        ))
        .await
        .unwrap();

        let active = log.get_snapshot("offer-1").await.unwrap().unwrap();
        assert_eq!(active.last_applied_event_id, SequenceId::new(9));
    }

    #[tokio::test]
    async fn snapshot_not_found() {
        let log = InMemoryEventLog::new();
        assert!(log.get_snapshot("offer-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn load_resource_returns_snapshot_and_tail() {
        let log = InMemoryEventLog::new();
        let e1 = log.append(create_test_event("offer-1", "Event1")).await.unwrap();
        log.save_snapshot(Snapshot::new(
            "offer-1",
            e1.sequence_id,
            serde_json::json!({"after": 1}),
        ))
        .await
        .unwrap();
        let e2 = log.append(create_test_event("offer-1", "Event2")).await.unwrap();

        let (snapshot, events) = log.load_resource("offer-1").await.unwrap();
        assert!(snapshot.is_some());
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sequence_id, e2.sequence_id);
    }

    #[tokio::test]
    async fn load_resource_without_snapshot_returns_all_events() {
        let log = InMemoryEventLog::new();
        log.append(create_test_event("offer-1", "Event1")).await.unwrap();
        log.append(create_test_event("offer-1", "Event2")).await.unwrap();

        let (snapshot, events) = log.load_resource("offer-1").await.unwrap();
        assert!(snapshot.is_none());
        assert_eq!(events.len(), 2);
    }
}
