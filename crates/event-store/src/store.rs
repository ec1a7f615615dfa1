use async_trait::async_trait;

use crate::{DomainEvent, EventQuery, NewEvent, Result, SequenceId, Snapshot};

/// Core trait for event log implementations.
///
/// The log is append-only and partitioned by resource id. It exclusively
/// owns sequence-id assignment: `append` stamps each event with the next
/// strictly increasing sequence id. All implementations must be
/// thread-safe (Send + Sync).
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Appends an event, assigning its sequence id, event id and
    /// timestamp. Returns the stored event.
    async fn append(&self, event: NewEvent) -> Result<DomainEvent>;

    /// Retrieves events matching a query, ordered ascending by
    /// sequence id.
    async fn query(&self, query: EventQuery) -> Result<Vec<DomainEvent>>;

    /// Returns the highest sequence id in a partition, or None if the
    /// partition has no events.
    async fn latest_sequence_id(&self, partition_key: &str) -> Result<Option<SequenceId>>;

    /// Saves a snapshot, superseding any previously active snapshot for
    /// the same resource.
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()>;

    /// Retrieves the active snapshot for a resource, if any.
    async fn get_snapshot(&self, resource_id: &str) -> Result<Option<Snapshot>>;
}

/// Extension trait providing convenience methods for event logs.
#[async_trait]
pub trait EventLogExt: EventLog {
    /// Retrieves all events for a partition in sequence order.
    async fn events_for_partition(&self, partition_key: &str) -> Result<Vec<DomainEvent>> {
        self.query(EventQuery::for_partition(partition_key)).await
    }

    /// Loads a resource's replay inputs: the active snapshot (if any) and
    /// the events strictly after its cursor (or all events when there is
    /// no snapshot).
    async fn load_resource(
        &self,
        resource_id: &str,
    ) -> Result<(Option<Snapshot>, Vec<DomainEvent>)> {
        if let Some(snapshot) = self.get_snapshot(resource_id).await? {
            let events = self
                .query(
                    EventQuery::for_partition(resource_id)
                        .after_sequence_id(snapshot.last_applied_event_id),
                )
                .await?;
            Ok((Some(snapshot), events))
        } else {
            let events = self.events_for_partition(resource_id).await?;
            Ok((None, events))
        }
    }

    /// Checks if a partition has any events.
    async fn partition_exists(&self, partition_key: &str) -> Result<bool> {
        Ok(self.latest_sequence_id(partition_key).await?.is_some())
    }
}

// Blanket implementation for all EventLog implementations
impl<T: EventLog + ?Sized> EventLogExt for T {}
