use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::SequenceId;

/// Lifecycle status of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotStatus {
    /// The most recent snapshot for its resource.
    Active,

    /// Replaced by a newer snapshot; kept for audit.
    Superseded,
}

/// A cached materialization of a resource's state plus the last event it
/// reflects.
///
/// Snapshots shorten future replays: reconstruction from a snapshot and the
/// events after its cursor is equivalent to reconstruction from the full
/// event history. Snapshots are never mutated, only superseded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unique identifier for this snapshot.
    pub snapshot_id: Uuid,

    /// The resource (partition) this snapshot belongs to.
    pub resource_id: String,

    /// Sequence id of the last event reflected in the content.
    pub last_applied_event_id: SequenceId,

    /// The serialized aggregate state.
    pub content: serde_json::Value,

    /// Lifecycle status.
    pub status: SnapshotStatus,

    /// When the snapshot was created.
    pub created_time: DateTime<Utc>,

    /// When the snapshot was soft-deleted, if ever.
    pub deleted_time: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Creates a new active snapshot.
    pub fn new(
        resource_id: impl Into<String>,
        last_applied_event_id: SequenceId,
        content: serde_json::Value,
    ) -> Self {
        Self {
            snapshot_id: Uuid::new_v4(),
            resource_id: resource_id.into(),
            last_applied_event_id,
            content,
            status: SnapshotStatus::Active,
            created_time: Utc::now(),
            deleted_time: None,
        }
    }

    /// Creates a snapshot from a serializable state.
    pub fn from_state<T: Serialize>(
        resource_id: impl Into<String>,
        last_applied_event_id: SequenceId,
        state: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(
            resource_id,
            last_applied_event_id,
            serde_json::to_value(state)?,
        ))
    }

    /// Deserializes the snapshot content into a concrete type.
    pub fn into_state<T: for<'de> Deserialize<'de>>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.content)
    }

    /// Gets a reference to the content as JSON.
    pub fn content_ref(&self) -> &serde_json::Value {
        &self.content
    }
}
