use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random event ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates an event ID from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EventId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<EventId> for Uuid {
    fn from(id: EventId) -> Self {
        id.0
    }
}

/// Sequence number assigned by the event log on append.
///
/// Sequence ids are strictly increasing per partition; the log owns the
/// assignment, callers never pick their own. The value `0` is the cursor
/// position before any event.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceId(i64);

impl SequenceId {
    /// Creates a sequence id from a raw value.
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// Returns the cursor position before any event (0).
    pub fn initial() -> Self {
        Self(0)
    }

    /// Returns the next sequence id.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Returns the raw value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SequenceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SequenceId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<SequenceId> for i64 {
    fn from(id: SequenceId) -> Self {
        id.0
    }
}

/// A stored domain event with all the metadata assigned by the log.
///
/// Immutable once appended; the `sequence_id` is the replay order within
/// the event's partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique identifier for this event.
    pub event_id: EventId,

    /// Sequence number assigned by the log on append.
    pub sequence_id: SequenceId,

    /// The resource this event belongs to (offer id, subscription id).
    pub partition_key: String,

    /// The type of the event (e.g., "OfferCreated", "PlanUpdated").
    pub event_type: String,

    /// The event payload as JSON, keyed by `event_type`.
    pub payload: serde_json::Value,

    /// Who appended the event.
    pub created_by: String,

    /// When the event was appended.
    pub created_time: DateTime<Utc>,

    /// Free-form tags attached to the event.
    pub tags: HashMap<String, String>,
}

/// An event submitted for appending; the log assigns the sequence id,
/// event id and timestamp.
#[derive(Debug, Clone)]
pub struct NewEvent {
    /// The resource this event belongs to.
    pub partition_key: String,

    /// The type of the event.
    pub event_type: String,

    /// The event payload as JSON.
    pub payload: serde_json::Value,

    /// Who is appending the event.
    pub created_by: String,

    /// Free-form tags attached to the event.
    pub tags: HashMap<String, String>,
}

impl NewEvent {
    /// Creates a new event builder.
    pub fn builder() -> NewEventBuilder {
        NewEventBuilder::default()
    }
}

/// Builder for constructing events to append.
#[derive(Debug, Default)]
pub struct NewEventBuilder {
    partition_key: Option<String>,
    event_type: Option<String>,
    payload: Option<serde_json::Value>,
    created_by: Option<String>,
    tags: HashMap<String, String>,
}

impl NewEventBuilder {
    /// Sets the partition key.
    pub fn partition_key(mut self, key: impl Into<String>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    /// Sets the event type.
    pub fn event_type(mut self, event_type: impl Into<String>) -> Self {
        self.event_type = Some(event_type.into());
        self
    }

    /// Sets the payload from a serializable value.
    pub fn payload<T: Serialize>(mut self, payload: &T) -> Result<Self, serde_json::Error> {
        self.payload = Some(serde_json::to_value(payload)?);
        Ok(self)
    }

    /// Sets the payload from a raw JSON value.
    pub fn payload_raw(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Sets the author. If not set, "system" is used.
    pub fn created_by(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    /// Adds a tag.
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Builds the event.
    ///
    /// # Panics
    ///
    /// Panics if required fields (partition_key, event_type, payload)
    /// are not set.
    pub fn build(self) -> NewEvent {
        NewEvent {
            partition_key: self.partition_key.expect("partition_key is required"),
            event_type: self.event_type.expect("event_type is required"),
            payload: self.payload.expect("payload is required"),
            created_by: self.created_by.unwrap_or_else(|| "system".to_string()),
            tags: self.tags,
        }
    }

    /// Tries to build the event, returning None if required fields are missing.
    pub fn try_build(self) -> Option<NewEvent> {
        Some(NewEvent {
            partition_key: self.partition_key?,
            event_type: self.event_type?,
            payload: self.payload?,
            created_by: self.created_by.unwrap_or_else(|| "system".to_string()),
            tags: self.tags,
        })
    }
}
