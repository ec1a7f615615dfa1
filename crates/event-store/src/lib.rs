//! Append-only, partitioned event log for the marketplace provisioning system.
//!
//! The log exclusively owns sequence-id assignment: every appended event
//! receives the next strictly increasing sequence id. Aggregates are derived
//! by replaying a partition's events, optionally shortened by a snapshot.

pub mod error;
pub mod event;
pub mod memory;
pub mod notify;
pub mod postgres;
pub mod query;
pub mod snapshot;
pub mod store;

pub use error::{EventStoreError, Result};
pub use event::{DomainEvent, EventId, NewEvent, NewEventBuilder, SequenceId};
pub use memory::InMemoryEventLog;
pub use notify::{InMemoryNotificationQueue, NotificationQueue};
pub use postgres::PostgresEventLog;
pub use query::EventQuery;
pub use snapshot::{Snapshot, SnapshotStatus};
pub use store::{EventLog, EventLogExt};
