//! Shared identifier types used across the marketplace provisioning system.

pub mod types;

pub use types::SubscriptionId;
