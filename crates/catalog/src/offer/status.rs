//! Offer status machine.

use serde::{Deserialize, Serialize};

/// The lifecycle status of an offer.
///
/// Status transitions:
/// ```text
/// Draft ──► Published ──► (republish: Published)
///   │            │
///   └────────────┴──► Deleted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OfferStatus {
    /// Offer is being authored; not visible to subscribers.
    #[default]
    Draft,

    /// Offer is live; plans can be subscribed to.
    Published,

    /// Offer was deleted (terminal state).
    Deleted,
}

impl OfferStatus {
    /// Returns true if the offer's content can be modified.
    pub fn can_modify(&self) -> bool {
        matches!(self, OfferStatus::Draft | OfferStatus::Published)
    }

    /// Returns true if the offer can be published (or republished).
    pub fn can_publish(&self) -> bool {
        matches!(self, OfferStatus::Draft | OfferStatus::Published)
    }

    /// Returns true if the offer can be deleted.
    pub fn can_delete(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OfferStatus::Deleted)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Draft => "Draft",
            OfferStatus::Published => "Published",
            OfferStatus::Deleted => "Deleted",
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
