//! State reconstruction from a snapshot and an ordered event slice.

use event_store::{DomainEvent, Snapshot};
use secret_store::SecretStore;

use crate::error::{CatalogError, Result};

use super::{Offer, OfferEvent, OfferId, ProvisioningStep, events::OFFER_CREATED_EVENT};

/// Rebuilds the current offer from an optional snapshot and the ordered
/// events after it.
///
/// Inputs must already be sorted ascending by sequence id and filtered to
/// events strictly after the snapshot cursor (or all events from the
/// beginning when there is no snapshot). The function trusts its caller
/// on ordering and does not re-sort.
///
/// Returns `Ok(None)` when the offer has been deleted: a delete event
/// makes the result absent and stops further processing.
///
/// Pure and deterministic: identical inputs always yield an identical
/// aggregate. Any event type outside the closed registry is fatal.
pub fn reconstruct(
    offer_id: &OfferId,
    snapshot: Option<&Snapshot>,
    events: &[DomainEvent],
) -> Result<Option<Offer>> {
    let mut offer = match snapshot {
        Some(snapshot) => snapshot.clone().into_state::<Offer>()?,
        None => {
            // Without a snapshot the replay must start at the beginning
            // of the offer's history.
            match events.first() {
                Some(first) if first.event_type == OFFER_CREATED_EVENT => Offer::default(),
                _ => {
                    return Err(CatalogError::MissingSnapshot {
                        offer_id: offer_id.to_string(),
                    });
                }
            }
        }
    };

    for envelope in events {
        if !OfferEvent::is_known_type(&envelope.event_type) {
            return Err(CatalogError::UnknownEventType {
                event_type: envelope.event_type.clone(),
            });
        }

        let event: OfferEvent = serde_json::from_value(envelope.payload.clone())?;
        let deleted = matches!(event, OfferEvent::OfferDeleted(_));

        offer.apply(event);
        offer.set_last_applied_event_id(envelope.sequence_id);

        if deleted {
            return Ok(None);
        }
    }

    Ok(Some(offer))
}

/// Resolves the offer's provisioning step list from the secret store.
///
/// The aggregate only carries the secret name of the current step blob;
/// this reads and deserializes the blob into the aggregate. An offer with
/// no step secret keeps an empty list.
pub async fn materialize_steps(offer: &mut Offer, secrets: &dyn SecretStore) -> Result<()> {
    if let Some(secret_name) = offer.provisioning_steps_secret_name() {
        let content = secrets.get(secret_name).await?;
        let steps: Vec<ProvisioningStep> = serde_json::from_str(&content)?;
        offer.set_provisioning_steps(steps);
    }
    Ok(())
}
