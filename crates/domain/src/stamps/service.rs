//! The stamp service: card administration and the stamp ledger.

use std::sync::Arc;

use chrono::Utc;
use common::{CardId, LocationId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DomainError;
use crate::store::{StampStore, Version};

use super::{CardSummary, PhoneNormalizer, Stamp, StampCard, StampError};

/// Command to register a new stamp card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterCard {
    pub location_id: LocationId,

    /// Phone number as typed by the merchant; canonicalized before storage.
    pub phone: String,

    pub first_name: String,
}

/// Application service for loyalty stamp cards.
///
/// Cards are keyed by canonical phone per location. The stamp ledger is
/// append-only; counters are derived on read, never stored.
pub struct StampService<S, P> {
    store: Arc<S>,
    normalizer: P,
}

impl<S, P: Clone> Clone for StampService<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            normalizer: self.normalizer.clone(),
        }
    }
}

impl<S, P> StampService<S, P>
where
    S: StampStore,
    P: PhoneNormalizer,
{
    pub fn new(store: Arc<S>, normalizer: P) -> Self {
        Self { store, normalizer }
    }

    /// Registers a new card for a (location, phone) pair.
    ///
    /// The store's unique constraint keeps the pair unique among non-deleted
    /// cards; a soft-deleted card does not block re-registration.
    #[tracing::instrument(skip(self, cmd), fields(location_id = %cmd.location_id))]
    pub async fn register_card(&self, cmd: RegisterCard) -> Result<StampCard, DomainError> {
        let phone = self.normalizer.normalize(&cmd.phone)?;
        let mut card = StampCard::register(
            CardId::new(),
            cmd.location_id,
            phone,
            cmd.first_name,
        );
        self.store.insert_card(&card).await?;
        card.version = Version::first();

        info!(card_id = %card.id, "stamp card registered");
        metrics::counter!("stamp_cards_registered_total").increment(1);
        Ok(card)
    }

    /// Finds the card for a phone number at a location, if one exists.
    pub async fn find_card(
        &self,
        location_id: LocationId,
        phone: &str,
    ) -> Result<Option<CardSummary>, DomainError> {
        let phone = self.normalizer.normalize(phone)?;
        match self.store.find_card_by_phone(location_id, &phone).await? {
            Some(card) => Ok(Some(self.summarize(&card).await?)),
            None => Ok(None),
        }
    }

    /// Loads a card with its derived counters.
    pub async fn card_summary(&self, card_id: CardId) -> Result<CardSummary, DomainError> {
        let card = self.load(card_id).await?;
        self.summarize(&card).await
    }

    /// Lists the non-deleted cards of a location with derived counters.
    pub async fn cards_for_location(
        &self,
        location_id: LocationId,
    ) -> Result<Vec<CardSummary>, DomainError> {
        let cards = self.store.cards_for_location(location_id).await?;
        let mut summaries = Vec::with_capacity(cards.len());
        for card in &cards {
            summaries.push(self.summarize(card).await?);
        }
        Ok(summaries)
    }

    /// Renames the card holder.
    #[tracing::instrument(skip(self, first_name))]
    pub async fn rename_card(
        &self,
        card_id: CardId,
        first_name: impl Into<String>,
    ) -> Result<StampCard, DomainError> {
        let mut card = self.load_live(card_id).await?;
        let expected = card.version;

        card.first_name = first_name.into();
        card.version = self.store.update_card(&card, expected).await?;
        Ok(card)
    }

    /// Soft-deletes a card. The ledger stays in the store; the (location,
    /// phone) pair becomes free for a new card.
    #[tracing::instrument(skip(self))]
    pub async fn delete_card(&self, card_id: CardId) -> Result<(), DomainError> {
        let mut card = self.load_live(card_id).await?;
        let expected = card.version;

        card.is_deleted = true;
        self.store.update_card(&card, expected).await?;

        info!(%card_id, "stamp card deleted");
        Ok(())
    }

    /// Appends one stamp to the card's ledger.
    #[tracing::instrument(skip(self))]
    pub async fn add_stamp(&self, card_id: CardId) -> Result<CardSummary, DomainError> {
        let card = self.load_live(card_id).await?;

        self.store.insert_stamp(&Stamp::new(card.id)).await?;
        metrics::counter!("stamps_added_total").increment(1);
        self.summarize(&card).await
    }

    /// Undoes the most recent stamp (mis-taps happen at the counter).
    ///
    /// The stamp is soft-deleted, never removed. The target is the newest
    /// non-deleted stamp regardless of claim state, so repeated calls peel
    /// the ledger in reverse insertion order until it runs dry.
    #[tracing::instrument(skip(self))]
    pub async fn undo_last_stamp(&self, card_id: CardId) -> Result<CardSummary, DomainError> {
        let card = self.load_live(card_id).await?;
        let stamps = self.store.stamps_for_card(card.id).await?;

        // stamps_for_card returns oldest first.
        let last = stamps
            .iter()
            .rev()
            .find(|s| !s.is_deleted)
            .ok_or(StampError::NothingToUndo(card_id))?;

        self.store
            .soft_delete_stamp(card.id, card.version, last.id)
            .await?;
        metrics::counter!("stamps_undone_total").increment(1);
        self.summarize(&card).await
    }

    /// Spends `count` stamps on a reward, oldest first, all-or-nothing.
    ///
    /// The batch is guarded by the card version, so a concurrent claim or
    /// undo fails the whole batch instead of spending half of it.
    #[tracing::instrument(skip(self))]
    pub async fn claim_stamps(
        &self,
        card_id: CardId,
        count: u32,
    ) -> Result<CardSummary, DomainError> {
        if count == 0 {
            return Err(StampError::InvalidClaimCount.into());
        }
        let card = self.load_live(card_id).await?;
        let stamps = self.store.stamps_for_card(card.id).await?;

        let active: Vec<_> = stamps.iter().filter(|s| s.is_active()).collect();
        if (active.len() as u32) < count {
            return Err(StampError::InsufficientStamps {
                available: active.len() as u32,
                requested: count,
            }
            .into());
        }

        let to_claim: Vec<_> = active[..count as usize].iter().map(|s| s.id).collect();
        self.store
            .mark_stamps_claimed(card.id, card.version, &to_claim, Utc::now())
            .await?;

        info!(%card_id, count, "stamps claimed");
        metrics::counter!("stamps_claimed_total").increment(count as u64);
        self.summarize(&card).await
    }

    async fn load(&self, card_id: CardId) -> Result<StampCard, DomainError> {
        self.store
            .get_card(card_id)
            .await?
            .ok_or_else(|| DomainError::NotFound {
                entity: "stamp card",
                id: card_id.to_string(),
            })
    }

    /// Loads a card and rejects soft-deleted ones.
    async fn load_live(&self, card_id: CardId) -> Result<StampCard, DomainError> {
        let card = self.load(card_id).await?;
        if card.is_deleted {
            return Err(StampError::CardDeleted(card_id).into());
        }
        Ok(card)
    }

    async fn summarize(&self, card: &StampCard) -> Result<CardSummary, DomainError> {
        let stamps = self.store.stamps_for_card(card.id).await?;
        Ok(CardSummary::derive(card, &stamps))
    }
}
