//! Card stack domain model.
//!
//! A [`CardStack`] is a pre-shuffled, cursor-indexed allocation deck. The
//! shuffle happens once at allocation time, so the deck is deterministic and
//! auditable afterwards and "remaining supply" is a plain cursor comparison
//! instead of a live random draw. Two kinds exist per session: the caption
//! stack, whose entries are dealt to participants, and the image stack, whose
//! cursor tracks the current round's image.

use crate::error::{GameError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Discriminates the two stacks a session owns.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CardStackKind {
    Caption,
    Image,
}

/// Status of a dealt caption entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardStatus {
    Active,
    Discarded,
}

/// One entry of the caption stack.
///
/// Entries below the stack cursor are dealt: they carry an assignee and a
/// status. Entries at or beyond the cursor are untouched deck supply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionCard {
    /// Caption resource this entry refers to.
    pub caption_id: String,
    /// Participant the entry is dealt to, if any.
    pub assignee_id: Option<String>,
    /// Dealt-entry status; `None` until the entry is dealt.
    pub status: Option<CardStatus>,
}

impl CaptionCard {
    fn undealt(caption_id: String) -> Self {
        Self {
            caption_id,
            assignee_id: None,
            status: None,
        }
    }

    /// Whether this entry is dealt to `assignee_id` and still active.
    pub fn is_active_for(&self, assignee_id: &str) -> bool {
        self.assignee_id.as_deref() == Some(assignee_id) && self.status == Some(CardStatus::Active)
    }
}

/// A pre-shuffled allocation deck, one variant per [`CardStackKind`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardStack {
    /// Caption deck: dealt entries below the cursor, supply above it.
    Caption {
        cards: Vec<CaptionCard>,
        /// Index of the next undealt entry.
        cursor: usize,
        /// Advisory single-writer lock held across a discard's two-step
        /// mutation.
        lock_owner: Option<String>,
    },
    /// Image deck: one entry consumed per round.
    Image {
        cards: Vec<String>,
        /// Index of the current round's image.
        cursor: usize,
    },
}

impl CardStack {
    /// The stack's kind tag.
    pub fn kind(&self) -> CardStackKind {
        match self {
            CardStack::Caption { .. } => CardStackKind::Caption,
            CardStack::Image { .. } => CardStackKind::Image,
        }
    }

    /// Number of entries in the deck.
    pub fn len(&self) -> usize {
        match self {
            CardStack::Caption { cards, .. } => cards.len(),
            CardStack::Image { cards, .. } => cards.len(),
        }
    }

    /// Whether the deck holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current cursor position.
    pub fn cursor(&self) -> usize {
        match self {
            CardStack::Caption { cursor, .. } => *cursor,
            CardStack::Image { cursor, .. } => *cursor,
        }
    }

    // === Allocation ===

    /// Builds the caption stack for a fresh game.
    ///
    /// Shuffles the whole caption pool (Fisher-Yates, uniform), keeps
    /// `deck_size` entries and deals the first `hand_size` per participant in
    /// roster order as active. The cursor ends up at `hand_size ×
    /// participants`; everything above it is draw supply.
    pub fn allocate(
        mut pool: Vec<String>,
        participant_ids: &[String],
        hand_size: usize,
        deck_size: usize,
        rng: &mut impl Rng,
    ) -> Result<Self> {
        let dealt = hand_size * participant_ids.len();
        let required = deck_size.max(dealt);
        if pool.len() < required {
            return Err(GameError::InsufficientResources {
                required,
                available: pool.len(),
            });
        }

        pool.shuffle(rng);
        pool.truncate(required);

        let mut cards: Vec<CaptionCard> = pool.into_iter().map(CaptionCard::undealt).collect();
        let mut cursor = 0;
        for participant_id in participant_ids {
            for _ in 0..hand_size {
                let card = &mut cards[cursor];
                card.assignee_id = Some(participant_id.clone());
                card.status = Some(CardStatus::Active);
                cursor += 1;
            }
        }

        Ok(CardStack::Caption {
            cards,
            cursor,
            lock_owner: None,
        })
    }

    /// Builds the image stack for a fresh game: shuffled pool truncated to
    /// `count`, cursor on the first round's image.
    pub fn allocate_images(mut pool: Vec<String>, count: usize, rng: &mut impl Rng) -> Result<Self> {
        if pool.len() < count {
            return Err(GameError::InsufficientResources {
                required: count,
                available: pool.len(),
            });
        }
        pool.shuffle(rng);
        pool.truncate(count);
        Ok(CardStack::Image { cards: pool, cursor: 0 })
    }

    // === Caption operations ===

    fn caption_parts(&self) -> Result<(&Vec<CaptionCard>, usize)> {
        match self {
            CardStack::Caption { cards, cursor, .. } => Ok((cards, *cursor)),
            CardStack::Image { .. } => Err(GameError::WrongStackKind {
                expected: CardStackKind::Caption.to_string(),
            }),
        }
    }

    /// Index of the assignee's active entry for `caption_id`.
    pub fn find_active_entry(&self, assignee_id: &str, caption_id: &str) -> Result<usize> {
        let (cards, cursor) = self.caption_parts()?;
        cards[..cursor]
            .iter()
            .position(|c| c.is_active_for(assignee_id) && c.caption_id == caption_id)
            .ok_or_else(|| GameError::CardNotActive {
                caption_id: caption_id.to_string(),
            })
    }

    /// The assignee's current hand, in deal order.
    pub fn active_captions(&self, assignee_id: &str) -> Result<Vec<String>> {
        let (cards, cursor) = self.caption_parts()?;
        Ok(cards[..cursor]
            .iter()
            .filter(|c| c.is_active_for(assignee_id))
            .map(|c| c.caption_id.clone())
            .collect())
    }

    /// Who a dealt caption belongs to, regardless of its status.
    ///
    /// Submissions are anonymous, so ownership questions (self-votes, round
    /// winners) are always answered through this cross reference.
    pub fn assignee_of(&self, caption_id: &str) -> Result<Option<String>> {
        let (cards, cursor) = self.caption_parts()?;
        Ok(cards[..cursor]
            .iter()
            .find(|c| c.caption_id == caption_id)
            .and_then(|c| c.assignee_id.clone()))
    }

    /// Deals the entry at the cursor to `assignee_id` as active and advances
    /// the cursor.
    ///
    /// Returns the dealt caption id, or `DeckExhausted` when the supply ran
    /// out.
    pub fn consume_next(&mut self, assignee_id: &str) -> Result<String> {
        let CardStack::Caption { cards, cursor, .. } = self else {
            return Err(GameError::WrongStackKind {
                expected: CardStackKind::Caption.to_string(),
            });
        };
        let Some(card) = cards.get_mut(*cursor) else {
            return Err(GameError::DeckExhausted);
        };
        card.assignee_id = Some(assignee_id.to_string());
        card.status = Some(CardStatus::Active);
        *cursor += 1;
        Ok(card.caption_id.clone())
    }

    /// Flips the assignee's active entry for `caption_id` to discarded and
    /// deals the replacement from the supply.
    ///
    /// This is the single card mutation shared by submissions and discards;
    /// returns the replacement caption id.
    pub fn replace_active(&mut self, assignee_id: &str, caption_id: &str) -> Result<String> {
        let index = self.find_active_entry(assignee_id, caption_id)?;
        if let CardStack::Caption { cards, .. } = self {
            cards[index].status = Some(CardStatus::Discarded);
        }
        self.consume_next(assignee_id)
    }

    // === Advisory lock ===

    /// Takes the advisory discard lock, failing with `StackLocked` while
    /// another owner holds it. Re-acquiring one's own lock succeeds.
    pub fn acquire_lock(&mut self, owner: &str) -> Result<()> {
        let CardStack::Caption { lock_owner, .. } = self else {
            return Err(GameError::WrongStackKind {
                expected: CardStackKind::Caption.to_string(),
            });
        };
        match lock_owner.as_deref() {
            Some(current) if current != owner => Err(GameError::StackLocked),
            _ => {
                *lock_owner = Some(owner.to_string());
                Ok(())
            }
        }
    }

    /// Drops the advisory lock if `owner` holds it.
    pub fn release_lock(&mut self, owner: &str) {
        if let CardStack::Caption { lock_owner, .. } = self {
            if lock_owner.as_deref() == Some(owner) {
                *lock_owner = None;
            }
        }
    }

    // === Image operations ===

    /// The current round's image.
    pub fn current_image(&self) -> Result<&str> {
        let CardStack::Image { cards, cursor } = self else {
            return Err(GameError::WrongStackKind {
                expected: CardStackKind::Image.to_string(),
            });
        };
        cards
            .get(*cursor)
            .map(String::as_str)
            .ok_or(GameError::DeckExhausted)
    }

    /// Moves the cursor to the next round's image.
    ///
    /// `DeckExhausted` here is terminal: the game ends instead of the round
    /// advancing.
    pub fn advance_image(&mut self) -> Result<()> {
        let CardStack::Image { cards, cursor } = self else {
            return Err(GameError::WrongStackKind {
                expected: CardStackKind::Image.to_string(),
            });
        };
        if *cursor + 1 >= cards.len() {
            return Err(GameError::DeckExhausted);
        }
        *cursor += 1;
        Ok(())
    }
}
