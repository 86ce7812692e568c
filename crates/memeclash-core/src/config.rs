//! Game tuning parameters.
//!
//! Every numeric rule of the engine lives here so that embedders can run
//! shorter games or larger hands without touching the engine itself. The
//! defaults reproduce the production rule set.

use crate::session::Role;
use serde::{Deserialize, Serialize};

/// Tunable rule set for a game session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Minimum roster size required to start a game.
    pub min_participants: usize,
    /// Number of active caption cards each participant holds at a time.
    pub hand_size: usize,
    /// Total caption cards drawn into the deck per participant. Must be at
    /// least `hand_size`; the surplus is the draw pile consumed by
    /// submissions and discards.
    pub captions_per_participant: usize,
    /// Image cards drawn into the deck per participant; one image is
    /// consumed per round, so this bounds the game length.
    pub images_per_participant: usize,
    /// Judge vote budget per participant in the roster.
    pub judge_points_per_participant: u64,
    /// Player vote budget per opponent (roster minus self and judge).
    pub player_points_per_opponent: u64,
    /// Upper bound on the player vote budget regardless of roster size.
    pub max_player_points: u64,
    /// Votes must be positive multiples of this amount.
    pub vote_increment: u64,
    /// A participant reaching this many round wins ends the game.
    pub wins_to_end: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            min_participants: 3,
            hand_size: 10,
            captions_per_participant: 40,
            images_per_participant: 5,
            judge_points_per_participant: 1000,
            player_points_per_opponent: 500,
            max_player_points: 3000,
            vote_increment: 100,
            wins_to_end: 8,
        }
    }
}

impl GameConfig {
    /// Size of the caption deck for a roster of `participant_count`.
    pub fn caption_deck_size(&self, participant_count: usize) -> usize {
        self.captions_per_participant * participant_count
    }

    /// Size of the image deck for a roster of `participant_count`.
    pub fn image_deck_size(&self, participant_count: usize) -> usize {
        self.images_per_participant * participant_count
    }

    /// Per-round vote budget for the given role.
    ///
    /// Budgets are cumulative across all of a voter's votes within one round
    /// and are always recomputed from the vote log, never cached.
    pub fn vote_budget(&self, role: Role, participant_count: usize) -> u64 {
        match role {
            Role::Judge => self.judge_points_per_participant * participant_count as u64,
            Role::Player => {
                let opponents = participant_count.saturating_sub(2) as u64;
                self.max_player_points
                    .min(self.player_points_per_opponent * opponents)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_deck_sizes() {
        let config = GameConfig::default();
        assert_eq!(config.caption_deck_size(3), 120);
        assert_eq!(config.image_deck_size(3), 15);
    }

    #[test]
    fn test_judge_budget_scales_with_roster() {
        let config = GameConfig::default();
        assert_eq!(config.vote_budget(Role::Judge, 3), 3000);
        assert_eq!(config.vote_budget(Role::Judge, 5), 5000);
    }

    #[test]
    fn test_player_budget_counts_opponents() {
        let config = GameConfig::default();
        // Three participants leave a single opponent besides self and judge.
        assert_eq!(config.vote_budget(Role::Player, 3), 500);
        assert_eq!(config.vote_budget(Role::Player, 4), 1000);
    }

    #[test]
    fn test_player_budget_is_capped() {
        let config = GameConfig::default();
        // Ten participants would give 4000 uncapped.
        assert_eq!(config.vote_budget(Role::Player, 10), 3000);
    }
}
