//! Game use case: the action surface of the session engine.
//!
//! One async method per inbound action. Every action is a short-lived
//! transaction: load the session (and relevant card stack) through the
//! repository traits, run the domain rules, write the mutated aggregates back
//! with a compare-and-swap. The use case holds no game state of its own, so
//! any number of actions may run concurrently across sessions; within one
//! session the per-document versions serialize the writers.
//!
//! A `VersionConflict` means another writer won the race; the action is
//! re-run from a fresh read, re-evaluating all validation, up to
//! [`CAS_ATTEMPTS`] times before the conflict surfaces to the caller.

use chrono::Utc;
use memeclash_core::cardstack::{CardStack, CardStackKind};
use memeclash_core::config::GameConfig;
use memeclash_core::error::{GameError, Result};
use memeclash_core::join_code;
use memeclash_core::repository::{
    AssetCatalog, CardStackRepository, SessionRepository, SubmissionRepository,
};
use memeclash_core::session::{GameStatus, Role};
use memeclash_core::submission::{self, Submission};
use memeclash_infrastructure::MemoryGameStore;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Bounded retries for conflicted compare-and-swap writes.
const CAS_ATTEMPTS: usize = 4;

/// Payload returned by [`GameUseCase::create_game`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedGame {
    pub game_id: String,
    pub join_code: String,
}

/// Payload returned by [`GameUseCase::submit_caption`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedCaption {
    pub submission_id: String,
    /// The replacement card dealt into the submitter's hand.
    pub next_caption_id: String,
}

/// The engine's inbound action surface.
///
/// Caller identity (`actor_id`) is a resolved user id supplied by the auth
/// collaborator; the transport layer maps one endpoint onto each method.
pub struct GameUseCase {
    sessions: Arc<dyn SessionRepository>,
    stacks: Arc<dyn CardStackRepository>,
    submissions: Arc<dyn SubmissionRepository>,
    assets: Arc<dyn AssetCatalog>,
    config: GameConfig,
}

impl GameUseCase {
    /// Creates a use case over explicit repository backends.
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        stacks: Arc<dyn CardStackRepository>,
        submissions: Arc<dyn SubmissionRepository>,
        assets: Arc<dyn AssetCatalog>,
        config: GameConfig,
    ) -> Self {
        Self {
            sessions,
            stacks,
            submissions,
            assets,
            config,
        }
    }

    /// Creates a use case where a single [`MemoryGameStore`] backs all
    /// repositories.
    pub fn with_store(store: Arc<MemoryGameStore>, config: GameConfig) -> Self {
        Self::new(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            config,
        )
    }

    // === Create / join ===

    /// Creates a session in `Waiting` with the creator as sole participant
    /// and initial judge, under a freshly allocated join code.
    pub async fn create_game(&self, creator_id: &str, nickname: &str) -> Result<CreatedGame> {
        let game_id = self.sessions.allocate_session_id().await?;
        let join_code = match self.sessions.latest_join_code().await? {
            Some(latest) => join_code::next_join_code(&latest)?,
            None => join_code::first_join_code(),
        };
        let session =
            memeclash_core::session::GameSession::new(&game_id, &join_code, creator_id, nickname, Utc::now());
        self.sessions.insert(&session).await?;
        tracing::info!(game_id, join_code, creator_id, "game created");
        Ok(CreatedGame { game_id, join_code })
    }

    /// Adds the caller to the session behind `code` as a player.
    ///
    /// Idempotent by design: re-joining, or joining a session that already
    /// left `Waiting`, returns the game id without mutation so that client
    /// retries are harmless.
    pub async fn join_game(&self, user_id: &str, nickname: &str, code: &str) -> Result<String> {
        for _ in 0..CAS_ATTEMPTS {
            let loaded = self.sessions.find_by_code(code).await?;
            let mut session = loaded.value;
            if !session.join(user_id, nickname, Utc::now()) {
                return Ok(session.id);
            }
            match self.sessions.compare_and_swap(loaded.version, &session).await {
                Ok(()) => {
                    tracing::info!(game_id = %session.id, user_id, "participant joined");
                    return Ok(session.id);
                }
                Err(GameError::VersionConflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(GameError::VersionConflict)
    }

    // === Start ===

    /// Starts the game: allocates both card stacks and opens round 1.
    pub async fn start_game(&self, actor_id: &str, game_id: &str) -> Result<()> {
        let mut rng = StdRng::from_entropy();
        self.start_game_with_rng(actor_id, game_id, &mut rng).await
    }

    /// [`start_game`](Self::start_game) with an injected RNG, so allocation
    /// is reproducible under test.
    pub async fn start_game_with_rng(
        &self,
        actor_id: &str,
        game_id: &str,
        rng: &mut (impl Rng + Send),
    ) -> Result<()> {
        for _ in 0..CAS_ATTEMPTS {
            let loaded = self.sessions.load(game_id).await?;
            let mut session = loaded.value;
            session.start(actor_id, self.config.min_participants, Utc::now())?;

            let roster: Vec<String> = session
                .participants
                .iter()
                .map(|p| p.user_id.clone())
                .collect();
            let captions = CardStack::allocate(
                self.assets.caption_ids().await?,
                &roster,
                self.config.hand_size,
                self.config.caption_deck_size(roster.len()),
                rng,
            )?;
            let images = CardStack::allocate_images(
                self.assets.image_ids().await?,
                self.config.image_deck_size(roster.len()),
                rng,
            )?;
            self.stacks.insert(game_id, &captions).await?;
            self.stacks.insert(game_id, &images).await?;

            match self.sessions.compare_and_swap(loaded.version, &session).await {
                Ok(()) => {
                    tracing::info!(game_id, participants = roster.len(), "game started");
                    return Ok(());
                }
                Err(GameError::VersionConflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(GameError::VersionConflict)
    }

    // === Captions ===

    /// Submits one of the caller's active captions for the current round.
    pub async fn submit_caption(
        &self,
        actor_id: &str,
        game_id: &str,
        caption_id: &str,
    ) -> Result<SubmittedCaption> {
        for _ in 0..CAS_ATTEMPTS {
            match self.try_submit_caption(actor_id, game_id, caption_id).await {
                Err(GameError::VersionConflict) => continue,
                outcome => return outcome,
            }
        }
        Err(GameError::VersionConflict)
    }

    async fn try_submit_caption(
        &self,
        actor_id: &str,
        game_id: &str,
        caption_id: &str,
    ) -> Result<SubmittedCaption> {
        let session = self.sessions.load(game_id).await?.value;
        session.ensure_not_ended()?;
        let actor = session.require_participant(actor_id)?;
        if actor.role == Role::Judge {
            return Err(GameError::wrong_role("player"));
        }
        if session.status != GameStatus::Deciding {
            return Err(GameError::wrong_phase(
                GameStatus::Deciding.to_string(),
                session.status,
            ));
        }

        let loaded_stack = self.stacks.load(game_id, CardStackKind::Caption).await?;
        let mut stack = loaded_stack.value;
        stack.find_active_entry(actor_id, caption_id)?;

        let loaded_log = self.submissions.list_round(game_id, session.round).await?;
        if loaded_log.value.iter().any(|s| s.caption_id == caption_id) {
            return Err(GameError::AlreadySubmitted {
                caption_id: caption_id.to_string(),
            });
        }
        // Submissions are anonymous; a double submission is detected by
        // cross-referencing the round's captions against the actor's dealt
        // cards.
        for existing in &loaded_log.value {
            if stack.assignee_of(&existing.caption_id)?.as_deref() == Some(actor_id) {
                return Err(GameError::AlreadySubmitted {
                    caption_id: caption_id.to_string(),
                });
            }
        }

        // The stack swap is the serialization point: it happens before the
        // submission is recorded, so a conflicted retry re-validates against
        // a state in which nothing of this action is visible yet.
        let next_caption_id = stack.replace_active(actor_id, caption_id)?;
        self.stacks
            .compare_and_swap(game_id, loaded_stack.version, &stack)
            .await?;

        let entry = Submission::new(
            Uuid::new_v4().to_string(),
            caption_id,
            session.round,
            Utc::now(),
        );
        self.append_submission(game_id, session.round, loaded_log.version, &entry)
            .await?;
        tracing::debug!(game_id, round = session.round, "caption submitted");

        // Every player is in: voting opens without waiting for the judge.
        // The count comes from the log as written, not from this action's
        // first read, since a rival submission may have landed in between.
        let current = self.submissions.list_round(game_id, session.round).await?;
        if current.value.len() >= session.participant_count() - 1 {
            self.open_voting(game_id, session.round).await?;
        }

        Ok(SubmittedCaption {
            submission_id: entry.id,
            next_caption_id,
        })
    }

    /// Appends a submission, refreshing the log version on conflicts.
    ///
    /// This runs after the caption stack swap, so validation must not re-run
    /// from scratch: a conflict here only means the log grew, and the append
    /// is re-driven against the fresh version.
    async fn append_submission(
        &self,
        game_id: &str,
        round: u32,
        mut log_version: u64,
        entry: &Submission,
    ) -> Result<()> {
        for _ in 0..CAS_ATTEMPTS {
            match self.submissions.append(game_id, log_version, entry).await {
                Ok(()) => return Ok(()),
                Err(GameError::VersionConflict) => {
                    log_version = self.submissions.list_round(game_id, round).await?.version;
                }
                Err(err) => return Err(err),
            }
        }
        Err(GameError::storage("submission log under contention"))
    }

    async fn open_voting(&self, game_id: &str, round: u32) -> Result<()> {
        for _ in 0..CAS_ATTEMPTS {
            let loaded = self.sessions.load(game_id).await?;
            let mut session = loaded.value;
            if session.status != GameStatus::Deciding || session.round != round {
                // Someone else already moved the session on.
                return Ok(());
            }
            session.begin_voting(Utc::now())?;
            match self.sessions.compare_and_swap(loaded.version, &session).await {
                Ok(()) => {
                    tracing::info!(game_id, round, "voting opened");
                    return Ok(());
                }
                Err(GameError::VersionConflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(GameError::VersionConflict)
    }

    /// Swaps one of the caller's active captions for the next card without
    /// submitting it.
    ///
    /// The caption stack's advisory `lock_owner` is held across the two-step
    /// sequence so two concurrent discards cannot interleave on the cursor.
    pub async fn discard_caption(
        &self,
        actor_id: &str,
        game_id: &str,
        caption_id: &str,
    ) -> Result<String> {
        let session = self.sessions.load(game_id).await?.value;
        session.ensure_not_ended()?;
        session.require_participant(actor_id)?;

        self.lock_caption_stack(game_id, actor_id).await?;
        let outcome = self.discard_locked(game_id, actor_id, caption_id).await;
        if outcome.is_err() {
            // The success path releases the lock in the same write as the
            // mutation; failure paths must not leave it behind.
            if let Err(unlock_err) = self.unlock_caption_stack(game_id, actor_id).await {
                tracing::warn!(game_id, error = %unlock_err, "failed to release discard lock");
            }
        }
        outcome
    }

    async fn lock_caption_stack(&self, game_id: &str, owner: &str) -> Result<()> {
        for _ in 0..CAS_ATTEMPTS {
            let loaded = self.stacks.load(game_id, CardStackKind::Caption).await?;
            let mut stack = loaded.value;
            stack.acquire_lock(owner)?;
            match self
                .stacks
                .compare_and_swap(game_id, loaded.version, &stack)
                .await
            {
                Ok(()) => return Ok(()),
                Err(GameError::VersionConflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(GameError::VersionConflict)
    }

    async fn unlock_caption_stack(&self, game_id: &str, owner: &str) -> Result<()> {
        for _ in 0..CAS_ATTEMPTS {
            let loaded = self.stacks.load(game_id, CardStackKind::Caption).await?;
            let mut stack = loaded.value;
            stack.release_lock(owner);
            match self
                .stacks
                .compare_and_swap(game_id, loaded.version, &stack)
                .await
            {
                Ok(()) => return Ok(()),
                Err(GameError::VersionConflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(GameError::VersionConflict)
    }

    async fn discard_locked(
        &self,
        game_id: &str,
        actor_id: &str,
        caption_id: &str,
    ) -> Result<String> {
        for _ in 0..CAS_ATTEMPTS {
            let loaded = self.stacks.load(game_id, CardStackKind::Caption).await?;
            let mut stack = loaded.value;
            let next_caption_id = stack.replace_active(actor_id, caption_id)?;
            stack.release_lock(actor_id);
            match self
                .stacks
                .compare_and_swap(game_id, loaded.version, &stack)
                .await
            {
                Ok(()) => {
                    tracing::debug!(game_id, actor_id, "caption discarded");
                    return Ok(next_caption_id);
                }
                Err(GameError::VersionConflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(GameError::VersionConflict)
    }

    // === Voting ===

    /// The judge's explicit "start voting" before every player has
    /// submitted.
    pub async fn start_voting(&self, actor_id: &str, game_id: &str) -> Result<()> {
        for _ in 0..CAS_ATTEMPTS {
            let loaded = self.sessions.load(game_id).await?;
            let mut session = loaded.value;
            session.begin_voting_as(actor_id, Utc::now())?;
            match self.sessions.compare_and_swap(loaded.version, &session).await {
                Ok(()) => {
                    tracing::info!(game_id, round = session.round, "voting opened by judge");
                    return Ok(());
                }
                Err(GameError::VersionConflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(GameError::VersionConflict)
    }

    /// Casts a point-weighted vote on a round submission.
    ///
    /// Budgets are recomputed from the round's vote log on every call, and
    /// the vote is written with the log version the checks ran against, so a
    /// rival vote in between forces a fresh read instead of slipping past
    /// the budget. The judge casts exactly one vote, and that vote closes
    /// the round: the winner is credited, the judge role rotates, the image
    /// cursor advances and the session moves to the next round or ends.
    pub async fn submit_vote(
        &self,
        actor_id: &str,
        game_id: &str,
        caption_id: &str,
        amount: u64,
    ) -> Result<()> {
        for _ in 0..CAS_ATTEMPTS {
            match self
                .try_submit_vote(actor_id, game_id, caption_id, amount)
                .await
            {
                Err(GameError::VersionConflict) => continue,
                outcome => return outcome,
            }
        }
        Err(GameError::VersionConflict)
    }

    async fn try_submit_vote(
        &self,
        actor_id: &str,
        game_id: &str,
        caption_id: &str,
        amount: u64,
    ) -> Result<()> {
        let session = self.sessions.load(game_id).await?.value;
        session.ensure_not_ended()?;
        let actor = session.require_participant(actor_id)?;
        if session.status != GameStatus::Voting {
            return Err(GameError::wrong_phase(
                GameStatus::Voting.to_string(),
                session.status,
            ));
        }
        if amount == 0 || amount % self.config.vote_increment != 0 {
            return Err(GameError::InvalidPointAmount {
                amount,
                increment: self.config.vote_increment,
            });
        }

        let round = session.round;
        let loaded_log = self.submissions.list_round(game_id, round).await?;
        let mut target = loaded_log
            .value
            .iter()
            .find(|s| s.caption_id == caption_id)
            .cloned()
            .ok_or_else(|| GameError::not_found("submission", caption_id))?;

        let is_judge = actor.role == Role::Judge;
        if is_judge && submission::has_voted(&loaded_log.value, actor_id) {
            return Err(GameError::AlreadyVoted);
        }

        let budget = self.config.vote_budget(actor.role, session.participant_count());
        let spent = submission::points_spent_by(&loaded_log.value, actor_id);
        if spent + amount > budget {
            return Err(GameError::BudgetExceeded {
                amount,
                remaining: budget - spent,
            });
        }

        let caption_stack = self.stacks.load(game_id, CardStackKind::Caption).await?.value;
        if caption_stack.assignee_of(caption_id)?.as_deref() == Some(actor_id) {
            return Err(GameError::SelfVoteForbidden);
        }

        target.add_vote(actor_id, amount, Utc::now());
        // The log swap is the serialization point: every check above ran
        // against the version this write carries, and nothing was written
        // before it, so a conflict re-runs the whole vote from scratch.
        self.submissions
            .compare_and_swap(game_id, loaded_log.version, &target)
            .await?;
        tracing::debug!(game_id, round, amount, judge = is_judge, "vote recorded");

        if is_judge {
            self.resolve_round(game_id, round, &caption_stack).await?;
        }
        Ok(())
    }

    /// Closes the round after the judge's vote: tallies, credits the winner,
    /// rotates the judge, advances the image deck and either opens the next
    /// round or ends the game.
    async fn resolve_round(
        &self,
        game_id: &str,
        round: u32,
        caption_stack: &CardStack,
    ) -> Result<()> {
        // Re-list so the judge's own vote is part of the tally.
        let round_submissions = self.submissions.list_round(game_id, round).await?.value;
        let winner_entry = submission::winning_submission(&round_submissions)
            .ok_or_else(|| GameError::storage("voting round closed without submissions"))?;
        let winning_caption_id = winner_entry.caption_id.clone();
        let winner_total = winner_entry.total_points();
        let winner_id = caption_stack
            .assignee_of(&winning_caption_id)?
            .ok_or_else(|| GameError::storage("winning caption has no owner"))?;

        // Advance the image deck; exhaustion is the game-ending signal, not
        // a failure of the vote.
        let (round_image, deck_exhausted) = self.advance_image_deck(game_id).await?;

        for _ in 0..CAS_ATTEMPTS {
            let loaded = self.sessions.load(game_id).await?;
            let mut session = loaded.value;
            if session.round != round || session.status != GameStatus::Voting {
                // A concurrent resolution attempt already applied this.
                return Ok(());
            }

            let wins = session.credit_win(&winner_id, &winning_caption_id, &round_image, winner_total)?;
            session.rotate_judge()?;

            let now = Utc::now();
            if wins >= self.config.wins_to_end {
                let winner_name = session
                    .participant(&winner_id)
                    .map(|p| p.display_name.clone())
                    .unwrap_or_else(|| winner_id.clone());
                session.end(format!("{winner_name} won the game"), now)?;
            } else if deck_exhausted {
                session.end("the image deck is exhausted", now)?;
            } else {
                session.next_round(now)?;
            }

            match self.sessions.compare_and_swap(loaded.version, &session).await {
                Ok(()) => {
                    tracing::info!(
                        game_id,
                        round,
                        winner = %winner_id,
                        points = winner_total,
                        status = %session.status,
                        "round resolved"
                    );
                    return Ok(());
                }
                Err(GameError::VersionConflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(GameError::VersionConflict)
    }

    /// Moves the image cursor to the next round's image.
    ///
    /// Returns the image that was just judged and whether the deck ran out.
    async fn advance_image_deck(&self, game_id: &str) -> Result<(String, bool)> {
        for _ in 0..CAS_ATTEMPTS {
            let loaded = self.stacks.load(game_id, CardStackKind::Image).await?;
            let mut images = loaded.value;
            let judged_image = images.current_image()?.to_string();
            match images.advance_image() {
                Ok(()) => {}
                Err(GameError::DeckExhausted) => return Ok((judged_image, true)),
                Err(err) => return Err(err),
            }
            match self
                .stacks
                .compare_and_swap(game_id, loaded.version, &images)
                .await
            {
                Ok(()) => return Ok((judged_image, false)),
                Err(GameError::VersionConflict) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(GameError::VersionConflict)
    }

    // === Read surface ===

    /// The caller's current hand of active captions.
    pub async fn active_captions(&self, actor_id: &str, game_id: &str) -> Result<Vec<String>> {
        let session = self.sessions.load(game_id).await?.value;
        session.require_participant(actor_id)?;
        let stack = self.stacks.load(game_id, CardStackKind::Caption).await?.value;
        stack.active_captions(actor_id)
    }

    /// The image the current round is captioning.
    pub async fn current_round_image(&self, game_id: &str) -> Result<String> {
        let stack = self.stacks.load(game_id, CardStackKind::Image).await?.value;
        Ok(stack.current_image()?.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memeclash_core::session::GameSession;

    const SEED: u64 = 7;

    async fn setup(players: &[(&str, &str)]) -> (GameUseCase, Arc<MemoryGameStore>, CreatedGame) {
        setup_with_config(players, GameConfig::default()).await
    }

    async fn setup_with_config(
        players: &[(&str, &str)],
        config: GameConfig,
    ) -> (GameUseCase, Arc<MemoryGameStore>, CreatedGame) {
        let store = Arc::new(MemoryGameStore::seeded(400, 40));
        let usecase = GameUseCase::with_store(store.clone(), config);
        let created = usecase.create_game(players[0].0, players[0].1).await.unwrap();
        for (user_id, nickname) in &players[1..] {
            usecase
                .join_game(user_id, nickname, &created.join_code)
                .await
                .unwrap();
        }
        (usecase, store, created)
    }

    async fn started(players: &[(&str, &str)]) -> (GameUseCase, Arc<MemoryGameStore>, String) {
        let (usecase, store, created) = setup(players).await;
        let mut rng = StdRng::seed_from_u64(SEED);
        usecase
            .start_game_with_rng(players[0].0, &created.game_id, &mut rng)
            .await
            .unwrap();
        (usecase, store, created.game_id)
    }

    fn trio() -> Vec<(&'static str, &'static str)> {
        vec![("alice", "Alice"), ("bob", "Bob"), ("carol", "Carol")]
    }

    fn quartet() -> Vec<(&'static str, &'static str)> {
        vec![
            ("alice", "Alice"),
            ("bob", "Bob"),
            ("carol", "Carol"),
            ("dave", "Dave"),
        ]
    }

    async fn load_session(store: &MemoryGameStore, game_id: &str) -> GameSession {
        SessionRepository::load(store, game_id).await.unwrap().value
    }

    /// Drives the session into `Voting` by having every player submit their
    /// first active caption. Returns submitted caption ids by user.
    async fn all_players_submit(
        usecase: &GameUseCase,
        store: &MemoryGameStore,
        game_id: &str,
    ) -> Vec<(String, String)> {
        let session = load_session(store, game_id).await;
        let judge_id = session.judge().unwrap().user_id.clone();
        let mut submitted = Vec::new();
        for participant in &session.participants {
            if participant.user_id == judge_id {
                continue;
            }
            let hand = usecase
                .active_captions(&participant.user_id, game_id)
                .await
                .unwrap();
            usecase
                .submit_caption(&participant.user_id, game_id, &hand[0])
                .await
                .unwrap();
            submitted.push((participant.user_id.clone(), hand[0].clone()));
        }
        submitted
    }

    #[tokio::test]
    async fn test_create_allocates_increasing_join_codes() {
        let store = Arc::new(MemoryGameStore::seeded(400, 40));
        let usecase = GameUseCase::with_store(store, GameConfig::default());
        let first = usecase.create_game("alice", "Alice").await.unwrap();
        let second = usecase.create_game("bob", "Bob").await.unwrap();
        assert_eq!(first.join_code, "0000");
        assert_eq!(second.join_code, "0001");
        assert_ne!(first.game_id, second.game_id);
    }

    #[tokio::test]
    async fn test_join_unknown_code_fails() {
        let (usecase, _store, _created) = setup(&trio()).await;
        let err = usecase.join_game("dave", "Dave", "ZZZZ").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let (usecase, store, created) = setup(&trio()).await;
        let game_id = usecase
            .join_game("bob", "Bob again", &created.join_code)
            .await
            .unwrap();
        assert_eq!(game_id, created.game_id);
        assert_eq!(load_session(&store, &created.game_id).await.participant_count(), 3);
    }

    #[tokio::test]
    async fn test_start_allocates_sized_stacks() {
        let (usecase, store, game_id) = started(&trio()).await;

        let session = load_session(&store, &game_id).await;
        assert_eq!(session.status, GameStatus::Deciding);
        assert_eq!(session.round, 1);

        // 10 active captions per participant, cursor past the dealt hands.
        let captions = CardStackRepository::load(&*store, &game_id, CardStackKind::Caption)
            .await
            .unwrap()
            .value;
        assert_eq!(captions.cursor(), 30);
        assert_eq!(captions.len(), 120);
        for (user_id, _) in trio() {
            assert_eq!(usecase.active_captions(user_id, &game_id).await.unwrap().len(), 10);
        }

        let images = CardStackRepository::load(&*store, &game_id, CardStackKind::Image)
            .await
            .unwrap()
            .value;
        assert_eq!(images.len(), 15);
        assert_eq!(images.cursor(), 0);
        assert!(usecase.current_round_image(&game_id).await.unwrap().starts_with("image-"));
    }

    #[tokio::test]
    async fn test_start_needs_three_participants() {
        let (usecase, _store, created) = setup(&trio()[..2]).await;
        let err = usecase.start_game("alice", &created.game_id).await.unwrap_err();
        assert_eq!(
            err,
            GameError::NotEnoughParticipants {
                required: 3,
                actual: 2
            }
        );
    }

    #[tokio::test]
    async fn test_start_fails_on_small_asset_pool() {
        let store = Arc::new(MemoryGameStore::seeded(100, 40));
        let usecase = GameUseCase::with_store(store, GameConfig::default());
        let created = usecase.create_game("alice", "Alice").await.unwrap();
        usecase.join_game("bob", "Bob", &created.join_code).await.unwrap();
        usecase.join_game("carol", "Carol", &created.join_code).await.unwrap();

        let err = usecase.start_game("alice", &created.game_id).await.unwrap_err();
        assert_eq!(
            err,
            GameError::InsufficientResources {
                required: 120,
                available: 100
            }
        );
    }

    #[tokio::test]
    async fn test_submit_caption_replaces_hand_and_opens_voting() {
        let (usecase, store, game_id) = started(&trio()).await;

        let hand = usecase.active_captions("bob", &game_id).await.unwrap();
        let submitted = usecase
            .submit_caption("bob", &game_id, &hand[0])
            .await
            .unwrap();

        let new_hand = usecase.active_captions("bob", &game_id).await.unwrap();
        assert_eq!(new_hand.len(), 10);
        assert!(!new_hand.contains(&hand[0]));
        assert!(new_hand.contains(&submitted.next_caption_id));

        // One player in, one to go: still deciding.
        assert_eq!(load_session(&store, &game_id).await.status, GameStatus::Deciding);

        let carol_hand = usecase.active_captions("carol", &game_id).await.unwrap();
        usecase
            .submit_caption("carol", &game_id, &carol_hand[0])
            .await
            .unwrap();

        // All non-judges submitted: voting opened automatically.
        assert_eq!(load_session(&store, &game_id).await.status, GameStatus::Voting);
    }

    #[tokio::test]
    async fn test_judge_cannot_submit() {
        let (usecase, _store, game_id) = started(&trio()).await;
        let hand = usecase.active_captions("alice", &game_id).await.unwrap();
        let err = usecase
            .submit_caption("alice", &game_id, &hand[0])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GameError::WrongRole {
                required: "player".into()
            }
        );
    }

    #[tokio::test]
    async fn test_submit_requires_own_active_card() {
        let (usecase, _store, game_id) = started(&trio()).await;
        let bobs = usecase.active_captions("bob", &game_id).await.unwrap();
        let err = usecase
            .submit_caption("carol", &game_id, &bobs[0])
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::CardNotActive { .. }));

        let err = usecase
            .submit_caption("mallory", &game_id, &bobs[0])
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::NotParticipant { .. }));
    }

    #[tokio::test]
    async fn test_second_submission_same_round_is_rejected() {
        // Four participants so one submission leaves the game deciding.
        let (usecase, _store, game_id) = started(&quartet()).await;
        let hand = usecase.active_captions("bob", &game_id).await.unwrap();
        usecase.submit_caption("bob", &game_id, &hand[0]).await.unwrap();

        let hand = usecase.active_captions("bob", &game_id).await.unwrap();
        let err = usecase
            .submit_caption("bob", &game_id, &hand[0])
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::AlreadySubmitted { .. }));
    }

    #[tokio::test]
    async fn test_discard_swaps_the_card() {
        let (usecase, store, game_id) = started(&trio()).await;
        let hand = usecase.active_captions("bob", &game_id).await.unwrap();

        let next = usecase
            .discard_caption("bob", &game_id, &hand[3])
            .await
            .unwrap();

        let new_hand = usecase.active_captions("bob", &game_id).await.unwrap();
        assert_eq!(new_hand.len(), 10);
        assert!(!new_hand.contains(&hand[3]));
        assert!(new_hand.contains(&next));

        // No submission was recorded, and the lock is back off.
        let session = load_session(&store, &game_id).await;
        assert!(SubmissionRepository::list_round(&*store, &game_id, session.round)
            .await
            .unwrap()
            .value
            .is_empty());
        let stack = CardStackRepository::load(&*store, &game_id, CardStackKind::Caption)
            .await
            .unwrap()
            .value;
        assert_eq!(stack.cursor(), 31);
        stack.active_captions("bob").unwrap();
    }

    #[tokio::test]
    async fn test_discard_respects_foreign_lock() {
        let (usecase, store, game_id) = started(&trio()).await;

        // Another writer parked its lock on the stack.
        let loaded = CardStackRepository::load(&*store, &game_id, CardStackKind::Caption)
            .await
            .unwrap();
        let mut stack = loaded.value;
        stack.acquire_lock("someone-else").unwrap();
        CardStackRepository::compare_and_swap(&*store, &game_id, loaded.version, &stack)
            .await
            .unwrap();

        let hand = usecase.active_captions("bob", &game_id).await.unwrap();
        let err = usecase
            .discard_caption("bob", &game_id, &hand[0])
            .await
            .unwrap_err();
        assert_eq!(err, GameError::StackLocked);
    }

    #[tokio::test]
    async fn test_discard_failure_releases_lock() {
        let (usecase, _store, game_id) = started(&trio()).await;
        let err = usecase
            .discard_caption("bob", &game_id, "not-a-card")
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::CardNotActive { .. }));

        // The failed discard must not wedge the stack for later discards.
        let hand = usecase.active_captions("bob", &game_id).await.unwrap();
        usecase.discard_caption("bob", &game_id, &hand[0]).await.unwrap();
    }

    #[tokio::test]
    async fn test_start_voting_is_judge_only() {
        let (usecase, store, game_id) = started(&trio()).await;
        let err = usecase.start_voting("bob", &game_id).await.unwrap_err();
        assert_eq!(
            err,
            GameError::WrongRole {
                required: "judge".into()
            }
        );
        usecase.start_voting("alice", &game_id).await.unwrap();
        assert_eq!(load_session(&store, &game_id).await.status, GameStatus::Voting);
    }

    #[tokio::test]
    async fn test_vote_requires_voting_phase() {
        let (usecase, _store, game_id) = started(&trio()).await;
        let err = usecase
            .submit_vote("alice", &game_id, "caption-000", 100)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::WrongPhase { .. }));
    }

    #[tokio::test]
    async fn test_vote_amount_must_be_positive_increment() {
        let (usecase, store, game_id) = started(&trio()).await;
        let submitted = all_players_submit(&usecase, &store, &game_id).await;
        let target = &submitted[0].1;

        for bad in [0, 150, 1] {
            let err = usecase
                .submit_vote("alice", &game_id, target, bad)
                .await
                .unwrap_err();
            assert!(matches!(err, GameError::InvalidPointAmount { .. }), "amount {bad}");
        }
    }

    #[tokio::test]
    async fn test_player_budget_is_enforced() {
        // Four participants: player budget is min(3000, 500 × 2) = 1000.
        let (usecase, store, game_id) = started(&quartet()).await;
        let submitted = all_players_submit(&usecase, &store, &game_id).await;

        // Bob votes on a caption that is not his own.
        let target = submitted
            .iter()
            .find(|(user, _)| user != "bob")
            .map(|(_, caption)| caption.clone())
            .unwrap();

        let err = usecase
            .submit_vote("bob", &game_id, &target, 1100)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GameError::BudgetExceeded {
                amount: 1100,
                remaining: 1000
            }
        );

        usecase.submit_vote("bob", &game_id, &target, 1000).await.unwrap();

        // The budget is cumulative across the round, not per vote.
        let err = usecase
            .submit_vote("bob", &game_id, &target, 100)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            GameError::BudgetExceeded {
                amount: 100,
                remaining: 0
            }
        );
    }

    #[tokio::test]
    async fn test_self_vote_is_forbidden() {
        let (usecase, store, game_id) = started(&trio()).await;
        let submitted = all_players_submit(&usecase, &store, &game_id).await;
        let (user, caption) = &submitted[0];
        let err = usecase
            .submit_vote(user, &game_id, caption, 100)
            .await
            .unwrap_err();
        assert_eq!(err, GameError::SelfVoteForbidden);
    }

    #[tokio::test]
    async fn test_judge_vote_resolves_the_round() {
        let (usecase, store, game_id) = started(&trio()).await;
        let submitted = all_players_submit(&usecase, &store, &game_id).await;
        let (winner_id, winning_caption) = submitted[0].clone();

        // Judge budget for three participants is 1000 × 3; 1500 fits.
        usecase
            .submit_vote("alice", &game_id, &winning_caption, 1500)
            .await
            .unwrap();

        let session = load_session(&store, &game_id).await;
        assert_eq!(session.status, GameStatus::Deciding);
        assert_eq!(session.round, 2);
        // Judge rotated to the next participant in roster order.
        assert_eq!(session.judge().unwrap().user_id, "bob");

        let winner = session.participant(&winner_id).unwrap();
        assert_eq!(winner.points, 1500);
        assert_eq!(winner.wins.len(), 1);
        assert_eq!(winner.wins[0].winning_entry_id, winning_caption);
        assert_eq!(winner.wins[0].round, 1);

        // The image deck moved on with the round.
        let images = CardStackRepository::load(&*store, &game_id, CardStackKind::Image)
            .await
            .unwrap()
            .value;
        assert_eq!(images.cursor(), 1);
    }

    #[tokio::test]
    async fn test_judge_votes_exactly_once_per_round() {
        let (usecase, store, game_id) = started(&trio()).await;
        let submitted = all_players_submit(&usecase, &store, &game_id).await;
        let target = submitted[0].1.clone();

        usecase.submit_vote("alice", &game_id, &target, 1500).await.unwrap();
        let after_first = load_session(&store, &game_id).await;

        // The round already resolved, so the retry fails on phase; a judge
        // repeating inside the same voting window fails with AlreadyVoted.
        let err = usecase
            .submit_vote("alice", &game_id, &target, 1500)
            .await
            .unwrap_err();
        assert!(matches!(err, GameError::WrongPhase { .. }));

        let unchanged = load_session(&store, &game_id).await;
        assert_eq!(unchanged.round, after_first.round);
        assert_eq!(unchanged.status, after_first.status);
    }

    #[tokio::test]
    async fn test_player_may_vote_repeatedly_within_budget() {
        let (usecase, store, game_id) = started(&quartet()).await;
        let submitted = all_players_submit(&usecase, &store, &game_id).await;

        let foreign = submitted
            .iter()
            .find(|(user, _)| user != "bob")
            .map(|(_, c)| c.clone())
            .unwrap();
        usecase.submit_vote("bob", &game_id, &foreign, 500).await.unwrap();
        usecase.submit_vote("bob", &game_id, &foreign, 500).await.unwrap();

        let log = SubmissionRepository::list_round(&*store, &game_id, 1)
            .await
            .unwrap();
        assert_eq!(submission::points_spent_by(&log.value, "bob"), 1000);
        assert!(!submission::has_voted(&log.value, "alice"));
    }

    #[tokio::test]
    async fn test_judge_with_a_recorded_vote_gets_already_voted() {
        let (usecase, store, game_id) = started(&quartet()).await;
        let submitted = all_players_submit(&usecase, &store, &game_id).await;

        // The judge's vote is already in the round's log, but the round has
        // not resolved (the resolving writer died mid-action).
        let log = SubmissionRepository::list_round(&*store, &game_id, 1)
            .await
            .unwrap();
        let mut target = log
            .value
            .iter()
            .find(|s| s.caption_id == submitted[0].1)
            .unwrap()
            .clone();
        target.add_vote("alice", 100, Utc::now());
        SubmissionRepository::compare_and_swap(&*store, &game_id, log.version, &target)
            .await
            .unwrap();

        let err = usecase
            .submit_vote("alice", &game_id, &submitted[1].1, 100)
            .await
            .unwrap_err();
        assert_eq!(err, GameError::AlreadyVoted);

        // Nothing moved: same round, still voting.
        let session = load_session(&store, &game_id).await;
        assert_eq!(session.status, GameStatus::Voting);
        assert_eq!(session.round, 1);
    }

    #[tokio::test]
    async fn test_auto_open_counts_the_log_as_written() {
        let (usecase, store, game_id) = started(&trio()).await;

        // Entries a rival writer appended after this writer's first read
        // still count toward the all-players-in threshold.
        let carol_hand = usecase.active_captions("carol", &game_id).await.unwrap();
        let log = SubmissionRepository::list_round(&*store, &game_id, 1)
            .await
            .unwrap();
        SubmissionRepository::append(
            &*store,
            &game_id,
            log.version,
            &Submission::new("rival-1", &carol_hand[0], 1, Utc::now()),
        )
        .await
        .unwrap();
        SubmissionRepository::append(
            &*store,
            &game_id,
            log.version + 1,
            &Submission::new("rival-2", &carol_hand[1], 1, Utc::now()),
        )
        .await
        .unwrap();

        let bob_hand = usecase.active_captions("bob", &game_id).await.unwrap();
        usecase
            .submit_caption("bob", &game_id, &bob_hand[0])
            .await
            .unwrap();

        assert_eq!(load_session(&store, &game_id).await.status, GameStatus::Voting);
    }

    #[tokio::test]
    async fn test_game_ends_when_image_deck_runs_out() {
        // One image per participant: a three-image deck supports only the
        // first two round advances before exhausting.
        let config = GameConfig {
            images_per_participant: 1,
            ..GameConfig::default()
        };
        let (usecase, store, created) = setup_with_config(&trio(), config).await;
        let game_id = created.game_id;
        let mut rng = StdRng::seed_from_u64(SEED);
        usecase
            .start_game_with_rng("alice", &game_id, &mut rng)
            .await
            .unwrap();

        for round in 1..=3u32 {
            let session = load_session(&store, &game_id).await;
            assert_eq!(session.round, round);
            let judge = session.judge().unwrap().user_id.clone();
            let submitted = all_players_submit(&usecase, &store, &game_id).await;
            usecase
                .submit_vote(&judge, &game_id, &submitted[0].1, 100)
                .await
                .unwrap();
        }

        let session = load_session(&store, &game_id).await;
        assert_eq!(session.status, GameStatus::Ended);
        assert!(session.ended_at.is_some());
        assert_eq!(
            session.status_message.as_deref(),
            Some("the image deck is exhausted")
        );

        // Terminal: every further action is refused.
        let err = usecase.start_voting("alice", &game_id).await.unwrap_err();
        assert_eq!(err, GameError::GameEnded);
    }
}
