//! Session domain model.
//!
//! A [`GameSession`] is one complete game instance from creation to end: the
//! participant roster, the lifecycle status, the round counter and the
//! timestamps. The lifecycle transition rules live here as methods so that
//! every mutation path enforces the same preconditions; the action layer only
//! sequences repository reads and writes around them.

use crate::cardstack::CardStackKind;
use crate::error::{GameError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a participant within a session.
///
/// Exactly one participant holds the judge role at any time while the game is
/// running; the role rotates through the roster in join order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    Judge,
    Player,
}

/// Lifecycle status of a session.
///
/// `Waiting → Deciding ⇄ Voting → Ended`, with `Paused` as an orthogonal
/// suspend state reachable from `Deciding` and `Voting`. `Ended` is terminal.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GameStatus {
    Waiting,
    Deciding,
    Voting,
    Paused,
    Ended,
}

/// One round win in a participant's record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinRecord {
    /// Kind of the entry that won the round (always a caption today).
    pub winning_entry_kind: CardStackKind,
    /// Id of the winning caption.
    pub winning_entry_id: String,
    /// Kind of the entry that was won (always an image today).
    pub won_entry_kind: CardStackKind,
    /// Id of the round image the win was scored against.
    pub won_entry_id: String,
    /// Round in which the win happened.
    pub round: u32,
}

/// A member of the session roster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Identity resolved by the auth collaborator.
    pub user_id: String,
    /// Nickname shown to other participants.
    pub display_name: String,
    /// Cumulative points credited from round wins.
    pub points: u64,
    /// When the participant joined the session.
    pub joined_at: DateTime<Utc>,
    /// Current role; rotates each round once the game is running.
    pub role: Role,
    /// Round wins, in chronological order.
    pub wins: Vec<WinRecord>,
}

impl Participant {
    /// Creates a roster entry with zero points and no wins.
    pub fn new(
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        role: Role,
        joined_at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
            points: 0,
            joined_at,
            role,
            wins: Vec::new(),
        }
    }
}

/// The aggregate game record.
///
/// The engine holds no state between actions; a `GameSession` is loaded from
/// the repository, mutated through the methods below and written back with a
/// compare-and-swap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    /// Unique session identifier.
    pub id: String,
    /// 4-character base-36 join code, unique among live sessions.
    pub join_code: String,
    /// Identity of the participant who created the session.
    pub creator_id: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the game left `Waiting`, if it has.
    pub started_at: Option<DateTime<Utc>>,
    /// When the game reached `Ended`, if it has.
    pub ended_at: Option<DateTime<Utc>>,
    /// Current lifecycle status.
    pub status: GameStatus,
    /// When `status` last changed.
    pub status_changed_at: DateTime<Utc>,
    /// Human-readable note recorded on game end.
    pub status_message: Option<String>,
    /// Status to return to on resume while `Paused`.
    pub paused_from: Option<GameStatus>,
    /// Elapsed milliseconds of each completed pause, for time-budget
    /// accounting.
    pub paused_durations: Vec<i64>,
    /// Round counter: 0 while waiting, 1 from the first round on.
    pub round: u32,
    /// Roster in join order, unique by `user_id`.
    pub participants: Vec<Participant>,
}

impl GameSession {
    /// Creates a session in `Waiting` with the creator as sole participant
    /// and initial judge.
    pub fn new(
        id: impl Into<String>,
        join_code: impl Into<String>,
        creator_id: impl Into<String>,
        display_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let creator_id = creator_id.into();
        Self {
            id: id.into(),
            join_code: join_code.into(),
            creator_id: creator_id.clone(),
            created_at: now,
            started_at: None,
            ended_at: None,
            status: GameStatus::Waiting,
            status_changed_at: now,
            status_message: None,
            paused_from: None,
            paused_durations: Vec::new(),
            round: 0,
            participants: vec![Participant::new(creator_id, display_name, Role::Judge, now)],
        }
    }

    // === Roster ===

    /// Number of participants in the roster.
    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    /// Looks up a participant by identity.
    pub fn participant(&self, user_id: &str) -> Option<&Participant> {
        self.participants.iter().find(|p| p.user_id == user_id)
    }

    /// Mutable participant lookup.
    pub fn participant_mut(&mut self, user_id: &str) -> Option<&mut Participant> {
        self.participants.iter_mut().find(|p| p.user_id == user_id)
    }

    /// Whether the identity is in the roster.
    pub fn is_participant(&self, user_id: &str) -> bool {
        self.participant(user_id).is_some()
    }

    /// Returns the participant or `NotParticipant`.
    pub fn require_participant(&self, user_id: &str) -> Result<&Participant> {
        self.participant(user_id)
            .ok_or_else(|| GameError::not_participant(user_id))
    }

    /// The current judge, if the game has one.
    pub fn judge(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.role == Role::Judge)
    }

    /// Adds the identity to the roster as a player.
    ///
    /// Deliberately lenient for retry-tolerant clients: joining a session
    /// that already started, or re-joining, succeeds without mutation.
    /// Returns whether the roster actually changed.
    pub fn join(
        &mut self,
        user_id: impl Into<String>,
        display_name: impl Into<String>,
        now: DateTime<Utc>,
    ) -> bool {
        let user_id = user_id.into();
        if self.status != GameStatus::Waiting || self.is_participant(&user_id) {
            return false;
        }
        self.participants
            .push(Participant::new(user_id, display_name, Role::Player, now));
        true
    }

    // === Lifecycle ===

    /// Fails with `GameEnded` once the session is terminal.
    pub fn ensure_not_ended(&self) -> Result<()> {
        if self.status == GameStatus::Ended {
            return Err(GameError::GameEnded);
        }
        Ok(())
    }

    fn set_status(&mut self, status: GameStatus, now: DateTime<Utc>) {
        self.status = status;
        self.status_changed_at = now;
    }

    /// `Waiting → Deciding`: starts the game.
    ///
    /// Only the creator may start, and only with a large enough roster. Card
    /// stacks are allocated by the caller at this point; the session itself
    /// records the first round and the start time.
    pub fn start(
        &mut self,
        actor_id: &str,
        min_participants: usize,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.ensure_not_ended()?;
        if actor_id != self.creator_id {
            return Err(GameError::wrong_role("creator"));
        }
        if self.status != GameStatus::Waiting {
            return Err(GameError::wrong_phase(
                GameStatus::Waiting.to_string(),
                self.status,
            ));
        }
        if self.participant_count() < min_participants {
            return Err(GameError::NotEnoughParticipants {
                required: min_participants,
                actual: self.participant_count(),
            });
        }
        self.round = 1;
        self.started_at = Some(now);
        self.set_status(GameStatus::Deciding, now);
        Ok(())
    }

    /// `Deciding → Voting`, triggered when every player has submitted.
    pub fn begin_voting(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_not_ended()?;
        if self.status != GameStatus::Deciding {
            return Err(GameError::wrong_phase(
                GameStatus::Deciding.to_string(),
                self.status,
            ));
        }
        self.set_status(GameStatus::Voting, now);
        Ok(())
    }

    /// `Deciding → Voting` on the judge's explicit request.
    pub fn begin_voting_as(&mut self, actor_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_not_ended()?;
        let actor = self.require_participant(actor_id)?;
        if actor.role != Role::Judge {
            return Err(GameError::wrong_role("judge"));
        }
        self.begin_voting(now)
    }

    /// `Voting → Deciding`: closes the round and opens the next one.
    pub fn next_round(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.ensure_not_ended()?;
        if self.status != GameStatus::Voting {
            return Err(GameError::wrong_phase(
                GameStatus::Voting.to_string(),
                self.status,
            ));
        }
        self.round += 1;
        self.set_status(GameStatus::Deciding, now);
        Ok(())
    }

    /// Moves the session to the terminal `Ended` state.
    pub fn end(&mut self, message: impl Into<String>, now: DateTime<Utc>) -> Result<()> {
        self.ensure_not_ended()?;
        self.ended_at = Some(now);
        self.status_message = Some(message.into());
        self.set_status(GameStatus::Ended, now);
        Ok(())
    }

    /// `Deciding`/`Voting → Paused`, creator only.
    ///
    /// Pause and resume are an extension point: the domain transitions exist
    /// and are tested, but no inbound action drives them yet.
    pub fn pause(&mut self, actor_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_not_ended()?;
        if actor_id != self.creator_id {
            return Err(GameError::wrong_role("creator"));
        }
        if !matches!(self.status, GameStatus::Deciding | GameStatus::Voting) {
            return Err(GameError::wrong_phase("deciding or voting", self.status));
        }
        self.paused_from = Some(self.status);
        self.set_status(GameStatus::Paused, now);
        Ok(())
    }

    /// `Paused →` whatever status the session was paused from, creator only.
    /// Records the elapsed pause interval.
    pub fn resume(&mut self, actor_id: &str, now: DateTime<Utc>) -> Result<()> {
        self.ensure_not_ended()?;
        if actor_id != self.creator_id {
            return Err(GameError::wrong_role("creator"));
        }
        if self.status != GameStatus::Paused {
            return Err(GameError::wrong_phase(
                GameStatus::Paused.to_string(),
                self.status,
            ));
        }
        let resume_to = self.paused_from.take().unwrap_or(GameStatus::Deciding);
        self.paused_durations
            .push((now - self.status_changed_at).num_milliseconds());
        self.set_status(resume_to, now);
        Ok(())
    }

    // === Round resolution ===

    /// Hands the judge role to the next participant in roster order.
    ///
    /// Returns the new judge's identity.
    pub fn rotate_judge(&mut self) -> Result<String> {
        let judge_index = self
            .participants
            .iter()
            .position(|p| p.role == Role::Judge)
            .ok_or_else(|| GameError::storage("session has no judge to rotate"))?;
        self.participants[judge_index].role = Role::Player;
        let next_index = (judge_index + 1) % self.participants.len();
        self.participants[next_index].role = Role::Judge;
        Ok(self.participants[next_index].user_id.clone())
    }

    /// Credits a round win: points plus a win record against the round image.
    ///
    /// Returns the winner's total win count.
    pub fn credit_win(
        &mut self,
        winner_id: &str,
        winning_caption_id: &str,
        round_image_id: &str,
        points: u64,
    ) -> Result<usize> {
        let round = self.round;
        let winner = self
            .participant_mut(winner_id)
            .ok_or_else(|| GameError::not_participant(winner_id))?;
        winner.points += points;
        winner.wins.push(WinRecord {
            winning_entry_kind: CardStackKind::Caption,
            winning_entry_id: winning_caption_id.to_string(),
            won_entry_kind: CardStackKind::Image,
            won_entry_id: round_image_id.to_string(),
            round,
        });
        Ok(winner.wins.len())
    }
}
