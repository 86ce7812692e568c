//! In-memory implementation of the Memeclash repository contracts.
//!
//! [`MemoryGameStore`] keeps every document under a mutex together with a
//! monotonically increasing version counter and rejects compare-and-swap
//! writes whose expected version is stale. That gives the engine the same
//! atomicity granularity a document database provides: single-document
//! read-modify-write, nothing across documents.

use async_trait::async_trait;
use memeclash_core::assets::AssetCatalog;
use memeclash_core::cardstack::{CardStack, CardStackKind, CardStackRepository};
use memeclash_core::error::{GameError, Result};
use memeclash_core::repository::Versioned;
use memeclash_core::session::{GameSession, SessionRepository};
use memeclash_core::submission::{Submission, SubmissionRepository};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// A document plus its current version counter.
#[derive(Debug, Clone)]
struct Document<T> {
    value: T,
    version: u64,
}

impl<T> Document<T> {
    fn initial(value: T) -> Self {
        Self { value, version: 0 }
    }
}

impl<T: Clone> Document<T> {
    fn versioned(&self) -> Versioned<T> {
        Versioned::new(self.value.clone(), self.version)
    }
}

/// In-memory versioned document store backing all four repository traits.
///
/// Intended for tests and single-process embedding; a database-backed
/// implementation replaces it behind the same traits in production. A
/// session's submissions are one versioned log document, so vote writes and
/// submission appends conflict at log granularity.
#[derive(Default)]
pub struct MemoryGameStore {
    sessions: Mutex<HashMap<String, Document<GameSession>>>,
    stacks: Mutex<HashMap<(String, CardStackKind), Document<CardStack>>>,
    /// Submission log per session, in append order.
    submissions: Mutex<HashMap<String, Document<Vec<Submission>>>>,
    captions: Vec<String>,
    images: Vec<String>,
}

impl MemoryGameStore {
    /// Creates an empty store with the given asset pools.
    pub fn with_assets(captions: Vec<String>, images: Vec<String>) -> Self {
        Self {
            captions,
            images,
            ..Self::default()
        }
    }

    /// Creates a store seeded with synthetic `caption-NNN` / `image-NNN`
    /// asset ids, enough for tests.
    pub fn seeded(caption_count: usize, image_count: usize) -> Self {
        Self::with_assets(
            (0..caption_count).map(|i| format!("caption-{i:03}")).collect(),
            (0..image_count).map(|i| format!("image-{i:03}")).collect(),
        )
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> Result<std::sync::MutexGuard<'a, T>> {
        mutex
            .lock()
            .map_err(|_| GameError::storage("store mutex poisoned"))
    }
}

#[async_trait]
impl SessionRepository for MemoryGameStore {
    async fn load(&self, session_id: &str) -> Result<Versioned<GameSession>> {
        let sessions = Self::lock(&self.sessions)?;
        sessions
            .get(session_id)
            .map(Document::versioned)
            .ok_or_else(|| GameError::not_found("session", session_id))
    }

    async fn find_by_code(&self, join_code: &str) -> Result<Versioned<GameSession>> {
        let sessions = Self::lock(&self.sessions)?;
        sessions
            .values()
            .find(|doc| doc.value.join_code == join_code)
            .map(Document::versioned)
            .ok_or_else(|| GameError::not_found("session", join_code))
    }

    async fn insert(&self, session: &GameSession) -> Result<()> {
        let mut sessions = Self::lock(&self.sessions)?;
        if sessions.contains_key(&session.id) {
            return Err(GameError::storage(format!(
                "session '{}' already exists",
                session.id
            )));
        }
        tracing::debug!(session_id = %session.id, join_code = %session.join_code, "insert session");
        sessions.insert(session.id.clone(), Document::initial(session.clone()));
        Ok(())
    }

    async fn compare_and_swap(&self, expected_version: u64, session: &GameSession) -> Result<()> {
        let mut sessions = Self::lock(&self.sessions)?;
        let doc = sessions
            .get_mut(&session.id)
            .ok_or_else(|| GameError::not_found("session", &session.id))?;
        if doc.version != expected_version {
            return Err(GameError::VersionConflict);
        }
        doc.value = session.clone();
        doc.version += 1;
        tracing::debug!(
            session_id = %session.id,
            version = doc.version,
            status = %session.status,
            round = session.round,
            "swap session"
        );
        Ok(())
    }

    async fn allocate_session_id(&self) -> Result<String> {
        Ok(Uuid::new_v4().to_string())
    }

    async fn latest_join_code(&self) -> Result<Option<String>> {
        let sessions = Self::lock(&self.sessions)?;
        Ok(sessions
            .values()
            .map(|doc| doc.value.join_code.clone())
            .max())
    }
}

#[async_trait]
impl CardStackRepository for MemoryGameStore {
    async fn load(&self, session_id: &str, kind: CardStackKind) -> Result<Versioned<CardStack>> {
        let stacks = Self::lock(&self.stacks)?;
        stacks
            .get(&(session_id.to_string(), kind))
            .map(Document::versioned)
            .ok_or_else(|| GameError::not_found("card stack", format!("{session_id}/{kind}")))
    }

    async fn insert(&self, session_id: &str, stack: &CardStack) -> Result<()> {
        let mut stacks = Self::lock(&self.stacks)?;
        tracing::debug!(session_id, kind = %stack.kind(), len = stack.len(), "insert card stack");
        stacks.insert(
            (session_id.to_string(), stack.kind()),
            Document::initial(stack.clone()),
        );
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        session_id: &str,
        expected_version: u64,
        stack: &CardStack,
    ) -> Result<()> {
        let mut stacks = Self::lock(&self.stacks)?;
        let doc = stacks
            .get_mut(&(session_id.to_string(), stack.kind()))
            .ok_or_else(|| {
                GameError::not_found("card stack", format!("{session_id}/{}", stack.kind()))
            })?;
        if doc.version != expected_version {
            return Err(GameError::VersionConflict);
        }
        doc.value = stack.clone();
        doc.version += 1;
        tracing::debug!(
            session_id,
            kind = %stack.kind(),
            version = doc.version,
            cursor = stack.cursor(),
            "swap card stack"
        );
        Ok(())
    }
}

#[async_trait]
impl SubmissionRepository for MemoryGameStore {
    async fn list_round(
        &self,
        session_id: &str,
        round: u32,
    ) -> Result<Versioned<Vec<Submission>>> {
        let submissions = Self::lock(&self.submissions)?;
        Ok(submissions
            .get(session_id)
            .map(|doc| {
                Versioned::new(
                    doc.value
                        .iter()
                        .filter(|s| s.round == round)
                        .cloned()
                        .collect(),
                    doc.version,
                )
            })
            .unwrap_or_else(|| Versioned::new(Vec::new(), 0)))
    }

    async fn append(
        &self,
        session_id: &str,
        expected_version: u64,
        submission: &Submission,
    ) -> Result<()> {
        let mut submissions = Self::lock(&self.submissions)?;
        let doc = submissions
            .entry(session_id.to_string())
            .or_insert_with(|| Document::initial(Vec::new()));
        if doc.version != expected_version {
            return Err(GameError::VersionConflict);
        }
        if doc.value.iter().any(|s| s.id == submission.id) {
            return Err(GameError::storage(format!(
                "submission '{}' already exists",
                submission.id
            )));
        }
        doc.value.push(submission.clone());
        doc.version += 1;
        tracing::debug!(
            session_id,
            submission_id = %submission.id,
            round = submission.round,
            version = doc.version,
            "append submission"
        );
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        session_id: &str,
        expected_version: u64,
        submission: &Submission,
    ) -> Result<()> {
        let mut submissions = Self::lock(&self.submissions)?;
        let doc = submissions
            .get_mut(session_id)
            .ok_or_else(|| GameError::not_found("submission", &submission.id))?;
        if doc.version != expected_version {
            return Err(GameError::VersionConflict);
        }
        let slot = doc
            .value
            .iter_mut()
            .find(|s| s.id == submission.id)
            .ok_or_else(|| GameError::not_found("submission", &submission.id))?;
        *slot = submission.clone();
        doc.version += 1;
        tracing::debug!(
            session_id,
            submission_id = %submission.id,
            version = doc.version,
            "swap submission"
        );
        Ok(())
    }
}

#[async_trait]
impl AssetCatalog for MemoryGameStore {
    async fn caption_ids(&self) -> Result<Vec<String>> {
        Ok(self.captions.clone())
    }

    async fn image_ids(&self) -> Result<Vec<String>> {
        Ok(self.images.clone())
    }
}
