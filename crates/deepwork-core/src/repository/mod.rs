//! Persistence boundary for sessions and interruptions.
//!
//! The repository is the source of truth: every operation returns the
//! authoritative record, and the controller reconciles its local copy with
//! it after each transition.

mod http;
mod memory;

pub use http::HttpSessionRepository;
pub use memory::InMemorySessionRepository;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RepositoryError;
use crate::session::{HistoryEntry, Interruption, NewSession, Session};

/// Status change persisted through [`SessionRepository::update`].
///
/// Pausing is not a patch: it goes through
/// [`SessionRepository::create_interruption`], the only way interruptions
/// come into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPatch {
    Start,
    Resume,
    Complete,
    MarkOverdue,
}

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn list(&self) -> Result<Vec<Session>, RepositoryError>;

    async fn get(&self, id: i64) -> Result<Session, RepositoryError>;

    async fn create(&self, fields: &NewSession) -> Result<Session, RepositoryError>;

    async fn update(&self, id: i64, patch: SessionPatch) -> Result<Session, RepositoryError>;

    async fn list_interruptions(&self, session_id: i64)
        -> Result<Vec<Interruption>, RepositoryError>;

    /// Pause the session and log why.
    async fn create_interruption(
        &self,
        session_id: i64,
        reason: &str,
    ) -> Result<Interruption, RepositoryError>;

    /// Per-session summary rows (pause count, completion ratio).
    async fn history(&self) -> Result<Vec<HistoryEntry>, RepositoryError>;
}
