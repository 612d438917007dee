use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{CreateError, DeleteError, ReadError, UserID};

/// Persistence of authentication sessions.
///
/// Sessions are keyed by the hash of their bearer token, the token itself is
/// never stored.
#[async_trait]
pub trait SessionRepository: Send + Sync + 'static {
    async fn create_session(&self, token_hash: String, session: Session)
    -> Result<(), CreateError>;
    async fn read_session(&self, token_hash: &str) -> Result<Session, ReadError>;
    async fn delete_session(&self, token_hash: &str) -> Result<(), DeleteError>;
    async fn delete_user_sessions(&self, user_id: UserID) -> Result<usize, DeleteError>;
    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, DeleteError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: UserID,
    pub kind: SessionKind,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    #[must_use]
    pub fn is_valid(&self, kind: SessionKind, now: DateTime<Utc>) -> bool {
        self.kind == kind && self.expires_at > now
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum SessionKind {
    Access,
    Refresh,
}
