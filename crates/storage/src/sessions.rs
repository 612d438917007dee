use async_trait::async_trait;
use chrono::{DateTime, Utc};
use liftlog_domain::{
    CreateError, DeleteError, ReadError, Session, SessionKind, SessionRepository, UserID,
};
use rusqlite::params;

use crate::{
    Storage,
    db::{affected, conversion_error, datetime_to_text, parse_datetime, parse_uuid},
};

#[async_trait]
impl SessionRepository for Storage {
    async fn create_session(
        &self,
        token_hash: String,
        session: Session,
    ) -> Result<(), CreateError> {
        Ok(self
            .db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (token_hash, user_id, kind, expires_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![
                        token_hash,
                        session.user_id.to_string(),
                        session.kind.as_ref(),
                        datetime_to_text(session.expires_at),
                    ],
                )?;
                Ok(())
            })
            .await?)
    }

    async fn read_session(&self, token_hash: &str) -> Result<Session, ReadError> {
        let token_hash = token_hash.to_string();
        Ok(self
            .db
            .call(move |conn| {
                Ok(conn.query_row(
                    "SELECT user_id, kind, expires_at FROM sessions WHERE token_hash = ?1",
                    [token_hash],
                    |row| {
                        let user_id: String = row.get(0)?;
                        let kind: String = row.get(1)?;
                        let expires_at: String = row.get(2)?;
                        Ok(Session {
                            user_id: parse_uuid(0, &user_id)?.into(),
                            kind: kind
                                .parse::<SessionKind>()
                                .map_err(|err| conversion_error(1, err))?,
                            expires_at: parse_datetime(2, &expires_at)?,
                        })
                    },
                )?)
            })
            .await?)
    }

    async fn delete_session(&self, token_hash: &str) -> Result<(), DeleteError> {
        let token_hash = token_hash.to_string();
        Ok(self
            .db
            .call(move |conn| {
                affected(conn.execute(
                    "DELETE FROM sessions WHERE token_hash = ?1",
                    [token_hash],
                )?)?;
                Ok(())
            })
            .await?)
    }

    async fn delete_user_sessions(&self, user_id: UserID) -> Result<usize, DeleteError> {
        Ok(self
            .db
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM sessions WHERE user_id = ?1",
                    [user_id.to_string()],
                )?)
            })
            .await?)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<usize, DeleteError> {
        Ok(self
            .db
            .call(move |conn| {
                Ok(conn.execute(
                    "DELETE FROM sessions WHERE expires_at <= ?1",
                    [datetime_to_text(now)],
                )?)
            })
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use chrono::{Duration, TimeZone};
    use liftlog_domain::UserRepository;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::tests::{create_user, storage_with_user};

    static NOW: LazyLock<DateTime<Utc>> =
        LazyLock::new(|| Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());

    fn session(user_id: UserID, kind: SessionKind, remaining: Duration) -> Session {
        Session {
            user_id,
            kind,
            expires_at: *NOW + remaining,
        }
    }

    #[tokio::test]
    async fn test_create_and_read_session() {
        let (storage, user) = storage_with_user("alice@example.com").await;
        let access = session(user.id, SessionKind::Access, Duration::minutes(15));

        storage
            .create_session("abc".to_string(), access.clone())
            .await
            .unwrap();

        assert_eq!(storage.read_session("abc").await.unwrap(), access);
        assert!(matches!(
            storage.read_session("xyz").await,
            Err(ReadError::NotFound)
        ));
        assert!(matches!(
            storage.create_session("abc".to_string(), access).await,
            Err(CreateError::Conflict)
        ));
    }

    #[tokio::test]
    async fn test_create_session_for_unknown_user() {
        let storage = Storage::in_memory().unwrap();
        assert!(matches!(
            storage
                .create_session(
                    "abc".to_string(),
                    session(UserID::random(), SessionKind::Access, Duration::minutes(1))
                )
                .await,
            Err(CreateError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_session() {
        let (storage, user) = storage_with_user("alice@example.com").await;
        storage
            .create_session(
                "abc".to_string(),
                session(user.id, SessionKind::Refresh, Duration::days(1)),
            )
            .await
            .unwrap();

        storage.delete_session("abc").await.unwrap();

        assert!(matches!(
            storage.read_session("abc").await,
            Err(ReadError::NotFound)
        ));
        assert!(matches!(
            storage.delete_session("abc").await,
            Err(DeleteError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_delete_user_sessions() {
        let (storage, alice) = storage_with_user("alice@example.com").await;
        let bob = create_user(&storage, "bob@example.com").await;
        for (hash, user_id) in [("a1", alice.id), ("a2", alice.id), ("b1", bob.id)] {
            storage
                .create_session(
                    hash.to_string(),
                    session(user_id, SessionKind::Access, Duration::minutes(5)),
                )
                .await
                .unwrap();
        }

        assert_eq!(storage.delete_user_sessions(alice.id).await.unwrap(), 2);
        assert!(storage.read_session("b1").await.is_ok());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let (storage, user) = storage_with_user("alice@example.com").await;
        for (hash, remaining) in [
            ("expired", Duration::seconds(-1)),
            ("expiring", Duration::zero()),
            ("valid", Duration::seconds(1)),
        ] {
            storage
                .create_session(
                    hash.to_string(),
                    session(user.id, SessionKind::Access, remaining),
                )
                .await
                .unwrap();
        }

        assert_eq!(storage.delete_expired_sessions(*NOW).await.unwrap(), 2);
        assert!(storage.read_session("valid").await.is_ok());
        assert_eq!(storage.delete_expired_sessions(*NOW).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sessions_removed_with_user() {
        let (storage, user) = storage_with_user("alice@example.com").await;
        storage
            .create_session(
                "abc".to_string(),
                session(user.id, SessionKind::Access, Duration::minutes(5)),
            )
            .await
            .unwrap();

        storage.delete_user(user.id).await.unwrap();

        assert!(matches!(
            storage.read_session("abc").await,
            Err(ReadError::NotFound)
        ));
    }
}
