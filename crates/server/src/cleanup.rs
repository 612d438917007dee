use std::time::Duration;

use chrono::Utc;
use liftlog_domain::SessionRepository;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};
use tracing::{debug, error, info};

/// Periodically deletes expired sessions until `shutdown` changes.
pub fn spawn<R: SessionRepository>(
    repository: R,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = interval.tick() => remove_expired_sessions(&repository).await,
                _ = shutdown.changed() => break,
            }
        }
        debug!("session cleanup stopped");
    })
}

async fn remove_expired_sessions<R: SessionRepository>(repository: &R) {
    match repository.delete_expired_sessions(Utc::now()).await {
        Ok(0) => {}
        Ok(removed) => info!(removed, "expired sessions removed"),
        Err(err) => error!("failed to remove expired sessions: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration as TimeDelta;
    use liftlog_domain::{
        Email, Name, NewUser, Role, Session, SessionKind, UserRepository,
    };
    use liftlog_storage::Storage;
    use pretty_assertions::assert_eq;

    use super::*;

    #[tokio::test]
    async fn test_cleanup_removes_expired_sessions() {
        let storage = Storage::in_memory().unwrap();
        let user = storage
            .create_user(NewUser {
                name: Name::new("Alice").unwrap(),
                email: Email::new("alice@example.com").unwrap(),
                role: Role::User,
                password_hash: None,
                identity: None,
            })
            .await
            .unwrap();
        let now = Utc::now();
        for (hash, expires_at) in [
            ("expired", now - TimeDelta::minutes(1)),
            ("valid", now + TimeDelta::minutes(15)),
        ] {
            storage
                .create_session(
                    hash.to_string(),
                    Session {
                        user_id: user.id,
                        kind: SessionKind::Access,
                        expires_at,
                    },
                )
                .await
                .unwrap();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = spawn(storage.clone(), Duration::from_millis(10), shutdown_rx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(storage.read_session("expired").await.is_err());
        assert_eq!(storage.read_session("valid").await.unwrap().user_id, user.id);
    }
}
