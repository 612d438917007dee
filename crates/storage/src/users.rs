use async_trait::async_trait;
use chrono::Utc;
use liftlog_domain::{
    CreateError, DeleteError, Email, Identity, Name, NewUser, ReadError, Role, UpdateError, User,
    UserID, UserRepository,
};
use rusqlite::{Connection, Row, params};

use crate::{
    Storage,
    db::{DbError, affected, conversion_error, datetime_to_text, parse_datetime, parse_uuid},
};

const COLUMNS: &str = "id, name, email, avatar, role, created_at";

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let name: String = row.get(1)?;
    let email: String = row.get(2)?;
    let role: String = row.get(4)?;
    let created_at: String = row.get(5)?;
    Ok(User {
        id: parse_uuid(0, &id)?.into(),
        name: Name::new(&name).map_err(|err| conversion_error(1, err))?,
        email: Email::new(&email).map_err(|err| conversion_error(2, err))?,
        avatar: row.get(3)?,
        role: role.parse::<Role>().map_err(|err| conversion_error(4, err))?,
        created_at: parse_datetime(5, &created_at)?,
    })
}

pub(crate) fn read_user(conn: &Connection, id: UserID) -> Result<User, DbError> {
    Ok(conn.query_row(
        &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
        [id.to_string()],
        user_from_row,
    )?)
}

#[async_trait]
impl UserRepository for Storage {
    async fn read_users(&self) -> Result<Vec<User>, ReadError> {
        Ok(self
            .db
            .call(|conn| {
                let mut stmt =
                    conn.prepare(&format!("SELECT {COLUMNS} FROM users ORDER BY created_at, id"))?;
                let users = stmt
                    .query_map([], user_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(users)
            })
            .await?)
    }

    async fn read_user(&self, id: UserID) -> Result<User, ReadError> {
        Ok(self.db.call(move |conn| read_user(conn, id)).await?)
    }

    async fn read_user_by_email(&self, email: &Email) -> Result<User, ReadError> {
        let email = email.to_string();
        Ok(self
            .db
            .call(move |conn| {
                Ok(conn.query_row(
                    &format!("SELECT {COLUMNS} FROM users WHERE email = ?1"),
                    [email],
                    user_from_row,
                )?)
            })
            .await?)
    }

    async fn read_user_by_identity(&self, identity: &Identity) -> Result<User, ReadError> {
        let identity = identity.clone();
        Ok(self
            .db
            .call(move |conn| {
                Ok(conn.query_row(
                    "SELECT u.id, u.name, u.email, u.avatar, u.role, u.created_at
                     FROM users u JOIN identities i ON i.user_id = u.id
                     WHERE i.provider = ?1 AND i.subject = ?2",
                    params![identity.provider.as_ref(), identity.subject],
                    user_from_row,
                )?)
            })
            .await?)
    }

    async fn read_password_hash(&self, id: UserID) -> Result<Option<String>, ReadError> {
        Ok(self
            .db
            .call(move |conn| {
                Ok(conn.query_row(
                    "SELECT password_hash FROM users WHERE id = ?1",
                    [id.to_string()],
                    |row| row.get(0),
                )?)
            })
            .await?)
    }

    async fn create_user(&self, user: NewUser) -> Result<User, CreateError> {
        Ok(self
            .db
            .call(move |conn| {
                let id = UserID::random();
                let tx = conn.unchecked_transaction()?;
                tx.execute(
                    "INSERT INTO users (id, name, email, password_hash, role, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    params![
                        id.to_string(),
                        user.name.as_ref(),
                        user.email.as_ref(),
                        user.password_hash,
                        user.role.as_ref(),
                        datetime_to_text(Utc::now()),
                    ],
                )?;
                if let Some(identity) = user.identity {
                    tx.execute(
                        "INSERT INTO identities (provider, subject, user_id) VALUES (?1, ?2, ?3)",
                        params![identity.provider.as_ref(), identity.subject, id.to_string()],
                    )?;
                }
                let user = read_user(&tx, id)?;
                tx.commit()?;
                Ok(user)
            })
            .await?)
    }

    async fn replace_user(&self, user: User) -> Result<User, UpdateError> {
        Ok(self
            .db
            .call(move |conn| {
                affected(conn.execute(
                    "UPDATE users SET name = ?2, email = ?3, role = ?4 WHERE id = ?1",
                    params![
                        user.id.to_string(),
                        user.name.as_ref(),
                        user.email.as_ref(),
                        user.role.as_ref(),
                    ],
                )?)?;
                read_user(conn, user.id)
            })
            .await?)
    }

    async fn link_identity(&self, id: UserID, identity: Identity) -> Result<(), UpdateError> {
        Ok(self
            .db
            .call(move |conn| {
                let tx = conn.unchecked_transaction()?;
                read_user(&tx, id)?;
                tx.execute(
                    "INSERT INTO identities (provider, subject, user_id) VALUES (?1, ?2, ?3)",
                    params![identity.provider.as_ref(), identity.subject, id.to_string()],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await?)
    }

    async fn set_password_hash(&self, id: UserID, hash: String) -> Result<(), UpdateError> {
        Ok(self
            .db
            .call(move |conn| {
                affected(conn.execute(
                    "UPDATE users SET password_hash = ?2 WHERE id = ?1",
                    params![id.to_string(), hash],
                )?)?;
                Ok(())
            })
            .await?)
    }

    async fn set_avatar(&self, id: UserID, avatar: Option<String>) -> Result<User, UpdateError> {
        Ok(self
            .db
            .call(move |conn| {
                affected(conn.execute(
                    "UPDATE users SET avatar = ?2 WHERE id = ?1",
                    params![id.to_string(), avatar],
                )?)?;
                read_user(conn, id)
            })
            .await?)
    }

    async fn read_avatars(&self) -> Result<Vec<String>, ReadError> {
        Ok(self
            .db
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT avatar FROM users WHERE avatar IS NOT NULL")?;
                let avatars = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(avatars)
            })
            .await?)
    }

    async fn delete_user(&self, id: UserID) -> Result<UserID, DeleteError> {
        Ok(self
            .db
            .call(move |conn| {
                affected(conn.execute("DELETE FROM users WHERE id = ?1", [id.to_string()])?)?;
                Ok(id)
            })
            .await?)
    }
}
