use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::{AsRef, Display};

use crate::{CreateError, DeleteError, Name, ReadError, UpdateError, ValidationError, id::uuid_id};

#[async_trait]
pub trait UserService: Send + Sync + 'static {
    async fn get_user(&self, id: UserID) -> Result<User, ReadError>;
    async fn get_users(&self) -> Result<Vec<User>, ReadError>;
    async fn create_user(&self, user: NewUser) -> Result<User, CreateError>;
    async fn modify_user(
        &self,
        id: UserID,
        name: Option<Name>,
        email: Option<Email>,
    ) -> Result<User, UpdateError>;
    async fn delete_user(&self, id: UserID) -> Result<UserID, DeleteError>;

    async fn validate_user_email(&self, email: &str, id: UserID) -> Result<Email, ValidationError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    async fn read_users(&self) -> Result<Vec<User>, ReadError>;
    async fn read_user(&self, id: UserID) -> Result<User, ReadError>;
    async fn read_user_by_email(&self, email: &Email) -> Result<User, ReadError>;
    async fn read_user_by_identity(&self, identity: &Identity) -> Result<User, ReadError>;
    async fn read_password_hash(&self, id: UserID) -> Result<Option<String>, ReadError>;
    async fn create_user(&self, user: NewUser) -> Result<User, CreateError>;
    async fn replace_user(&self, user: User) -> Result<User, UpdateError>;
    async fn link_identity(&self, id: UserID, identity: Identity) -> Result<(), UpdateError>;
    async fn set_password_hash(&self, id: UserID, hash: String) -> Result<(), UpdateError>;
    async fn set_avatar(&self, id: UserID, avatar: Option<String>) -> Result<User, UpdateError>;
    async fn read_avatars(&self) -> Result<Vec<String>, ReadError>;
    async fn delete_user(&self, id: UserID) -> Result<UserID, DeleteError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserID,
    pub name: Name,
    pub email: Email,
    pub avatar: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Data required to register a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub name: Name,
    pub email: Email,
    pub role: Role,
    pub password_hash: Option<String>,
    pub identity: Option<Identity>,
}

uuid_id!(UserID);

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Provider {
    Google,
    Apple,
}

/// An account at an external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity {
    pub provider: Provider,
    pub subject: String,
}

#[derive(AsRef, Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Email(String);

impl Email {
    pub const MAX_LENGTH: usize = 254;

    pub fn new(email: &str) -> Result<Self, EmailError> {
        let email = email.trim().to_lowercase();

        if email.is_empty() {
            return Err(EmailError::Empty);
        }

        let len = email.chars().count();

        if len > Self::MAX_LENGTH {
            return Err(EmailError::TooLong(len));
        }

        let Some((local, domain)) = email.split_once('@') else {
            return Err(EmailError::Invalid);
        };

        if local.is_empty()
            || domain.contains('@')
            || email.chars().any(char::is_whitespace)
            || !domain.contains('.')
            || domain.starts_with('.')
            || domain.ends_with('.')
        {
            return Err(EmailError::Invalid);
        }

        Ok(Self(email))
    }

    #[must_use]
    pub fn local_part(&self) -> &str {
        self.0.split('@').next().unwrap_or_default()
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum EmailError {
    #[error("Email must not be empty")]
    Empty,
    #[error("Email is not a valid address")]
    Invalid,
    #[error("Email must be 254 characters or fewer ({0} > 254)")]
    TooLong(usize),
}

/// A clear-text password as entered by the user.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub const MIN_LENGTH: usize = 8;
    pub const MAX_LENGTH: usize = 128;

    pub fn new(password: &str) -> Result<Self, PasswordError> {
        let len = password.chars().count();

        if len < Self::MIN_LENGTH {
            return Err(PasswordError::TooShort);
        }

        if len > Self::MAX_LENGTH {
            return Err(PasswordError::TooLong);
        }

        Ok(Self(password.to_string()))
    }

    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(***)")
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PasswordError {
    #[error("Password must be at least 8 characters")]
    TooShort,
    #[error("Password must be 128 characters or fewer")]
    TooLong,
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_user_id_nil() {
        assert!(UserID::nil().is_nil());
        assert_eq!(UserID::nil(), UserID::default());
    }

    #[rstest]
    #[case("alice@example.com", Ok(Email("alice@example.com".to_string())))]
    #[case("  Alice@Example.COM ", Ok(Email("alice@example.com".to_string())))]
    #[case("", Err(EmailError::Empty))]
    #[case("alice", Err(EmailError::Invalid))]
    #[case("@example.com", Err(EmailError::Invalid))]
    #[case("alice@example", Err(EmailError::Invalid))]
    #[case("alice@@example.com", Err(EmailError::Invalid))]
    #[case("al ice@example.com", Err(EmailError::Invalid))]
    #[case("alice@example.", Err(EmailError::Invalid))]
    fn test_email_new(#[case] email: &str, #[case] expected: Result<Email, EmailError>) {
        assert_eq!(Email::new(email), expected);
    }

    #[test]
    fn test_email_too_long() {
        let email = format!("{}@example.com", "a".repeat(250));
        assert_eq!(Email::new(&email), Err(EmailError::TooLong(262)));
    }

    #[test]
    fn test_email_local_part() {
        assert_eq!(Email::new("bob@example.com").unwrap().local_part(), "bob");
    }

    #[rstest]
    #[case("secret12", true)]
    #[case("short", false)]
    fn test_password_new(#[case] password: &str, #[case] valid: bool) {
        assert_eq!(Password::new(password).is_ok(), valid);
    }

    #[test]
    fn test_password_too_long() {
        assert_eq!(
            Password::new(&"x".repeat(129)),
            Err(PasswordError::TooLong)
        );
    }

    #[test]
    fn test_password_debug_is_redacted() {
        let password = Password::new("correct horse").unwrap();
        assert_eq!(format!("{password:?}"), "Password(***)");
        assert_eq!(password.expose(), "correct horse");
    }

    #[rstest]
    #[case(Role::User, "user")]
    #[case(Role::Admin, "admin")]
    fn test_role_display(#[case] role: Role, #[case] expected: &str) {
        assert_eq!(role.to_string(), expected);
        assert_eq!(expected.parse::<Role>().unwrap(), role);
    }

    #[rstest]
    #[case(Provider::Google, "google")]
    #[case(Provider::Apple, "apple")]
    fn test_provider_display(#[case] provider: Provider, #[case] expected: &str) {
        assert_eq!(provider.to_string(), expected);
        assert_eq!(expected.parse::<Provider>().unwrap(), provider);
    }
}
