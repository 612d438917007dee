use std::{fmt::Display, path::PathBuf, str::FromStr};

use chrono::Duration;
use liftlog_domain::Email;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown environment {other}")),
        }
    }
}

/// Credentials of an OAuth client registered at an identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthClient {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// Upper bound for token lifetimes, ten years in seconds.
const MAX_TOKEN_TTL: i64 = 10 * 365 * 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub database: PathBuf,
    pub upload_dir: PathBuf,
    pub public_url: String,
    pub cors_origins: Vec<String>,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub token_cleanup_interval: std::time::Duration,
    pub max_avatar_bytes: usize,
    pub admin_emails: Vec<Email>,
    pub log_json: bool,
    pub google: Option<OAuthClient>,
    pub apple: Option<OAuthClient>,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {message}")]
    Invalid { name: &'static str, message: String },
    #[error("{provider} OAuth requires {missing} to be set")]
    IncompleteOAuth {
        provider: &'static str,
        missing: &'static str,
    },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which maps a variable name to its value.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let access_token_ttl: i64 = parse(&lookup, "LIFTLOG_ACCESS_TOKEN_TTL", 900)?;
        if !(60..=MAX_TOKEN_TTL).contains(&access_token_ttl) {
            return Err(invalid(
                "LIFTLOG_ACCESS_TOKEN_TTL",
                format!("must be in the range 60 to {MAX_TOKEN_TTL}"),
            ));
        }
        let refresh_token_ttl: i64 = parse(&lookup, "LIFTLOG_REFRESH_TOKEN_TTL", 2_592_000)?;
        if refresh_token_ttl > MAX_TOKEN_TTL {
            return Err(invalid(
                "LIFTLOG_REFRESH_TOKEN_TTL",
                format!("must be at most {MAX_TOKEN_TTL}"),
            ));
        }
        if refresh_token_ttl <= access_token_ttl {
            return Err(invalid(
                "LIFTLOG_REFRESH_TOKEN_TTL",
                "must be greater than the access token lifetime",
            ));
        }
        let token_cleanup_interval: u64 = parse(&lookup, "LIFTLOG_TOKEN_CLEANUP_INTERVAL", 3600)?;
        if token_cleanup_interval == 0 {
            return Err(invalid("LIFTLOG_TOKEN_CLEANUP_INTERVAL", "must be at least 1"));
        }
        let port: u16 = parse(&lookup, "LIFTLOG_PORT", 5000)?;
        if port == 0 {
            return Err(invalid("LIFTLOG_PORT", "must be in the range 1 to 65535"));
        }

        Ok(Self {
            environment: parse(&lookup, "LIFTLOG_ENV", Environment::Development)?,
            host: value(&lookup, "LIFTLOG_HOST").unwrap_or_else(|| "127.0.0.1".to_string()),
            port,
            database: value(&lookup, "LIFTLOG_DATABASE")
                .map_or_else(|| PathBuf::from("liftlog.db"), PathBuf::from),
            upload_dir: value(&lookup, "LIFTLOG_UPLOAD_DIR")
                .map_or_else(|| PathBuf::from("uploads"), PathBuf::from),
            public_url: value(&lookup, "LIFTLOG_PUBLIC_URL")
                .unwrap_or_else(|| "http://localhost:5000".to_string())
                .trim_end_matches('/')
                .to_string(),
            cors_origins: list(&lookup, "LIFTLOG_CORS_ORIGINS"),
            access_token_ttl: Duration::seconds(access_token_ttl),
            refresh_token_ttl: Duration::seconds(refresh_token_ttl),
            token_cleanup_interval: std::time::Duration::from_secs(token_cleanup_interval),
            max_avatar_bytes: parse(&lookup, "LIFTLOG_MAX_AVATAR_BYTES", 2 * 1024 * 1024)?,
            admin_emails: list(&lookup, "LIFTLOG_ADMIN_EMAILS")
                .iter()
                .map(|email| {
                    Email::new(email).map_err(|err| invalid("LIFTLOG_ADMIN_EMAILS", err))
                })
                .collect::<Result<_, _>>()?,
            log_json: parse(&lookup, "LIFTLOG_LOG_JSON", false)?,
            google: oauth_client(
                &lookup,
                "Google",
                [
                    "GOOGLE_CLIENT_ID",
                    "GOOGLE_CLIENT_SECRET",
                    "GOOGLE_REDIRECT_URI",
                ],
            )?,
            apple: oauth_client(
                &lookup,
                "Apple",
                ["APPLE_CLIENT_ID", "APPLE_CLIENT_SECRET", "APPLE_REDIRECT_URI"],
            )?,
        })
    }

    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    #[must_use]
    pub fn is_admin_email(&self, email: &Email) -> bool {
        self.admin_emails.contains(email)
    }

    #[must_use]
    pub fn avatar_url(&self, file_name: &str) -> String {
        format!("{}/uploads/{file_name}", self.public_url)
    }
}

fn value(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match value(lookup, name) {
        Some(value) => value.parse().map_err(|err| invalid(name, err)),
        None => Ok(default),
    }
}

fn list(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Vec<String> {
    value(lookup, name)
        .map(|value| {
            value
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn oauth_client(
    lookup: &impl Fn(&str) -> Option<String>,
    provider: &'static str,
    names: [&'static str; 3],
) -> Result<Option<OAuthClient>, ConfigError> {
    match names.map(|name| value(lookup, name)) {
        [None, None, None] => Ok(None),
        [Some(client_id), Some(client_secret), Some(redirect_uri)] => Ok(Some(OAuthClient {
            client_id,
            client_secret,
            redirect_uri,
        })),
        values => {
            let missing = names
                .into_iter()
                .zip(values)
                .find_map(|(name, value)| value.is_none().then_some(name))
                .unwrap_or(names[0]);
            Err(ConfigError::IncompleteOAuth { provider, missing })
        }
    }
}

fn invalid(name: &'static str, message: impl Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        message: message.to_string(),
    }
}
