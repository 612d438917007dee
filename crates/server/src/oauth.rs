//! Sign-in through external identity providers.
//!
//! Both providers use the authorization code flow. The client sends the code it
//! received on the redirect, the server exchanges it once and signs the user in.

use async_trait::async_trait;
use axum::{
    Router,
    extract::State,
    routing::{get, post},
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use liftlog_domain::{
    Email, Identity, Name, NewUser, Provider, ReadError, User, UserRepository, UserService,
};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::{
    auth::{TokenResponse, apply_admin_role, issue_tokens, role_for},
    config::OAuthClient,
    error::{ApiError, ApiResult},
    extract::{Json, Query},
    state::SharedState,
};

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";

const APPLE_ISSUER: &str = "https://appleid.apple.com";
const APPLE_AUTH_URL: &str = "https://appleid.apple.com/auth/authorize";
const APPLE_TOKEN_URL: &str = "https://appleid.apple.com/auth/token";

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/google/url", get(google_url))
        .route("/google", post(google_sign_in))
        .route("/apple/url", get(apple_url))
        .route("/apple", post(apple_sign_in))
}

/// The account of a user as reported by an identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    pub provider: Provider,
    pub subject: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns the consent page the client redirects the user to.
    fn authorization_url(&self, state: &str) -> Result<String, OAuthError>;

    /// Exchanges an authorization code for the identity of the user.
    async fn exchange(&self, code: &str) -> Result<ExternalIdentity, OAuthError>;
}

#[derive(thiserror::Error, Debug)]
pub enum OAuthError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
    #[error("invalid id token: {0}")]
    InvalidToken(String),
    #[error("email address is not verified")]
    UnverifiedEmail,
}

#[derive(Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    id_token: Option<String>,
}

async fn request_token(
    http: &reqwest::Client,
    url: &str,
    client: &OAuthClient,
    code: &str,
) -> Result<TokenEndpointResponse, OAuthError> {
    Ok(http
        .post(url)
        .header("Accept", "application/json")
        .form(&[
            ("client_id", client.client_id.as_str()),
            ("client_secret", client.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", client.redirect_uri.as_str()),
        ])
        .send()
        .await?
        .error_for_status()?
        .json::<TokenEndpointResponse>()
        .await?)
}

pub struct GoogleProvider {
    http: reqwest::Client,
    client: OAuthClient,
}

impl GoogleProvider {
    #[must_use]
    pub fn new(http: reqwest::Client, client: OAuthClient) -> Self {
        Self { http, client }
    }
}

#[derive(Deserialize)]
struct GoogleUserInfo {
    id: String,
    email: String,
    #[serde(default)]
    verified_email: bool,
    name: Option<String>,
}

#[async_trait]
impl IdentityProvider for GoogleProvider {
    fn authorization_url(&self, state: &str) -> Result<String, OAuthError> {
        Ok(reqwest::Url::parse_with_params(
            GOOGLE_AUTH_URL,
            &[
                ("client_id", self.client.client_id.as_str()),
                ("redirect_uri", self.client.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", "openid email profile"),
                ("access_type", "online"),
                ("state", state),
            ],
        )
        .map_err(|err| OAuthError::Url(err.to_string()))?
        .into())
    }

    async fn exchange(&self, code: &str) -> Result<ExternalIdentity, OAuthError> {
        let token = request_token(&self.http, GOOGLE_TOKEN_URL, &self.client, code).await?;
        let info = self
            .http
            .get(GOOGLE_USERINFO_URL)
            .bearer_auth(&token.access_token)
            .send()
            .await?
            .error_for_status()?
            .json::<GoogleUserInfo>()
            .await?;
        Ok(ExternalIdentity {
            provider: Provider::Google,
            subject: info.id,
            email: info.email,
            email_verified: info.verified_email,
            name: info.name,
        })
    }
}

pub struct AppleProvider {
    http: reqwest::Client,
    client: OAuthClient,
}

impl AppleProvider {
    #[must_use]
    pub fn new(http: reqwest::Client, client: OAuthClient) -> Self {
        Self { http, client }
    }
}

#[async_trait]
impl IdentityProvider for AppleProvider {
    fn authorization_url(&self, state: &str) -> Result<String, OAuthError> {
        Ok(reqwest::Url::parse_with_params(
            APPLE_AUTH_URL,
            &[
                ("client_id", self.client.client_id.as_str()),
                ("redirect_uri", self.client.redirect_uri.as_str()),
                ("response_type", "code"),
                ("response_mode", "form_post"),
                ("scope", "name email"),
                ("state", state),
            ],
        )
        .map_err(|err| OAuthError::Url(err.to_string()))?
        .into())
    }

    async fn exchange(&self, code: &str) -> Result<ExternalIdentity, OAuthError> {
        let token = request_token(&self.http, APPLE_TOKEN_URL, &self.client, code).await?;
        let id_token = token
            .id_token
            .ok_or_else(|| OAuthError::InvalidResponse("missing id_token".to_string()))?;
        let claims = decode_claims(&id_token)?;
        claims.verify(&self.client.client_id, Utc::now())?;
        Ok(ExternalIdentity {
            provider: Provider::Apple,
            subject: claims.sub,
            email: claims
                .email
                .ok_or_else(|| OAuthError::InvalidToken("missing email".to_string()))?,
            email_verified: claims.email_verified,
            name: None,
        })
    }
}

/// Claims of an Apple identity token.
#[derive(Deserialize, Debug, PartialEq)]
struct AppleClaims {
    iss: String,
    aud: String,
    exp: i64,
    sub: String,
    email: Option<String>,
    #[serde(default, deserialize_with = "bool_or_string")]
    email_verified: bool,
}

impl AppleClaims {
    fn verify(&self, client_id: &str, now: DateTime<Utc>) -> Result<(), OAuthError> {
        if self.iss != APPLE_ISSUER {
            return Err(OAuthError::InvalidToken(format!("unexpected issuer {}", self.iss)));
        }
        if self.aud != client_id {
            return Err(OAuthError::InvalidToken(format!(
                "unexpected audience {}",
                self.aud
            )));
        }
        if self.exp <= now.timestamp() {
            return Err(OAuthError::InvalidToken("expired".to_string()));
        }
        Ok(())
    }
}

// Apple encodes booleans either as JSON booleans or as the strings "true" and "false".
fn bool_or_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Flag {
        Bool(bool),
        String(String),
    }
    Ok(match Flag::deserialize(deserializer)? {
        Flag::Bool(value) => value,
        Flag::String(value) => value == "true",
    })
}

/// Decodes the payload of a JWT without checking its signature.
fn decode_claims(token: &str) -> Result<AppleClaims, OAuthError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(OAuthError::InvalidToken("malformed token".to_string()));
    };
    let payload = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|err| OAuthError::InvalidToken(err.to_string()))?;
    serde_json::from_slice(&payload).map_err(|err| OAuthError::InvalidToken(err.to_string()))
}

/// Finds or creates the user behind an external identity.
///
/// A known identity signs in its user. Otherwise the identity is linked to the
/// user with the same email, or a new user is created.
pub(crate) async fn sign_in(
    state: &SharedState,
    external: ExternalIdentity,
    fallback_name: Option<String>,
) -> ApiResult<User> {
    if !external.email_verified {
        return Err(OAuthError::UnverifiedEmail.into());
    }
    let identity = Identity {
        provider: external.provider,
        subject: external.subject,
    };
    match state.storage.read_user_by_identity(&identity).await {
        Ok(user) => return apply_admin_role(state, user).await,
        Err(ReadError::NotFound) => {}
        Err(err) => return Err(err.into()),
    }

    let email = Email::new(&external.email)
        .map_err(|err| OAuthError::InvalidResponse(format!("email: {err}")))?;
    match state.storage.read_user_by_email(&email).await {
        Ok(user) => {
            state.storage.link_identity(user.id, identity).await?;
            info!(user_id = %user.id, provider = %external.provider, "identity linked");
            return apply_admin_role(state, user).await;
        }
        Err(ReadError::NotFound) => {}
        Err(err) => return Err(err.into()),
    }

    let name = external
        .name
        .or(fallback_name)
        .and_then(|name| Name::truncated(&name).ok())
        .map_or_else(|| Name::truncated(email.local_part()), Ok)
        .map_err(ApiError::internal)?;
    let user = state
        .service
        .create_user(NewUser {
            name,
            role: role_for(state, &email),
            email,
            password_hash: None,
            identity: Some(identity),
        })
        .await?;
    info!(user_id = %user.id, provider = %external.provider, "user registered");
    Ok(user)
}

#[derive(Deserialize)]
struct UrlQuery {
    #[serde(default)]
    state: String,
}

#[derive(Serialize)]
struct UrlResponse {
    url: String,
}

async fn authorization_url(
    state: &SharedState,
    provider: Provider,
    query: &UrlQuery,
) -> ApiResult<Json<UrlResponse>> {
    let url = state
        .identity_provider(provider)?
        .authorization_url(&query.state)?;
    Ok(Json(UrlResponse { url }))
}

async fn google_url(
    State(state): State<SharedState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<UrlResponse>> {
    authorization_url(&state, Provider::Google, &query).await
}

async fn apple_url(
    State(state): State<SharedState>,
    Query(query): Query<UrlQuery>,
) -> ApiResult<Json<UrlResponse>> {
    authorization_url(&state, Provider::Apple, &query).await
}

#[derive(Deserialize)]
struct SignInRequest {
    code: String,
    name: Option<String>,
}

async fn complete_sign_in(
    state: &SharedState,
    provider: Provider,
    request: SignInRequest,
) -> ApiResult<Json<TokenResponse>> {
    if request.code.trim().is_empty() {
        return Err(ApiError::bad_request("code must not be empty"));
    }
    let external = state
        .identity_provider(provider)?
        .exchange(&request.code)
        .await?;
    let user = sign_in(state, external, request.name).await?;
    info!(user_id = %user.id, %provider, "oauth login");
    Ok(Json(issue_tokens(state, user).await?))
}

async fn google_sign_in(
    State(state): State<SharedState>,
    Json(request): Json<SignInRequest>,
) -> ApiResult<Json<TokenResponse>> {
    complete_sign_in(&state, Provider::Google, request).await
}

async fn apple_sign_in(
    State(state): State<SharedState>,
    Json(request): Json<SignInRequest>,
) -> ApiResult<Json<TokenResponse>> {
    complete_sign_in(&state, Provider::Apple, request).await
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    static NOW: LazyLock<DateTime<Utc>> = LazyLock::new(Utc::now);

    static CLIENT: LazyLock<OAuthClient> = LazyLock::new(|| OAuthClient {
        client_id: "com.example.liftlog".to_string(),
        client_secret: "secret".to_string(),
        redirect_uri: "https://lift.example.com/auth/callback".to_string(),
    });

    fn claims(iss: &str, aud: &str, exp: DateTime<Utc>) -> AppleClaims {
        AppleClaims {
            iss: iss.to_string(),
            aud: aud.to_string(),
            exp: exp.timestamp(),
            sub: "001234.abcd".to_string(),
            email: Some("alice@example.com".to_string()),
            email_verified: true,
        }
    }

    fn token(payload: &serde_json::Value) -> String {
        format!(
            "{}.{}.signature",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    #[test]
    fn test_decode_claims() {
        let payload = serde_json::json!({
            "iss": APPLE_ISSUER,
            "aud": "com.example.liftlog",
            "exp": 1_700_000_000,
            "sub": "001234.abcd",
            "email": "alice@example.com",
            "email_verified": "true",
        });
        assert_eq!(
            decode_claims(&token(&payload)).unwrap(),
            AppleClaims {
                iss: APPLE_ISSUER.to_string(),
                aud: "com.example.liftlog".to_string(),
                exp: 1_700_000_000,
                sub: "001234.abcd".to_string(),
                email: Some("alice@example.com".to_string()),
                email_verified: true,
            }
        );
    }

    #[rstest]
    #[case("a.b")]
    #[case("a.b.c.d")]
    #[case("a.!!!.c")]
    #[case("a.e30.c")]
    fn test_decode_claims_invalid(#[case] token: &str) {
        assert!(matches!(
            decode_claims(token),
            Err(OAuthError::InvalidToken(_))
        ));
    }

    #[rstest]
    #[case(APPLE_ISSUER, "com.example.liftlog", Duration::minutes(5), true)]
    #[case("https://evil.example.com", "com.example.liftlog", Duration::minutes(5), false)]
    #[case(APPLE_ISSUER, "com.example.other", Duration::minutes(5), false)]
    #[case(APPLE_ISSUER, "com.example.liftlog", Duration::zero(), false)]
    #[case(APPLE_ISSUER, "com.example.liftlog", Duration::minutes(-5), false)]
    fn test_apple_claims_verify(
        #[case] iss: &str,
        #[case] aud: &str,
        #[case] remaining: Duration,
        #[case] valid: bool,
    ) {
        assert_eq!(
            claims(iss, aud, *NOW + remaining)
                .verify(&CLIENT.client_id, *NOW)
                .is_ok(),
            valid
        );
    }

    #[test]
    fn test_google_authorization_url() {
        let provider = GoogleProvider::new(reqwest::Client::new(), CLIENT.clone());
        let url = reqwest::Url::parse(&provider.authorization_url("xyz").unwrap()).unwrap();
        let params = url
            .query_pairs()
            .into_owned()
            .collect::<std::collections::HashMap<_, _>>();
        assert_eq!(url.host_str(), Some("accounts.google.com"));
        assert_eq!(params["client_id"], "com.example.liftlog");
        assert_eq!(params["redirect_uri"], "https://lift.example.com/auth/callback");
        assert_eq!(params["scope"], "openid email profile");
        assert_eq!(params["state"], "xyz");
    }

    #[test]
    fn test_apple_authorization_url() {
        let provider = AppleProvider::new(reqwest::Client::new(), CLIENT.clone());
        let url = provider.authorization_url("").unwrap();
        assert!(url.starts_with(APPLE_AUTH_URL));
        assert!(url.contains("response_mode=form_post"));
    }
}
