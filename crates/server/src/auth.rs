use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{
        SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use axum::{
    Router,
    body::Bytes,
    extract::{FromRequestParts, State},
    http::{StatusCode, header, request::Parts},
    routing::{get, post, put},
};
use chrono::Utc;
use liftlog_domain::{
    DeleteError, Email, Name, NewUser, Password, ReadError, Role, Session, SessionKind, SessionRepository,
    User, UserID, UserRepository, UserService, ValidationError,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    extract::Json,
    state::SharedState,
    users::UserResponse,
};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", put(change_password))
}

/// The user a valid access token belongs to.
pub struct AuthUser {
    pub user: User,
    token_hash: String,
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or(ApiError::Unauthorized)?;
        let token_hash = hash_token(token);
        let session = match state.storage.read_session(&token_hash).await {
            Ok(session) => session,
            Err(ReadError::NotFound) => return Err(ApiError::Unauthorized),
            Err(err) => return Err(err.into()),
        };
        if !session.is_valid(SessionKind::Access, Utc::now()) {
            return Err(ApiError::Unauthorized);
        }
        match state.service.get_user(session.user_id).await {
            Ok(user) => Ok(Self { user, token_hash }),
            Err(ReadError::NotFound) => Err(ApiError::Unauthorized),
            Err(err) => Err(err.into()),
        }
    }
}

/// An authenticated user with the admin role.
pub struct AdminUser(pub User);

impl FromRequestParts<SharedState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser { user, .. } = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            return Err(ApiError::Forbidden);
        }
        Ok(Self(user))
    }
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Returns 256 random bits rendered as hex.
pub(crate) fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Only the SHA-256 of a token is persisted.
pub(crate) fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

pub(crate) async fn hash_password(password: Password) -> ApiResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.expose().as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|err| ApiError::internal(err.to_string()))
    })
    .await
    .map_err(ApiError::internal)?
}

pub(crate) async fn verify_password(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash).map_err(|err| ApiError::internal(err.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(ApiError::internal)?
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// Creates a new access and refresh session for the user.
pub(crate) async fn issue_tokens(state: &SharedState, user: User) -> ApiResult<TokenResponse> {
    let now = Utc::now();
    let access_token = generate_token();
    let refresh_token = generate_token();
    state
        .storage
        .create_session(
            hash_token(&access_token),
            Session {
                user_id: user.id,
                kind: SessionKind::Access,
                expires_at: now + state.config.access_token_ttl,
            },
        )
        .await?;
    state
        .storage
        .create_session(
            hash_token(&refresh_token),
            Session {
                user_id: user.id,
                kind: SessionKind::Refresh,
                expires_at: now + state.config.refresh_token_ttl,
            },
        )
        .await?;
    Ok(TokenResponse {
        user: UserResponse::new(user, &state.config),
        access_token,
        refresh_token,
        token_type: "Bearer",
        expires_in: state.config.access_token_ttl.num_seconds(),
    })
}

/// Grants the admin role to users whose email is listed in the configuration.
pub(crate) async fn apply_admin_role(state: &SharedState, user: User) -> ApiResult<User> {
    if user.is_admin() || !state.config.is_admin_email(&user.email) {
        return Ok(user);
    }
    info!(user_id = %user.id, "admin role granted");
    Ok(state
        .storage
        .replace_user(User {
            role: Role::Admin,
            ..user
        })
        .await?)
}

pub(crate) fn role_for(state: &SharedState, email: &Email) -> Role {
    if state.config.is_admin_email(email) {
        Role::Admin
    } else {
        Role::User
    }
}

pub(crate) fn parse_name(name: &str) -> Result<Name, ValidationError> {
    Name::new(name).map_err(|err| ValidationError::invalid("name", err))
}

fn parse_password(field: &str, password: &str) -> Result<Password, ValidationError> {
    Password::new(password).map_err(|err| ValidationError::invalid(field, err))
}

#[derive(Deserialize)]
struct RegisterRequest {
    name: String,
    email: String,
    password: String,
}

async fn register(
    State(state): State<SharedState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<TokenResponse>)> {
    let name = parse_name(&request.name)?;
    let password = parse_password("password", &request.password)?;
    let email = state
        .service
        .validate_user_email(&request.email, UserID::nil())
        .await?;
    let password_hash = hash_password(password).await?;
    let user = state
        .service
        .create_user(NewUser {
            name,
            role: role_for(&state, &email),
            email,
            password_hash: Some(password_hash),
            identity: None,
        })
        .await?;
    info!(user_id = %user.id, "user registered");
    let tokens = issue_tokens(&state, user).await?;
    Ok((StatusCode::CREATED, Json(tokens)))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

async fn login(
    State(state): State<SharedState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let email = Email::new(&request.email).map_err(|_| ApiError::InvalidCredentials)?;
    let user = match state.storage.read_user_by_email(&email).await {
        Ok(user) => user,
        Err(ReadError::NotFound) => return Err(ApiError::InvalidCredentials),
        Err(err) => return Err(err.into()),
    };
    let Some(hash) = state.storage.read_password_hash(user.id).await? else {
        return Err(ApiError::InvalidCredentials);
    };
    if !verify_password(request.password, hash).await? {
        return Err(ApiError::InvalidCredentials);
    }
    let user = apply_admin_role(&state, user).await?;
    info!(user_id = %user.id, "user logged in");
    Ok(Json(issue_tokens(&state, user).await?))
}

#[derive(Deserialize)]
struct RefreshRequest {
    refresh_token: String,
}

async fn refresh(
    State(state): State<SharedState>,
    Json(request): Json<RefreshRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let token_hash = hash_token(&request.refresh_token);
    let session = match state.storage.read_session(&token_hash).await {
        Ok(session) => session,
        Err(ReadError::NotFound) => return Err(ApiError::Unauthorized),
        Err(err) => return Err(err.into()),
    };
    if session.kind != SessionKind::Refresh {
        return Err(ApiError::Unauthorized);
    }
    // refresh tokens are single use, a concurrent request may have consumed it already
    if !revoke_session(&state.storage, &token_hash).await? {
        return Err(ApiError::Unauthorized);
    }
    if !session.is_valid(SessionKind::Refresh, Utc::now()) {
        return Err(ApiError::Unauthorized);
    }
    let user = match state.service.get_user(session.user_id).await {
        Ok(user) => user,
        Err(ReadError::NotFound) => return Err(ApiError::Unauthorized),
        Err(err) => return Err(err.into()),
    };
    Ok(Json(issue_tokens(&state, user).await?))
}

/// Deletes a session. Returns `false` if it was already gone.
async fn revoke_session(
    sessions: &impl SessionRepository,
    token_hash: &str,
) -> Result<bool, DeleteError> {
    match sessions.delete_session(token_hash).await {
        Ok(()) => Ok(true),
        Err(DeleteError::NotFound) => Ok(false),
        Err(err) => Err(err),
    }
}

#[derive(Deserialize, Default)]
struct LogoutRequest {
    refresh_token: Option<String>,
}

async fn logout(
    State(state): State<SharedState>,
    auth: AuthUser,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let request: LogoutRequest = if body.iter().all(u8::is_ascii_whitespace) {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(ApiError::bad_request)?
    };
    revoke_session(&state.storage, &auth.token_hash).await?;
    if let Some(refresh_token) = request.refresh_token {
        let token_hash = hash_token(&refresh_token);
        match state.storage.read_session(&token_hash).await {
            Ok(session) if session.user_id == auth.user.id => {
                revoke_session(&state.storage, &token_hash).await?;
            }
            Ok(_) | Err(ReadError::NotFound) => {}
            Err(err) => return Err(err.into()),
        }
    }
    info!(user_id = %auth.user.id, "user logged out");
    Ok(StatusCode::NO_CONTENT)
}

async fn me(State(state): State<SharedState>, auth: AuthUser) -> Json<UserResponse> {
    Json(UserResponse::new(auth.user, &state.config))
}

#[derive(Deserialize)]
struct ChangePasswordRequest {
    current_password: Option<String>,
    new_password: String,
}

async fn change_password(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<ChangePasswordRequest>,
) -> ApiResult<Json<TokenResponse>> {
    let new_password = parse_password("new_password", &request.new_password)?;
    if let Some(hash) = state.storage.read_password_hash(auth.user.id).await? {
        let Some(current_password) = request.current_password else {
            return Err(ValidationError::invalid("current_password", "must be given").into());
        };
        if !verify_password(current_password, hash).await? {
            return Err(ApiError::InvalidCredentials);
        }
    }
    let hash = hash_password(new_password).await?;
    state
        .storage
        .set_password_hash(auth.user.id, hash)
        .await?;
    let revoked = state.storage.delete_user_sessions(auth.user.id).await?;
    info!(user_id = %auth.user.id, revoked, "password changed");
    Ok(Json(issue_tokens(&state, auth.user).await?))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_generate_token() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_hash_token() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_hash_and_verify_password() {
        let hash = hash_password(Password::new("correct horse").unwrap())
            .await
            .unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(
            verify_password("correct horse".to_string(), hash.clone())
                .await
                .unwrap()
        );
        assert!(
            !verify_password("battery staple".to_string(), hash)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn test_revoke_session_twice() {
        let storage = liftlog_storage::Storage::in_memory().unwrap();
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
        storage
            .create_session(
                hash_token("refresh"),
                Session {
                    user_id: user.id,
                    kind: SessionKind::Refresh,
                    expires_at: Utc::now() + chrono::Duration::days(1),
                },
            )
            .await
            .unwrap();

        assert!(revoke_session(&storage, &hash_token("refresh")).await.unwrap());
        assert!(!revoke_session(&storage, &hash_token("refresh")).await.unwrap());
    }

    #[rstest]
    #[case("Bearer abc", Some("abc"))]
    #[case("bearer  abc ", Some("abc"))]
    #[case("Basic abc", None)]
    #[case("Bearer ", None)]
    #[case("abc", None)]
    fn test_bearer_token(#[case] value: &str, #[case] expected: Option<&str>) {
        let (mut parts, ()) = axum::http::Request::new(()).into_parts();
        parts
            .headers
            .insert(header::AUTHORIZATION, value.parse().unwrap());
        assert_eq!(bearer_token(&parts), expected);
    }
}
