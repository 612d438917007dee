use axum::{
    Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, put},
};
use chrono::{DateTime, Utc};
use liftlog_domain::{
    Preferences, PreferencesRepository, SessionRepository, Theme, Time, User, UserRepository,
    UserService, ValidationError, WeightUnit,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    auth::{AuthUser, parse_name},
    config::Config,
    error::{ApiError, ApiResult},
    extract::{Json, Path},
    state::SharedState,
};

pub fn router(config: &Config) -> Router<SharedState> {
    Router::new()
        .route("/", get(get_me).patch(modify_me).delete(delete_me))
        .route("/preferences", get(get_preferences).put(put_preferences))
        .route(
            "/avatar",
            put(put_avatar)
                .delete(delete_avatar)
                // room for the multipart framing around the image
                .layer(DefaultBodyLimit::max(config.max_avatar_bytes + 16 * 1024)),
        )
}

#[derive(Serialize, Debug, PartialEq)]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    #[must_use]
    pub fn new(user: User, config: &Config) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.to_string(),
            email: user.email.to_string(),
            avatar_url: user.avatar.as_deref().map(|file| config.avatar_url(file)),
            role: user.role.to_string(),
            created_at: user.created_at,
        }
    }
}

async fn get_me(State(state): State<SharedState>, auth: AuthUser) -> Json<UserResponse> {
    Json(UserResponse::new(auth.user, &state.config))
}

#[derive(Deserialize)]
struct ModifyUserRequest {
    name: Option<String>,
    email: Option<String>,
}

async fn modify_me(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<ModifyUserRequest>,
) -> ApiResult<Json<UserResponse>> {
    let name = request.name.as_deref().map(parse_name).transpose()?;
    let email = match request.email {
        Some(email) => Some(
            state
                .service
                .validate_user_email(&email, auth.user.id)
                .await?,
        ),
        None => None,
    };
    let user = state.service.modify_user(auth.user.id, name, email).await?;
    Ok(Json(UserResponse::new(user, &state.config)))
}

async fn delete_me(State(state): State<SharedState>, auth: AuthUser) -> ApiResult<StatusCode> {
    let user = auth.user;
    state.storage.delete_user_sessions(user.id).await?;
    state.service.delete_user(user.id).await?;
    if let Some(avatar) = &user.avatar {
        if let Err(err) = state.avatars.delete(avatar).await {
            warn!("failed to remove avatar {avatar}: {err}");
        }
    }
    info!(user_id = %user.id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct PreferencesBody {
    weight_unit: String,
    theme: String,
    default_rest: u32,
    show_rpe: bool,
    beep_volume: u8,
}

impl From<Preferences> for PreferencesBody {
    fn from(value: Preferences) -> Self {
        Self {
            weight_unit: value.weight_unit.to_string(),
            theme: value.theme.to_string(),
            default_rest: value.default_rest.into(),
            show_rpe: value.show_rpe,
            beep_volume: value.beep_volume,
        }
    }
}

impl TryFrom<PreferencesBody> for Preferences {
    type Error = ValidationError;

    fn try_from(value: PreferencesBody) -> Result<Self, Self::Error> {
        let preferences = Preferences {
            weight_unit: value
                .weight_unit
                .parse::<WeightUnit>()
                .map_err(|_| ValidationError::invalid("weight_unit", "must be kg or lb"))?,
            theme: value
                .theme
                .parse::<Theme>()
                .map_err(|_| ValidationError::invalid("theme", "must be system, light or dark"))?,
            default_rest: Time::new(value.default_rest)
                .map_err(|err| ValidationError::invalid("default_rest", err))?,
            show_rpe: value.show_rpe,
            beep_volume: value.beep_volume,
        };
        preferences
            .validate()
            .map_err(|err| ValidationError::invalid("beep_volume", err))?;
        Ok(preferences)
    }
}

async fn get_preferences(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> ApiResult<Json<PreferencesBody>> {
    let preferences = state.storage.read_preferences(auth.user.id).await?;
    Ok(Json(preferences.into()))
}

async fn put_preferences(
    State(state): State<SharedState>,
    auth: AuthUser,
    Json(request): Json<PreferencesBody>,
) -> ApiResult<Json<PreferencesBody>> {
    let preferences = Preferences::try_from(request)?;
    let preferences = state
        .storage
        .write_preferences(auth.user.id, preferences)
        .await?;
    Ok(Json(preferences.into()))
}

async fn put_avatar(
    State(state): State<SharedState>,
    auth: AuthUser,
    mut multipart: Multipart,
) -> ApiResult<Json<UserResponse>> {
    let mut bytes = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("avatar") {
            bytes = Some(field.bytes().await?);
            break;
        }
    }
    let bytes = bytes.ok_or_else(|| ApiError::bad_request("missing field avatar"))?;
    if bytes.len() > state.config.max_avatar_bytes {
        return Err(ApiError::PayloadTooLarge);
    }

    let upload = state.avatars.upload_guard().await;
    let name = state.avatars.save(&bytes).await?;
    let user = match state.storage.set_avatar(auth.user.id, Some(name.clone())).await {
        Ok(user) => user,
        Err(err) => {
            if let Err(remove_err) = state.avatars.delete(&name).await {
                warn!("failed to remove avatar {name}: {remove_err}");
            }
            return Err(err.into());
        }
    };
    drop(upload);
    if let Some(previous) = &auth.user.avatar {
        if let Err(err) = state.avatars.delete(previous).await {
            warn!("failed to remove avatar {previous}: {err}");
        }
    }
    info!(user_id = %user.id, "avatar updated");
    Ok(Json(UserResponse::new(user, &state.config)))
}

async fn delete_avatar(
    State(state): State<SharedState>,
    auth: AuthUser,
) -> ApiResult<Json<UserResponse>> {
    let user = state.storage.set_avatar(auth.user.id, None).await?;
    if let Some(previous) = &auth.user.avatar {
        state.avatars.delete(previous).await?;
    }
    Ok(Json(UserResponse::new(user, &state.config)))
}

/// Serves a stored avatar image.
pub async fn get_upload(
    State(state): State<SharedState>,
    Path(file): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let (format, bytes) = state.avatars.read(&file).await?;
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type()),
            (header::CACHE_CONTROL, "public, max-age=86400"),
        ],
        bytes,
    ))
}
