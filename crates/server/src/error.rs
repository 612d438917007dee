use axum::{
    Json,
    extract::{
        multipart::MultipartError,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use liftlog_domain::{
    BoxError, CreateError, DeleteError, ReadError, StorageError, TrackerError, UpdateError,
    ValidationError,
};
use liftlog_storage::AvatarError;
use tracing::{error, warn};

use crate::oauth::OAuthError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("authentication required")]
    Unauthorized,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("payload too large")]
    PayloadTooLarge,
    #[error("identity provider request failed")]
    Upstream(#[source] BoxError),
    #[error("{0} sign-in is not configured")]
    NotConfigured(&'static str),
    #[error("internal server error")]
    Internal(#[source] BoxError),
    #[error("service unavailable")]
    Unavailable,
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::NotConfigured(_) | ApiError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn bad_request(message: impl ToString) -> Self {
        ApiError::BadRequest(message.to_string())
    }

    pub fn internal(err: impl Into<BoxError>) -> Self {
        ApiError::Internal(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Internal(source) => error!("internal error: {source}"),
            ApiError::Upstream(source) => warn!("identity provider failure: {source}"),
            _ => {}
        }
        (
            self.status(),
            Json(serde_json::json!({"error": self.to_string()})),
        )
            .into_response()
    }
}

fn storage_error(err: StorageError) -> ApiError {
    match err {
        StorageError::Unavailable => ApiError::Unavailable,
        StorageError::Other(err) => ApiError::Internal(err),
    }
}

impl From<ValidationError> for ApiError {
    fn from(value: ValidationError) -> Self {
        match value {
            ValidationError::Conflict(_) => ApiError::Conflict(value.to_string()),
            ValidationError::Invalid(_, _) => ApiError::BadRequest(value.to_string()),
            ValidationError::Other(err) => ApiError::Internal(err),
        }
    }
}

impl From<ReadError> for ApiError {
    fn from(value: ReadError) -> Self {
        match value {
            ReadError::NotFound => ApiError::NotFound,
            ReadError::Storage(err) => storage_error(err),
            ReadError::Other(err) => ApiError::Internal(err),
        }
    }
}

impl From<CreateError> for ApiError {
    fn from(value: CreateError) -> Self {
        match value {
            CreateError::NotFound => ApiError::NotFound,
            CreateError::Conflict => ApiError::Conflict("already exists".to_string()),
            CreateError::Invalid(err) => err.into(),
            CreateError::Storage(err) => storage_error(err),
            CreateError::Other(err) => ApiError::Internal(err),
        }
    }
}

impl From<UpdateError> for ApiError {
    fn from(value: UpdateError) -> Self {
        match value {
            UpdateError::NotFound => ApiError::NotFound,
            UpdateError::Conflict => ApiError::Conflict("conflict".to_string()),
            UpdateError::Invalid(err) => err.into(),
            UpdateError::Storage(err) => storage_error(err),
            UpdateError::Other(err) => ApiError::Internal(err),
        }
    }
}

impl From<DeleteError> for ApiError {
    fn from(value: DeleteError) -> Self {
        match value {
            DeleteError::NotFound => ApiError::NotFound,
            DeleteError::Conflict => ApiError::Conflict("in use".to_string()),
            DeleteError::Storage(err) => storage_error(err),
            DeleteError::Other(err) => ApiError::Internal(err),
        }
    }
}

impl From<AvatarError> for ApiError {
    fn from(value: AvatarError) -> Self {
        match value {
            AvatarError::UnsupportedFormat => {
                ApiError::bad_request("avatar must be a PNG, JPEG, GIF or WebP image")
            }
            AvatarError::InvalidName | AvatarError::NotFound => ApiError::NotFound,
            AvatarError::Io(err) => ApiError::internal(err),
        }
    }
}

impl From<TrackerError> for ApiError {
    fn from(value: TrackerError) -> Self {
        match value {
            TrackerError::NoSet => ApiError::bad_request(value),
            TrackerError::AlreadyCompleted | TrackerError::SetCompleted => {
                ApiError::Conflict(value.to_string())
            }
        }
    }
}

impl From<OAuthError> for ApiError {
    fn from(value: OAuthError) -> Self {
        match value {
            OAuthError::UnverifiedEmail | OAuthError::InvalidToken(_) => {
                ApiError::InvalidCredentials
            }
            _ => ApiError::Upstream(value.into()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        if value.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::BadRequest(value.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(value: QueryRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(value: PathRejection) -> Self {
        ApiError::BadRequest(value.body_text())
    }
}

impl From<MultipartError> for ApiError {
    fn from(value: MultipartError) -> Self {
        if value.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::PayloadTooLarge;
        }
        ApiError::BadRequest(value.body_text())
    }
}
