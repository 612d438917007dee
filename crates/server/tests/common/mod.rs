#![allow(dead_code)]

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use liftlog_domain::{ExerciseRepository, Provider, catalog};
use liftlog_server::{
    app,
    config::Config,
    oauth::{ExternalIdentity, IdentityProvider, OAuthError},
    state::AppState,
};
use liftlog_storage::Storage;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower::ServiceExt;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const PASSWORD: &str = "correct horse battery";

/// Answers every code with the identity registered for it.
pub struct FakeProvider {
    pub provider: Provider,
    pub identities: HashMap<String, ExternalIdentity>,
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    fn authorization_url(&self, state: &str) -> Result<String, OAuthError> {
        Ok(format!("https://accounts.example.com/auth?state={state}"))
    }

    async fn exchange(&self, code: &str) -> Result<ExternalIdentity, OAuthError> {
        self.identities
            .get(code)
            .cloned()
            .ok_or_else(|| OAuthError::InvalidToken("unknown code".to_string()))
    }
}

pub fn identity(subject: &str, email: &str, verified: bool, name: Option<&str>) -> ExternalIdentity {
    ExternalIdentity {
        provider: Provider::Google,
        subject: subject.to_string(),
        email: email.to_string(),
        email_verified: verified,
        name: name.map(str::to_string),
    }
}

pub struct TestApp {
    pub router: Router,
    pub storage: Storage,
    pub upload_dir: TempDir,
}

pub fn config(upload_dir: &TempDir) -> Config {
    let upload_dir = upload_dir.path().display().to_string();
    Config::from_lookup(|name| match name {
        "LIFTLOG_UPLOAD_DIR" => Some(upload_dir.clone()),
        "LIFTLOG_ADMIN_EMAILS" => Some(ADMIN_EMAIL.to_string()),
        "LIFTLOG_PUBLIC_URL" => Some("http://liftlog.test".to_string()),
        "LIFTLOG_MAX_AVATAR_BYTES" => Some("1024".to_string()),
        _ => None,
    })
    .unwrap()
}

pub async fn test_app() -> TestApp {
    test_app_with(|_| {}).await
}

pub async fn test_app_with(customize: impl FnOnce(&mut AppState)) -> TestApp {
    let upload_dir = tempfile::tempdir().unwrap();
    let storage = Storage::in_memory().unwrap();
    storage.seed_catalog(catalog::exercises()).await.unwrap();
    let mut state = AppState::new(config(&upload_dir), storage.clone());
    state.avatars.init().await.unwrap();
    customize(&mut state);
    TestApp {
        router: app(state),
        storage,
        upload_dir,
    }
}

pub fn with_google(state: &mut AppState, identities: Vec<(&str, ExternalIdentity)>) {
    state.google = Some(Arc::new(FakeProvider {
        provider: Provider::Google,
        identities: identities
            .into_iter()
            .map(|(code, identity)| (code.to_string(), identity))
            .collect(),
    }));
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub bytes: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.bytes).unwrap()
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .unwrap()
            .to_bytes()
            .to_vec();
        TestResponse {
            status,
            headers,
            bytes,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(body) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> TestResponse {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    /// Registers a user and returns the token response.
    pub async fn register(&self, name: &str, email: &str) -> Value {
        let response = self
            .request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"name": name, "email": email, "password": PASSWORD})),
            )
            .await;
        assert_eq!(response.status, StatusCode::CREATED, "{:?}", response.json());
        response.json()
    }

    /// Registers a user and returns its access token.
    pub async fn access_token(&self, email: &str) -> String {
        self.register("Alice", email).await["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    pub async fn exercise_id(&self, token: &str, name: &str) -> String {
        let response = self
            .get(&format!("/api/exercises?name={}", name.replace(' ', "%20")), token)
            .await;
        response.json()[0]["id"].as_str().unwrap().to_string()
    }
}
