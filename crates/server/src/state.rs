use std::sync::Arc;

use liftlog_domain::{Provider, Service};
use liftlog_storage::{AvatarStore, Storage};

use crate::{
    config::Config,
    error::ApiError,
    oauth::{AppleProvider, GoogleProvider, IdentityProvider},
};

pub struct AppState {
    pub service: Service<Storage>,
    pub storage: Storage,
    pub avatars: AvatarStore,
    pub config: Arc<Config>,
    pub google: Option<Arc<dyn IdentityProvider>>,
    pub apple: Option<Arc<dyn IdentityProvider>>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    #[must_use]
    pub fn new(config: Config, storage: Storage) -> Self {
        let http = reqwest::Client::new();
        Self {
            service: Service::new(storage.clone()),
            storage,
            avatars: AvatarStore::new(&config.upload_dir),
            google: config.google.clone().map(|client| {
                Arc::new(GoogleProvider::new(http.clone(), client)) as Arc<dyn IdentityProvider>
            }),
            apple: config.apple.clone().map(|client| {
                Arc::new(AppleProvider::new(http.clone(), client)) as Arc<dyn IdentityProvider>
            }),
            config: Arc::new(config),
        }
    }

    pub fn identity_provider(&self, provider: Provider) -> Result<&dyn IdentityProvider, ApiError> {
        let (configured, name) = match provider {
            Provider::Google => (&self.google, "Google"),
            Provider::Apple => (&self.apple, "Apple"),
        };
        configured
            .as_deref()
            .ok_or(ApiError::NotConfigured(name))
    }
}
