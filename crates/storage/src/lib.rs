#![warn(clippy::pedantic)]

use std::path::Path;

use liftlog_domain::StorageError;

mod avatars;
mod db;
mod exercises;
mod preferences;
mod routines;
mod sessions;
mod users;
mod workouts;

pub use avatars::{AvatarError, AvatarStore, ImageFormat};

use db::DbHandle;

/// SQLite-backed implementation of every repository of the domain.
#[derive(Clone)]
pub struct Storage {
    db: DbHandle,
}

impl Storage {
    /// Opens the database at `path` and brings the schema up to date.
    ///
    /// The path `:memory:` opens a fresh in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        if path == Path::new(":memory:") {
            return Self::in_memory();
        }
        log::debug!("opening database {}", path.display());
        Ok(Self {
            db: DbHandle::open(path)?,
        })
    }

    pub fn in_memory() -> Result<Self, StorageError> {
        Ok(Self {
            db: DbHandle::open_in_memory()?,
        })
    }
}
