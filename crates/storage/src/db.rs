use std::{
    path::Path,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, SecondsFormat, Utc};
use liftlog_domain::{BoxError, CreateError, DeleteError, ReadError, StorageError, UpdateError};
use log::debug;
use rusqlite::{Connection, ErrorCode, ffi, types::Type};
use uuid::Uuid;

/// Async-safe handle to the SQLite connection.
///
/// All access runs on tokio's blocking thread pool.
#[derive(Clone)]
pub(crate) struct DbHandle {
    inner: Arc<Mutex<Connection>>,
}

impl DbHandle {
    pub(crate) fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub(crate) fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, DbError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        run_migrations(&conn)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection on a blocking thread.
    pub(crate) async fn call<F, T>(&self, f: F) -> Result<T, DbError>
    where
        F: FnOnce(&mut Connection) -> Result<T, DbError> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = db.lock().map_err(|_| DbError::Unavailable)?;
            f(&mut guard)
        })
        .await
        .map_err(|err| {
            debug!("database task failed: {err}");
            DbError::Unavailable
        })?
    }
}

fn run_migrations(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT,
            avatar TEXT,
            role TEXT NOT NULL DEFAULT 'user',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS identities (
            provider TEXT NOT NULL,
            subject TEXT NOT NULL,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            PRIMARY KEY (provider, subject)
        );

        CREATE TABLE IF NOT EXISTS sessions (
            token_hash TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            kind TEXT NOT NULL,
            expires_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS preferences (
            user_id TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            weight_unit TEXT NOT NULL,
            theme TEXT NOT NULL,
            default_rest INTEGER NOT NULL,
            show_rpe INTEGER NOT NULL,
            beep_volume INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS exercises (
            id TEXT PRIMARY KEY,
            owner_id TEXT REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            muscles TEXT NOT NULL DEFAULT '[]',
            force TEXT,
            mechanic TEXT,
            equipment TEXT NOT NULL DEFAULT '[]',
            category TEXT NOT NULL,
            UNIQUE (owner_id, name)
        );

        CREATE TABLE IF NOT EXISTS routines (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            archived INTEGER NOT NULL DEFAULT 0,
            days TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS routine_exercises (
            routine_id TEXT NOT NULL REFERENCES routines(id) ON DELETE CASCADE,
            exercise_id TEXT NOT NULL REFERENCES exercises(id),
            PRIMARY KEY (routine_id, exercise_id)
        );

        CREATE TABLE IF NOT EXISTS workouts (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            routine_id TEXT REFERENCES routines(id) ON DELETE SET NULL,
            routine_day INTEGER,
            name TEXT NOT NULL,
            notes TEXT NOT NULL DEFAULT '',
            started_at TEXT NOT NULL,
            finished_at TEXT
        );

        CREATE TABLE IF NOT EXISTS workout_sets (
            id TEXT PRIMARY KEY,
            workout_id TEXT NOT NULL REFERENCES workouts(id) ON DELETE CASCADE,
            exercise_id TEXT NOT NULL REFERENCES exercises(id),
            position INTEGER NOT NULL,
            target_reps INTEGER,
            target_weight REAL,
            target_rpe INTEGER,
            target_rest INTEGER,
            reps INTEGER,
            weight REAL,
            rpe INTEGER,
            notes TEXT NOT NULL DEFAULT '',
            completed_at TEXT
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_exercises_catalog_name
            ON exercises(name) WHERE owner_id IS NULL;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_workouts_active
            ON workouts(owner_id) WHERE finished_at IS NULL;
        CREATE INDEX IF NOT EXISTS idx_identities_user ON identities(user_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
        CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
        CREATE INDEX IF NOT EXISTS idx_routines_owner ON routines(owner_id);
        CREATE INDEX IF NOT EXISTS idx_routine_exercises_exercise
            ON routine_exercises(exercise_id);
        CREATE INDEX IF NOT EXISTS idx_workouts_owner_started ON workouts(owner_id, started_at);
        CREATE INDEX IF NOT EXISTS idx_workout_sets_workout ON workout_sets(workout_id, position);
        CREATE INDEX IF NOT EXISTS idx_workout_sets_exercise ON workout_sets(exercise_id);
        ",
    )?;
    Ok(())
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum DbError {
    #[error("not found")]
    NotFound,
    #[error("unique constraint violated")]
    Conflict,
    #[error("foreign key constraint violated")]
    ForeignKey,
    #[error("database unavailable")]
    Unavailable,
    #[error(transparent)]
    Sqlite(rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid stored data: {0}")]
    Data(BoxError),
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => DbError::NotFound,
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == ErrorCode::ConstraintViolation
                    && (err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                        || err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
            {
                DbError::Conflict
            }
            rusqlite::Error::SqliteFailure(err, _)
                if err.code == ErrorCode::ConstraintViolation
                    && err.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
            {
                DbError::ForeignKey
            }
            _ => DbError::Sqlite(value),
        }
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Unavailable => StorageError::Unavailable,
            _ => StorageError::Other(BoxError::from(value)),
        }
    }
}

impl From<DbError> for ReadError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::NotFound => ReadError::NotFound,
            _ => ReadError::Storage(value.into()),
        }
    }
}

impl From<DbError> for CreateError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::NotFound | DbError::ForeignKey => CreateError::NotFound,
            DbError::Conflict => CreateError::Conflict,
            _ => CreateError::Storage(value.into()),
        }
    }
}

impl From<DbError> for UpdateError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::NotFound => UpdateError::NotFound,
            DbError::Conflict | DbError::ForeignKey => UpdateError::Conflict,
            _ => UpdateError::Storage(value.into()),
        }
    }
}

impl From<DbError> for DeleteError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::NotFound => DeleteError::NotFound,
            DbError::ForeignKey => DeleteError::Conflict,
            _ => DeleteError::Storage(value.into()),
        }
    }
}

/// Fails with [`DbError::NotFound`] when a statement did not touch any row.
pub(crate) fn affected(count: usize) -> Result<usize, DbError> {
    if count == 0 {
        Err(DbError::NotFound)
    } else {
        Ok(count)
    }
}

pub(crate) fn conversion_error(
    index: usize,
    err: impl Into<BoxError>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, Type::Text, err.into())
}

pub(crate) fn parse_uuid(index: usize, value: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(value).map_err(|err| conversion_error(index, err))
}

/// Fixed-width RFC 3339, so that text comparison orders by time.
pub(crate) fn datetime_to_text(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn parse_datetime(index: usize, value: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| conversion_error(index, err))
}
