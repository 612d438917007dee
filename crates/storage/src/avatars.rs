use std::{collections::BTreeSet, io::ErrorKind, path::PathBuf, sync::Arc};

use log::{debug, warn};
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

/// Image formats accepted as avatars, detected from the file content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageFormat {
    #[must_use]
    pub fn detect(bytes: &[u8]) -> Option<Self> {
        match bytes {
            [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(Self::Png),
            [0xFF, 0xD8, 0xFF, ..] => Some(Self::Jpeg),
            [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some(Self::Gif),
            [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(Self::Webp),
            _ => None,
        }
    }

    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
            Self::Gif => "gif",
            Self::Webp => "webp",
        }
    }

    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Gif => "image/gif",
            Self::Webp => "image/webp",
        }
    }

    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        [Self::Png, Self::Jpeg, Self::Gif, Self::Webp]
            .into_iter()
            .find(|f| f.extension() == extension)
    }

    /// Returns the format of a file name created by [`AvatarStore::save`].
    #[must_use]
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (stem, extension) = name.split_once('.')?;
        Uuid::try_parse(stem).ok()?;
        Self::from_extension(extension)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AvatarError {
    #[error("unsupported image format")]
    UnsupportedFormat,
    #[error("invalid avatar file name")]
    InvalidName,
    #[error("avatar not found")]
    NotFound,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Stores avatar images as `<uuid>.<ext>` files in a single directory.
///
/// A saved file is an orphan until a user refers to it. Uploads hold an
/// [`AvatarStore::upload_guard`] until the reference is stored, and orphan
/// removal runs under the [`AvatarStore::cleanup_guard`], which waits for them.
#[derive(Debug, Clone)]
pub struct AvatarStore {
    dir: PathBuf,
    uploads: Arc<RwLock<()>>,
}

impl AvatarStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            uploads: Arc::new(RwLock::new(())),
        }
    }

    pub async fn upload_guard(&self) -> RwLockReadGuard<'_, ()> {
        self.uploads.read().await
    }

    pub async fn cleanup_guard(&self) -> RwLockWriteGuard<'_, ()> {
        self.uploads.write().await
    }

    pub async fn init(&self) -> Result<(), AvatarError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        Ok(())
    }

    /// Writes the image under a fresh name and returns that name.
    pub async fn save(&self, bytes: &[u8]) -> Result<String, AvatarError> {
        let format = ImageFormat::detect(bytes).ok_or(AvatarError::UnsupportedFormat)?;
        let name = format!("{}.{}", Uuid::new_v4(), format.extension());
        tokio::fs::write(self.dir.join(&name), bytes).await?;
        debug!("avatar {name} saved");
        Ok(name)
    }

    pub async fn read(&self, name: &str) -> Result<(ImageFormat, Vec<u8>), AvatarError> {
        let format = ImageFormat::from_file_name(name).ok_or(AvatarError::InvalidName)?;
        match tokio::fs::read(self.dir.join(name)).await {
            Ok(bytes) => Ok((format, bytes)),
            Err(err) if err.kind() == ErrorKind::NotFound => Err(AvatarError::NotFound),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes the file. A missing file is not an error.
    pub async fn delete(&self, name: &str) -> Result<(), AvatarError> {
        ImageFormat::from_file_name(name).ok_or(AvatarError::InvalidName)?;
        match tokio::fs::remove_file(self.dir.join(name)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Lists the avatar files in the directory, sorted by name.
    pub async fn list(&self) -> Result<Vec<String>, AvatarError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(vec![]),
            Err(err) => return Err(err.into()),
        };
        let mut names = vec![];
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if ImageFormat::from_file_name(name).is_some() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Deletes every avatar file not contained in `referenced` and returns the removed names.
    ///
    /// `referenced` must be read while holding the [`AvatarStore::cleanup_guard`].
    pub async fn remove_orphans(&self, referenced: &[String]) -> Result<Vec<String>, AvatarError> {
        let referenced = referenced.iter().map(String::as_str).collect::<BTreeSet<_>>();
        let mut removed = vec![];
        for name in self.list().await? {
            if referenced.contains(name.as_str()) {
                continue;
            }
            match self.delete(&name).await {
                Ok(()) => removed.push(name),
                Err(err) => warn!("failed to remove avatar {name}: {err}"),
            }
        }
        Ok(removed)
    }
}
