//! Flat-file metadata store for media records and admin users.
//!
//! The whole database is one pretty-printed JSON file, reread at startup and
//! rewritten after every mutation. All reads and the mutate-then-persist
//! sequence go through a single async mutex, so overlapping admin requests
//! cannot clobber each other's saves.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

use crate::atomic::AtomicFile;

pub const DEFAULT_ADMIN_USER: &str = "admin";
pub const DEFAULT_ADMIN_PASS: &str = "admin123";

/// Admin account. Passwords are stored and compared in plaintext, matching
/// the persisted format this server inherits.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub username: String,
    pub password: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

/// One gallery entry. `filename` is the on-disk name under the uploads
/// directory, distinct from the display `name`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MediaItem {
    pub id: String,
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub filename: String,
    #[serde(rename = "type")]
    pub kind: MediaKind,
    pub created_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Database {
    media: Vec<MediaItem>,
    users: Vec<User>,
}

#[derive(Debug)]
pub enum StoreError {
    Corrupt(serde_json::Error),
    Io(io::Error),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Corrupt(err) => write!(f, "database file is corrupt: {err}"),
            StoreError::Io(err) => write!(f, "database io error: {err}"),
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(err: io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl From<StoreError> for io::Error {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt(err) => io::Error::new(io::ErrorKind::InvalidData, err),
            StoreError::Io(err) => err,
        }
    }
}

pub struct MediaStore {
    path: PathBuf,
    db: Mutex<Database>,
}

impl MediaStore {
    /// Loads the database file, or seeds a fresh one with the default admin
    /// account when it does not exist yet. A malformed file is a hard error
    /// and aborts startup.
    pub async fn open(path: PathBuf) -> Result<Self, StoreError> {
        let db = match fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(StoreError::Corrupt)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                let db = Database {
                    media: Vec::new(),
                    users: vec![User {
                        username: DEFAULT_ADMIN_USER.to_string(),
                        password: DEFAULT_ADMIN_PASS.to_string(),
                    }],
                };
                persist(&path, &db).await?;
                info!(path = %path.display(), "seeded new database with default admin user");
                db
            }
            Err(err) => return Err(StoreError::Io(err)),
        };

        Ok(Self {
            path,
            db: Mutex::new(db),
        })
    }

    /// Snapshot of all media items, most recently added first.
    pub async fn media_items(&self) -> Vec<MediaItem> {
        self.db.lock().await.media.clone()
    }

    pub async fn media_count(&self) -> usize {
        self.db.lock().await.media.len()
    }

    pub async fn find_media(&self, id: &str) -> Option<MediaItem> {
        self.db
            .lock()
            .await
            .media
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// Inserts the item at the front of the collection and persists.
    pub async fn add_media(&self, item: MediaItem) -> Result<(), StoreError> {
        let mut db = self.db.lock().await;
        db.media.insert(0, item);
        persist(&self.path, &db).await
    }

    /// Removes the item with the given id and persists. Returns false (and
    /// does not persist) when the id is unknown.
    pub async fn remove_media(&self, id: &str) -> Result<bool, StoreError> {
        let mut db = self.db.lock().await;
        let Some(index) = db.media.iter().position(|item| item.id == id) else {
            return Ok(false);
        };
        db.media.remove(index);
        persist(&self.path, &db).await?;
        Ok(true)
    }

    /// Plaintext comparison against the stored user set. Known weakness,
    /// kept for fidelity with the persisted format.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> bool {
        self.db
            .lock()
            .await
            .users
            .iter()
            .any(|user| user.username == username && user.password == password)
    }
}

async fn persist(path: &Path, db: &Database) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec_pretty(db).map_err(StoreError::Corrupt)?;
    let mut file = AtomicFile::new(path).await?;
    if let Err(err) = file.write_all(&bytes).await {
        file.cleanup().await;
        return Err(StoreError::Io(err));
    }
    file.finalize().await?;
    Ok(())
}
