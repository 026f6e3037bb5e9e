//! Inbound media staging: type validation and on-disk placement.

use chrono::Utc;
use rand::Rng;
use std::io;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

use crate::error::ApiError;
use crate::store::MediaKind;

/// Extension / content-type tokens accepted for upload. The declared content
/// type passes when it contains one of these tokens, so `image/jpeg` and
/// `video/mp4` match while `text/plain` never does.
const ALLOWED_TOKENS: [&str; 8] = ["jpeg", "jpg", "png", "gif", "mp4", "mov", "avi", "webm"];

/// Result of placing one validated payload on disk.
pub struct StagedFile {
    pub filename: String,
    pub kind: MediaKind,
}

/// Writes validated payloads into a fixed uploads directory under
/// collision-resistant names.
#[derive(Clone, Debug)]
pub struct Stager {
    uploads_dir: PathBuf,
}

impl Stager {
    pub fn new(uploads_dir: PathBuf) -> Self {
        Self { uploads_dir }
    }

    pub async fn ensure_dir(&self) -> io::Result<()> {
        fs::create_dir_all(&self.uploads_dir).await
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    /// Validates the declared name and content type. Must be called before
    /// any payload bytes are accepted; a disallowed type never touches disk.
    pub fn validate(
        original_name: &str,
        content_type: &str,
    ) -> Result<(String, MediaKind), ApiError> {
        let extension = Path::new(original_name)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let ext_ok = ALLOWED_TOKENS.contains(&extension.as_str());
        let content_type = content_type.to_lowercase();
        let mime_ok = ALLOWED_TOKENS.iter().any(|token| content_type.contains(token));
        if !ext_ok || !mime_ok {
            debug!(original_name, content_type, "rejected upload type");
            return Err(ApiError::BadRequest("file type not allowed".into()));
        }

        let kind = if content_type.starts_with("video") {
            MediaKind::Video
        } else {
            MediaKind::Image
        };
        Ok((extension, kind))
    }

    /// Validates and writes one payload, returning the assigned filename.
    pub async fn stage(
        &self,
        original_name: &str,
        content_type: &str,
        payload: &[u8],
    ) -> Result<StagedFile, ApiError> {
        let (extension, kind) = Self::validate(original_name, content_type)?;
        let filename = staged_filename(&extension);
        fs::write(self.uploads_dir.join(&filename), payload).await?;
        info!(filename, bytes = payload.len(), "staged upload");
        Ok(StagedFile { filename, kind })
    }

    /// Resolves a stored filename for serving. Rejects anything that could
    /// escape the uploads directory.
    pub fn resolve(&self, filename: &str) -> Result<PathBuf, ApiError> {
        let path = Path::new(filename);
        let mut components = path.components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.uploads_dir.join(path)),
            _ => Err(ApiError::BadRequest("invalid filename".into())),
        }
    }

    /// Removes a staged file. Absence is not an error: delete stays
    /// idempotent even when the metadata record outlived the file.
    pub async fn remove(&self, filename: &str) -> Result<(), ApiError> {
        let path = self.resolve(filename)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

/// `<unix millis>-<random integer>.<ext>`, unique enough per upload that
/// concurrent writes never collide.
fn staged_filename(extension: &str) -> String {
    let timestamp = Utc::now().timestamp_millis();
    let nonce: u32 = rand::rng().random_range(0..1_000_000_000);
    format!("{timestamp}-{nonce}.{extension}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn make_stager() -> (tempfile::TempDir, Stager) {
        let temp = tempdir().expect("tempdir");
        let stager = Stager::new(temp.path().join("uploads"));
        (temp, stager)
    }

    #[tokio::test]
    async fn stage_writes_payload_under_generated_name() {
        let (_temp, stager) = make_stager();
        stager.ensure_dir().await.expect("ensure dir");

        let staged = stager
            .stage("cat.PNG", "image/png", b"png-bytes")
            .await
            .expect("stage");

        assert!(staged.filename.ends_with(".png"));
        assert_eq!(staged.kind, MediaKind::Image);
        let stored = std::fs::read(stager.uploads_dir().join(&staged.filename)).expect("read");
        assert_eq!(stored, b"png-bytes");
    }

    #[tokio::test]
    async fn stage_derives_video_kind_from_content_type() {
        let (_temp, stager) = make_stager();
        stager.ensure_dir().await.expect("ensure dir");

        let staged = stager
            .stage("clip.mp4", "video/mp4", b"mp4-bytes")
            .await
            .expect("stage");
        assert_eq!(staged.kind, MediaKind::Video);
    }

    #[tokio::test]
    async fn stage_rejects_disallowed_type_before_writing() {
        let (_temp, stager) = make_stager();
        stager.ensure_dir().await.expect("ensure dir");

        let result = stager.stage("notes.txt", "text/plain", b"hello").await;
        assert!(matches!(result, Err(ApiError::BadRequest(_))));

        let entries: Vec<_> = std::fs::read_dir(stager.uploads_dir())
            .expect("read dir")
            .collect();
        assert!(entries.is_empty(), "nothing may be written for rejected types");
    }

    #[tokio::test]
    async fn resolve_rejects_traversal() {
        let (_temp, stager) = make_stager();
        assert!(stager.resolve("../database.json").is_err());
        assert!(stager.resolve("a/b.png").is_err());
        assert!(stager.resolve("1700000000-42.png").is_ok());
    }

    #[tokio::test]
    async fn remove_tolerates_missing_file() {
        let (_temp, stager) = make_stager();
        stager.ensure_dir().await.expect("ensure dir");
        stager.remove("1700000000-42.png").await.expect("remove is idempotent");
    }
}
