//! Upload gateway: accepts uploaded bytes, checks what they are and stores
//! them on disk under a generated filename.

use crate::error::{ServiceError, ServiceResult};
use anyhow::Context;
use rand::Rng;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Audio,
}

impl MediaKind {
    fn mime_prefix(&self) -> &'static str {
        match self {
            MediaKind::Image => "image/",
            MediaKind::Audio => "audio/",
        }
    }

    fn rejection(&self) -> &'static str {
        match self {
            MediaKind::Image => "Only image files are allowed",
            MediaKind::Audio => "Only audio files are allowed",
        }
    }
}

/// Where an upload goes. Each category is a directory under `uploads/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadCategory {
    Avatars,
    Thumbnails,
    Mp3,
    Albums,
    Playlists,
}

impl UploadCategory {
    pub const ALL: [UploadCategory; 5] = [
        UploadCategory::Avatars,
        UploadCategory::Thumbnails,
        UploadCategory::Mp3,
        UploadCategory::Albums,
        UploadCategory::Playlists,
    ];

    pub fn dir_name(&self) -> &'static str {
        match self {
            UploadCategory::Avatars => "avatars",
            UploadCategory::Thumbnails => "thumbnails",
            UploadCategory::Mp3 => "mp3",
            UploadCategory::Albums => "albums",
            UploadCategory::Playlists => "playlists",
        }
    }

    pub fn kind(&self) -> MediaKind {
        match self {
            UploadCategory::Mp3 => MediaKind::Audio,
            _ => MediaKind::Image,
        }
    }

    fn file_prefix(&self) -> &'static str {
        match self {
            UploadCategory::Avatars => "avatar",
            UploadCategory::Thumbnails => "thumbnail",
            UploadCategory::Mp3 => "audio",
            UploadCategory::Albums => "album",
            UploadCategory::Playlists => "playlist",
        }
    }
}

impl fmt::Display for UploadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_image_bytes: u64,
    pub max_audio_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        UploadLimits {
            max_image_bytes: 5 * 1024 * 1024,
            max_audio_bytes: 50 * 1024 * 1024,
        }
    }
}

impl UploadLimits {
    pub fn for_kind(&self, kind: MediaKind) -> u64 {
        match kind {
            MediaKind::Image => self.max_image_bytes,
            MediaKind::Audio => self.max_audio_bytes,
        }
    }

    /// The largest request body that can carry a full set of uploads.
    pub fn max_request_bytes(&self) -> usize {
        (self.max_image_bytes + self.max_audio_bytes + 1024 * 1024) as usize
    }
}

/// Checks `bytes` against the category's media class and size limit.
/// Returns the file extension of the sniffed type.
pub fn check_upload(
    category: UploadCategory,
    bytes: &[u8],
    limits: &UploadLimits,
) -> ServiceResult<&'static str> {
    let kind = category.kind();
    let max = limits.for_kind(kind);
    if bytes.len() as u64 > max {
        return Err(ServiceError::Validation(format!(
            "File too large, the limit is {:#}",
            byte_unit::Byte::from(max)
        )));
    }
    match infer::get(bytes) {
        Some(sniffed) if sniffed.mime_type().starts_with(kind.mime_prefix()) => {
            Ok(sniffed.extension())
        }
        _ => Err(ServiceError::Validation(kind.rejection().to_string())),
    }
}

pub trait MediaStore: Send + Sync {
    /// Stores an upload and returns the filename it can be referenced by.
    fn store(&self, category: UploadCategory, bytes: &[u8]) -> ServiceResult<String>;

    /// Removes a stored upload. Removing a missing one is not an error.
    fn discard(&self, category: UploadCategory, filename: &str) -> ServiceResult<()>;

    /// Directory served as `/uploads`.
    fn uploads_dir(&self) -> &Path;
}

pub struct FileMediaStore {
    uploads_dir: PathBuf,
    limits: UploadLimits,
}

impl FileMediaStore {
    pub fn new<P: AsRef<Path>>(media_path: P, limits: UploadLimits) -> anyhow::Result<Self> {
        let uploads_dir = media_path.as_ref().join("uploads");
        for category in UploadCategory::ALL {
            let dir = uploads_dir.join(category.dir_name());
            fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create upload directory {:?}", dir))?;
        }
        Ok(FileMediaStore {
            uploads_dir,
            limits,
        })
    }

    pub fn limits(&self) -> &UploadLimits {
        &self.limits
    }
}

fn generate_filename(category: UploadCategory, extension: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix: u32 = rand::rng().random_range(0..1_000_000_000);
    format!(
        "{}-{}-{}.{}",
        category.file_prefix(),
        millis,
        suffix,
        extension
    )
}

impl MediaStore for FileMediaStore {
    fn store(&self, category: UploadCategory, bytes: &[u8]) -> ServiceResult<String> {
        let extension = check_upload(category, bytes, &self.limits)?;
        let filename = generate_filename(category, extension);
        let path = self.uploads_dir.join(category.dir_name()).join(&filename);
        fs::write(&path, bytes).with_context(|| format!("Failed to write upload {:?}", path))?;
        debug!("Stored {} bytes as {}/{}", bytes.len(), category, filename);
        Ok(filename)
    }

    fn discard(&self, category: UploadCategory, filename: &str) -> ServiceResult<()> {
        let path = self.uploads_dir.join(category.dir_name()).join(filename);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Removed {}/{}", category, filename);
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(anyhow::Error::new(err)
                .context(format!("Failed to remove upload {:?}", path))
                .into()),
        }
    }

    fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }
}


#[cfg(test)]
mod tests {
    use super::test_files::{MP3, PNG};
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn images_pass_the_image_gate() {
        let ext = check_upload(UploadCategory::Albums, PNG, &UploadLimits::default()).unwrap();
        assert_eq!(ext, "png");
    }

    #[test]
    fn audio_is_rejected_where_images_are_expected() {
        let err = check_upload(UploadCategory::Avatars, MP3, &UploadLimits::default()).unwrap_err();
        assert_eq!(err.to_string(), "Only image files are allowed");
    }

    #[test]
    fn images_are_rejected_where_audio_is_expected() {
        let err = check_upload(UploadCategory::Mp3, PNG, &UploadLimits::default()).unwrap_err();
        assert_eq!(err.to_string(), "Only audio files are allowed");
        assert_eq!(
            check_upload(UploadCategory::Mp3, MP3, &UploadLimits::default()).unwrap(),
            "mp3"
        );
    }

    #[test]
    fn unknown_bytes_are_rejected() {
        let err =
            check_upload(UploadCategory::Thumbnails, b"hello", &UploadLimits::default()).unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(check_upload(UploadCategory::Thumbnails, b"", &UploadLimits::default()).is_err());
    }

    #[test]
    fn oversized_uploads_are_rejected() {
        let limits = UploadLimits {
            max_image_bytes: 4,
            max_audio_bytes: 4,
        };
        let err = check_upload(UploadCategory::Albums, PNG, &limits).unwrap_err();
        assert!(err.to_string().starts_with("File too large"));
    }

    #[test]
    fn stores_under_category_directory() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileMediaStore::new(temp_dir.path(), UploadLimits::default()).unwrap();
        for category in UploadCategory::ALL {
            assert!(store.uploads_dir().join(category.dir_name()).is_dir());
        }

        let filename = store.store(UploadCategory::Playlists, PNG).unwrap();
        assert!(filename.starts_with("playlist-"));
        assert!(filename.ends_with(".png"));
        let stored = fs::read(temp_dir.path().join("uploads/playlists").join(&filename)).unwrap();
        assert_eq!(stored, PNG);

        let other = store.store(UploadCategory::Playlists, PNG).unwrap();
        assert_ne!(filename, other);
    }

    #[test]
    fn discarded_uploads_are_gone() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileMediaStore::new(temp_dir.path(), UploadLimits::default()).unwrap();
        let filename = store.store(UploadCategory::Albums, PNG).unwrap();
        let path = temp_dir.path().join("uploads/albums").join(&filename);
        assert!(path.is_file());

        store.discard(UploadCategory::Albums, &filename).unwrap();
        assert!(!path.exists());
        store.discard(UploadCategory::Albums, &filename).unwrap();
    }

    #[test]
    fn rejected_uploads_leave_nothing_behind() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileMediaStore::new(temp_dir.path(), UploadLimits::default()).unwrap();
        assert!(store.store(UploadCategory::Mp3, PNG).is_err());
        let entries = fs::read_dir(temp_dir.path().join("uploads/mp3")).unwrap().count();
        assert_eq!(entries, 0);
    }
}
