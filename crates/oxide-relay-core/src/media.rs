//! Media file classification.

use std::fmt;
use std::path::{Path, PathBuf};

static PHOTO_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];
static VIDEO_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "webm"];

/// How a file is presented by the chat transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Still image, eligible for grouped sends.
    Photo,
    /// Video clip, eligible for grouped sends.
    Video,
    /// Anything else; only ever sent on its own.
    Document,
}

impl MediaKind {
    /// Classify a path by its (case-insensitive) extension.
    ///
    /// # Examples
    ///
    /// ```
    /// use oxide_relay_core::media::MediaKind;
    /// assert_eq!(MediaKind::from_path("a/B.JPG"), MediaKind::Photo);
    /// assert_eq!(MediaKind::from_path("clip.webm"), MediaKind::Video);
    /// assert_eq!(MediaKind::from_path("anim.gif"), MediaKind::Document);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let extension = path
            .as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some(ext) if PHOTO_EXTENSIONS.contains(&ext) => Self::Photo,
            Some(ext) if VIDEO_EXTENSIONS.contains(&ext) => Self::Video,
            _ => Self::Document,
        }
    }

    /// Whether the kind may take part in a grouped send.
    #[must_use]
    pub const fn is_groupable(self) -> bool {
        matches!(self, Self::Photo | Self::Video)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Document => "document",
        };
        f.write_str(label)
    }
}

/// A downloaded file awaiting delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRef {
    /// Absolute path inside the fetch's scratch directory.
    pub path: PathBuf,
    /// Kind inferred from the extension.
    pub kind: MediaKind,
}

impl FileRef {
    /// Create a reference, classifying the file by extension.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let kind = MediaKind::from_path(&path);
        Self { path, kind }
    }

    /// File name used when uploading.
    #[must_use]
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map_or_else(|| "file".to_string(), |name| name.to_string_lossy().into_owned())
    }
}

/// Payload handed to the chat transport for one media item.
#[derive(Clone, PartialEq, Eq)]
pub struct MediaItem {
    /// Presentation kind.
    pub kind: MediaKind,
    /// Upload file name.
    pub file_name: String,
    /// File contents.
    pub bytes: Vec<u8>,
    /// Caption, set on at most one item per dispatch.
    pub caption: Option<String>,
}

impl fmt::Debug for MediaItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaItem")
            .field("kind", &self.kind)
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .field("caption", &self.caption)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert_eq!(MediaKind::from_path("/tmp/x/1.png"), MediaKind::Photo);
        assert_eq!(MediaKind::from_path("/tmp/x/1.WEBP"), MediaKind::Photo);
        assert_eq!(MediaKind::from_path("/tmp/x/1.MOV"), MediaKind::Video);
        assert_eq!(MediaKind::from_path("/tmp/x/1.mp3"), MediaKind::Document);
        assert_eq!(MediaKind::from_path("/tmp/x/noext"), MediaKind::Document);
        assert!(MediaKind::Video.is_groupable());
        assert!(!MediaKind::Document.is_groupable());
    }

    #[test]
    fn test_file_ref() {
        let file = FileRef::new("/tmp/relay-1/instagram_01.jpg");
        assert_eq!(file.kind, MediaKind::Photo);
        assert_eq!(file.file_name(), "instagram_01.jpg");
    }
}
