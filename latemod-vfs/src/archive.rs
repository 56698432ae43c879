//! `.lpk` archive image format
//!
//! A bundled, read-only container for module sources: a magic header, an
//! entry directory (name, offset, size), then the payload bytes. Archives
//! let a deployment ship its whole module tree as one file on the search
//! path.
//!
//! Layout (little-endian):
//!
//! ```text
//! magic        4 bytes  b"LMPK"
//! version      u16
//! entry count  u32
//! directory    per entry: name_len u16, name (UTF-8), offset u32, size u32
//! payload      concatenated entry bytes
//! ```

use crate::error::{StoreError, StoreResult};
use crate::ModuleStore;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Archive magic bytes
pub const MAGIC: [u8; 4] = *b"LMPK";

/// Current archive format version
pub const FORMAT_VERSION: u16 = 1;

/// File extension for archive images on the search path
pub const ARCHIVE_EXTENSION: &str = "lpk";

/// Archive parse/lookup errors
#[derive(Debug, Clone, PartialEq)]
pub enum ArchiveError {
    /// Data too short to hold a header
    TooShort,
    /// Magic bytes do not match
    BadMagic,
    /// Format version not understood
    UnsupportedVersion(u16),
    /// Directory or payload runs past the end of the data
    Truncated,
    /// Entry name is not valid UTF-8
    BadEntryName,
    /// Entry not present in the directory
    EntryNotFound(String),
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArchiveError::TooShort => write!(f, "Archive data too short"),
            ArchiveError::BadMagic => write!(f, "Bad archive magic"),
            ArchiveError::UnsupportedVersion(v) => {
                write!(f, "Unsupported archive version: {}", v)
            }
            ArchiveError::Truncated => write!(f, "Archive data truncated"),
            ArchiveError::BadEntryName => write!(f, "Archive entry name is not valid UTF-8"),
            ArchiveError::EntryNotFound(name) => write!(f, "Archive entry not found: {}", name),
        }
    }
}

impl std::error::Error for ArchiveError {}

/// Header size: magic + version + entry count
const HEADER_SIZE: usize = 4 + 2 + 4;

/// A parsed archive image
///
/// Owns the raw bytes and an entry directory mapping normalized entry
/// names (forward slashes, no leading slash) to payload ranges.
#[derive(Debug, Clone)]
pub struct ArchiveImage {
    data: Vec<u8>,
    entries: BTreeMap<String, (u32, u32)>,
}

impl ArchiveImage {
    /// Parse an archive from raw bytes
    pub fn from_bytes(data: Vec<u8>) -> Result<Self, ArchiveError> {
        if data.len() < HEADER_SIZE {
            return Err(ArchiveError::TooShort);
        }
        if data[0..4] != MAGIC {
            return Err(ArchiveError::BadMagic);
        }
        let version = u16::from_le_bytes([data[4], data[5]]);
        if version != FORMAT_VERSION {
            return Err(ArchiveError::UnsupportedVersion(version));
        }
        let count = u32::from_le_bytes([data[6], data[7], data[8], data[9]]) as usize;

        let mut entries = BTreeMap::new();
        let mut pos = HEADER_SIZE;
        for _ in 0..count {
            if pos + 2 > data.len() {
                return Err(ArchiveError::Truncated);
            }
            let name_len = u16::from_le_bytes([data[pos], data[pos + 1]]) as usize;
            pos += 2;
            if pos + name_len + 8 > data.len() {
                return Err(ArchiveError::Truncated);
            }
            let name = std::str::from_utf8(&data[pos..pos + name_len])
                .map_err(|_| ArchiveError::BadEntryName)?
                .to_string();
            pos += name_len;
            let offset = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]);
            let size =
                u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]]);
            pos += 8;
            let end = offset as usize + size as usize;
            if end > data.len() {
                return Err(ArchiveError::Truncated);
            }
            entries.insert(name, (offset, size));
        }

        Ok(Self { data, entries })
    }

    /// Read an archive from a file on disk
    pub fn from_file(path: impl AsRef<Path>) -> StoreResult<Self> {
        let data = std::fs::read(path.as_ref()).map_err(StoreError::from)?;
        Self::from_bytes(data).map_err(|e| StoreError::Custom {
            message: format!("{}: {}", path.as_ref().display(), e),
        })
    }

    /// Look up an entry's bytes by name
    pub fn read_entry(&self, name: &str) -> Result<&[u8], ArchiveError> {
        let (offset, size) = self
            .entries
            .get(name)
            .copied()
            .ok_or_else(|| ArchiveError::EntryNotFound(name.to_string()))?;
        Ok(&self.data[offset as usize..(offset + size) as usize])
    }

    /// Whether the directory contains an entry
    pub fn has_entry(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterate entry names in directory order
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds archive images
///
/// Used by tests and by packaging tooling; the reader's tests construct
/// their fixtures with it.
#[derive(Debug, Default)]
pub struct ArchiveWriter {
    files: Vec<(String, Vec<u8>)>,
}

impl ArchiveWriter {
    /// Create an empty writer
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file entry. Names use forward slashes, no leading slash.
    pub fn add_file(&mut self, name: impl Into<String>, content: impl Into<Vec<u8>>) -> &mut Self {
        self.files.push((name.into(), content.into()));
        self
    }

    /// Serialize the archive image
    pub fn finish(&self) -> Vec<u8> {
        let dir_size: usize = self
            .files
            .iter()
            .map(|(name, _)| 2 + name.len() + 8)
            .sum();
        let mut payload_offset = HEADER_SIZE + dir_size;

        let mut out = Vec::with_capacity(
            payload_offset + self.files.iter().map(|(_, c)| c.len()).sum::<usize>(),
        );
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&(self.files.len() as u32).to_le_bytes());

        for (name, content) in &self.files {
            out.extend_from_slice(&(name.len() as u16).to_le_bytes());
            out.extend_from_slice(name.as_bytes());
            out.extend_from_slice(&(payload_offset as u32).to_le_bytes());
            out.extend_from_slice(&(content.len() as u32).to_le_bytes());
            payload_offset += content.len();
        }
        for (_, content) in &self.files {
            out.extend_from_slice(content);
        }
        out
    }
}

/// A read-only `ModuleStore` view into an archive image
///
/// Paths are interpreted relative to the archive root; leading slashes and
/// backslashes are normalized away so loader-side path joins keep working.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    image: Arc<ArchiveImage>,
    archive_path: PathBuf,
}

impl ArchiveStore {
    /// Wrap a parsed image. `archive_path` is kept for diagnostics and
    /// ignore-by-path checks.
    pub fn new(image: ArchiveImage, archive_path: impl Into<PathBuf>) -> Self {
        Self {
            image: Arc::new(image),
            archive_path: archive_path.into(),
        }
    }

    /// Open an archive file from disk
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let image = ArchiveImage::from_file(path.as_ref())?;
        Ok(Self::new(image, path.as_ref()))
    }

    /// Path of the backing archive file
    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    /// The underlying image
    pub fn image(&self) -> &ArchiveImage {
        &self.image
    }

    fn entry_name(&self, path: &Path) -> String {
        let normalized = path.to_string_lossy().replace('\\', "/");
        normalized.trim_start_matches('/').to_string()
    }
}

impl ModuleStore for ArchiveStore {
    fn read_file(&self, path: &Path) -> StoreResult<Vec<u8>> {
        let name = self.entry_name(path);
        self.image
            .read_entry(&name)
            .map(|bytes| bytes.to_vec())
            .map_err(|_| StoreError::NotFound { path: name })
    }

    fn write_file(&self, path: &Path, _content: &[u8]) -> StoreResult<()> {
        Err(StoreError::ReadOnly {
            path: path.to_string_lossy().to_string(),
        })
    }

    fn exists(&self, path: &Path) -> bool {
        self.image.has_entry(&self.entry_name(path))
    }

    fn is_file(&self, path: &Path) -> bool {
        self.exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        let mut prefix = self.entry_name(path);
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        self.image.entry_names().any(|k| k.starts_with(&prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_archive() -> Vec<u8> {
        let mut writer = ArchiveWriter::new();
        writer.add_file("math.mod", b"var PI = 3.14;".to_vec());
        writer.add_file("pkg/init.mod", b"var version = 1;".to_vec());
        writer.add_file("pkg/sub.mod", b"var deep = true;".to_vec());
        writer.finish()
    }

    #[test]
    fn test_roundtrip() {
        let data = create_test_archive();
        let image = ArchiveImage::from_bytes(data).unwrap();

        assert_eq!(image.len(), 3);
        assert_eq!(image.read_entry("math.mod").unwrap(), b"var PI = 3.14;");
        assert_eq!(image.read_entry("pkg/sub.mod").unwrap(), b"var deep = true;");
    }

    #[test]
    fn test_bad_magic() {
        let mut data = create_test_archive();
        data[0] = b'X';
        assert_eq!(
            ArchiveImage::from_bytes(data).unwrap_err(),
            ArchiveError::BadMagic
        );
    }

    #[test]
    fn test_unsupported_version() {
        let mut data = create_test_archive();
        data[4] = 0xFF;
        assert!(matches!(
            ArchiveImage::from_bytes(data).unwrap_err(),
            ArchiveError::UnsupportedVersion(_)
        ));
    }

    #[test]
    fn test_truncated_directory() {
        let data = create_test_archive();
        let truncated = data[..HEADER_SIZE + 3].to_vec();
        assert_eq!(
            ArchiveImage::from_bytes(truncated).unwrap_err(),
            ArchiveError::Truncated
        );
    }

    #[test]
    fn test_truncated_payload() {
        let data = create_test_archive();
        let truncated = data[..data.len() - 4].to_vec();
        assert_eq!(
            ArchiveImage::from_bytes(truncated).unwrap_err(),
            ArchiveError::Truncated
        );
    }

    #[test]
    fn test_too_short() {
        assert_eq!(
            ArchiveImage::from_bytes(b"LM".to_vec()).unwrap_err(),
            ArchiveError::TooShort
        );
    }

    #[test]
    fn test_entry_not_found() {
        let image = ArchiveImage::from_bytes(create_test_archive()).unwrap();
        assert!(matches!(
            image.read_entry("missing.mod").unwrap_err(),
            ArchiveError::EntryNotFound(_)
        ));
    }

    #[test]
    fn test_empty_archive() {
        let image = ArchiveImage::from_bytes(ArchiveWriter::new().finish()).unwrap();
        assert!(image.is_empty());
    }

    #[test]
    fn test_store_reads() {
        let image = ArchiveImage::from_bytes(create_test_archive()).unwrap();
        let store = ArchiveStore::new(image, "bundle.lpk");

        assert_eq!(
            store.read_file(Path::new("math.mod")).unwrap(),
            b"var PI = 3.14;"
        );
        // Leading slash and backslashes are normalized.
        assert_eq!(
            store.read_file(Path::new("/pkg\\sub.mod")).unwrap(),
            b"var deep = true;"
        );
        assert!(store.is_file(Path::new("pkg/init.mod")));
        assert!(store.is_dir(Path::new("pkg")));
        assert!(!store.is_dir(Path::new("math.mod")));
    }

    #[test]
    fn test_store_is_read_only() {
        let image = ArchiveImage::from_bytes(create_test_archive()).unwrap();
        let store = ArchiveStore::new(image, "bundle.lpk");

        let result = store.write_file(Path::new("new.mod"), b"x");
        assert!(matches!(result.unwrap_err(), StoreError::ReadOnly { .. }));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("latemod_arc_{}.lpk", std::process::id()));
        std::fs::write(&path, create_test_archive()).unwrap();

        let store = ArchiveStore::open(&path).unwrap();
        assert_eq!(store.archive_path(), path.as_path());
        assert_eq!(store.image().len(), 3);

        std::fs::remove_file(&path).unwrap();
    }
}
