use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use tracing::{info, warn};

use crate::display::Rgb565;
use crate::error::StorageError;

/// File storage as the device sees it: flat device paths like `/out.txt`.
/// Implementations log their own failures; callers only get the error back.
pub trait Storage {
    /// create or truncate `path` and write `content` into it
    fn write_file(&mut self, path: &str, content: &str) -> Result<(), StorageError>;

    fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    fn exists(&self, path: &str) -> bool;
}

/// Storage rooted in a host directory, standing in for the device's flash.
#[derive(Debug, Clone)]
pub struct DirStorage {
    root: PathBuf,
}

impl DirStorage {
    /// use `root` as the filesystem root, creating it if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|source| StorageError::Io {
            path: root.display().to_string(),
            source,
        })?;
        Ok(DirStorage { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// map a device path onto the host, refusing anything that climbs out
    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        let mut depth = 0;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                _ => return Err(StorageError::InvalidPath(path.to_string())),
            }
        }
        if depth == 0 {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(resolved)
    }
}

impl Storage for DirStorage {
    fn write_file(&mut self, path: &str, content: &str) -> Result<(), StorageError> {
        info!(path, "writing file");
        let target = self.resolve(path).map_err(|e| {
            warn!(path, "refusing to write outside storage root");
            e
        })?;
        let written = match target.parent() {
            Some(parent) => fs::create_dir_all(parent),
            None => Ok(()),
        }
        .and_then(|()| fs::write(&target, content));
        match written {
            Ok(()) => {
                info!(path, bytes = content.len(), "file written");
                Ok(())
            }
            Err(source) => {
                warn!(path, error = %source, "write failed");
                Err(StorageError::Io {
                    path: path.to_string(),
                    source,
                })
            }
        }
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        let target = self.resolve(path)?;
        fs::read(&target).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                warn!(path, "file not found");
                StorageError::NotFound(path.to_string())
            } else {
                warn!(path, error = %source, "failed to open file for reading");
                StorageError::Io {
                    path: path.to_string(),
                    source,
                }
            }
        })
    }

    fn exists(&self, path: &str) -> bool {
        self.resolve(path).map(|p| p.is_file()).unwrap_or(false)
    }
}

/// in-memory Storage for tests; can be told to fail every write
#[derive(Debug, Default)]
pub struct MemStorage {
    pub files: BTreeMap<String, Vec<u8>>,
    pub fail_writes: bool,
}

impl MemStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// file contents as text, if present
    pub fn text(&self, path: &str) -> Option<&str> {
        self.files
            .get(path)
            .and_then(|bytes| std::str::from_utf8(bytes).ok())
    }
}

impl Storage for MemStorage {
    fn write_file(&mut self, path: &str, content: &str) -> Result<(), StorageError> {
        if self.fail_writes {
            warn!(path, "write failed");
            return Err(StorageError::Io {
                path: path.to_string(),
                source: io::Error::new(io::ErrorKind::Other, "storage is read-only"),
            });
        }
        self.files.insert(path.to_string(), content.as_bytes().to_vec());
        Ok(())
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(path.to_string()))
    }

    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }
}

/// Read a raw RGB565 picture (big-endian pixels). A short file is padded
/// with black, a long one cut to `pixel_count`.
pub fn read_rgb565(
    storage: &dyn Storage,
    path: &str,
    pixel_count: usize,
) -> Result<Vec<Rgb565>, StorageError> {
    let bytes = storage.read_file(path)?;
    let mut pixels: Vec<Rgb565> = bytes
        .chunks_exact(2)
        .take(pixel_count)
        .map(|pair| Rgb565(u16::from_be_bytes([pair[0], pair[1]])))
        .collect();
    if pixels.len() < pixel_count {
        warn!(
            path,
            expected = pixel_count,
            got = pixels.len(),
            "failed to read the expected amount of data"
        );
        pixels.resize(pixel_count, Rgb565::BLACK);
    }
    Ok(pixels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_storage_writes_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = DirStorage::open(dir.path()).unwrap();
        s.write_file("/notes/out.txt", "hello").unwrap();
        assert_eq!(
            fs::read_to_string(dir.path().join("notes").join("out.txt")).unwrap(),
            "hello"
        );
        assert!(s.exists("/notes/out.txt"));
        assert_eq!(s.read_file("/notes/out.txt").unwrap(), b"hello");
    }

    #[test]
    fn test_dir_storage_truncates_on_write() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = DirStorage::open(dir.path()).unwrap();
        s.write_file("/a", "a longer value").unwrap();
        s.write_file("/a", "short").unwrap();
        assert_eq!(s.read_file("/a").unwrap(), b"short");
    }

    #[test]
    fn test_dir_storage_refuses_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = DirStorage::open(dir.path().join("root")).unwrap();
        let e = s.write_file("/../escape.txt", "x").unwrap_err();
        assert!(matches!(e, StorageError::InvalidPath(_)));
        assert!(!dir.path().join("escape.txt").exists());
    }

    #[test]
    fn test_dir_storage_refuses_empty_path() {
        let dir = tempfile::tempdir().unwrap();
        let mut s = DirStorage::open(dir.path()).unwrap();
        assert!(matches!(
            s.write_file("/", "x"),
            Err(StorageError::InvalidPath(_))
        ));
    }

    #[test]
    fn test_dir_storage_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let s = DirStorage::open(dir.path()).unwrap();
        assert!(!s.exists("/nope.raw"));
        assert!(matches!(
            s.read_file("/nope.raw"),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_mem_storage_failing_writes() {
        let mut s = MemStorage::new();
        s.fail_writes = true;
        assert!(s.write_file("/x", "y").is_err());
        assert!(!s.exists("/x"));
    }

    #[test]
    fn test_read_rgb565_is_big_endian() {
        let mut s = MemStorage::new();
        s.files
            .insert("/p.raw".into(), vec![0xf8, 0x00, 0x00, 0x1f, 0x07, 0xe0]);
        let px = read_rgb565(&s, "/p.raw", 3).unwrap();
        assert_eq!(px, vec![Rgb565::RED, Rgb565::BLUE, Rgb565::GREEN]);
    }

    #[test]
    fn test_read_rgb565_pads_short_file() {
        let mut s = MemStorage::new();
        s.files.insert("/p.raw".into(), vec![0xff, 0xff, 0xff]);
        let px = read_rgb565(&s, "/p.raw", 4).unwrap();
        assert_eq!(
            px,
            vec![Rgb565::WHITE, Rgb565::BLACK, Rgb565::BLACK, Rgb565::BLACK]
        );
    }

    #[test]
    fn test_read_rgb565_cuts_long_file() {
        let mut s = MemStorage::new();
        s.files.insert("/p.raw".into(), vec![0u8; 64]);
        assert_eq!(read_rgb565(&s, "/p.raw", 2).unwrap().len(), 2);
    }
}
