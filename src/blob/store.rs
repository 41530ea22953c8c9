//! Blob storage module
//!
//! Blobs are immutable byte objects identified by the hash of their content,
//! computed the way git hashes blob objects (`"blob <size>\0"` header followed
//! by the content) with SHA-256.

use crate::content::source::{ByteSource, FileSource};
use crate::logger;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;

/// Buffer size used while hashing blob content
const HASH_BUF_LEN: usize = 64 * 1024;

/// A resolved blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    id: String,
    path: String,
    size: u64,
}

impl Blob {
    pub const fn new(id: String, path: String, size: u64) -> Self {
        Self { id, path, size }
    }

    /// Hex content hash
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Tree path the blob was resolved from, e.g. `docs/readme.md`
    pub fn path(&self) -> &str {
        &self.path
    }

    pub const fn size(&self) -> u64 {
        self.size
    }
}

/// Source of blobs addressed by tree path
pub trait BlobStore {
    type Reader: ByteSource;

    /// Resolve a tree path; `Ok(None)` when nothing servable lives there
    fn lookup(&self, tree_path: &str) -> impl Future<Output = io::Result<Option<Blob>>>;

    /// Open the content of a resolved blob
    fn open(&self, blob: &Blob) -> impl Future<Output = io::Result<Self::Reader>>;
}

/// Hash content the way git names blob objects, using SHA-256
///
/// # Examples
/// ```
/// use blobserve::blob::store::blob_id;
///
/// // Same value as `git hash-object --object-format=sha256` on an empty file
/// assert_eq!(
///     blob_id(b""),
///     "473a0f4c3be8a93681a267e3b1e9a7dcda1185436fe141f7749120a303721813"
/// );
/// ```
pub fn blob_id(content: &[u8]) -> String {
    let mut hasher = blob_hasher(content.len() as u64);
    hasher.update(content);
    hex::encode(hasher.finalize())
}

fn blob_hasher(size: u64) -> Sha256 {
    let mut hasher = Sha256::new();
    hasher.update(format!("blob {size}\0").as_bytes());
    hasher
}

#[derive(Debug, Clone)]
struct CachedId {
    size: u64,
    modified: Option<SystemTime>,
    id: String,
}

/// Blob store over a directory tree
///
/// Ids are cached per file and recomputed when size or mtime change.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    ids: Mutex<HashMap<PathBuf, CachedId>>,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ids: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn cached_id(&self, path: &Path, size: u64, modified: Option<SystemTime>) -> Option<String> {
        let ids = self.ids.lock().ok()?;
        ids.get(path)
            .filter(|c| c.size == size && c.modified == modified)
            .map(|c| c.id.clone())
    }

    fn remember_id(&self, path: PathBuf, size: u64, modified: Option<SystemTime>, id: &str) {
        if let Ok(mut ids) = self.ids.lock() {
            ids.insert(
                path,
                CachedId {
                    size,
                    modified,
                    id: id.to_string(),
                },
            );
        }
    }
}

impl BlobStore for FsBlobStore {
    type Reader = FileSource;

    async fn lookup(&self, tree_path: &str) -> io::Result<Option<Blob>> {
        let Some(relative) = clean_tree_path(tree_path) else {
            logger::log_warning(&format!("Rejected blob path: {tree_path}"));
            return Ok(None);
        };

        let root = fs::canonicalize(&self.root).await?;
        let full = match fs::canonicalize(root.join(&relative)).await {
            Ok(p) => p,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if !full.starts_with(&root) {
            logger::log_warning(&format!(
                "Path traversal attempt blocked: {} -> {}",
                tree_path,
                full.display()
            ));
            return Ok(None);
        }

        let metadata = fs::metadata(&full).await?;
        if !metadata.is_file() {
            return Ok(None);
        }
        let size = metadata.len();
        let modified = metadata.modified().ok();

        let id = match self.cached_id(&full, size, modified) {
            Some(id) => id,
            None => {
                let id = hash_file(&full, size).await?;
                self.remember_id(full, size, modified, &id);
                id
            }
        };

        Ok(Some(Blob::new(id, relative, size)))
    }

    async fn open(&self, blob: &Blob) -> io::Result<FileSource> {
        let file = File::open(self.root.join(blob.path())).await?;
        Ok(FileSource::new(file))
    }
}

/// Normalize a URL tree path into a relative path, refusing `..`
fn clean_tree_path(tree_path: &str) -> Option<String> {
    let mut parts = Vec::new();
    for part in tree_path.split('/') {
        match part {
            "" | "." => {}
            ".." => return None,
            p => parts.push(p),
        }
    }
    if parts.is_empty() {
        return None;
    }
    let joined = parts.join("/");
    // Backslashes or drive prefixes could still escape on some platforms
    Path::new(&joined)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
        .then_some(joined)
}

async fn hash_file(path: &Path, size: u64) -> io::Result<String> {
    let mut file = File::open(path).await?;
    let mut hasher = blob_hasher(size);
    let mut buf = vec![0u8; HASH_BUF_LEN];
    let mut hashed = 0u64;
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        hashed += n as u64;
    }
    if hashed != size {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("{} changed while hashing", path.display()),
        ));
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_tree_path() {
        assert_eq!(clean_tree_path("/docs//a.md"), Some("docs/a.md".to_string()));
        assert_eq!(clean_tree_path("./a/./b"), Some("a/b".to_string()));
        assert_eq!(clean_tree_path("/a/../../etc/passwd"), None);
        assert_eq!(clean_tree_path("/"), None);
    }

    #[test]
    fn test_blob_id_depends_on_content() {
        assert_eq!(blob_id(b"same"), blob_id(b"same"));
        assert_ne!(blob_id(b"same"), blob_id(b"different"));
        assert_eq!(blob_id(b"x").len(), 64);
    }

    #[tokio::test]
    async fn test_lookup_and_open() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        std::fs::write(dir.path().join("docs/readme.md"), b"# Title\n").unwrap();

        let store = FsBlobStore::new(dir.path());
        let blob = store.lookup("/docs/readme.md").await.unwrap().unwrap();
        assert_eq!(blob.path(), "docs/readme.md");
        assert_eq!(blob.size(), 8);
        assert_eq!(blob.id(), blob_id(b"# Title\n"));

        let mut reader = store.open(&blob).await.unwrap();
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"# Title\n");
        assert!(reader.supports_seek());
    }

    #[tokio::test]
    async fn test_lookup_misses() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("docs")).unwrap();
        let store = FsBlobStore::new(dir.path());

        assert!(store.lookup("missing.txt").await.unwrap().is_none());
        assert!(store.lookup("docs").await.unwrap().is_none());
        assert!(store.lookup("../outside").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_id_refreshes_after_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"one").unwrap();
        let store = FsBlobStore::new(dir.path());

        let first = store.lookup("a.txt").await.unwrap().unwrap();
        std::fs::write(&path, b"three").unwrap();
        let second = store.lookup("a.txt").await.unwrap().unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(second.id(), blob_id(b"three"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_is_blocked() {
        let outside = tempfile::tempdir().unwrap();
        std::fs::write(outside.path().join("secret"), b"s").unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path().join("secret"), dir.path().join("link")).unwrap();

        let store = FsBlobStore::new(dir.path());
        assert!(store.lookup("link").await.unwrap().is_none());
    }
}
