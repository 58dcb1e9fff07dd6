//! Blob store adapters.
//!
//! Implement [`StoragePort`] (and through it [`ConfigPort`]) for the
//! session.  Two backends:
//!
//! - [`MemoryBlobStore`]: shared in-memory map, used by tests and demos.
//!   Clones share the same map, so a test can hand one clone to the
//!   service and inspect another.
//! - [`FileBlobStore`]: one file per key under `<root>/<namespace>/`,
//!   replaced atomically through a temp file and rename.
//!
//! The config blob is `postcard`-encoded under `reverb::config`.

use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{info, warn};

use crate::app::ports::{ConfigError, ConfigPort, StorageError, StoragePort};
use crate::config::{SessionConfig, validate_config};

const CONFIG_NAMESPACE: &str = "reverb";
const CONFIG_KEY: &str = "config";

// ───────────────────────────────────────────────────────────────
// In-memory backend
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    store: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{}::{}", namespace, key)
    }

    fn map(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.store
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.map().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map().is_empty()
    }
}

impl StoragePort for MemoryBlobStore {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.map()
            .get(&Self::composite_key(namespace, key))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.map()
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.map().remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.map().contains_key(&Self::composite_key(namespace, key))
    }
}

// ───────────────────────────────────────────────────────────────
// File backend
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(map_io)?;
        info!("FileBlobStore: opened {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, namespace: &str, key: &str) -> Result<PathBuf, StorageError> {
        if !is_safe_component(namespace) || !is_safe_component(key) {
            warn!("FileBlobStore: rejected name {}::{}", namespace, key);
            return Err(StorageError::IoError);
        }
        Ok(self.root.join(namespace).join(key))
    }
}

fn is_safe_component(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b == b'.')
}

fn map_io(err: io::Error) -> StorageError {
    match err.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound,
        io::ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::IoError,
    }
}

/// Write through a sibling temp file, then rename over the target.
fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "blob path has no parent"))?;
    fs::create_dir_all(dir)?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "blob path has no name"))?;
    let tmp_path = dir.join(format!(
        ".{}.tmp.{}",
        file_name,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    ));

    let result = (|| -> io::Result<()> {
        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;
        file.write_all(data)?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;
        if let Ok(parent) = fs::File::open(dir) {
            let _ = parent.sync_all();
        }
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    result
}

impl StoragePort for FileBlobStore {
    fn read(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(self.blob_path(namespace, key)?).map_err(map_io)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        atomic_write(&self.blob_path(namespace, key)?, data).map_err(map_io)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.blob_path(namespace, key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(map_io(e)),
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.blob_path(namespace, key)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }
}

// ───────────────────────────────────────────────────────────────
// Config blob
// ───────────────────────────────────────────────────────────────

/// Any blob store can hold the session config.
impl<S: StoragePort> ConfigPort for S {
    fn load(&self) -> Result<SessionConfig, ConfigError> {
        match self.read(CONFIG_NAMESPACE, CONFIG_KEY) {
            Ok(bytes) => {
                let cfg: SessionConfig =
                    postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                validate_config(&cfg)?;
                info!("BlobStore: loaded config");
                Ok(cfg)
            }
            Err(StorageError::NotFound) => {
                info!("BlobStore: no stored config, using defaults");
                Ok(SessionConfig::default())
            }
            Err(_) => Err(ConfigError::IoError),
        }
    }

    fn save(&mut self, config: &SessionConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write(CONFIG_NAMESPACE, CONFIG_KEY, &bytes)
            .map_err(|_| ConfigError::IoError)?;
        info!("BlobStore: config saved");
        Ok(())
    }
}
