//! Persist private keys as PEM files in a directory.
//!
//! A [KeyStore] owns a single directory. [KeyStore::load] walks it (recursively, in file-name
//! order) and returns the first key stored in a file whose name ends with [Config::suffix].
//! [KeyStore::generate] creates a new key and writes it to [Config::file_name] so that a later
//! [KeyStore::load] finds it.
//!
//! Keys are stored as PKCS8 `PrivateKeyInfo` structures wrapped in a PEM `PRIVATE KEY` block,
//! readable only by their owner.
//!
//! # Example
//! ```rust
//! use commonware_identity::keystore::{Config, KeyStore};
//!
//! let dir = std::env::temp_dir().join(format!("keystore-doc-{}", std::process::id()));
//! std::fs::create_dir_all(&dir).unwrap();
//!
//! let store = KeyStore::new(Config::new(&dir));
//! let generated = store.generate("sm2").unwrap();
//! let loaded = store.load().unwrap();
//! assert_eq!(generated.ski(), loaded.ski());
//! # std::fs::remove_dir_all(&dir).unwrap();
//! ```

use crate::{Curve, PrivateKey};
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tracing::{debug, trace};
use walkdir::WalkDir;
use zeroize::Zeroizing;

/// Default suffix of file names that hold private keys.
pub const DEFAULT_SUFFIX: &str = "_sk";

/// Default name of the file written by [KeyStore::generate].
pub const DEFAULT_FILE_NAME: &str = "priv_sk";

/// Errors that can occur when loading or persisting keys.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid key at {path}: {source}")]
    Key {
        path: PathBuf,
        #[source]
        source: crate::Error,
    },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to persist {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no private key found in {0}")]
    NotFound(PathBuf),
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),
    #[error("crypto error: {0}")]
    Crypto(#[from] crate::Error),
}

/// Configuration for a [KeyStore].
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding the keys.
    pub directory: PathBuf,

    /// Suffix identifying files that hold private keys.
    pub suffix: String,

    /// Name of the file written by [KeyStore::generate].
    ///
    /// Should end with [Config::suffix].
    pub file_name: String,
}

impl Config {
    /// Create a configuration for `directory` with the default suffix and file name.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            suffix: DEFAULT_SUFFIX.to_string(),
            file_name: DEFAULT_FILE_NAME.to_string(),
        }
    }
}

/// Loads and persists private keys in a directory.
#[derive(Clone, Debug)]
pub struct KeyStore {
    cfg: Config,
}

impl KeyStore {
    /// Create a new [KeyStore] over the configured directory.
    pub fn new(cfg: Config) -> Self {
        Self { cfg }
    }

    /// Returns the configuration of the store.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Returns the path written by [KeyStore::generate].
    pub fn key_path(&self) -> PathBuf {
        self.cfg.directory.join(&self.cfg.file_name)
    }

    /// Load the first private key found in the directory.
    ///
    /// Entries are visited recursively in file-name order (following symbolic links) and only
    /// regular files whose name ends with the configured suffix are considered. The walk stops
    /// at the first such file: if it cannot be read or parsed, the error is returned (carrying
    /// its path) rather than trying the next one.
    pub fn load(&self) -> Result<PrivateKey, Error> {
        let walker = WalkDir::new(&self.cfg.directory)
            .follow_links(true)
            .sort_by_file_name();
        for entry in walker {
            let entry = entry.map_err(|err| {
                let path = err
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| self.cfg.directory.clone());
                Error::Io {
                    path,
                    source: err.into(),
                }
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() {
                continue;
            }
            if !entry.file_name().to_string_lossy().ends_with(&self.cfg.suffix) {
                trace!(path = %path.display(), "skipping entry");
                continue;
            }
            let pem = fs::read(path).map_err(|source| Error::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let pem = Zeroizing::new(pem);
            let key = PrivateKey::from_pkcs8_pem(&pem).map_err(|source| Error::Key {
                path: path.to_path_buf(),
                source,
            })?;
            debug!(path = %path.display(), curve = %key.curve(), ski = %key.ski(), "loaded private key");
            return Ok(key);
        }
        Err(Error::NotFound(self.cfg.directory.clone()))
    }

    /// Generate a private key for `algorithm` (`"ecdsa"` or `"sm2"`) and persist it.
    ///
    /// The key is written to a temporary file with owner-only permissions, synced to disk, and
    /// renamed over [KeyStore::key_path], so the key file is either absent or complete. An
    /// existing key file is replaced.
    pub fn generate(&self, algorithm: &str) -> Result<PrivateKey, Error> {
        let curve: Curve = algorithm
            .parse()
            .map_err(|_| Error::UnsupportedAlgorithm(algorithm.to_string()))?;
        let key = PrivateKey::from_rng(curve, &mut rand::rngs::OsRng);
        let pem = key.to_pkcs8_pem()?;

        let path = self.key_path();
        let temp_path = self.cfg.directory.join(format!("{}.tmp", self.cfg.file_name));
        if let Err(source) = persist(&temp_path, &path, pem.as_bytes()) {
            let _ = fs::remove_file(&temp_path);
            return Err(Error::Persist { path, source });
        }
        debug!(path = %path.display(), %curve, ski = %key.ski(), "persisted private key");
        Ok(key)
    }
}

/// Write `contents` to `temp_path` and atomically move it to `path`.
fn persist(temp_path: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(temp_path)?;

    // The mode only applies when the file is created
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))?;
    }
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);
    fs::rename(temp_path, path)
}
