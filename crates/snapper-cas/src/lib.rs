//! # snapper-cas
//!
//! Content-addressed blob store for binary assets.
//!
//! Payloads are keyed by the uppercase hex SHA-256 of their decoded bytes
//! and stored compressed under a two-level shard layout. Reads are
//! transparent across every codec generation that ever wrote to the tree.
//!
//! ## Directory Layout
//!
//! ```text
//! <data_dir>/
//! └── 84D/
//!     └── 898/
//!         ├── 84D8...7882            # legacy raw
//!         ├── 84D8...7882.gz         # legacy gzip
//!         └── 84D8...7882.snappy     # current
//! <spool_dir>/
//! └── 84D/
//!     └── 898/
//!         └── 84D8...7882.a1B2c3.tmp # in-flight write
//! ```
//!
//! ## Write Protocol
//!
//! New blobs are compressed into a uniquely named spool file, synced, and
//! then committed with a rename that refuses to replace an existing
//! destination. Readers therefore see either nothing or a complete blob.
//! Losing the commit race to another writer of the same address is
//! success: the content is identical by construction.

pub mod address;
pub mod codec;
pub mod flags;
pub mod migrate;
pub mod service;

pub use address::{blob_location, content_address};
pub use codec::{BlobReader, Codec};
pub use flags::AssetFlags;
pub use migrate::{find_legacy_blobs, migrate_blob, MigrationOutcome};
pub use service::{AssetIndex, AssetRecord, AssetService, MemoryIndex};

use std::ffi::OsString;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use base64::prelude::{Engine as _, BASE64_STANDARD};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, instrument, warn};
use walkdir::WalkDir;

/// Errors that can occur during store operations
#[derive(Error, Debug)]
pub enum CasError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Blob not found: {hash}")]
    NotFound { hash: String },

    #[error("Invalid base64 payload: {0}")]
    InvalidInput(#[from] base64::DecodeError),

    #[error("Invalid content address: {hash:?}")]
    InvalidAddress { hash: String },

    #[error("Data dir {data_dir:?} and spool dir {spool_dir:?} are on different filesystems")]
    CrossDevice {
        data_dir: PathBuf,
        spool_dir: PathBuf,
    },

    #[error("Validation failed for {path:?}: expected {expected}, got {actual}")]
    ValidationFailed {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Unknown asset: {id}")]
    UnknownAsset { id: String },
}

pub type Result<T> = std::result::Result<T, CasError>;

/// Blob store bound to a data root and a spool root on the same volume.
#[derive(Debug, Clone)]
pub struct AssetStore {
    data_dir: PathBuf,
    spool_dir: PathBuf,
}

impl AssetStore {
    /// Open a store, creating both roots if they don't exist.
    ///
    /// Fails with [`CasError::CrossDevice`] when the roots live on different
    /// filesystems, since commits rely on rename atomicity.
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(data_dir: P, spool_dir: Q) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let spool_dir = spool_dir.as_ref().to_path_buf();
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(&spool_dir)?;
        check_same_device(&data_dir, &spool_dir)?;
        Ok(Self {
            data_dir,
            spool_dir,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn spool_dir(&self) -> &Path {
        &self.spool_dir
    }

    /// Unsuffixed blob location for `address` under the data root.
    pub fn blob_path(&self, address: &str) -> PathBuf {
        blob_location(&self.data_dir, address)
    }

    /// Find the stored file for `address`, probing codecs in priority order.
    pub fn locate(&self, address: &str) -> Option<(PathBuf, Codec)> {
        if !address::is_shardable(address) {
            return None;
        }
        let base = self.blob_path(address);
        Codec::PROBE_ORDER.iter().find_map(|&codec| {
            let path = with_codec(&base, codec);
            path.exists().then_some((path, codec))
        })
    }

    /// Check if a blob exists under any known codec.
    pub fn exists(&self, address: &str) -> bool {
        self.locate(address).is_some()
    }

    /// Open a decoded stream over the blob stored for `address`.
    #[instrument(skip(self), level = "debug")]
    pub fn load(&self, address: &str) -> Result<BlobReader> {
        if !address::is_shardable(address) {
            return Err(CasError::InvalidAddress {
                hash: address.to_string(),
            });
        }
        let Some((path, codec)) = self.locate(address) else {
            return Err(not_found(address));
        };
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found(address)),
            Err(e) => return Err(CasError::Io(e)),
        };
        debug!(%codec, "opened blob");
        Ok(codec.reader(file))
    }

    /// Load and fully decode a blob.
    pub fn read_all(&self, address: &str) -> Result<Vec<u8>> {
        Ok(self.load(address)?.into_bytes()?)
    }

    /// Load a blob and render it as standard base64.
    pub fn get_as_base64(&self, address: &str) -> Result<String> {
        let data = self.read_all(address)?;
        Ok(BASE64_STANDARD.encode(data))
    }

    /// Store a base64-encoded payload, returning its content address.
    ///
    /// Idempotent: storing the same payload twice yields the same address
    /// and at most one physical write.
    pub fn store(&self, payload: &str) -> Result<String> {
        // Line breaks inside wrapped base64 are not part of the payload.
        let compact: Vec<u8> = payload
            .bytes()
            .filter(|b| !matches!(b, b'\r' | b'\n'))
            .collect();
        let raw = BASE64_STANDARD.decode(compact)?;
        self.store_bytes(&raw)
    }

    /// Store raw payload bytes, returning their content address.
    #[instrument(skip(self, raw), fields(len = raw.len()), level = "debug")]
    pub fn store_bytes(&self, raw: &[u8]) -> Result<String> {
        let address = content_address(raw);

        if let Some((_, codec)) = self.locate(&address) {
            debug!(%address, %codec, "blob already stored");
            return Ok(address);
        }

        let target = with_codec(&self.blob_path(&address), Codec::CURRENT);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }

        let spool_shard = blob_location(&self.spool_dir, &address);
        let spool_parent = spool_shard.parent().unwrap_or(&self.spool_dir);
        fs::create_dir_all(spool_parent)?;

        // Dropping the temp file on any early return removes it from the spool.
        let mut temp = tempfile::Builder::new()
            .prefix(&format!("{}.", address))
            .suffix(".tmp")
            .tempfile_in(spool_parent)?;
        codec::encode_current(temp.as_file_mut(), raw)?;
        temp.as_file().sync_all()?;
        set_readonly(temp.as_file())?;

        match temp.persist_noclobber(&target) {
            Ok(_) => {
                debug!(%address, path = ?target, "committed blob");
                Ok(address)
            }
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                debug!(%address, "concurrent writer committed first");
                Ok(address)
            }
            Err(e) => {
                let path = e.file.path().to_path_buf();
                if let Err(cleanup) = e.file.close() {
                    warn!(?path, error = %cleanup, "failed to remove spool file");
                }
                Err(CasError::Io(e.error))
            }
        }
    }

    /// Count committed blobs per codec.
    ///
    /// Only files sitting at shard depth whose name is an address (plus an
    /// optional codec suffix) are counted.
    pub fn stats(&self) -> Result<StoreStats> {
        let mut stats = StoreStats::default();
        for entry in WalkDir::new(&self.data_dir).min_depth(3).max_depth(3) {
            let entry = entry.map_err(io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str() else {
                continue;
            };
            let codec = Codec::from_file_name(name);
            if !address::is_address(&name[..name.len() - codec.suffix().len()]) {
                continue;
            }
            match codec {
                Codec::Raw => stats.raw_blobs += 1,
                Codec::Gzip => stats.gzip_blobs += 1,
                Codec::Snappy => stats.snappy_blobs += 1,
            }
            stats.total_bytes += entry.metadata().map_err(io::Error::from)?.len();
        }
        Ok(stats)
    }
}

/// Statistics about the store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Legacy uncompressed blobs
    pub raw_blobs: u64,
    /// Legacy gzip blobs
    pub gzip_blobs: u64,
    /// Current snappy blobs
    pub snappy_blobs: u64,
    /// On-disk bytes across all counted blobs
    pub total_bytes: u64,
}

impl StoreStats {
    pub fn blob_count(&self) -> u64 {
        self.raw_blobs + self.gzip_blobs + self.snappy_blobs
    }

    /// Blobs still awaiting migration to the current codec.
    pub fn legacy_count(&self) -> u64 {
        self.raw_blobs + self.gzip_blobs
    }
}

/// Append the codec suffix to an unsuffixed blob path.
pub(crate) fn with_codec(base: &Path, codec: Codec) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(codec.suffix());
    PathBuf::from(name)
}

fn not_found(address: &str) -> CasError {
    CasError::NotFound {
        hash: address.to_string(),
    }
}

/// Committed blobs are immutable (chmod 444).
#[cfg(unix)]
pub(crate) fn set_readonly(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o444))
}

#[cfg(not(unix))]
pub(crate) fn set_readonly(file: &File) -> io::Result<()> {
    let mut perms = file.metadata()?.permissions();
    perms.set_readonly(true);
    file.set_permissions(perms)
}

#[cfg(unix)]
fn check_same_device(data_dir: &Path, spool_dir: &Path) -> Result<()> {
    use std::os::unix::fs::MetadataExt;
    if fs::metadata(data_dir)?.dev() != fs::metadata(spool_dir)?.dev() {
        return Err(CasError::CrossDevice {
            data_dir: data_dir.to_path_buf(),
            spool_dir: spool_dir.to_path_buf(),
        });
    }
    Ok(())
}

#[cfg(not(unix))]
fn check_same_device(_data_dir: &Path, _spool_dir: &Path) -> Result<()> {
    Ok(())
}
