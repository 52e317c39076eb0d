//! Legacy codec migration ("snapify").
//!
//! Rewrites raw and gzip blobs into the current codec next to the original,
//! in the exact location the store itself would compute, then proves the
//! rewrite by comparing SHA-256 digests of both decoded streams.
//!
//! ```text
//! 84D/898/<addr>      -> 84D/898/<addr>.snappy
//! 84D/898/<addr>.gz   -> 84D/898/<addr>.snappy
//! ```

use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};
use walkdir::WalkDir;

use crate::codec::{self, Codec};
use crate::{set_readonly, CasError, Result};

/// What happened to a single legacy blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub source: PathBuf,
    pub target: PathBuf,
    /// Codec the source was stored under.
    pub codec: Codec,
    /// Decoded bytes written; zero when the target already existed.
    pub bytes: u64,
    /// The target was already present and only had to be validated.
    pub reused_existing: bool,
    /// The source was removed after validation.
    pub pruned: bool,
}

/// Collect every file under `root` that is not yet in the current codec.
///
/// In-flight temp files are skipped. The result is sorted.
pub fn find_legacy_blobs<P: AsRef<Path>>(root: P) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name.ends_with(Codec::CURRENT.suffix()) || name.ends_with(".tmp") {
            continue;
        }
        found.push(entry.into_path());
    }
    found.sort();
    Ok(found)
}

/// Sibling path a legacy blob is rewritten to.
pub fn migration_target(source: &Path) -> PathBuf {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stem = name
        .strip_suffix(Codec::Gzip.suffix())
        .unwrap_or(name.as_str());
    source.with_file_name(format!("{}{}", stem, Codec::CURRENT.suffix()))
}

/// Rewrite one legacy blob into the current codec and validate it.
#[instrument(level = "debug")]
pub fn migrate_blob(source: &Path, prune: bool) -> Result<MigrationOutcome> {
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let codec = Codec::from_file_name(&name);
    if codec == Codec::CURRENT {
        return Err(CasError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} is already in the current codec", source.display()),
        )));
    }

    let target = migration_target(source);
    let dir = source.parent().unwrap_or_else(|| Path::new("."));

    let (bytes, reused_existing) = if target.exists() {
        (0, true)
    } else {
        let mut reader = codec.reader(File::open(source)?);
        let mut temp = tempfile::Builder::new()
            .prefix(".snapify.")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        let (_, bytes) = codec::transcode_current(&mut reader, temp.as_file_mut())?;
        temp.as_file().sync_all()?;
        set_readonly(temp.as_file())?;
        match temp.persist_noclobber(&target) {
            Ok(_) => (bytes, false),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => (0, true),
            Err(e) => return Err(CasError::Io(e.error)),
        }
    };

    let expected = decoded_digest(source, codec)?;
    let actual = decoded_digest(&target, Codec::CURRENT)?;
    if expected != actual {
        if !reused_existing {
            fs::remove_file(&target)?;
        }
        return Err(CasError::ValidationFailed {
            path: source.to_path_buf(),
            expected: hex::encode_upper(expected),
            actual: hex::encode_upper(actual),
        });
    }

    if prune {
        fs::remove_file(source)?;
    }
    debug!(path = ?target, bytes, reused_existing, "migrated blob");

    Ok(MigrationOutcome {
        source: source.to_path_buf(),
        target,
        codec,
        bytes,
        reused_existing,
        pruned: prune,
    })
}

/// SHA-256 of a file's decoded contents.
fn decoded_digest(path: &Path, codec: Codec) -> Result<[u8; 32]> {
    let mut reader = codec.reader(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().into())
}
