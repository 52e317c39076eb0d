//! Asset service boundary.
//!
//! Assets are addressed by an opaque id that the metadata index resolves
//! to a content address; payload I/O is always delegated to the
//! [`AssetStore`]. The index itself is pluggable.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{AssetFlags, AssetStore, BlobReader, CasError, Result};

/// Metadata row for one asset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub flags: AssetFlags,
    pub asset_type: i8,
    /// Content address of the payload; filled in by [`AssetService::create_asset`].
    pub hash: String,
}

/// Metadata store mapping asset ids to records.
pub trait AssetIndex: Send + Sync {
    /// Fetch a record, failing with [`CasError::UnknownAsset`] if absent.
    fn get(&self, id: &str) -> Result<AssetRecord>;

    /// Insert or replace a record.
    fn put(&self, record: AssetRecord) -> Result<()>;

    fn hash_and_type(&self, id: &str) -> Result<(String, i8)> {
        let record = self.get(id)?;
        Ok((record.hash, record.asset_type))
    }
}

/// In-process index, suitable for tests and single-node tooling.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    records: DashMap<String, AssetRecord>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl AssetIndex for MemoryIndex {
    fn get(&self, id: &str) -> Result<AssetRecord> {
        self.records
            .get(id)
            .map(|r| r.value().clone())
            .ok_or_else(|| CasError::UnknownAsset { id: id.to_string() })
    }

    fn put(&self, record: AssetRecord) -> Result<()> {
        self.records.insert(record.id.clone(), record);
        Ok(())
    }
}

/// Resolves asset ids through an index and serves payloads from the store.
pub struct AssetService<I> {
    store: AssetStore,
    index: I,
}

impl<I: AssetIndex> AssetService<I> {
    pub fn new(store: AssetStore, index: I) -> Self {
        Self { store, index }
    }

    pub fn store(&self) -> &AssetStore {
        &self.store
    }

    pub fn index(&self) -> &I {
        &self.index
    }

    /// Store the payload, then persist the record pointing at it.
    ///
    /// The blob is written first so a record never references a payload
    /// that was not committed.
    #[instrument(skip(self, record, data), fields(id = %record.id), level = "debug")]
    pub fn create_asset(&self, mut record: AssetRecord, data: &str) -> Result<String> {
        let hash = self.store.store(data)?;
        record.hash = hash.clone();
        self.index.put(record)?;
        debug!(%hash, "asset created");
        Ok(hash)
    }

    /// Record plus base64 payload.
    pub fn full_asset(&self, id: &str) -> Result<(AssetRecord, String)> {
        let record = self.index.get(id)?;
        let data = self.store.get_as_base64(&record.hash)?;
        Ok((record, data))
    }

    pub fn metadata(&self, id: &str) -> Result<AssetRecord> {
        self.index.get(id)
    }

    /// Decoded payload stream and the asset type.
    pub fn asset_data(&self, id: &str) -> Result<(BlobReader, i8)> {
        let (hash, asset_type) = self.index.hash_and_type(id)?;
        let reader = self.store.load(&hash)?;
        Ok((reader, asset_type))
    }

    /// False when either the record or its blob is missing.
    pub fn asset_exists(&self, id: &str) -> bool {
        match self.index.hash_and_type(id) {
            Ok((hash, _)) => self.store.exists(&hash),
            Err(_) => false,
        }
    }

    pub fn assets_exist<S: AsRef<str>>(&self, ids: &[S]) -> Vec<bool> {
        ids.iter().map(|id| self.asset_exists(id.as_ref())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    const PAYLOAD_B64: &str = "QUJDREVGR0hJSktMTU5PUFFSU1RVVldYWVo=";
    const PAYLOAD_HASH: &str = "D6EC6898DE87DDAC6E5B3611708A7AA1C2D298293349CC1A6C299A1DB7149D38";

    fn new_service() -> (TempDir, AssetService<MemoryIndex>) {
        let temp = TempDir::new().unwrap();
        let store = AssetStore::new(temp.path().join("data"), temp.path().join("tmp")).unwrap();
        (temp, AssetService::new(store, MemoryIndex::new()))
    }

    fn record(id: &str) -> AssetRecord {
        AssetRecord {
            id: id.to_string(),
            name: "alphabet".to_string(),
            description: "uppercase letters".to_string(),
            flags: "maptile".parse().unwrap(),
            asset_type: 7,
            hash: String::new(),
        }
    }

    #[test]
    fn test_create_and_fetch() {
        let (_temp, service) = new_service();
        let hash = service.create_asset(record("a1"), PAYLOAD_B64).unwrap();
        assert_eq!(hash, PAYLOAD_HASH);

        let (meta, data) = service.full_asset("a1").unwrap();
        assert_eq!(meta.hash, PAYLOAD_HASH);
        assert_eq!(meta.flags, AssetFlags::MAPTILE);
        assert_eq!(data, PAYLOAD_B64);
    }

    #[test]
    fn test_asset_data_stream() {
        let (_temp, service) = new_service();
        service.create_asset(record("a1"), PAYLOAD_B64).unwrap();

        let (mut reader, asset_type) = service.asset_data("a1").unwrap();
        let mut text = String::new();
        reader.read_to_string(&mut text).unwrap();
        assert_eq!(text, "ABCDEFGHIJKLMNOPQRSTUVWXYZ");
        assert_eq!(asset_type, 7);
    }

    #[test]
    fn test_invalid_payload_leaves_no_record() {
        let (_temp, service) = new_service();
        let result = service.create_asset(record("bad"), "%%%");
        assert!(matches!(result, Err(CasError::InvalidInput(_))));
        assert!(service.index().is_empty());
    }

    #[test]
    fn test_two_ids_share_one_blob() {
        let (_temp, service) = new_service();
        let h1 = service.create_asset(record("a1"), PAYLOAD_B64).unwrap();
        let h2 = service.create_asset(record("a2"), PAYLOAD_B64).unwrap();
        assert_eq!(h1, h2);
        assert_eq!(service.index().len(), 2);
        assert_eq!(service.store().stats().unwrap().blob_count(), 1);
    }

    #[test]
    fn test_assets_exist() {
        let (_temp, service) = new_service();
        service.create_asset(record("a1"), PAYLOAD_B64).unwrap();

        let mut dangling = record("dangling");
        dangling.hash = "0".repeat(64);
        service.index().put(dangling).unwrap();

        assert_eq!(
            service.assets_exist(&["a1", "missing", "dangling"]),
            vec![true, false, false]
        );
    }

    #[test]
    fn test_unknown_asset() {
        let (_temp, service) = new_service();
        assert!(matches!(
            service.metadata("nope"),
            Err(CasError::UnknownAsset { .. })
        ));
        assert!(service.asset_data("nope").is_err());
    }
}
