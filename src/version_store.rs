//! VersionStore (C5): content-addressed past versions, metadata index,
//! retention.
//!
//! Blob layout matches §6.1 exactly: `<versionsDir>/<hash[0..2]>/<hash>`.
//! The metadata index is `redb`-backed, grounded on the same
//! table-per-kind pattern the teacher's `cache.rs` used for its mtime
//! cache, generalized to secondary scans over (folderId, relPath) and
//! createdAt by linear scan of the primary table (acceptable at the
//! scale a single-process sync daemon's version history reaches).

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::hasher;
use crate::types::{Millis, RetentionPolicy, VersionRecord};

const RECORDS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("version_records");

/// Free-space floor under the versions directory (§4.5).
pub const DEFAULT_FREE_SPACE_FLOOR_BYTES: u64 = 1024 * 1024 * 1024;

#[derive(Debug, Clone, Default)]
pub struct VersionStoreStats {
	pub total_versions: u64,
	pub total_bytes: u64,
	pub oldest_at: Option<Millis>,
	pub newest_at: Option<Millis>,
}

pub struct VersionStore {
	db: Database,
	versions_dir: PathBuf,
}

impl VersionStore {
	pub fn open(versions_dir: PathBuf) -> Result<Self, SyncError> {
		std::fs::create_dir_all(&versions_dir)?;
		let db = Database::create(versions_dir.join("versions.redb"))?;
		{
			let txn = db.begin_write()?;
			txn.open_table(RECORDS_TABLE)?;
			txn.commit()?;
		}
		Ok(VersionStore { db, versions_dir })
	}

	fn blob_path(&self, content_hash: &str) -> PathBuf {
		let shard = &content_hash[..content_hash.len().min(2)];
		self.versions_dir.join(shard).join(content_hash)
	}

	/// Records a new version of `relative_path` in `folder_id`.
	/// (folderId, relativePath, contentHash) is deduplicated: a second
	/// snapshot producing the same contentHash returns the existing
	/// record instead of writing a new blob. `block_size` must match the
	/// folder's configured block size so the derived content hash is the
	/// same canonical digest (concatenated block digests, not whole-file
	/// bytes) a `SnapshotEntry` for the identical file would carry.
	#[allow(clippy::too_many_arguments)]
	pub fn snapshot(
		&self,
		folder_id: &str,
		relative_path: &str,
		bytes: &[u8],
		block_size: u32,
		origin_device_id: &str,
		origin_device_name: &str,
		created_at: Millis,
	) -> Result<VersionRecord, SyncError> {
		let content_hash = hasher::hash_bytes(bytes, block_size)?.content_hash;

		if let Some(existing) = self.find_by_hash(folder_id, relative_path, &content_hash)? {
			return Ok(existing);
		}

		let blob_path = self.blob_path(&content_hash);
		if !blob_path.exists() {
			if let Some(parent) = blob_path.parent() {
				std::fs::create_dir_all(parent)?;
			}
			let tmp = blob_path.with_extension("tmp");
			std::fs::write(&tmp, bytes)?;
			std::fs::rename(&tmp, &blob_path)?;
		}

		let record = VersionRecord {
			version_id: uuid::Uuid::new_v4().to_string(),
			folder_id: folder_id.to_string(),
			relative_path: relative_path.to_string(),
			content_hash,
			size: bytes.len() as u64,
			created_at,
			stored_path: blob_path,
			origin_device_id: origin_device_id.to_string(),
			origin_device_name: origin_device_name.to_string(),
		};
		self.put_record(&record)?;
		Ok(record)
	}

	fn find_by_hash(
		&self,
		folder_id: &str,
		relative_path: &str,
		content_hash: &str,
	) -> Result<Option<VersionRecord>, SyncError> {
		Ok(self
			.list(folder_id, relative_path)?
			.into_iter()
			.find(|r| r.content_hash == content_hash))
	}

	fn put_record(&self, record: &VersionRecord) -> Result<(), SyncError> {
		let encoded = serde_json::to_vec(record)?;
		let txn = self.db.begin_write()?;
		{
			let mut table = txn.open_table(RECORDS_TABLE)?;
			table.insert(record.version_id.as_str(), encoded.as_slice())?;
		}
		txn.commit()?;
		Ok(())
	}

	fn all_records(&self) -> Result<Vec<VersionRecord>, SyncError> {
		let txn = self.db.begin_read()?;
		let table = txn.open_table(RECORDS_TABLE)?;
		let mut out = Vec::new();
		for row in table.iter()? {
			let (_, v) = row?;
			out.push(serde_json::from_slice(v.value())?);
		}
		Ok(out)
	}

	pub fn list(
		&self,
		folder_id: &str,
		relative_path: &str,
	) -> Result<Vec<VersionRecord>, SyncError> {
		let mut records: Vec<_> = self
			.all_records()?
			.into_iter()
			.filter(|r| r.folder_id == folder_id && r.relative_path == relative_path)
			.collect();
		records.sort_by_key(|r| r.created_at);
		Ok(records)
	}

	pub fn fetch(&self, version_id: &str) -> Result<Vec<u8>, SyncError> {
		let record = self.get_record(version_id)?;
		std::fs::read(&record.stored_path).map_err(SyncError::from)
	}

	fn get_record(&self, version_id: &str) -> Result<VersionRecord, SyncError> {
		let txn = self.db.begin_read()?;
		let table = txn.open_table(RECORDS_TABLE)?;
		let row = table
			.get(version_id)?
			.ok_or_else(|| SyncError::not_found(format!("version {version_id} not found")))?;
		Ok(serde_json::from_slice(row.value())?)
	}

	pub fn restore(&self, version_id: &str, target_path: &Path) -> Result<(), SyncError> {
		let bytes = self.fetch(version_id)?;
		if let Some(parent) = target_path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(target_path, bytes)?;
		Ok(())
	}

	/// Applies `policy` for one (folderId, relPath), keeping the current
	/// (most recent) version always.
	pub fn apply_retention(
		&self,
		folder_id: &str,
		relative_path: &str,
		policy: RetentionPolicy,
		now: Millis,
	) -> Result<(), SyncError> {
		let mut records = self.list(folder_id, relative_path)?;
		if records.is_empty() {
			return Ok(());
		}
		records.sort_by_key(|r| std::cmp::Reverse(r.created_at));
		let current = records.remove(0);

		let to_keep: Vec<VersionRecord> = match policy {
			RetentionPolicy::None => Vec::new(),
			RetentionPolicy::Simple { keep_versions } => {
				let keep = (keep_versions as usize).saturating_sub(1);
				records.into_iter().take(keep).collect()
			}
			RetentionPolicy::TimeBased { keep_days } => {
				let floor = now.saturating_sub(keep_days as u64 * 86_400_000);
				records.into_iter().filter(|r| r.created_at >= floor).collect()
			}
		};

		let keep_ids: std::collections::HashSet<_> =
			to_keep.iter().map(|r| r.version_id.clone()).chain([current.version_id.clone()]).collect();

		let all_for_path = self.list(folder_id, relative_path)?;
		for record in all_for_path {
			if !keep_ids.contains(&record.version_id) {
				self.delete_record(&record.version_id)?;
			}
		}
		Ok(())
	}

	fn delete_record(&self, version_id: &str) -> Result<(), SyncError> {
		let txn = self.db.begin_write()?;
		{
			let mut table = txn.open_table(RECORDS_TABLE)?;
			table.remove(version_id)?;
		}
		txn.commit()?;
		// Blob deletion is swept lazily by `sweep_orphaned_blobs`; a
		// failure here must not fail the owning operation (§4.5).
		Ok(())
	}

	/// Deletes blobs referenced by no metadata record. Failures log
	/// (via the caller) and are retried on the next sweep.
	pub fn sweep_orphaned_blobs(&self) -> Result<u64, SyncError> {
		let referenced: std::collections::HashSet<PathBuf> =
			self.all_records()?.into_iter().map(|r| r.stored_path).collect();
		let mut removed = 0;
		let Ok(shards) = std::fs::read_dir(&self.versions_dir) else {
			return Ok(0);
		};
		for shard in shards.flatten() {
			if !shard.path().is_dir() {
				continue;
			}
			let Ok(blobs) = std::fs::read_dir(shard.path()) else { continue };
			for blob in blobs.flatten() {
				let path = blob.path();
				if !referenced.contains(&path) && std::fs::remove_file(&path).is_ok() {
					removed += 1;
				}
			}
		}
		Ok(removed)
	}

	pub fn stats(&self) -> Result<VersionStoreStats, SyncError> {
		let records = self.all_records()?;
		let mut stats = VersionStoreStats { total_versions: records.len() as u64, ..Default::default() };
		for r in &records {
			stats.total_bytes += r.size;
			stats.oldest_at = Some(stats.oldest_at.map_or(r.created_at, |o| o.min(r.created_at)));
			stats.newest_at = Some(stats.newest_at.map_or(r.created_at, |n| n.max(r.created_at)));
		}
		Ok(stats)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn snapshot_dedups_identical_bytes() {
		let dir = TempDir::new().unwrap();
		let store = VersionStore::open(dir.path().to_path_buf()).unwrap();
		let r1 = store.snapshot("f1", "a.txt", b"hello", 4, "dev1", "Device 1", 1000).unwrap();
		let r2 = store.snapshot("f1", "a.txt", b"hello", 4, "dev1", "Device 1", 2000).unwrap();
		assert_eq!(r1.version_id, r2.version_id);
		assert_eq!(store.list("f1", "a.txt").unwrap().len(), 1);
	}

	#[test]
	fn fetch_returns_recorded_bytes_matching_content_hash() {
		let dir = TempDir::new().unwrap();
		let store = VersionStore::open(dir.path().to_path_buf()).unwrap();
		let record = store.snapshot("f1", "a.txt", b"hello world", 4, "dev1", "Device 1", 1000).unwrap();
		let bytes = store.fetch(&record.version_id).unwrap();
		assert_eq!(hasher::hash_bytes(&bytes, 4).unwrap().content_hash, record.content_hash);
	}

	#[test]
	fn retention_simple_keeps_n_most_recent() {
		let dir = TempDir::new().unwrap();
		let store = VersionStore::open(dir.path().to_path_buf()).unwrap();
		for (i, content) in [b"v1".to_vec(), b"v2".to_vec(), b"v3".to_vec(), b"v4".to_vec()]
			.iter()
			.enumerate()
		{
			store
				.snapshot("f1", "report.docx", content, 4, "dev1", "Device 1", 1000 + i as u64)
				.unwrap();
		}
		store
			.apply_retention("f1", "report.docx", RetentionPolicy::Simple { keep_versions: 3 }, 5000)
			.unwrap();
		let remaining = store.list("f1", "report.docx").unwrap();
		assert_eq!(remaining.len(), 3);
		assert!(remaining.iter().all(|r| r.created_at >= 1001));
	}

	#[test]
	fn blob_path_is_sharded_by_hash_prefix() {
		let dir = TempDir::new().unwrap();
		let store = VersionStore::open(dir.path().to_path_buf()).unwrap();
		let record = store.snapshot("f1", "a.txt", b"hello", 4, "dev1", "Device 1", 1000).unwrap();
		let expected_shard = &record.content_hash[..2];
		assert!(record.stored_path.to_string_lossy().contains(expected_shard));
	}

	#[test]
	fn content_hash_matches_the_canonical_whole_file_hash_of_the_same_bytes() {
		let dir = TempDir::new().unwrap();
		let store = VersionStore::open(dir.path().to_path_buf()).unwrap();
		let bytes = b"hello world, this is a version store test";
		let record = store.snapshot("f1", "a.txt", bytes, 8, "dev1", "Device 1", 1000).unwrap();
		let file = TempDir::new().unwrap();
		let path = file.path().join("a.txt");
		std::fs::write(&path, bytes).unwrap();
		let file_hash = hasher::hash_file(&path, 8).unwrap();
		assert_eq!(record.content_hash, file_hash.content_hash);
	}
}

// vim: ts=4
