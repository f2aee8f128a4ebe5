//! SnapshotStore (C4): per-folder authoritative map from relative path
//! to `SnapshotEntry`.
//!
//! Grounded on the teacher's `redb`-backed `ChildCache`: one table keyed
//! by `"{folderId}\0{relativePath}"`, values are JSON-encoded
//! `SnapshotEntry`s. `redb` gives the reader/writer discipline (MVCC
//! readers, single writer) the design calls for without hand-rolled
//! locking.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use crate::error::SyncError;
use crate::types::{Millis, SnapshotEntry, Tombstone};

const ENTRIES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("snapshot_entries");
const TOMBSTONES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tombstones");

/// Default cap on in-memory entries per folder before the oldest-by-mtime
/// entry is evicted and recomputed lazily.
pub const DEFAULT_MAX_ENTRIES_PER_FOLDER: usize = 1_000_000;

pub enum CompareResult {
	New,
	Modified,
	Unchanged,
}

fn key(folder_id: &str, relative_path: &str) -> String {
	format!("{folder_id}\0{relative_path}")
}

/// Per-folder in-memory index, backed by `redb` for restart durability.
pub struct SnapshotStore {
	db: Database,
	max_entries_per_folder: usize,
	/// In-memory mirror for fast `list`/`compare`, one RwLock per store
	/// (not per folder: folders rarely contend with each other in this
	/// single-process design, and this keeps the critical section short).
	cache: RwLock<HashMap<String, SnapshotEntry>>,
}

impl SnapshotStore {
	pub fn open(db_path: &Path) -> Result<Self, SyncError> {
		let db = Database::create(db_path)?;
		{
			let txn = db.begin_write()?;
			txn.open_table(ENTRIES_TABLE)?;
			txn.open_table(TOMBSTONES_TABLE)?;
			txn.commit()?;
		}
		let store = SnapshotStore {
			db,
			max_entries_per_folder: DEFAULT_MAX_ENTRIES_PER_FOLDER,
			cache: RwLock::new(HashMap::new()),
		};
		store.reload_cache()?;
		Ok(store)
	}

	fn reload_cache(&self) -> Result<(), SyncError> {
		let txn = self.db.begin_read()?;
		let table = txn.open_table(ENTRIES_TABLE)?;
		let mut cache = self.cache.write().expect("snapshot cache poisoned");
		for row in table.iter()? {
			let (k, v) = row?;
			let entry: SnapshotEntry = serde_json::from_slice(v.value())?;
			cache.insert(k.value().to_string(), entry);
		}
		Ok(())
	}

	pub fn get(&self, folder_id: &str, relative_path: &str) -> Option<SnapshotEntry> {
		let cache = self.cache.read().expect("snapshot cache poisoned");
		cache.get(&key(folder_id, relative_path)).cloned()
	}

	/// Writer lock per folder in spirit: the whole store commits under
	/// one short critical section, matching §5's "no suspension point
	/// holds a write lock on SnapshotStore metadata" contract.
	pub fn put(&self, folder_id: &str, entry: SnapshotEntry) -> Result<(), SyncError> {
		let k = key(folder_id, &entry.relative_path);
		let encoded = serde_json::to_vec(&entry)?;
		{
			let txn = self.db.begin_write()?;
			{
				let mut table = txn.open_table(ENTRIES_TABLE)?;
				table.insert(k.as_str(), encoded.as_slice())?;
			}
			txn.commit()?;
		}
		let mut cache = self.cache.write().expect("snapshot cache poisoned");
		cache.insert(k, entry);
		self.evict_if_needed(folder_id, &mut cache);
		Ok(())
	}

	pub fn remove(&self, folder_id: &str, relative_path: &str) -> Result<(), SyncError> {
		let k = key(folder_id, relative_path);
		{
			let txn = self.db.begin_write()?;
			{
				let mut table = txn.open_table(ENTRIES_TABLE)?;
				table.remove(k.as_str())?;
			}
			txn.commit()?;
		}
		let mut cache = self.cache.write().expect("snapshot cache poisoned");
		cache.remove(&k);
		Ok(())
	}

	/// Records a remote-attested deletion (§6.1 tombstone log), so a
	/// later scan can distinguish a never-seen path from one deleted by
	/// a peer while this device was offline.
	pub fn record_tombstone(&self, tombstone: &Tombstone) -> Result<(), SyncError> {
		let k = key(&tombstone.folder_id, &tombstone.relative_path);
		let encoded = serde_json::to_vec(tombstone)?;
		let txn = self.db.begin_write()?;
		{
			let mut table = txn.open_table(TOMBSTONES_TABLE)?;
			table.insert(k.as_str(), encoded.as_slice())?;
		}
		txn.commit()?;
		Ok(())
	}

	pub fn tombstone(&self, folder_id: &str, relative_path: &str) -> Result<Option<Tombstone>, SyncError> {
		let k = key(folder_id, relative_path);
		let txn = self.db.begin_read()?;
		let table = txn.open_table(TOMBSTONES_TABLE)?;
		match table.get(k.as_str())? {
			Some(v) => Ok(Some(serde_json::from_slice(v.value())?)),
			None => Ok(None),
		}
	}

	/// Deletes every tombstone whose `expires_at` is at or before `now`
	/// (spec.md §6.1: "a persistent list of tombstones, pruned on
	/// expiry"; default retention is 30 days, see `config.rs`).
	pub fn prune_expired_tombstones(&self, now: Millis) -> Result<u64, SyncError> {
		let txn = self.db.begin_write()?;
		let mut removed = 0;
		{
			let mut table = txn.open_table(TOMBSTONES_TABLE)?;
			let expired: Vec<String> = table
				.iter()?
				.filter_map(|row| row.ok())
				.filter_map(|(k, v)| {
					let tombstone: Tombstone = serde_json::from_slice(v.value()).ok()?;
					(tombstone.expires_at <= now).then(|| k.value().to_string())
				})
				.collect();
			for k in expired {
				table.remove(k.as_str())?;
				removed += 1;
			}
		}
		txn.commit()?;
		Ok(removed)
	}

	pub fn list(&self, folder_id: &str) -> Vec<SnapshotEntry> {
		let prefix = format!("{folder_id}\0");
		let cache = self.cache.read().expect("snapshot cache poisoned");
		cache
			.iter()
			.filter(|(k, _)| k.starts_with(&prefix))
			.map(|(_, v)| v.clone())
			.collect()
	}

	/// Compares a freshly observed `entry` against the stored belief.
	/// `modified` if any of size, contentHash, or mtime differs.
	pub fn compare(&self, folder_id: &str, entry: &SnapshotEntry) -> CompareResult {
		match self.get(folder_id, &entry.relative_path) {
			None => CompareResult::New,
			Some(existing) => {
				if existing.size != entry.size
					|| existing.content_hash != entry.content_hash
					|| existing.mtime != entry.mtime
				{
					CompareResult::Modified
				} else {
					CompareResult::Unchanged
				}
			}
		}
	}

	/// Evicts the oldest-by-mtime entry once a folder exceeds the cap;
	/// eviction only drops the in-memory copy, the durable record is
	/// left for lazy recomputation on next scan.
	fn evict_if_needed(&self, folder_id: &str, cache: &mut HashMap<String, SnapshotEntry>) {
		let prefix = format!("{folder_id}\0");
		let count = cache.keys().filter(|k| k.starts_with(&prefix)).count();
		if count <= self.max_entries_per_folder {
			return;
		}
		if let Some(oldest_key) = cache
			.iter()
			.filter(|(k, _)| k.starts_with(&prefix))
			.min_by_key(|(_, v)| v.mtime)
			.map(|(k, _)| k.clone())
		{
			cache.remove(&oldest_key);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::EntryKind;
	use tempfile::TempDir;

	fn entry(path: &str, hash: &str, mtime: u64) -> SnapshotEntry {
		SnapshotEntry {
			relative_path: path.to_string(),
			size: 10,
			content_hash: hash.to_string(),
			block_hashes: vec![hash.to_string()],
			mtime,
			kind: EntryKind::File,
			is_ignored: false,
			posix: None,
		}
	}

	#[test]
	fn put_then_get_round_trips() {
		let dir = TempDir::new().unwrap();
		let store = SnapshotStore::open(&dir.path().join("db.redb")).unwrap();
		store.put("f1", entry("a.txt", "h1", 100)).unwrap();
		let got = store.get("f1", "a.txt").unwrap();
		assert_eq!(got.content_hash, "h1");
	}

	#[test]
	fn compare_detects_new_modified_unchanged() {
		let dir = TempDir::new().unwrap();
		let store = SnapshotStore::open(&dir.path().join("db.redb")).unwrap();
		let e = entry("a.txt", "h1", 100);
		assert!(matches!(store.compare("f1", &e), CompareResult::New));
		store.put("f1", e.clone()).unwrap();
		assert!(matches!(store.compare("f1", &e), CompareResult::Unchanged));
		let modified = entry("a.txt", "h2", 100);
		assert!(matches!(store.compare("f1", &modified), CompareResult::Modified));
	}

	#[test]
	fn list_scopes_to_one_folder() {
		let dir = TempDir::new().unwrap();
		let store = SnapshotStore::open(&dir.path().join("db.redb")).unwrap();
		store.put("f1", entry("a.txt", "h1", 100)).unwrap();
		store.put("f2", entry("b.txt", "h2", 100)).unwrap();
		assert_eq!(store.list("f1").len(), 1);
		assert_eq!(store.list("f2").len(), 1);
	}

	#[test]
	fn survives_reopen() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("db.redb");
		{
			let store = SnapshotStore::open(&path).unwrap();
			store.put("f1", entry("a.txt", "h1", 100)).unwrap();
		}
		let reopened = SnapshotStore::open(&path).unwrap();
		assert_eq!(reopened.list("f1").len(), 1);
	}

	#[test]
	fn remove_deletes_entry() {
		let dir = TempDir::new().unwrap();
		let store = SnapshotStore::open(&dir.path().join("db.redb")).unwrap();
		store.put("f1", entry("a.txt", "h1", 100)).unwrap();
		store.remove("f1", "a.txt").unwrap();
		assert!(store.get("f1", "a.txt").is_none());
	}

	fn tombstone(path: &str, deleted_at: Millis, expires_at: Millis) -> Tombstone {
		Tombstone {
			folder_id: "f1".to_string(),
			relative_path: path.to_string(),
			deleted_at,
			origin_peer_id: "peer1".to_string(),
			expires_at,
		}
	}

	#[test]
	fn tombstone_round_trips() {
		let dir = TempDir::new().unwrap();
		let store = SnapshotStore::open(&dir.path().join("db.redb")).unwrap();
		store.record_tombstone(&tombstone("a.txt", 100, 1_000)).unwrap();
		let got = store.tombstone("f1", "a.txt").unwrap().unwrap();
		assert_eq!(got.origin_peer_id, "peer1");
		assert!(store.tombstone("f1", "b.txt").unwrap().is_none());
	}

	#[test]
	fn prune_expired_tombstones_removes_only_past_expiry() {
		let dir = TempDir::new().unwrap();
		let store = SnapshotStore::open(&dir.path().join("db.redb")).unwrap();
		store.record_tombstone(&tombstone("old.txt", 0, 1_000)).unwrap();
		store.record_tombstone(&tombstone("fresh.txt", 0, 5_000)).unwrap();
		let removed = store.prune_expired_tombstones(2_000).unwrap();
		assert_eq!(removed, 1);
		assert!(store.tombstone("f1", "old.txt").unwrap().is_none());
		assert!(store.tombstone("f1", "fresh.txt").unwrap().is_some());
	}

	#[test]
	fn tombstones_survive_reopen() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("db.redb");
		{
			let store = SnapshotStore::open(&path).unwrap();
			store.record_tombstone(&tombstone("a.txt", 0, 1_000)).unwrap();
		}
		let reopened = SnapshotStore::open(&path).unwrap();
		assert!(reopened.tombstone("f1", "a.txt").unwrap().is_some());
	}
}

// vim: ts=4
