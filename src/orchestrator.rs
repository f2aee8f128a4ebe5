//! SyncOrchestrator (C10): plan derivation and the per-folder state
//! machine of §4.10.
//!
//! Grounded on the teacher's `sync.rs`/`sync_impl::{state,protocol}`
//! n-way synchronizer, narrowed to the paired-peer, per-folder
//! plan/execute loop here. Network access (fetching a peer's file list,
//! enqueuing a transfer) is abstracted behind [`PeerDirectory`] so the
//! plan-derivation algorithm — the part worth testing precisely — stays
//! free of any live channel.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use crate::conflict::{self, ConflictHistory, DetectionOutcome};
use crate::error::SyncError;
use crate::policy::{self, Advisory, Environment};
use crate::protocol::messages::RemoteFileEntry;
use crate::snapshot::SnapshotStore;
use crate::types::{
	Conflict, ConflictResolution, FileVersion, Folder, FolderMode, FolderState, Millis, SnapshotEntry,
	Tombstone, TransferDirection, TransferTask,
};

/// Default tombstone retention (§6.1, also `config::Advanced::tombstone_retention_days`).
pub const TOMBSTONE_RETENTION_MS: Millis = 30 * 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
	Download { peer_id: String, relative_path: String },
	Upload { peer_id: String, relative_path: String },
	DeleteLocal { relative_path: String },
	Conflict { conflict_id: String, relative_path: String },
}

/// Derives the per-peer sync plan for one folder, per §4.10's set
/// algorithm over `L` (local snapshot) and `R` (one peer's reported
/// listing). `is_ignored` filters both sides; `tombstone_for` looks up a
/// tombstone this folder knows for `p` originating from `peer_id`.
#[allow(clippy::too_many_arguments)]
pub fn derive_plan(
	folder: &Folder,
	local: &[SnapshotEntry],
	remote: &[RemoteFileEntry],
	peer_id: &str,
	tombstone_for: impl Fn(&str) -> Option<Tombstone>,
	is_ignored: impl Fn(&str) -> bool,
	conflict_id_for: impl Fn(&str) -> String,
	now: Millis,
) -> Vec<PlanAction> {
	let local_by_path: HashMap<&str, &SnapshotEntry> =
		local.iter().map(|e| (e.relative_path.as_str(), e)).collect();
	let remote_by_path: HashMap<&str, &RemoteFileEntry> =
		remote.iter().map(|e| (e.relative_path.as_str(), e)).collect();

	let all_paths: HashSet<&str> =
		local_by_path.keys().chain(remote_by_path.keys()).copied().collect();

	let mut plan = Vec::new();
	for p in all_paths {
		if is_ignored(p) {
			continue;
		}
		let in_local = local_by_path.get(p);
		let in_remote = remote_by_path.get(p);

		match (in_local, in_remote) {
			(None, Some(_)) => {
				if matches!(folder.mode, FolderMode::SendReceive | FolderMode::ReceiveOnly) {
					plan.push(PlanAction::Download { peer_id: peer_id.to_string(), relative_path: p.to_string() });
				}
			}
			(Some(local_entry), None) => match folder.mode {
				FolderMode::SendReceive => match tombstone_for(p) {
					None => {
						plan.push(PlanAction::Upload { peer_id: peer_id.to_string(), relative_path: p.to_string() })
					}
					Some(tombstone) if tombstone.deleted_at < local_entry.mtime => plan
						.push(PlanAction::Upload { peer_id: peer_id.to_string(), relative_path: p.to_string() }),
					Some(_) => plan.push(PlanAction::DeleteLocal { relative_path: p.to_string() }),
				},
				FolderMode::ReceiveOnly => {
					plan.push(PlanAction::DeleteLocal { relative_path: p.to_string() })
				}
			},
			(Some(local_entry), Some(remote_entry)) => {
				let remote_hash = remote_entry.hash.clone().unwrap_or_default();
				if local_entry.content_hash == remote_hash {
					continue;
				}
				let local_version = FileVersion {
					content_hash: local_entry.content_hash.clone(),
					mtime: local_entry.mtime,
					device_id: "local".to_string(),
					device_name: "local".to_string(),
				};
				let remote_version = FileVersion {
					content_hash: remote_hash,
					mtime: remote_entry.modified_at,
					device_id: peer_id.to_string(),
					device_name: peer_id.to_string(),
				};
				match conflict::detect(
					&folder.id,
					p,
					&local_version,
					&remote_version,
					conflict_id_for(p),
					now,
				) {
					DetectionOutcome::NoConflict => {}
					DetectionOutcome::AutoResolved { use_local: true } => {
						plan.push(PlanAction::Upload { peer_id: peer_id.to_string(), relative_path: p.to_string() })
					}
					DetectionOutcome::AutoResolved { use_local: false } => plan
						.push(PlanAction::Download { peer_id: peer_id.to_string(), relative_path: p.to_string() }),
					DetectionOutcome::Conflict(c) => {
						plan.push(PlanAction::Conflict { conflict_id: c.conflict_id.clone(), relative_path: p.to_string() });
					}
				}
			}
			(None, None) => unreachable!("path present in neither map"),
		}
	}
	plan
}

/// Network-facing half of the orchestrator, injected so plan
/// derivation stays testable without a live channel.
#[async_trait]
pub trait PeerDirectory: Send + Sync {
	async fn file_list(&self, peer_id: &str, folder_id: &str) -> Result<Vec<RemoteFileEntry>, SyncError>;
	async fn enqueue_transfer(&self, task: TransferTask) -> Result<(), SyncError>;
}

#[derive(Debug, Clone, Default)]
pub struct FolderStatus {
	pub state: FolderState,
	pub paused: bool,
	pub conflict_count: usize,
}

pub struct SyncOrchestrator {
	folders: Mutex<HashMap<String, Folder>>,
	states: Mutex<HashMap<String, FolderState>>,
	user_paused: Mutex<HashSet<String>>,
	policy_paused: Mutex<HashSet<String>>,
	conflicts: Mutex<HashMap<String, Conflict>>,
	history: Mutex<ConflictHistory>,
	ignore_matchers: Mutex<HashMap<String, crate::exclusion::IgnoreMatcher>>,
	ignore_presets: Vec<String>,
	respect_gitignore: bool,
	snapshot: std::sync::Arc<SnapshotStore>,
}

impl SyncOrchestrator {
	pub fn new(snapshot: std::sync::Arc<SnapshotStore>, folders: Vec<Folder>) -> Self {
		Self::with_ignore_config(snapshot, folders, Vec::new(), false)
	}

	pub fn with_ignore_config(
		snapshot: std::sync::Arc<SnapshotStore>,
		folders: Vec<Folder>,
		ignore_presets: Vec<String>,
		respect_gitignore: bool,
	) -> Self {
		let mut by_id = HashMap::new();
		let mut states = HashMap::new();
		let mut ignore_matchers = HashMap::new();
		for folder in folders {
			states.insert(folder.id.clone(), FolderState::Idle);
			if let Ok(matcher) =
				crate::exclusion::IgnoreMatcher::new(&folder.path, &ignore_presets, respect_gitignore)
			{
				ignore_matchers.insert(folder.id.clone(), matcher);
			}
			by_id.insert(folder.id.clone(), folder);
		}
		SyncOrchestrator {
			folders: Mutex::new(by_id),
			states: Mutex::new(states),
			user_paused: Mutex::new(HashSet::new()),
			policy_paused: Mutex::new(HashSet::new()),
			conflicts: Mutex::new(HashMap::new()),
			history: Mutex::new(ConflictHistory::new()),
			ignore_matchers: Mutex::new(ignore_matchers),
			ignore_presets,
			respect_gitignore,
			snapshot,
		}
	}

	fn is_ignored(&self, folder_id: &str, relative_path: &str) -> bool {
		let matchers = self.ignore_matchers.lock().expect("orchestrator poisoned");
		matchers.get(folder_id).map(|m| m.is_ignored(Path::new(relative_path))).unwrap_or(false)
	}

	fn folder_ids(&self, folder_id: Option<&str>) -> Result<Vec<String>, SyncError> {
		let folders = self.folders.lock().expect("orchestrator poisoned");
		match folder_id {
			Some(id) => {
				if folders.contains_key(id) {
					Ok(vec![id.to_string()])
				} else {
					Err(SyncError::not_found(format!("folder {id} not found")))
				}
			}
			None => Ok(folders.keys().cloned().collect()),
		}
	}

	pub fn pause(&self, folder_id: Option<&str>) -> Result<(), SyncError> {
		let ids = self.folder_ids(folder_id)?;
		let mut paused = self.user_paused.lock().expect("orchestrator poisoned");
		for id in ids {
			paused.insert(id);
		}
		Ok(())
	}

	pub fn resume(&self, folder_id: Option<&str>) -> Result<(), SyncError> {
		let ids = self.folder_ids(folder_id)?;
		let mut paused = self.user_paused.lock().expect("orchestrator poisoned");
		for id in ids {
			paused.remove(&id);
		}
		Ok(())
	}

	/// Evaluates PolicyGate for `folder_id` and records whether it is
	/// policy-paused, per §4.10's "enter paused on deny, restore
	/// previous state on allow" rule.
	pub fn evaluate_policy(
		&self,
		folder_id: &str,
		schedules: &crate::config::Schedules,
		now: Millis,
		environment: &Environment,
	) -> Advisory {
		let user_paused = self.user_paused.lock().expect("orchestrator poisoned").contains(folder_id);
		let advisory = policy::allow(schedules, user_paused, now, environment);
		let mut policy_paused = self.policy_paused.lock().expect("orchestrator poisoned");
		if matches!(advisory, Advisory::Pause) {
			policy_paused.insert(folder_id.to_string());
		} else {
			policy_paused.remove(folder_id);
		}
		advisory
	}

	pub fn is_paused(&self, folder_id: &str) -> bool {
		self.user_paused.lock().expect("orchestrator poisoned").contains(folder_id)
			|| self.policy_paused.lock().expect("orchestrator poisoned").contains(folder_id)
	}

	pub async fn sync_now(
		&self,
		folder_id: Option<&str>,
		directory: &dyn PeerDirectory,
		now: Millis,
	) -> Result<(), SyncError> {
		for id in self.folder_ids(folder_id)? {
			if self.is_paused(&id) {
				continue;
			}
			self.set_state(&id, FolderState::Scanning);
			let folder = self.folders.lock().expect("orchestrator poisoned").get(&id).cloned().unwrap();
			let local = self.snapshot.list(&id);
			self.set_state(&id, FolderState::Syncing);

			let mut had_conflict = false;
			for peer_id in &folder.peer_ids {
				let remote = match directory.file_list(peer_id, &id).await {
					Ok(files) => files,
					Err(_) => {
						self.set_state(&id, FolderState::Error);
						continue;
					}
				};
				let plan = derive_plan(
					&folder,
					&local,
					&remote,
					peer_id,
					|p| self.snapshot.tombstone(&id, p).unwrap_or(None),
					|p| self.is_ignored(&id, p),
					|p| format!("{id}:{p}:{now}"),
					now,
				);
				for action in plan {
					match action {
						PlanAction::Upload { peer_id, relative_path } => {
							let entry = local.iter().find(|e| e.relative_path == relative_path);
							if let Some(entry) = entry {
								let task = crate::transfer::new_task(
									format!("{id}:{relative_path}:{peer_id}"),
									TransferDirection::Upload,
									id.clone(),
									relative_path,
									peer_id,
									entry.size,
									entry.content_hash.clone(),
								);
								directory.enqueue_transfer(task).await?;
							}
						}
						PlanAction::Download { peer_id, relative_path } => {
							let task = crate::transfer::new_task(
								format!("{id}:{relative_path}:{peer_id}"),
								TransferDirection::Download,
								id.clone(),
								relative_path,
								peer_id,
								0,
								String::new(),
							);
							directory.enqueue_transfer(task).await?;
						}
						PlanAction::DeleteLocal { relative_path } => {
							let _ = self.snapshot.remove(&id, &relative_path);
						}
						PlanAction::Conflict { conflict_id, relative_path } => {
							had_conflict = true;
							let local_entry = local.iter().find(|e| e.relative_path == relative_path);
							if let Some(local_entry) = local_entry {
								let conflict = Conflict {
									conflict_id: conflict_id.clone(),
									folder_id: id.clone(),
									relative_path,
									local_version: FileVersion {
										content_hash: local_entry.content_hash.clone(),
										mtime: local_entry.mtime,
										device_id: "local".to_string(),
										device_name: "local".to_string(),
									},
									remote_version: FileVersion {
										content_hash: String::new(),
										mtime: now,
										device_id: peer_id.clone(),
										device_name: peer_id.clone(),
									},
									detected_at: now,
									resolved: false,
									resolution: None,
									resolved_at: None,
								};
								self.conflicts.lock().expect("orchestrator poisoned").insert(conflict_id, conflict);
							}
						}
					}
				}
			}

			self.set_state(&id, if had_conflict { FolderState::Conflict } else { FolderState::Idle });
		}
		Ok(())
	}

	fn set_state(&self, folder_id: &str, state: FolderState) {
		self.states.lock().expect("orchestrator poisoned").insert(folder_id.to_string(), state);
	}

	pub fn status(&self, folder_id: Option<&str>) -> Result<HashMap<String, FolderStatus>, SyncError> {
		let ids = self.folder_ids(folder_id)?;
		let states = self.states.lock().expect("orchestrator poisoned");
		let conflicts = self.conflicts.lock().expect("orchestrator poisoned");
		let mut out = HashMap::new();
		for id in ids {
			let conflict_count = conflicts.values().filter(|c| c.folder_id == id).count();
			out.insert(
				id.clone(),
				FolderStatus {
					state: states.get(&id).copied().unwrap_or_default(),
					paused: self.is_paused(&id),
					conflict_count,
				},
			);
		}
		Ok(out)
	}

	pub fn resolve_conflict(
		&self,
		conflict_id: &str,
		resolution: ConflictResolution,
		absolute_path: &std::path::Path,
		conflict_workspace: &std::path::Path,
		now: Millis,
	) -> Result<conflict::ResolutionPlan, SyncError> {
		let mut conflicts = self.conflicts.lock().expect("orchestrator poisoned");
		let mut conflict = conflicts
			.remove(conflict_id)
			.ok_or_else(|| SyncError::not_found(format!("conflict {conflict_id} not found")))?;
		let remote_device_name = conflict.remote_version.device_name.clone();
		let plan = conflict::resolve(
			&mut conflict,
			resolution,
			absolute_path,
			conflict_workspace,
			&remote_device_name,
			now,
		);
		self.history.lock().expect("orchestrator poisoned").record(conflict);
		Ok(plan)
	}

	/// Rebuilds the folder's `IgnoreMatcher` from its current `.stignore`
	/// files on disk, per §6.3's `refresh_ignore` command.
	pub fn refresh_ignore(&self, folder_id: &str) -> Result<(), SyncError> {
		self.folder_ids(Some(folder_id))?;
		let path = self.folders.lock().expect("orchestrator poisoned").get(folder_id).map(|f| f.path.clone()).unwrap();
		let matcher = crate::exclusion::IgnoreMatcher::new(&path, &self.ignore_presets, self.respect_gitignore)
			.map_err(|e| SyncError::config(e.to_string()))?;
		self.ignore_matchers.lock().expect("orchestrator poisoned").insert(folder_id.to_string(), matcher);
		Ok(())
	}

	/// Records a deletion this device observed directly (e.g. a watcher
	/// `Unlink` event), so later syncs recognize it as a deliberate
	/// removal rather than resurrecting it from a peer that still has
	/// the path (§3 Tombstone, §4.10 modification-wins rule).
	pub fn record_local_deletion(&self, folder_id: &str, relative_path: &str, now: Millis) -> Result<(), SyncError> {
		self.folder_ids(Some(folder_id))?;
		self.snapshot.remove(folder_id, relative_path)?;
		self.snapshot.record_tombstone(&Tombstone {
			folder_id: folder_id.to_string(),
			relative_path: relative_path.to_string(),
			deleted_at: now,
			origin_peer_id: "local".to_string(),
			expires_at: now + TOMBSTONE_RETENTION_MS,
		})
	}

	/// Prunes tombstones past their retention window (§6.1).
	pub fn prune_tombstones(&self, now: Millis) -> Result<u64, SyncError> {
		self.snapshot.prune_expired_tombstones(now)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	fn folder(mode: FolderMode) -> Folder {
		let mut f = Folder::new("f1", PathBuf::from("/data"));
		f.mode = mode;
		f
	}

	fn local_entry(path: &str, hash: &str, mtime: Millis) -> SnapshotEntry {
		SnapshotEntry {
			relative_path: path.to_string(),
			size: 10,
			content_hash: hash.to_string(),
			block_hashes: vec![hash.to_string()],
			mtime,
			kind: crate::types::EntryKind::File,
			is_ignored: false,
			posix: None,
		}
	}

	fn remote_entry(path: &str, hash: &str, modified_at: Millis) -> RemoteFileEntry {
		RemoteFileEntry {
			relative_path: path.to_string(),
			entry_type: crate::types::EntryKind::File,
			size: 10,
			hash: Some(hash.to_string()),
			modified_at,
		}
	}

	#[test]
	fn remote_only_path_downloads_in_send_receive_mode() {
		let f = folder(FolderMode::SendReceive);
		let plan = derive_plan(&f, &[], &[remote_entry("a.txt", "h1", 100)], "peer1", |_| None, |_| false, |p| p.to_string(), 0);
		assert_eq!(plan, vec![PlanAction::Download { peer_id: "peer1".to_string(), relative_path: "a.txt".to_string() }]);
	}

	#[test]
	fn local_only_path_uploads_when_no_tombstone() {
		let f = folder(FolderMode::SendReceive);
		let plan = derive_plan(&f, &[local_entry("a.txt", "h1", 100)], &[], "peer1", |_| None, |_| false, |p| p.to_string(), 0);
		assert_eq!(plan, vec![PlanAction::Upload { peer_id: "peer1".to_string(), relative_path: "a.txt".to_string() }]);
	}

	#[test]
	fn local_only_path_deletes_when_remote_tombstone_is_newer() {
		let f = folder(FolderMode::SendReceive);
		let tombstone = Tombstone {
			folder_id: "f1".to_string(),
			relative_path: "a.txt".to_string(),
			deleted_at: 500,
			origin_peer_id: "peer1".to_string(),
			expires_at: 999_999,
		};
		let plan = derive_plan(
			&f,
			&[local_entry("a.txt", "h1", 100)],
			&[],
			"peer1",
			move |_| Some(tombstone.clone()),
			|_| false,
			|p| p.to_string(),
			0,
		);
		assert_eq!(plan, vec![PlanAction::DeleteLocal { relative_path: "a.txt".to_string() }]);
	}

	#[test]
	fn local_only_path_uploads_when_tombstone_is_older_than_local_mtime() {
		let f = folder(FolderMode::SendReceive);
		let tombstone = Tombstone {
			folder_id: "f1".to_string(),
			relative_path: "a.txt".to_string(),
			deleted_at: 50,
			origin_peer_id: "peer1".to_string(),
			expires_at: 999_999,
		};
		let plan = derive_plan(
			&f,
			&[local_entry("a.txt", "h1", 100)],
			&[],
			"peer1",
			move |_| Some(tombstone.clone()),
			|_| false,
			|p| p.to_string(),
			0,
		);
		assert_eq!(plan, vec![PlanAction::Upload { peer_id: "peer1".to_string(), relative_path: "a.txt".to_string() }]);
	}

	#[test]
	fn differing_hashes_within_threshold_produce_conflict() {
		let f = folder(FolderMode::SendReceive);
		let plan = derive_plan(
			&f,
			&[local_entry("a.txt", "h1", 1_000)],
			&[remote_entry("a.txt", "h2", 5_000)],
			"peer1",
			|_| None,
			|_| false,
			|p| format!("conflict-{p}"),
			6_000,
		);
		assert_eq!(plan, vec![PlanAction::Conflict { conflict_id: "conflict-a.txt".to_string(), relative_path: "a.txt".to_string() }]);
	}

	#[test]
	fn differing_hashes_beyond_threshold_auto_resolve_without_conflict() {
		let f = folder(FolderMode::SendReceive);
		let plan = derive_plan(
			&f,
			&[local_entry("a.txt", "h1", 50_000)],
			&[remote_entry("a.txt", "h2", 1_000)],
			"peer1",
			|_| None,
			|_| false,
			|p| p.to_string(),
			60_000,
		);
		assert_eq!(plan, vec![PlanAction::Upload { peer_id: "peer1".to_string(), relative_path: "a.txt".to_string() }]);
	}

	#[test]
	fn ignored_paths_are_skipped_entirely() {
		let f = folder(FolderMode::SendReceive);
		let plan = derive_plan(&f, &[local_entry("a.txt", "h1", 100)], &[], "peer1", |_| None, |_| true, |p| p.to_string(), 0);
		assert!(plan.is_empty());
	}

	#[test]
	fn receive_only_folder_never_uploads() {
		let f = folder(FolderMode::ReceiveOnly);
		let plan = derive_plan(&f, &[local_entry("a.txt", "h1", 100)], &[], "peer1", |_| None, |_| false, |p| p.to_string(), 0);
		assert_eq!(plan, vec![PlanAction::DeleteLocal { relative_path: "a.txt".to_string() }]);
	}

	struct FakeDirectory {
		files: Vec<RemoteFileEntry>,
		enqueued: Mutex<Vec<String>>,
	}

	impl FakeDirectory {
		fn new(files: Vec<RemoteFileEntry>) -> Self {
			FakeDirectory { files, enqueued: Mutex::new(Vec::new()) }
		}
	}

	#[async_trait::async_trait]
	impl PeerDirectory for FakeDirectory {
		async fn file_list(&self, _peer_id: &str, _folder_id: &str) -> Result<Vec<RemoteFileEntry>, SyncError> {
			Ok(self.files.clone())
		}
		async fn enqueue_transfer(&self, task: TransferTask) -> Result<(), SyncError> {
			self.enqueued.lock().expect("poisoned").push(task.relative_path);
			Ok(())
		}
	}

	#[tokio::test]
	async fn paused_folder_is_skipped_by_sync_now() {
		let dir = tempfile::TempDir::new().unwrap();
		let snapshot = std::sync::Arc::new(SnapshotStore::open(&dir.path().join("db.redb")).unwrap());
		let mut folder = Folder::new("f1", dir.path().to_path_buf());
		folder.peer_ids.push("peer1".to_string());
		let orchestrator = SyncOrchestrator::new(snapshot, vec![folder]);
		orchestrator.pause(Some("f1")).unwrap();

		let directory = FakeDirectory::new(vec![remote_entry("a.txt", "h1", 0)]);
		orchestrator.sync_now(Some("f1"), &directory, 0).await.unwrap();

		let status = orchestrator.status(Some("f1")).unwrap();
		assert_eq!(status["f1"].state, FolderState::Idle);
		assert!(directory.enqueued.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn refresh_ignore_excludes_matching_paths_from_the_plan() {
		let dir = tempfile::TempDir::new().unwrap();
		std::fs::write(dir.path().join(".stignore"), "*.tmp\n").unwrap();
		let snapshot = std::sync::Arc::new(SnapshotStore::open(&dir.path().join("db.redb")).unwrap());
		let mut folder = Folder::new("f1", dir.path().to_path_buf());
		folder.peer_ids.push("peer1".to_string());
		let orchestrator = SyncOrchestrator::new(snapshot, vec![folder]);
		orchestrator.refresh_ignore("f1").unwrap();

		let directory =
			FakeDirectory::new(vec![remote_entry("keep.txt", "h1", 0), remote_entry("skip.tmp", "h2", 0)]);
		orchestrator.sync_now(Some("f1"), &directory, 0).await.unwrap();
		let enqueued = directory.enqueued.lock().unwrap();
		assert!(enqueued.contains(&"keep.txt".to_string()));
		assert!(!enqueued.contains(&"skip.tmp".to_string()));
	}

	#[tokio::test]
	async fn sync_now_consults_the_persistent_tombstone_log_before_re_uploading() {
		// S1: a peer already attested deletion of `hello.txt`; this
		// folder's local copy is stale and must be removed, not
		// re-uploaded, on the next sync.
		let dir = tempfile::TempDir::new().unwrap();
		let snapshot = std::sync::Arc::new(SnapshotStore::open(&dir.path().join("db.redb")).unwrap());
		snapshot.put("f1", local_entry("hello.txt", "h1", 100)).unwrap();
		snapshot
			.record_tombstone(&Tombstone {
				folder_id: "f1".to_string(),
				relative_path: "hello.txt".to_string(),
				deleted_at: 500,
				origin_peer_id: "peer1".to_string(),
				expires_at: 999_999,
			})
			.unwrap();

		let mut folder = Folder::new("f1", dir.path().to_path_buf());
		folder.peer_ids.push("peer1".to_string());
		let orchestrator = SyncOrchestrator::new(std::sync::Arc::clone(&snapshot), vec![folder]);

		let directory = FakeDirectory::new(Vec::new());
		orchestrator.sync_now(Some("f1"), &directory, 1_000).await.unwrap();

		assert!(directory.enqueued.lock().unwrap().is_empty());
		assert!(snapshot.get("f1", "hello.txt").is_none());
		let status = orchestrator.status(Some("f1")).unwrap();
		assert_eq!(status["f1"].state, FolderState::Idle);
	}

	#[tokio::test]
	async fn record_local_deletion_removes_the_snapshot_entry_and_leaves_a_tombstone() {
		let dir = tempfile::TempDir::new().unwrap();
		let snapshot = std::sync::Arc::new(SnapshotStore::open(&dir.path().join("db.redb")).unwrap());
		snapshot.put("f1", local_entry("hello.txt", "h1", 100)).unwrap();
		let folder = Folder::new("f1", dir.path().to_path_buf());
		let orchestrator = SyncOrchestrator::new(std::sync::Arc::clone(&snapshot), vec![folder]);

		orchestrator.record_local_deletion("f1", "hello.txt", 200).unwrap();

		assert!(snapshot.get("f1", "hello.txt").is_none());
		assert!(snapshot.tombstone("f1", "hello.txt").unwrap().is_some());
	}

	#[test]
	fn prune_tombstones_delegates_to_the_snapshot_store() {
		let dir = tempfile::TempDir::new().unwrap();
		let snapshot = std::sync::Arc::new(SnapshotStore::open(&dir.path().join("db.redb")).unwrap());
		let folder = Folder::new("f1", dir.path().to_path_buf());
		let orchestrator = SyncOrchestrator::new(std::sync::Arc::clone(&snapshot), vec![folder]);

		orchestrator.record_local_deletion("f1", "old.txt", 0).unwrap();
		let removed = orchestrator.prune_tombstones(TOMBSTONE_RETENTION_MS + 1).unwrap();
		assert_eq!(removed, 1);
	}
}

// vim: ts=4
