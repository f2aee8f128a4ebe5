//! Core data types shared across the sync engine.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Milliseconds since the Unix epoch. Monotonic enough for ordering
/// decisions within one process; not a substitute for a real clock sync.
pub type Millis = u64;

/// A file, directory, or symlink as seen by the SnapshotStore.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum EntryKind {
	File,
	Directory,
	Symlink,
}

/// Sync mode for a folder.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FolderMode {
	SendReceive,
	ReceiveOnly,
}

/// A configured local directory, paired with zero or more peers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Folder {
	pub id: String,
	pub path: PathBuf,
	pub mode: FolderMode,
	pub peer_ids: Vec<String>,
	pub retention: RetentionPolicy,
	pub paused: bool,
	pub block_size: u32,
}

impl Folder {
	pub fn new(id: impl Into<String>, path: PathBuf) -> Self {
		Folder {
			id: id.into(),
			path,
			mode: FolderMode::SendReceive,
			peer_ids: Vec::new(),
			retention: RetentionPolicy::None,
			paused: false,
			block_size: crate::hasher::DEFAULT_BLOCK_SIZE,
		}
	}
}

/// Negotiated per-peer capabilities.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PeerCapabilities {
	pub max_connections: u32,
	pub compression: bool,
	pub protocol_version: u32,
}

impl Default for PeerCapabilities {
	fn default() -> Self {
		PeerCapabilities { max_connections: 1, compression: false, protocol_version: 1 }
	}
}

/// A paired remote device.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Peer {
	pub id: String,
	pub name: String,
	pub public_key: String,
	pub last_address: Option<String>,
	pub online: bool,
	pub capabilities: PeerCapabilities,
}

/// Optional POSIX metadata carried alongside a snapshot entry when a
/// folder is configured to preserve permissions/ownership.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PosixMetadata {
	pub mode: u32,
	pub uid: u32,
	pub gid: u32,
}

/// The core's belief about one relative path inside one folder.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SnapshotEntry {
	pub relative_path: String,
	pub size: u64,
	pub content_hash: String,
	pub block_hashes: Vec<String>,
	pub mtime: Millis,
	pub kind: EntryKind,
	pub is_ignored: bool,
	pub posix: Option<PosixMetadata>,
}

impl SnapshotEntry {
	/// `true` if `relative_path` is normalized: `/`-separated, no `..`,
	/// no absolute component.
	pub fn has_normalized_path(&self) -> bool {
		crate::validation::path::is_relative_posix(&self.relative_path)
	}
}

/// One immutable past content of a file.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct VersionRecord {
	pub version_id: String,
	pub folder_id: String,
	pub relative_path: String,
	pub content_hash: String,
	pub size: u64,
	pub created_at: Millis,
	pub stored_path: PathBuf,
	pub origin_device_id: String,
	pub origin_device_name: String,
}

/// Retention policy applied after each new version is recorded.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum RetentionPolicy {
	None,
	Simple { keep_versions: u32 },
	TimeBased { keep_days: u32 },
}

/// One half of a conflict: the state of a file on one device at
/// detection time.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileVersion {
	pub content_hash: String,
	pub mtime: Millis,
	pub device_id: String,
	pub device_name: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictResolution {
	Local,
	Remote,
	Both,
	Manual,
}

/// A divergent update detected by the ConflictResolver. Owned
/// exclusively by the SyncOrchestrator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Conflict {
	pub conflict_id: String,
	pub folder_id: String,
	pub relative_path: String,
	pub local_version: FileVersion,
	pub remote_version: FileVersion,
	pub detected_at: Millis,
	pub resolved: bool,
	pub resolution: Option<ConflictResolution>,
	pub resolved_at: Option<Millis>,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
	Upload,
	Download,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
	Pending,
	Active,
	Completed,
	Failed,
	Cancelled,
}

/// One in-flight upload or download of one file to/from one peer.
/// Owned exclusively by the TransferScheduler.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferTask {
	pub transfer_id: String,
	pub direction: TransferDirection,
	pub folder_id: String,
	pub relative_path: String,
	pub peer_id: String,
	pub expected_size: u64,
	pub expected_hash: String,
	pub state: TransferState,
	pub retry_count: u32,
	pub bytes_transferred: u64,
}

/// A remote-attested deletion, used to distinguish a never-seen file
/// from a remotely-deleted one when scanning.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tombstone {
	pub folder_id: String,
	pub relative_path: String,
	pub deleted_at: Millis,
	pub origin_peer_id: String,
	pub expires_at: Millis,
}

/// Sync operation phases surfaced by `SyncOrchestrator::status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum FolderState {
	#[default]
	Idle,
	Scanning,
	Syncing,
	Error,
	Conflict,
}

impl std::fmt::Display for FolderState {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let s = match self {
			FolderState::Idle => "idle",
			FolderState::Scanning => "scanning",
			FolderState::Syncing => "syncing",
			FolderState::Error => "error",
			FolderState::Conflict => "conflict",
		};
		write!(f, "{s}")
	}
}


// vim: ts=4
