//! Local control surface (§6.3): the pluggable command channel consumed
//! by a CLI or UI front-end.
//!
//! Grounded on the teacher's CLI dispatch shape in `main.rs` (one enum
//! of subcommands, one dispatch function returning a process exit
//! code) but expressed as a library-level `Command`/`Response` pair so
//! a UI can drive it in-process without shelling out.

use std::path::Path;

use crate::config::Config;
use crate::error::{ErrorKind, SyncError};
use crate::orchestrator::{FolderStatus, PeerDirectory, SyncOrchestrator};
use crate::snapshot::SnapshotStore;
use crate::types::{ConflictResolution, Millis, SnapshotEntry};

#[derive(Debug, Clone)]
pub enum Command {
	Sync { folder_id: Option<String> },
	Pause { folder_id: Option<String> },
	Resume { folder_id: Option<String> },
	Status { folder_id: Option<String> },
	ListTree { folder_id: String },
	ResolveConflict { conflict_id: String, resolution: ConflictResolution },
	ExportConfig { path: std::path::PathBuf },
	ImportConfig { path: std::path::PathBuf },
}

#[derive(Debug, Clone)]
pub enum Response {
	Ok,
	Status(std::collections::HashMap<String, FolderStatus>),
	Tree(Vec<SnapshotEntry>),
	ConfigExported,
	ConfigImported,
}

/// Exit codes per §6.3.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PRECONDITION_FAILURE: i32 = 1;
pub const EXIT_TRANSPORT_UNAVAILABLE: i32 = 2;

pub struct CommandOutcome {
	pub response: Option<Response>,
	pub exit_code: i32,
	pub error: Option<SyncError>,
}

fn ok(response: Response) -> CommandOutcome {
	CommandOutcome { response: Some(response), exit_code: EXIT_SUCCESS, error: None }
}

fn failed(error: SyncError) -> CommandOutcome {
	let exit_code = match error.kind {
		ErrorKind::Network | ErrorKind::TimedOut => EXIT_TRANSPORT_UNAVAILABLE,
		_ => EXIT_PRECONDITION_FAILURE,
	};
	CommandOutcome { response: None, exit_code, error: Some(error) }
}

/// Dispatches one `Command` against live state. `sync`/`resolve-conflict`
/// delegate to the `SyncOrchestrator`; `list-tree` reads the
/// `SnapshotStore` directly; `export-config`/`import-config` sanitize
/// through `Config::validate`.
pub async fn dispatch(
	command: Command,
	orchestrator: &SyncOrchestrator,
	directory: &dyn PeerDirectory,
	snapshot: &SnapshotStore,
	config_path: &Path,
	now: Millis,
) -> CommandOutcome {
	match command {
		Command::Sync { folder_id } => {
			let _ = orchestrator.prune_tombstones(now);
			match orchestrator.sync_now(folder_id.as_deref(), directory, now).await {
				Ok(()) => ok(Response::Ok),
				Err(e) => failed(e),
			}
		}
		Command::Pause { folder_id } => match orchestrator.pause(folder_id.as_deref()) {
			Ok(()) => ok(Response::Ok),
			Err(e) => failed(e),
		},
		Command::Resume { folder_id } => match orchestrator.resume(folder_id.as_deref()) {
			Ok(()) => ok(Response::Ok),
			Err(e) => failed(e),
		},
		Command::Status { folder_id } => match orchestrator.status(folder_id.as_deref()) {
			Ok(status) => ok(Response::Status(status)),
			Err(e) => failed(e),
		},
		Command::ListTree { folder_id } => ok(Response::Tree(snapshot.list(&folder_id))),
		Command::ResolveConflict { conflict_id, resolution } => {
			let workspace = config_path.parent().unwrap_or_else(|| Path::new(".")).join(".conflicts");
			let absolute_path = workspace.join(&conflict_id);
			match orchestrator.resolve_conflict(&conflict_id, resolution, &absolute_path, &workspace, now) {
				Ok(_plan) => ok(Response::Ok),
				Err(e) => failed(e),
			}
		}
		Command::ExportConfig { path } => match Config::load(config_path) {
			Ok(config) => match config.save(&path) {
				Ok(()) => ok(Response::ConfigExported),
				Err(e) => failed(e),
			},
			Err(e) => failed(e),
		},
		Command::ImportConfig { path } => match Config::load(&path) {
			Ok(config) => match config.validate() {
				Ok(()) => match config.save(config_path) {
					Ok(()) => ok(Response::ConfigImported),
					Err(e) => failed(e),
				},
				Err(e) => failed(e),
			},
			Err(e) => failed(e),
		},
	}
}


// vim: ts=4
