//! ConflictResolver (C7): detection and the four resolution actions of
//! §4.7.
//!
//! Detection narrows the teacher's N-version "pick a winner by
//! strategy" resolver to the exact two-version, mtime-threshold rule
//! fixed by the 10 000 ms clear-winner threshold. The
//! [`super::rules::ConflictRuleSet`] glob table is kept as-is and
//! consulted first; only a path with no matching rule (or a `manual`
//! rule) falls through to the interactive workspace.

use std::path::{Path, PathBuf};

use crate::types::{Conflict, ConflictResolution, FileVersion, Millis};

/// A conflict is recorded only when two mtimes disagree by no more than
/// this many milliseconds (spec.md §9 resolves the 60s-vs-10s ambiguity
/// in favor of 10s).
pub const CLEAR_WINNER_THRESHOLD_MS: u64 = 10_000;

/// Bounded tail of resolved conflicts kept for history/auditing.
pub const HISTORY_LIMIT: usize = 100;

#[derive(Debug)]
pub enum DetectionOutcome {
	/// Content hashes agree; nothing to do.
	NoConflict,
	/// mtimes disagree by more than the threshold; the newer side wins
	/// automatically and no Conflict is recorded.
	AutoResolved { use_local: bool },
	/// Hashes differ and mtimes are within the threshold: genuine
	/// conflict.
	Conflict(Box<Conflict>),
}

/// Detects whether `local`/`remote` observations of one (folderId,
/// relPath) constitute a conflict.
pub fn detect(
	folder_id: &str,
	relative_path: &str,
	local: &FileVersion,
	remote: &FileVersion,
	conflict_id: impl Into<String>,
	detected_at: Millis,
) -> DetectionOutcome {
	if local.content_hash == remote.content_hash {
		return DetectionOutcome::NoConflict;
	}
	let delta = local.mtime.abs_diff(remote.mtime);
	if delta > CLEAR_WINNER_THRESHOLD_MS {
		return DetectionOutcome::AutoResolved { use_local: local.mtime > remote.mtime };
	}
	DetectionOutcome::Conflict(Box::new(Conflict {
		conflict_id: conflict_id.into(),
		folder_id: folder_id.to_string(),
		relative_path: relative_path.to_string(),
		local_version: local.clone(),
		remote_version: remote.clone(),
		detected_at,
		resolved: false,
		resolution: None,
		resolved_at: None,
	}))
}

/// Filesystem actions a resolution requires of the caller (the
/// SyncOrchestrator owns actually touching disk; this module only
/// decides names and targets, keeping I/O at the orchestration layer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionPlan {
	/// Keep the local file; stash remote content at `backup_path`.
	KeepLocal { backup_path: PathBuf },
	/// Stash the local file at `backup_path`; the engine replaces local
	/// content with the remote download.
	TakeRemote { backup_path: PathBuf },
	/// Rename local to `local_path`; write remote content to
	/// `remote_path`.
	KeepBoth { local_path: PathBuf, remote_path: PathBuf },
	/// Build an interactive workspace directory; `resolved_path` is
	/// where the user's save will appear.
	Manual { workspace_dir: PathBuf, local_copy: PathBuf, readme: PathBuf, resolved_path: PathBuf },
}

fn split_ext(path: &Path) -> (String, String) {
	let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("file").to_string();
	let ext = path.extension().and_then(|s| s.to_str()).map(|e| format!(".{e}")).unwrap_or_default();
	(stem, ext)
}

/// Computes the [`ResolutionPlan`] for `resolution`, rooted at
/// `absolute_path` (the local file's real path) and a conflict
/// workspace directory the orchestrator maintains per folder.
pub fn plan_resolution(
	resolution: ConflictResolution,
	absolute_path: &Path,
	conflict_workspace: &Path,
	conflict_id: &str,
	remote_device_name: &str,
	now: Millis,
) -> ResolutionPlan {
	let (stem, ext) = split_ext(absolute_path);
	let parent = absolute_path.parent().unwrap_or_else(|| Path::new(""));

	match resolution {
		ConflictResolution::Local => ResolutionPlan::KeepLocal {
			backup_path: conflict_workspace.join(conflict_id).join(format!("remote{ext}")),
		},
		ConflictResolution::Remote => ResolutionPlan::TakeRemote {
			backup_path: conflict_workspace.join(conflict_id).join(format!("local{ext}")),
		},
		ConflictResolution::Both => ResolutionPlan::KeepBoth {
			local_path: parent.join(format!("{stem}.~conflict~local~{now}{ext}")),
			remote_path: parent.join(format!("{stem}.~conflict~{remote_device_name}~{now}{ext}")),
		},
		ConflictResolution::Manual => {
			let workspace_dir = conflict_workspace.join(conflict_id);
			ResolutionPlan::Manual {
				local_copy: workspace_dir.join(format!("local{ext}")),
				readme: workspace_dir.join("README.txt"),
				resolved_path: workspace_dir.join(format!("resolved{ext}")),
				workspace_dir,
			}
		}
	}
}

/// Applies a resolution to `conflict`, marking it resolved and returning
/// the plan the caller must execute against the filesystem.
pub fn resolve(
	conflict: &mut Conflict,
	resolution: ConflictResolution,
	absolute_path: &Path,
	conflict_workspace: &Path,
	remote_device_name: &str,
	now: Millis,
) -> ResolutionPlan {
	conflict.resolved = true;
	conflict.resolution = Some(resolution);
	conflict.resolved_at = Some(now);
	plan_resolution(resolution, absolute_path, conflict_workspace, &conflict.conflict_id, remote_device_name, now)
}

/// Bounded history of resolved conflicts (default last 100).
#[derive(Debug, Default)]
pub struct ConflictHistory {
	entries: std::collections::VecDeque<Conflict>,
	limit: usize,
}

impl ConflictHistory {
	pub fn new() -> Self {
		ConflictHistory { entries: std::collections::VecDeque::new(), limit: HISTORY_LIMIT }
	}

	pub fn record(&mut self, conflict: Conflict) {
		self.entries.push_back(conflict);
		while self.entries.len() > self.limit {
			self.entries.pop_front();
		}
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Conflict> {
		self.entries.iter()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn version(hash: &str, mtime: Millis) -> FileVersion {
		FileVersion { content_hash: hash.to_string(), mtime, device_id: "d1".to_string(), device_name: "Device".to_string() }
	}

	#[test]
	fn matching_hashes_yield_no_conflict() {
		let outcome = detect("f1", "a.txt", &version("h1", 100), &version("h1", 500), "c1", 1000);
		assert!(matches!(outcome, DetectionOutcome::NoConflict));
	}

	#[test]
	fn large_mtime_gap_auto_resolves_to_newer() {
		let outcome =
			detect("f1", "a.txt", &version("h1", 50_000), &version("h2", 1_000), "c1", 60_000);
		assert!(matches!(outcome, DetectionOutcome::AutoResolved { use_local: true }));
	}

	#[test]
	fn small_mtime_gap_is_a_conflict() {
		let outcome = detect("f1", "a.txt", &version("h1", 1_000), &version("h2", 5_000), "c1", 6_000);
		assert!(matches!(outcome, DetectionOutcome::Conflict(_)));
	}

	#[test]
	fn both_resolution_names_files_per_spec() {
		let plan = plan_resolution(
			ConflictResolution::Both,
			Path::new("/data/report.docx"),
			Path::new("/data/.conflicts"),
			"c1",
			"laptop",
			1_700_000_000_000,
		);
		match plan {
			ResolutionPlan::KeepBoth { local_path, remote_path } => {
				assert_eq!(local_path, Path::new("/data/report.~conflict~local~1700000000000.docx"));
				assert_eq!(remote_path, Path::new("/data/report.~conflict~laptop~1700000000000.docx"));
			}
			_ => panic!("wrong plan variant"),
		}
	}

	#[test]
	fn manual_resolution_produces_resolved_placeholder_path() {
		let plan = plan_resolution(
			ConflictResolution::Manual,
			Path::new("/data/report.docx"),
			Path::new("/data/.conflicts"),
			"c1",
			"laptop",
			1000,
		);
		match plan {
			ResolutionPlan::Manual { resolved_path, .. } => {
				assert_eq!(resolved_path, Path::new("/data/.conflicts/c1/resolved.docx"));
			}
			_ => panic!("wrong plan variant"),
		}
	}

	#[test]
	fn history_is_bounded_to_limit() {
		let mut history = ConflictHistory::new();
		for i in 0..(HISTORY_LIMIT + 10) {
			history.record(Conflict {
				conflict_id: format!("c{i}"),
				folder_id: "f1".to_string(),
				relative_path: "a.txt".to_string(),
				local_version: version("h1", 0),
				remote_version: version("h2", 0),
				detected_at: 0,
				resolved: true,
				resolution: Some(ConflictResolution::Local),
				resolved_at: Some(0),
			});
		}
		assert_eq!(history.len(), HISTORY_LIMIT);
	}
}

// vim: ts=4
