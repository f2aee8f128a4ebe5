//! Gitignore-style pattern matching with the precedence order: built-in
//! defaults < folder-config patterns < `.gitignore` < `.stignore`
//! (`.stignore` files in subdirectories are prefixed by their relative
//! directory automatically, since each added file keeps its own parent
//! directory as its pattern root).

use super::ExclusionError;
use ignore::gitignore::{Gitignore, GitignoreBuilder};
use std::path::{Path, PathBuf};

/// Patterns every folder ignores unless explicitly overridden.
pub const BUILTIN_DEFAULTS: &[&str] = &[".git/", ".stversions/", ".DS_Store", "Thumbs.db"];

/// Compiles and evaluates the layered ignore patterns for one folder.
pub struct IgnoreMatcher {
	base_path: PathBuf,
	gitignore: Gitignore,
}

impl IgnoreMatcher {
	/// `folder_patterns` come from the folder configuration. `.gitignore`
	/// is consulted only if `respect_gitignore` is set. `.stignore` is
	/// always consulted, at the folder root and every subdirectory.
	pub fn new(
		base_path: &Path,
		folder_patterns: &[String],
		respect_gitignore: bool,
	) -> Result<Self, ExclusionError> {
		let mut builder = GitignoreBuilder::new(base_path);

		for pattern in BUILTIN_DEFAULTS {
			builder
				.add_line(None, pattern)
				.map_err(|e| ExclusionError::InvalidPattern(e.to_string()))?;
		}
		for pattern in folder_patterns {
			builder
				.add_line(None, pattern)
				.map_err(|e| ExclusionError::InvalidPattern(e.to_string()))?;
		}

		if respect_gitignore {
			let gitignore = base_path.join(".gitignore");
			if gitignore.exists() {
				if let Some(err) = builder.add(gitignore) {
					return Err(ExclusionError::IgnoreFileError(err.to_string()));
				}
			}
		}

		for stignore in find_files_named(base_path, ".stignore") {
			let rel_dir = stignore
				.parent()
				.and_then(|p| p.strip_prefix(base_path).ok())
				.filter(|p| !p.as_os_str().is_empty());
			let contents = std::fs::read_to_string(&stignore)
				.map_err(|e| ExclusionError::IgnoreFileError(e.to_string()))?;
			for line in contents.lines() {
				let scoped = scope_pattern_to_dir(line, rel_dir);
				builder
					.add_line(Some(stignore.clone()), &scoped)
					.map_err(|e| ExclusionError::IgnoreFileError(e.to_string()))?;
			}
		}

		let gitignore = builder.build().map_err(|e| ExclusionError::IgnoreFileError(e.to_string()))?;
		Ok(IgnoreMatcher { base_path: base_path.to_path_buf(), gitignore })
	}

	/// `true` if `relative_path` should not be synced.
	pub fn is_ignored(&self, relative_path: &Path) -> bool {
		if self.gitignore.matched(relative_path, false).is_ignore() {
			return true;
		}
		for ancestor in relative_path.ancestors().skip(1) {
			if ancestor == Path::new("") {
				break;
			}
			if self.gitignore.matched(ancestor, true).is_ignore() {
				return true;
			}
		}
		false
	}

	pub fn base_path(&self) -> &Path {
		&self.base_path
	}
}

/// Rewrites one `.stignore` line so it matches only within `rel_dir`
/// (the file's own directory, relative to the folder root), per git's
/// rule that a nested ignore file's patterns are scoped to its own
/// subtree: slash-free patterns recurse anywhere below it, patterns
/// already containing a slash anchor to it directly.
fn scope_pattern_to_dir(line: &str, rel_dir: Option<&Path>) -> String {
	let Some(rel_dir) = rel_dir else { return line.to_string() };
	let trimmed = line.trim_end();
	if trimmed.is_empty() || trimmed.starts_with('#') {
		return line.to_string();
	}
	let (negation, body) = match trimmed.strip_prefix('!') {
		Some(rest) => ("!", rest),
		None => ("", trimmed),
	};
	let rel_dir_str = rel_dir.to_string_lossy().replace('\\', "/");
	let has_internal_slash = body.trim_end_matches('/').contains('/');
	let scoped_body = match body.strip_prefix('/') {
		Some(anchored) => format!("/{rel_dir_str}/{anchored}"),
		None if has_internal_slash => format!("/{rel_dir_str}/{body}"),
		None => format!("{rel_dir_str}/**/{body}"),
	};
	format!("{negation}{scoped_body}")
}

/// Recursively find all files with the given name under `root`, IO
/// errors on individual entries are skipped (optional inputs, §4.2).
fn find_files_named(root: &Path, name: &str) -> Vec<PathBuf> {
	let mut found = Vec::new();
	let mut stack = vec![root.to_path_buf()];
	while let Some(dir) = stack.pop() {
		let entries = match std::fs::read_dir(&dir) {
			Ok(e) => e,
			Err(_) => continue,
		};
		for entry in entries.flatten() {
			let path = entry.path();
			if path.is_dir() {
				if path.file_name().map(|n| n == ".git").unwrap_or(false) {
					continue;
				}
				stack.push(path);
			} else if path.file_name().map(|n| n == name).unwrap_or(false) {
				found.push(path);
			}
		}
	}
	found
}


// vim: ts=4
