//! Per-pattern conflict resolution rules: lets a folder pre-decide the
//! resolution for files matching a glob (e.g. always `local` for
//! `*.log`) before falling through to the interactive/manual path.
//! Kept from the teacher as-is beyond swapping in the four-action
//! [`ConflictResolution`](crate::types::ConflictResolution).

use globset::{Glob, GlobMatcher};
use std::path::Path;

use crate::types::ConflictResolution;

#[derive(Debug, Clone)]
pub struct ConflictRule {
	pattern: String,
	matcher: GlobMatcher,
	resolution: ConflictResolution,
}

impl ConflictRule {
	pub fn new(pattern: &str, resolution: ConflictResolution) -> Result<Self, String> {
		let glob = Glob::new(pattern).map_err(|e| format!("invalid glob pattern: {e}"))?;
		Ok(ConflictRule { pattern: pattern.to_string(), matcher: glob.compile_matcher(), resolution })
	}

	pub fn matches(&self, path: &Path) -> bool {
		self.matcher.is_match(path)
	}

	pub fn resolution(&self) -> ConflictResolution {
		self.resolution
	}

	pub fn pattern(&self) -> &str {
		&self.pattern
	}
}

/// Ordered set of rules; first match wins, falling back to a default
/// for paths no rule names (the default is typically `manual`, handing
/// the decision to the user).
#[derive(Debug, Clone)]
pub struct ConflictRuleSet {
	rules: Vec<ConflictRule>,
	default_resolution: ConflictResolution,
}

impl ConflictRuleSet {
	pub fn new(default_resolution: ConflictResolution) -> Self {
		ConflictRuleSet { rules: Vec::new(), default_resolution }
	}

	pub fn add_rule(&mut self, rule: ConflictRule) {
		self.rules.push(rule);
	}

	pub fn resolution_for_path(&self, path: &Path) -> ConflictResolution {
		for rule in &self.rules {
			if rule.matches(path) {
				return rule.resolution();
			}
		}
		self.default_resolution
	}

	pub fn rule_count(&self) -> usize {
		self.rules.len()
	}
}

impl Default for ConflictRuleSet {
	fn default() -> Self {
		Self::new(ConflictResolution::Manual)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	#[test]
	fn rule_matches_its_own_glob_only() {
		let rule = ConflictRule::new("*.log", ConflictResolution::Local).unwrap();
		assert!(rule.matches(&PathBuf::from("test.log")));
		assert!(!rule.matches(&PathBuf::from("test.txt")));
	}

	#[test]
	fn invalid_glob_pattern_is_rejected() {
		assert!(ConflictRule::new("[invalid", ConflictResolution::Local).is_err());
	}

	#[test]
	fn ruleset_first_match_wins() {
		let mut ruleset = ConflictRuleSet::new(ConflictResolution::Manual);
		ruleset.add_rule(ConflictRule::new("*.log", ConflictResolution::Local).unwrap());
		ruleset.add_rule(ConflictRule::new("*", ConflictResolution::Remote).unwrap());

		assert_eq!(ruleset.resolution_for_path(&PathBuf::from("a.log")), ConflictResolution::Local);
		assert_eq!(ruleset.resolution_for_path(&PathBuf::from("a.txt")), ConflictResolution::Remote);
	}

	#[test]
	fn no_match_falls_back_to_default() {
		let mut ruleset = ConflictRuleSet::new(ConflictResolution::Both);
		ruleset.add_rule(ConflictRule::new("*.log", ConflictResolution::Local).unwrap());
		assert_eq!(ruleset.resolution_for_path(&PathBuf::from("a.txt")), ConflictResolution::Both);
	}
}

// vim: ts=4
