//! Persisted configuration store (§6.1).
//!
//! A single consolidated `Config` struct is the source of truth, loaded
//! from a TOML (or JSON5) file with built-in defaults, consistent with
//! how this crate has always favored one config type over a scattered
//! per-subsystem hierarchy. All numerics are bounded and all enums are
//! closed sets, validated by [`crate::validation`] at the process
//! boundary before the config is accepted.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::types::{Folder, Peer};

/// Top-level configuration document. Field names match the recognized
/// top-level sections exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	pub language: String,
	pub theme: Theme,
	pub folders: Vec<Folder>,
	pub devices: Vec<Peer>,
	pub ignore_presets: Vec<String>,
	pub schedules: Schedules,
	pub performance: Performance,
	pub security: Security,
	pub notifications: Notifications,
	pub advanced: Advanced,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			language: "en".to_string(),
			theme: Theme::Auto,
			folders: Vec::new(),
			devices: Vec::new(),
			ignore_presets: Vec::new(),
			schedules: Schedules::default(),
			performance: Performance::default(),
			security: Security::default(),
			notifications: Notifications::default(),
			advanced: Advanced::default(),
		}
	}
}

impl Config {
	/// Load configuration from a TOML file at `path`, falling back to
	/// defaults if the file does not exist.
	pub fn load(path: &Path) -> Result<Self, SyncError> {
		if !path.exists() {
			return Ok(Config::default());
		}
		let text = std::fs::read_to_string(path)?;
		let config: Config = toml::from_str(&text)?;
		config.validate()?;
		Ok(config)
	}

	pub fn save(&self, path: &Path) -> Result<(), SyncError> {
		let text = toml::to_string_pretty(self)
			.map_err(|e| SyncError::config(e.to_string()))?;
		if let Some(parent) = path.parent() {
			std::fs::create_dir_all(parent)?;
		}
		std::fs::write(path, text)?;
		Ok(())
	}

	/// Sanitize and bounds-check, per §6.1/§7's `Config` error kind.
	pub fn validate(&self) -> Result<(), SyncError> {
		if !(1..=9).contains(&self.performance.compression_level) {
			return Err(SyncError::config(format!(
				"performance.compressionLevel must be 1-9, got {}",
				self.performance.compression_level
			)));
		}
		if self.performance.block_size == 0 {
			return Err(SyncError::config("performance.blockSize must be > 0".to_string()));
		}
		for folder in &self.folders {
			if folder.id.is_empty() {
				return Err(SyncError::config("folder id must not be empty".to_string()));
			}
		}
		Ok(())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
	#[default]
	Auto,
	Light,
	Dark,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Schedules {
	pub quiet_hours: Vec<QuietHoursWindow>,
	pub network_rules: NetworkRules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum QuietHoursAction {
	Pause,
	LimitSpeed,
	SuppressNotifications,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuietHoursWindow {
	/// 0 = Sunday .. 6 = Saturday.
	pub days_of_week: Vec<u8>,
	pub start_minute_of_day: u16,
	pub end_minute_of_day: u16,
	pub action: QuietHoursAction,
	pub limit_kbps: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkRules {
	pub allowed_ssids: Vec<String>,
	pub blocked_ssids: Vec<String>,
	pub lan_only: bool,
	pub allow_metered: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Performance {
	pub upload_limit_kbps: u32,
	pub download_limit_kbps: u32,
	pub max_concurrent_transfers: u32,
	pub compression_enabled: bool,
	pub compression_level: u8,
	pub delta_sync: bool,
	pub block_size: u32,
}

impl Default for Performance {
	fn default() -> Self {
		Performance {
			upload_limit_kbps: 0,
			download_limit_kbps: 0,
			max_concurrent_transfers: 3,
			compression_enabled: false,
			compression_level: 6,
			delta_sync: true,
			block_size: crate::hasher::DEFAULT_BLOCK_SIZE,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EncryptionAlgorithm {
	#[default]
	Aes256Gcm,
	Chacha20Poly1305,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceVerification {
	Always,
	#[default]
	FirstTime,
	Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Security {
	pub encryption_enabled: bool,
	pub encryption_algorithm: EncryptionAlgorithm,
	pub device_verification: DeviceVerification,
}

impl Default for Security {
	fn default() -> Self {
		Security {
			encryption_enabled: true,
			encryption_algorithm: EncryptionAlgorithm::default(),
			device_verification: DeviceVerification::default(),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Notifications {
	pub sync_completed: bool,
	pub conflicts: bool,
	pub errors: bool,
	pub device_connected: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SymbolicLinkMode {
	#[default]
	Follow,
	Skip,
	Copy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FilePermissionsMode {
	#[default]
	Preserve,
	Ignore,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Advanced {
	pub respect_gitignore: bool,
	pub symbolic_links: SymbolicLinkMode,
	pub file_permissions: FilePermissionsMode,
	pub log_level: String,
	pub log_retention_days: u32,
	/// How long a deletion tombstone is kept before being pruned (§6.1,
	/// default 30 days).
	pub tombstone_retention_days: u32,
}

impl Default for Advanced {
	fn default() -> Self {
		Advanced {
			respect_gitignore: true,
			symbolic_links: SymbolicLinkMode::default(),
			file_permissions: FilePermissionsMode::default(),
			log_level: "info".to_string(),
			log_retention_days: 14,
			tombstone_retention_days: 30,
		}
	}
}

/// Default syncr state directory, `~/.syncr`.
pub fn default_state_dir() -> PathBuf {
	std::env::var("HOME")
		.ok()
		.map(|h| PathBuf::from(h).join(".syncr"))
		.unwrap_or_else(|| PathBuf::from(".syncr"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn default_config_validates() {
		assert!(Config::default().validate().is_ok());
	}

	#[test]
	fn rejects_out_of_range_compression_level() {
		let mut config = Config::default();
		config.performance.compression_level = 0;
		assert!(config.validate().is_err());
	}

	#[test]
	fn round_trips_through_toml() {
		let dir = tempfile::TempDir::new().unwrap();
		let path = dir.path().join("config.toml");
		let config = Config::default();
		config.save(&path).unwrap();
		let loaded = Config::load(&path).unwrap();
		assert_eq!(loaded.language, config.language);
		assert_eq!(loaded.performance.block_size, config.performance.block_size);
	}

	#[test]
	fn missing_file_loads_defaults() {
		let dir = tempfile::TempDir::new().unwrap();
		let loaded = Config::load(&dir.path().join("missing.toml")).unwrap();
		assert_eq!(loaded.language, "en");
	}
}

// vim: ts=4
