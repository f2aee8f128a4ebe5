//! PolicyGate (C11): the quiet-hours/network/battery/pause predicate
//! gating whether a folder may sync right now.
//!
//! No teacher file owns scheduling; this module puts the teacher's
//! already-declared (and previously unused) `sysinfo` dependency to
//! work for battery signals, and evaluates quiet-hours/network rules
//! the way `conflict/rules.rs`'s first-match-wins glob table is
//! evaluated: an ordered window list, first applicable window wins.

use crate::config::{NetworkRules, QuietHoursAction, QuietHoursWindow, Schedules};
use crate::types::Millis;

/// Minimum free space on a folder's filesystem before the gate treats
/// it as a resource-exhaustion pause, mirroring the free-space floor
/// `version_store.rs` enforces for the versions directory.
pub const LOW_DISK_SPACE_FLOOR_BYTES: u64 = 512 * 1024 * 1024;

/// Snapshot of the runtime environment a decision is made against.
/// `on_battery`/`battery_level_percent` and SSID/metered detection are
/// platform power-management APIs outside `sysinfo`'s scope and are
/// supplied by the caller; `low_disk_space` is filled in from `sysinfo`.
#[derive(Debug, Clone, Default)]
pub struct Environment {
	pub current_ssid: Option<String>,
	pub is_metered: bool,
	pub on_battery: bool,
	pub battery_level_percent: Option<u8>,
	pub low_disk_space: bool,
}

impl Environment {
	/// Checks whether the filesystem backing `folder_path` is below
	/// [`LOW_DISK_SPACE_FLOOR_BYTES`], using `sysinfo`'s disk listing.
	pub fn probe(folder_path: &std::path::Path) -> Self {
		let disks = sysinfo::Disks::new_with_refreshed_list();
		let low_disk_space = disks
			.list()
			.iter()
			.filter(|d| folder_path.starts_with(d.mount_point()))
			.max_by_key(|d| d.mount_point().as_os_str().len())
			.map(|d| d.available_space() < LOW_DISK_SPACE_FLOOR_BYTES)
			.unwrap_or(false);
		Environment { low_disk_space, ..Environment::default() }
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advisory {
	Allow,
	Pause,
	LimitSpeed { kbps: u32 },
	SuppressNotifications,
}

const MINUTES_PER_DAY: u16 = 24 * 60;
const BATTERY_THRESHOLD_PERCENT: u8 = 15;

fn minute_of_day(now_ms: Millis) -> u16 {
	let minutes_since_epoch = now_ms / 60_000;
	(minutes_since_epoch % MINUTES_PER_DAY as u64) as u16
}

fn day_of_week(now_ms: Millis) -> u8 {
	// 1970-01-01 was a Thursday (day index 4 in a 0=Sunday week).
	let days_since_epoch = now_ms / 86_400_000;
	((days_since_epoch + 4) % 7) as u8
}

fn window_matches(window: &QuietHoursWindow, day: u8, minute: u16) -> bool {
	if !window.days_of_week.contains(&day) {
		return false;
	}
	if window.start_minute_of_day <= window.end_minute_of_day {
		minute >= window.start_minute_of_day && minute < window.end_minute_of_day
	} else {
		// Wraps past midnight.
		minute >= window.start_minute_of_day || minute < window.end_minute_of_day
	}
}

fn quiet_hours_advisory(schedules: &Schedules, now: Millis) -> Advisory {
	let day = day_of_week(now);
	let minute = minute_of_day(now);
	for window in &schedules.quiet_hours {
		if window_matches(window, day, minute) {
			return match window.action {
				QuietHoursAction::Pause => Advisory::Pause,
				QuietHoursAction::LimitSpeed => {
					Advisory::LimitSpeed { kbps: window.limit_kbps.unwrap_or(0) }
				}
				QuietHoursAction::SuppressNotifications => Advisory::SuppressNotifications,
			};
		}
	}
	Advisory::Allow
}

fn network_allows(rules: &NetworkRules, env: &Environment) -> bool {
	if let Some(ssid) = &env.current_ssid {
		if rules.blocked_ssids.contains(ssid) {
			return false;
		}
		if !rules.allowed_ssids.is_empty() && !rules.allowed_ssids.contains(ssid) {
			return false;
		}
	}
	if rules.lan_only && env.is_metered {
		return false;
	}
	if env.is_metered && !rules.allow_metered {
		return false;
	}
	true
}

fn battery_allows(env: &Environment) -> bool {
	if env.low_disk_space {
		return false;
	}
	match (env.on_battery, env.battery_level_percent) {
		(true, Some(level)) => level >= BATTERY_THRESHOLD_PERCENT,
		_ => true,
	}
}

/// The pure(-ish) `allow` predicate of §4.11. `folder_paused` folds in
/// both the user's explicit pause and any previous PolicyGate deny the
/// orchestrator latched.
pub fn allow(
	schedules: &Schedules,
	folder_paused: bool,
	now: Millis,
	environment: &Environment,
) -> Advisory {
	if folder_paused {
		return Advisory::Pause;
	}
	if !network_allows(&schedules.network_rules, environment) {
		return Advisory::Pause;
	}
	if !battery_allows(environment) {
		return Advisory::Pause;
	}
	quiet_hours_advisory(schedules, now)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::QuietHoursAction;

	fn window(days: Vec<u8>, start: u16, end: u16, action: QuietHoursAction) -> QuietHoursWindow {
		QuietHoursWindow { days_of_week: days, start_minute_of_day: start, end_minute_of_day: end, action, limit_kbps: Some(512) }
	}

	#[test]
	fn paused_folder_is_always_denied() {
		let schedules = Schedules::default();
		let env = Environment::default();
		assert_eq!(allow(&schedules, true, 0, &env), Advisory::Pause);
	}

	#[test]
	fn quiet_hours_window_pauses_within_range() {
		let mut schedules = Schedules::default();
		let thursday = 4;
		schedules.quiet_hours.push(window(vec![thursday], 60, 120, QuietHoursAction::Pause));
        // 1970-01-01T01:30:00Z is minute 90, day 4 (Thursday)
		let now = 90 * 60_000;
		assert_eq!(allow(&schedules, false, now, &Environment::default()), Advisory::Pause);
	}

	#[test]
	fn quiet_hours_window_outside_range_allows() {
		let mut schedules = Schedules::default();
		schedules.quiet_hours.push(window(vec![4], 60, 120, QuietHoursAction::Pause));
		let now = 200 * 60_000;
		assert_eq!(allow(&schedules, false, now, &Environment::default()), Advisory::Allow);
	}

	#[test]
	fn blocked_ssid_denies_even_outside_quiet_hours() {
		let mut schedules = Schedules::default();
		schedules.network_rules.blocked_ssids.push("guest-wifi".to_string());
		let env = Environment { current_ssid: Some("guest-wifi".to_string()), ..Default::default() };
		assert_eq!(allow(&schedules, false, 0, &env), Advisory::Pause);
	}

	#[test]
	fn low_battery_denies() {
		let schedules = Schedules::default();
		let env = Environment { on_battery: true, battery_level_percent: Some(5), ..Default::default() };
		assert_eq!(allow(&schedules, false, 0, &env), Advisory::Pause);
	}

	#[test]
	fn limit_speed_action_carries_kbps() {
		let mut schedules = Schedules::default();
		schedules.quiet_hours.push(window(vec![4], 60, 120, QuietHoursAction::LimitSpeed));
		let now = 90 * 60_000;
		assert_eq!(allow(&schedules, false, now, &Environment::default()), Advisory::LimitSpeed { kbps: 512 });
	}
}

// vim: ts=4
