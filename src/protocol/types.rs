//! Protocol-agnostic supporting types: the replay detector and the
//! per-peer token bucket that `PeerSession` enforces on every inbound
//! frame (§4.9).

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Default inbound request budget, 100 requests per minute per peer.
pub const DEFAULT_BUCKET_CAPACITY: u32 = 100;
pub const DEFAULT_REFILL_WINDOW: Duration = Duration::from_secs(60);

/// Window within which a repeated nonce is treated as a replay.
pub const REPLAY_WINDOW: Duration = Duration::from_secs(10);

pub struct TokenBucket {
	capacity: u32,
	available: u32,
	refill_window: Duration,
	last_refill: Instant,
}

impl TokenBucket {
	pub fn new(capacity: u32, refill_window: Duration) -> Self {
		TokenBucket { capacity, available: capacity, refill_window, last_refill: Instant::now() }
	}

	fn refill_if_due(&mut self) {
		if self.last_refill.elapsed() >= self.refill_window {
			self.available = self.capacity;
			self.last_refill = Instant::now();
		}
	}

	/// Attempts to take one point; returns false if exhausted.
	pub fn take(&mut self) -> bool {
		self.refill_if_due();
		if self.available == 0 {
			return false;
		}
		self.available -= 1;
		true
	}
}

impl Default for TokenBucket {
	fn default() -> Self {
		TokenBucket::new(DEFAULT_BUCKET_CAPACITY, DEFAULT_REFILL_WINDOW)
	}
}

/// Tracks recently seen nonces, evicting entries older than
/// [`REPLAY_WINDOW`].
#[derive(Default)]
pub struct ReplayDetector {
	seen: VecDeque<(u64, Instant)>,
}

impl ReplayDetector {
	pub fn new() -> Self {
		ReplayDetector::default()
	}

	/// Returns `true` if `nonce` is fresh (not seen within the window)
	/// and records it; `false` if it is a replay.
	pub fn check(&mut self, nonce: u64) -> bool {
		let now = Instant::now();
		while let Some((_, seen_at)) = self.seen.front() {
			if now.duration_since(*seen_at) > REPLAY_WINDOW {
				self.seen.pop_front();
			} else {
				break;
			}
		}
		if self.seen.iter().any(|(n, _)| *n == nonce) {
			return false;
		}
		self.seen.push_back((nonce, now));
		true
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn token_bucket_exhausts_then_blocks() {
		let mut bucket = TokenBucket::new(2, Duration::from_secs(60));
		assert!(bucket.take());
		assert!(bucket.take());
		assert!(!bucket.take());
	}

	#[test]
	fn replay_detector_rejects_repeated_nonce() {
		let mut detector = ReplayDetector::new();
		assert!(detector.check(42));
		assert!(!detector.check(42));
	}

	#[test]
	fn replay_detector_allows_distinct_nonces() {
		let mut detector = ReplayDetector::new();
		assert!(detector.check(1));
		assert!(detector.check(2));
	}
}

// vim: ts=4
