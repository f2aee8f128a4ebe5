//! Debounced, deduplicated file-system watching (C3).
//!
//! One background worker per folder, built on the `notify` crate for
//! native file-system notifications (the same crate the
//! cosmic-connect-protocol example in this pack depends on for live
//! filesystem change events). Each raw notification is debounced by a
//! per-path timer; the last observation within the window wins.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as NotifyWatcher};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::error::SyncError;

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
	Add,
	Change,
	Unlink,
	AddDir,
	UnlinkDir,
	Rename,
}

#[derive(Debug, Clone)]
pub struct WatchEvent {
	pub kind: WatchEventKind,
	pub relative_path: String,
	pub timestamp: u64,
}

/// Tests `WatchEvent::kind == Change` before emitting, dropping the event
/// if the freshly computed contentHash matches what was last stored —
/// invariant 6 of the testable properties.
pub trait DuplicateHashCheck: Send + Sync {
	fn unchanged(&self, relative_path: &str) -> bool;
}

struct DebounceState {
	timers: HashMap<PathBuf, JoinHandle<()>>,
}

/// Watches one folder root, emitting debounced `WatchEvent`s on `events`.
pub struct Watcher {
	_inner: RecommendedWatcher,
	shutdown: Arc<tokio::sync::Notify>,
	worker: Option<JoinHandle<()>>,
}

impl Watcher {
	/// Spawn a watcher over `root`, forwarding debounced events to
	/// `events`. `dedup` suppresses `change` events whose recomputed hash
	/// equals the previously stored one.
	pub fn spawn(
		root: PathBuf,
		events: mpsc::Sender<WatchEvent>,
		debounce: Duration,
		dedup: Arc<dyn DuplicateHashCheck>,
	) -> Result<Self, SyncError> {
		let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

		let mut inner = notify::recommended_watcher(move |res: notify::Result<Event>| {
			let _ = raw_tx.send(res);
		})
		.map_err(|e| SyncError::io(e.to_string()))?;
		inner
			.watch(&root, RecursiveMode::Recursive)
			.map_err(|e| SyncError::io(e.to_string()))?;

		let shutdown = Arc::new(tokio::sync::Notify::new());
		let shutdown_worker = shutdown.clone();
		let debounce_state = Arc::new(Mutex::new(DebounceState { timers: HashMap::new() }));
		let root_for_worker = root.clone();

		let worker = tokio::spawn(async move {
			loop {
				tokio::select! {
					_ = shutdown_worker.notified() => {
						drain_timers(&debounce_state).await;
						break;
					}
					maybe = raw_rx.recv() => {
						match maybe {
							None => break,
							Some(Ok(event)) => {
								handle_event(
									event,
									&root_for_worker,
									events.clone(),
									debounce_state.clone(),
									debounce,
									dedup.clone(),
								).await;
							}
							Some(Err(_)) => continue,
						}
					}
				}
			}
		});

		Ok(Watcher { _inner: inner, shutdown, worker: Some(worker) })
	}

	/// Drains in-flight debounce timers, then stops the worker. No
	/// further events are emitted after this returns.
	pub async fn shutdown(mut self) {
		self.shutdown.notify_one();
		if let Some(worker) = self.worker.take() {
			let _ = worker.await;
		}
	}
}

async fn drain_timers(state: &Arc<Mutex<DebounceState>>) {
	let mut guard = state.lock().await;
	for (_, handle) in guard.timers.drain() {
		handle.abort();
	}
}

async fn handle_event(
	event: Event,
	root: &std::path::Path,
	events: mpsc::Sender<WatchEvent>,
	state: Arc<Mutex<DebounceState>>,
	debounce: Duration,
	dedup: Arc<dyn DuplicateHashCheck>,
) {
	let kind = match event.kind {
		EventKind::Create(notify::event::CreateKind::Folder) => WatchEventKind::AddDir,
		EventKind::Create(_) => WatchEventKind::Add,
		EventKind::Modify(notify::event::ModifyKind::Name(_)) => WatchEventKind::Rename,
		EventKind::Modify(_) => WatchEventKind::Change,
		EventKind::Remove(notify::event::RemoveKind::Folder) => WatchEventKind::UnlinkDir,
		EventKind::Remove(_) => WatchEventKind::Unlink,
		_ => return,
	};

	for path in event.paths {
		let relative_path = match path.strip_prefix(root) {
			Ok(p) => p.to_string_lossy().replace('\\', "/"),
			Err(_) => continue,
		};
		if relative_path.is_empty() {
			continue;
		}

		let mut guard = state.lock().await;
		if let Some(existing) = guard.timers.remove(&path) {
			existing.abort();
		}
		let events = events.clone();
		let dedup = dedup.clone();
		let relative_path_owned = relative_path.clone();
		let handle = tokio::spawn(async move {
			tokio::time::sleep(debounce).await;
			if kind == WatchEventKind::Change && dedup.unchanged(&relative_path_owned) {
				return;
			}
			let timestamp = std::time::SystemTime::now()
				.duration_since(std::time::UNIX_EPOCH)
				.unwrap_or_default()
				.as_millis() as u64;
			let _ = events
				.send(WatchEvent { kind, relative_path: relative_path_owned, timestamp })
				.await;
		});
		guard.timers.insert(path, handle);
	}
}


// vim: ts=4
