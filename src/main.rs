use clap::{Arg, ArgAction, Command as ClapCommand};
use std::env;
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use syncr::config::Config;
use syncr::control::{self, Command};
use syncr::error::SyncError;
use syncr::orchestrator::{PeerDirectory, SyncOrchestrator};
use syncr::protocol::messages::RemoteFileEntry;
use syncr::snapshot::SnapshotStore;
use syncr::types::{ConflictResolution, TransferTask};
use syncr::utils::lock::FileLock;

fn init_syncr_dir() -> PathBuf {
	let home = env::var("HOME").expect("HOME must be set");
	let dir = PathBuf::from(home).join(".syncr");
	std::fs::create_dir_all(&dir).expect("failed to create ~/.syncr");
	dir
}

fn now_ms() -> u64 {
	std::time::SystemTime::now()
		.duration_since(std::time::UNIX_EPOCH)
		.expect("system clock before epoch")
		.as_millis() as u64
}

/// No live peer transport is wired into this binary; the core's
/// `SecureChannel` substrate (§4.9) is meant to be supplied by a
/// separate transport crate. Every network-facing control command
/// fails with a retryable `Network` error until one is injected.
struct NoTransportDirectory;

#[async_trait::async_trait]
impl PeerDirectory for NoTransportDirectory {
	async fn file_list(&self, peer_id: &str, _folder_id: &str) -> Result<Vec<RemoteFileEntry>, SyncError> {
		Err(SyncError::network(format!("no transport configured for peer {peer_id}")))
	}

	async fn enqueue_transfer(&self, _task: TransferTask) -> Result<(), SyncError> {
		Err(SyncError::network("no transport configured"))
	}
}

fn build_cli() -> ClapCommand {
	ClapCommand::new("syncr")
		.version("0.2.0")
		.author("Szilard Hajba <szilard@symbion.hu>")
		.about("Peer-to-peer deduplicating filesystem synchronizer")
		.subcommand_required(true)
		.arg(Arg::new("profile").short('p').long("profile").value_name("PROFILE").help("Profile"))
		.subcommand(ClapCommand::new("sync").about("Trigger a sync pass").arg(Arg::new("folder").help("Folder id")))
		.subcommand(ClapCommand::new("pause").about("Pause a folder").arg(Arg::new("folder").help("Folder id")))
		.subcommand(ClapCommand::new("resume").about("Resume a folder").arg(Arg::new("folder").help("Folder id")))
		.subcommand(ClapCommand::new("status").about("Show folder status").arg(Arg::new("folder").help("Folder id")))
		.subcommand(
			ClapCommand::new("list-tree")
				.about("List the canonical file tree for a folder")
				.arg(Arg::new("folder").required(true)),
		)
		.subcommand(
			ClapCommand::new("resolve-conflict")
				.about("Resolve a recorded conflict")
				.arg(Arg::new("id").required(true))
				.arg(Arg::new("resolution").required(true).value_parser(["local", "remote", "both", "manual"])),
		)
		.subcommand(
			ClapCommand::new("export-config").about("Export sanitized configuration").arg(Arg::new("path").required(true)),
		)
		.subcommand(
			ClapCommand::new("import-config")
				.about("Import and validate configuration")
				.arg(Arg::new("path").required(true))
				.arg(Arg::new("force").long("force").action(ArgAction::SetTrue)),
		)
}

fn parse_resolution(value: &str) -> ConflictResolution {
	match value {
		"local" => ConflictResolution::Local,
		"remote" => ConflictResolution::Remote,
		"both" => ConflictResolution::Both,
		_ => ConflictResolution::Manual,
	}
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn Error>> {
	syncr::logging::init_tracing();

	let matches = build_cli().get_matches();
	let syncr_dir = init_syncr_dir();
	let _lock = FileLock::acquire(&syncr_dir).map_err(|e| -> Box<dyn Error> { e })?;
	syncr::utils::lock::setup_signal_handlers();

	let config_path = syncr_dir.join("config.toml");
	let config = Config::load(&config_path)?;

	let snapshot = Arc::new(SnapshotStore::open(&syncr_dir.join("snapshot.redb"))?);
	let orchestrator = SyncOrchestrator::with_ignore_config(
		Arc::clone(&snapshot),
		config.folders.clone(),
		config.ignore_presets.clone(),
		config.advanced.respect_gitignore,
	);
	let directory = NoTransportDirectory;
	let now = now_ms();

	let command = match matches.subcommand() {
		Some(("sync", sub)) => Command::Sync { folder_id: sub.get_one::<String>("folder").cloned() },
		Some(("pause", sub)) => Command::Pause { folder_id: sub.get_one::<String>("folder").cloned() },
		Some(("resume", sub)) => Command::Resume { folder_id: sub.get_one::<String>("folder").cloned() },
		Some(("status", sub)) => Command::Status { folder_id: sub.get_one::<String>("folder").cloned() },
		Some(("list-tree", sub)) => {
			Command::ListTree { folder_id: sub.get_one::<String>("folder").expect("required").clone() }
		}
		Some(("resolve-conflict", sub)) => Command::ResolveConflict {
			conflict_id: sub.get_one::<String>("id").expect("required").clone(),
			resolution: parse_resolution(sub.get_one::<String>("resolution").expect("required")),
		},
		Some(("export-config", sub)) => {
			Command::ExportConfig { path: PathBuf::from(sub.get_one::<String>("path").expect("required")) }
		}
		Some(("import-config", sub)) => {
			Command::ImportConfig { path: PathBuf::from(sub.get_one::<String>("path").expect("required")) }
		}
		_ => unreachable!("clap enforces subcommand_required"),
	};

	let outcome = control::dispatch(command, &orchestrator, &directory, &snapshot, &config_path, now).await;

	if let Some(response) = &outcome.response {
		match response {
			control::Response::Status(statuses) => {
				for (folder_id, status) in statuses {
					println!(
						"{folder_id}: state={:?} paused={} conflicts={}",
						status.state, status.paused, status.conflict_count
					);
				}
			}
			control::Response::Tree(entries) => {
				for entry in entries {
					println!("{}\t{}\t{}", entry.relative_path, entry.size, entry.content_hash);
				}
			}
			_ => println!("ok"),
		}
	}
	if let Some(err) = &outcome.error {
		eprintln!("error: {err}");
	}

	Ok(ExitCode::from(outcome.exit_code as u8))
}

// vim: ts=4
