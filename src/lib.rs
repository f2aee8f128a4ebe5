//! # SyncR - peer-to-peer deduplicating filesystem synchronizer
//!
//! SyncR is a content-addressed, delta-aware filesystem synchronizer
//! that keeps a set of folders consistent across paired peers.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use syncr::orchestrator::SyncOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // see src/main.rs for a full wiring example
//!     Ok(())
//! }
//! ```

#![deny(unsafe_code)]
#![warn(dead_code)]

pub mod config;
pub mod conflict;
pub mod control;
pub mod diff;
pub mod error;
pub mod exclusion;
pub mod hasher;
pub mod logging;
pub mod orchestrator;
pub mod policy;
pub mod protocol;
pub mod snapshot;
pub mod transfer;
pub mod types;
pub mod utils;
pub mod validation;
pub mod version_store;
pub mod watcher;

pub use conflict::{ConflictHistory, ConflictRule, ConflictRuleSet};
pub use control::{dispatch, Command, Response};
pub use error::{ErrorKind, SyncError};
pub use exclusion::{ExclusionError, IgnoreMatcher};
pub use orchestrator::{PeerDirectory, SyncOrchestrator};
pub use protocol::{Message, PeerSession, SecureChannel};

// vim: ts=4
